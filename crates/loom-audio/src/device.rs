//! Output device selection.

use cpal::traits::HostTrait;
use cpal::{Device, Host};

use crate::{AudioError, AudioResult};

pub fn get_host() -> Host {
    cpal::default_host()
}

pub fn get_default_output_device() -> AudioResult<Device> {
    get_host().default_output_device().ok_or(AudioError::NoDevice)
}
