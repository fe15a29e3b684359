//! Engine-wide configuration, constructed once and shared by every crate
//! above this one.

use serde::{Deserialize, Serialize};

/// Default per-direction CommLink capacity.
pub const DEFAULT_COMM_LINK_CAPACITY: usize = 8192;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub sample_rate: f64,
    pub block_size: usize,
    pub cycles_per_second: f64,
    pub lookahead_sec: f64,
    pub prefetch_cycles: f64,
    pub fetch_period_ms: u64,
    pub max_orbits: usize,
    pub comm_link_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            block_size: 128,
            cycles_per_second: 0.5,
            lookahead_sec: 2.0,
            prefetch_cycles: 4.0,
            fetch_period_ms: 16,
            max_orbits: 12,
            comm_link_capacity: DEFAULT_COMM_LINK_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Coerces `max_orbits` into `[1, 32]`, as required by the orbit map's
    /// size invariant.
    pub fn clamped_max_orbits(&self) -> usize {
        self.max_orbits.clamp(1, 32)
    }

    pub fn comm_link_capacity_or_default(&self) -> usize {
        if self.comm_link_capacity == 0 {
            DEFAULT_COMM_LINK_CAPACITY
        } else {
            self.comm_link_capacity
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_documented_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.comm_link_capacity, 8192);
        assert_eq!(config.clamped_max_orbits(), 12);
    }

    #[test]
    fn max_orbits_is_clamped_into_range() {
        let mut config = EngineConfig::default();
        config.max_orbits = 0;
        assert_eq!(config.clamped_max_orbits(), 1);
        config.max_orbits = 999;
        assert_eq!(config.clamped_max_orbits(), 32);
    }

    #[test]
    fn serde_round_trip() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).expect("serialize EngineConfig");
        assert!(json.contains("sample_rate"));
        let parsed: EngineConfig = serde_json::from_str(&json).expect("deserialize EngineConfig");
        assert_eq!(parsed, config);
    }
}
