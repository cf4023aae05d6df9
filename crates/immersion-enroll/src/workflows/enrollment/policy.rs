use std::time::Duration;

/// Program-wide knobs for the enrollment flow. The ceiling applies uniformly
/// to every track; there is no per-track configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentPolicy {
    pub capacity_ceiling: u32,
    pub verify_debounce: Duration,
    pub roster_cache_ttl: Duration,
}

impl Default for EnrollmentPolicy {
    fn default() -> Self {
        Self {
            capacity_ceiling: 40,
            verify_debounce: Duration::from_millis(800),
            roster_cache_ttl: Duration::from_secs(300),
        }
    }
}
