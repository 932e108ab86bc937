use std::time::Duration;

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Minimum time between two throttled refreshes.
    pub refresh_interval: Duration,
    /// Scale-ups of a group are refused this long after a failed instance
    /// was last observed in it.
    pub failure_backoff: Duration,
    /// Failed instances still present after this long are deleted.
    pub stuck_failure_cleanup: Duration,
    /// Failure-tracking entries are evicted after this long.
    pub failure_entry_ttl: Duration,
    /// Concurrent instance creations per scale-up.
    pub create_concurrency: usize,
    /// Lifetime of the cached instance list.
    pub list_cache_ttl: Duration,
    /// Deadline applied to every cloud call.
    pub call_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(60),
            failure_backoff: Duration::from_secs(5 * 60),
            stuck_failure_cleanup: Duration::from_secs(10 * 60),
            failure_entry_ttl: Duration::from_secs(60 * 60),
            create_concurrency: 10,
            list_cache_ttl: Duration::from_secs(30),
            call_timeout: Duration::from_secs(60),
        }
    }
}
