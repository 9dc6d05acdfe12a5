//! Runtime configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What `navigate_to` does while another navigation holds the slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationPolicy {
    /// Wait for the running navigation, then proceed (FIFO)
    #[default]
    Queue,
    /// Fail immediately with `Error::NavigationInProgress`
    Reject,
}

/// Configuration shared by every runtime singleton.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Id of the document container views are mounted into.
    pub root_container: String,

    /// Maximum nesting of re-entrant `publish` calls.
    pub max_publish_depth: usize,

    /// Interval between dependency checks.
    #[serde(with = "millis")]
    pub dependency_poll_interval: Duration,

    /// Number of dependency checks before giving up.
    pub dependency_max_attempts: u32,

    /// Behavior for overlapping navigations.
    pub navigation_policy: NavigationPolicy,

    /// How many faults the diagnostics sink retains.
    pub diagnostics_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            root_container: "app".to_string(),
            max_publish_depth: 50,
            dependency_poll_interval: Duration::from_millis(100),
            dependency_max_attempts: 50,
            navigation_policy: NavigationPolicy::Queue,
            diagnostics_capacity: 256,
        }
    }
}

impl RuntimeConfig {
    /// Create a config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the root container id.
    pub fn with_root_container(mut self, id: impl Into<String>) -> Self {
        self.root_container = id.into();
        self
    }

    /// Set the maximum publish depth.
    pub fn with_max_publish_depth(mut self, depth: usize) -> Self {
        self.max_publish_depth = depth;
        self
    }

    /// Set the dependency wait interval and attempt count.
    pub fn with_dependency_wait(mut self, interval: Duration, attempts: u32) -> Self {
        self.dependency_poll_interval = interval;
        self.dependency_max_attempts = attempts;
        self
    }

    /// Set the navigation policy.
    pub fn with_navigation_policy(mut self, policy: NavigationPolicy) -> Self {
        self.navigation_policy = policy;
        self
    }

    /// Set the diagnostics capacity.
    pub fn with_diagnostics_capacity(mut self, capacity: usize) -> Self {
        self.diagnostics_capacity = capacity;
        self
    }

    /// Total time a bounded dependency wait may take.
    pub fn dependency_deadline(&self) -> Duration {
        self.dependency_poll_interval * self.dependency_max_attempts
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RuntimeConfig::default();
        assert_eq!(config.root_container, "app");
        assert_eq!(config.max_publish_depth, 50);
        assert_eq!(config.dependency_deadline(), Duration::from_secs(5));
        assert_eq!(config.navigation_policy, NavigationPolicy::Queue);
    }

    #[test]
    fn test_builder() {
        let config = RuntimeConfig::new()
            .with_root_container("main")
            .with_dependency_wait(Duration::from_millis(10), 3)
            .with_navigation_policy(NavigationPolicy::Reject);

        assert_eq!(config.root_container, "main");
        assert_eq!(config.dependency_deadline(), Duration::from_millis(30));
        assert_eq!(config.navigation_policy, NavigationPolicy::Reject);
    }

    #[test]
    fn test_serde_millis() {
        let json = serde_json::json!({
            "root_container": "app",
            "max_publish_depth": 8,
            "dependency_poll_interval": 250,
            "dependency_max_attempts": 4,
            "navigation_policy": "reject",
            "diagnostics_capacity": 16
        });
        let config: RuntimeConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.dependency_poll_interval, Duration::from_millis(250));
        assert_eq!(config.navigation_policy, NavigationPolicy::Reject);
    }
}
