use std::time::Duration;
use crate::executor::TaskType;

/// Default cap on the number of pages in the route stack.
pub const DEFAULT_MAX_ROUTER_STACK: usize = 32;
/// Default time a page load waits for the current staging page to finish.
pub const DEFAULT_STAGING_TIMEOUT: Duration = Duration::from_secs(1);
/// Default time callers wait for a pipeline context to be attached.
pub const DEFAULT_ATTACH_TIMEOUT: Duration = Duration::from_secs(5);
/// Default capacity of the telemetry broadcast channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 128;

/// Router configuration, nested inside [`FrameworkConfig`].
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Maximum number of pages on the route stack before pushes are refused
    pub max_router_stack: usize,
    /// How long a load waits for the in-flight staging page before giving up
    pub staging_timeout: Duration,
    /// How long router operations wait for a pipeline context to be attached
    pub attach_timeout: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_router_stack: DEFAULT_MAX_ROUTER_STACK,
            staging_timeout: DEFAULT_STAGING_TIMEOUT,
            attach_timeout: DEFAULT_ATTACH_TIMEOUT,
        }
    }
}

/// Main framework configuration. Also contains the default configuration for the router.
#[derive(Debug, Clone)]
pub struct FrameworkConfig {
    /// Prefix used for the names of the executor threads (ie: "ace.ui", "ace.js")
    pub thread_name_prefix: String,
    /// Capacity of the telemetry event channel
    pub event_channel_capacity: usize,
    /// Initial view scale (device pixels per logical pixel)
    pub view_scale: f64,
    /// Router config
    pub router: RouterConfig,
}

impl FrameworkConfig {
    /// Name of the thread that serves the given queue.
    pub fn thread_name(&self, task_type: TaskType) -> String {
        format!("{}.{}", self.thread_name_prefix, task_type.as_str())
    }
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            thread_name_prefix: "ace".to_string(),
            event_channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            view_scale: 1.0,
            router: RouterConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_router_limits() {
        let config = FrameworkConfig::default();
        assert_eq!(config.router.max_router_stack, 32);
        assert_eq!(config.router.staging_timeout, Duration::from_secs(1));
        assert_eq!(config.view_scale, 1.0);
    }

    #[test]
    fn thread_names_are_prefixed() {
        let config = FrameworkConfig {
            thread_name_prefix: "app".into(),
            ..FrameworkConfig::default()
        };
        assert_eq!(config.thread_name(TaskType::Ui), "app.ui");
        assert_eq!(config.thread_name(TaskType::Background), "app.background");
    }
}
