use std::time::Duration;

use crate::error::{Error, Result};

/// Default pod listing interval.
pub const DEFAULT_POD_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Default pause before a reflector re-lists after a failure.
pub const DEFAULT_RELIST_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Base URL of the resource authority, e.g. `https://authority:8443`.
    pub authority_url: String,
    pub bearer_token: Option<String>,
    /// Refuse to start without a bearer token.
    pub require_auth: bool,

    pub pod_poll_interval: Duration,
    pub relist_backoff: Duration,

    /// Image running Docker strategy builds.
    pub docker_builder_image: String,
    /// Image running STI strategy builds.
    pub sti_runner_image: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            authority_url: "http://127.0.0.1:8080".to_string(),
            bearer_token: None,
            require_auth: false,
            pod_poll_interval: DEFAULT_POD_POLL_INTERVAL,
            relist_backoff: DEFAULT_RELIST_BACKOFF,
            docker_builder_image: "buildflow/docker-builder:latest".to_string(),
            sti_runner_image: "buildflow/sti-runner:latest".to_string(),
        }
    }
}

impl ControllerConfig {
    /// Rejects settings the background tasks cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.pod_poll_interval.is_zero() {
            return Err(Error::config("pod poll interval must be greater than zero"));
        }
        if self.relist_backoff.is_zero() {
            return Err(Error::config("relist backoff must be greater than zero"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(ControllerConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_pod_poll_interval_is_rejected() {
        let cfg = ControllerConfig {
            pod_poll_interval: Duration::ZERO,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("poll interval")));
    }

    #[test]
    fn zero_relist_backoff_is_rejected() {
        let cfg = ControllerConfig {
            relist_backoff: Duration::ZERO,
            ..Default::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(matches!(err, Error::Config(ref msg) if msg.contains("relist backoff")));
    }
}
