use std::time::Duration;

use kevcal_client::poller::{PollConfig, JOB_POLL_INTERVAL, MOCKUP_MAX_ATTEMPTS, MOCKUP_POLL_INTERVAL};
use kevcal_client::SessionConfig;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
const DEFAULT_MAX_UPLOAD_MB: u64 = 5;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Service base URL, without a trailing slash.
    pub base_url: String,
    pub job_poll_interval: Duration,
    pub mockup_poll_interval: Duration,
    pub mockup_max_attempts: u32,
    pub max_upload_bytes: u64,
    pub request_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            job_poll_interval: JOB_POLL_INTERVAL,
            mockup_poll_interval: MOCKUP_POLL_INTERVAL,
            mockup_max_attempts: MOCKUP_MAX_ATTEMPTS,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ClientConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                 |
    /// |-------------------------------|-------------------------|
    /// | `KEVCAL_BASE_URL`             | `http://127.0.0.1:5000` |
    /// | `KEVCAL_JOB_POLL_MS`          | `1000`                  |
    /// | `KEVCAL_MOCKUP_POLL_MS`       | `2000`                  |
    /// | `KEVCAL_MOCKUP_MAX_ATTEMPTS`  | `30`                    |
    /// | `KEVCAL_MAX_UPLOAD_MB`        | `5`                     |
    /// | `KEVCAL_REQUEST_TIMEOUT_SECS` | `30`                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_url = lookup("KEVCAL_BASE_URL")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.base_url);

        let job_poll_interval = match parse_positive(&lookup, "KEVCAL_JOB_POLL_MS")? {
            Some(ms) => Duration::from_millis(ms),
            None => defaults.job_poll_interval,
        };
        let mockup_poll_interval = match parse_positive(&lookup, "KEVCAL_MOCKUP_POLL_MS")? {
            Some(ms) => Duration::from_millis(ms),
            None => defaults.mockup_poll_interval,
        };
        let mockup_max_attempts = match parse_positive(&lookup, "KEVCAL_MOCKUP_MAX_ATTEMPTS")? {
            Some(n) => u32::try_from(n).map_err(|_| ConfigError::Invalid {
                var: "KEVCAL_MOCKUP_MAX_ATTEMPTS",
                expected: "a positive integer",
                value: n.to_string(),
            })?,
            None => defaults.mockup_max_attempts,
        };
        let max_upload_bytes = match parse_positive(&lookup, "KEVCAL_MAX_UPLOAD_MB")? {
            Some(mb) => mb.saturating_mul(1024 * 1024),
            None => defaults.max_upload_bytes,
        };
        let request_timeout = match parse_positive(&lookup, "KEVCAL_REQUEST_TIMEOUT_SECS")? {
            Some(secs) => Duration::from_secs(secs),
            None => defaults.request_timeout,
        };

        Ok(Self {
            base_url,
            job_poll_interval,
            mockup_poll_interval,
            mockup_max_attempts,
            max_upload_bytes,
            request_timeout,
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            job_poll: PollConfig {
                interval: self.job_poll_interval,
                max_attempts: None,
            },
            mockup_poll: PollConfig {
                interval: self.mockup_poll_interval,
                max_attempts: Some(self.mockup_max_attempts),
            },
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

fn parse_positive<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(None);
    };
    match raw.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ConfigError::Invalid {
            var,
            expected: "a positive integer",
            value: raw,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ClientConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ClientConfig::from_lookup(|k| vars.get(k).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:5000");
        assert_eq!(config.job_poll_interval, Duration::from_secs(1));
        assert_eq!(config.mockup_poll_interval, Duration::from_secs(2));
        assert_eq!(config.mockup_max_attempts, 30);
        assert_eq!(config.max_upload_bytes, 5 * 1024 * 1024);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn overrides_are_applied() {
        let config = load(&[
            ("KEVCAL_BASE_URL", "https://kevcal.example/"),
            ("KEVCAL_JOB_POLL_MS", "250"),
            ("KEVCAL_MOCKUP_MAX_ATTEMPTS", "10"),
            ("KEVCAL_MAX_UPLOAD_MB", "8"),
        ])
        .unwrap();
        assert_eq!(config.base_url, "https://kevcal.example");
        assert_eq!(config.job_poll_interval, Duration::from_millis(250));
        assert_eq!(config.max_upload_bytes, 8 * 1024 * 1024);

        let session = config.session_config();
        assert_eq!(session.mockup_poll.max_attempts, Some(10));
        assert_eq!(session.job_poll.max_attempts, None);
    }

    #[test]
    fn invalid_value_names_the_variable() {
        let err = load(&[("KEVCAL_MOCKUP_POLL_MS", "soon")]).unwrap_err();
        assert_matches!(
            &err,
            ConfigError::Invalid { var: "KEVCAL_MOCKUP_POLL_MS", value, .. } if value == "soon"
        );
        assert!(err.to_string().starts_with("KEVCAL_MOCKUP_POLL_MS must be"));
    }

    #[test]
    fn zero_is_rejected() {
        assert_matches!(
            load(&[("KEVCAL_REQUEST_TIMEOUT_SECS", "0")]),
            Err(ConfigError::Invalid { var: "KEVCAL_REQUEST_TIMEOUT_SECS", .. })
        );
    }
}
