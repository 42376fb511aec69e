//! Configuration module for environment variable parsing.
//!
//! The host reads the environment once at startup and passes the values
//! down explicitly; the verification and normalization functions take the
//! signing key as a parameter and never touch process-wide state.

use std::env;
use tracing::warn;

use crate::webhook::signature::DEFAULT_MAX_AGE_SECONDS;

/// Webhook configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Mailgun signing key for HMAC signature verification
    pub signing_key: Option<String>,

    /// Maximum age in seconds for webhook timestamps
    pub signature_max_age: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            signing_key: env::var("MAILGUN_SIGNING_KEY").ok(),

            signature_max_age: env::var("MAILGUN_SIGNATURE_MAX_AGE")
                .ok()
                .and_then(|v| match v.parse() {
                    Ok(parsed) => Some(parsed),
                    Err(_) => {
                        warn!(value = %v, "Invalid MAILGUN_SIGNATURE_MAX_AGE, using default");
                        None
                    }
                })
                .unwrap_or(DEFAULT_MAX_AGE_SECONDS),
        }
    }

    /// Whether a usable signing key is configured.
    pub fn signing_key_enabled(&self) -> bool {
        self.signing_key
            .as_ref()
            .map(|k| !k.trim().is_empty())
            .unwrap_or(false)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            signing_key: None,
            signature_max_age: DEFAULT_MAX_AGE_SECONDS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_max_age() {
        let config = Config::default();
        assert_eq!(config.signature_max_age, 900);
    }

    #[test]
    fn test_signing_key_enabled() {
        let mut config = Config::default();
        assert!(!config.signing_key_enabled());

        config.signing_key = Some("".to_string());
        assert!(!config.signing_key_enabled());

        config.signing_key = Some("   ".to_string());
        assert!(!config.signing_key_enabled());

        config.signing_key = Some("key123".to_string());
        assert!(config.signing_key_enabled());
    }
}
