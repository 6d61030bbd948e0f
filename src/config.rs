//! Runtime configuration sourced from environment variables.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `MYODIAG_TOP_FEATURES` | `5` | influential features kept per report |
//! | `MYODIAG_EXPLANATION_METHOD` | `SHAP` | method reported when metadata omits it |
//! | `MYODIAG_LOG_MODE` | `auto` | `auto`, `file`, `stdout` or `stderr` |
//! | `MYODIAG_LOG_FILE` | `myodiag.log` | log path when logging to a file |
//! | `MYODIAG_SANITIZE_MAX_BYTES` | `16384` | per-line cap of the log sanitizer |
//!
//! Invalid values fall back to the default with a warning. `LogConfig` is read
//! before the subscriber exists, so it collects its warnings for the caller
//! to emit once logging is up.

use std::path::PathBuf;

pub const DEFAULT_TOP_FEATURES: usize = 5;
pub const DEFAULT_EXPLANATION_METHOD: &str = "SHAP";
pub const DEFAULT_LOG_FILE: &str = "myodiag.log";
pub const DEFAULT_SANITIZE_MAX_BYTES: usize = 16 * 1024;

const TOP_FEATURES_ENV: &str = "MYODIAG_TOP_FEATURES";
const EXPLANATION_METHOD_ENV: &str = "MYODIAG_EXPLANATION_METHOD";
const LOG_MODE_ENV: &str = "MYODIAG_LOG_MODE";
const LOG_FILE_ENV: &str = "MYODIAG_LOG_FILE";
const SANITIZE_MAX_BYTES_ENV: &str = "MYODIAG_SANITIZE_MAX_BYTES";

/// Settings for the result normalizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizerConfig {
    /// Maximum number of influential features kept in a report
    pub top_features: usize,
    /// Method name used when explanation metadata does not report one
    pub default_explanation_method: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            top_features: DEFAULT_TOP_FEATURES,
            default_explanation_method: DEFAULT_EXPLANATION_METHOD.to_string(),
        }
    }
}

impl NormalizerConfig {
    /// Build the configuration from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let top_features = match lookup(TOP_FEATURES_ENV) {
            Some(v) => match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => n,
                _ => {
                    tracing::warn!(
                        "Ignoring invalid {}={:?}, using {}",
                        TOP_FEATURES_ENV,
                        v,
                        DEFAULT_TOP_FEATURES
                    );
                    DEFAULT_TOP_FEATURES
                }
            },
            None => DEFAULT_TOP_FEATURES,
        };

        let default_explanation_method = lookup(EXPLANATION_METHOD_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_EXPLANATION_METHOD.to_string());

        Self {
            top_features,
            default_explanation_method,
        }
    }

    /// Override the influential-feature limit (zero is ignored).
    #[must_use]
    pub fn with_top_features(mut self, top_features: usize) -> Self {
        if top_features > 0 {
            self.top_features = top_features;
        }
        self
    }
}

/// Where formatted log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// File when attached to a terminal, stderr otherwise
    Auto,
    File,
    Stdout,
    Stderr,
}

/// Logging destination settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub mode: LogMode,
    pub file: PathBuf,
    /// Per-line input cap of the log sanitizer
    pub sanitize_max_bytes: usize,
    /// Fallbacks taken while reading the environment
    pub warnings: Vec<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            mode: LogMode::Auto,
            file: PathBuf::from(DEFAULT_LOG_FILE),
            sanitize_max_bytes: DEFAULT_SANITIZE_MAX_BYTES,
            warnings: Vec::new(),
        }
    }
}

impl LogConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(LOG_MODE_ENV) {
            match raw.trim().to_ascii_lowercase().as_str() {
                "" | "auto" => {}
                "file" => config.mode = LogMode::File,
                "stdout" => config.mode = LogMode::Stdout,
                "stderr" => config.mode = LogMode::Stderr,
                _ => config
                    .warnings
                    .push(format!("Ignoring unknown {LOG_MODE_ENV}={raw:?}, using auto")),
            }
        }

        if let Some(file) = lookup(LOG_FILE_ENV).filter(|v| !v.trim().is_empty()) {
            config.file = PathBuf::from(file);
        }

        if let Some(raw) = lookup(SANITIZE_MAX_BYTES_ENV) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.sanitize_max_bytes = n,
                _ => config.warnings.push(format!(
                    "Ignoring invalid {SANITIZE_MAX_BYTES_ENV}={raw:?}, using {DEFAULT_SANITIZE_MAX_BYTES}"
                )),
            }
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = NormalizerConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config, NormalizerConfig::default());
        assert_eq!(config.top_features, 5);
        assert_eq!(config.default_explanation_method, "SHAP");
    }

    #[test]
    fn test_env_overrides() {
        let config = NormalizerConfig::from_lookup(lookup_from(&[
            ("MYODIAG_TOP_FEATURES", "3"),
            ("MYODIAG_EXPLANATION_METHOD", "LIME"),
        ]));
        assert_eq!(config.top_features, 3);
        assert_eq!(config.default_explanation_method, "LIME");
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = NormalizerConfig::from_lookup(lookup_from(&[
            ("MYODIAG_TOP_FEATURES", "zero"),
            ("MYODIAG_EXPLANATION_METHOD", "   "),
        ]));
        assert_eq!(config, NormalizerConfig::default());

        let zero = NormalizerConfig::from_lookup(lookup_from(&[("MYODIAG_TOP_FEATURES", "0")]));
        assert_eq!(zero.top_features, DEFAULT_TOP_FEATURES);
    }

    #[test]
    fn test_with_top_features() {
        assert_eq!(NormalizerConfig::default().with_top_features(8).top_features, 8);
        assert_eq!(NormalizerConfig::default().with_top_features(0).top_features, 5);
    }

    #[test]
    fn test_log_config() {
        let config = LogConfig::from_lookup(lookup_from(&[("MYODIAG_LOG_MODE", "stdout")]));
        assert_eq!(config.mode, LogMode::Stdout);
        assert_eq!(config.file, PathBuf::from(DEFAULT_LOG_FILE));
        assert_eq!(config.sanitize_max_bytes, DEFAULT_SANITIZE_MAX_BYTES);
        assert!(config.warnings.is_empty());

        let explicit = LogConfig::from_lookup(lookup_from(&[
            ("MYODIAG_LOG_MODE", " File "),
            ("MYODIAG_LOG_FILE", "/var/log/myodiag/run.log"),
            ("MYODIAG_SANITIZE_MAX_BYTES", "4096"),
        ]));
        assert_eq!(explicit.mode, LogMode::File);
        assert_eq!(explicit.file, PathBuf::from("/var/log/myodiag/run.log"));
        assert_eq!(explicit.sanitize_max_bytes, 4096);
        assert!(explicit.warnings.is_empty());
    }

    #[test]
    fn test_log_config_warns_on_invalid_values() {
        let config = LogConfig::from_lookup(lookup_from(&[
            ("MYODIAG_LOG_MODE", "syslog"),
            ("MYODIAG_SANITIZE_MAX_BYTES", "0"),
        ]));
        assert_eq!(config.mode, LogMode::Auto);
        assert_eq!(config.sanitize_max_bytes, DEFAULT_SANITIZE_MAX_BYTES);
        assert_eq!(config.warnings.len(), 2);
        assert!(config.warnings[0].contains("MYODIAG_LOG_MODE"));
        assert!(config.warnings[0].contains("syslog"));
        assert!(config.warnings[1].contains("MYODIAG_SANITIZE_MAX_BYTES"));

        let auto = LogConfig::from_lookup(lookup_from(&[("MYODIAG_LOG_MODE", "auto")]));
        assert_eq!(auto, LogConfig::default());
    }
}
