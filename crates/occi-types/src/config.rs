//! Validation settings and their loading from a TOML file.
//!
//! The settings gate how strictly attribute values are checked. They are an
//! explicit value handed to every validating call, never global state.
//!
//! ```toml
//! [validation]
//! verify_attribute_pattern = true
//! compatibility = false
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// Environment variable that switches compatibility mode on or off.
pub const ENV_COMPATIBILITY: &str = "OCCI_COMPATIBILITY";
/// Environment variable that switches pattern verification on or off.
pub const ENV_VERIFY_ATTRIBUTE_PATTERN: &str = "OCCI_VERIFY_ATTRIBUTE_PATTERN";

/// Strictness knobs for attribute validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Match attribute values against their definition patterns.
    pub verify_attribute_pattern: bool,
    /// Relaxed mode for peers that emit non-conforming values. Pattern
    /// checks are skipped while this is on.
    pub compatibility: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            verify_attribute_pattern: true,
            compatibility: false,
        }
    }
}

impl ValidationConfig {
    /// Settings that never enforce patterns.
    pub fn lenient() -> Self {
        Self {
            verify_attribute_pattern: false,
            compatibility: true,
        }
    }

    /// Whether pattern mismatches are errors (as opposed to warnings).
    pub fn enforces_patterns(&self) -> bool {
        self.verify_attribute_pattern && !self.compatibility
    }

    /// Apply `OCCI_COMPATIBILITY` / `OCCI_VERIFY_ATTRIBUTE_PATTERN` overrides.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(flag) = std::env::var(ENV_COMPATIBILITY)
            .ok()
            .and_then(|v| parse_flag(&v))
        {
            self.compatibility = flag;
        }
        if let Some(flag) = std::env::var(ENV_VERIFY_ATTRIBUTE_PATTERN)
            .ok()
            .and_then(|v| parse_flag(&v))
        {
            self.verify_attribute_pattern = flag;
        }
        self
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    validation: ValidationConfig,
}

/// Load validation settings from the `[validation]` table of a TOML file.
///
/// A missing, unreadable or malformed file is not fatal: the defaults are
/// returned and the problem is logged.
pub fn load_config(path: &Path) -> ValidationConfig {
    if !path.exists() {
        info!(path = %path.display(), "Config file not found, using defaults");
        return ValidationConfig::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<ConfigFile>(&contents) {
            Ok(file) => {
                info!(path = %path.display(), "Loaded validation configuration");
                file.validation
            }
            Err(e) => {
                warn!(
                    error = %e,
                    path = %path.display(),
                    "Failed to parse config, using defaults"
                );
                ValidationConfig::default()
            }
        },
        Err(e) => {
            warn!(
                error = %e,
                path = %path.display(),
                "Failed to read config file, using defaults"
            );
            ValidationConfig::default()
        }
    }
}

/// Interpret common boolean spellings used in environment variables.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_enforce_patterns() {
        let config = ValidationConfig::default();
        assert!(config.verify_attribute_pattern);
        assert!(!config.compatibility);
        assert!(config.enforces_patterns());
        assert!(!ValidationConfig::lenient().enforces_patterns());
    }

    #[test]
    fn test_compatibility_disables_patterns() {
        let config = ValidationConfig {
            verify_attribute_pattern: true,
            compatibility: true,
        };
        assert!(!config.enforces_patterns());
    }

    #[test]
    fn test_load_config_missing_file() {
        let config = load_config(Path::new("/nonexistent/occi.toml"));
        assert_eq!(config, ValidationConfig::default());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("occi.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[validation]").unwrap();
        writeln!(f, "compatibility = true").unwrap();
        drop(f);

        let config = load_config(&path);
        assert!(config.compatibility);
        // unspecified keys keep their defaults
        assert!(config.verify_attribute_pattern);
    }

    #[test]
    fn test_load_config_malformed_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("occi.toml");
        std::fs::write(&path, "[validation\ncompatibility = ").unwrap();

        let config = load_config(&path);
        assert_eq!(config, ValidationConfig::default());
    }

    #[test]
    fn test_load_config_without_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("occi.toml");
        std::fs::write(&path, "unrelated = 1\n").unwrap();

        assert_eq!(load_config(&path), ValidationConfig::default());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" off "), Some(false));
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag("maybe"), None);
    }
}
