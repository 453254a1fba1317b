//! Key–value configuration files.
//!
//! The run parameters come from a plain text file of whitespace-separated
//! `key value` lines, e.g.
//!
//! ```text
//! lambda 0.693147
//! targetVolume 16000
//! slices 32
//! seed 1
//! sphere false
//! measurements 100
//! fileID collab-16000-1
//! importGeom false
//! ```
//!
//! Lines starting with `#` and unknown keys are ignored; missing required
//! keys or unparsable values are configuration errors.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Failures while reading or interpreting a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file `{path}`: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("config key `{key}` is missing")]
    MissingKey { key: &'static str },

    #[error("config key `{key}` has invalid value `{value}`")]
    InvalidValue { key: &'static str, value: String },
}

/// The parameters the sampler needs.
#[derive(Debug, Clone)]
pub struct Config {
    /// Cosmological constant; `ln 2` at the 2D critical point.
    pub lambda: f64,
    /// Triangle count the soft volume fixing centers on.
    pub target_volume: u32,
    /// Number of time slices.
    pub slices: u32,
    /// Base seed; the driver uses `seed + 0`, universe picks and
    /// observable helpers use `seed + 1`.
    pub seed: u64,
    /// 2-sphere topology instead of the torus.
    pub sphere: bool,
    /// Number of measurement sweeps.
    pub measurements: u32,
    /// Identifier appended to every observable output file name.
    pub file_id: String,
    /// Try to resume from a geometry checkpoint.
    pub import_geometry: bool,
}

impl Config {
    /// Reads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, a required
    /// key is missing, or a value does not parse.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str_contents(&text)
    }

    /// Parses configuration text; see the module docs for the format.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for missing keys or invalid values.
    pub fn from_str_contents(text: &str) -> Result<Self, ConfigError> {
        let mut entries: HashMap<&str, &str> = HashMap::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(2, char::is_whitespace);
            if let (Some(key), Some(value)) = (parts.next(), parts.next()) {
                entries.insert(key, value.trim());
            }
        }

        Ok(Self {
            lambda: parse(&entries, "lambda")?,
            target_volume: parse(&entries, "targetVolume")?,
            slices: parse(&entries, "slices")?,
            seed: parse(&entries, "seed")?,
            sphere: flag(&entries, "sphere")?,
            measurements: parse(&entries, "measurements")?,
            file_id: required(&entries, "fileID")?.to_string(),
            import_geometry: flag(&entries, "importGeom")?,
        })
    }
}

fn required<'a>(
    entries: &HashMap<&str, &'a str>,
    key: &'static str,
) -> Result<&'a str, ConfigError> {
    entries
        .get(key)
        .copied()
        .ok_or(ConfigError::MissingKey { key })
}

fn parse<T: std::str::FromStr>(
    entries: &HashMap<&str, &str>,
    key: &'static str,
) -> Result<T, ConfigError> {
    let value = required(entries, key)?;
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

/// Boolean flags: the literal `true` enables, anything else disables.
fn flag(entries: &HashMap<&str, &str>, key: &'static str) -> Result<bool, ConfigError> {
    Ok(required(entries, key)? == "true")
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EXAMPLE: &str = "\
lambda 0.693147
targetVolume 16000
slices 32
seed 1
sphere false
measurements 100
fileID collab-16000-1
importGeom true
";

    #[test]
    fn parses_all_required_keys() {
        let config = Config::from_str_contents(EXAMPLE).unwrap();
        assert_relative_eq!(config.lambda, 0.693_147, epsilon = 1e-9);
        assert_eq!(config.target_volume, 16_000);
        assert_eq!(config.slices, 32);
        assert_eq!(config.seed, 1);
        assert!(!config.sphere);
        assert_eq!(config.measurements, 100);
        assert_eq!(config.file_id, "collab-16000-1");
        assert!(config.import_geometry);
    }

    #[test]
    fn comments_blank_lines_and_unknown_keys_are_ignored() {
        let text = format!("# a comment\n\nunknownKey 3\n{EXAMPLE}");
        assert!(Config::from_str_contents(&text).is_ok());
    }

    #[test]
    fn non_true_flags_disable() {
        let text = EXAMPLE.replace("sphere false", "sphere yes");
        let config = Config::from_str_contents(&text).unwrap();
        assert!(!config.sphere);
    }

    #[test]
    fn missing_key_is_reported() {
        let text = EXAMPLE.replace("seed 1\n", "");
        match Config::from_str_contents(&text) {
            Err(ConfigError::MissingKey { key }) => assert_eq!(key, "seed"),
            other => panic!("expected MissingKey, got {other:?}"),
        }
    }

    #[test]
    fn invalid_value_is_reported() {
        let text = EXAMPLE.replace("slices 32", "slices many");
        match Config::from_str_contents(&text) {
            Err(ConfigError::InvalidValue { key, value }) => {
                assert_eq!(key, "slices");
                assert_eq!(value, "many");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }
}
