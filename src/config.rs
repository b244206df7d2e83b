// src/config.rs

use serde_json::{Map, Value};
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use thiserror::Error;

/// Environment variable holding the path to the config document.
pub const CONFIG_ENV_VAR: &str = "NUM2VID_CONFIG";
/// The filename the server logs into, inside `logging_output_dir`.
pub const LOG_FILE_NAME: &str = "num2vid_log";

/// Config keys read by the application.
pub const KEY_FFMPEG_CMD: &str = "ffmpeg_cmd_str";
pub const KEY_VID_FORMAT: &str = "vid_format";
pub const KEY_VID_OUTPUT_DIR: &str = "vid_output_dir";
pub const KEY_HOST: &str = "flask_host";
pub const KEY_PORT: &str = "flask_port";
pub const KEY_LOGGING_OUTPUT_DIR: &str = "logging_output_dir";
pub const KEY_NUM_MIN: &str = "num_min";
pub const KEY_NUM_MAX: &str = "num_max";
pub const KEY_LABEL_INSTRUCTIONS: &str = "label_instructions";

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_VID_FORMAT: &str = "mp4";
pub const DEFAULT_VID_OUTPUT_DIR: &str = ".";
pub const DEFAULT_NUM_MIN: u64 = 1;
pub const DEFAULT_NUM_MAX: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to access config at '{}': {source}", path.display())]
    Path {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to parse config at '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("config at '{}' is not a JSON object", path.display())]
    NotAnObject { path: PathBuf },
    #[error("config key '{0}' is missing")]
    MissingKey(String),
    #[error("config key '{key}' must be {expected}")]
    InvalidValue { key: String, expected: &'static str },
}

/// A JSON key-value document on disk, mirrored in memory.
///
/// Every `load` replaces the in-memory values wholesale, so manual edits to the
/// file are picked up without restarting the process.
#[derive(Debug, Clone)]
pub struct Config {
    path: PathBuf,
    values: Map<String, Value>,
}

impl Config {
    /// Opens and parses the document at `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Path` if the file cannot be read and
    /// `ConfigError::Read` / `ConfigError::NotAnObject` if it is not a JSON object.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = Config {
            path: path.into(),
            values: Map::new(),
        };
        config.load()?;
        Ok(config)
    }

    /// Re-reads the document from disk.
    pub fn load(&mut self) -> Result<&Map<String, Value>, ConfigError> {
        let content = fs::read_to_string(&self.path).map_err(|source| ConfigError::Path {
            path: self.path.clone(),
            source,
        })?;
        let parsed: Value = serde_json::from_str(&content).map_err(|source| ConfigError::Read {
            path: self.path.clone(),
            source,
        })?;
        match parsed {
            Value::Object(values) => {
                self.values = values;
                Ok(&self.values)
            }
            _ => Err(ConfigError::NotAnObject {
                path: self.path.clone(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Returns the string at `key`, or `default` when the key is absent or not a string.
    pub fn get_str_or(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    }

    /// Returns the non-negative integer at `key`, or `default` otherwise.
    pub fn get_u64_or(&self, key: &str, default: u64) -> u64 {
        self.values
            .get(key)
            .and_then(Value::as_u64)
            .unwrap_or(default)
    }

    /// Returns the list of strings at `key`.
    pub fn require_str_list(&self, key: &str) -> Result<Vec<String>, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            expected: "a list of strings",
        };
        let items = self
            .values
            .get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))?
            .as_array()
            .ok_or_else(invalid)?;
        items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
            .collect()
    }

    pub fn host(&self) -> String {
        self.get_str_or(KEY_HOST, DEFAULT_HOST)
    }

    pub fn port(&self) -> Result<u16, ConfigError> {
        match self.values.get(KEY_PORT) {
            None => Ok(DEFAULT_PORT),
            Some(value) => value
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| ConfigError::InvalidValue {
                    key: KEY_PORT.to_string(),
                    expected: "a port number between 0 and 65535",
                }),
        }
    }

    /// Directory the server writes its log file into, if configured.
    pub fn logging_output_dir(&self) -> Option<PathBuf> {
        self.values
            .get(KEY_LOGGING_OUTPUT_DIR)
            .and_then(Value::as_str)
            .map(|s| PathBuf::from(shellexpand::tilde(s).into_owned()))
    }

    /// Inclusive range of numbers offered by the interactive client.
    pub fn num_range(&self) -> (u64, u64) {
        let min = self.get_u64_or(KEY_NUM_MIN, DEFAULT_NUM_MIN);
        let max = self.get_u64_or(KEY_NUM_MAX, DEFAULT_NUM_MAX);
        if min <= max {
            (min, max)
        } else {
            (max, min)
        }
    }

    /// Merges `new_values` into memory only; nothing is written.
    pub fn update(&mut self, new_values: Map<String, Value>) -> &Map<String, Value> {
        self.values.extend(new_values);
        &self.values
    }

    /// Replaces the document on disk with `values`, then adopts it in memory.
    ///
    /// The new content is written to a sibling temp file and renamed over the
    /// original so readers never observe a half-written document.
    pub fn save(&mut self, values: Map<String, Value>) -> Result<&Map<String, Value>, ConfigError> {
        let path_err = |source| ConfigError::Path {
            path: self.path.clone(),
            source,
        };
        let json = serde_json::to_string_pretty(&values)
            .map_err(io::Error::other)
            .map_err(path_err)?;
        let mut tmp_name = self.path.as_os_str().to_owned();
        tmp_name.push(".tmp");
        let tmp_path = PathBuf::from(tmp_name);
        fs::write(&tmp_path, json).map_err(path_err)?;
        fs::rename(&tmp_path, &self.path).map_err(path_err)?;

        self.values = values;
        Ok(&self.values)
    }

    /// Resets the document to an empty object.
    pub fn clear(&mut self) -> Result<(), ConfigError> {
        self.save(Map::new()).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn write_config(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("num2vid_config.json");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_open_and_typed_getters() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{"flask_host": "0.0.0.0", "flask_port": 8123, "vid_format": "mov",
                "ffmpeg_cmd_str": ["ffmpeg", "-y", "{num}.mov"], "num_min": 9, "num_max": 3}"#,
        );

        let config = Config::open(&path).unwrap();
        assert_eq!(config.host(), "0.0.0.0");
        assert_eq!(config.port().unwrap(), 8123);
        assert_eq!(config.get_str_or(KEY_VID_FORMAT, DEFAULT_VID_FORMAT), "mov");
        assert_eq!(
            config.require_str_list(KEY_FFMPEG_CMD).unwrap(),
            vec!["ffmpeg", "-y", "{num}.mov"]
        );
        assert_eq!(config.num_range(), (3, 9));
        assert_eq!(config.get_str_or("missing", "fallback"), "fallback");
    }

    #[test]
    fn test_negative_num_range_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), r#"{"num_min": -5, "num_max": 4}"#);

        let config = Config::open(&path).unwrap();
        assert_eq!(config.num_range(), (DEFAULT_NUM_MIN, 4));
    }

    #[test]
    fn test_missing_file_is_path_error() {
        let dir = tempdir().unwrap();
        let err = Config::open(dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Path { .. }));
    }

    #[test]
    fn test_malformed_file_is_read_error() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), "{not json");
        assert!(matches!(Config::open(&path).unwrap_err(), ConfigError::Read { .. }));

        let path = write_config(dir.path(), "[1, 2]");
        assert!(matches!(
            Config::open(&path).unwrap_err(),
            ConfigError::NotAnObject { .. }
        ));
    }

    #[test]
    fn test_wrong_types_are_reported() {
        let dir = tempdir().unwrap();
        let path = write_config(
            dir.path(),
            r#"{"vid_format": 4, "ffmpeg_cmd_str": ["ffmpeg", 1], "flask_port": 70000}"#,
        );
        let config = Config::open(&path).unwrap();
        assert_eq!(config.get_str_or(KEY_VID_FORMAT, "mp4"), "mp4");
        assert!(matches!(
            config.require_str_list(KEY_FFMPEG_CMD),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(config.port(), Err(ConfigError::InvalidValue { .. })));
        assert!(matches!(
            config.require_str_list(KEY_VID_OUTPUT_DIR),
            Err(ConfigError::MissingKey(_))
        ));
    }

    #[test]
    fn test_save_load_and_clear() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), r#"{"vid_format": "mp4"}"#);
        let mut config = Config::open(&path).unwrap();

        let mut values = config.values().clone();
        values.insert("vid_format".into(), json!("webm"));
        config.save(values).unwrap();
        assert_eq!(config.get_str_or(KEY_VID_FORMAT, ""), "webm");

        // A manual edit on disk shows up after a reload.
        fs::write(&path, r#"{"vid_format": "mkv"}"#).unwrap();
        config.load().unwrap();
        assert_eq!(config.get_str_or(KEY_VID_FORMAT, ""), "mkv");

        config.clear().unwrap();
        assert!(config.values().is_empty());
        assert_eq!(Config::open(&path).unwrap().values().len(), 0);
    }

    #[test]
    fn test_update_does_not_touch_disk() {
        let dir = tempdir().unwrap();
        let path = write_config(dir.path(), r#"{"vid_format": "mp4"}"#);
        let mut config = Config::open(&path).unwrap();

        let mut extra = Map::new();
        extra.insert("vid_format".into(), json!("avi"));
        config.update(extra);
        assert_eq!(config.get_str_or(KEY_VID_FORMAT, ""), "avi");

        config.load().unwrap();
        assert_eq!(config.get_str_or(KEY_VID_FORMAT, ""), "mp4");
    }
}
