use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use stimkit_core::{Error, Key, WindowConfig};

fn default_escape_key() -> Option<Key> {
    Some(Key::escape())
}

/// Everything a [`Paradigm`](crate::Paradigm) needs besides its stimuli.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParadigmConfig {
    #[serde(default)]
    pub window: WindowConfig,
    /// Reserved key that aborts playback from any stimulus. `None` disables
    /// the quit check.
    #[serde(default = "default_escape_key")]
    pub escape_key: Option<Key>,
    #[serde(default)]
    pub data: Option<DataConfig>,
}

impl Default for ParadigmConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            escape_key: default_escape_key(),
            data: None,
        }
    }
}

impl ParadigmConfig {
    pub fn with_data(mut self, data: DataConfig) -> Self {
        self.data = Some(data);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DataFormat {
    #[default]
    Csv,
    Json,
}

impl DataFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            DataFormat::Csv => "csv",
            DataFormat::Json => "json",
        }
    }
}

impl FromStr for DataFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(DataFormat::Csv),
            "json" => Ok(DataFormat::Json),
            _ => Err(Error::UnsupportedFormat(s.to_owned())),
        }
    }
}

impl TryFrom<String> for DataFormat {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Error> {
        s.parse()
    }
}

impl From<DataFormat> for String {
    fn from(format: DataFormat) -> Self {
        format.extension().to_owned()
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

fn default_destination() -> PathBuf {
    PathBuf::from("data.csv")
}

/// Where and how collected rows are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default)]
    pub format: DataFormat,
    #[serde(default = "default_destination")]
    pub destination: PathBuf,
    /// Add a timestamp to the file name so repeated sessions never overwrite
    /// each other.
    #[serde(default)]
    pub unique: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            format: DataFormat::Csv,
            destination: default_destination(),
            unique: false,
        }
    }
}

impl DataConfig {
    pub fn new(format: DataFormat, destination: impl Into<PathBuf>) -> Self {
        Self {
            format,
            destination: destination.into(),
            unique: false,
        }
    }

    /// The path rows are written to, stamped with the current time when
    /// `unique` is set.
    pub fn resolved_destination(&self) -> PathBuf {
        if !self.unique {
            return self.destination.clone();
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        stamped(&self.destination, &format!("{}{:06}", now.as_secs(), now.subsec_micros()))
    }
}

fn stamped(path: &Path, stamp: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{stem}-{stamp}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{stamp}"),
    };
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_are_case_insensitive() {
        assert_eq!("CSV".parse::<DataFormat>().unwrap(), DataFormat::Csv);
        assert_eq!(" json ".parse::<DataFormat>().unwrap(), DataFormat::Json);
        let err = "xlsx".parse::<DataFormat>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(f) if f == "xlsx"));
    }

    #[test]
    fn unknown_formats_fail_deserialization() {
        let res = serde_json::from_str::<DataConfig>(r#"{"format": "yaml"}"#);
        assert!(res.unwrap_err().to_string().contains("yaml"));
    }

    #[test]
    fn config_defaults_fill_in() {
        let cfg: ParadigmConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, ParadigmConfig::default());
        assert_eq!(cfg.escape_key, Some(Key::escape()));

        let cfg: ParadigmConfig = serde_json::from_str(r#"{"escape_key": null}"#).unwrap();
        assert_eq!(cfg.escape_key, None);
    }

    #[test]
    fn unique_destinations_keep_the_extension() {
        assert_eq!(
            stamped(Path::new("out/data.csv"), "1700000000123456"),
            PathBuf::from("out/data-1700000000123456.csv")
        );
        assert_eq!(stamped(Path::new("rows"), "42"), PathBuf::from("rows-42"));

        let cfg = DataConfig {
            unique: true,
            ..DataConfig::default()
        };
        let name = cfg.resolved_destination();
        let name = name.to_string_lossy();
        assert!(name.starts_with("data-") && name.ends_with(".csv"));
        assert_ne!(name, "data.csv");
    }
}
