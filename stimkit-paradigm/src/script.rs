use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use stimkit_core::{Backend, Error, Result};
use tracing::debug;

use crate::config::ParadigmConfig;
use crate::descriptor::StimulusDescriptor;
use crate::paradigm::Paradigm;

/// A paradigm described as JSON:
///
/// ```json
/// {
///   "config": {"window": {"size": [1024, 768]}, "data": {"format": "csv"}},
///   "stimuli": [{"Text": ["Hello", 1.0]}, {"WaitForKey": [["c"]]}]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub config: ParadigmConfig,
    pub stimuli: Vec<StimulusDescriptor>,
}

impl Script {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let script = Self::parse(&text)?;
        debug!(path = %path.display(), stimuli = script.stimuli.len(), "loaded script");
        Ok(script)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let script: Script = serde_json::from_str(text)?;
        script.validate()?;
        Ok(script)
    }

    /// Check every stimulus, naming the first bad one by position.
    pub fn validate(&self) -> Result<()> {
        for (index, stimulus) in self.stimuli.iter().enumerate() {
            stimulus.validate().map_err(|err| match err {
                Error::InvalidParams(msg) => {
                    Error::InvalidParams(format!("stimulus {index} ({}): {msg}", stimulus.kind()))
                }
                other => other,
            })?;
        }
        Ok(())
    }

    pub fn into_paradigm<B: Backend>(self, backend: B) -> Result<Paradigm<B>> {
        let mut paradigm = Paradigm::new(backend, self.config);
        paradigm.add_stimuli(self.stimuli)?;
        Ok(paradigm)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataFormat;
    use stimkit_core::WindowSize;

    #[test]
    fn parses_config_and_stimuli() {
        let script = Script::parse(
            r#"{
                "config": {"window": {"size": "fullscr"}, "data": {"format": "JSON"}},
                "stimuli": [{"Text": ["Hi", 5.0]}, {"WaitForKey": {"keys": ["c"]}}]
            }"#,
        )
        .unwrap();
        assert_eq!(script.config.window.size, WindowSize::FullScreen);
        assert_eq!(script.config.data.unwrap().format, DataFormat::Json);
        let kinds: Vec<&str> = script.stimuli.iter().map(|s| s.kind()).collect();
        assert_eq!(kinds, ["text", "wait_for_key"]);
    }

    #[test]
    fn config_is_optional() {
        let script = Script::parse(r#"{"stimuli": [{"Pause": [1]}]}"#).unwrap();
        assert_eq!(script.config, ParadigmConfig::default());
    }

    #[test]
    fn bad_parameters_name_the_stimulus() {
        let err = Script::parse(r#"{"stimuli": [{"Pause": [1]}, {"Pause": [-2]}]}"#).unwrap_err();
        assert!(err.to_string().contains("stimulus 1 (pause)"), "{err}");
    }

    #[test]
    fn unsupported_data_formats_are_rejected() {
        let err = Script::parse(r#"{"config": {"data": {"format": "xlsx"}}, "stimuli": []}"#)
            .unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }
}
