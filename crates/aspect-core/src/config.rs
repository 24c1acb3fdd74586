use crate::error::{AspectError, Result};
use crate::sink::{SharedSink, StdoutSink};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Serializable aspect settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AspectSettings {
    /// Line marker selecting precondition declarations
    pub precondition_marker: String,

    /// Line marker selecting postcondition declarations
    pub postcondition_marker: String,

    /// `strftime` format used by the timestamp aspect
    pub timestamp_format: String,
}

impl Default for AspectSettings {
    fn default() -> Self {
        Self {
            precondition_marker: "@Precondition".to_string(),
            postcondition_marker: "@Postcondition".to_string(),
            timestamp_format: "%Y-%m-%d %H:%M:%S%.6f".to_string(),
        }
    }
}

impl AspectSettings {
    /// Parse settings from TOML; missing keys take defaults
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text)
            .map_err(|e| AspectError::configuration(format!("invalid settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            AspectError::configuration(format!("cannot read settings {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        for (field, marker) in [
            ("precondition_marker", &self.precondition_marker),
            ("postcondition_marker", &self.postcondition_marker),
        ] {
            if marker.is_empty() {
                return Err(AspectError::configuration(format!("{field} must not be empty")));
            }
            if marker.chars().any(char::is_whitespace) {
                return Err(AspectError::configuration(format!(
                    "{field} must be a single token, got {marker:?}"
                )));
            }
        }

        if self.precondition_marker == self.postcondition_marker {
            return Err(AspectError::configuration(
                "precondition_marker and postcondition_marker must differ",
            ));
        }

        if StrftimeItems::new(&self.timestamp_format).any(|item| matches!(item, Item::Error)) {
            return Err(AspectError::configuration(format!(
                "invalid timestamp_format {:?}",
                self.timestamp_format
            )));
        }

        Ok(())
    }
}

/// Runtime configuration handed to every aspect at wrap time
#[derive(Clone)]
pub struct AspectConfig {
    pub settings: AspectSettings,
    pub sink: SharedSink,
}

impl AspectConfig {
    pub fn new(settings: AspectSettings, sink: SharedSink) -> Result<Self> {
        settings.validate()?;
        Ok(Self { settings, sink })
    }

    /// Default settings writing to the given sink
    pub fn with_sink(sink: SharedSink) -> Self {
        Self {
            settings: AspectSettings::default(),
            sink,
        }
    }
}

impl Default for AspectConfig {
    fn default() -> Self {
        Self::with_sink(Arc::new(StdoutSink))
    }
}

impl fmt::Debug for AspectConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AspectConfig")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
