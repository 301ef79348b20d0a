use crate::errors::ConfigError;
use serde::Deserialize;
use std::path::Path;

/// Which frames get their locals fetched on every stop.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum FramesWithLocals {
    #[default]
    All,
    /// Only the currently executing frame.
    Innermost,
}

/// Settings of an observer, usually embedded in a launch configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ObserverConfig {
    /// Thread to inspect. Defaults to the stopped thread, or the first thread if the adapter
    /// doesn't say which one stopped.
    pub thread_id: Option<i64>,
    /// Maximum number of frames to request. `None` and `0` both mean all frames.
    pub max_frames: Option<usize>,
    pub frames_with_locals: FramesWithLocals,
    /// Case-insensitive part of the name of the scope holding the locals.
    pub locals_scope_hint: String,
    /// Shown for variables the adapter reports without a value.
    pub missing_value_placeholder: String,
    /// Evaluated in the innermost frame on every stop and tracked like locals.
    pub watch_expressions: Vec<String>,
    pub log_level: String,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            thread_id: None,
            max_frames: None,
            frames_with_locals: FramesWithLocals::default(),
            locals_scope_hint: "local".to_string(),
            missing_value_placeholder: String::new(),
            watch_expressions: vec![],
            log_level: "info".to_string(),
        }
    }
}

impl ObserverConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.locals_scope_hint.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "localsScopeHint",
                reason: "must not be empty".to_string(),
            });
        }
        if let Some(index) = self.watch_expressions.iter().position(|it| it.is_empty()) {
            return Err(ConfigError::InvalidValue {
                key: "watchExpressions",
                reason: format!("expression {index} is empty"),
            });
        }
        Ok(())
    }

    /// The `levels` argument for `stackTrace`.
    pub fn stack_levels(&self) -> Option<usize> {
        self.max_frames.filter(|it| *it > 0)
    }
}
