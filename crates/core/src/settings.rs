use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::HuntConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Case-insensitive regex matched against window titles.
    pub window_pattern: String,
    pub last_window_title: Option<String>,
    pub hunt: HuntConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            window_pattern: ".".into(),
            last_window_title: None,
            hunt: HuntConfig::default(),
        }
    }
}

impl Settings {
    /// Missing file yields defaults; a present but malformed file is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let text = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
        };
        let settings: Settings =
            serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        settings.hunt.validate().with_context(|| format!("validating {}", path.display()))?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            let _ = std::fs::write(path, json);
        }
    }
}
