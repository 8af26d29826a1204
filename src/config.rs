use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::image::{ImageSize, DEFAULT_HEIGHT_PX, DEFAULT_WIDTH_PX};
use crate::substitute::ForcedBoldSet;

pub const DEFAULT_IMAGE_PLACEHOLDER: &str = "{{SIGNATURE}}";

/// Engine configuration, passed explicitly into every entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Tokens whose values always render bold.
    pub forced_bold: ForcedBoldSet,
    /// Token marking the paragraph that receives the image.
    pub image_placeholder: String,
    pub image_width_px: u32,
    pub image_height_px: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            forced_bold: ["{{HORAIRE}}", "{{SALLE}}", "{{ADRESSE}}"]
                .into_iter()
                .collect(),
            image_placeholder: DEFAULT_IMAGE_PLACEHOLDER.to_string(),
            image_width_px: DEFAULT_WIDTH_PX,
            image_height_px: DEFAULT_HEIGHT_PX,
        }
    }
}

impl EngineConfig {
    pub fn image_size(&self) -> ImageSize {
        ImageSize::new(self.image_width_px, self.image_height_px)
    }

    pub fn with_forced_bold<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.forced_bold = tokens.into_iter().collect();
        self
    }

    pub fn with_image_placeholder(mut self, placeholder: &str) -> Self {
        self.image_placeholder = placeholder.to_string();
        self
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config: {0}")]
    Json(#[from] serde_json::Error),
}
