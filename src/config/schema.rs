//! KDL schema for config.kdl.

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::views::ViewMode;
use crate::{Error, Result};

/// Output format preference for CLI commands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JSON output (default, machine-readable)
    #[default]
    Json,
    /// Human-readable output
    Human,
}

impl OutputFormat {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "human" => Some(OutputFormat::Human),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Human => "human",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// User preferences stored in config.kdl.
///
/// # KDL Schema
///
/// ```kdl
/// output-format "human"        // or "json"
/// default-view "cards"         // or "table"
/// card-width-threshold 120
/// default-priority 4           // 1-5
/// ```
///
/// Values that fail to parse are ignored rather than rejected, so a typo in
/// one key never hides the rest of the file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrellisConfig {
    pub output_format: Option<OutputFormat>,

    /// View shown first by `tl tasks` and the TUI
    pub default_view: Option<ViewMode>,

    /// Minimum terminal width for a two-column card grid
    pub card_width_threshold: Option<u16>,

    /// Priority for new tasks when `--priority` is omitted (1-5)
    pub default_priority: Option<u8>,
}

/// Keys accepted by [`TrellisConfig::set`], as written in config.kdl.
pub const CONFIG_KEYS: [&str; 4] = [
    "output-format",
    "default-view",
    "card-width-threshold",
    "default-priority",
];

fn first_string<'a>(doc: &'a KdlDocument, key: &str) -> Option<&'a str> {
    doc.get(key)?.entries().first()?.value().as_string()
}

fn first_integer(doc: &KdlDocument, key: &str) -> Option<i128> {
    doc.get(key)?.entries().first()?.value().as_integer()
}

impl TrellisConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the config values.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if let Some(priority) = self.default_priority {
            if !(1..=5).contains(&priority) {
                return Err(format!("default-priority must be 1-5, got {}", priority));
            }
        }
        if self.card_width_threshold == Some(0) {
            return Err("card-width-threshold must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Parse config from a KDL document.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut config = Self::new();

        config.output_format = first_string(doc, "output-format").and_then(OutputFormat::parse);
        config.default_view = first_string(doc, "default-view").and_then(ViewMode::parse);

        if let Some(width) = first_integer(doc, "card-width-threshold") {
            if let Ok(width) = u16::try_from(width) {
                if width > 0 {
                    config.card_width_threshold = Some(width);
                }
            }
        }

        if let Some(priority) = first_integer(doc, "default-priority") {
            if (1..=5).contains(&priority) {
                config.default_priority = Some(priority as u8);
            }
        }

        config
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        if let Some(format) = self.output_format {
            let mut node = KdlNode::new("output-format");
            node.push(KdlEntry::new(KdlValue::String(format.as_str().to_string())));
            doc.nodes_mut().push(node);
        }

        if let Some(view) = self.default_view {
            let mut node = KdlNode::new("default-view");
            node.push(KdlEntry::new(KdlValue::String(view.as_str().to_string())));
            doc.nodes_mut().push(node);
        }

        if let Some(width) = self.card_width_threshold {
            let mut node = KdlNode::new("card-width-threshold");
            node.push(KdlEntry::new(KdlValue::Integer(width as i128)));
            doc.nodes_mut().push(node);
        }

        if let Some(priority) = self.default_priority {
            let mut node = KdlNode::new("default-priority");
            node.push(KdlEntry::new(KdlValue::Integer(priority as i128)));
            doc.nodes_mut().push(node);
        }

        doc
    }

    /// Set one key from its string form, rejecting unknown keys and values
    /// that would not survive a read back.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = || Error::Config(format!("invalid value '{}' for {}", value, key));
        match key {
            "output-format" => {
                self.output_format = Some(OutputFormat::parse(value).ok_or_else(invalid)?);
            }
            "default-view" => {
                self.default_view = Some(ViewMode::parse(value).ok_or_else(invalid)?);
            }
            "card-width-threshold" => {
                self.card_width_threshold = Some(value.trim().parse().map_err(|_| invalid())?);
            }
            "default-priority" => {
                self.default_priority = Some(value.trim().parse().map_err(|_| invalid())?);
            }
            _ => {
                return Err(Error::Config(format!(
                    "unknown config key '{}', expected one of: {}",
                    key,
                    CONFIG_KEYS.join(", ")
                )));
            }
        }
        self.validate().map_err(Error::Config)
    }

    /// Merge another config into this one.
    /// Values from `other` override values in `self` if they are Some.
    pub fn merge(&mut self, other: &TrellisConfig) {
        if other.output_format.is_some() {
            self.output_format = other.output_format;
        }
        if other.default_view.is_some() {
            self.default_view = other.default_view;
        }
        if other.card_width_threshold.is_some() {
            self.card_width_threshold = other.card_width_threshold;
        }
        if other.default_priority.is_some() {
            self.default_priority = other.default_priority;
        }
    }

    /// Read a config file. A missing file is an empty config.
    pub fn read(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let text = fs::read_to_string(path)?;
        let doc: KdlDocument = text
            .parse()
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Ok(Self::from_kdl(&doc))
    }

    /// Write the config file, creating parent directories.
    pub fn write(&self, path: &Path) -> Result<()> {
        self.validate().map_err(Error::Config)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_kdl().to_string())?;
        Ok(())
    }
}
