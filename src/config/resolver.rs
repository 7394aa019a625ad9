//! Precedence resolution for configuration.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Data-dir config.kdl (`<data-dir>/config.kdl`)
//! 3. System config.kdl (`~/.config/trellis/config.kdl`)
//! 4. Built-in defaults

use std::path::{Path, PathBuf};

use crate::Result;
use crate::config::{OutputFormat, TrellisConfig};
use crate::models::DEFAULT_PRIORITY;
use crate::storage::get_data_dir;
use crate::views::{DEFAULT_CARD_WIDTH_THRESHOLD, ViewMode};

/// Environment variable overriding the system config directory.
pub const CONFIG_DIR_ENV: &str = "TL_CONFIG_DIR";

/// Config file name, shared by both levels.
pub const CONFIG_FILE: &str = "config.kdl";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from CLI flag
    CliFlag,
    /// Value from the data-dir config
    DataDir,
    /// Value from the system config
    System,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::DataDir => write!(f, "data-dir"),
            ValueSource::System => write!(f, "system"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone)]
pub struct Resolved<T> {
    pub value: T,
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub output_format: Resolved<OutputFormat>,
    pub default_view: Resolved<ViewMode>,
    pub card_width_threshold: Resolved<u16>,
    pub default_priority: Resolved<u8>,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            output_format: Resolved::new(OutputFormat::Json, ValueSource::Default),
            default_view: Resolved::new(ViewMode::Table, ValueSource::Default),
            card_width_threshold: Resolved::new(
                DEFAULT_CARD_WIDTH_THRESHOLD,
                ValueSource::Default,
            ),
            default_priority: Resolved::new(DEFAULT_PRIORITY, ValueSource::Default),
        }
    }
}

impl ResolvedConfig {
    pub fn output_format(&self) -> OutputFormat {
        self.output_format.value
    }

    pub fn default_view(&self) -> ViewMode {
        self.default_view.value
    }

    pub fn card_width_threshold(&self) -> u16 {
        self.card_width_threshold.value
    }

    pub fn default_priority(&self) -> u8 {
        self.default_priority.value
    }
}

/// CLI overrides for configuration resolution.
///
/// `default-priority` has no flag of its own: `task create --priority` sets
/// the task's priority directly.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub output_format: Option<OutputFormat>,
    pub default_view: Option<ViewMode>,
    pub card_width_threshold: Option<u16>,
}

impl ConfigOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    pub fn with_default_view(mut self, view: ViewMode) -> Self {
        self.default_view = Some(view);
        self
    }

    pub fn with_card_width_threshold(mut self, width: u16) -> Self {
        self.card_width_threshold = Some(width);
        self
    }
}

/// Location of the system config (`TL_CONFIG_DIR` > platform config dir).
pub fn system_config_path() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return Some(PathBuf::from(dir).join(CONFIG_FILE));
        }
    }
    dirs::config_dir().map(|dir| dir.join("trellis").join(CONFIG_FILE))
}

/// Location of the data-dir config.
pub fn data_config_path() -> Result<PathBuf> {
    Ok(get_data_dir()?.join(CONFIG_FILE))
}

/// Pick the highest-precedence value for one key.
fn pick<T: Copy>(cli: Option<T>, data: Option<T>, system: Option<T>, default: T) -> Resolved<T> {
    if let Some(value) = cli {
        Resolved::new(value, ValueSource::CliFlag)
    } else if let Some(value) = data {
        Resolved::new(value, ValueSource::DataDir)
    } else if let Some(value) = system {
        Resolved::new(value, ValueSource::System)
    } else {
        Resolved::new(default, ValueSource::Default)
    }
}

/// Resolve configuration from explicit file locations.
///
/// Either path may be absent; missing files count as empty configs.
pub fn resolve_config_from(
    system_path: Option<&Path>,
    data_path: Option<&Path>,
    overrides: &ConfigOverrides,
) -> Result<ResolvedConfig> {
    let system = match system_path {
        Some(path) => TrellisConfig::read(path)?,
        None => TrellisConfig::new(),
    };
    let data = match data_path {
        Some(path) => TrellisConfig::read(path)?,
        None => TrellisConfig::new(),
    };
    let defaults = ResolvedConfig::default();

    Ok(ResolvedConfig {
        output_format: pick(
            overrides.output_format,
            data.output_format,
            system.output_format,
            defaults.output_format.value,
        ),
        default_view: pick(
            overrides.default_view,
            data.default_view,
            system.default_view,
            defaults.default_view.value,
        ),
        card_width_threshold: pick(
            overrides.card_width_threshold.filter(|w| *w > 0),
            data.card_width_threshold,
            system.card_width_threshold,
            defaults.card_width_threshold.value,
        ),
        default_priority: pick(
            None,
            data.default_priority,
            system.default_priority,
            defaults.default_priority.value,
        ),
    })
}

/// Resolve configuration from the standard file locations.
pub fn resolve_config(overrides: &ConfigOverrides) -> Result<ResolvedConfig> {
    let system_path = system_config_path();
    let data_path = data_config_path()?;
    resolve_config_from(system_path.as_deref(), Some(&data_path), overrides)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, config: &TrellisConfig) -> PathBuf {
        let path = dir.path().join(name);
        config.write(&path).unwrap();
        path
    }

    #[test]
    fn test_resolve_config_defaults() {
        let config = resolve_config_from(None, None, &ConfigOverrides::default()).unwrap();

        assert_eq!(config.output_format(), OutputFormat::Json);
        assert_eq!(config.output_format.source, ValueSource::Default);
        assert_eq!(config.default_view(), ViewMode::Table);
        assert_eq!(config.card_width_threshold(), 140);
        assert_eq!(config.default_priority(), 3);
        assert_eq!(config.default_priority.source, ValueSource::Default);
    }

    #[test]
    fn test_data_dir_overrides_system() {
        let temp = TempDir::new().unwrap();
        let system = write(
            &temp,
            "system.kdl",
            &TrellisConfig {
                output_format: Some(OutputFormat::Human),
                default_view: Some(ViewMode::Cards),
                card_width_threshold: Some(100),
                default_priority: None,
            },
        );
        let data = write(
            &temp,
            "data.kdl",
            &TrellisConfig {
                default_view: Some(ViewMode::Table),
                default_priority: Some(5),
                ..TrellisConfig::new()
            },
        );

        let config =
            resolve_config_from(Some(&system), Some(&data), &ConfigOverrides::default()).unwrap();

        assert_eq!(config.output_format(), OutputFormat::Human);
        assert_eq!(config.output_format.source, ValueSource::System);
        assert_eq!(config.default_view(), ViewMode::Table);
        assert_eq!(config.default_view.source, ValueSource::DataDir);
        assert_eq!(config.card_width_threshold(), 100);
        assert_eq!(config.default_priority(), 5);
        assert_eq!(config.default_priority.source, ValueSource::DataDir);
    }

    #[test]
    fn test_cli_overrides_everything() {
        let temp = TempDir::new().unwrap();
        let data = write(
            &temp,
            "data.kdl",
            &TrellisConfig {
                output_format: Some(OutputFormat::Json),
                card_width_threshold: Some(80),
                ..TrellisConfig::new()
            },
        );
        let overrides = ConfigOverrides::new()
            .with_output_format(OutputFormat::Human)
            .with_default_view(ViewMode::Cards)
            .with_card_width_threshold(200);

        let config = resolve_config_from(None, Some(&data), &overrides).unwrap();

        assert_eq!(config.output_format(), OutputFormat::Human);
        assert_eq!(config.output_format.source, ValueSource::CliFlag);
        assert_eq!(config.default_view(), ViewMode::Cards);
        assert_eq!(config.card_width_threshold(), 200);
        assert_eq!(config.card_width_threshold.source, ValueSource::CliFlag);
        assert_eq!(config.default_priority.source, ValueSource::Default);
    }

    #[test]
    fn test_invalid_overrides_fall_through() {
        let overrides = ConfigOverrides::new().with_card_width_threshold(0);
        let config = resolve_config_from(None, None, &overrides).unwrap();
        assert_eq!(config.card_width_threshold.source, ValueSource::Default);
    }

    #[test]
    fn test_value_source_display() {
        assert_eq!(ValueSource::CliFlag.to_string(), "cli");
        assert_eq!(ValueSource::DataDir.to_string(), "data-dir");
        assert_eq!(ValueSource::System.to_string(), "system");
        assert_eq!(ValueSource::Default.to_string(), "default");
    }
}
