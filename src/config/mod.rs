//! Configuration for Trellis.
//!
//! ## config.kdl - User preferences
//!
//! Located at:
//! - System: `~/.config/trellis/config.kdl` (or `$TL_CONFIG_DIR/config.kdl`)
//! - Data dir: `<data-dir>/config.kdl`
//!
//! Contains:
//! - `output-format` - "json" or "human"
//! - `default-view` - "table" or "cards"
//! - `card-width-threshold` - minimum width for two card columns
//! - `default-priority` - priority for new tasks (1-5)
//!
//! ## Precedence
//!
//! CLI flag > data-dir config > system config > defaults
//!
//! `tl config set` writes the data-dir file.
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    CONFIG_DIR_ENV, CONFIG_FILE, ConfigOverrides, Resolved, ResolvedConfig, ValueSource,
    data_config_path, resolve_config, resolve_config_from, system_config_path,
};
pub use schema::{CONFIG_KEYS, OutputFormat, TrellisConfig};
