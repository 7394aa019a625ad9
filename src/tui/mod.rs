//! Terminal User Interface for Trellis.
//!
//! A keyboard-driven front end over the same [`crate::engine::Workbench`]
//! pipeline the CLI uses. Both projections are kept current; only the active
//! one is drawn.

mod app;
mod views;

pub use app::run;
pub use views::Screen;
