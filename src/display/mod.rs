//! Rich terminal display utilities for CLI output.
//!
//! Provides styled tables, spinners, and a color theme that
//! respects `NO_COLOR`.

pub mod progress;
pub mod tables;
pub mod theme;

pub use progress::{create_spinner, with_spinner};
pub use tables::{TableBuilder, create_build_table, create_results_table, create_stats_table};
pub use theme::{THEME, Theme};
