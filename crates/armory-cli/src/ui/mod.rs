//! UI Module - terminal output for armory commands
//!
//! - [`theme`] - Colors, icons, and column widths
//! - [`output`] - Messages and prompts; the [`armory_core::Reporter`] used by commands
//! - [`table`] - Package, bundle and armory tables

pub mod output;
pub mod table;
pub mod theme;

pub use output::Output;
pub use theme::Theme;
