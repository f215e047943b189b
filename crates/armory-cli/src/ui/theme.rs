//! UI Theme - colors, icons and column widths used by every command.

use crossterm::style::Color;

/// Default theme for armory output
#[derive(Debug, Clone, Default)]
pub struct Theme {
    /// Colors for different UI elements
    pub colors: ColorScheme,
    /// Status icons
    pub icons: Icons,
    /// Column widths
    pub layout: Layout,
}

/// Color scheme for UI elements
#[derive(Debug, Clone)]
pub struct ColorScheme {
    /// Package and command names
    pub package_name: Color,
    /// Armory names
    pub armory: Color,
    /// Version numbers
    pub version: Color,
    /// Secondary info (help text, URLs)
    pub secondary: Color,
    /// Success states
    pub success: Color,
    /// Warning states
    pub warning: Color,
    /// Error states
    pub error: Color,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            package_name: Color::Cyan,
            armory: Color::Magenta,
            version: Color::White,
            secondary: Color::DarkGrey,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
        }
    }
}

/// Status icons for different states
#[derive(Debug, Clone)]
pub struct Icons {
    /// Success/completed state (✓)
    pub success: &'static str,
    /// Error/failed state (✗)
    pub error: &'static str,
    /// Warning state (⚠)
    pub warning: &'static str,
    /// Info state (ℹ)
    pub info: &'static str,
    /// Question prompt (?)
    pub prompt: &'static str,
}

impl Default for Icons {
    fn default() -> Self {
        Self {
            success: "✓",
            error: "✗",
            warning: "⚠",
            info: "ℹ",
            prompt: "?",
        }
    }
}

/// Column widths for line-based listings
#[derive(Debug, Clone)]
pub struct Layout {
    /// Width allocated for package name column
    pub name_width: usize,
    /// Width allocated for version column
    pub version_width: usize,
    /// Width allocated for the alias/extension column
    pub kind_width: usize,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            name_width: 20,
            version_width: 12,
            kind_width: 10,
        }
    }
}
