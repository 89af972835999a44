//! Kanagawa Dragon theme module.
//!
//! Low-contrast, warm, dark palette. Job status colours are shared by the map
//! markers and the timeline bars so both views read the same way.

use ratatui::style::Color;

use crate::markers::MarkerColor;

/// Kanagawa Dragon color palette
pub mod colors {
    use super::Color;

    // === Background Colors ===
    /// Dragon Black - Primary background
    pub const BG_DARK: Color = Color::Rgb(0x18, 0x16, 0x16);
    /// Slightly lighter background for panels
    pub const BG_MEDIUM: Color = Color::Rgb(0x1D, 0x1C, 0x19);
    /// Background for selected rows
    pub const BG_HIGHLIGHT: Color = Color::Rgb(0x28, 0x27, 0x27);
    /// Background behind overlays
    pub const BG_DIM: Color = Color::Rgb(0x12, 0x12, 0x12);

    // === Foreground Colors ===
    /// Old White - Primary text color
    pub const FG_PRIMARY: Color = Color::Rgb(0xC5, 0xC9, 0xC5);
    pub const FG_DIM: Color = Color::Rgb(0x72, 0x71, 0x69);
    pub const FG_HINT: Color = Color::Rgb(0x54, 0x54, 0x54);

    // === Accent Colors ===
    pub const RED: Color = Color::Rgb(0xC4, 0x74, 0x6E);
    pub const GREEN: Color = Color::Rgb(0x8A, 0x9A, 0x7B);
    /// Carp Yellow
    pub const YELLOW: Color = Color::Rgb(0xC4, 0xB2, 0x8A);
    pub const ORANGE: Color = Color::Rgb(0xB6, 0x92, 0x7B);
    /// Dragon Blue
    pub const BLUE: Color = Color::Rgb(0x8B, 0xA4, 0xB0);
    pub const PURPLE: Color = Color::Rgb(0x95, 0x7F, 0xB8);

    // === UI Element Colors ===
    /// Wall Gray - For borders and separators
    pub const BORDER: Color = Color::Rgb(0x72, 0x71, 0x69);
    pub const BORDER_DIM: Color = Color::Rgb(0x3A, 0x3A, 0x3A);
    /// Focused panel border
    pub const BORDER_ACCENT: Color = Color::Rgb(0x8B, 0xA4, 0xB0);

    // === Status Colors ===
    pub const STATUS_CONNECTED: Color = GREEN;
    pub const STATUS_DISCONNECTED: Color = RED;
    pub const STATUS_PENDING: Color = YELLOW;

    // === Map ===
    /// Coastlines and borders under the markers
    pub const MAP_LAND: Color = Color::Rgb(0x3A, 0x3A, 0x3A);
}

/// Display colour for a job status class
pub fn marker_color(color: MarkerColor) -> Color {
    match color {
        MarkerColor::Blue => colors::BLUE,
        MarkerColor::Amber => colors::ORANGE,
        MarkerColor::Green => colors::GREEN,
        MarkerColor::Red => colors::RED,
        MarkerColor::Gray => colors::FG_DIM,
    }
}

/// Semantic styling helpers
pub mod styles {
    use super::colors;
    use ratatui::style::{Modifier, Style};

    pub fn text() -> Style {
        Style::default().fg(colors::FG_PRIMARY)
    }

    pub fn text_dim() -> Style {
        Style::default().fg(colors::FG_DIM)
    }

    pub fn text_hint() -> Style {
        Style::default().fg(colors::FG_HINT)
    }

    pub fn success() -> Style {
        Style::default().fg(colors::GREEN)
    }

    pub fn error() -> Style {
        Style::default().fg(colors::RED)
    }

    pub fn warning() -> Style {
        Style::default().fg(colors::YELLOW)
    }

    pub fn info() -> Style {
        Style::default().fg(colors::BLUE)
    }

    /// Style for selected/highlighted items
    pub fn selected() -> Style {
        Style::default()
            .fg(colors::BG_DARK)
            .bg(colors::BLUE)
            .add_modifier(Modifier::BOLD)
    }

    /// Row that is active but not under the cursor (e.g. the current filter)
    pub fn active() -> Style {
        Style::default()
            .fg(colors::YELLOW)
            .bg(colors::BG_HIGHLIGHT)
    }

    pub fn border_focused() -> Style {
        Style::default().fg(colors::BORDER_ACCENT)
    }

    pub fn border() -> Style {
        Style::default().fg(colors::BORDER)
    }

    pub fn border_dim() -> Style {
        Style::default().fg(colors::BORDER_DIM)
    }

    pub fn title() -> Style {
        Style::default()
            .fg(colors::FG_PRIMARY)
            .add_modifier(Modifier::BOLD)
    }

    /// Style for accent titles (headers, focused panels)
    pub fn title_accent() -> Style {
        Style::default()
            .fg(colors::BLUE)
            .add_modifier(Modifier::BOLD)
    }

    /// Search box while typing
    pub fn input_focused() -> Style {
        Style::default()
            .fg(colors::FG_PRIMARY)
            .bg(colors::BG_HIGHLIGHT)
    }

    /// Style for modal content background
    pub fn modal_content_bg() -> Style {
        Style::default().bg(colors::BG_MEDIUM)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_colors_are_distinct() {
        let all = [
            MarkerColor::Blue,
            MarkerColor::Amber,
            MarkerColor::Green,
            MarkerColor::Red,
            MarkerColor::Gray,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(marker_color(*a), marker_color(*b));
            }
        }
    }
}
