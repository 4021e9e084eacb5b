//! Colors, spacing and container styles shared by the viewer.

use iced::widget::container;
use iced::{theme, Border, Color, Theme};

pub struct Palette;

impl Palette {
    pub const PRIMARY: Color = Color { r: 0.25, g: 0.32, b: 0.71, a: 1.0 }; // Indigo 700
    pub const SURFACE: Color = Color { r: 0.98, g: 0.98, b: 0.98, a: 1.0 };
    pub const ON_SURFACE: Color = Color { r: 0.1, g: 0.1, b: 0.1, a: 1.0 };
    pub const ERROR: Color = Color { r: 0.80, g: 0.0, b: 0.0, a: 1.0 };
    pub const ERROR_SURFACE: Color = Color { r: 1.0, g: 0.92, b: 0.92, a: 1.0 };
    pub const SELECTED: Color = Color { r: 0.85, g: 0.88, b: 0.97, a: 1.0 };

    pub const SPACING: u16 = 16;
}

/// Outlined surface used for the tables and the detail pane.
struct Card;

impl container::StyleSheet for Card {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> container::Appearance {
        container::Appearance {
            background: Some(Palette::SURFACE.into()),
            text_color: Some(Palette::ON_SURFACE),
            border: Border {
                color: Palette::PRIMARY,
                width: 1.0,
                radius: 4.0.into(),
            },
            shadow: Default::default(),
        }
    }
}

struct ErrorBanner;

impl container::StyleSheet for ErrorBanner {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> container::Appearance {
        container::Appearance {
            background: Some(Palette::ERROR_SURFACE.into()),
            text_color: Some(Palette::ERROR),
            border: Border {
                color: Palette::ERROR,
                width: 1.0,
                radius: 2.0.into(),
            },
            shadow: Default::default(),
        }
    }
}

struct SelectedRow;

impl container::StyleSheet for SelectedRow {
    type Style = Theme;

    fn appearance(&self, _style: &Self::Style) -> container::Appearance {
        container::Appearance {
            background: Some(Palette::SELECTED.into()),
            ..Default::default()
        }
    }
}

pub fn card() -> theme::Container {
    theme::Container::Custom(Box::new(Card))
}

pub fn error_banner() -> theme::Container {
    theme::Container::Custom(Box::new(ErrorBanner))
}

pub fn selected_row() -> theme::Container {
    theme::Container::Custom(Box::new(SelectedRow))
}
