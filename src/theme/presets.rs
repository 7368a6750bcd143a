//! built-in token presets
use crate::{
    impl_preset,
    theme::{TokenCategory, tokens::TokenSet},
    tokens,
};

/// a named token preset
pub trait Preset {
    /// the full token set of the preset
    fn tokens() -> TokenSet;
    /// the display name of the preset
    fn name() -> &'static str;
}

impl_preset!(LayeraDefault, "Layera", TokenSet::defaults());

impl_preset!(Ocean, "Ocean", {
    TokenSet::defaults()
        .with(
            TokenCategory::Color,
            tokens! {
                "color-primary" => "#0e7490",
                "color-primary-hover" => "#155e75",
                "color-secondary" => "#0f766e",
                "color-info" => "#0284c7",
                "color-surface" => "#f0f9ff",
                "color-focus-ring" => "rgba(14, 116, 144, 0.4)",
            },
        )
        .with_dark(
            TokenCategory::Color,
            tokens! {
                "color-primary" => "#22d3ee",
                "color-primary-hover" => "#67e8f9",
                "color-background" => "#04111d",
                "color-surface" => "#0b2233",
            },
        )
});

impl_preset!(Forest, "Forest", {
    TokenSet::defaults()
        .with(
            TokenCategory::Color,
            tokens! {
                "color-primary" => "#15803d",
                "color-primary-hover" => "#166534",
                "color-secondary" => "#78716c",
                "color-surface" => "#f7fee7",
                "color-focus-ring" => "rgba(21, 128, 61, 0.4)",
            },
        )
        .with_dark(
            TokenCategory::Color,
            tokens! {
                "color-primary" => "#4ade80",
                "color-primary-hover" => "#86efac",
                "color-background" => "#0a140d",
                "color-surface" => "#132218",
            },
        )
        .with(
            TokenCategory::BorderRadius,
            tokens! {
                "radius-sm" => "2px",
                "radius-md" => "4px",
                "radius-lg" => "8px",
            },
        )
});

impl_preset!(Compact, "Compact", {
    TokenSet::defaults()
        .with(
            TokenCategory::Spacing,
            tokens! {
                "spacing-xs" => "2px",
                "spacing-sm" => "4px",
                "spacing-md" => "8px",
                "spacing-lg" => "16px",
                "spacing-xl" => "24px",
                "spacing-2xl" => "32px",
            },
        )
        .with(
            TokenCategory::Component,
            tokens! {
                "button-height-sm" => "24px",
                "button-height-md" => "32px",
                "button-height-lg" => "40px",
                "button-padding-x" => "12px",
                "card-padding" => "16px",
                "table-row-height" => "32px",
                "header-height" => "48px",
            },
        )
});
