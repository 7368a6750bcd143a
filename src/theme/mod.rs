//! theming stuff: design tokens, presets and the engine that writes them out
pub mod color;
pub mod engine;
pub mod live;
pub mod media;
pub mod presets;
pub mod registry;
pub mod sink;
pub mod storage;
pub mod tokens;

use {
    schemars::JsonSchema,
    serde::{Deserialize, Serialize},
    std::{fmt, str::FromStr},
};

/// the theme a user picked
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ThemeChoice {
    /// always light
    Light,
    /// always dark
    Dark,
    /// follow the OS preference
    #[default]
    System,
}

/// the concrete theme that ends up applied
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedTheme {
    /// light variant
    #[default]
    Light,
    /// dark variant
    Dark,
}

impl ThemeChoice {
    /// every choice, in menu order
    pub const ALL: [ThemeChoice; 3] = [ThemeChoice::Light, ThemeChoice::Dark, ThemeChoice::System];

    /// resolve the choice against the OS preference
    pub fn resolve(self, system: ResolvedTheme) -> ResolvedTheme {
        match self {
            ThemeChoice::Light => ResolvedTheme::Light,
            ThemeChoice::Dark => ResolvedTheme::Dark,
            ThemeChoice::System => system,
        }
    }

    /// the lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeChoice::Light => "light",
            ThemeChoice::Dark => "dark",
            ThemeChoice::System => "system",
        }
    }
}

impl fmt::Display for ThemeChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ThemeChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(ThemeChoice::Light),
            "dark" => Ok(ThemeChoice::Dark),
            "system" | "auto" => Ok(ThemeChoice::System),
            other => Err(format!("unknown theme '{other}' (expected light, dark or system)")),
        }
    }
}

impl ResolvedTheme {
    /// the lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            ResolvedTheme::Light => "light",
            ResolvedTheme::Dark => "dark",
        }
    }
}

impl fmt::Display for ResolvedTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// a group of design tokens that gets written out together
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum TokenCategory {
    /// spacing scale
    Spacing,
    /// color palette
    Color,
    /// shadows
    Elevation,
    /// durations and easings
    Motion,
    /// font families, sizes and weights
    Typography,
    /// corner radii
    BorderRadius,
    /// stacking order
    ZIndex,
    /// per-component tokens
    Component,
}

impl TokenCategory {
    /// every category, in write order
    pub const ALL: [TokenCategory; 8] = [
        TokenCategory::Spacing,
        TokenCategory::Color,
        TokenCategory::Elevation,
        TokenCategory::Motion,
        TokenCategory::Typography,
        TokenCategory::BorderRadius,
        TokenCategory::ZIndex,
        TokenCategory::Component,
    ];

    /// categories whose values differ between light and dark
    pub const SCHEME_DEPENDENT: [TokenCategory; 3] = [
        TokenCategory::Color,
        TokenCategory::Elevation,
        TokenCategory::Component,
    ];
}
