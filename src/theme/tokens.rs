//! design token maps
use {
    crate::{
        theme::{ResolvedTheme, TokenCategory},
        tokens,
    },
    std::collections::BTreeMap,
};

/// token key → css literal
pub type TokenMap = BTreeMap<String, String>;

/// every token category, with optional dark-scheme overrides
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenSet {
    /// values used for the light scheme (and as the fallback for dark)
    base: BTreeMap<TokenCategory, TokenMap>,
    /// values that replace `base` entries when the dark scheme is active
    dark: BTreeMap<TokenCategory, TokenMap>,
}

impl TokenSet {
    /// make an empty token set
    pub fn new() -> Self {
        Self::default()
    }

    /// set the base values of a category
    pub fn with(mut self, category: TokenCategory, values: TokenMap) -> Self {
        self.base.entry(category).or_default().extend(values);
        self
    }

    /// set the dark overrides of a category
    pub fn with_dark(mut self, category: TokenCategory, values: TokenMap) -> Self {
        self.dark.entry(category).or_default().extend(values);
        self
    }

    /// layer another token set on top of this one
    pub fn merged(mut self, other: TokenSet) -> Self {
        for (category, values) in other.base {
            self.base.entry(category).or_default().extend(values);
        }
        for (category, values) in other.dark {
            self.dark.entry(category).or_default().extend(values);
        }
        self
    }

    /// the values of one category for a scheme
    pub fn resolve(&self, category: TokenCategory, theme: ResolvedTheme) -> TokenMap {
        let mut values = self.base.get(&category).cloned().unwrap_or_default();

        if theme == ResolvedTheme::Dark
            && let Some(dark) = self.dark.get(&category)
        {
            values.extend(dark.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        values
    }

    /// look a single token up
    pub fn get(&self, key: &str, theme: ResolvedTheme) -> Option<&str> {
        let dark = (theme == ResolvedTheme::Dark)
            .then(|| self.dark.values().find_map(|m| m.get(key)))
            .flatten();

        dark.or_else(|| self.base.values().find_map(|m| m.get(key)))
            .map(String::as_str)
    }

    /// every key across both schemes
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let mut keys: Vec<&str> = self
            .base
            .values()
            .chain(self.dark.values())
            .flat_map(|m| m.keys().map(String::as_str))
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys.into_iter()
    }

    /// whether the set ships any dark-scheme values
    pub fn has_dark_variant(&self) -> bool {
        self.dark.values().any(|m| !m.is_empty())
    }

    /// a `var(--key, fallback)` reference with the light value as the fallback
    ///
    /// useful when markup is rendered before any variables have been written
    pub fn var_ref(&self, key: &str) -> Option<String> {
        self.get(key, ResolvedTheme::Light)
            .map(|fallback| format!("var(--{}, {})", key, fallback))
    }

    /// convert the tokens to a css rule
    pub fn to_css_vars(&self, selector: &str, theme: ResolvedTheme) -> String {
        let mut vars = format!("{} {{\n", selector);

        for category in TokenCategory::ALL {
            for (key, value) in self.resolve(category, theme) {
                vars.push_str(&format!("  --{}: {};\n", key, value));
            }
        }

        vars.push_str("}\n");
        vars
    }

    /// the built-in layera token catalogue
    pub fn defaults() -> Self {
        TokenSet::new()
            .with(
                TokenCategory::Spacing,
                tokens! {
                    "spacing-xs" => "4px",
                    "spacing-sm" => "8px",
                    "spacing-md" => "16px",
                    "spacing-lg" => "24px",
                    "spacing-xl" => "32px",
                    "spacing-2xl" => "48px",
                },
            )
            .with(
                TokenCategory::Color,
                tokens! {
                    "color-primary" => "#2563eb",
                    "color-primary-hover" => "#1d4ed8",
                    "color-secondary" => "#64748b",
                    "color-success" => "#16a34a",
                    "color-warning" => "#d97706",
                    "color-danger" => "#dc2626",
                    "color-info" => "#0891b2",
                    "color-background" => "#ffffff",
                    "color-surface" => "#f8fafc",
                    "color-text-primary" => "#0f172a",
                    "color-text-secondary" => "#475569",
                    "color-border" => "rgba(15, 23, 42, 0.12)",
                    "color-border-strong" => "rgba(15, 23, 42, 0.24)",
                    "color-focus-ring" => "rgba(37, 99, 235, 0.4)",
                },
            )
            .with_dark(
                TokenCategory::Color,
                tokens! {
                    "color-primary" => "#3b82f6",
                    "color-primary-hover" => "#60a5fa",
                    "color-background" => "#0b1120",
                    "color-surface" => "#111827",
                    "color-text-primary" => "#f1f5f9",
                    "color-text-secondary" => "#94a3b8",
                    "color-border" => "rgba(241, 245, 249, 0.12)",
                    "color-border-strong" => "rgba(241, 245, 249, 0.24)",
                },
            )
            .with(
                TokenCategory::Elevation,
                tokens! {
                    "shadow-sm" => "0 1px 2px rgba(15, 23, 42, 0.06)",
                    "shadow-md" => "0 4px 12px rgba(15, 23, 42, 0.10)",
                    "shadow-lg" => "0 12px 32px rgba(15, 23, 42, 0.16)",
                },
            )
            .with_dark(
                TokenCategory::Elevation,
                tokens! {
                    "shadow-sm" => "0 1px 2px rgba(0, 0, 0, 0.40)",
                    "shadow-md" => "0 4px 12px rgba(0, 0, 0, 0.50)",
                    "shadow-lg" => "0 12px 32px rgba(0, 0, 0, 0.60)",
                },
            )
            .with(
                TokenCategory::Motion,
                tokens! {
                    "motion-duration-fast" => "120ms",
                    "motion-duration-normal" => "200ms",
                    "motion-duration-slow" => "320ms",
                    "motion-easing-standard" => "cubic-bezier(0.2, 0, 0, 1)",
                },
            )
            .with(
                TokenCategory::Typography,
                tokens! {
                    "font-family-base" => "Inter, system-ui, sans-serif",
                    "font-family-mono" => "'JetBrains Mono', ui-monospace, monospace",
                    "font-size-sm" => "0.875rem",
                    "font-size-md" => "1rem",
                    "font-size-lg" => "1.25rem",
                    "font-weight-regular" => "400",
                    "font-weight-bold" => "600",
                    "line-height-base" => "1.5",
                },
            )
            .with(
                TokenCategory::BorderRadius,
                tokens! {
                    "radius-sm" => "4px",
                    "radius-md" => "8px",
                    "radius-lg" => "12px",
                    "radius-full" => "9999px",
                },
            )
            .with(
                TokenCategory::ZIndex,
                tokens! {
                    "z-dropdown" => "1000",
                    "z-sticky" => "1100",
                    "z-modal" => "1300",
                    "z-toast" => "1400",
                },
            )
            .with(
                TokenCategory::Component,
                tokens! {
                    "button-height-sm" => "32px",
                    "button-height-md" => "40px",
                    "button-height-lg" => "48px",
                    "button-padding-x" => "16px",
                    "card-padding" => "24px",
                    "card-border" => "1px solid rgba(15, 23, 42, 0.08)",
                    "modal-width-md" => "560px",
                    "modal-backdrop" => "rgba(15, 23, 42, 0.5)",
                    "table-row-height" => "44px",
                    "table-border-color" => "rgba(15, 23, 42, 0.08)",
                    "header-height" => "64px",
                },
            )
            .with_dark(
                TokenCategory::Component,
                tokens! {
                    "card-border" => "1px solid rgba(241, 245, 249, 0.08)",
                    "modal-backdrop" => "rgba(0, 0, 0, 0.7)",
                    "table-border-color" => "rgba(241, 245, 249, 0.08)",
                },
            )
    }
}
