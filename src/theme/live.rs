//! live variable updates scoped to a component family
//!
//! these bypass the frame batching: a color picker drag wants feedback on the very next
//! paint. callers are expected to throttle their own updates.
use {
    crate::{
        error::{LayeraError, Result},
        theme::{color::is_color, engine::ThemeEngine},
    },
    serde::{Deserialize, Serialize},
    std::{collections::BTreeMap, fmt, str::FromStr},
    tracing::{debug, trace},
};

/// the component family live updates apply to
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ComponentTarget {
    /// the global variables
    #[default]
    All,
    /// buttons
    Buttons,
    /// cards
    Cards,
    /// modals
    Modals,
    /// tables
    Tables,
    /// headers
    Headers,
}

impl ComponentTarget {
    /// every target
    pub const ALL: [ComponentTarget; 6] = [
        ComponentTarget::All,
        ComponentTarget::Buttons,
        ComponentTarget::Cards,
        ComponentTarget::Modals,
        ComponentTarget::Tables,
        ComponentTarget::Headers,
    ];

    /// the variable prefix of the family, `None` for the global scope
    pub fn prefix(self) -> Option<&'static str> {
        match self {
            ComponentTarget::All => None,
            ComponentTarget::Buttons => Some("button"),
            ComponentTarget::Cards => Some("card"),
            ComponentTarget::Modals => Some("modal"),
            ComponentTarget::Tables => Some("table"),
            ComponentTarget::Headers => Some("header"),
        }
    }

    /// the lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentTarget::All => "all",
            ComponentTarget::Buttons => "buttons",
            ComponentTarget::Cards => "cards",
            ComponentTarget::Modals => "modals",
            ComponentTarget::Tables => "tables",
            ComponentTarget::Headers => "headers",
        }
    }

    /// the variable a color slot is written to
    pub fn color_var(self, slot: ColorSlot) -> String {
        match self.prefix() {
            Some(family) => format!("--{}-color-{}", family, slot.as_str()),
            None => format!("--color-{}", slot.as_str()),
        }
    }

    /// the variable a layout property is written to
    pub fn layout_var(self, property: LayoutProperty) -> String {
        match self.prefix() {
            Some(family) => format!("--{}-{}", family, property.as_str()),
            None => format!("--layout-{}", property.as_str()),
        }
    }
}

impl fmt::Display for ComponentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComponentTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        ComponentTarget::ALL
            .into_iter()
            .find(|t| t.as_str() == s || t.prefix() == Some(s.as_str()))
            .ok_or_else(|| format!("unknown component target '{s}'"))
    }
}

/// a semantic color slot
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ColorSlot {
    /// brand color
    Primary,
    /// secondary accents
    Secondary,
    /// positive outcomes
    Success,
    /// needs attention
    Warning,
    /// destructive or failed
    Danger,
    /// neutral information
    Info,
    /// page background
    Background,
    /// raised surfaces
    Surface,
    /// body text
    Text,
    /// outlines and dividers
    Border,
}

impl ColorSlot {
    /// every slot
    pub const ALL: [ColorSlot; 10] = [
        ColorSlot::Primary,
        ColorSlot::Secondary,
        ColorSlot::Success,
        ColorSlot::Warning,
        ColorSlot::Danger,
        ColorSlot::Info,
        ColorSlot::Background,
        ColorSlot::Surface,
        ColorSlot::Text,
        ColorSlot::Border,
    ];

    /// the kebab-case name
    pub fn as_str(self) -> &'static str {
        match self {
            ColorSlot::Primary => "primary",
            ColorSlot::Secondary => "secondary",
            ColorSlot::Success => "success",
            ColorSlot::Warning => "warning",
            ColorSlot::Danger => "danger",
            ColorSlot::Info => "info",
            ColorSlot::Background => "background",
            ColorSlot::Surface => "surface",
            ColorSlot::Text => "text",
            ColorSlot::Border => "border",
        }
    }
}

impl FromStr for ColorSlot {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        ColorSlot::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| format!("unknown color slot '{s}'"))
    }
}

/// a layout property that can be tuned live
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutProperty {
    /// space between children
    Gap,
    /// inner spacing
    Padding,
    /// corner radius
    BorderRadius,
    /// outline thickness
    BorderWidth,
    /// fixed height
    Height,
    /// fixed width
    Width,
    /// text size
    FontSize,
}

impl LayoutProperty {
    /// every property
    pub const ALL: [LayoutProperty; 7] = [
        LayoutProperty::Gap,
        LayoutProperty::Padding,
        LayoutProperty::BorderRadius,
        LayoutProperty::BorderWidth,
        LayoutProperty::Height,
        LayoutProperty::Width,
        LayoutProperty::FontSize,
    ];

    /// the kebab-case name
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutProperty::Gap => "gap",
            LayoutProperty::Padding => "padding",
            LayoutProperty::BorderRadius => "border-radius",
            LayoutProperty::BorderWidth => "border-width",
            LayoutProperty::Height => "height",
            LayoutProperty::Width => "width",
            LayoutProperty::FontSize => "font-size",
        }
    }
}

impl FromStr for LayoutProperty {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim().to_lowercase().replace([' ', '_'], "-");
        LayoutProperty::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown layout property '{s}'"))
    }
}

/// whether a value can sit on the right of a css declaration without breaking out of it
fn is_safe_value(value: &str) -> bool {
    !value.trim().is_empty() && !value.contains([';', '{', '}'])
}

impl ThemeEngine {
    /// write a color override for the current target right away
    pub fn update_advanced_color(&self, slot: ColorSlot, color: &str) -> Result<()> {
        let color = color.trim();
        if !is_color(color) {
            return Err(LayeraError::InvalidColor(color.to_string()));
        }

        let name = self.lock().target.color_var(slot);
        self.write_override(name, color);
        Ok(())
    }

    /// write a layout override for the current target right away
    pub fn update_advanced_layout(&self, property: LayoutProperty, value: &str) -> Result<()> {
        let value = value.trim();
        if !is_safe_value(value) {
            return Err(LayeraError::InvalidValue(value.to_string()));
        }

        let name = self.lock().target.layout_var(property);
        self.write_override(name, value);
        Ok(())
    }

    /// pick the component family live updates apply to
    pub fn set_target_component(&self, target: ComponentTarget) {
        let mut inner = self.lock();
        if inner.target != target {
            debug!(from = %inner.target, to = %target, "changed live update target");
            inner.target = target;
        }
    }

    /// the component family live updates apply to
    pub fn target_component(&self) -> ComponentTarget {
        self.lock().target
    }

    /// every live override, variable name → value
    pub fn overrides(&self) -> BTreeMap<String, String> {
        self.lock().overrides.clone()
    }

    /// drop every live override
    pub fn clear_overrides(&self) {
        self.lock().clear_overrides();
    }

    /// record an override and push it to the sink
    fn write_override(&self, name: String, value: &str) {
        let mut inner = self.lock();
        if inner.destroyed {
            return;
        }

        let written = inner.adjusted(name.trim_start_matches("--"), value).into_owned();
        if let Some(sink) = inner.sink.as_mut() {
            sink.set_property(&name, &written);
        }

        trace!(variable = %name, value, "live override");
        inner.overrides.insert(name, value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::theme::{
            ThemeChoice,
            engine::{ThemeHost, ThemeSettings},
            media::MediaPreferences,
            registry::PresetRegistry,
            sink::SharedStyleSheet,
            storage::MemoryStorage,
            tokens::TokenSet,
        },
    };

    fn attached() -> (ThemeEngine, SharedStyleSheet) {
        let sheet = SharedStyleSheet::new(":root");
        let engine = ThemeEngine::new(
            ThemeSettings::default(),
            TokenSet::defaults(),
            ThemeHost {
                sink: Box::new(sheet.clone()),
                storage: Box::new(MemoryStorage::new()),
                media: MediaPreferences::default(),
            },
        );
        (engine, sheet)
    }

    #[test]
    fn test_variable_naming() {
        assert_eq!(
            ComponentTarget::All.color_var(ColorSlot::Primary),
            "--color-primary"
        );
        assert_eq!(
            ComponentTarget::Buttons.color_var(ColorSlot::Primary),
            "--button-color-primary"
        );
        assert_eq!(
            ComponentTarget::All.layout_var(LayoutProperty::BorderRadius),
            "--layout-border-radius"
        );
        assert_eq!(
            ComponentTarget::Tables.layout_var(LayoutProperty::FontSize),
            "--table-font-size"
        );
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("cards".parse(), Ok(ComponentTarget::Cards));
        assert_eq!("card".parse(), Ok(ComponentTarget::Cards));
        assert_eq!("border radius".parse(), Ok(LayoutProperty::BorderRadius));
        assert_eq!("Danger".parse(), Ok(ColorSlot::Danger));
        assert!("sidebar".parse::<ComponentTarget>().is_err());
    }

    #[test]
    fn test_color_override_is_written_immediately() {
        let (engine, sheet) = attached();
        engine.set_target_component(ComponentTarget::Buttons);

        engine
            .update_advanced_color(ColorSlot::Primary, "#ff0066")
            .unwrap();

        assert_eq!(sheet.get("--button-color-primary").as_deref(), Some("#ff0066"));
        assert_eq!(engine.overrides().len(), 1);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let (engine, sheet) = attached();

        let err = engine
            .update_advanced_color(ColorSlot::Primary, "not-a-color")
            .unwrap_err();
        assert!(matches!(err, LayeraError::InvalidColor(_)));

        let err = engine
            .update_advanced_layout(LayoutProperty::Gap, "4px; color: red")
            .unwrap_err();
        assert!(matches!(err, LayeraError::InvalidValue(_)));

        assert!(engine.overrides().is_empty());
        assert_eq!(sheet.get("--layout-gap"), None);
    }

    #[test]
    fn test_overrides_survive_flushes() {
        let (engine, sheet) = attached();
        engine
            .update_advanced_color(ColorSlot::Primary, "rgb(200, 0, 80)")
            .unwrap();
        engine.update_advanced_layout(LayoutProperty::Gap, "20px").unwrap();

        engine.set_theme(ThemeChoice::Dark);

        assert_eq!(sheet.get("--color-primary").as_deref(), Some("rgb(200, 0, 80)"));
        assert_eq!(sheet.get("--layout-gap").as_deref(), Some("20px"));
    }

    #[test]
    fn test_clearing_overrides_restores_shadowed_tokens() {
        let (engine, sheet) = attached();
        engine
            .update_advanced_color(ColorSlot::Primary, "#ff0000")
            .unwrap();
        engine.update_advanced_layout(LayoutProperty::Gap, "20px").unwrap();
        assert_eq!(sheet.get("--color-primary").as_deref(), Some("#ff0000"));

        engine.clear_overrides();
        engine.flush();

        assert!(engine.overrides().is_empty());
        assert_eq!(sheet.get("--color-primary").as_deref(), Some("#2563eb"));
        assert_eq!(sheet.get("--layout-gap"), None);
        for key in TokenSet::defaults().keys() {
            assert!(sheet.get(&format!("--{key}")).is_some(), "missing --{key}");
        }
    }

    #[test]
    fn test_border_overrides_follow_high_contrast() {
        let sheet = SharedStyleSheet::new(":root");
        let engine = ThemeEngine::new(
            ThemeSettings::default(),
            TokenSet::defaults(),
            ThemeHost {
                sink: Box::new(sheet.clone()),
                storage: Box::new(MemoryStorage::new()),
                media: MediaPreferences {
                    high_contrast: true,
                    ..MediaPreferences::default()
                },
            },
        );

        engine
            .update_advanced_color(ColorSlot::Border, "rgba(0, 0, 0, 0.2)")
            .unwrap();
        assert_eq!(sheet.get("--color-border").as_deref(), Some("rgb(0, 0, 0)"));

        engine.set_theme(ThemeChoice::Dark);
        assert_eq!(sheet.get("--color-border").as_deref(), Some("rgb(0, 0, 0)"));
        assert_eq!(
            engine.overrides().get("--color-border").map(String::as_str),
            Some("rgba(0, 0, 0, 0.2)")
        );

        engine.update_media(MediaPreferences::default());
        assert_eq!(sheet.get("--color-border").as_deref(), Some("rgba(0, 0, 0, 0.2)"));
    }

    #[test]
    fn test_preset_clears_overrides() {
        let (engine, sheet) = attached();
        engine.set_target_component(ComponentTarget::Cards);
        engine
            .update_advanced_layout(LayoutProperty::Padding, "32px")
            .unwrap();
        engine
            .update_advanced_color(ColorSlot::Background, "#fafafa")
            .unwrap();

        engine.apply_preset(&PresetRegistry::new(), "ocean").unwrap();

        assert!(engine.overrides().is_empty());
        assert_eq!(sheet.get("--card-padding").as_deref(), Some("24px"));
        assert_eq!(sheet.get("--card-color-background"), None);
        assert_eq!(sheet.get("--color-primary").as_deref(), Some("#0e7490"));
    }

    #[test]
    fn test_headless_engine_records_overrides() {
        let engine = ThemeEngine::headless(ThemeSettings::default(), TokenSet::defaults());
        engine
            .update_advanced_color(ColorSlot::Text, "#111")
            .unwrap();

        assert_eq!(
            engine.overrides().get("--color-text").map(String::as_str),
            Some("#111")
        );
    }
}
