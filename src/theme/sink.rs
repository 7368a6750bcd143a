//! where css variables end up
use std::collections::BTreeMap;

/// something css custom properties can be written to (a document root, a style element...)
pub trait StyleSink: Send {
    /// set `name` (including the leading `--`) to `value`
    fn set_property(&mut self, name: &str, value: &str);

    /// remove a property
    fn remove_property(&mut self, name: &str);
}

/// an in-memory style rule, rendered as css on demand
#[derive(Debug, Clone, Default)]
pub struct StyleSheet {
    /// the selector the rule applies to
    selector: String,
    /// the properties of the rule
    properties: BTreeMap<String, String>,
    /// how many property writes happened, for spotting redundant flushes
    writes: usize,
}

impl StyleSheet {
    /// make an empty rule for a selector
    pub fn new(selector: impl Into<String>) -> Self {
        Self {
            selector: selector.into(),
            ..Self::default()
        }
    }

    /// get a property value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// every property, sorted by name
    pub fn properties(&self) -> &BTreeMap<String, String> {
        &self.properties
    }

    /// how many writes the sheet has seen
    pub fn write_count(&self) -> usize {
        self.writes
    }

    /// render the rule
    pub fn to_css(&self) -> String {
        let mut css = format!("{} {{\n", self.selector);
        for (name, value) in &self.properties {
            css.push_str(&format!("  {}: {};\n", name, value));
        }
        css.push_str("}\n");
        css
    }
}

impl StyleSink for StyleSheet {
    fn set_property(&mut self, name: &str, value: &str) {
        self.writes += 1;
        self.properties.insert(name.to_string(), value.to_string());
    }

    fn remove_property(&mut self, name: &str) {
        self.writes += 1;
        self.properties.remove(name);
    }
}

/// a handle to a [`StyleSheet`] that stays readable while the engine owns the sink
#[derive(Debug, Clone, Default)]
pub struct SharedStyleSheet(std::sync::Arc<std::sync::Mutex<StyleSheet>>);

impl SharedStyleSheet {
    /// make an empty shared rule for a selector
    pub fn new(selector: impl Into<String>) -> Self {
        Self(std::sync::Arc::new(std::sync::Mutex::new(StyleSheet::new(
            selector,
        ))))
    }

    /// run a closure against the current sheet
    pub fn with<R>(&self, f: impl FnOnce(&StyleSheet) -> R) -> R {
        let sheet = self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&sheet)
    }

    /// get a property value
    pub fn get(&self, name: &str) -> Option<String> {
        self.with(|s| s.get(name).map(String::from))
    }

    /// render the rule
    pub fn to_css(&self) -> String {
        self.with(StyleSheet::to_css)
    }
}

impl StyleSink for SharedStyleSheet {
    fn set_property(&mut self, name: &str, value: &str) {
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .set_property(name, value);
    }

    fn remove_property(&mut self, name: &str) {
        self.0
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove_property(name);
    }
}
