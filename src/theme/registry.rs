//! preset registry stuff
use {
    crate::theme::{
        presets::{Compact, Forest, LayeraDefault, Ocean, Preset},
        tokens::TokenSet,
    },
    hashbrown::HashMap,
};

/// the metadata of a preset
#[derive(Clone)]
pub struct PresetMetadata {
    /// the id of the preset
    pub id: &'static str,
    /// the preset name
    pub name: &'static str,
    /// the function returning the preset's tokens
    pub tokens_fn: fn() -> TokenSet,
}

impl PresetMetadata {
    /// make new metadata
    pub fn new<T: Preset>(id: &'static str) -> Self {
        Self {
            id,
            name: T::name(),
            tokens_fn: T::tokens,
        }
    }

    /// get the tokens
    pub fn tokens(&self) -> TokenSet {
        (self.tokens_fn)()
    }
}

/// the preset registry
pub struct PresetRegistry {
    /// the installed presets
    presets: HashMap<&'static str, PresetMetadata>,
}

impl PresetRegistry {
    /// make a new registry with the built-in presets
    pub fn new() -> Self {
        let mut registry = Self {
            presets: HashMap::new(),
        };

        registry.register::<LayeraDefault>("layera");
        registry.register::<Ocean>("ocean");
        registry.register::<Forest>("forest");
        registry.register::<Compact>("compact");

        registry
    }

    /// register a preset
    pub fn register<T: Preset>(&mut self, id: &'static str) {
        self.presets.insert(id, PresetMetadata::new::<T>(id));
    }

    /// get a preset's tokens by its id
    pub fn get_tokens(&self, id: &str) -> Option<TokenSet> {
        self.presets.get(id).map(PresetMetadata::tokens)
    }

    /// get the metadata of a preset
    pub fn get_metadata(&self, id: &str) -> Option<&PresetMetadata> {
        self.presets.get(id)
    }

    /// list available presets, sorted by id
    pub fn list_presets(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.presets.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// list presets that ship dark-scheme values
    pub fn list_with_dark_variant(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self
            .presets
            .iter()
            .filter(|(_, meta)| meta.tokens().has_dark_variant())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

impl Default for PresetRegistry {
    fn default() -> Self {
        Self::new()
    }
}
