//! OS preference snapshots (the media queries a browser would expose)
use {crate::theme::ResolvedTheme, tokio::sync::watch};

/// the preferences the theme engine reacts to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaPreferences {
    /// `prefers-color-scheme: dark`
    pub prefers_dark: bool,
    /// `prefers-reduced-motion: reduce`
    pub reduced_motion: bool,
    /// `prefers-contrast: more`
    pub high_contrast: bool,
}

impl MediaPreferences {
    /// the scheme the OS asks for
    pub fn system_theme(&self) -> ResolvedTheme {
        if self.prefers_dark {
            ResolvedTheme::Dark
        } else {
            ResolvedTheme::Light
        }
    }
}

/// the sending half of a preference feed, held by whatever watches the OS
pub type MediaFeed = watch::Sender<MediaPreferences>;

/// make a preference feed starting from an initial snapshot
pub fn media_channel(initial: MediaPreferences) -> (MediaFeed, watch::Receiver<MediaPreferences>) {
    watch::channel(initial)
}
