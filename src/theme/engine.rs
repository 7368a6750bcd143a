//! the theme engine
//!
//! owns the theme state, turns it into css variable writes and tells observers about every
//! committed change. writes are coalesced: any number of changes inside one frame interval
//! end up as a single pass over the pending token categories followed by a single round of
//! observer notifications.
use {
    crate::{
        error::{LayeraError, Result},
        theme::{
            ResolvedTheme, ThemeChoice, TokenCategory,
            color::force_opaque,
            live::ComponentTarget,
            media::MediaPreferences,
            registry::PresetRegistry,
            sink::StyleSink,
            storage::{PersistedTheme, ThemeStorage},
            tokens::TokenSet,
        },
    },
    chrono::{DateTime, Utc},
    std::{
        borrow::Cow,
        collections::{BTreeMap, BTreeSet},
        panic::{AssertUnwindSafe, catch_unwind},
        sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
        time::Duration,
    },
    tokio::{sync::watch, task::JoinHandle},
    tracing::{debug, info, warn},
};

/// what the engine is configured with
#[derive(Debug, Clone, PartialEq)]
pub struct ThemeSettings {
    /// the choice used when nothing was persisted
    pub default_theme: ThemeChoice,
    /// the preset the engine started from
    pub preset: String,
    /// the storage key the choice is persisted under
    pub storage_key: String,
    /// the selector variables are written onto
    pub selector: String,
    /// how long writes are coalesced for
    pub frame_interval: Duration,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            default_theme: ThemeChoice::System,
            preset: "layera".to_string(),
            storage_key: "layera-theme-state".to_string(),
            selector: ":root".to_string(),
            frame_interval: Duration::from_millis(16),
        }
    }
}

/// a snapshot of the theme state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThemeState {
    /// what the user picked
    pub active_theme: ThemeChoice,
    /// what is actually applied, always derived from `active_theme` and `system_preference`
    pub resolved_theme: ResolvedTheme,
    /// what the OS asks for
    pub system_preference: ResolvedTheme,
    /// the OS asks for less motion
    pub prefers_reduced_motion: bool,
    /// the OS asks for more contrast
    pub prefers_high_contrast: bool,
    /// true until the first synchronous initialisation has finished
    pub is_loading: bool,
    /// when the last change was committed
    pub last_updated: DateTime<Utc>,
}

impl ThemeState {
    /// a fresh state for a choice and OS snapshot
    fn new(active_theme: ThemeChoice, media: MediaPreferences) -> Self {
        let system_preference = media.system_theme();

        Self {
            active_theme,
            resolved_theme: active_theme.resolve(system_preference),
            system_preference,
            prefers_reduced_motion: media.reduced_motion,
            prefers_high_contrast: media.high_contrast,
            is_loading: true,
            last_updated: Utc::now(),
        }
    }
}

/// the document side of the engine: where variables go, where the choice is kept and what
/// the OS currently prefers
pub struct ThemeHost {
    /// where variables are written
    pub sink: Box<dyn StyleSink>,
    /// where the choice is persisted
    pub storage: Box<dyn ThemeStorage>,
    /// the OS preferences at startup
    pub media: MediaPreferences,
}

/// an observer callback
pub type Observer = Arc<dyn Fn(&ThemeState) -> color_eyre::Result<()> + Send + Sync>;

/// the registered observers
#[derive(Default)]
struct Observers {
    /// the id handed to the next subscriber
    next_id: u64,
    /// registered observers, in subscription order
    list: Vec<(u64, Observer)>,
}

/// the mutable half of the engine
pub(crate) struct Inner {
    /// the current state
    pub(crate) state: ThemeState,
    /// engine settings
    pub(crate) settings: ThemeSettings,
    /// the active tokens
    pub(crate) tokens: TokenSet,
    /// where variables go, `None` when headless
    pub(crate) sink: Option<Box<dyn StyleSink>>,
    /// where the choice is kept, `None` when headless
    storage: Option<Box<dyn ThemeStorage>>,
    /// live overrides, variable name → value
    pub(crate) overrides: BTreeMap<String, String>,
    /// the component family live updates are scoped to
    pub(crate) target: ComponentTarget,
    /// categories waiting for the next flush
    pending: BTreeSet<TokenCategory>,
    /// variables from a replaced token set that still need removing
    stale: BTreeSet<String>,
    /// whether something changed since the last commit
    dirty: bool,
    /// the scheduled flush, if any
    frame: Option<JoinHandle<()>>,
    /// the media watcher task, if any
    watcher: Option<JoinHandle<()>>,
    /// set by `destroy`
    pub(crate) destroyed: bool,
}

impl Inner {
    /// recompute the derived part of the state
    fn resolve(&mut self) {
        self.state.resolved_theme = self.state.active_theme.resolve(self.state.system_preference);
    }

    /// apply the accessibility policies to a token value
    pub(crate) fn adjusted<'a>(&self, key: &str, value: &'a str) -> Cow<'a, str> {
        if self.state.prefers_reduced_motion && key.contains("duration") {
            return Cow::Borrowed("0ms");
        }

        if self.state.prefers_high_contrast && key.contains("border") {
            return Cow::Owned(force_opaque(value));
        }

        Cow::Borrowed(value)
    }

    /// write every token of the given categories
    fn write_categories(&mut self, categories: impl IntoIterator<Item = TokenCategory>) {
        let Some(mut sink) = self.sink.take() else {
            return;
        };

        let theme = self.state.resolved_theme;
        let mut written = 0usize;

        for name in std::mem::take(&mut self.stale) {
            sink.remove_property(&name);
        }

        for category in categories {
            for (key, value) in self.tokens.resolve(category, theme) {
                let value = self.adjusted(&key, &value);
                sink.set_property(&format!("--{}", key), &value);
                written += 1;
            }
        }

        for (name, value) in &self.overrides {
            sink.set_property(name, &self.adjusted(name.trim_start_matches("--"), value));
        }

        debug!(written, overrides = self.overrides.len(), "flushed theme tokens");
        self.sink = Some(sink);
    }

    /// persist the active choice
    fn persist(&mut self) {
        let Some(storage) = self.storage.as_mut() else {
            return;
        };

        let persisted = PersistedTheme {
            active_theme: self.state.active_theme,
            last_updated: Utc::now(),
        };

        if let Err(e) = persisted.save(storage.as_mut(), &self.settings.storage_key) {
            warn!(error = %e, "failed to persist theme choice");
        }
    }

    /// drop every live override
    ///
    /// variables that shadow a token get the token value back, the rest are removed
    pub(crate) fn clear_overrides(&mut self) {
        let overrides = std::mem::take(&mut self.overrides);
        let Some(mut sink) = self.sink.take() else {
            return;
        };

        let theme = self.state.resolved_theme;
        for name in overrides.keys() {
            let key = name.trim_start_matches("--");
            match self.tokens.get(key, theme) {
                Some(value) => sink.set_property(name, &self.adjusted(key, value)),
                None => sink.remove_property(name),
            }
        }

        self.sink = Some(sink);
    }

    /// swap the token set, remembering variables that disappear
    fn replace_tokens(&mut self, tokens: TokenSet) {
        let kept: BTreeSet<&str> = tokens.keys().collect();
        let stale: Vec<String> = self
            .tokens
            .keys()
            .filter(|k| !kept.contains(k))
            .map(|k| format!("--{}", k))
            .collect();

        self.stale.extend(stale);
        self.tokens = tokens;
    }
}

/// a registered observer; call [`Subscription::unsubscribe`] to remove it
#[must_use = "dropping a subscription keeps the observer registered; call `unsubscribe` to remove it"]
pub struct Subscription {
    /// the observer id
    id: u64,
    /// the list the observer lives in
    observers: Weak<Mutex<Observers>>,
}

impl Subscription {
    /// stop receiving notifications
    pub fn unsubscribe(self) {
        if let Some(observers) = self.observers.upgrade() {
            observers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .list
                .retain(|(id, _)| *id != self.id);
        }
    }
}

/// the theme engine, cheap to clone and share
#[derive(Clone)]
pub struct ThemeEngine {
    /// the engine state
    inner: Arc<Mutex<Inner>>,
    /// the observers, kept apart so they can call back into the engine
    observers: Arc<Mutex<Observers>>,
}

impl ThemeEngine {
    /// an engine with nowhere to write to (server-side rendering, tests)
    ///
    /// never touches a sink or storage and is ready immediately
    pub fn headless(settings: ThemeSettings, tokens: TokenSet) -> Self {
        let mut state = ThemeState::new(settings.default_theme, MediaPreferences::default());
        state.is_loading = false;

        Self::from_inner(Inner {
            state,
            settings,
            tokens,
            sink: None,
            storage: None,
            overrides: BTreeMap::new(),
            target: ComponentTarget::All,
            pending: BTreeSet::new(),
            stale: BTreeSet::new(),
            dirty: false,
            frame: None,
            watcher: None,
            destroyed: false,
        })
    }

    /// an engine attached to a host; every token is written before this returns
    pub fn new(settings: ThemeSettings, tokens: TokenSet, host: ThemeHost) -> Self {
        let ThemeHost {
            sink,
            storage,
            media,
        } = host;

        let active = PersistedTheme::load(storage.as_ref(), &settings.storage_key)
            .map(|p| p.active_theme)
            .unwrap_or(settings.default_theme);

        let mut inner = Inner {
            state: ThemeState::new(active, media),
            settings,
            tokens,
            sink: Some(sink),
            storage: Some(storage),
            overrides: BTreeMap::new(),
            target: ComponentTarget::All,
            pending: BTreeSet::new(),
            stale: BTreeSet::new(),
            dirty: false,
            frame: None,
            watcher: None,
            destroyed: false,
        };

        inner.write_categories(TokenCategory::ALL);
        inner.state.is_loading = false;
        inner.state.last_updated = Utc::now();

        info!(
            active = %inner.state.active_theme,
            resolved = %inner.state.resolved_theme,
            "theme engine initialized"
        );

        Self::from_inner(inner)
    }

    /// wrap an inner state
    fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(Mutex::new(inner)),
            observers: Arc::new(Mutex::new(Observers::default())),
        }
    }

    /// lock the engine state
    pub(crate) fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// get a snapshot of the state
    pub fn state(&self) -> ThemeState {
        self.lock().state
    }

    /// the settings the engine runs with
    pub fn settings(&self) -> ThemeSettings {
        self.lock().settings.clone()
    }

    /// pick a theme
    pub fn set_theme(&self, theme: ThemeChoice) {
        let mut inner = self.lock();
        if inner.destroyed {
            debug!("ignoring set_theme on a destroyed engine");
            return;
        }

        inner.state.active_theme = theme;
        inner.resolve();
        inner.persist();

        self.schedule(inner, TokenCategory::SCHEME_DEPENDENT);
    }

    /// react to a change of the OS preferences
    pub fn update_media(&self, media: MediaPreferences) {
        let mut inner = self.lock();
        if inner.destroyed {
            return;
        }

        let mut categories = BTreeSet::new();
        let mut changed = false;
        let system = media.system_theme();

        if inner.state.system_preference != system {
            inner.state.system_preference = system;
            changed = true;

            let before = inner.state.resolved_theme;
            inner.resolve();
            if before != inner.state.resolved_theme {
                categories.extend(TokenCategory::SCHEME_DEPENDENT);
            }
        }

        if inner.state.prefers_reduced_motion != media.reduced_motion {
            inner.state.prefers_reduced_motion = media.reduced_motion;
            changed = true;
            categories.extend(categories_with(&inner.tokens, "duration"));
        }

        if inner.state.prefers_high_contrast != media.high_contrast {
            inner.state.prefers_high_contrast = media.high_contrast;
            changed = true;
            categories.extend(categories_with(&inner.tokens, "border"));
        }

        if changed {
            self.schedule(inner, categories);
        }
    }

    /// follow a feed of OS preferences until the engine is destroyed or the feed closes
    ///
    /// must be called from inside a tokio runtime
    pub fn watch_media(&self, mut feed: watch::Receiver<MediaPreferences>) {
        if self.lock().destroyed {
            return;
        }

        let weak = Arc::downgrade(&self.inner);
        let observers = Arc::clone(&self.observers);

        let handle = tokio::spawn(async move {
            loop {
                let media = *feed.borrow_and_update();
                match weak.upgrade() {
                    Some(inner) => ThemeEngine {
                        inner,
                        observers: Arc::clone(&observers),
                    }
                    .update_media(media),
                    None => break,
                }

                if feed.changed().await.is_err() {
                    break;
                }
            }
        });

        if let Some(previous) = self.lock().watcher.replace(handle) {
            previous.abort();
        }
    }

    /// swap in the tokens of a registered preset, clearing live overrides first
    pub fn apply_preset(&self, registry: &PresetRegistry, id: &str) -> Result<()> {
        let tokens = registry
            .get_tokens(id)
            .ok_or_else(|| LayeraError::UnknownPreset(id.to_string()))?;

        let mut inner = self.lock();
        if inner.destroyed {
            return Ok(());
        }

        inner.clear_overrides();
        inner.replace_tokens(tokens);
        inner.settings.preset = id.to_string();
        info!(preset = id, "applied theme preset");

        self.schedule(inner, TokenCategory::ALL);
        Ok(())
    }

    /// swap in a custom token set; live overrides are kept
    pub fn set_tokens(&self, tokens: TokenSet) {
        let mut inner = self.lock();
        if inner.destroyed {
            return;
        }

        inner.replace_tokens(tokens);
        self.schedule(inner, TokenCategory::ALL);
    }

    /// the value a token is currently written with (policies applied)
    pub fn token(&self, key: &str) -> Option<String> {
        let inner = self.lock();
        let value = inner.tokens.get(key, inner.state.resolved_theme)?;
        Some(inner.adjusted(key, value).into_owned())
    }

    /// a `var(--key, fallback)` reference for markup rendered before variables exist
    pub fn token_ref(&self, key: &str) -> Option<String> {
        self.lock().tokens.var_ref(key)
    }

    /// register an observer, called after every committed change
    pub fn subscribe<F>(&self, observer: F) -> Subscription
    where
        F: Fn(&ThemeState) -> color_eyre::Result<()> + Send + Sync + 'static,
    {
        let mut observers = self.observers.lock().unwrap_or_else(PoisonError::into_inner);
        let id = observers.next_id;
        observers.next_id += 1;
        observers.list.push((id, Arc::new(observer)));

        Subscription {
            id,
            observers: Arc::downgrade(&self.observers),
        }
    }

    /// how many observers are registered
    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .list
            .len()
    }

    /// apply everything pending right now instead of waiting for the frame
    pub fn flush(&self) {
        let mut inner = self.lock();
        if let Some(frame) = inner.frame.take() {
            frame.abort();
        }
        self.commit(inner);
    }

    /// stop listening for media changes and drop any pending flush
    ///
    /// calling it more than once is fine
    pub fn destroy(&self) {
        let mut inner = self.lock();
        if inner.destroyed {
            return;
        }

        inner.destroyed = true;
        inner.pending.clear();
        inner.dirty = false;

        if let Some(frame) = inner.frame.take() {
            frame.abort();
        }
        if let Some(watcher) = inner.watcher.take() {
            watcher.abort();
        }

        info!("theme engine destroyed");
    }

    /// queue categories for the next flush, scheduling one if none is pending
    fn schedule(
        &self,
        mut inner: MutexGuard<'_, Inner>,
        categories: impl IntoIterator<Item = TokenCategory>,
    ) {
        inner.pending.extend(categories);
        inner.dirty = true;

        if inner.frame.is_some() {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let weak = Arc::downgrade(&self.inner);
                let observers = Arc::clone(&self.observers);
                let interval = inner.settings.frame_interval;

                inner.frame = Some(runtime.spawn(async move {
                    tokio::time::sleep(interval).await;
                    if let Some(inner) = weak.upgrade() {
                        let engine = ThemeEngine { inner, observers };
                        let guard = engine.lock();
                        engine.commit(guard);
                    }
                }));
            }
            Err(_) => self.commit(inner),
        }
    }

    /// write pending categories and notify observers once
    fn commit(&self, mut inner: MutexGuard<'_, Inner>) {
        inner.frame = None;

        if inner.destroyed || !inner.dirty {
            return;
        }

        let pending = std::mem::take(&mut inner.pending);
        inner.write_categories(pending);
        inner.dirty = false;
        inner.state.last_updated = Utc::now();

        let snapshot = inner.state;
        drop(inner);

        self.notify(&snapshot);
    }

    /// call every observer, each isolated from the others' failures
    fn notify(&self, state: &ThemeState) {
        let observers: Vec<(u64, Observer)> = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .list
            .clone();

        for (id, observer) in observers {
            match catch_unwind(AssertUnwindSafe(|| observer(state))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(observer = id, error = %e, "theme observer failed"),
                Err(_) => warn!(observer = id, "theme observer panicked"),
            }
        }
    }
}

/// the categories holding at least one key containing `needle`
fn categories_with(tokens: &TokenSet, needle: &str) -> Vec<TokenCategory> {
    TokenCategory::ALL
        .into_iter()
        .filter(|category| {
            tokens
                .resolve(*category, ResolvedTheme::Light)
                .keys()
                .chain(tokens.resolve(*category, ResolvedTheme::Dark).keys())
                .any(|k| k.contains(needle))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::theme::{
            media::media_channel,
            sink::SharedStyleSheet,
            storage::{FileStorage, MemoryStorage},
        },
        color_eyre::eyre::eyre,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    fn attached(media: MediaPreferences) -> (ThemeEngine, SharedStyleSheet) {
        let sheet = SharedStyleSheet::new(":root");
        let engine = ThemeEngine::new(
            ThemeSettings::default(),
            TokenSet::defaults(),
            ThemeHost {
                sink: Box::new(sheet.clone()),
                storage: Box::new(MemoryStorage::new()),
                media,
            },
        );
        (engine, sheet)
    }

    fn counter(engine: &ThemeEngine) -> (Arc<AtomicUsize>, Subscription) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        let sub = engine.subscribe(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        (count, sub)
    }

    #[test]
    fn test_every_token_is_written_on_init() {
        let (engine, sheet) = attached(MediaPreferences::default());
        let tokens = TokenSet::defaults();

        assert!(!engine.state().is_loading);
        for key in tokens.keys() {
            assert!(sheet.get(&format!("--{key}")).is_some(), "missing --{key}");
        }
    }

    #[test]
    fn test_headless_engine_is_ready_and_writes_nothing() {
        let engine = ThemeEngine::headless(ThemeSettings::default(), TokenSet::defaults());
        let (count, _sub) = counter(&engine);

        assert!(!engine.state().is_loading);
        engine.set_theme(ThemeChoice::Dark);

        assert_eq!(engine.state().resolved_theme, ResolvedTheme::Dark);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resolved_theme_tracks_choice_and_system() {
        for prefers_dark in [false, true] {
            let media = MediaPreferences {
                prefers_dark,
                ..MediaPreferences::default()
            };
            let (engine, _) = attached(media);

            for choice in ThemeChoice::ALL {
                engine.set_theme(choice);
                let expected = match choice {
                    ThemeChoice::System => media.system_theme(),
                    ThemeChoice::Light => ResolvedTheme::Light,
                    ThemeChoice::Dark => ResolvedTheme::Dark,
                };
                assert_eq!(engine.state().resolved_theme, expected);
            }
        }
    }

    #[test]
    fn test_dark_theme_rewrites_colors() {
        let (engine, sheet) = attached(MediaPreferences::default());
        assert_eq!(sheet.get("--color-background").as_deref(), Some("#ffffff"));

        engine.set_theme(ThemeChoice::Dark);
        assert_eq!(sheet.get("--color-background").as_deref(), Some("#0b1120"));
    }

    #[test]
    fn test_system_change_follows_when_choice_is_system() {
        let (engine, sheet) = attached(MediaPreferences::default());
        engine.set_theme(ThemeChoice::System);

        engine.update_media(MediaPreferences {
            prefers_dark: true,
            ..MediaPreferences::default()
        });

        assert_eq!(engine.state().system_preference, ResolvedTheme::Dark);
        assert_eq!(engine.state().resolved_theme, ResolvedTheme::Dark);
        assert_eq!(sheet.get("--color-surface").as_deref(), Some("#111827"));
    }

    #[test]
    fn test_high_contrast_round_trip() {
        let (engine, sheet) = attached(MediaPreferences::default());
        let original = sheet.get("--color-border").unwrap();

        engine.update_media(MediaPreferences {
            high_contrast: true,
            ..MediaPreferences::default()
        });
        assert_eq!(sheet.get("--color-border").as_deref(), Some("rgb(15, 23, 42)"));
        assert_eq!(
            sheet.get("--card-border").as_deref(),
            Some("1px solid rgb(15, 23, 42)")
        );
        assert_eq!(sheet.get("--color-primary").as_deref(), Some("#2563eb"));

        engine.update_media(MediaPreferences::default());
        assert_eq!(sheet.get("--color-border"), Some(original));
    }

    #[test]
    fn test_reduced_motion_zeroes_durations() {
        let (engine, sheet) = attached(MediaPreferences {
            reduced_motion: true,
            ..MediaPreferences::default()
        });

        assert_eq!(sheet.get("--motion-duration-fast").as_deref(), Some("0ms"));
        assert_eq!(engine.token("motion-duration-slow").as_deref(), Some("0ms"));
        assert_eq!(
            sheet.get("--motion-easing-standard").as_deref(),
            Some("cubic-bezier(0.2, 0, 0, 1)")
        );

        engine.update_media(MediaPreferences::default());
        assert_eq!(sheet.get("--motion-duration-fast").as_deref(), Some("120ms"));
    }

    #[test]
    fn test_failing_observers_do_not_block_others() {
        let engine = ThemeEngine::headless(ThemeSettings::default(), TokenSet::defaults());
        let _erroring = engine.subscribe(|_| Err(eyre!("observer broke")));
        let _panicking = engine.subscribe(|_| panic!("observer exploded"));
        let (count, _sub) = counter(&engine);

        engine.set_theme(ThemeChoice::Light);
        engine.set_theme(ThemeChoice::Dark);

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let engine = ThemeEngine::headless(ThemeSettings::default(), TokenSet::defaults());
        let (count, sub) = counter(&engine);

        engine.set_theme(ThemeChoice::Dark);
        sub.unsubscribe();
        engine.set_theme(ThemeChoice::Light);

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(engine.observer_count(), 0);
    }

    #[test]
    fn test_persisted_choice_is_restored() {
        let dir = tempfile::tempdir().unwrap();
        let host = |sheet: &SharedStyleSheet| ThemeHost {
            sink: Box::new(sheet.clone()),
            storage: Box::new(FileStorage::new(dir.path())),
            media: MediaPreferences::default(),
        };

        let sheet = SharedStyleSheet::new(":root");
        let first = ThemeEngine::new(ThemeSettings::default(), TokenSet::defaults(), host(&sheet));
        first.set_theme(ThemeChoice::Dark);
        first.set_theme(ThemeChoice::Dark);

        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1, "repeated choices should overwrite one record");

        let second = ThemeEngine::new(ThemeSettings::default(), TokenSet::defaults(), host(&sheet));
        assert_eq!(second.state().active_theme, ThemeChoice::Dark);
        assert_eq!(second.state().resolved_theme, ResolvedTheme::Dark);
    }

    #[test]
    fn test_corrupt_persisted_state_falls_back_to_default() {
        let mut storage = MemoryStorage::new();
        storage.write("layera-theme-state", "][").unwrap();

        let engine = ThemeEngine::new(
            ThemeSettings::default(),
            TokenSet::defaults(),
            ThemeHost {
                sink: Box::new(SharedStyleSheet::new(":root")),
                storage: Box::new(storage),
                media: MediaPreferences::default(),
            },
        );

        assert_eq!(engine.state().active_theme, ThemeChoice::System);
    }

    #[test]
    fn test_unknown_preset_is_an_error() {
        let (engine, _) = attached(MediaPreferences::default());
        let err = engine.apply_preset(&PresetRegistry::new(), "neon").unwrap_err();
        assert!(matches!(err, LayeraError::UnknownPreset(id) if id == "neon"));
    }

    #[test]
    fn test_set_tokens_removes_dropped_variables() {
        let (engine, sheet) = attached(MediaPreferences::default());
        let smaller = TokenSet::new().with(
            TokenCategory::Spacing,
            crate::tokens! { "spacing-md" => "12px" },
        );

        engine.set_tokens(smaller);

        assert_eq!(sheet.get("--spacing-md").as_deref(), Some("12px"));
        assert_eq!(sheet.get("--color-primary"), None);
    }

    #[test]
    fn test_token_ref_has_fallback() {
        let engine = ThemeEngine::headless(ThemeSettings::default(), TokenSet::defaults());
        assert_eq!(
            engine.token_ref("radius-md").as_deref(),
            Some("var(--radius-md, 8px)")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rapid_changes_coalesce_into_one_flush() {
        let (engine, sheet) = attached(MediaPreferences::default());
        let (count, _sub) = counter(&engine);
        let writes_before = sheet.with(|s| s.write_count());

        engine.update_media(MediaPreferences {
            prefers_dark: true,
            ..MediaPreferences::default()
        });
        engine.set_theme(ThemeChoice::Dark);
        engine.set_theme(ThemeChoice::Light);

        assert_eq!(count.load(Ordering::SeqCst), 0, "nothing commits before the frame");
        assert_eq!(sheet.with(|s| s.write_count()), writes_before);

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(sheet.get("--color-background").as_deref(), Some("#ffffff"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_destroy_cancels_pending_flush_and_is_idempotent() {
        let (engine, sheet) = attached(MediaPreferences::default());
        let (count, _sub) = counter(&engine);

        engine.set_theme(ThemeChoice::Dark);
        engine.destroy();
        engine.destroy();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(sheet.get("--color-background").as_deref(), Some("#ffffff"));

        engine.set_theme(ThemeChoice::Light);
        engine.flush();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_watch_media_follows_the_feed() {
        let (engine, _sheet) = attached(MediaPreferences::default());
        let (feed, receiver) = media_channel(MediaPreferences::default());
        engine.watch_media(receiver);

        feed.send(MediaPreferences {
            prefers_dark: true,
            reduced_motion: true,
            high_contrast: false,
        })
        .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let state = engine.state();
        assert_eq!(state.system_preference, ResolvedTheme::Dark);
        assert!(state.prefers_reduced_motion);

        engine.destroy();
        let _ = feed.send(MediaPreferences::default());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(engine.state().system_preference, ResolvedTheme::Dark);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_flush_commits_immediately() {
        let (engine, sheet) = attached(MediaPreferences::default());
        let (count, _sub) = counter(&engine);

        engine.set_theme(ThemeChoice::Dark);
        engine.flush();

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(sheet.get("--color-background").as_deref(), Some("#0b1120"));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1, "the aborted frame must not notify again");
    }
}
