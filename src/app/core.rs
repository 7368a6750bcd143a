//! the core app
use {
    super::logging,
    crate::{
        config::{instance::init_config, options::Layera},
        files::{
            import::FileImporter,
            preview::PreviewRegistry,
            validate::ValidationRules,
        },
        getopt,
        theme::{
            engine::{ThemeEngine, ThemeHost},
            media::MediaPreferences,
            registry::PresetRegistry,
            sink::SharedStyleSheet,
            storage::FileStorage,
        },
        upload::{HttpTransport, UploadEngine},
    },
    color_eyre::{
        Section,
        eyre::{Context, OptionExt, Result},
    },
    std::sync::Arc,
    tracing::info,
};

/// everything a layera host needs, built once from the configuration
///
/// nothing in here is global: hand the app (or the engines inside it) to whoever needs them
pub struct LayeraApp {
    /// the configuration the app was built from
    config: Layera,
    /// the built-in presets
    presets: PresetRegistry,
    /// the stylesheet the theme engine writes to
    sheet: SharedStyleSheet,
    /// the theme engine
    theme: ThemeEngine,
    /// the upload queue
    uploads: UploadEngine,
    /// where previews of imported files live
    previews: PreviewRegistry,
    /// the rules picked files are checked against
    rules: ValidationRules,
}

impl LayeraApp {
    /// load the configuration, set up logging and build the app
    ///
    /// # Errors
    ///
    /// returns an error if the config can't be loaded
    /// returns an error if logging can't be set up
    /// returns an error if the app can't be built from the config
    pub fn init() -> Result<Self> {
        init_config()?;
        logging::setup().wrap_err("failed to set up logging")?;

        let config = getopt!()?.clone();
        Self::from_config(&config)
    }

    /// build the app from a configuration
    ///
    /// # Errors
    ///
    /// returns an error if the configured preset doesn't exist
    /// returns an error if the upload client can't be built
    pub fn from_config(config: &Layera) -> Result<Self> {
        let presets = PresetRegistry::new();
        let settings = config.theme_settings();

        let tokens = presets
            .get_tokens(&settings.preset)
            .ok_or_eyre(format!("unknown theme preset '{}'", settings.preset))
            .with_suggestion(|| {
                format!("pick one of: {}", presets.list_presets().join(", "))
            })?;

        let sheet = SharedStyleSheet::new(settings.selector.as_str());
        let theme = ThemeEngine::new(
            settings,
            tokens,
            ThemeHost {
                sink: Box::new(sheet.clone()),
                storage: Box::new(FileStorage::new(config.state_dir())),
                media: MediaPreferences::default(),
            },
        );

        let upload_settings = config.upload_settings();
        let transport = HttpTransport::new(&upload_settings, &config.http.clone().unwrap_or_default())
            .wrap_err("failed to build the upload client")
            .with_section(|| upload_settings.url.clone())?;
        let uploads = UploadEngine::new(upload_settings, Arc::new(transport));

        info!(
            "Starting {} v{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        );

        Ok(Self {
            config: config.clone(),
            presets,
            sheet,
            theme,
            uploads,
            previews: PreviewRegistry::new(),
            rules: config.validation_rules(),
        })
    }

    /// the configuration the app was built from
    pub fn config(&self) -> &Layera {
        &self.config
    }

    /// the built-in presets
    pub fn presets(&self) -> &PresetRegistry {
        &self.presets
    }

    /// the theme engine
    pub fn theme(&self) -> &ThemeEngine {
        &self.theme
    }

    /// the upload queue
    pub fn uploads(&self) -> &UploadEngine {
        &self.uploads
    }

    /// the rules picked files are checked against
    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// a new importer sharing the app's preview registry
    pub fn importer(&self) -> FileImporter {
        FileImporter::new(self.rules.clone(), self.previews.clone())
    }

    /// the stylesheet as it currently stands
    pub fn css(&self) -> String {
        self.theme.flush();
        self.sheet.to_css()
    }

    /// stop the engines
    pub fn shutdown(&self) {
        self.theme.destroy();
        self.uploads.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::theme::{ThemeChoice, engine::ThemeSettings},
    };

    fn config_in(dir: &std::path::Path) -> Layera {
        let mut config = Layera::default();
        if let Some(theme) = config.theme.as_mut() {
            theme.state_dir = Some(dir.display().to_string());
        }
        config
    }

    #[test]
    fn test_app_writes_every_token() {
        let dir = tempfile::tempdir().unwrap();
        let app = LayeraApp::from_config(&config_in(dir.path())).unwrap();

        let css = app.css();
        assert!(css.starts_with(":root {"));
        assert!(css.contains("--color-primary: #2563eb;"));
        assert_eq!(app.theme().settings(), ThemeSettings::default());
    }

    #[test]
    fn test_app_persists_into_state_dir() {
        let dir = tempfile::tempdir().unwrap();
        let app = LayeraApp::from_config(&config_in(dir.path())).unwrap();

        app.theme().set_theme(ThemeChoice::Dark);
        app.shutdown();

        let again = LayeraApp::from_config(&config_in(dir.path())).unwrap();
        assert_eq!(again.theme().state().active_theme, ThemeChoice::Dark);
    }

    #[test]
    fn test_unknown_preset_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(dir.path());
        if let Some(theme) = config.theme.as_mut() {
            theme.preset = Some("neon".into());
        }

        let err = LayeraApp::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("neon"));
    }
}
