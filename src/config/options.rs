//! every single available configuration option and its type is listed in this file
use {
    crate::{
        config::validate::{Validate, format_validation_errors},
        files::validate::ValidationRules,
        theme::{ThemeChoice, engine::ThemeSettings},
        upload::UploadSettings,
    },
    color_eyre::{
        Section, SectionExt,
        eyre::{Context, OptionExt, Result, eyre},
    },
    config::{Config, ConfigBuilder},
    schemars::JsonSchema,
    serde::{Deserialize, Serialize},
    smart_default::SmartDefault,
    std::{
        collections::BTreeMap,
        path::{Path, PathBuf},
        time::Duration,
    },
    tracing::info,
};

/// bytes in a mebibyte
const MIB: u64 = 1024 * 1024;

/// Configuration options for making HTTP requests
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, SmartDefault)]
#[schemars(default)]
pub struct HttpConfig {
    /// Connection pool size per host
    #[default(Some(8))]
    pub pool_max_idle_per_host: Option<usize>,

    /// Request timeout in seconds (applies to every single upload request)
    #[default(Some(300))]
    pub timeout_secs: Option<u64>,

    /// Connection timeout in seconds
    #[default(Some(10))]
    pub connect_timeout_secs: Option<u64>,

    /// User agent sent with upload requests
    #[default(Some(format!(
        "{}/v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )))]
    pub user_agent: Option<String>,
}

/// Settings for the theme engine
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, SmartDefault)]
#[schemars(default)]
pub struct ThemeCfg {
    /// The theme to use when nothing has been persisted yet
    ///
    /// Possible values:
    /// - light
    /// - dark
    /// - system (default)
    #[default(Some(ThemeChoice::System))]
    pub default_theme: Option<ThemeChoice>,

    /// The token preset to start with
    #[default(Some("layera".to_string()))]
    pub preset: Option<String>,

    /// The key the chosen theme is persisted under
    #[default(Some("layera-theme-state".to_string()))]
    pub storage_key: Option<String>,

    /// The directory persisted theme state is written to
    #[default(Some(".layera/state".to_string()))]
    pub state_dir: Option<String>,

    /// The selector CSS variables are written onto
    #[default(Some(":root".to_string()))]
    pub selector: Option<String>,

    /// How long to coalesce token writes for, in milliseconds (one frame)
    #[default(Some(16))]
    pub frame_interval_ms: Option<u64>,
}

/// Settings for the upload queue
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, SmartDefault)]
#[schemars(default)]
pub struct UploadCfg {
    /// The endpoint files are uploaded to
    ///
    /// Chunked uploads use `<url>/init`, `<url>/chunk` and `<url>/finalize`
    #[schemars(url)]
    #[default(Some("http://localhost:8080/api/upload".to_string()))]
    pub url: Option<String>,

    /// Files larger than this (in MB) are uploaded in chunks of this size
    #[default(Some(5))]
    pub chunk_size_mb: Option<u64>,

    #[schemars(range(min = 1, max = 16))]
    /// Max uploads in flight at once
    #[default(Some(3))]
    pub max_concurrent: Option<usize>,

    /// Start uploading as soon as a file is added
    #[default(Some(true))]
    pub auto_start: Option<bool>,

    /// Extra headers sent with every upload request (e.g. auth tokens)
    #[default(Some(BTreeMap::new()))]
    pub headers: Option<BTreeMap<String, String>>,
}

/// Rules files are checked against before import or upload
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, SmartDefault)]
#[schemars(default)]
pub struct ValidationCfg {
    /// Largest accepted file in MB
    #[default(Some(50))]
    pub max_file_size_mb: Option<u64>,

    /// Smallest accepted file in bytes
    #[default(Some(0))]
    pub min_file_size_bytes: Option<u64>,

    /// Files above this size (in MB) are accepted with a warning
    #[default(Some(10))]
    pub large_file_warning_mb: Option<u64>,

    /// Accepted extensions without the dot (empty accepts everything)
    #[default(Some(Vec::new()))]
    pub allowed_extensions: Option<Vec<String>>,

    /// Accepted MIME types, `image/*` style wildcards allowed (empty accepts everything)
    #[default(Some(Vec::new()))]
    pub allowed_mime_types: Option<Vec<String>>,

    /// Max files in a single selection
    #[default(Some(20))]
    pub max_files: Option<usize>,

    /// Max combined size of a selection in MB
    #[default(Some(200))]
    pub max_total_size_mb: Option<u64>,

    /// Reject dangerous characters and reserved OS names in file names
    #[default(Some(true))]
    pub check_file_names: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, JsonSchema, SmartDefault)]
/// The format to log in
pub enum LoggingFormat {
    /// Use the compact output format
    Compact,

    /// Use an excessively pretty output format
    #[default]
    Pretty,
}

/// Settings for logging
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, SmartDefault)]
#[schemars(default)]
pub struct LoggingConfig {
    /// Enable logging
    #[default(Some(true))]
    pub enable: Option<bool>,

    /// The max level to log at
    #[default(Some("info".to_string()))]
    pub level: Option<String>,

    /// Use extra pretty logging
    #[default(Some(LoggingFormat::Compact))]
    pub format: Option<LoggingFormat>,

    /// Enable ANSI escape codes for colors and stuff
    #[default(Some(true))]
    pub ansi: Option<bool>,

    /// Display event targets in log messages
    #[default(Some(false))]
    pub event_targets: Option<bool>,

    /// Display line numbers in log messages
    #[default(Some(false))]
    pub line_numbers: Option<bool>,
}

/// Layera configuration options
#[derive(Serialize, Deserialize, Clone, Debug, JsonSchema, SmartDefault)]
#[schemars(default)]
pub struct Layera {
    /// Configuration file version (do not modify manually)
    #[default(Some(1))]
    pub version: Option<u32>,

    /// Theme engine settings
    #[default(Some(ThemeCfg::default()))]
    pub theme: Option<ThemeCfg>,

    /// Upload queue settings
    #[default(Some(UploadCfg::default()))]
    pub upload: Option<UploadCfg>,

    /// File validation rules
    #[default(Some(ValidationCfg::default()))]
    pub validation: Option<ValidationCfg>,

    /// HTTP client configuration
    #[default(Some(HttpConfig::default()))]
    pub http: Option<HttpConfig>,

    /// Logging settings
    #[default(Some(LoggingConfig::default()))]
    pub logging: Option<LoggingConfig>,
}

impl Layera {
    /// load config from default locations
    ///
    /// load prio: env > local > global > defaults
    pub fn load() -> Result<Self> {
        let global_config_path = Self::global_config_path()?;
        let defaults = Self::load_defaults()?;
        let mut builder = Self::create_builder(&defaults)?;

        builder = builder.add_source(config::File::from(global_config_path).required(false));

        if let Some(local_config) = Self::find_local_config()? {
            builder = builder.add_source(config::File::from(local_config).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LAYERA")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder.build().wrap_err("Failed to build configuration")?;
        let cfg: Layera = settings
            .try_deserialize::<Layera>()
            .wrap_err("Failed to deserialize configuration")?;

        cfg.run_validation()?;
        info!("Configuration validation successful");

        Ok(cfg)
    }

    /// get the global config file path
    pub fn global_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_eyre("Unable to determine system config directory")
            .suggestion("Ensure XDG_CONFIG_HOME or HOME environment variables are set")
            .suggestion("On Windows, APPDATA should be set")?;

        Ok(config_dir.join("layera.toml"))
    }

    /// load default config from embedded default config file
    fn load_defaults() -> Result<Self> {
        toml::from_str(include_str!("../../resources/layera.default.toml"))
            .wrap_err("Failed to parse embedded default configuration")
            .note("This is a bug - the embedded defaults are malformed")
    }

    /// create a config builder with defaults
    fn create_builder(defaults: &Layera) -> Result<ConfigBuilder<config::builder::DefaultState>> {
        let config_source = Config::try_from(defaults)
            .wrap_err("Failed to convert default Layera struct to config source")?;

        Ok(Config::builder().add_source(config_source))
    }

    /// run validation and return a pretty error if it fails
    fn run_validation(&self) -> Result<()> {
        self.validate()
            .map_err(|errors| eyre!(format_validation_errors(&errors)))
            .wrap_err("config validation failed")
            .suggestion("Check your layera.toml for invalid values")
            .suggestion("Run `layera config show` to see the values in effect")
    }

    /// find the local config file
    fn find_local_config() -> Result<Option<PathBuf>> {
        let curr_dir = std::env::current_dir()
            .wrap_err("Failed to get current working directory")
            .suggestion("Ensure the current directory exists and is accessible")?;

        Ok(curr_dir
            .ancestors()
            .map(|ancestor| ancestor.join("layera.toml"))
            .find(|path| path.exists()))
    }

    /// write the default config to the global location unless one exists
    pub fn init_global() -> Result<PathBuf> {
        let path = Self::global_config_path()?;
        if path.exists() {
            return Ok(path);
        }

        let config_dir = path
            .parent()
            .ok_or_eyre("Unable to determine parent directory of config path")?;

        std::fs::create_dir_all(config_dir)
            .wrap_err("Failed to create config directory")
            .with_section(|| format!("{}", config_dir.display()).header("Directory:"))?;

        Self::load_defaults()?
            .save_to_file(&path)
            .wrap_err("Failed to write default configuration file")?;

        Ok(path)
    }

    /// save config to a file
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let toml_str =
            toml::to_string_pretty(self).wrap_err("Failed to serialize config to TOML")?;

        std::fs::write(path, &toml_str)
            .wrap_err_with(|| format!("Failed to write config file: {}", path.display()))
            .with_section(|| path.display().to_string().header("File path"))
            .with_section(|| format!("{} bytes", toml_str.len()).header("Content size:"))?;

        Ok(())
    }

    /// the theme section with every unset value filled from the defaults
    pub fn theme_settings(&self) -> ThemeSettings {
        let theme = self.theme.clone().unwrap_or_default();
        let defaults = ThemeCfg::default();

        ThemeSettings {
            default_theme: theme
                .default_theme
                .or(defaults.default_theme)
                .unwrap_or(ThemeChoice::System),
            preset: theme.preset.or(defaults.preset).unwrap_or_default(),
            storage_key: theme.storage_key.or(defaults.storage_key).unwrap_or_default(),
            selector: theme.selector.or(defaults.selector).unwrap_or_default(),
            frame_interval: Duration::from_millis(
                theme
                    .frame_interval_ms
                    .or(defaults.frame_interval_ms)
                    .unwrap_or(16),
            ),
        }
    }

    /// the directory persisted theme state lives in
    pub fn state_dir(&self) -> PathBuf {
        self.theme
            .as_ref()
            .and_then(|t| t.state_dir.clone())
            .or(ThemeCfg::default().state_dir)
            .map(PathBuf::from)
            .unwrap_or_default()
    }

    /// the upload section with every unset value filled from the defaults
    pub fn upload_settings(&self) -> UploadSettings {
        let upload = self.upload.clone().unwrap_or_default();
        let defaults = UploadCfg::default();

        UploadSettings {
            url: upload.url.or(defaults.url).unwrap_or_default(),
            chunk_size: upload.chunk_size_mb.or(defaults.chunk_size_mb).unwrap_or(5).saturating_mul(MIB),
            max_concurrent: upload
                .max_concurrent
                .or(defaults.max_concurrent)
                .unwrap_or(3),
            auto_start: upload.auto_start.or(defaults.auto_start).unwrap_or(true),
            headers: upload.headers.unwrap_or_default(),
        }
    }

    /// the validation section turned into rules
    pub fn validation_rules(&self) -> ValidationRules {
        let v = self.validation.clone().unwrap_or_default();
        let defaults = ValidationCfg::default();

        ValidationRules {
            max_size: v.max_file_size_mb.or(defaults.max_file_size_mb).map(|mb| mb.saturating_mul(MIB)),
            min_size: v.min_file_size_bytes.or(defaults.min_file_size_bytes),
            large_file_warning: v
                .large_file_warning_mb
                .or(defaults.large_file_warning_mb)
                .map(|mb| mb.saturating_mul(MIB)),
            allowed_extensions: v.allowed_extensions.unwrap_or_default(),
            allowed_mime_types: v.allowed_mime_types.unwrap_or_default(),
            max_files: v.max_files.or(defaults.max_files),
            max_total_size: v
                .max_total_size_mb
                .or(defaults.max_total_size_mb)
                .map(|mb| mb.saturating_mul(MIB)),
            check_file_names: v.check_file_names.or(defaults.check_file_names).unwrap_or(true),
            custom: None,
        }
    }
}
