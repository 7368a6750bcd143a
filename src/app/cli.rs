//! cli stuff
use {
    crate::{
        config::options::Layera,
        files::{
            FileBlob,
            validate::{ListValidation, validate_files},
        },
        getopt,
        theme::{
            ResolvedTheme, ThemeChoice,
            engine::{ThemeEngine, ThemeHost},
            media::MediaPreferences,
            registry::PresetRegistry,
            sink::SharedStyleSheet,
            storage::MemoryStorage,
        },
        upload::{HttpTransport, UploadEngine, UploadEvent},
    },
    clap::{Parser, Subcommand},
    color_eyre::{
        Section,
        eyre::{Context, OptionExt, Result, bail},
    },
    hashbrown::HashMap,
    indicatif::{MultiProgress, ProgressBar, ProgressStyle},
    schemars::generate::SchemaSettings,
    std::{path::PathBuf, sync::Arc},
    tokio::sync::broadcast::error::RecvError,
    uuid::Uuid,
};

/// the CLI
#[derive(Parser, Debug)]
#[command(name = "layera", version, about = "Layera theme tokens, file checks and uploads")]
pub struct Cli {
    /// what to do
    #[command(subcommand)]
    pub command: Command,
}

/// the subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the CSS variables of a theme
    Css {
        /// light, dark or system
        #[arg(short, long, default_value = "system")]
        theme: ThemeChoice,

        /// The preset to render (defaults to the configured one)
        #[arg(short, long)]
        preset: Option<String>,

        /// Pretend the OS prefers dark (only matters for `--theme system`)
        #[arg(long)]
        prefers_dark: bool,

        /// Apply the high contrast policy
        #[arg(long)]
        high_contrast: bool,

        /// Apply the reduced motion policy
        #[arg(long)]
        reduced_motion: bool,
    },

    /// List the built-in presets
    Presets,

    /// Check files against the configured validation rules
    Validate {
        /// The files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload files to the configured endpoint
    Upload {
        /// The files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Override the upload endpoint
        #[arg(long)]
        url: Option<String>,

        /// Override how many uploads run at once
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
    },

    /// Inspect or create the configuration
    Config {
        /// what to do with it
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// config subcommands
#[derive(Subcommand, Debug, Clone, Copy)]
pub enum ConfigAction {
    /// Print the configuration in effect as TOML
    Show,
    /// Print where the global config file lives
    Path,
    /// Print the JSON schema of the config file
    Schema,
    /// Write the default config to the global location
    Init,
}

impl Cli {
    /// run the parsed command
    ///
    /// # Errors
    ///
    /// returns an error if the command fails
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Css {
                theme,
                preset,
                prefers_dark,
                high_contrast,
                reduced_motion,
            } => {
                let media = MediaPreferences {
                    prefers_dark,
                    reduced_motion,
                    high_contrast,
                };
                println!("{}", Self::render_css(theme, preset, media)?);
            }
            Command::Presets => Self::list_presets(),
            Command::Validate { files, json } => Self::validate(files, json).await?,
            Command::Upload {
                files,
                url,
                concurrency,
            } => Self::upload(files, url, concurrency).await?,
            Command::Config { action } => Self::config(action)?,
        }

        Ok(())
    }

    /// render the stylesheet for a theme without touching persisted state
    fn render_css(theme: ThemeChoice, preset: Option<String>, media: MediaPreferences) -> Result<String> {
        let mut settings = getopt!()?.theme_settings();
        settings.default_theme = theme;

        let id = preset.unwrap_or_else(|| settings.preset.clone());
        let tokens = PresetRegistry::new()
            .get_tokens(&id)
            .ok_or_eyre(format!("unknown theme preset '{id}'"))
            .suggestion("run `layera presets` to see what's available")?;

        let sheet = SharedStyleSheet::new(settings.selector.as_str());
        let engine = ThemeEngine::new(
            settings,
            tokens,
            ThemeHost {
                sink: Box::new(sheet.clone()),
                storage: Box::new(MemoryStorage::new()),
                media,
            },
        );
        engine.destroy();

        Ok(sheet.to_css())
    }

    /// print every preset
    fn list_presets() {
        let registry = PresetRegistry::new();
        let with_dark = registry.list_with_dark_variant();

        for id in registry.list_presets() {
            let Some(meta) = registry.get_metadata(id) else {
                continue;
            };

            let tokens = meta.tokens();
            println!(
                "{:<10} {:<10} {} tokens{}",
                id,
                meta.name,
                tokens.keys().count(),
                if with_dark.contains(&id) { ", dark variant" } else { "" }
            );

            if let Some(primary) = tokens.get("color-primary", ResolvedTheme::Light) {
                println!("{:<10} primary {}", "", primary);
            }
        }
    }

    /// load every path as a blob
    async fn load_blobs(paths: Vec<PathBuf>) -> Result<Vec<FileBlob>> {
        let mut blobs = Vec::with_capacity(paths.len());
        for path in paths {
            let blob = FileBlob::from_path(&path)
                .await
                .wrap_err_with(|| format!("failed to read '{}'", path.display()))?;
            blobs.push(blob);
        }
        Ok(blobs)
    }

    /// print a validation report
    fn print_report(blobs: &[FileBlob], report: &ListValidation) {
        for (blob, result) in blobs.iter().zip(&report.files) {
            let mark = if result.is_valid { "ok " } else { "err" };
            println!("[{}] {}", mark, blob.name);

            for issue in &result.errors {
                println!("      error   {}", issue);
            }
            for issue in &result.warnings {
                println!("      warning {}", issue);
            }
        }

        for issue in &report.errors {
            println!("[err] {}", issue);
        }
    }

    /// check files against the configured rules
    async fn validate(paths: Vec<PathBuf>, json: bool) -> Result<()> {
        let rules = getopt!()?.validation_rules();
        let blobs = Self::load_blobs(paths).await?;
        let report = validate_files(&blobs, &rules);

        if json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            Self::print_report(&blobs, &report);
        }

        if !report.is_valid() {
            bail!("some files failed validation");
        }

        Ok(())
    }

    /// a progress bar for one upload
    fn upload_bar(multi: &MultiProgress, blob: &FileBlob) -> Result<ProgressBar> {
        let style = ProgressStyle::with_template(
            "{bar:40.cyan/blue} {bytes:>10}/{total_bytes:10} {binary_bytes_per_sec:>12} {msg}",
        )?
        .progress_chars("##-");

        let bar = multi.add(ProgressBar::new(blob.size));
        bar.set_style(style);
        bar.set_message(blob.name.clone());
        Ok(bar)
    }

    /// upload files with a progress bar each
    async fn upload(paths: Vec<PathBuf>, url: Option<String>, concurrency: Option<usize>) -> Result<()> {
        let (mut settings, http, rules) = {
            let cfg = getopt!()?;
            (
                cfg.upload_settings(),
                cfg.http.clone().unwrap_or_default(),
                cfg.validation_rules(),
            )
        };

        if let Some(url) = url {
            settings.url = url;
        }
        if let Some(n) = concurrency {
            settings.max_concurrent = n.max(1);
        }

        let blobs = Self::load_blobs(paths).await?;
        let report = validate_files(&blobs, &rules);
        if !report.is_valid() {
            Self::print_report(&blobs, &report);
            bail!("some files failed validation, nothing was uploaded");
        }

        settings.auto_start = false;
        let transport = HttpTransport::new(&settings, &http)
            .wrap_err("failed to build the upload client")
            .with_section(|| settings.url.clone())?;
        let engine = UploadEngine::new(settings, Arc::new(transport));
        let mut events = engine.events();

        let multi = MultiProgress::new();
        let bars = blobs
            .iter()
            .map(|blob| Self::upload_bar(&multi, blob))
            .collect::<Result<Vec<_>>>()?;
        let bars: HashMap<Uuid, ProgressBar> = engine.add_files(blobs).into_iter().zip(bars).collect();
        engine.start_all();

        let counts = loop {
            match events.recv().await {
                Ok(UploadEvent::Progress { id, bytes, .. }) => {
                    if let Some(bar) = bars.get(&id) {
                        bar.set_position(bytes);
                    }
                }
                Ok(UploadEvent::Completed { id, .. }) => {
                    if let Some(bar) = bars.get(&id) {
                        bar.finish_with_message(format!("{} done", bar.message()));
                    }
                }
                Ok(UploadEvent::Failed { id, error }) => {
                    if let Some(bar) = bars.get(&id) {
                        bar.abandon_with_message(format!("{} failed: {}", bar.message(), error));
                    }
                }
                Ok(UploadEvent::AllComplete { counts }) => break counts,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break engine.counts(),
            }
        };

        println!(
            "{} uploaded, {} failed, {} cancelled",
            counts.completed, counts.failed, counts.cancelled
        );

        if counts.failed > 0 {
            bail!("{} upload(s) failed", counts.failed);
        }

        Ok(())
    }

    /// handle `layera config ...`
    fn config(action: ConfigAction) -> Result<()> {
        match action {
            ConfigAction::Show => {
                let cfg = getopt!()?;
                println!("{}", toml::to_string_pretty(&*cfg)?);
            }
            ConfigAction::Path => {
                println!("{}", Layera::global_config_path()?.display());
            }
            ConfigAction::Schema => {
                let settings = SchemaSettings::draft2020_12().for_serialize();
                let generator = settings.into_generator();
                let schema = generator.into_root_schema_for::<Layera>();
                println!("{}", serde_json::to_string_pretty(&schema)?);
            }
            ConfigAction::Init => {
                let path = Layera::init_global()?;
                println!("config written to {}", path.display());
            }
        }

        Ok(())
    }
}
