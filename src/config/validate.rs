//! configuration validation stuff
use {
    crate::{config::options::*, validator, validator_nested},
    color_eyre::Result,
    url::Url,
};

/// trait for validating config structs
pub trait Validate {
    /// validate the config
    fn validate(&self) -> Result<(), Vec<String>>;

    /// check if the config is valid
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

validator! { HttpConfig,
    pool_max_idle_per_host => |v: &usize| *v > 0,
        "must be greater than 0";
    timeout_secs => |v: &u64| *v > 0,
        "must be greater than 0";
    connect_timeout_secs => |v: &u64| *v > 0,
        "must be greater than 0";
    user_agent => |v: &String| !v.trim().is_empty(),
        "must not be empty";
}

/// valid theme selectors must at least name something
fn is_selector(v: &String) -> bool {
    let v = v.trim();
    !v.is_empty() && !v.contains('{') && !v.contains('}')
}

validator! { ThemeCfg,
    preset => |v: &String| !v.trim().is_empty(),
        "must not be empty";
    storage_key => |v: &String| !v.trim().is_empty(),
        "must not be empty";
    state_dir => |v: &String| !v.trim().is_empty(),
        "must not be empty";
    selector => is_selector,
        "must be a non-empty css selector without braces";
    frame_interval_ms => |v: &u64| *v >= 1 && *v <= 1000,
        "must be between 1 and 1000";
}

impl Validate for UploadCfg {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors: Vec<String> = Vec::new();

        if let Some(ref v) = self.url
            && !Url::parse(v).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
        {
            errors.push("url: must be a valid http(s) url".to_string());
        }

        if let Some(v) = self.chunk_size_mb
            && v == 0
        {
            errors.push("chunk_size_mb: must be greater than 0".to_string());
        }

        if let Some(v) = self.max_concurrent
            && !(1..=16).contains(&v)
        {
            errors.push("max_concurrent: must be between 1 and 16".to_string());
        }

        if let Some(ref headers) = self.headers
            && headers.keys().any(|k| k.trim().is_empty())
        {
            errors.push("headers: header names must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

impl Validate for ValidationCfg {
    fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors: Vec<String> = Vec::new();

        if let Some(v) = self.max_file_size_mb
            && v == 0
        {
            errors.push("max_file_size_mb: must be greater than 0".to_string());
        }

        if let (Some(min), Some(max)) = (self.min_file_size_bytes, self.max_file_size_mb)
            && min > max.saturating_mul(1024 * 1024)
        {
            errors.push(
                "min_file_size_bytes must be less than or equal to max_file_size_mb".to_string(),
            );
        }

        if let Some(ref v) = self.allowed_extensions
            && v.iter().any(|ext| ext.trim().is_empty())
        {
            errors.push("allowed_extensions: extensions must not be empty strings".to_string());
        }

        if let Some(ref v) = self.allowed_mime_types
            && v.iter().any(|mime| !mime.contains('/'))
        {
            errors.push("allowed_mime_types: entries must look like `type/subtype`".to_string());
        }

        if let Some(v) = self.max_files
            && v == 0
        {
            errors.push("max_files: must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// valid log levels
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

validator! { LoggingConfig,
    level => |v: &String| VALID_LOG_LEVELS.contains(&v.to_lowercase().as_str()),
        "must be one of: trace, debug, info, warn, error, off";
}

validator_nested! { Layera,
    fields: {
        version => |v: &u32| *v == 1,
            "must be 1 (do not modify manually)";
    }
    nested: { theme; upload; validation; http; logging }
}

/// format validation errors for display
pub fn format_validation_errors(errors: &[String]) -> String {
    let mut output = String::from("Configuration validation failed:\n");
    for (i, err) in errors.iter().enumerate() {
        output.push_str(&format!("  {}. {}\n", i + 1, err));
    }
    output
}
