//! config singleton management stuff
use {
    crate::config::options::Layera,
    color_eyre::{Result, eyre::Context},
    std::sync::{LazyLock, RwLock, RwLockReadGuard, RwLockWriteGuard},
    tracing::warn,
};

/// global config instance
static CONFIG: LazyLock<RwLock<Layera>> = LazyLock::new(|| {
    RwLock::new(Layera::load().unwrap_or_else(|e| {
        warn!("falling back to default configuration: {:#}", e);
        Layera::default()
    }))
});

/// init the config explicitly
pub fn init_config() -> Result<()> {
    let _l = config()?;
    Ok(())
}

/// get a ro ref to the config
pub fn config() -> Result<RwLockReadGuard<'static, Layera>> {
    CONFIG
        .read()
        .map_err(|e| color_eyre::eyre::eyre!("Configuration lock poisoned: {}", e))
}

/// get a rw ref to the config
pub fn config_mut() -> Result<RwLockWriteGuard<'static, Layera>> {
    CONFIG
        .write()
        .map_err(|e| color_eyre::eyre::eyre!("Configuration lock poisoned: {}", e))
}

/// reload cfg from disk
pub fn reload_config() -> Result<()> {
    let new_config = Layera::load().wrap_err("Failed to reload config from disk")?;
    let mut config = config_mut().wrap_err("failed to acquire write lock for cfg reload")?;

    *config = new_config;

    Ok(())
}

/// get a specific config value with a default fallback
pub fn get_or_default<T, F>(getter: F, default: T) -> T
where
    F: FnOnce(&Layera) -> Option<T>,
    T: Clone,
{
    config()
        .ok()
        .and_then(|cfg| getter(&cfg))
        .unwrap_or(default)
}
