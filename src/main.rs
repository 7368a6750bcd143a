use {
    clap::Parser,
    color_eyre::{Result, eyre::Context},
    layera::{
        app::{cli::Cli, logging},
        config::instance::init_config,
    },
    tracing::debug,
};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_config()?;
    logging::setup().wrap_err("failed to set up logging")?;

    debug!(command = ?cli.command, "running");
    cli.run().await
}
