use anyhow::Context;
use clap::Parser;
use secretdrop::{
    api::shutdown_on_ctrl_c,
    cli::{Cli, Commands},
    config::AppConfig,
    observability::{init_observability, log_config_info},
    startup, APP_NAME, VERSION,
};
use tracing::{error, info};

fn install_rustls_provider() {
    use rustls::crypto::{ring, CryptoProvider};

    if CryptoProvider::get_default().is_none() {
        ring::default_provider().install_default().expect("install ring crypto provider");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    install_rustls_provider();

    let cli = Cli::parse();
    cli.load_env_file()?;

    let mut config = AppConfig::from_env().context("invalid configuration")?;
    cli.apply_overrides(&mut config);

    if cli.subcommand() == Commands::CheckConfig {
        println!("{config}");
        return Ok(());
    }

    init_observability(&config.observability)?;
    info!(app_name = APP_NAME, version = VERSION, "Starting secretdrop");
    log_config_info(&config);

    if let Err(e) = startup::run(config, shutdown_on_ctrl_c()).await {
        error!(error = %e, "secretdrop stopped with an error");
        return Err(e.into());
    }

    info!("secretdrop stopped");
    Ok(())
}
