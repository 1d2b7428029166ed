use std::process;

use anyhow::{Result, anyhow};
use crc_mutate_webhook::{
    WebhookServer, cli,
    config::{self, Config},
    tracing::setup_tracing,
};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let matches = cli::build_cli().get_matches();
    let config = match Config::from_args(&matches) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            process::exit(1);
        }
    };

    if let Err(e) = setup_tracing(&config.log_level, &config.log_fmt, config.log_no_color) {
        eprintln!("Cannot setup tracing: {e}");
        process::exit(1);
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "fatal error");
        process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Cannot install the ring crypto provider"))?;

    info!(
        service = config::SERVICE_NAME,
        version = env!("CARGO_PKG_VERSION"),
        address = %config.addr,
        tls = config.tls_config.is_some(),
        "starting"
    );

    let server = WebhookServer::new_from_config(config).await?;
    server.run().await
}
