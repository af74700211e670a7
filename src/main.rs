//! Avni server - administrative and sync backbone

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use avni_server::config::Args;
use avni_server::idp::build_idp;
use avni_server::messaging::{GlificGateway, MessageGateway, NoopGateway};
use avni_server::server::{self, AppState};
use avni_server::store::Registry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("avni_server={},info", args.log).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("======================================");
    info!("  Avni administrative and sync server");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Organisation: {}", args.organisation_id);
    info!("IDP: {}", args.idp_type);
    info!(
        "Messaging: {}",
        args.glific_base_url.as_deref().unwrap_or("disabled")
    );
    info!("======================================");

    let idp = match build_idp(&args) {
        Ok(idp) => idp,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let gateway: Arc<dyn MessageGateway> = match (&args.glific_base_url, &args.glific_api_key) {
        (Some(base_url), Some(api_key)) => Arc::new(GlificGateway::new(base_url, api_key)),
        _ => Arc::new(NoopGateway),
    };

    let registry = Arc::new(Registry::new());
    let state = Arc::new(AppState::new(args, registry, idp, gateway));

    server::run(state).await?;
    Ok(())
}
