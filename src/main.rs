//! Safe Bridge relay node
//!
//! Watches the bridge contract for burns and the native ledger for deposits.
//! Burns are released on the ledger; deposits are proposed as `mint` calls
//! through the Safe transaction service for the remaining owners to confirm.

use std::sync::Arc;

use eyre::WrapErr;
use safe_bridge::config::Config;
use safe_bridge::ledger::JsonRpcLedger;
use safe_bridge::registry::TokenRegistry;
use safe_bridge::safe_api::SafeServiceClient;
use safe_bridge::safe_tx::SafeDomain;
use safe_bridge::signer::SafeSigner;
use safe_bridge::transport::AlloyRpc;
use safe_bridge::watcher::RelayWatcher;
use safe_bridge::{Relay, RelaySettings};
use tracing::{debug, error, info, warn};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    info!("Starting Safe Bridge relay");

    let config = Config::load()?;
    info!(
        evm_rpc = %config.evm.rpc_url,
        chain_id = config.evm.chain_id,
        bridge = %config.evm.bridge_address,
        safe = %config.evm.safe_address,
        ledger_rpc = %config.ledger.rpc_url,
        "Configuration loaded"
    );

    let domain = config.safe_domain();
    if domain == SafeDomain::Legacy {
        warn!("Safe domain is not chain-bound; signatures are replayable across chains");
    }

    let registry = TokenRegistry::load(&config.ledger.token_registry_path)
        .wrap_err("Failed to load token registry")?;
    let signer = SafeSigner::from_private_key(config.evm.private_key.expose())
        .wrap_err("Failed to load Safe owner key")?;
    info!(owner = %signer.address(), "Safe owner key loaded");

    let rpc = AlloyRpc::new(&config.evm.rpc_url)?;
    let safe_api = SafeServiceClient::new(&config.evm.safe_api_url)?;
    let ledger = JsonRpcLedger::new(&config.ledger.rpc_url)?;

    let settings = RelaySettings {
        bridge: config.evm.bridge_address,
        safe: config.evm.safe_address,
        domain,
        fees: config.fees,
    };
    let relay = Relay::new(
        settings,
        Arc::new(registry),
        signer,
        Arc::new(rpc),
        Arc::new(safe_api),
        Arc::new(ledger),
    )?;

    let mut watcher = RelayWatcher::new(Arc::new(relay), config.watcher_config());

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);

    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });

    watcher.run(shutdown_rx).await?;

    debug!(metrics = %safe_bridge::metrics::render(), "Final metrics");
    info!("Safe Bridge relay stopped");
    Ok(())
}

/// `RUST_LOG` filter, plain text by default or JSON with `LOG_FORMAT=json`
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,safe_bridge=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true))
            .with(filter)
            .init();
    }
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
