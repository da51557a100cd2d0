use anyhow::Context as _;
use backend::context::{spawn_deadline_scan, spawn_event_pump, spawn_session_evictor};
use backend::{AppContext, Config};

use atchess_crypto::EcdsaKey;
use atchess_firehose::FirehoseClient;
use atchess_oauth::{OAuthClient, OAuthConfig};
use atchess_pdr::{AuthScheme, PdrClient, RepoClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// In-flight work gets this long after shutdown begins
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env().map_err(anyhow::Error::msg)?;

    // Service account session
    let scheme = if config.dpop_enabled {
        AuthScheme::Dpop
    } else {
        AuthScheme::Bearer
    };
    let client = Arc::new(
        PdrClient::login(
            &config.pdr_url,
            &config.service_handle,
            &config.service_password,
            scheme,
        )
        .await
        .context("service account login failed")?,
    );
    let service_did = client.did().to_string();

    // OAuth needs the ES256 key from a file or the environment. A key that
    // is configured but unreadable is fatal; no key at all just means
    // password-only operation.
    let oauth = match EcdsaKey::load(
        config.oauth_key_path.as_deref(),
        backend::config::OAUTH_KEY_ENV,
    ) {
        Ok(key) => {
            let resolver: Arc<dyn RepoClient> = Arc::clone(&client) as Arc<dyn RepoClient>;
            Some(OAuthClient::new(
                key,
                OAuthConfig::new(&config.public_url),
                resolver,
            )?)
        }
        Err(e) if config.oauth_key_path.is_some() => {
            return Err(e).context("OAuth key is configured but unusable");
        }
        Err(e) => {
            warn!("[MAIN] OAuth disabled: {}", e);
            None
        }
    };

    let ctx = AppContext::new(
        Arc::clone(&client),
        &config.service_handle,
        &config.public_url,
        oauth,
    );
    ctx.processor.track_player(&service_did);

    // Track the service account's own active games for the deadline scan
    match ctx.list_active_games().await {
        Ok(games) => {
            for (uri, _, _) in &games {
                ctx.processor.track_game(uri);
            }
            info!("[MAIN] tracking {} active games", games.len());
        }
        Err(e) => warn!("[MAIN] could not list active games: {}", e),
    }

    let mut tasks = Vec::new();
    if let Some(oauth) = &ctx.oauth {
        tasks.push(spawn_session_evictor(Arc::clone(oauth)));
    }
    tasks.push(spawn_deadline_scan(
        Arc::clone(&ctx.service),
        Arc::clone(&ctx.processor),
    ));

    let firehose = if config.firehose_enabled {
        let (firehose, events) = FirehoseClient::new(&config.firehose_url, 256);
        tasks.push(spawn_event_pump(Arc::clone(&ctx.processor), events));
        Some(firehose.start())
    } else {
        info!("[MAIN] firehose disabled by configuration");
        None
    };

    info!(
        "[MAIN] atchess backend running as {} ({})",
        config.service_handle, service_did
    );
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("[MAIN] shutting down");

    // Stop ingest first, then give background work a bounded grace period
    if let Some(firehose) = firehose {
        let _ = tokio::time::timeout(SHUTDOWN_GRACE, firehose.stop()).await;
    }
    for task in tasks {
        task.abort();
    }
    info!("[MAIN] bye");
    Ok(())
}
