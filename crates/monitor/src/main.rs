use std::sync::Arc;

use livewatch_common::config::AppConfig;
use livewatch_common::types::{IdentitySeed, Mode};
use livewatch_monitor::cooldown::NotificationCooldown;
use livewatch_monitor::session::SessionLoop;
use livewatch_notifier::{LogNotifier, Notifier, SendGridConfig, SendGridNotifier};
use livewatch_resolver::{HttpClientConfig, LiveResolver, ReqwestHttpClient, ResolverSettings};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "livewatch=info,livewatch_monitor=info,livewatch_resolver=info,livewatch_notifier=info"
                    .into()
            }),
        )
        .json()
        .init();

    tracing::info!("LiveWatch starting...");

    // Load configuration
    let config = AppConfig::from_env()?;
    let seed = IdentitySeed::new(
        config.source_url.clone(),
        config.username.clone(),
        config.room_id.clone(),
    )?;

    // Resolve the identity through the proxy, if one is configured
    let resolution_client = ReqwestHttpClient::new(&HttpClientConfig::for_resolution(&config))?;
    let resolver = match LiveResolver::new(
        Arc::new(resolution_client),
        config.mode,
        seed,
        ResolverSettings::from_config(&config),
    )
    .await
    {
        Ok(resolver) => resolver,
        Err(e) if e.is_fatal() => {
            tracing::error!(error = %e, "Unexpected failure while resolving identity, terminating");
            std::process::exit(1);
        }
        Err(e) => {
            tracing::error!(error = %e, "Unable to resolve identity");
            std::process::exit(1);
        }
    };

    match resolver.identity() {
        Some(identity) => tracing::info!(
            username = %identity.username,
            room_id = %identity.room_id,
            blacklisted = resolver.is_blacklisted(),
            "Watching user"
        ),
        None => tracing::info!(
            username = %resolver.username(),
            blacklisted = resolver.is_blacklisted(),
            "Watching user, no live room yet"
        ),
    }

    // Poll without the proxy
    let polling_client = ReqwestHttpClient::new(&HttpClientConfig::for_polling(&config))?;
    let resolver = resolver.with_client(Arc::new(polling_client));

    let notifier: Arc<dyn Notifier> = match SendGridConfig::from_app_config(&config) {
        Some(sendgrid) => Arc::new(SendGridNotifier::new(sendgrid)),
        None => {
            tracing::warn!("SENDGRID_API_KEY not set, live notifications will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let cooldown = NotificationCooldown::try_from_minutes(config.notify_cooldown_minutes)
        .ok_or_else(|| anyhow::anyhow!("NOTIFY_COOLDOWN_MINUTES is out of range"))?;
    let mut session = SessionLoop::new(resolver, notifier, cooldown);

    match config.mode {
        Mode::Manual => match session.run_manual().await {
            Ok(Some(live_url)) => {
                tracing::info!(live_url = %live_url, "User is live, hand the URL to the recorder");
            }
            Ok(None) => {
                tracing::info!("No live source available");
            }
            Err(e) => {
                tracing::error!(error = %e, "Unable to fetch live source");
                std::process::exit(1);
            }
        },
        Mode::Automatic => {
            // Run with graceful shutdown on Ctrl+C
            tokio::select! {
                _ = session.run_automatic() => {}
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received shutdown signal, stopping gracefully...");
                }
            }
        }
    }

    tracing::info!("LiveWatch stopped.");
    Ok(())
}
