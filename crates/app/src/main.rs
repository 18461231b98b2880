//! Youthnet admin console
//!
//! Headless host for the admin session: restores or opens an admin
//! session, keeps its tokens fresh and polls the notification feed.

use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use youthnet_core::Database;
use youthnet_net::BackendClient;

mod config;
mod navigation;
mod notifications;
mod session;
mod state;
#[cfg(test)]
mod testing;

use config::{AppConfig, ConfigError};
use navigation::{ConsoleNavigator, Navigator};
use notifications::{unread_count, NotificationAggregator, NotificationPoller};
use session::SessionManager;

const EMAIL_ENV: &str = "YOUTHNET_EMAIL";
const PASSWORD_ENV: &str = "YOUTHNET_PASSWORD";

#[derive(Debug, thiserror::Error)]
enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Storage error: {0}")]
    Storage(#[from] youthnet_core::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Youthnet admin");

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run()) {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), StartupError> {
    let config = AppConfig::load()?;
    let data_dir = config.data_dir()?;
    std::fs::create_dir_all(&data_dir)?;
    let db = Arc::new(Mutex::new(Database::open(data_dir.join("youthnet.db"))?));
    info!(data_dir = %data_dir.display(), backend = %config.backend.url, "Configuration loaded");

    let client = Arc::new(BackendClient::new(config.backend()));
    let navigator = Arc::new(ConsoleNavigator::new("/admin"));
    let manager = Arc::new(SessionManager::new(
        client.clone(),
        client.clone(),
        db,
        navigator.clone(),
        config.session_timeouts(),
    ));

    let cancel = CancellationToken::new();
    let listener = manager.spawn_auth_listener();

    manager.restore_session().await;
    if manager.current_user_id().is_none() {
        sign_in_from_env(&manager).await;
    }
    if let Some(path) = manager.take_return_path() {
        navigator.redirect(&path);
    }

    let refresher = client.clone().spawn_auto_refresh(cancel.clone());
    let aggregator = Arc::new(NotificationAggregator::new(
        client.clone(),
        config.feed_limits(),
    ));
    let (poller, mut feed) = NotificationPoller::spawn(
        aggregator,
        manager.subscribe(),
        config.poll_interval(),
        cancel.clone(),
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
                let unread = unread_count(&feed.borrow_and_update());
                info!(unread, "Notifications updated");
                manager.refresh_user().await;
            }
        }
    }

    info!("Shutting down");
    cancel.cancel();
    listener.abort();
    let _ = tokio::join!(refresher, poller);
    Ok(())
}

async fn sign_in_from_env(manager: &SessionManager) {
    let (Ok(email), Ok(password)) = (std::env::var(EMAIL_ENV), std::env::var(PASSWORD_ENV)) else {
        warn!(
            "No session to restore and {} / {} are not set; staying signed out",
            EMAIL_ENV, PASSWORD_ENV
        );
        return;
    };

    match manager.sign_in(&email, &password).await {
        Ok(profile) => info!(name = profile.display_name(), role = %profile.role, "Admin session opened"),
        Err(e) => error!(error = %e, "Sign-in failed"),
    }
}
