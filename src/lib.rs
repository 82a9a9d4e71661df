pub mod adapters;
pub mod alerts;
pub mod app;
pub mod auth;
pub mod broker;
pub mod config;
pub mod error;
pub mod ports;
pub mod schedule;
pub mod state;
pub mod templates;
pub mod types;

#[cfg(test)]
mod test_support;

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::{error, info};

use crate::adapters::{
    Inventory, InventoryError, LogMailer, MemoryAlertStore, TokioTimeProvider,
};
use crate::alerts::{AlertGenerator, NotificationDispatcher, RunSummary};
use crate::auth::AuthError;
use crate::broker::ConnectionRegistry;
use crate::config::{AppConfig, NotifyConfig};
use crate::ports::{MailChannel, MailError, SourceError};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("failed to load inventory: {0}")]
    Inventory(#[from] InventoryError),
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error("mail is disabled: set mail_from to enable it")]
    MailDisabled,
    #[error("failed to render mail: {0}")]
    Render(#[from] askama::Error),
    #[error(transparent)]
    Mail(#[from] MailError),
}

fn load_inventory(path: Option<&Path>) -> Result<Inventory, CommandError> {
    let Some(path) = path else {
        info!("no inventory configured, starting with an empty one");
        return Ok(Inventory::default());
    };
    let inventory = Inventory::load(path)?;
    info!(
        path = %path.display(),
        users = inventory.user_count(),
        items = inventory.item_count(),
        "inventory loaded"
    );
    Ok(inventory)
}

/// Serves HTTP until Ctrl-C, running the scheduled jobs in the background.
pub async fn serve(config: AppConfig) -> Result<(), CommandError> {
    let inventory = load_inventory(config.inventory.as_deref())?;
    let state = state::AppState::new(config, MemoryAlertStore::new(), inventory)?;
    state.start_jobs();

    let listener = tokio::net::TcpListener::bind(state.config.bind).await?;
    info!(addr = %listener.local_addr()?, "listening");

    let registry = Arc::clone(&state.registry);
    let result = axum::serve(listener, app::app(state.clone()))
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Open streams only end once their sessions are closed.
            registry.close_all();
        })
        .await;

    state.stop_jobs();
    state.registry.close_all();
    result.map_err(CommandError::from)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

/// Runs the generator once against the inventory with a fresh in-memory store.
pub async fn run_alerts_once(
    notify: &NotifyConfig,
    inventory: Option<&Path>,
) -> Result<RunSummary, CommandError> {
    let inventory = load_inventory(inventory)?;
    let store = MemoryAlertStore::new();
    let registry = Arc::new(ConnectionRegistry::new(notify.session_buffer));
    let mut dispatcher = NotificationDispatcher::new(store.clone(), registry);
    if let Some(from) = notify.mail_from.as_deref() {
        dispatcher = dispatcher.with_mail(LogMailer, from);
    }
    let generator = AlertGenerator::new(
        store,
        inventory.clone(),
        inventory,
        dispatcher,
        TokioTimeProvider,
        notify,
    );
    let summary = generator.run_and_flush_mail().await?;
    Ok(summary)
}

pub async fn send_test_mail(notify: &NotifyConfig, to: &str) -> Result<(), CommandError> {
    let from = notify.mail_from.as_deref().ok_or(CommandError::MailDisabled)?;
    let message = alerts::mail::render_test_mail(from, to.trim())?;
    LogMailer.send(&message).await?;
    Ok(())
}
