#![allow(clippy::result_large_err)]

use std::env;

use dotenvy::dotenv;
use grocesplit::assistant::{Assistant, GenerativeAssistant};
use grocesplit::config::AppConfig;
use grocesplit::errors::Result;
use grocesplit::sync::GroceryService;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

async fn report(service: &GroceryService, viewer: &str) {
    match service.dashboard(viewer).await {
        Ok(stats) => info!(
            "Fridge: {} items worth {:.2} | outstanding {:.2} | {} owes {:.2}",
            stats.fridge_count,
            stats.fridge_value,
            stats.total_outstanding,
            viewer,
            stats.viewer_debt
        ),
        Err(e) => error!("Failed to compute dashboard: {}", e),
    }
    match (service.balances(viewer).await, service.members().await) {
        (Ok(balances), Ok(members)) => {
            for (member, owed) in balances.in_roster_order(&members) {
                if owed > 0.0 {
                    info!("  {} owes {:.2}", member.name, owed);
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => error!("Failed to compute balances: {}", e),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load configuration and open the service
    let config = AppConfig::from_env()?;
    let service = GroceryService::from_config(&config)
        .await
        .inspect(|s| info!("Grocery service ready (remote: {})", s.is_remote()))
        .inspect_err(|e| error!("Failed to start grocery service: {}", e))?;

    let viewer = env::var("GROCESPLIT_VIEWER").unwrap_or_else(|_| "u1".to_string());

    // 4. Optional assistant for a recipe idea on startup
    let assistant = match &config.assistant {
        Some(settings) => match GenerativeAssistant::new(settings, config.sync.remote_timeout) {
            Ok(assistant) => Some(assistant),
            Err(e) => {
                warn!("Assistant disabled: {}", e);
                None
            }
        },
        None => None,
    };
    let idea = service
        .suggest_recipe(assistant.as_ref().map(|a| a as &dyn Assistant))
        .await?;
    info!("Recipe idea: {}", idea);

    // 5. Follow both collections until interrupted
    let mut members = service.subscribe_members().await?;
    let mut items = service.subscribe_items().await?;
    loop {
        tokio::select! {
            Some(roster) = members.next() => {
                info!("Roster has {} members", roster.len());
            }
            Some(snapshot) = items.next() => {
                info!("Ledger has {} items", snapshot.len());
                report(&service, &viewer).await;
            }
            _ = tokio::signal::ctrl_c() => {
                info!(
                    "Shutting down; flushing {} pending remote writes",
                    service.pending_remote_writes()
                );
                break;
            }
        }
    }

    members.unsubscribe();
    items.unsubscribe();
    service.flush_remote().await;
    Ok(())
}
