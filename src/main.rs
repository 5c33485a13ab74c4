//! Game server status bot entry point.

use std::sync::Arc;

use log::{error, info};
use serenity::all::{Client, GatewayIntents};
use tokio::signal;
use tokio::sync::mpsc;

mod bot;
mod config;
mod format;
mod ledger;
mod poller;
mod publish;
mod query;
mod reconciler;
mod registry;
mod scheduler;
mod types;

use bot::{Handler, Startup};
use config::Config;
use format::Formatter;
use ledger::Ledger;
use poller::Poller;
use query::A2sQuery;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cfg = Config::load()?;
    let endpoints = registry::load(&cfg.servers)?;

    let ledger = Ledger::load(&cfg.post_id_file).await;
    info!(
        "Loaded {} published message(s) from {}",
        ledger.len(),
        cfg.post_id_file.display()
    );

    let (fatal, mut fatal_rx) = mpsc::channel(1);
    let handler = Handler::new(Startup {
        endpoints,
        poller: Poller::new(A2sQuery::new(cfg.query_timeout(), cfg.query_port_offset)),
        formatter: Formatter::new(cfg.thumbnail_url.clone()),
        ledger,
        period: cfg.update_interval(),
        fatal,
    });

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES;
    let mut client = Client::builder(&cfg.discord_token, intents)
        .event_handler(handler)
        .await?;
    let shard_manager = Arc::clone(&client.shard_manager);

    tokio::select! {
        res = client.start() => {
            if let Err(e) = res {
                error!("Discord client stopped: {}", e);
                return Err(e.into());
            }
        }
        Some(e) = fatal_rx.recv() => {
            error!("Stopping: {}", e);
            shard_manager.shutdown_all().await;
            return Err(e.into());
        }
        res = signal::ctrl_c() => match res {
            Ok(()) => info!("Received Ctrl+C, shutting down..."),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        },
    }

    shard_manager.shutdown_all().await;
    info!("Shutdown complete.");
    Ok(())
}
