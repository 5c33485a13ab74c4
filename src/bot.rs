//! Gateway event handling.
//!
//! The publishing loop needs an authenticated HTTP client, so it is only
//! started once the gateway reports `Ready`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info};
use serenity::all::{Context, EventHandler, Ready};
use tokio::sync::{mpsc, Mutex};

use crate::format::Formatter;
use crate::ledger::{Ledger, LedgerError};
use crate::poller::Poller;
use crate::publish::DiscordPublisher;
use crate::query::A2sQuery;
use crate::reconciler::Reconciler;
use crate::scheduler;
use crate::types::EndpointConfig;

/// Everything the publishing loop needs apart from the Discord client.
pub struct Startup {
    pub endpoints: Vec<EndpointConfig>,
    pub poller: Poller<A2sQuery>,
    pub formatter: Formatter,
    pub ledger: Ledger,
    pub period: Duration,
    /// Receives the error that stopped the loop.
    pub fatal: mpsc::Sender<LedgerError>,
}

pub struct Handler {
    startup: Mutex<Option<Startup>>,
}

impl Handler {
    pub fn new(startup: Startup) -> Self {
        Self {
            startup: Mutex::new(Some(startup)),
        }
    }

    /// Hand out the startup state exactly once; later `Ready` events after
    /// a reconnect must not start a second loop.
    async fn take(&self) -> Option<Startup> {
        self.startup.lock().await.take()
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Logged in as {}", ready.user.tag());

        let Some(startup) = self.take().await else {
            debug!("Reconnected; publishing loop already running");
            return;
        };
        let Startup {
            endpoints,
            poller,
            formatter,
            ledger,
            period,
            fatal,
        } = startup;

        let publisher = DiscordPublisher::new(Arc::clone(&ctx.http));
        let mut reconciler = Reconciler::new(endpoints, poller, formatter, publisher, ledger);
        info!("Update interval: {} minute(s)", period.as_secs() / 60);

        tokio::spawn(async move {
            if let Err(e) = scheduler::run(period, &mut reconciler).await {
                let _ = fatal.send(e).await;
            }
        });
    }
}
