//! One query → format → publish pass over every endpoint.
//!
//! Each endpoint maps to at most one live message.  If the ledger has no
//! message for it, a new one is created; if it has one, that message is
//! edited in place, and any failure to do so is treated as the message
//! being gone, so a fresh one is created and recorded instead.  "Never
//! published" and "published then deleted" therefore converge on the
//! same path.

use std::fmt;

use async_trait::async_trait;
use log::{error, info, warn};

use crate::format::{DisplayPayload, Formatter};
use crate::ledger::{Ledger, LedgerError};
use crate::poller::Poller;
use crate::publish::{PublishError, Publisher};
use crate::query::ServerQuery;
use crate::scheduler::Job;
use crate::types::{EndpointConfig, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No channel configured.
    Skipped,
    Edited,
    Created,
    /// The recorded message could not be edited and was replaced.
    Recreated,
    Failed,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub outcomes: Vec<(String, Outcome)>,
}

impl CycleReport {
    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.iter().filter(|(_, o)| *o == outcome).count()
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} edited, {} recreated, {} skipped, {} failed",
            self.count(Outcome::Created),
            self.count(Outcome::Edited),
            self.count(Outcome::Recreated),
            self.count(Outcome::Skipped),
            self.count(Outcome::Failed)
        )
    }
}

/// Application state for the publishing loop, built once in `main`.
pub struct Reconciler<Q, P> {
    endpoints: Vec<EndpointConfig>,
    poller: Poller<Q>,
    formatter: Formatter,
    publisher: P,
    ledger: Ledger,
}

impl<Q: ServerQuery, P: Publisher> Reconciler<Q, P> {
    pub fn new(
        endpoints: Vec<EndpointConfig>,
        poller: Poller<Q>,
        formatter: Formatter,
        publisher: P,
        ledger: Ledger,
    ) -> Self {
        Self {
            endpoints,
            poller,
            formatter,
            publisher,
            ledger,
        }
    }

    #[cfg(test)]
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Run one full cycle.
    ///
    /// Publishing problems are contained per endpoint; only a ledger write
    /// failure aborts the cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, LedgerError> {
        let snapshots = self.poller.poll_all(&self.endpoints).await;
        let mut report = CycleReport::default();

        for snapshot in &snapshots {
            let payload = self.formatter.format(snapshot);
            let outcome = self.reconcile(snapshot, &payload).await?;
            report.outcomes.push((snapshot.endpoint.key(), outcome));
        }
        Ok(report)
    }

    async fn reconcile(
        &mut self,
        snapshot: &Snapshot,
        payload: &DisplayPayload,
    ) -> Result<Outcome, LedgerError> {
        let endpoint = &snapshot.endpoint;
        let Some(channel_id) = endpoint.channel_id.as_deref() else {
            return Ok(Outcome::Skipped);
        };
        let key = endpoint.key();

        if let Err(e) = self.publisher.fetch_channel(channel_id).await {
            error!("Error processing server {}: channel {}: {}", endpoint, channel_id, e);
            return Ok(Outcome::Failed);
        }

        let outcome = match self.ledger.get(&key) {
            Some(message_id) => {
                let message_id = message_id.to_string();
                match self.edit(channel_id, &message_id, payload).await {
                    Ok(()) => return Ok(Outcome::Edited),
                    Err(e) => {
                        warn!(
                            "Error fetching or editing message {} for {}: {}; posting a new one",
                            message_id, endpoint, e
                        );
                        Outcome::Recreated
                    }
                }
            }
            None => Outcome::Created,
        };

        let message_id = match self.publisher.send(channel_id, payload).await {
            Ok(id) => id,
            Err(e) => {
                error!("Error processing server {}: send failed: {}", endpoint, e);
                return Ok(Outcome::Failed);
            }
        };
        info!("Created message {} for {}", message_id, endpoint);
        self.ledger.put(&key, &message_id).await?;
        Ok(outcome)
    }

    async fn edit(
        &self,
        channel_id: &str,
        message_id: &str,
        payload: &DisplayPayload,
    ) -> Result<(), PublishError> {
        self.publisher.fetch_message(channel_id, message_id).await?;
        info!("Editing message ID: {}", message_id);
        self.publisher.edit(channel_id, message_id, payload).await
    }
}

#[async_trait]
impl<Q: ServerQuery, P: Publisher> Job for Reconciler<Q, P> {
    type Error = LedgerError;

    async fn run_once(&mut self) -> Result<(), LedgerError> {
        let report = self.run_cycle().await?;
        info!("Cycle complete: {}", report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::OFFLINE_COLOR;
    use crate::query::{QueryError, ServerState};
    use crate::types::ServerStatus;
    use std::collections::{HashMap, HashSet};
    use std::sync::{Arc, Mutex};
    use tempfile::{tempdir, TempDir};

    /// Answers for hosts named "up*", fails for everything else.
    #[derive(Default, Clone)]
    struct FakeQuery {
        queried: Arc<Mutex<Vec<String>>>,
    }

    impl FakeQuery {
        fn queried(&self) -> Vec<String> {
            self.queried.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ServerQuery for FakeQuery {
        async fn query(&self, host: &str, port: u16) -> Result<ServerState, QueryError> {
            self.queried.lock().unwrap().push(host.to_string());
            if !host.starts_with("up") {
                return Err(QueryError::Timeout);
            }
            Ok(ServerState {
                name: format!("{} server", host),
                map: "Altis".into(),
                numplayers: 5,
                maxplayers: 40,
                ping: Some(25),
                password: false,
                version: "2.18".into(),
                connect: format!("{}:{}", host, port),
                game: "Escape".into(),
            })
        }
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Send { channel: String, title: String },
        Edit { message: String },
    }

    #[derive(Default)]
    struct FakeState {
        next_id: u64,
        messages: HashMap<String, DisplayPayload>,
        calls: Vec<Call>,
    }

    #[derive(Default)]
    struct FakePublisher {
        state: Mutex<FakeState>,
        broken_channels: HashSet<String>,
    }

    impl FakePublisher {
        fn calls(&self) -> Vec<Call> {
            self.state.lock().unwrap().calls.clone()
        }

        fn delete(&self, message_id: &str) {
            self.state.lock().unwrap().messages.remove(message_id);
        }

        fn message(&self, message_id: &str) -> DisplayPayload {
            self.state.lock().unwrap().messages[message_id].clone()
        }
    }

    fn not_found() -> PublishError {
        PublishError::NotFound
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        async fn fetch_channel(&self, channel_id: &str) -> Result<(), PublishError> {
            if self.broken_channels.contains(channel_id) {
                return Err(not_found());
            }
            Ok(())
        }

        async fn fetch_message(&self, _channel: &str, message_id: &str) -> Result<(), PublishError> {
            if self.state.lock().unwrap().messages.contains_key(message_id) {
                Ok(())
            } else {
                Err(not_found())
            }
        }

        async fn edit(
            &self,
            _channel: &str,
            message_id: &str,
            payload: &DisplayPayload,
        ) -> Result<(), PublishError> {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::Edit {
                message: message_id.into(),
            });
            match state.messages.get_mut(message_id) {
                Some(existing) => {
                    *existing = payload.clone();
                    Ok(())
                }
                None => Err(not_found()),
            }
        }

        async fn send(
            &self,
            channel_id: &str,
            payload: &DisplayPayload,
        ) -> Result<String, PublishError> {
            let mut state = self.state.lock().unwrap();
            state.next_id += 1;
            let id = format!("m{}", state.next_id);
            state.calls.push(Call::Send {
                channel: channel_id.into(),
                title: payload.title.clone(),
            });
            state.messages.insert(id.clone(), payload.clone());
            Ok(id)
        }
    }

    fn endpoint(host: &str, channel: Option<&str>) -> EndpointConfig {
        EndpointConfig {
            host: host.into(),
            port: 2302,
            name: Some(host.to_uppercase()),
            channel_id: channel.map(Into::into),
        }
    }

    async fn reconciler_with(
        endpoints: Vec<EndpointConfig>,
        query: FakeQuery,
        publisher: FakePublisher,
    ) -> (TempDir, Reconciler<FakeQuery, FakePublisher>) {
        let dir = tempdir().unwrap();
        let ledger = Ledger::load(dir.path().join("post_id.json")).await;
        let reconciler = Reconciler::new(
            endpoints,
            Poller::new(query),
            Formatter::default(),
            publisher,
            ledger,
        );
        (dir, reconciler)
    }

    async fn reconciler(
        endpoints: Vec<EndpointConfig>,
        publisher: FakePublisher,
    ) -> (TempDir, Reconciler<FakeQuery, FakePublisher>) {
        reconciler_with(endpoints, FakeQuery::default(), publisher).await
    }

    #[tokio::test]
    async fn first_cycle_creates_one_message_per_endpoint() {
        let (dir, mut r) = reconciler(
            vec![endpoint("up", Some("c1")), endpoint("down", Some("c2"))],
            FakePublisher::default(),
        )
        .await;

        let report = r.run_cycle().await.unwrap();
        assert_eq!(report.count(Outcome::Created), 2);
        assert_eq!(
            r.publisher.calls(),
            [
                Call::Send {
                    channel: "c1".into(),
                    title: "up server".into()
                },
                Call::Send {
                    channel: "c2".into(),
                    title: "DOWN".into()
                },
            ]
        );

        let online = r.publisher.message(r.ledger().get("up:2302").unwrap());
        assert_eq!(online.field("👥 Players"), Some("5/40"));
        assert_eq!(online.field("🔱 Mission"), Some("Escape"));
        assert_eq!(online.footer.text, "IP: up:2302");

        let offline = r.publisher.message(r.ledger().get("down:2302").unwrap());
        assert_eq!(offline.color, OFFLINE_COLOR);
        assert!(offline.fields.is_empty());

        let persisted = Ledger::load(dir.path().join("post_id.json")).await;
        assert_eq!(persisted.len(), 2);
    }

    #[tokio::test]
    async fn second_cycle_edits_in_place() {
        let (_dir, mut r) = reconciler(vec![endpoint("up", Some("c1"))], FakePublisher::default()).await;
        r.run_cycle().await.unwrap();
        let first_id = r.ledger().get("up:2302").unwrap().to_string();

        let report = r.run_cycle().await.unwrap();
        assert_eq!(report.outcomes, [("up:2302".to_string(), Outcome::Edited)]);

        let calls = r.publisher.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1],
            Call::Edit {
                message: first_id.clone()
            }
        );
        assert_eq!(r.ledger().get("up:2302"), Some(first_id.as_str()));
    }

    #[tokio::test]
    async fn deleted_message_is_recreated_and_ledger_updated() {
        let (dir, mut r) = reconciler(vec![endpoint("up", Some("c1"))], FakePublisher::default()).await;
        r.run_cycle().await.unwrap();
        let first_id = r.ledger().get("up:2302").unwrap().to_string();
        r.publisher.delete(&first_id);

        let report = r.run_cycle().await.unwrap();
        assert_eq!(report.count(Outcome::Recreated), 1);

        let new_id = r.ledger().get("up:2302").unwrap().to_string();
        assert_ne!(new_id, first_id);
        let persisted = Ledger::load(dir.path().join("post_id.json")).await;
        assert_eq!(persisted.get("up:2302"), Some(new_id.as_str()));
        assert_eq!(persisted.len(), 1);
    }

    #[tokio::test]
    async fn ledger_from_previous_run_is_reused() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("post_id.json");
        let publisher = FakePublisher::default();
        let stale = Formatter::default().format(&Snapshot {
            endpoint: endpoint("up", Some("c1")),
            status: ServerStatus::Offline,
        });
        let existing = publisher.send("c1", &stale).await.unwrap();
        Ledger::load(&path).await.put("up:2302", &existing).await.unwrap();

        let mut r = Reconciler::new(
            vec![endpoint("up", Some("c1"))],
            Poller::new(FakeQuery::default()),
            Formatter::default(),
            publisher,
            Ledger::load(&path).await,
        );
        let report = r.run_cycle().await.unwrap();
        assert_eq!(report.count(Outcome::Edited), 1);
        assert_eq!(r.publisher.message(&existing).title, "up server");
    }

    #[tokio::test]
    async fn endpoint_without_channel_is_queried_but_not_published() {
        let query = FakeQuery::default();
        let (_dir, mut r) = reconciler_with(
            vec![endpoint("up-a", None), endpoint("up-b", Some("c1"))],
            query.clone(),
            FakePublisher::default(),
        )
        .await;
        let report = r.run_cycle().await.unwrap();

        assert_eq!(query.queried(), ["up-a", "up-b"]);

        assert_eq!(
            report.outcomes,
            [
                ("up-a:2302".to_string(), Outcome::Skipped),
                ("up-b:2302".to_string(), Outcome::Created),
            ]
        );
        assert_eq!(r.publisher.calls().len(), 1);
        assert_eq!(r.ledger().get("up-a:2302"), None);
    }

    #[tokio::test]
    async fn broken_channel_does_not_block_other_endpoints() {
        let publisher = FakePublisher {
            broken_channels: HashSet::from(["gone".to_string()]),
            ..Default::default()
        };
        let (_dir, mut r) = reconciler(
            vec![endpoint("up-a", Some("gone")), endpoint("up-b", Some("c1"))],
            publisher,
        )
        .await;
        let report = r.run_cycle().await.unwrap();

        assert_eq!(report.count(Outcome::Failed), 1);
        assert_eq!(report.count(Outcome::Created), 1);
        assert_eq!(r.ledger().get("up-a:2302"), None);
        assert!(r.ledger().get("up-b:2302").is_some());
    }

    #[tokio::test]
    async fn ledger_write_failure_aborts_cycle() {
        let dir = tempdir().unwrap();
        let ledger = Ledger::load(dir.path().join("missing").join("post_id.json")).await;
        let mut r = Reconciler::new(
            vec![endpoint("up", Some("c1"))],
            Poller::new(FakeQuery::default()),
            Formatter::default(),
            FakePublisher::default(),
            ledger,
        );
        assert!(r.run_once().await.is_err());
    }

    #[tokio::test]
    async fn empty_registry_runs_idle() {
        let (_dir, mut r) = reconciler(Vec::new(), FakePublisher::default()).await;
        let report = r.run_cycle().await.unwrap();
        assert!(report.outcomes.is_empty());
        assert!(r.publisher.calls().is_empty());
    }
}
