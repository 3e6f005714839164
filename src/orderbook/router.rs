//! Per-pair command routing.
//!
//! A `DashMap` keyed by pair, each entry owning that pair's state. Each
//! pair gets exactly one `tokio` task running its [`Matcher`], fed by a
//! bounded `mpsc` channel. Same-producer-same-pair ordering falls directly
//! out of `mpsc`'s FIFO delivery; a full queue surfaces as
//! [`EngineError::Backpressure`] rather than blocking the caller.

use crate::config::{EngineConfig, PairConfig};
use crate::orderbook::book::Book;
use crate::orderbook::error::EngineError;
use crate::orderbook::event_bus::EventBus;
use crate::orderbook::matcher::Matcher;
use crate::orderbook::sequencer::{EngineCommand, Journal, JournalRecord};
use crate::orderbook::snapshot;
use crate::orderbook::stp::StpPolicy;
use crate::utils::current_time_millis;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Routes commands to the right pair's single-writer matcher task, and
/// owns the registry of which pairs are live.
pub struct CommandRouter {
    queues: DashMap<String, mpsc::Sender<EngineCommand>>,
    config: EngineConfig,
    event_bus: Arc<EventBus>,
}

impl CommandRouter {
    /// A router with no pairs registered yet. Events from every pair this
    /// router drives are published through `event_bus`.
    pub fn new(config: EngineConfig, event_bus: Arc<EventBus>) -> Self {
        Self {
            queues: DashMap::new(),
            config,
            event_bus,
        }
    }

    /// Bring up a pair: constructs its [`Matcher`] and spawns the task
    /// that owns it for the lifetime of the process (or until the pair
    /// halts). Replacing an already-registered pair's queue entry here
    /// would orphan its old task, so callers must not register the same
    /// pair twice.
    pub fn register_pair(
        &self,
        pair_config: PairConfig,
        stp_policy: StpPolicy,
        journal: Option<Arc<dyn Journal>>,
    ) {
        let pair = pair_config.pair.clone();
        let mut matcher = Matcher::new(Book::new(pair_config), self.config.clone())
            .with_stp_policy(stp_policy);
        if let Some(journal) = journal.clone() {
            matcher = matcher.with_journal(journal);
        }
        info!(pair = %pair, "pair registered");
        self.spawn_pair_task(pair, matcher);
    }

    /// Attach `matcher` (already holding its recovered or fresh `Book`) to
    /// a bounded command queue and spawn the task that owns it for the
    /// rest of its lifetime. Shared by [`Self::register_pair`] and
    /// [`Self::recover_pair`].
    fn spawn_pair_task(&self, pair: String, matcher: Matcher) {
        let (tx, mut rx) = mpsc::channel::<EngineCommand>(self.config.command_queue_capacity);
        self.queues.insert(pair.clone(), tx);
        self.event_bus.register_pair(&pair);

        let event_bus = self.event_bus.clone();
        let snapshot_depth = self.config.snapshot_depth;
        let snapshot_interval_ms = self.config.snapshot_interval_ms;
        tokio::spawn(async move {
            let mut snapshot_tick = (snapshot_interval_ms > 0)
                .then(|| tokio::time::interval(Duration::from_millis(snapshot_interval_ms)));
            loop {
                let command = match &mut snapshot_tick {
                    Some(tick) => tokio::select! {
                        biased;
                        command = rx.recv() => command,
                        _ = tick.tick() => {
                            let snap = snapshot::take(&matcher.book, snapshot_depth);
                            let seq = matcher.book.next_seq();
                            event_bus.publish(snap.into_event(seq, current_time_millis()));
                            continue;
                        }
                    },
                    None => rx.recv().await,
                };
                let Some(command) = command else { break };
                let now = current_time_millis();
                for event in matcher.handle(command, now) {
                    event_bus.publish(event);
                }
                if matcher.is_halted() {
                    warn!(pair = %pair, "matcher task exiting: pair halted");
                    break;
                }
            }
            debug!(pair = %pair, "matcher task stopped");
        });
    }

    /// Bring up a pair by replaying its journal history, then register it
    /// for live traffic exactly as [`Self::register_pair`] does
    /// (SPEC_FULL.md §4.I: "on restart, replay the log per pair in seq
    /// order; this must reconstruct a bit-identical Book").
    ///
    /// `Event` records are the matcher's own output and are not reapplied
    /// directly, but their `OrderAccepted`/`Trade` payloads are the source
    /// of truth for which `order_id`/`trade_id` the original run assigned
    /// at each `seq`; replaying every journaled `Command` with that id
    /// table seeded (see [`Matcher::with_replay_ids`]) reproduces them
    /// deterministically instead of minting new random ones. Replay starts
    /// from `sequence` (`0` for a full rebuild; a higher value to resume
    /// from a checkpoint).
    pub fn recover_pair(
        &self,
        pair_config: PairConfig,
        stp_policy: StpPolicy,
        journal: Arc<dyn Journal>,
        sequence: u64,
    ) -> Result<(), EngineError> {
        use crate::orderbook::sequencer::EventPayload;
        use std::collections::HashMap;

        let pair = pair_config.pair.clone();

        let mut commands = Vec::new();
        let mut ids_by_seq: HashMap<u64, String> = HashMap::new();
        for entry in journal.read_from(sequence)? {
            let entry = entry?;
            if entry.record.pair() != pair {
                continue;
            }
            match entry.record {
                JournalRecord::Command { ts, command, .. } => commands.push((ts, command)),
                JournalRecord::Event(event) => match event.payload {
                    EventPayload::OrderAccepted { order_id, .. } => {
                        ids_by_seq.insert(event.seq, order_id);
                    }
                    EventPayload::Trade { trade_id, .. } => {
                        ids_by_seq.insert(event.seq, trade_id);
                    }
                    _ => {}
                },
            }
        }

        let matcher = Matcher::new(Book::new(pair_config), self.config.clone())
            .with_stp_policy(stp_policy)
            .with_replay_ids(ids_by_seq);

        let replayed = commands.len();
        for (ts, command) in commands {
            matcher.replay(command, ts)?;
        }
        info!(pair = %pair, replayed, "pair recovered from journal");

        let matcher = matcher.with_journal(journal);
        self.spawn_pair_task(pair, matcher);
        Ok(())
    }

    /// Enqueue a command for its pair's matcher. Returns immediately;
    /// results arrive as events on the event bus. Fails fast rather than
    /// blocking when the pair's queue is full or the pair is unknown.
    pub fn submit(&self, command: EngineCommand) -> Result<(), EngineError> {
        let pair = command.pair().to_string();
        let queue = self
            .queues
            .get(&pair)
            .ok_or_else(|| EngineError::UnknownPair { pair: pair.clone() })?;
        queue.try_send(command).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => {
                warn!(pair = %pair, "command queue full, rejecting with backpressure");
                EngineError::Backpressure { pair }
            }
            mpsc::error::TrySendError::Closed(_) => EngineError::UnknownPair { pair },
        })
    }

    /// `true` if a pair has been registered (its task may since have
    /// exited after halting; this only reflects whether it was ever
    /// brought up).
    pub fn has_pair(&self, pair: &str) -> bool {
        self.queues.contains_key(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decimal::Decimal;
    use crate::orderbook::order::{OrderKind, Side, TimeInForce};
    use crate::orderbook::sequencer::EventPayload;
    use std::time::Duration;

    fn pair_config() -> PairConfig {
        PairConfig::new("BTC-USD", "0.01", "0.0001", "0.0001", 2, 4).unwrap()
    }

    #[tokio::test]
    async fn submitting_to_an_unregistered_pair_fails_fast() {
        let router = CommandRouter::new(EngineConfig::default(), Arc::new(EventBus::new(16)));
        let result = router.submit(EngineCommand::Cancel {
            pair: "BTC-USD".into(),
            order_id: "x".into(),
            user_id: "u1".into(),
        });
        assert!(matches!(result, Err(EngineError::UnknownPair { .. })));
    }

    #[tokio::test]
    async fn a_registered_pair_processes_a_submit_and_publishes_events() {
        let event_bus = Arc::new(EventBus::new(16));
        let router = CommandRouter::new(EngineConfig::default(), event_bus.clone());
        router.register_pair(pair_config(), StpPolicy::default(), None);
        let mut events = event_bus.subscribe("BTC-USD").unwrap();

        router
            .submit(EngineCommand::Submit {
                pair: "BTC-USD".into(),
                user_id: "u1".into(),
                side: Side::Buy,
                kind: OrderKind::Limit,
                qty: Decimal::parse_with_scale("1", 4).unwrap(),
                limit_price: Some(Decimal::parse_with_scale("100.00", 2).unwrap()),
                stop_price: None,
                time_in_force: TimeInForce::Gtc,
                expires_at: None,
                client_order_id: None,
            })
            .unwrap();

        let first = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("matcher task should publish within the timeout")
            .unwrap();
        assert!(matches!(first.payload, EventPayload::OrderAccepted { .. }));
    }
}
