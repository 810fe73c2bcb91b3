use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::event::{EventCategory, EventKind, ServerEvent};
use crate::finalize::{FinalizeError, MatchFinalizer};
use crate::stats::{ApplyOutcome, Match, MatchOptions};

/// Final scores are announced once per team
const FINAL_SCORES_PER_GAME: u8 = 2;

/// Result of finalizing one server's match
#[derive(Debug)]
pub struct FinalizeReport {
    pub server_id: i32,
    pub correlation_id: Uuid,
    pub outcome: Result<i64, FinalizeError>,
}

struct ServerMatch {
    game: Match,
    final_scores: u8,
}

/// Routes server events to one match per server and hands finished matches
/// to the finalizer on a background task.
pub struct MatchIngestService {
    finalizer: Arc<MatchFinalizer>,
    options: MatchOptions,
    matches: HashMap<i32, ServerMatch>,
    reports: Option<mpsc::UnboundedSender<FinalizeReport>>,
    tasks: JoinSet<()>,
}

impl MatchIngestService {
    pub fn new(finalizer: Arc<MatchFinalizer>) -> Self {
        let options = MatchOptions::from(finalizer.config());
        Self {
            finalizer,
            options,
            matches: HashMap::new(),
            reports: None,
            tasks: JoinSet::new(),
        }
    }

    pub fn with_reports(mut self, reports: mpsc::UnboundedSender<FinalizeReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn active_matches(&self) -> usize {
        self.matches.len()
    }

    pub fn match_for(&self, server_id: i32) -> Option<&Match> {
        self.matches.get(&server_id).map(|m| &m.game)
    }

    /// Finalize tasks spawned and not yet reaped
    pub fn pending_finalizations(&self) -> usize {
        self.tasks.len()
    }

    /// Collects finalize tasks that already finished without waiting on the
    /// rest. Returns how many completed.
    pub fn reap(&mut self) -> usize {
        let mut completed = 0;
        while let Some(joined) = self.tasks.try_join_next() {
            if Self::settle(joined) {
                completed += 1;
            }
        }
        completed
    }

    fn settle(joined: Result<(), JoinError>) -> bool {
        match joined {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Finalize task failed");
                false
            }
        }
    }

    /// Applies one event. Returns `None` when the server has no match yet
    /// and the event cannot open one.
    pub fn handle(&mut self, event: ServerEvent) -> Option<ApplyOutcome> {
        self.reap();

        let ServerEvent {
            server_id,
            server_name,
            event,
        } = event;

        if !self.matches.contains_key(&server_id) {
            if event.kind.category() != EventCategory::Lifecycle {
                debug!(server_id, event_type = %event.kind, "No open match for server");
                return None;
            }
            debug!(server_id, server_name = %server_name, "Opening match");
            self.matches.insert(
                server_id,
                ServerMatch {
                    game: Match::new(server_id, server_name, self.options),
                    final_scores: 0,
                },
            );
        }

        let current = self.matches.get_mut(&server_id)?;
        let outcome = current.game.apply(&event).ok();

        let finished = match event.kind {
            EventKind::LogStop => true,
            EventKind::TeamFinalScore => {
                current.final_scores += 1;
                current.final_scores >= FINAL_SCORES_PER_GAME
            }
            _ => false,
        };
        if finished {
            self.finish(server_id);
        }

        outcome
    }

    fn finish(&mut self, server_id: i32) {
        let Some(current) = self.matches.remove(&server_id) else {
            return;
        };
        let sealed = current.game.seal();
        let correlation_id = sealed.correlation_id;
        info!(server_id, correlation_id = %correlation_id, "Match finished, finalizing");

        let finalizer = Arc::clone(&self.finalizer);
        let reports = self.reports.clone();
        self.tasks.spawn(async move {
            let outcome = finalizer.finalize(&sealed).await;
            if let Some(reports) = reports {
                let report = FinalizeReport {
                    server_id,
                    correlation_id,
                    outcome,
                };
                if reports.send(report).is_err() {
                    debug!(server_id, "Finalize report receiver dropped");
                }
            }
        });
    }

    /// Consumes events until the channel closes, reaping finalizations as
    /// they complete, then waits for the ones still in flight. Matches still
    /// open at that point are discarded.
    #[instrument(skip(self, events))]
    pub async fn run(mut self, mut events: mpsc::Receiver<ServerEvent>) {
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => {
                        self.handle(event);
                    }
                    None => break,
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    Self::settle(joined);
                }
            }
        }

        let open = self.matches.len();
        if open > 0 {
            warn!(open, "Event stream closed with unfinished matches, discarding");
            self.matches.clear();
        }
        self.drain().await;
    }

    /// Waits for every spawned finalization. Returns how many completed.
    pub async fn drain(&mut self) -> usize {
        let mut completed = 0;
        while let Some(joined) = self.tasks.join_next().await {
            if Self::settle(joined) {
                completed += 1;
            }
        }
        completed
    }
}
