//! Event Log Replay
//!
//! Feeds a recorded JSON-lines log through a live runtime, one event at a
//! time, and collects the resulting timelines. Each line is one object tagged
//! by `event`:
//!
//! ```text
//! {"event":"draft","ref":"d1","content":"on my way","createdAt":1704099600000}
//! {"event":"ack","ref":"d1","id":"m-41","createdAt":1704099600400}
//! {"event":"push","id":"m-42","senderId":"bob","receiverId":"alice","content":"ok"}
//! {"event":"failure","ref":"d2","failure":{"kind":"network","reason":"offline"}}
//! {"event":"retry","ref":"d2","as":"d3"}
//! {"event":"discard","ref":"d2"}
//! {"event":"viewport","scroll_offset":0.0,"viewport_height":640.0}
//! {"event":"clock","at":1704099660000}
//! ```
//!
//! `ref` labels a draft so later lines can address it. An ack carrying a
//! `ref` is joined to that draft exactly; without one it goes through the
//! regular heuristic. `retry` keeps the label on the failed original and
//! binds the resend to `as` when given.
//!
//! Drafts and pushes without a timestamp are stamped with the replay clock,
//! which tracks the latest time seen in the log.

use std::collections::HashMap;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chatline_core::channel::{AppEvent, AppEventReceiver, EffectReceiver};
use chatline_core::{
    ChatlineConfig, Disposition, Draft, IngestOutcome, LocalId, PushEvent, RawPayload, SendAck,
    SendFailure, TimeSource, TimelineSnapshot, Timestamp, UserId, ViewportMetrics,
};
use chatline_runtime::{ConversationHandle, RuntimeBuilder, RuntimeHandle};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// Log Format
// ----------------------------------------------------------------------------

/// One line of a replay log
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayEvent {
    Draft {
        #[serde(default, rename = "ref")]
        label: Option<String>,
        #[serde(flatten)]
        draft: Draft,
    },
    Ack {
        #[serde(default, rename = "ref")]
        label: Option<String>,
        #[serde(flatten)]
        ack: SendAck,
    },
    Push(PushEvent),
    Failure {
        #[serde(rename = "ref")]
        label: String,
        failure: SendFailure,
    },
    Retry {
        #[serde(rename = "ref")]
        label: String,
        #[serde(default, rename = "as")]
        new_label: Option<String>,
    },
    Discard {
        #[serde(rename = "ref")]
        label: String,
    },
    Viewport {
        #[serde(default)]
        with: Option<UserId>,
        scroll_offset: f32,
        viewport_height: f32,
    },
    Clock {
        at: u64,
    },
}

impl ReplayEvent {
    /// Time the event claims to have happened at, if any
    fn observed_at(&self) -> Option<u64> {
        match self {
            ReplayEvent::Draft { draft, .. } => draft.created_at,
            ReplayEvent::Ack { ack, .. } => ack.created_at.or(ack.timestamp),
            ReplayEvent::Push(push) => push.created_at.or(push.timestamp),
            ReplayEvent::Clock { at } => Some(*at),
            _ => None,
        }
    }
}

// ----------------------------------------------------------------------------
// Replay Clock
// ----------------------------------------------------------------------------

/// Clock that reads as the latest instant seen in the log
#[derive(Debug, Clone, Default)]
pub struct ReplayClock {
    latest: Arc<AtomicU64>,
}

impl ReplayClock {
    pub fn observe(&self, epoch_value: u64) {
        let millis = Timestamp::from_epoch_value(epoch_value).as_millis();
        self.latest.fetch_max(millis, Ordering::SeqCst);
    }
}

impl TimeSource for ReplayClock {
    fn now(&self) -> Timestamp {
        Timestamp::new(self.latest.load(Ordering::SeqCst))
    }
}

// ----------------------------------------------------------------------------
// Replayer
// ----------------------------------------------------------------------------

/// Counters reported after a replay
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub events: usize,
    pub drafts: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub ignored: usize,
    pub rejected: usize,
    pub failures: usize,
    pub transmits: usize,
    pub timeline_updates: usize,
}

/// Final state of a replay
#[derive(Debug, Clone, Serialize)]
pub struct ReplayReport {
    pub local_user: UserId,
    pub finished_at: Timestamp,
    pub snapshots: Vec<TimelineSnapshot>,
    pub summary: ReplaySummary,
}

/// Applies replay events to a runtime in log order
pub struct Replayer {
    runtime: RuntimeHandle<ReplayClock>,
    clock: ReplayClock,
    default_counterpart: Option<UserId>,
    labels: HashMap<String, (ConversationHandle, LocalId)>,
    effects: EffectReceiver,
    app_events: AppEventReceiver,
    summary: ReplaySummary,
}

impl Replayer {
    pub async fn start(
        config: ChatlineConfig,
        local: UserId,
        default_counterpart: Option<UserId>,
    ) -> Result<Self> {
        let clock = ReplayClock::default();
        let mut runtime = RuntimeBuilder::new(local)
            .with_config(config)
            .with_time_source(clock.clone())
            .build_and_start()
            .await?;

        let effects = runtime
            .take_effect_receiver()
            .ok_or_else(|| CliError::Config("Runtime has no effect receiver".to_string()))?;
        let app_events = runtime
            .take_app_event_receiver()
            .ok_or_else(|| CliError::Config("Runtime has no app event receiver".to_string()))?;

        Ok(Self {
            runtime,
            clock,
            default_counterpart,
            labels: HashMap::new(),
            effects,
            app_events,
            summary: ReplaySummary::default(),
        })
    }

    /// Decode and apply one log line; blank lines are skipped
    pub async fn apply_line(&mut self, line_no: usize, line: &str) -> Result<()> {
        if line.trim().is_empty() {
            return Ok(());
        }
        let event: ReplayEvent =
            serde_json::from_str(line).map_err(|e| CliError::replay(line_no, e))?;
        self.apply(line_no, event).await
    }

    pub async fn apply(&mut self, line_no: usize, event: ReplayEvent) -> Result<()> {
        self.summary.events += 1;
        if let Some(at) = event.observed_at() {
            self.clock.observe(at);
        }

        let result = self.dispatch(line_no, event).await;
        self.drain_channels();

        match result {
            Err(CliError::Chatline(e)) if e.is_recoverable() => {
                self.summary.rejected += 1;
                warn!(line = line_no, "Event rejected: {}", e);
                Ok(())
            }
            other => other,
        }
    }

    async fn dispatch(&mut self, line_no: usize, event: ReplayEvent) -> Result<()> {
        match event {
            ReplayEvent::Draft { label, draft } => {
                let counterpart = draft
                    .receiver_id
                    .clone()
                    .or_else(|| self.default_counterpart.clone())
                    .ok_or_else(|| {
                        CliError::replay(line_no, "draft names no receiver and no --with was given")
                    })?;
                let handle = self.runtime.open(counterpart)?;
                let message = handle.append_local(draft).await?;
                self.summary.drafts += 1;

                if let (Some(label), Some(local_id)) = (label, message.local_id()) {
                    self.labels.insert(label, (handle, local_id));
                }
            }
            ReplayEvent::Ack { label, mut ack } => {
                let outcome = match label {
                    Some(label) => {
                        let (handle, local_id) = self.labelled(line_no, &label)?;
                        ack.client_ref.get_or_insert(local_id);
                        Some(handle.ingest_remote(RawPayload::Ack(ack)).await?)
                    }
                    None => self.runtime.route(RawPayload::Ack(ack)).await?,
                };
                self.record(outcome);
            }
            ReplayEvent::Push(push) => {
                let outcome = self.runtime.route(RawPayload::Push(push)).await?;
                self.record(outcome);
            }
            ReplayEvent::Failure { label, failure } => {
                let (handle, local_id) = self.labelled(line_no, &label)?;
                handle.mark_failed(local_id, failure).await?;
                self.summary.failures += 1;
            }
            ReplayEvent::Retry { label, new_label } => {
                let (handle, local_id) = self.labelled(line_no, &label)?;
                let message = handle.retry(local_id).await?;
                if let (Some(new_label), Some(new_id)) = (new_label, message.local_id()) {
                    self.labels.insert(new_label, (handle, new_id));
                }
            }
            ReplayEvent::Discard { label } => {
                let (handle, local_id) = self.labelled(line_no, &label)?;
                handle.discard(local_id).await?;
            }
            ReplayEvent::Viewport {
                with,
                scroll_offset,
                viewport_height,
            } => {
                let counterpart = with
                    .or_else(|| self.default_counterpart.clone())
                    .ok_or_else(|| {
                        CliError::replay(line_no, "viewport names no conversation and no --with was given")
                    })?;
                self.runtime
                    .open(counterpart)?
                    .set_viewport(ViewportMetrics::new(scroll_offset, viewport_height))
                    .await?;
            }
            ReplayEvent::Clock { .. } => {}
        }
        Ok(())
    }

    /// Stop the runtime and collect every conversation's final timeline
    pub async fn finish(mut self) -> Result<ReplayReport> {
        let supervisor = self.runtime.supervisor();
        let mut snapshots = Vec::new();
        for conversation in supervisor.conversations() {
            let Some(handle) = supervisor.handle(&conversation) else {
                continue;
            };
            snapshots.push(handle.snapshot().await?);
        }

        self.drain_channels();
        self.runtime.shutdown().await?;

        info!(
            events = self.summary.events,
            conversations = snapshots.len(),
            "Replay finished"
        );
        Ok(ReplayReport {
            local_user: self.runtime.local_user().clone(),
            finished_at: self.clock.now(),
            snapshots,
            summary: self.summary,
        })
    }

    fn labelled(&self, line_no: usize, label: &str) -> Result<(ConversationHandle, LocalId)> {
        self.labels
            .get(label)
            .cloned()
            .ok_or_else(|| CliError::replay(line_no, format!("unknown draft reference '{label}'")))
    }

    fn record(&mut self, outcome: Option<IngestOutcome>) {
        match outcome.map(|o| o.disposition) {
            Some(Disposition::Appended { .. } | Disposition::Replaced { .. }) => {
                self.summary.accepted += 1
            }
            Some(Disposition::Duplicate { id }) => {
                debug!(%id, "Duplicate delivery");
                self.summary.duplicates += 1;
            }
            Some(Disposition::Foreign) | None => self.summary.ignored += 1,
        }
    }

    /// Account for effects and events produced so far
    fn drain_channels(&mut self) {
        while let Ok(effect) = self.effects.try_recv() {
            debug!(?effect, "Transmit requested");
            self.summary.transmits += 1;
        }
        while let Ok(event) = self.app_events.try_recv() {
            if matches!(event, AppEvent::TimelineUpdated { .. }) {
                self.summary.timeline_updates += 1;
            }
        }
    }
}

/// Replay every line of `path`
pub async fn replay_file(
    path: &Path,
    config: ChatlineConfig,
    local: UserId,
    default_counterpart: Option<UserId>,
) -> Result<ReplayReport> {
    let file = std::fs::File::open(path)?;
    let mut replayer = Replayer::start(config, local, default_counterpart).await?;

    for (index, line) in BufReader::new(file).lines().enumerate() {
        replayer.apply_line(index + 1, &line?).await?;
    }

    replayer.finish().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_labelled_draft() {
        let event: ReplayEvent = serde_json::from_str(
            r#"{"event":"draft","ref":"d1","content":"hi","receiverId":"bob","createdAt":1704099600}"#,
        )
        .unwrap();

        let ReplayEvent::Draft { label, draft } = event else {
            panic!("expected draft");
        };
        assert_eq!(label.as_deref(), Some("d1"));
        assert_eq!(draft.content.as_deref(), Some("hi"));
        assert_eq!(draft.receiver_id, Some(UserId::from("bob")));
    }

    #[test]
    fn test_decodes_failure_and_retry() {
        let failure: ReplayEvent = serde_json::from_str(
            r#"{"event":"failure","ref":"d2","failure":{"kind":"session_expired"}}"#,
        )
        .unwrap();
        assert_eq!(
            failure,
            ReplayEvent::Failure {
                label: "d2".into(),
                failure: SendFailure::SessionExpired,
            }
        );

        let retry: ReplayEvent =
            serde_json::from_str(r#"{"event":"retry","ref":"d2","as":"d3"}"#).unwrap();
        assert_eq!(
            retry,
            ReplayEvent::Retry {
                label: "d2".into(),
                new_label: Some("d3".into()),
            }
        );
    }

    #[test]
    fn test_clock_only_moves_forward() {
        let clock = ReplayClock::default();
        clock.observe(1_704_099_600_000);
        clock.observe(1_704_099_500); // seconds, earlier
        assert_eq!(clock.now().as_millis(), 1_704_099_600_000);
        clock.observe(1_704_099_660);
        assert_eq!(clock.now().as_millis(), 1_704_099_660_000);
    }
}
