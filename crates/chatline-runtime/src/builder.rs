//! Runtime Builder API
//!
//! Builder-style setup for hosts (CLI, app shell, tests): pick the local
//! user, configuration, clock and send collaborator, then get a handle to
//! open conversations, route payloads and receive app events.

use std::sync::Arc;

use chatline_core::channel::{
    create_app_event_channel, create_effect_channel, AppEventReceiver, EffectReceiver,
};
use chatline_core::{
    ChatlineConfig, ChatlineError, ChatlineResult, IngestOutcome, RawPayload, SystemTimeSource,
    TimeSource, UserId,
};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::info;

use crate::logic::ConversationHandle;
use crate::outbox::{OutboxDispatcher, Transmitter};
use crate::supervisor::Supervisor;

// ----------------------------------------------------------------------------
// Runtime Builder
// ----------------------------------------------------------------------------

/// Builder for a chatline runtime
pub struct RuntimeBuilder<T = SystemTimeSource> {
    local: UserId,
    config: ChatlineConfig,
    time_source: T,
    transmitter: Option<Arc<dyn Transmitter>>,
}

impl RuntimeBuilder<SystemTimeSource> {
    /// Create a new runtime builder for the given local user
    pub fn new(local: impl Into<UserId>) -> Self {
        Self {
            local: local.into(),
            config: ChatlineConfig::default(),
            time_source: SystemTimeSource,
            transmitter: None,
        }
    }
}

impl<T> RuntimeBuilder<T>
where
    T: TimeSource + Clone + Send + Sync + 'static,
{
    pub fn with_config(mut self, config: ChatlineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the clock used for timestamp fallback and staleness
    pub fn with_time_source<U>(self, time_source: U) -> RuntimeBuilder<U> {
        RuntimeBuilder {
            local: self.local,
            config: self.config,
            time_source,
            transmitter: self.transmitter,
        }
    }

    /// Send pending messages through `transmitter`
    ///
    /// Without one, transmit effects are left on the effect receiver for the host.
    pub fn with_transmitter(mut self, transmitter: Arc<dyn Transmitter>) -> Self {
        self.transmitter = Some(transmitter);
        self
    }

    pub async fn build_and_start(self) -> ChatlineResult<RuntimeHandle<T>> {
        info!(local = %self.local, "Building chatline runtime");
        self.config
            .validate()
            .map_err(ChatlineError::config_error)?;

        let config = self.config.into_shared();
        let (effect_sender, effect_receiver) = create_effect_channel(&config.channels);
        let (app_event_sender, app_event_receiver) = create_app_event_channel(&config.channels);

        let supervisor = Arc::new(Supervisor::new(
            self.local,
            config,
            self.time_source,
            effect_sender,
            app_event_sender,
        ));

        let (outbox_handle, effect_receiver) = match self.transmitter {
            Some(transmitter) => {
                let mut outbox =
                    OutboxDispatcher::new(transmitter, Arc::clone(&supervisor), effect_receiver);
                (Some(tokio::spawn(async move { outbox.run().await })), None)
            }
            None => (None, Some(effect_receiver)),
        };

        info!("Chatline runtime started");

        Ok(RuntimeHandle {
            supervisor,
            app_event_receiver: Some(app_event_receiver),
            effect_receiver,
            outbox_handle,
            running: true,
        })
    }
}

// ----------------------------------------------------------------------------
// Runtime Handle
// ----------------------------------------------------------------------------

/// Handle to a running chatline runtime
pub struct RuntimeHandle<T> {
    supervisor: Arc<Supervisor<T>>,
    app_event_receiver: Option<AppEventReceiver>,
    effect_receiver: Option<EffectReceiver>,
    outbox_handle: Option<JoinHandle<()>>,
    running: bool,
}

impl<T> RuntimeHandle<T>
where
    T: TimeSource + Clone + Send + Sync + 'static,
{
    pub fn local_user(&self) -> &UserId {
        self.supervisor.local_user()
    }

    pub fn supervisor(&self) -> Arc<Supervisor<T>> {
        Arc::clone(&self.supervisor)
    }

    /// Open (or reuse) the conversation with `counterpart`
    pub fn open(&self, counterpart: impl Into<UserId>) -> ChatlineResult<ConversationHandle> {
        self.supervisor.open(counterpart)
    }

    /// Route a transport payload to its conversation
    pub async fn route(&self, payload: RawPayload) -> ChatlineResult<Option<IngestOutcome>> {
        self.supervisor.route(payload).await
    }

    /// Take the app event receiver (can only be called once)
    pub fn take_app_event_receiver(&mut self) -> Option<AppEventReceiver> {
        self.app_event_receiver.take()
    }

    /// Take the effect receiver when no transmitter was configured (can only be called once)
    pub fn take_effect_receiver(&mut self) -> Option<EffectReceiver> {
        self.effect_receiver.take()
    }

    pub fn is_running(&self) -> bool {
        self.running
            && self
                .outbox_handle
                .as_ref()
                .map_or(true, |handle| !handle.is_finished())
    }

    /// Shutdown the runtime gracefully
    pub async fn shutdown(&mut self) -> ChatlineResult<()> {
        info!("Shutting down chatline runtime");
        self.supervisor.shutdown_all().await?;

        // The supervisor keeps the effect queue open, so the dispatcher never drains on its own
        if let Some(handle) = self.outbox_handle.take() {
            handle.abort();
            let _ = tokio::time::timeout(Duration::from_secs(10), handle).await;
        }

        self.running = false;
        info!("Chatline runtime shut down");
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Convenience Functions
// ----------------------------------------------------------------------------

/// Create a runtime with testing configuration and no transmitter
pub async fn create_test_runtime(
    local: impl Into<UserId>,
) -> ChatlineResult<RuntimeHandle<SystemTimeSource>> {
    RuntimeBuilder::new(local)
        .with_config(ChatlineConfig::testing())
        .build_and_start()
        .await
}
