//! Outbox Dispatch
//!
//! Drains `Effect::Transmit` requests from every conversation task, hands
//! each pending message to a [`Transmitter`], and feeds the outcome back into
//! the owning conversation: an acknowledgment is ingested like any other
//! remote payload, an error marks the message failed.

use std::sync::Arc;

use async_trait::async_trait;
use chatline_core::channel::{Effect, EffectReceiver};
use chatline_core::{
    ChatlineResult, ConversationId, Message, RawPayload, SendAck, SendFailure, TimeSource,
};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::supervisor::Supervisor;

// ----------------------------------------------------------------------------
// Transmitter
// ----------------------------------------------------------------------------

/// Network collaborator that actually sends messages
#[async_trait]
pub trait Transmitter: Send + Sync {
    /// Send one pending message and return the server's acknowledgment
    async fn transmit(&self, message: &Message) -> Result<SendAck, SendFailure>;
}

// ----------------------------------------------------------------------------
// Outbox Dispatcher
// ----------------------------------------------------------------------------

/// Runs transmissions concurrently and reports their outcome to the conversation
pub struct OutboxDispatcher<T> {
    transmitter: Arc<dyn Transmitter>,
    supervisor: Arc<Supervisor<T>>,
    effect_receiver: EffectReceiver,
    in_flight: JoinSet<()>,
}

impl<T> OutboxDispatcher<T>
where
    T: TimeSource + Clone + Send + Sync + 'static,
{
    pub fn new(
        transmitter: Arc<dyn Transmitter>,
        supervisor: Arc<Supervisor<T>>,
        effect_receiver: EffectReceiver,
    ) -> Self {
        Self {
            transmitter,
            supervisor,
            effect_receiver,
            in_flight: JoinSet::new(),
        }
    }

    /// Dispatch effects until the effect queue closes, then wait for in-flight sends
    pub async fn run(&mut self) {
        info!("Outbox dispatcher starting");

        loop {
            tokio::select! {
                effect = self.effect_receiver.recv() => match effect {
                    Some(Effect::Transmit { conversation, message }) => {
                        self.dispatch(conversation, message);
                    }
                    None => break,
                },
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    if let Err(e) = joined {
                        warn!("Transmission task failed: {}", e);
                    }
                }
            }
        }

        while self.in_flight.join_next().await.is_some() {}
        info!("Outbox dispatcher stopped");
    }

    fn dispatch(&mut self, conversation: ConversationId, message: Message) {
        let transmitter = Arc::clone(&self.transmitter);
        let supervisor = Arc::clone(&self.supervisor);

        self.in_flight.spawn(async move {
            let result = transmitter.transmit(&message).await;
            if let Err(e) = report(&supervisor, &conversation, message, result).await {
                warn!(conversation = %conversation, "Could not report send outcome: {}", e);
            }
        });
    }
}

/// Feed a send outcome back into its conversation
async fn report<T>(
    supervisor: &Supervisor<T>,
    conversation: &ConversationId,
    message: Message,
    result: Result<SendAck, SendFailure>,
) -> ChatlineResult<()>
where
    T: TimeSource + Clone + Send + Sync + 'static,
{
    let Some(handle) = supervisor.handle(conversation) else {
        debug!(conversation = %conversation, "Conversation closed before send completed");
        return Ok(());
    };
    let Some(local_id) = message.local_id() else {
        warn!(conversation = %conversation, id = %message.id, "Transmitted message had no local id");
        return Ok(());
    };

    match result {
        Ok(ack) => {
            let outcome = handle
                .ingest_remote(RawPayload::Ack(complete_ack(ack, &message)))
                .await?;
            debug!(conversation = %conversation, disposition = ?outcome.disposition, "Send acknowledged");
        }
        Err(failure) => {
            info!(conversation = %conversation, local_id = %local_id, "Send failed: {:?}", failure);
            handle.mark_failed(local_id, failure).await?;
        }
    }
    Ok(())
}

/// Fill the fields a terse acknowledgment leaves out from the message that was sent
fn complete_ack(mut ack: SendAck, sent: &Message) -> SendAck {
    if ack.client_ref.is_none() {
        ack.client_ref = sent.local_id();
    }
    if ack.sender_id.is_none() {
        ack.sender_id = Some(sent.sender_id.clone());
    }
    if ack.receiver_id.is_none() {
        ack.receiver_id = Some(sent.receiver_id.clone());
    }
    if ack.content.is_none() && ack.attachment.is_none() {
        ack.content = sent.content.clone();
    }
    ack
}
