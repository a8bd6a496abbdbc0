//! Durable topic-exchange event bus on RabbitMQ.
//!
//! Producers publish persistent messages keyed `<topic>.<event>`; the worker
//! consumes from a single queue bound to the lifecycle topics. Handler
//! failures are re-queued with the retry counter embedded in the envelope and
//! dropped after [`MAX_ATTEMPTS`].

use std::sync::Arc;

use anyhow::Result;
use futures::{StreamExt, future::BoxFuture};
use lapin::{
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
    message::Delivery,
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions,
        QueueBindOptions, QueueDeclareOptions,
    },
    types::FieldTable,
};
use tracing::{error, info, warn};

use crate::{
    events::{Envelope, EventPayload},
    state::AppState,
};

pub const EVENTS_EXCHANGE: &str = "medassist.events";
pub const WORKER_QUEUE: &str = "medassist.worker";
pub const MAX_ATTEMPTS: u32 = 3;

/// Routing patterns the event processor subscribes to.
const WORKER_BINDINGS: [&str; 3] = ["orders.*", "deliveries.*", "inventory.*"];

pub type Handler = fn(Envelope, Arc<AppState>) -> BoxFuture<'static, Result<()>>;

#[derive(Clone)]
pub struct EventBus {
    channel: Channel,
}

impl EventBus {
    pub async fn connect(url: &str) -> Result<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        channel
            .exchange_declare(
                EVENTS_EXCHANGE,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;
        info!(exchange = EVENTS_EXCHANGE, "connected to event bus");
        Ok(Self { channel })
    }

    /// Publish a typed lifecycle event under its fixed routing key.
    pub async fn publish<E: EventPayload>(&self, event: &E) -> Result<(), lapin::Error> {
        let payload = serde_json::to_value(event).expect("event payload serializes");
        self.publish_envelope(E::ROUTING_KEY, &Envelope::wrap(E::ROUTING_KEY, payload))
            .await
    }

    /// Publish a pre-built envelope, preserving its message id and retry
    /// counter. Used for re-queues and notification fan-out.
    pub async fn publish_envelope(
        &self,
        routing_key: &str,
        envelope: &Envelope,
    ) -> Result<(), lapin::Error> {
        let body = serde_json::to_vec(envelope).expect("envelope serializes");
        self.channel
            .basic_publish(
                EVENTS_EXCHANGE,
                routing_key,
                BasicPublishOptions::default(),
                &body,
                // delivery_mode 2 = persistent
                BasicProperties::default().with_delivery_mode(2),
            )
            .await?
            .await?;
        Ok(())
    }
}

/// Run the event-processor consumer loop. Blocks until the channel closes.
pub async fn run_consumers(
    state: Arc<AppState>,
    handlers: &[(&'static str, Handler)],
) -> Result<()> {
    let channel = state.bus.channel.clone();

    channel
        .queue_declare(
            WORKER_QUEUE,
            QueueDeclareOptions {
                durable: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await?;

    for pattern in WORKER_BINDINGS {
        channel
            .queue_bind(
                WORKER_QUEUE,
                EVENTS_EXCHANGE,
                pattern,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;
    }

    let mut consumer = channel
        .basic_consume(
            WORKER_QUEUE,
            "event-processor",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    info!(queue = WORKER_QUEUE, "event processor consuming");

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(d) => d,
            Err(err) => {
                error!(error = %err, "consumer stream error");
                continue;
            }
        };
        dispatch(delivery, state.clone(), handlers).await;
    }

    Ok(())
}

async fn dispatch(delivery: Delivery, state: Arc<AppState>, handlers: &[(&'static str, Handler)]) {
    let envelope: Envelope = match serde_json::from_slice(&delivery.data) {
        Ok(env) => env,
        Err(err) => {
            // Unparseable messages can never succeed; drop them.
            warn!(error = %err, "dropping malformed event");
            ack(&delivery).await;
            return;
        }
    };

    let handler = handlers
        .iter()
        .find(|(key, _)| *key == envelope.kind)
        .map(|(_, h)| *h);

    let Some(handler) = handler else {
        warn!(kind = %envelope.kind, "no handler registered, dropping");
        ack(&delivery).await;
        return;
    };

    match handler(envelope.clone(), state.clone()).await {
        Ok(()) => ack(&delivery).await,
        Err(err) => {
            let attempt = envelope.retries + 1;
            if attempt >= MAX_ATTEMPTS {
                error!(
                    kind = %envelope.kind,
                    message_id = %envelope.message_id,
                    error = %err,
                    "handler failed on final attempt, dropping"
                );
            } else {
                warn!(
                    kind = %envelope.kind,
                    message_id = %envelope.message_id,
                    attempt,
                    error = %err,
                    "handler failed, re-queueing"
                );
                let bus = state.bus.clone();
                let mut retry = envelope;
                retry.retries = attempt;
                tokio::spawn(async move {
                    // Linear back-off: attempt x 1 s.
                    tokio::time::sleep(std::time::Duration::from_secs(attempt as u64)).await;
                    let key = retry.kind.clone();
                    if let Err(err) = bus.publish_envelope(&key, &retry).await {
                        error!(error = %err, "failed to re-queue event");
                    }
                });
            }
            ack(&delivery).await;
        }
    }
}

async fn ack(delivery: &Delivery) {
    if let Err(err) = delivery.ack(BasicAckOptions::default()).await {
        error!(error = %err, "failed to ack delivery");
    }
}
