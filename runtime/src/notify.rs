//! Order notification channel.
//!
//! A single actor task owns the subscriber table. [`Notifier`] handles talk
//! to it over a bounded command channel, so nothing else ever touches the
//! table and no lock is shared between request tasks.
//!
//! # Architecture
//!
//! ```text
//! OrderService ──publish──┐
//! ws handler ──subscribe──┼──> command channel ──> notifier task
//! Subscription::drop ─────┘                          │
//!                                                    ├──> subscriber queue A
//!                                                    └──> subscriber queue B
//! ```
//!
//! # Delivery
//!
//! Each published event is offered concurrently to every subscriber whose
//! [`Interest`] matches. A delivery waits at most
//! [`NotifierConfig::delivery_timeout`] for room in the subscriber's queue.
//! After [`NotifierConfig::max_failed_deliveries`] consecutive failures the
//! subscriber is dropped; a subscriber whose receiver is gone is dropped at
//! once. Publishers never wait on delivery.

use crate::metrics::NotifierMetrics;
use bookstore_core::{Interest, OrderEvent};
use futures::future::join_all;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::{mpsc, oneshot};

/// Tuning knobs for the notifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotifierConfig {
    /// Capacity of the command channel shared by all publishers.
    pub command_buffer: usize,
    /// Capacity of each subscriber's event queue.
    pub subscriber_buffer: usize,
    /// How long one delivery may wait for queue space.
    pub delivery_timeout: Duration,
    /// Consecutive failed deliveries before a subscriber is dropped.
    pub max_failed_deliveries: u32,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            command_buffer: 1024,
            subscriber_buffer: 64,
            delivery_timeout: Duration::from_millis(250),
            max_failed_deliveries: 3,
        }
    }
}

/// Why an event could not be handed to the notifier.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// The command channel is full.
    #[error("notification queue is full")]
    QueueFull,

    /// The notifier task has stopped.
    #[error("notifier is not running")]
    Closed,
}

/// Why one delivery to one subscriber failed. Logged, never surfaced.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryFailure {
    /// The subscriber's queue stayed full for the whole delivery timeout.
    #[error("subscriber queue full for {0:?}")]
    TimedOut(Duration),

    /// The subscriber went away.
    #[error("subscriber disconnected")]
    Disconnected,
}

/// Identifies one subscription within a notifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

enum Command {
    Subscribe {
        id: SubscriptionId,
        interest: Interest,
        sender: mpsc::Sender<OrderEvent>,
    },
    Unsubscribe(SubscriptionId),
    Publish(OrderEvent),
    Count(oneshot::Sender<usize>),
}

/// Cloneable handle to the notifier task.
#[derive(Clone, Debug)]
pub struct Notifier {
    commands: mpsc::Sender<Command>,
    next_id: Arc<AtomicU64>,
    subscriber_buffer: usize,
}

impl Notifier {
    /// Spawns the notifier task on the current tokio runtime.
    ///
    /// The task stops once every handle and subscription is dropped.
    #[must_use]
    pub fn spawn(config: NotifierConfig) -> Self {
        let (commands, receiver) = mpsc::channel(config.command_buffer.max(1));
        let subscriber_buffer = config.subscriber_buffer.max(1);

        tokio::spawn(run(receiver, config));

        Self {
            commands,
            next_id: Arc::new(AtomicU64::new(1)),
            subscriber_buffer,
        }
    }

    /// Registers interest in a shop's or client's orders.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Closed`] if the notifier task has stopped.
    pub async fn subscribe(&self, interest: Interest) -> Result<Subscription, PublishError> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.subscriber_buffer);

        self.commands
            .send(Command::Subscribe {
                id,
                interest: interest.clone(),
                sender,
            })
            .await
            .map_err(|_| PublishError::Closed)?;

        Ok(Subscription {
            id,
            interest,
            receiver,
            commands: self.commands.clone(),
        })
    }

    /// Queues an event for fan-out without waiting.
    ///
    /// # Errors
    ///
    /// - [`PublishError::QueueFull`]: the command channel is at capacity
    /// - [`PublishError::Closed`]: the notifier task has stopped
    pub fn publish(&self, event: OrderEvent) -> Result<(), PublishError> {
        self.commands
            .try_send(Command::Publish(event))
            .map_err(|e| match e {
                TrySendError::Full(_) => PublishError::QueueFull,
                TrySendError::Closed(_) => PublishError::Closed,
            })
    }

    /// Number of live subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Closed`] if the notifier task has stopped.
    pub async fn subscriber_count(&self) -> Result<usize, PublishError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Count(reply))
            .await
            .map_err(|_| PublishError::Closed)?;
        response.await.map_err(|_| PublishError::Closed)
    }
}

/// A live subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    interest: Interest,
    receiver: mpsc::Receiver<OrderEvent>,
    commands: mpsc::Sender<Command>,
}

impl Subscription {
    /// This subscription's id.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// What this subscription listens to.
    #[must_use]
    pub const fn interest(&self) -> &Interest {
        &self.interest
    }

    /// Next matching event; `None` once the notifier has dropped this
    /// subscriber or stopped.
    pub async fn recv(&mut self) -> Option<OrderEvent> {
        self.receiver.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // If the command channel is full the closed receiver is noticed on
        // the next delivery instead.
        let _ = self.commands.try_send(Command::Unsubscribe(self.id));
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subscribe { id, interest, .. } => {
                write!(f, "Subscribe({id}, {interest})")
            }
            Self::Unsubscribe(id) => write!(f, "Unsubscribe({id})"),
            Self::Publish(event) => write!(f, "Publish({})", event.event_type()),
            Self::Count(_) => f.write_str("Count"),
        }
    }
}

struct Subscriber {
    interest: Interest,
    sender: mpsc::Sender<OrderEvent>,
    failures: u32,
}

async fn run(mut commands: mpsc::Receiver<Command>, config: NotifierConfig) {
    let mut subscribers: HashMap<SubscriptionId, Subscriber> = HashMap::new();
    tracing::debug!(?config, "Notifier started");

    while let Some(command) = commands.recv().await {
        match command {
            Command::Subscribe {
                id,
                interest,
                sender,
            } => {
                tracing::debug!(subscription = %id, %interest, "Subscriber registered");
                subscribers.insert(
                    id,
                    Subscriber {
                        interest,
                        sender,
                        failures: 0,
                    },
                );
                NotifierMetrics::record_subscribers(subscribers.len());
            }
            Command::Unsubscribe(id) => {
                if subscribers.remove(&id).is_some() {
                    tracing::debug!(subscription = %id, "Subscriber removed");
                    NotifierMetrics::record_subscribers(subscribers.len());
                }
            }
            Command::Publish(event) => fan_out(&mut subscribers, &event, &config).await,
            Command::Count(reply) => {
                let _ = reply.send(subscribers.len());
            }
        }
    }

    tracing::debug!("Notifier stopped");
}

async fn fan_out(
    subscribers: &mut HashMap<SubscriptionId, Subscriber>,
    event: &OrderEvent,
    config: &NotifierConfig,
) {
    let deliveries = subscribers
        .iter()
        .filter(|(_, subscriber)| event.concerns(&subscriber.interest))
        .map(|(&id, subscriber)| {
            let sender = subscriber.sender.clone();
            let event = event.clone();
            let timeout = config.delivery_timeout;
            async move {
                let outcome = match sender.send_timeout(event, timeout).await {
                    Ok(()) => Ok(()),
                    Err(SendTimeoutError::Timeout(_)) => Err(DeliveryFailure::TimedOut(timeout)),
                    Err(SendTimeoutError::Closed(_)) => Err(DeliveryFailure::Disconnected),
                };
                (id, outcome)
            }
        });

    let outcomes = join_all(deliveries).await;
    let mut delivered = 0;
    let mut dropped = false;

    for (id, outcome) in outcomes {
        let Some(subscriber) = subscribers.get_mut(&id) else {
            continue;
        };

        match outcome {
            Ok(()) => {
                subscriber.failures = 0;
                delivered += 1;
            }
            Err(failure) => {
                subscriber.failures += 1;
                let give_up = failure == DeliveryFailure::Disconnected
                    || subscriber.failures >= config.max_failed_deliveries;

                tracing::warn!(
                    subscription = %id,
                    order_id = %event.order().id,
                    failures = subscriber.failures,
                    error = %failure,
                    dropped = give_up,
                    "Order notification not delivered"
                );

                if give_up {
                    subscribers.remove(&id);
                    NotifierMetrics::record_dropped();
                    dropped = true;
                }
            }
        }
    }

    NotifierMetrics::record_delivered(delivered);
    if dropped {
        NotifierMetrics::record_subscribers(subscribers.len());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use bookstore_core::{ClientId, OrderId, ShopId, validate_and_compute};
    use bookstore_core::environment::Clock;
    use bookstore_testing::{helpers, test_clock};
    use tokio::time::timeout;

    fn created(shop: &str, client: &str) -> OrderEvent {
        let order = validate_and_compute(&helpers::draft(shop, client))
            .unwrap()
            .into_order(OrderId::generate(), test_clock().now());
        OrderEvent::OrderCreated { order }
    }

    #[tokio::test]
    async fn delivers_only_matching_events() {
        let notifier = Notifier::spawn(NotifierConfig::default());
        let mut shop = notifier.subscribe(Interest::Shop(ShopId::new("s1"))).await.unwrap();
        let mut client = notifier
            .subscribe(Interest::Client(ClientId::new("c9")))
            .await
            .unwrap();

        notifier.publish(created("s2", "c9")).unwrap();
        notifier.publish(created("s1", "c1")).unwrap();

        let event = timeout(Duration::from_secs(1), shop.recv()).await.unwrap().unwrap();
        assert_eq!(event.order().shop_id, ShopId::new("s1"));

        let event = timeout(Duration::from_secs(1), client.recv()).await.unwrap().unwrap();
        assert_eq!(event.order().client_id, ClientId::new("c9"));
        assert!(
            timeout(Duration::from_millis(50), client.recv()).await.is_err(),
            "client subscriber must not see other clients' orders"
        );
    }

    #[tokio::test]
    async fn dropping_subscription_unsubscribes() {
        let notifier = Notifier::spawn(NotifierConfig::default());
        let subscription = notifier.subscribe(Interest::Shop(ShopId::new("s1"))).await.unwrap();
        assert_eq!(notifier.subscriber_count().await.unwrap(), 1);

        drop(subscription);

        assert_eq!(notifier.subscriber_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn full_command_queue_is_reported() {
        let notifier = Notifier::spawn(NotifierConfig {
            command_buffer: 1,
            ..NotifierConfig::default()
        });

        let results: Vec<_> = (0..50).map(|_| notifier.publish(created("s1", "c1"))).collect();

        assert!(results.contains(&Err(PublishError::QueueFull)));
    }
}
