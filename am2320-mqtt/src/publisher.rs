use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mqttrs::QoS;
use tokio::sync::Notify;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PublishOptions {
    pub qos: QoS,
    pub retain: bool,
}

impl PublishOptions {
    /// QoS 1, retained. Used for every topic the bridge owns.
    pub const RETAINED: Self = Self {
        qos: QoS::AtLeastOnce,
        retain: true,
    };
}

/// A message waiting to be sent to the broker.
#[derive(Debug, Clone, PartialEq)]
pub struct Publication {
    pub topic: String,
    pub payload: String,
    pub options: PublishOptions,
}

/// Fire-and-forget publish capability.
///
/// Implementations must not block on broker acknowledgement.
pub trait Publisher {
    fn publish(&mut self, topic: &str, payload: &str, options: PublishOptions);
}

/// Records publications in order.
impl Publisher for Vec<Publication> {
    fn publish(&mut self, topic: &str, payload: &str, options: PublishOptions) {
        self.push(Publication {
            topic: topic.to_owned(),
            payload: payload.to_owned(),
            options,
        });
    }
}

/// Creates a publisher together with the queue the MQTT client drains.
pub fn queue() -> (QueuePublisher, PublicationQueue) {
    let shared = Arc::new(Shared::default());
    (
        QueuePublisher {
            shared: Arc::clone(&shared),
        },
        PublicationQueue { shared },
    )
}

/// Topics waiting to be sent, each holding only its newest publication.
///
/// A topic keeps the position of its first queued publication, so a broker
/// outage leaves at most one entry per topic instead of a backlog of stale
/// values.
#[derive(Debug, Default)]
struct Backlog {
    order: VecDeque<String>,
    latest: HashMap<String, Publication>,
    closed: bool,
}

impl Backlog {
    fn push(&mut self, publication: Publication) {
        if !self.latest.contains_key(&publication.topic) {
            self.order.push_back(publication.topic.clone());
        }
        self.latest.insert(publication.topic.clone(), publication);
    }

    fn pop(&mut self) -> Option<Publication> {
        let topic = self.order.pop_front()?;
        self.latest.remove(&topic)
    }
}

#[derive(Debug, Default)]
struct Shared {
    backlog: Mutex<Backlog>,
    ready: Notify,
}

impl Shared {
    fn backlog(&self) -> MutexGuard<'_, Backlog> {
        self.backlog.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Queues publications for the MQTT client task. Never blocks.
///
/// Dropping it closes the queue once the remaining publications are drained.
#[derive(Debug)]
pub struct QueuePublisher {
    shared: Arc<Shared>,
}

impl Publisher for QueuePublisher {
    fn publish(&mut self, topic: &str, payload: &str, options: PublishOptions) {
        self.shared.backlog().push(Publication {
            topic: topic.to_owned(),
            payload: payload.to_owned(),
            options,
        });
        self.shared.ready.notify_one();
    }
}

impl Drop for QueuePublisher {
    fn drop(&mut self) {
        self.shared.backlog().closed = true;
        self.shared.ready.notify_one();
    }
}

/// Receiving end of [`queue`], owned by the MQTT client.
#[derive(Debug)]
pub struct PublicationQueue {
    shared: Arc<Shared>,
}

impl PublicationQueue {
    /// Waits for the next publication. `None` once the publisher is dropped
    /// and the queue is empty.
    pub async fn recv(&mut self) -> Option<Publication> {
        loop {
            {
                let mut backlog = self.shared.backlog();
                if let Some(publication) = backlog.pop() {
                    return Some(publication);
                }
                if backlog.closed {
                    return None;
                }
            }
            self.shared.ready.notified().await;
        }
    }

    /// Takes the next publication without waiting.
    pub fn try_recv(&mut self) -> Option<Publication> {
        self.shared.backlog().pop()
    }

    /// Number of topics with a publication waiting.
    pub fn len(&self) -> usize {
        self.shared.backlog().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
