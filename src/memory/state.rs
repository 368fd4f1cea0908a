use std::collections::HashMap;

use bytes::Bytes;
use tokio::sync::mpsc;

/// A blocked read waiting for entries on a key.
#[derive(Debug)]
pub struct Subscriber {
    pub sender: mpsc::Sender<()>,
}

/// Blocked readers per stream key.
///
/// A reader registers while it still holds the store lock, so an XADD can never
/// slip in between the empty read and the registration. A reader removes its
/// registrations once its wait ends. Registrations of cancelled readers have a
/// closed channel and are pruned on the next registration.
#[derive(Debug, Default)]
pub struct State {
    pub subscribers: HashMap<Bytes, Vec<Subscriber>>,
}

impl State {
    pub fn new() -> Self {
        State {
            subscribers: HashMap::new(),
        }
    }

    pub fn add_subscriber(&mut self, key: Bytes, subscriber: Subscriber) {
        self.remove_closed_subscribers();
        self.subscribers.entry(key).or_default().push(subscriber);
    }

    /// Removes the registrations made with `sender` under each of `keys`.
    pub fn remove_subscribers<'a>(
        &mut self,
        keys: impl IntoIterator<Item = &'a Bytes>,
        sender: &mpsc::Sender<()>,
    ) {
        for key in keys {
            let Some(subscribers) = self.subscribers.get_mut(key) else {
                continue;
            };

            subscribers.retain(|subscriber| !subscriber.sender.same_channel(sender));

            if subscribers.is_empty() {
                self.subscribers.remove(key);
            }
        }
    }

    fn remove_closed_subscribers(&mut self) {
        self.subscribers.retain(|_, subscribers| {
            subscribers.retain(|subscriber| !subscriber.sender.is_closed());
            !subscribers.is_empty()
        });
    }

    /// Wakes every reader blocked on `key`.
    pub fn send_to_subscribers(&mut self, key: &Bytes) {
        let Some(subscribers) = self.subscribers.get_mut(key) else {
            return;
        };

        subscribers.retain(|subscriber| !subscriber.sender.is_closed());

        for subscriber in subscribers.iter() {
            let _ = subscriber.sender.try_send(());
        }

        if subscribers.is_empty() {
            self.subscribers.remove(key);
        }
    }

    pub fn subscriber_count(&self, key: &Bytes) -> usize {
        self.subscribers
            .get(key)
            .map(|subscribers| {
                subscribers
                    .iter()
                    .filter(|subscriber| !subscriber.sender.is_closed())
                    .count()
            })
            .unwrap_or(0)
    }
}
