//! Named bounded mailboxes between a module and one peer process.
//!
//! A module creates its mailbox by name at startup; creation failure is
//! fatal to the module. The peer claims the send side exactly once per
//! attachment. Queues are polled, never blocked on indefinitely: the
//! owner's scheduling loop calls [`Mailbox::try_recv`] (or a bounded
//! [`Mailbox::recv_timeout`]) once per pass and otherwise does useful
//! work.
//!
//! Peer loss is detected as a closed channel, not a heartbeat: once the
//! claimed [`MailboxSender`] is dropped, every receive on the mailbox
//! reports [`QueueError::Disconnected`].

use std::sync::Mutex;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use indexmap::IndexMap;

use crate::error::QueueError;

/// Process-wide directory of mailboxes awaiting their peer.
///
/// Holds the send side of each created queue until the peer claims it
/// with [`QueueRegistry::open`]. A claimed name is removed from the
/// directory; reconnecting peers use a fresh name carrying a fresh
/// instance number, never a recycled one.
pub struct QueueRegistry<T> {
    pending: Mutex<IndexMap<String, Sender<T>>>,
}

const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<QueueRegistry<u64>>();
};

impl<T> Default for QueueRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QueueRegistry<T> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(IndexMap::new()),
        }
    }

    /// Create a named bounded mailbox and return its receive side.
    ///
    /// Fails with [`QueueError::AlreadyExists`] if the name is taken;
    /// the caller treats that as a fatal configuration error.
    pub fn create(&self, name: &str, capacity: usize) -> Result<Mailbox<T>, QueueError> {
        let mut pending = self.pending.lock().expect("registry lock poisoned");
        if pending.contains_key(name) {
            return Err(QueueError::AlreadyExists {
                name: name.to_string(),
            });
        }
        let (tx, rx) = bounded(capacity);
        pending.insert(name.to_string(), tx);
        Ok(Mailbox {
            name: name.to_string(),
            receiver: rx,
        })
    }

    /// Claim the send side of a named mailbox.
    ///
    /// Each name can be claimed once; a second open (or an open of a
    /// never-created name) fails with [`QueueError::NotFound`]. Dropping
    /// the returned sender is what the owner observes as a disconnect.
    pub fn open(&self, name: &str) -> Result<MailboxSender<T>, QueueError> {
        let mut pending = self.pending.lock().expect("registry lock poisoned");
        let sender = pending
            .shift_remove(name)
            .ok_or_else(|| QueueError::NotFound {
                name: name.to_string(),
            })?;
        Ok(MailboxSender {
            name: name.to_string(),
            sender,
        })
    }

    /// Names still awaiting a peer.
    pub fn pending_names(&self) -> Vec<String> {
        let pending = self.pending.lock().expect("registry lock poisoned");
        pending.keys().cloned().collect()
    }
}

/// The owning module's receive end of a named mailbox.
pub struct Mailbox<T> {
    name: String,
    receiver: Receiver<T>,
}

impl<T> Mailbox<T> {
    /// The mailbox name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Non-blocking receive.
    ///
    /// [`QueueError::Empty`] when no message is waiting,
    /// [`QueueError::Disconnected`] once the peer's sender is gone and
    /// the queue has drained.
    pub fn try_recv(&self) -> Result<T, QueueError> {
        self.receiver.try_recv().map_err(|err| match err {
            TryRecvError::Empty => QueueError::Empty {
                name: self.name.clone(),
            },
            TryRecvError::Disconnected => QueueError::Disconnected {
                name: self.name.clone(),
            },
        })
    }

    /// Receive with a bounded wait, for the scheduling loop's idle pass.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, QueueError> {
        self.receiver.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => QueueError::Empty {
                name: self.name.clone(),
            },
            RecvTimeoutError::Disconnected => QueueError::Disconnected {
                name: self.name.clone(),
            },
        })
    }

    /// Messages currently queued.
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Whether the queue is currently empty.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

/// The peer's send end of a named mailbox.
pub struct MailboxSender<T> {
    name: String,
    sender: Sender<T>,
}

impl<T> MailboxSender<T> {
    /// The mailbox name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Non-blocking send.
    ///
    /// [`QueueError::Full`] when the bounded queue is at capacity; the
    /// peer retries on its next pass. [`QueueError::Disconnected`] once
    /// the owning module has dropped the mailbox.
    pub fn try_send(&self, message: T) -> Result<(), QueueError> {
        self.sender.try_send(message).map_err(|err| match err {
            TrySendError::Full(_) => QueueError::Full {
                name: self.name.clone(),
            },
            TrySendError::Disconnected(_) => QueueError::Disconnected {
                name: self.name.clone(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_open_delivers_messages() {
        let registry: QueueRegistry<u32> = QueueRegistry::new();
        let mailbox = registry.create("sim.recv", 4).unwrap();
        let sender = registry.open("sim.recv").unwrap();

        sender.try_send(7).unwrap();
        assert_eq!(mailbox.try_recv(), Ok(7));
        assert!(matches!(
            mailbox.try_recv(),
            Err(QueueError::Empty { .. })
        ));
    }

    #[test]
    fn duplicate_create_is_fatal() {
        let registry: QueueRegistry<u32> = QueueRegistry::new();
        let _mailbox = registry.create("sim.recv", 4).unwrap();
        assert!(matches!(
            registry.create("sim.recv", 4),
            Err(QueueError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn send_side_is_claimed_once() {
        let registry: QueueRegistry<u32> = QueueRegistry::new();
        let _mailbox = registry.create("sim.recv", 4).unwrap();
        let _sender = registry.open("sim.recv").unwrap();
        assert!(matches!(
            registry.open("sim.recv"),
            Err(QueueError::NotFound { .. })
        ));
    }

    #[test]
    fn bounded_queue_reports_full() {
        let registry: QueueRegistry<u32> = QueueRegistry::new();
        let _mailbox = registry.create("sim.recv", 1).unwrap();
        let sender = registry.open("sim.recv").unwrap();
        sender.try_send(1).unwrap();
        assert!(matches!(
            sender.try_send(2),
            Err(QueueError::Full { .. })
        ));
    }

    #[test]
    fn dropped_sender_reads_as_disconnect_after_drain() {
        let registry: QueueRegistry<u32> = QueueRegistry::new();
        let mailbox = registry.create("sim.recv", 4).unwrap();
        let sender = registry.open("sim.recv").unwrap();
        sender.try_send(9).unwrap();
        drop(sender);

        // Queued messages are still delivered before the disconnect.
        assert_eq!(mailbox.try_recv(), Ok(9));
        assert!(matches!(
            mailbox.try_recv(),
            Err(QueueError::Disconnected { .. })
        ));
    }

    #[test]
    fn recv_timeout_bounds_the_idle_wait() {
        let registry: QueueRegistry<u32> = QueueRegistry::new();
        let mailbox = registry.create("sim.recv", 4).unwrap();
        let _sender = registry.open("sim.recv").unwrap();
        let start = std::time::Instant::now();
        assert!(matches!(
            mailbox.recv_timeout(Duration::from_millis(10)),
            Err(QueueError::Empty { .. })
        ));
        assert!(start.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn dropped_mailbox_disconnects_the_sender() {
        let registry: QueueRegistry<u32> = QueueRegistry::new();
        let mailbox = registry.create("sim.recv", 4).unwrap();
        let sender = registry.open("sim.recv").unwrap();
        drop(mailbox);
        assert!(matches!(
            sender.try_send(1),
            Err(QueueError::Disconnected { .. })
        ));
    }
}
