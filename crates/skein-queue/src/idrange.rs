//! Synchronized id ranges for an external writer process.
//!
//! The shared arena derives object names from per-kind id counters, so
//! two processes allocating into the same arena must never draw the
//! same id. There is no shared atomic counter across the process
//! boundary; instead the owning module grants the external writer a
//! private id window strictly above its own counters, and the writer
//! advances through that window on its own.
//!
//! A window is `ID_RANGE_STRIDE` ids wide and is placed at
//! `watermark + stride * instance`. Instance numbers increase strictly
//! across attachments and the module's watermark only grows, so window
//! `n + 1` always starts at or after the end of window `n`, and the
//! module's own counter stays below every window it has granted. Both
//! sides can therefore allocate concurrently without coordination after
//! the single handshake message.

use skein_core::InstanceNumber;

use crate::error::QueueError;

/// Width of one granted id window.
///
/// Wide enough that neither the module's local counter nor the writer
/// can plausibly exhaust it within one attachment.
pub const ID_RANGE_STRIDE: u64 = 1 << 32;

/// An id window granted to one attachment of the external writer.
///
/// Sent through the module's mailbox as the first message of each
/// attachment, before the writer creates any shared object.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdRangeGrant {
    /// Which attachment this grant belongs to.
    pub instance: InstanceNumber,
    /// First object id the writer may use.
    pub base_object: u64,
    /// First array id the writer may use.
    pub base_array: u64,
}

impl IdRangeGrant {
    /// Issue a grant for `instance` from the module's current id
    /// watermarks, as returned by the arena.
    ///
    /// The granted bases are strictly above both watermarks, so every
    /// id the writer draws is strictly above every id the module has
    /// handed out so far.
    pub fn issue(instance: InstanceNumber, watermarks: (u64, u64)) -> Self {
        let offset = ID_RANGE_STRIDE * u64::from(instance.get());
        Self {
            instance,
            base_object: watermarks.0 + offset,
            base_array: watermarks.1 + offset,
        }
    }

    /// One past the last object id in this window.
    pub fn object_limit(&self) -> u64 {
        self.base_object + ID_RANGE_STRIDE
    }

    /// One past the last array id in this window.
    pub fn array_limit(&self) -> u64 {
        self.base_array + ID_RANGE_STRIDE
    }
}

/// The external writer's private id counters within one granted window.
///
/// Single-threaded by construction: the writer process has one thread
/// talking to the pipeline.
#[derive(Debug)]
pub struct ExternalIdAllocator {
    grant: IdRangeGrant,
    next_object: u64,
    next_array: u64,
}

impl ExternalIdAllocator {
    /// Start allocating at the beginning of the granted window.
    pub fn new(grant: IdRangeGrant) -> Self {
        Self {
            grant,
            next_object: grant.base_object,
            next_array: grant.base_array,
        }
    }

    /// The grant this allocator draws from.
    pub fn grant(&self) -> &IdRangeGrant {
        &self.grant
    }

    /// Draw the next object id.
    pub fn next_object_id(&mut self) -> u64 {
        assert!(
            self.next_object < self.grant.object_limit(),
            "external writer exhausted its granted object-id window"
        );
        let id = self.next_object;
        self.next_object += 1;
        id
    }

    /// Draw the next array id.
    pub fn next_array_id(&mut self) -> u64 {
        assert!(
            self.next_array < self.grant.array_limit(),
            "external writer exhausted its granted array-id window"
        );
        let id = self.next_array;
        self.next_array += 1;
        id
    }
}

/// Perform the module side of the id handshake over a mailbox sender.
///
/// Allocates a fresh instance number, issues the grant, and sends it as
/// the first message of the attachment. Returns the grant so the module
/// can log and remember the active instance.
pub fn grant_id_range(
    sender: &crate::mailbox::MailboxSender<IdRangeGrant>,
    watermarks: (u64, u64),
) -> Result<IdRangeGrant, QueueError> {
    let grant = IdRangeGrant::issue(InstanceNumber::next(), watermarks);
    sender.try_send(grant)?;
    Ok(grant)
}
