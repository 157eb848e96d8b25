//! Inter-process coupling substrate: named mailboxes, synchronized id
//! ranges, and the in-situ connect protocol.
//!
//! This is how an external, uncontrolled process (a live simulation)
//! safely injects data into the shared arena while the pipeline runs:
//!
//! ```text
//!   simulation writer                         module (per rank)
//!        │  TCP: token / success / args  │
//!        ├───────────────────────────────▶│   handshake
//!        │                               │
//!        │◀── IdRangeGrant ──────────────┤   idrange (fresh instance)
//!        │                               │
//!        ├── data-ready messages ───────▶│   mailbox (bounded, polled)
//!        ╳  (sender dropped)             │   → Disconnected, module
//!                                        │     forced back to Idle
//! ```
//!
//! Queues are bounded and polled cooperatively; peer loss surfaces as a
//! closed channel on the next poll, never via a heartbeat.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

mod error;
mod handshake;
mod idrange;
mod mailbox;

pub use error::{HandshakeError, QueueError};
pub use handshake::{accept_writer, connect_writer, RESPONSE_SUCCESS};
pub use idrange::{grant_id_range, ExternalIdAllocator, IdRangeGrant, ID_RANGE_STRIDE};
pub use mailbox::{Mailbox, MailboxSender, QueueRegistry};
