//! Error taxonomy for the core.

use crate::layer::LayerId;
use thiserror::Error;

/// Errors reported by stack, history, and sync operations.
///
/// None of these are fatal: stack lookups recover as no-ops, history
/// boundaries are expected during normal use, and link/decode failures are
/// isolated to a single peer or message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A layer id was not present in the stack.
    #[error("no layer with id {0}")]
    NotFound(LayerId),

    /// The stack already consists of a single layer.
    #[error("nothing to merge")]
    NothingToMerge,

    /// The history cursor is at the oldest entry.
    #[error("nothing to undo")]
    NothingToUndo,

    /// The history cursor is at the newest entry.
    #[error("nothing to redo")]
    NothingToRedo,

    /// Sending to one peer failed. Never aborts a broadcast.
    #[error("send to peer {peer} failed: {reason}")]
    LinkSendFailure { peer: String, reason: String },

    /// An inbound message or encoded snapshot could not be decoded.
    #[error("decode failed: {0}")]
    DecodeFailure(String),
}

pub type Result<T> = std::result::Result<T, Error>;
