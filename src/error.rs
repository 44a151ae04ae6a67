//! Fatal synchronization errors.
//!
//! Almost every failure is contained at the single node being processed and
//! surfaced as a [`crate::diagnostics::Diagnostic`]. The exceptions below are
//! the cases where no consistent partial result exists: the host adapter
//! rejected a structural mutation that the rest of the call depends on.

use thiserror::Error;

/// Error aborting an entire `synchronize` call.
///
/// `E` is the host adapter's error type.
#[derive(Debug, Error)]
pub enum SyncError<E: std::error::Error + 'static> {
    /// The attachment point itself rejected an insert. Nothing can be placed
    /// under it, so the call cannot produce a consistent result.
    #[error("host adapter rejected insert at the attachment point: {source}")]
    Attach {
        /// Underlying adapter error.
        #[source]
        source: E,
    },
}
