/*!
 * Error Types
 * Status taxonomy for dispatch operations with thiserror, miette, and serde support
 */

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dispatch-layer errors with serialization support
///
/// Every fallible operation in this crate reports one of these statuses;
/// they are deliberately payload-free so callers can match on them cheaply.
#[derive(Error, Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Diagnostic)]
#[serde(rename_all = "snake_case")]
pub enum DispatchError {
    #[error("Operation canceled: object is being torn down")]
    #[diagnostic(
        code(dispatch::canceled),
        help("The object was destroyed while the operation was in flight.")
    )]
    Canceled,

    #[error("Object state does not permit this operation")]
    #[diagnostic(
        code(dispatch::bad_state),
        help("Check the object's lifecycle state. A wait may already be in progress, or an acknowledgment may be owed.")
    )]
    BadState,

    #[error("Target not found")]
    #[diagnostic(
        code(dispatch::not_found),
        help("The target was already removed, delivered, or never registered.")
    )]
    NotFound,

    #[error("Already bound to a port")]
    #[diagnostic(
        code(dispatch::already_bound),
        help("Unbind the current destination before binding a new one.")
    )]
    AlreadyBound,

    #[error("Invalid arguments")]
    #[diagnostic(
        code(dispatch::invalid_args),
        help("Check flag combinations and option values for this call.")
    )]
    InvalidArgs,

    #[error("Operation not supported by this object kind")]
    #[diagnostic(
        code(dispatch::not_supported),
        help("Only waitable object kinds accept observers.")
    )]
    NotSupported,

    #[error("Blocking wait interrupted, retry")]
    #[diagnostic(
        code(dispatch::interrupted_retry),
        help("The wait was interrupted by the thread layer rather than completed. Callers should re-issue the wait.")
    )]
    InterruptedRetry,
}

/// Result type for dispatch operations
///
/// # Must Use
/// Dispatch operations can fail and must be handled to keep object state consistent
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;
