//! Error type used by the executor, scopes, modules and instances.
//!
//! [`Error`] covers both failures raised by the runtime itself (unknown
//! identities, invalid registrations, factories producing nothing) and
//! failures raised by user work ([`Error::Task`]).
//!
//! The type is `Clone`: a settled future is shared between the scope memo,
//! the executor bookkeeping and any number of awaiting callers, and every one
//! of them observes the same failure.
//!
//! Every variant has `as_label` / `as_message` helpers for logs.

use thiserror::Error;

use crate::identity::Identity;

/// Convenience alias used across the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// # Errors produced by the runtime and by scheduled work.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// `construct` was asked for an identity the module template does not know.
    #[error("identity not found: {identity:?}")]
    MissingIdentity {
        /// The identity that could not be resolved.
        identity: Identity,
    },

    /// A factory or constant was registered under a reserved inbuilt identity.
    #[error("invalid factory for {identity:?}: {reason}")]
    InvalidFactory {
        /// The offending identity.
        identity: Identity,
        /// Why the registration was refused.
        reason: String,
    },

    /// A factory produced the unit value (nothing usable).
    #[error("factory must not produce unit (identity={identity:?})")]
    UndefinedConstructionResult {
        /// Identity whose factory produced nothing.
        identity: Identity,
    },

    /// An identity depends on itself, directly or through other factories
    /// or hooks, while it is still being constructed.
    #[error("dependency cycle through {identity:?}")]
    Cycle {
        /// Identity that was re-entered.
        identity: Identity,
    },

    /// `extends_dyn` received something that is not a module.
    #[error("source must be a module (got={got})")]
    InvalidModule {
        /// Type name of the rejected value.
        got: &'static str,
    },

    /// A resolved value did not have the type the caller asked for.
    #[error("value has unexpected type (expected={expected})")]
    TypeMismatch {
        /// Requested type name.
        expected: &'static str,
    },

    /// A spec asked for more arguments than were resolved.
    #[error("argument {index} missing (got {len})")]
    MissingArgument {
        /// Requested position.
        index: usize,
        /// Number of available arguments.
        len: usize,
    },

    /// An inbuilt handle outlived its instance.
    #[error("instance dropped")]
    Dropped,

    /// Scheduled work, a hook or a subscriber failed.
    #[error("task failed: {error}")]
    Task {
        /// The underlying error message.
        error: String,
    },
}

impl Error {
    /// Builds an [`Error::Task`] from anything printable.
    ///
    /// # Example
    /// ```
    /// use taskscope::Error;
    ///
    /// let err = Error::fail("boom");
    /// assert_eq!(err.to_string(), "task failed: boom");
    /// ```
    pub fn fail(error: impl std::fmt::Display) -> Self {
        Error::Task {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use taskscope::Error;
    ///
    /// let err = Error::MissingIdentity { identity: "db".into() };
    /// assert_eq!(err.as_label(), "missing_identity");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            Error::MissingIdentity { .. } => "missing_identity",
            Error::InvalidFactory { .. } => "invalid_factory",
            Error::UndefinedConstructionResult { .. } => "undefined_construction_result",
            Error::Cycle { .. } => "dependency_cycle",
            Error::InvalidModule { .. } => "invalid_module",
            Error::TypeMismatch { .. } => "type_mismatch",
            Error::MissingArgument { .. } => "missing_argument",
            Error::Dropped => "instance_dropped",
            Error::Task { .. } => "task_failed",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            Error::MissingIdentity { identity } => format!("missing: {identity}"),
            Error::InvalidFactory { identity, reason } => format!("invalid {identity}: {reason}"),
            Error::UndefinedConstructionResult { identity } => format!("unit from: {identity}"),
            Error::Cycle { identity } => format!("cycle at: {identity}"),
            Error::InvalidModule { got } => format!("not a module: {got}"),
            Error::TypeMismatch { expected } => format!("expected: {expected}"),
            Error::MissingArgument { index, len } => format!("arg {index} of {len}"),
            Error::Dropped => "instance dropped".to_string(),
            Error::Task { error } => format!("error: {error}"),
        }
    }

    /// True for failures raised by user work rather than by the runtime.
    pub fn is_task(&self) -> bool {
        matches!(self, Error::Task { .. })
    }
}
