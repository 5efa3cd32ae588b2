//! Error types for the component registry, column storage, and migration.
//!
//! This module declares focused, composable error types used across the
//! storage and migration pipeline. Each error carries enough context to make
//! failures actionable while remaining small and cheap to pass around or
//! convert into the aggregate [`EcsError`].
//!
//! ## Goals
//! * **Specificity:** Each error type models a single failure mode (e.g.
//!   registry capacity exhaustion, column type mismatches, row misalignment
//!   between parallel columns).
//! * **Ergonomics:** All errors implement [`std::error::Error`] and
//!   [`fmt::Display`], and provide `From<T>` conversions into aggregate
//!   variants.
//! * **Actionability:** Structured fields (offending indices, expected vs.
//!   actual types) make logs useful without reproducing the issue.
//!
//! ## Failure model
//! The public world API has no transient or recoverable failures: stale
//! entity handles and absent components degrade to silent no-ops or `None`,
//! while registry capacity overflow and missing resources are fatal
//! programming errors. The errors below surface only when an *internal*
//! storage invariant is violated, which indicates a bug in the engine rather
//! than in the caller; they exist so such violations are reported with
//! structure instead of a bare panic deep inside column code.
//!
//! ## Display vs. Debug
//! * [`fmt::Display`] is optimized for operator logs (short, imperative
//!   phrasing).
//! * [`fmt::Debug`] (derived) retains full structure for diagnostics.

use std::any::TypeId;
use std::fmt;

use crate::engine::types::ComponentId;

/// Returned when the component registry cannot satisfy a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry has no room for another component type.
    CapacityExceeded {
        /// Configured maximum number of component types.
        cap: usize,
    },

    /// The registry lock was poisoned by a panicking writer.
    PoisonedLock,

    /// No storage factory is installed for the component ID.
    ///
    /// Raised when an ID allocated for a resource type is used as an
    /// archetype column, or when the ID is out of range.
    MissingFactory {
        /// Offending component ID.
        component_id: ComponentId,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::CapacityExceeded { cap } => {
                write!(f, "component registry full ({cap} component types)")
            }
            RegistryError::PoisonedLock => f.write_str("component registry lock poisoned"),
            RegistryError::MissingFactory { component_id } => {
                write!(f, "no storage factory registered for component {component_id}")
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Returned when a column write targets a storage slot whose element type
/// does not match the provided value's type.
///
/// This surfaces when component IDs diverge from the types stored behind
/// them (e.g. writing `Velocity` into a `Position` column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeMismatchError {
    /// Destination column's declared element type.
    pub expected: TypeId,

    /// Provided value's dynamic type.
    pub actual: TypeId,
}

impl fmt::Display for TypeMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "type mismatch: expected {:?}, actual {:?}",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for TypeMismatchError {}

/// Returned when a row index addresses a position outside a column's
/// initialized length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowOutOfBoundsError {
    /// Row index that was addressed.
    pub row: usize,

    /// Number of initialized rows in the column.
    pub len: usize,
}

impl fmt::Display for RowOutOfBoundsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {} out of bounds (column length {})", self.row, self.len)
    }
}

impl std::error::Error for RowOutOfBoundsError {}

/// Aggregate error for column (component storage) operations.
///
/// Conversions (`From<T>`) are implemented for the low-level errors so
/// callers can write `?` and still return a single, expressive type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnError {
    /// A row index addressed storage outside valid bounds.
    RowOutOfBounds(RowOutOfBoundsError),

    /// The dynamic type of a value did not match the column element type.
    TypeMismatch(TypeMismatchError),
}

impl fmt::Display for ColumnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnError::RowOutOfBounds(e) => write!(f, "{e}"),
            ColumnError::TypeMismatch(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ColumnError {}

impl From<RowOutOfBoundsError> for ColumnError {
    fn from(e: RowOutOfBoundsError) -> Self {
        ColumnError::RowOutOfBounds(e)
    }
}

impl From<TypeMismatchError> for ColumnError {
    fn from(e: TypeMismatchError) -> Self {
        ColumnError::TypeMismatch(e)
    }
}

/// Errors that can occur while moving an entity between archetypes.
///
/// ## Context
/// `MigrationError` is raised by the migration machinery when transferring
/// component rows between archetypes during add/remove operations.
///
/// ## Notes
/// These errors indicate internal inconsistencies or violated invariants
/// rather than recoverable user-facing failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationError {
    /// A column required by an archetype's signature was not allocated.
    MissingColumn {
        /// Component whose column was absent.
        component_id: ComponentId,
    },

    /// Failed while transferring component data between columns.
    ColumnTransfer {
        /// Component being transferred.
        component_id: ComponentId,

        /// Underlying column error.
        source_error: ColumnError,
    },

    /// Parallel columns disagreed about which row was swap-filled.
    ///
    /// This indicates a serious internal invariant violation: the entity
    /// column and component columns must shrink in lock-step.
    InconsistentSwapInfo {
        /// Swap position reported first.
        expected: Option<usize>,

        /// Conflicting swap position.
        got: Option<usize>,
    },

    /// Entity metadata could not be updated consistently after the move.
    MetadataFailure,
}

impl fmt::Display for MigrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MigrationError::MissingColumn { component_id } => {
                write!(f, "archetype is missing a column for component {component_id}")
            }
            MigrationError::ColumnTransfer { component_id, source_error } => {
                write!(
                    f,
                    "failed to transfer component {component_id} between archetypes: {source_error}"
                )
            }
            MigrationError::InconsistentSwapInfo { expected, got } => {
                write!(
                    f,
                    "columns disagreed on swap-removal: expected {expected:?}, got {got:?}"
                )
            }
            MigrationError::MetadataFailure => {
                f.write_str("failed to update entity metadata after archetype move")
            }
        }
    }
}

impl std::error::Error for MigrationError {}

/// Aggregate error type returned by world operations.
#[derive(Debug)]
pub enum EcsError {
    /// A component registry operation failed.
    Registry(RegistryError),

    /// A column storage operation failed.
    Column(ColumnError),

    /// An archetype migration failed.
    Migration(MigrationError),

    /// The world mutex was poisoned by a panicking holder.
    ///
    /// Fallible world operations report this instead of panicking; the
    /// infallible surface recovers the guard and continues.
    PoisonedLock,

    /// An internal invariant was violated.
    Internal(String),
}

impl fmt::Display for EcsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EcsError::Registry(e) => write!(f, "{e}"),
            EcsError::Column(e) => write!(f, "{e}"),
            EcsError::Migration(e) => write!(f, "{e}"),
            EcsError::PoisonedLock => f.write_str("world mutex poisoned"),
            EcsError::Internal(message) => write!(f, "internal error: {message}"),
        }
    }
}

impl std::error::Error for EcsError {}

impl From<RegistryError> for EcsError {
    fn from(e: RegistryError) -> Self {
        EcsError::Registry(e)
    }
}

impl From<ColumnError> for EcsError {
    fn from(e: ColumnError) -> Self {
        EcsError::Column(e)
    }
}

impl From<MigrationError> for EcsError {
    fn from(e: MigrationError) -> Self {
        EcsError::Migration(e)
    }
}

/// Result alias used throughout the engine.
pub type EcsResult<T> = Result<T, EcsError>;
