//! Error types for pool backends and the allocator

/// Failure reported by a [`PoolFactory`](super::PoolFactory) primitive
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// The pool has no capacity left for this request
    #[error("pool exhausted")]
    Exhausted,

    /// The pool has free capacity but cannot place this request
    #[error("pool fragmented")]
    Fragmented,

    /// Host or device memory ran out
    #[error("out of memory")]
    OutOfMemory,

    /// Any other backend failure
    #[error("backend error: {0}")]
    Backend(String),
}

/// Coarse classification of a [`PoolError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolErrorKind {
    /// See [`PoolError::Exhausted`]
    Exhausted,
    /// See [`PoolError::Fragmented`]
    Fragmented,
    /// See [`PoolError::OutOfMemory`]
    OutOfMemory,
    /// See [`PoolError::Backend`]
    Backend,
}

impl PoolError {
    /// Classify this error
    pub fn kind(&self) -> PoolErrorKind {
        match self {
            Self::Exhausted => PoolErrorKind::Exhausted,
            Self::Fragmented => PoolErrorKind::Fragmented,
            Self::OutOfMemory => PoolErrorKind::OutOfMemory,
            Self::Backend(_) => PoolErrorKind::Backend,
        }
    }

    /// Whether moving to another pool may satisfy the request
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), PoolErrorKind::Exhausted | PoolErrorKind::Fragmented)
    }
}

/// Which side of the contract an [`AllocatorError`] blames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The caller used the allocator outside its state machine
    ProgrammingFault,
    /// The backend cannot provide a usable pool; there is no degraded mode
    StructuralFailure,
}

/// Errors surfaced by [`PoolAllocator`](super::PoolAllocator)
///
/// Pool exhaustion is handled internally and never shows up here. Every
/// variant is terminal for the operation that produced it.
#[derive(thiserror::Error, Debug)]
pub enum AllocatorError {
    /// An operation other than `init` was called before `init` or after `destroy`
    #[error("allocator is not initialized: `{operation}` requires a prior init")]
    NotReady {
        /// Name of the rejected operation
        operation: &'static str,
    },

    /// `init` was called on an allocator that is already initialized
    #[error("allocator is already initialized; destroy it before calling init again")]
    AlreadyInitialized,

    /// `init` was called with a base capacity of zero
    #[error("base capacity must be at least 1")]
    ZeroCapacity,

    /// The backend refused to create a pool
    #[error("failed to create pool with capacity {capacity}: {source}")]
    PoolCreation {
        /// Capacity that was requested
        capacity: u32,
        /// Backend failure
        source: PoolError,
    },

    /// The next pool's capacity does not fit in `u32`
    #[error("pool capacity overflow: {base} * {factor}")]
    CapacityOverflow {
        /// Base capacity
        base: u32,
        /// Growth factor that was about to be applied
        factor: u32,
    },

    /// The single retry after advancing to the next pool also failed
    #[error("allocation retry on pool {pool_index} failed: {source}")]
    RetryFailed {
        /// Pool the retry ran against
        pool_index: usize,
        /// Backend failure
        source: PoolError,
    },

    /// A non-retryable backend failure during allocation
    #[error("allocation from pool {pool_index} failed: {source}")]
    Backend {
        /// Pool the allocation ran against
        pool_index: usize,
        /// Backend failure
        source: PoolError,
    },

    /// Resetting a pool during `clear` failed
    #[error("failed to reset pool {pool_index}: {source}")]
    Reset {
        /// Pool that failed to reset
        pool_index: usize,
        /// Backend failure
        source: PoolError,
    },

    /// Destroying a pool during `destroy` failed
    #[error("failed to destroy pool {pool_index}: {source}")]
    Destroy {
        /// Pool that failed to destroy
        pool_index: usize,
        /// Backend failure
        source: PoolError,
    },
}

impl AllocatorError {
    /// Classify this error
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::NotReady { .. } | Self::AlreadyInitialized | Self::ZeroCapacity => {
                ErrorClass::ProgrammingFault
            }
            Self::PoolCreation { .. }
            | Self::CapacityOverflow { .. }
            | Self::RetryFailed { .. }
            | Self::Backend { .. }
            | Self::Reset { .. }
            | Self::Destroy { .. } => ErrorClass::StructuralFailure,
        }
    }

    /// Shorthand for `class() == ErrorClass::ProgrammingFault`
    pub fn is_programming_fault(&self) -> bool {
        self.class() == ErrorClass::ProgrammingFault
    }

    /// Backend error behind this failure, if any
    pub fn pool_error(&self) -> Option<&PoolError> {
        match self {
            Self::PoolCreation { source, .. }
            | Self::RetryFailed { source, .. }
            | Self::Backend { source, .. }
            | Self::Reset { source, .. }
            | Self::Destroy { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for allocator operations
pub type AllocatorResult<T> = Result<T, AllocatorError>;
