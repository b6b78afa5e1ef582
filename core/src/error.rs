use crate::dist::DistPair;
use distla_kernels::KernelError;
use thiserror::Error;

/// Error type for distributed matrix operations.
#[derive(Error, Debug)]
pub enum DistError {
    /// Grid shape, alignment or tuning parameters are invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// No route exists between the two distributions (for instance, the
    /// matrices live on different grids).
    #[error("Unsupported redistribution from {src} to {dst}: {reason}")]
    UnsupportedRedistribution {
        src: DistPair,
        dst: DistPair,
        reason: String,
    },

    /// The requested algorithm variant cannot handle the given operands.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Operand dimensions do not agree, e.g. `Nonconformal GemmNN`.
    #[error("Nonconformal {op}: {dims}")]
    Nonconformal { op: String, dims: String },

    #[error("Index ({row}, {col}) out of bounds for a {height}x{width} matrix")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        height: usize,
        width: usize,
    },

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },

    #[error("Failed to allocate {elements} elements for a local buffer")]
    Allocation { elements: usize },

    #[error("Communication failure: {0}")]
    Communication(String),

    /// This rank stopped because another rank failed first.
    #[error("Rank {rank} aborted after a peer failed")]
    Aborted { rank: usize },

    #[error("Rank {rank} panicked: {message}")]
    Panicked { rank: usize, message: String },

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error("Invalid configuration file: {0}")]
    Config(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DistError>;

impl DistError {
    pub(crate) fn nonconformal(op: impl Into<String>, dims: impl Into<String>) -> Self {
        DistError::Nonconformal {
            op: op.into(),
            dims: dims.into(),
        }
    }
}
