//! Tuning knobs shared by every rank of a [`Universe`](crate::distributed::Universe).
//!
//! Configuration is plain data: it is loaded once (from defaults, a JSON
//! string or a JSON file), handed to the universe, and read by the algorithms
//! through the grid's communicators. Every rank sees the same values, which
//! matters because block sizes decide how many collectives an algorithm runs.

use crate::blas::level3::GemmAlgorithm;
use crate::error::{DistError, Result};
use distla_kernels::Backend;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which local kernel runs the per-process products.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalKernel {
    Reference,
    #[default]
    MatrixMultiply,
}

impl From<LocalKernel> for Backend {
    fn from(kernel: LocalKernel) -> Self {
        match kernel {
            LocalKernel::Reference => Backend::Reference,
            LocalKernel::MatrixMultiply => Backend::MatrixMultiply,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Panel width of the SUMMA and Trr2k loops.
    pub blocksize: usize,
    /// `LocalTrr2k` recurses while the diagonal block is at least
    /// `grid width * local_trr2k_blocksize` tall.
    pub local_trr2k_blocksize: usize,
    pub kernel: LocalKernel,
    /// Variant used when `gemm` is called with [`GemmAlgorithm::Default`].
    pub gemm_algorithm: GemmAlgorithm,
    /// Record every collective in [`CommStats`](crate::distributed::CommStats).
    pub trace_collectives: bool,
    /// How often a blocked receive checks whether the universe was aborted.
    pub poll_interval_ms: u64,
    /// Give up on a receive after this long. `None` waits forever.
    pub recv_timeout_ms: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            blocksize: 128,
            local_trr2k_blocksize: 64,
            kernel: LocalKernel::default(),
            gemm_algorithm: GemmAlgorithm::Default,
            trace_collectives: false,
            poll_interval_ms: 10,
            recv_timeout_ms: None,
        }
    }
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn with_blocksize(mut self, blocksize: usize) -> Self {
        self.blocksize = blocksize;
        self
    }

    pub fn with_tracing(mut self, trace_collectives: bool) -> Self {
        self.trace_collectives = trace_collectives;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.blocksize == 0 {
            return Err(DistError::Configuration(
                "blocksize must be positive".to_string(),
            ));
        }
        if self.local_trr2k_blocksize == 0 {
            return Err(DistError::Configuration(
                "local_trr2k_blocksize must be positive".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(DistError::Configuration(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
