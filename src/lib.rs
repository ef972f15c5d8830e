//! Log-domain Sinkhorn optimal transport for 3-D point clouds.
//!
//! Computes an entropic-regularized optimal-transport coupling between a
//! source and a target point cloud (Peyré & Cuturi, "Computational Optimal
//! Transport", Remark 4.22) and moves every source point to the soft
//! barycenter of the targets under that coupling. The iteration runs on
//! the dual potentials in the log domain, which keeps it stable at small
//! regularization where a naive Sinkhorn diverges numerically.
//!
//! # Architecture
//!
//! A solve is a straight pipeline through four phases:
//! - Phase 1: Cost matrix (pairwise squared Euclidean distances)
//! - Phase 2: Marginal weights and zero-initialized dual potentials
//! - Phase 3: Alternating log-domain potential updates with three
//!   termination conditions (error convergence, stagnation, iteration
//!   budget)
//! - Phase 4: Position resolution (stabilized barycenter per source point)
//!
//! The dense work inside each phase runs through a kernel backend: host
//! memory with `rayon` by default, or CubeCL CUDA kernels behind the
//! `cuda` feature.
//!
//! # Usage
//!
//! ```ignore
//! use sinkhorn_cuda::SinkhornTransport;
//!
//! let solver = SinkhornTransport::builder()
//!     .epsilon(0.03)
//!     .emit_diagnostics(true)
//!     .build()?;
//!
//! let result = solver.transport(&source_points, &target_points)?;
//! for (point, new_position) in source_points.iter().zip(&result.positions) {
//!     println!("{point:?} -> {new_position:?}");
//! }
//!
//! let diag = result.diagnostics.unwrap();
//! println!("{} iterations, {:?}", diag.iterations, diag.termination_reason);
//! ```

pub mod backend;
pub mod cost;
pub mod error;
pub mod marginals;
pub mod numerics;
pub mod resolve;
pub mod solver;
pub mod test_utils;
pub mod transport;

pub use cost::{build_cost_matrix, CostMatrix};
pub use error::{Result, SinkhornError};
pub use marginals::{Marginals, Potentials};
pub use solver::{
    SinkhornConfig, SinkhornResult, SolveDiagnostics, TerminationReason, MIN_EPSILON,
    MIN_TOLERANCE,
};

// High-level API (recommended for most users)
pub use transport::{transport_positions, SinkhornTransport, SinkhornTransportBuilder};

// Kernel backends (for direct access)
pub use backend::{cpu::CpuKernels, SinkhornKernels};
#[cfg(feature = "cuda")]
pub use backend::gpu::{is_cuda_available, GpuKernels};
