//! Log-domain Sinkhorn iterator: configuration, termination, and the
//! alternating dual-potential update loop.

mod iterate;
mod types;

pub(crate) use iterate::run;
pub use types::{
    SinkhornConfig, SinkhornResult, SolveDiagnostics, TerminationReason, MIN_EPSILON,
    MIN_TOLERANCE,
};
