//! Guardrail gate for Tangent.
//!
//! Every agent exchange passes through the gate twice: the user prompt before
//! any provider call (IN) and the final answer before it is returned (OUT).
//! In direct mode the gate posts each stage to a policy endpoint; in proxy
//! mode enforcement happens inside a policy-enforcing reverse proxy and the
//! gate only supplies the routing.
//!
//! The gate fails closed. A missing credential, an unreachable service, or a
//! non-success status is [`GuardError::Unavailable`], and callers must treat
//! it as a block.

pub mod error;
pub mod gate;

pub use error::{GuardError, Result};
pub use gate::{
    DEFAULT_ENDPOINT, GuardConfig, GuardGate, GuardMode, GuardVerdict, parse_verdict,
};
