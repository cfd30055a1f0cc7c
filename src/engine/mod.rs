//! Transfer authorization.
//!
//! Builds the per-request context, runs structural validation and, for
//! programmable assets, rule set evaluation, then commits the transfer.

pub mod authorize;
pub mod context;
pub mod verdict;

pub use authorize::{TransferAuthorizationEngine, TransferRequest};
pub use context::{Operation, TransferContext, TransferScenario};
pub use verdict::{DenialReason, PolicyError, Verdict};
