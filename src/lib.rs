//! # Token Transfer Auth
//!
//! Authorization engine for token transfers whose permissibility depends on
//! the asset's token standard and, for programmable assets, on a published
//! rule set.
//!
//! ## Features
//!
//! - **Standard Gating**: Only programmable non-fungibles consult rule sets
//! - **Composable Rules**: `All` / `Any` / `Not` over key, program and amount predicates
//! - **Fail Closed**: Depth limits and broken references always deny
//! - **Atomic Commit**: Balances move only on an authorized verdict
//! - **`no_std` Compatible**: Core engine needs only `alloc`
//!
//! ## Quick Start
//!
//! ```rust
//! use token_transfer_auth::{
//!     Metadata, Predicate, Pubkey, RuleSetBuilder, TokenAccount,
//!     TransferAuthorizationEngine, TransferRequest,
//! };
//!
//! let mut engine = TransferAuthorizationEngine::default();
//!
//! // Only `marketplace` may receive the asset
//! let marketplace = Pubkey::new_unique();
//! let rule_set_address = Pubkey::new_unique();
//! let mut rules = RuleSetBuilder::new("marketplace-only", Pubkey::new_unique());
//! let root = rules.predicate(Predicate::PubkeyMatch { keys: vec![marketplace] });
//! rules.operation("Transfer", root);
//! engine.publish_rule_set(rule_set_address, rules.build()).unwrap();
//!
//! let mint = Pubkey::new_unique();
//! let owner = Pubkey::new_unique();
//! let asset = Metadata::programmable(mint, Some(rule_set_address));
//! let mut source = TokenAccount::with_amount(mint, owner, 1);
//! let mut destination = TokenAccount::new(mint, marketplace);
//!
//! let verdict = engine.authorize(TransferRequest::new(owner, &mut source, &mut destination, &asset, 1));
//! assert!(verdict.is_authorized());
//! assert_eq!(destination.amount, 1);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

// Module declarations
pub mod config;
pub mod engine;
pub mod error;
pub mod rules;
pub mod standard;
pub mod types;
pub mod utils;
pub mod validator;

// Re-export the engine surface
pub use engine::{
    DenialReason, Operation, PolicyError, TransferAuthorizationEngine, TransferContext,
    TransferRequest, TransferScenario, Verdict,
};
pub use standard::{classify, ValidationPath};
pub use validator::{validate, StructuralError};

// Re-export rule set types
pub use rules::{
    check_rule_set, decode_rule_set, encode_rule_set, evaluate_predicate, evaluate_rule_tree,
    CompareOp, Predicate, PublishedRuleSet, RuleEvaluator, RuleId, RuleNode, RuleSet,
    RuleSetBuilder, RuleSetError, RuleSetRegistry,
};

// Re-export types
pub use config::{ConfigError, EngineConfig};
pub use error::{Result, TransferAuthError};
pub use types::{
    Metadata, MetadataError, ParseError, ProgrammableConfig, Pubkey, TokenAccount, TokenStandard,
    TokenState,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
