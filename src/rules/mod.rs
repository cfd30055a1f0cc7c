//! Rule sets: arena types, binary codec, publish-time checks, the
//! predicate and tree evaluators, and the published rule set registry.

pub mod codec;
pub mod evaluator;
pub mod integrity;
pub mod predicate;
pub mod registry;
pub mod types;

pub use codec::{decode_rule_set, encode_rule_set};
pub use evaluator::{evaluate_rule_tree, RuleEvaluator};
pub use integrity::check_rule_set;
pub use predicate::evaluate_predicate;
pub use registry::{PublishedRuleSet, RuleSetRegistry};
pub use types::{CompareOp, Predicate, RuleId, RuleNode, RuleSet, RuleSetBuilder, RuleSetError};
