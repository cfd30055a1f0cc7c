//! Rule tree evaluation.
//!
//! Depth-first and short-circuiting. `All` stops at the first denying
//! child and reports its reason. `Any` stops at the first satisfied child;
//! when every child denies, the reasons of all children are reported in
//! child order as [`PolicyError::NoneSatisfied`]. `Not` inverts its child's
//! outcome, except that fatal errors (depth exhaustion, dangling ids) pass
//! through untouched so a broken subtree can never authorize.
//!
//! Outcomes are memoized per node for the duration of one evaluation, so a
//! child shared by several parents is evaluated once rather than once per
//! path. Composite reasons share their children through [`Arc`].

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use tracing::trace;

use crate::config::MAX_RULE_DEPTH_CEILING;
use crate::engine::context::TransferContext;
use crate::engine::verdict::{PolicyError, Verdict};
use crate::rules::predicate::evaluate_predicate;
use crate::rules::types::{RuleId, RuleNode, RuleSet};

/// Settled outcome of a node, valid at `depth` and anywhere shallower.
type Memo = Vec<Option<(usize, Result<(), PolicyError>)>>;

/// Evaluates one rule set against one transfer context.
pub struct RuleEvaluator<'a> {
    rule_set: &'a RuleSet,
    context: &'a TransferContext,
    max_depth: usize,
}

impl<'a> RuleEvaluator<'a> {
    /// `max_depth` is capped at [`MAX_RULE_DEPTH_CEILING`].
    pub fn new(rule_set: &'a RuleSet, context: &'a TransferContext, max_depth: usize) -> Self {
        Self {
            rule_set,
            context,
            max_depth: max_depth.min(MAX_RULE_DEPTH_CEILING),
        }
    }

    /// Evaluate the tree rooted at `root`.
    pub fn evaluate(&self, root: RuleId) -> Verdict {
        Verdict::from(self.check(root))
    }

    /// Evaluate the tree rooted at `root`, returning the policy reason on denial.
    pub fn check(&self, root: RuleId) -> Result<(), PolicyError> {
        let mut memo = vec![None; self.rule_set.nodes.len()];
        self.eval_node(root, 1, &mut memo)
    }

    fn eval_node(&self, id: RuleId, depth: usize, memo: &mut Memo) -> Result<(), PolicyError> {
        if depth > self.max_depth {
            return Err(PolicyError::TreeTooDeep {
                limit: self.max_depth,
            });
        }
        // a non-fatal outcome never touched the depth bound, so it holds
        // wherever there is at least as much room left
        if let Some(Some((settled_at, outcome))) = memo.get(id.index()) {
            if depth <= *settled_at {
                return outcome.clone();
            }
        }
        let node = self
            .rule_set
            .node(id)
            .ok_or(PolicyError::DanglingRule(id))?;

        let result = self.eval_children(id, node, depth, memo);
        trace!(rule = %id, depth, passed = result.is_ok(), "evaluated rule node");
        if !matches!(&result, Err(e) if e.is_fatal()) {
            if let Some(slot) = memo.get_mut(id.index()) {
                *slot = Some((depth, result.clone()));
            }
        }
        result
    }

    fn eval_children(
        &self,
        id: RuleId,
        node: &RuleNode,
        depth: usize,
        memo: &mut Memo,
    ) -> Result<(), PolicyError> {
        match node {
            RuleNode::All(children) => {
                for child in children {
                    self.eval_node(*child, depth + 1, memo)?;
                }
                Ok(())
            }
            RuleNode::Any(children) => {
                let mut reasons = Vec::with_capacity(children.len());
                for child in children {
                    match self.eval_node(*child, depth + 1, memo) {
                        Ok(()) => return Ok(()),
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => reasons.push(e),
                    }
                }
                Err(PolicyError::NoneSatisfied(reasons.into()))
            }
            RuleNode::Not(child) => match self.eval_node(*child, depth + 1, memo) {
                Ok(()) => Err(PolicyError::NegatedRuleSatisfied(id)),
                Err(e) if e.is_fatal() => Err(e),
                Err(_) => Ok(()),
            },
            RuleNode::Predicate(predicate) => {
                if evaluate_predicate(predicate, self.context) {
                    Ok(())
                } else {
                    Err(PolicyError::PredicateFailed(id))
                }
            }
        }
    }
}

/// Evaluate `rule_set` from `root` with a depth bound.
pub fn evaluate_rule_tree(
    rule_set: &RuleSet,
    root: RuleId,
    context: &TransferContext,
    max_depth: usize,
) -> Verdict {
    RuleEvaluator::new(rule_set, context, max_depth).evaluate(root)
}
