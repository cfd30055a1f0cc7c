//! Publish-time structural checks for rule sets.
//!
//! Anything that would make evaluation ambiguous is refused here, before a
//! rule set can be referenced by an asset. Accepted sets are acyclic, and
//! every operation tree fits the configured depth and expanded cost, so
//! evaluation of a published set always finishes within those bounds.

use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec;

use crate::config::EngineConfig;
use crate::rules::types::{Predicate, RuleId, RuleNode, RuleSet, RuleSetError};

/// Longest accepted rule set or operation name, in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Check a decoded rule set against structural rules and configured limits.
pub fn check_rule_set(rule_set: &RuleSet, config: &EngineConfig) -> Result<(), RuleSetError> {
    if rule_set.name.is_empty() {
        return Err(RuleSetError::EmptyName);
    }
    if rule_set.name.len() > MAX_NAME_LEN {
        return Err(RuleSetError::NameTooLong(rule_set.name.len()));
    }
    if rule_set.nodes.len() > config.max_rule_nodes {
        return Err(RuleSetError::TooManyNodes {
            actual: rule_set.nodes.len(),
            limit: config.max_rule_nodes,
        });
    }

    for (index, node) in rule_set.nodes.iter().enumerate() {
        let id = RuleId(index as u32);
        check_node(id, node, rule_set.nodes.len(), config)?;
    }

    if rule_set.operations.is_empty() {
        return Err(RuleSetError::NoOperations);
    }
    if rule_set.operations.len() > config.max_operations {
        return Err(RuleSetError::TooManyOperations {
            actual: rule_set.operations.len(),
            limit: config.max_operations,
        });
    }
    for (operation, root) in &rule_set.operations {
        if operation.is_empty() || operation.len() > MAX_NAME_LEN {
            return Err(RuleSetError::NameTooLong(operation.len()));
        }
        if root.index() >= rule_set.nodes.len() {
            return Err(RuleSetError::MissingRoot {
                operation: operation.to_string(),
                root: *root,
            });
        }
    }

    let extents = measure(rule_set)?;
    for (operation, root) in &rule_set.operations {
        let extent = extents[root.index()];
        if extent.depth > config.max_rule_depth {
            return Err(RuleSetError::TooDeep {
                operation: operation.to_string(),
                depth: extent.depth,
                limit: config.max_rule_depth,
            });
        }
        if extent.cost > config.max_rule_cost {
            return Err(RuleSetError::TooCostly {
                operation: operation.to_string(),
                cost: extent.cost,
                limit: config.max_rule_cost,
            });
        }
    }
    Ok(())
}

fn check_node(
    id: RuleId,
    node: &RuleNode,
    node_count: usize,
    config: &EngineConfig,
) -> Result<(), RuleSetError> {
    for child in node.children() {
        if child.index() >= node_count {
            return Err(RuleSetError::DanglingReference { node: id, child: *child });
        }
        if *child == id {
            return Err(RuleSetError::CycleDetected(id));
        }
    }

    if let RuleNode::Predicate(Predicate::PubkeyMatch { keys: set })
    | RuleNode::Predicate(Predicate::ProgramOwned { programs: set }) = node
    {
        if set.is_empty() {
            return Err(RuleSetError::EmptyKeySet(id));
        }
        if set.len() > config.max_keys_per_predicate {
            return Err(RuleSetError::TooManyKeys {
                node: id,
                actual: set.len(),
                limit: config.max_keys_per_predicate,
            });
        }
    }
    Ok(())
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Size of the tree below a node once shared children are expanded.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
struct Extent {
    /// Nodes on the longest path, the node itself included.
    depth: usize,
    /// Node visits of a full evaluation, saturating.
    cost: usize,
}

/// Iterative three-colour DFS over every node, so unreachable cycles are
/// refused as well. Each node is measured once, when its last child is done.
fn measure(rule_set: &RuleSet) -> Result<Vec<Extent>, RuleSetError> {
    let mut marks = vec![Mark::Unvisited; rule_set.nodes.len()];
    let mut extents = vec![Extent::default(); rule_set.nodes.len()];
    let mut stack = vec![];

    for start in 0..rule_set.nodes.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        // (node, next child position)
        stack.push((start, 0usize));
        marks[start] = Mark::InProgress;

        while let Some(top) = stack.last_mut() {
            let (node, position) = *top;
            top.1 += 1;
            match rule_set.nodes[node].children().get(position) {
                Some(child) => {
                    let child = child.index();
                    match marks[child] {
                        Mark::InProgress => {
                            return Err(RuleSetError::CycleDetected(RuleId(child as u32)))
                        }
                        Mark::Unvisited => {
                            marks[child] = Mark::InProgress;
                            stack.push((child, 0));
                        }
                        Mark::Done => {}
                    }
                }
                None => {
                    let mut extent = Extent { depth: 1, cost: 1 };
                    for child in rule_set.nodes[node].children() {
                        let below = extents[child.index()];
                        extent.depth = extent.depth.max(below.depth.saturating_add(1));
                        extent.cost = extent.cost.saturating_add(below.cost);
                    }
                    extents[node] = extent;
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }
    }
    Ok(extents)
}
