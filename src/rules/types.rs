//! Rule set types.
//!
//! A rule set is a flat arena of rule nodes addressed by [`RuleId`].
//! Combinators refer to their children by index, and each operation name
//! points at the root node used to authorize that operation.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Pubkey;

/// Index of a node inside a rule set arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(pub u32);

impl RuleId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Numeric comparison applied by [`Predicate::Amount`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum CompareOp {
    Lt = 0,
    LtEq = 1,
    Eq = 2,
    GtEq = 3,
    Gt = 4,
}

impl CompareOp {
    /// `lhs <op> rhs`
    pub fn apply(&self, lhs: u64, rhs: u64) -> bool {
        match self {
            CompareOp::Lt => lhs < rhs,
            CompareOp::LtEq => lhs <= rhs,
            CompareOp::Eq => lhs == rhs,
            CompareOp::GtEq => lhs >= rhs,
            CompareOp::Gt => lhs > rhs,
        }
    }

    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(CompareOp::Lt),
            1 => Some(CompareOp::LtEq),
            2 => Some(CompareOp::Eq),
            3 => Some(CompareOp::GtEq),
            4 => Some(CompareOp::Gt),
            _ => None,
        }
    }
}

/// Primitive checks over a transfer context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Predicate {
    /// Destination owner is one of `keys`.
    PubkeyMatch { keys: Vec<Pubkey> },
    /// The program owning the destination owner's account is one of `programs`.
    ProgramOwned { programs: Vec<Pubkey> },
    /// `context.amount <operator> amount`
    Amount { amount: u64, operator: CompareOp },
    /// Always satisfied.
    Pass,
}

impl Predicate {
    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Predicate::PubkeyMatch { .. } => "PubkeyMatch",
            Predicate::ProgramOwned { .. } => "ProgramOwned",
            Predicate::Amount { .. } => "Amount",
            Predicate::Pass => "Pass",
        }
    }
}

/// A node of the rule arena.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleNode {
    All(Vec<RuleId>),
    Any(Vec<RuleId>),
    Not(RuleId),
    Predicate(Predicate),
}

impl RuleNode {
    /// Child references of a combinator; empty for predicates.
    pub fn children(&self) -> &[RuleId] {
        match self {
            RuleNode::All(children) | RuleNode::Any(children) => children,
            RuleNode::Not(child) => core::slice::from_ref(child),
            RuleNode::Predicate(_) => &[],
        }
    }
}

/// Reasons a rule set is refused at publication or decode time.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RuleSetError {
    #[error("Bad rule set magic or unsupported format version {0}")]
    UnsupportedFormat(u8),
    #[error("Rule set data ended early at offset {0}")]
    UnexpectedEof(usize),
    #[error("{0} trailing bytes after rule set")]
    TrailingBytes(usize),
    #[error("Node {node} declares {declared} payload bytes but used {used}")]
    PayloadLengthMismatch { node: RuleId, declared: u32, used: usize },
    #[error("Unknown rule kind tag {0:#04x}")]
    UnknownPredicateKind(u8),
    #[error("Unknown comparison operator {0}")]
    UnknownComparator(u8),
    #[error("Rule set name or operation is not valid UTF-8")]
    InvalidUtf8,
    #[error("Rule set name must not be empty")]
    EmptyName,
    #[error("Name of {0} bytes is empty or too long")]
    NameTooLong(usize),
    #[error("Rule {0} references an empty key set")]
    EmptyKeySet(RuleId),
    #[error("Rule {node} references missing child {child}")]
    DanglingReference { node: RuleId, child: RuleId },
    #[error("Cycle detected through rule {0}")]
    CycleDetected(RuleId),
    #[error("Rule set defines no operations")]
    NoOperations,
    #[error("Operation {0} is defined twice")]
    DuplicateOperation(String),
    #[error("Operation {operation} points at missing rule {root}")]
    MissingRoot { operation: String, root: RuleId },
    #[error("Rule set has {actual} nodes, limit is {limit}")]
    TooManyNodes { actual: usize, limit: usize },
    #[error("Rule {node} lists {actual} keys, limit is {limit}")]
    TooManyKeys { node: RuleId, actual: usize, limit: usize },
    #[error("Rule set has {actual} operations, limit is {limit}")]
    TooManyOperations { actual: usize, limit: usize },
    #[error("Operation {operation} reaches depth {depth}, limit is {limit}")]
    TooDeep { operation: String, depth: usize, limit: usize },
    #[error("Operation {operation} expands to {cost} rule visits, limit is {limit}")]
    TooCostly { operation: String, cost: usize, limit: usize },
    #[error("{len} {field} do not fit the encoding's length prefix")]
    LengthOverflow { field: &'static str, len: usize },
    #[error("Revision {offered} is not newer than published revision {current}")]
    StaleRevision { offered: u32, current: u32 },
    #[error("Rule set at {address} is owned by {expected}, not {offered}")]
    OwnerMismatch { address: Pubkey, expected: Pubkey, offered: Pubkey },
}

/// A named, versioned rule arena with per-operation roots.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleSet {
    pub name: String,
    /// Publisher allowed to replace this rule set.
    pub owner: Pubkey,
    pub revision: u32,
    pub nodes: Vec<RuleNode>,
    pub operations: BTreeMap<String, RuleId>,
}

impl RuleSet {
    pub fn node(&self, id: RuleId) -> Option<&RuleNode> {
        self.nodes.get(id.index())
    }

    /// Root rule for `scoped` (e.g. `Transfer:Holder`), falling back to the
    /// bare operation name `operation`.
    pub fn root_for(&self, scoped: &str, operation: &str) -> Option<RuleId> {
        self.operations
            .get(scoped)
            .or_else(|| self.operations.get(operation))
            .copied()
    }
}

/// Incremental constructor for rule sets.
#[derive(Debug, Default)]
pub struct RuleSetBuilder {
    name: String,
    owner: Pubkey,
    revision: u32,
    nodes: Vec<RuleNode>,
    operations: BTreeMap<String, RuleId>,
}

impl RuleSetBuilder {
    pub fn new(name: &str, owner: Pubkey) -> Self {
        Self {
            name: name.to_string(),
            owner,
            revision: 1,
            ..Default::default()
        }
    }

    pub fn revision(mut self, revision: u32) -> Self {
        self.revision = revision;
        self
    }

    /// Append a node and return its id.
    pub fn push(&mut self, node: RuleNode) -> RuleId {
        let id = RuleId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn predicate(&mut self, predicate: Predicate) -> RuleId {
        self.push(RuleNode::Predicate(predicate))
    }

    pub fn all(&mut self, children: Vec<RuleId>) -> RuleId {
        self.push(RuleNode::All(children))
    }

    pub fn any(&mut self, children: Vec<RuleId>) -> RuleId {
        self.push(RuleNode::Any(children))
    }

    pub fn not(&mut self, child: RuleId) -> RuleId {
        self.push(RuleNode::Not(child))
    }

    /// Bind an operation name to a root node.
    pub fn operation(&mut self, name: &str, root: RuleId) -> &mut Self {
        self.operations.insert(name.to_string(), root);
        self
    }

    pub fn build(self) -> RuleSet {
        RuleSet {
            name: self.name,
            owner: self.owner,
            revision: self.revision,
            nodes: self.nodes,
            operations: self.operations,
        }
    }
}
