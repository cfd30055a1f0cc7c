//! Binary rule set encoding.
//!
//! Layout (little-endian):
//!
//! ```text
//! "RSET" | format u8
//! name: u16 len + utf8 | owner [32] | revision u32
//! nodes: u32 count, each: tag u8 | payload_len u32 | payload
//! operations: u32 count, each: u16 len + utf8 | root u32
//! ```
//!
//! Every node carries its payload length so a reader can frame it without
//! a schema; the decoder still rejects any tag it does not know.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use crate::rules::types::{CompareOp, Predicate, RuleId, RuleNode, RuleSet, RuleSetError};
use crate::types::{Pubkey, PUBKEY_BYTES};

/// Magic prefix of an encoded rule set.
pub const MAGIC: &[u8; 4] = b"RSET";
/// Current encoding format version.
pub const FORMAT_VERSION: u8 = 1;

/// Node tags.
pub mod tags {
    pub const ALL: u8 = 0x01;
    pub const ANY: u8 = 0x02;
    pub const NOT: u8 = 0x03;
    pub const PUBKEY_MATCH: u8 = 0x10;
    pub const PROGRAM_OWNED: u8 = 0x11;
    pub const AMOUNT: u8 = 0x12;
    pub const PASS: u8 = 0x13;
}

/// Encode a rule set to its canonical binary form.
///
/// Fails when a name or a count does not fit its length prefix.
pub fn encode_rule_set(rule_set: &RuleSet) -> Result<Vec<u8>, RuleSetError> {
    let mut out = Vec::with_capacity(64 + rule_set.nodes.len() * 16);
    out.extend_from_slice(MAGIC);
    out.push(FORMAT_VERSION);
    write_str(&mut out, &rule_set.name)?;
    out.extend_from_slice(rule_set.owner.as_bytes());
    out.extend_from_slice(&rule_set.revision.to_le_bytes());

    write_len(&mut out, "nodes", rule_set.nodes.len())?;
    for node in &rule_set.nodes {
        let (tag, payload) = encode_node(node)?;
        out.push(tag);
        write_len(&mut out, "payload", payload.len())?;
        out.extend_from_slice(&payload);
    }

    // BTreeMap iteration keeps the encoding canonical
    write_len(&mut out, "operations", rule_set.operations.len())?;
    for (name, root) in &rule_set.operations {
        write_str(&mut out, name)?;
        out.extend_from_slice(&root.0.to_le_bytes());
    }
    Ok(out)
}

fn encode_node(node: &RuleNode) -> Result<(u8, Vec<u8>), RuleSetError> {
    let mut payload = Vec::new();
    let tag = match node {
        RuleNode::All(children) => {
            write_ids(&mut payload, children)?;
            tags::ALL
        }
        RuleNode::Any(children) => {
            write_ids(&mut payload, children)?;
            tags::ANY
        }
        RuleNode::Not(child) => {
            payload.extend_from_slice(&child.0.to_le_bytes());
            tags::NOT
        }
        RuleNode::Predicate(Predicate::PubkeyMatch { keys }) => {
            write_keys(&mut payload, keys)?;
            tags::PUBKEY_MATCH
        }
        RuleNode::Predicate(Predicate::ProgramOwned { programs }) => {
            write_keys(&mut payload, programs)?;
            tags::PROGRAM_OWNED
        }
        RuleNode::Predicate(Predicate::Amount { amount, operator }) => {
            payload.push(*operator as u8);
            payload.extend_from_slice(&amount.to_le_bytes());
            tags::AMOUNT
        }
        RuleNode::Predicate(Predicate::Pass) => tags::PASS,
    };
    Ok((tag, payload))
}

fn write_str(out: &mut Vec<u8>, s: &str) -> Result<(), RuleSetError> {
    let len = u16::try_from(s.len()).map_err(|_| RuleSetError::NameTooLong(s.len()))?;
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(s.as_bytes());
    Ok(())
}

fn write_len(out: &mut Vec<u8>, field: &'static str, len: usize) -> Result<(), RuleSetError> {
    let len = u32::try_from(len).map_err(|_| RuleSetError::LengthOverflow { field, len })?;
    out.extend_from_slice(&len.to_le_bytes());
    Ok(())
}

fn write_ids(out: &mut Vec<u8>, ids: &[RuleId]) -> Result<(), RuleSetError> {
    write_len(out, "children", ids.len())?;
    for id in ids {
        out.extend_from_slice(&id.0.to_le_bytes());
    }
    Ok(())
}

fn write_keys(out: &mut Vec<u8>, keys: &[Pubkey]) -> Result<(), RuleSetError> {
    write_len(out, "keys", keys.len())?;
    for key in keys {
        out.extend_from_slice(key.as_bytes());
    }
    Ok(())
}

/// Decode a rule set. Only framing and tags are checked here; structural
/// checks (references, cycles, limits) run at publication.
pub fn decode_rule_set(bytes: &[u8]) -> Result<RuleSet, RuleSetError> {
    let mut reader = Reader::new(bytes);

    let magic = reader.take(MAGIC.len())?;
    let format = reader.u8()?;
    if magic != MAGIC || format != FORMAT_VERSION {
        return Err(RuleSetError::UnsupportedFormat(format));
    }

    let name = reader.string()?;
    let owner = reader.pubkey()?;
    let revision = reader.u32()?;

    let node_count = reader.u32()? as usize;
    // each node needs at least tag + length
    let mut nodes = Vec::with_capacity(node_count.min(reader.remaining() / 5));
    for index in 0..node_count {
        let id = RuleId(index as u32);
        let tag = reader.u8()?;
        let declared = reader.u32()?;
        let start = reader.position();
        let node = decode_node(&mut reader, tag)?;
        let used = reader.position() - start;
        if used != declared as usize {
            return Err(RuleSetError::PayloadLengthMismatch { node: id, declared, used });
        }
        nodes.push(node);
    }

    let op_count = reader.u32()? as usize;
    let mut operations = BTreeMap::new();
    for _ in 0..op_count {
        let op = reader.string()?;
        let root = RuleId(reader.u32()?);
        if operations.insert(op.clone(), root).is_some() {
            return Err(RuleSetError::DuplicateOperation(op));
        }
    }

    if reader.remaining() != 0 {
        return Err(RuleSetError::TrailingBytes(reader.remaining()));
    }

    Ok(RuleSet {
        name,
        owner,
        revision,
        nodes,
        operations,
    })
}

fn decode_node(reader: &mut Reader<'_>, tag: u8) -> Result<RuleNode, RuleSetError> {
    let node = match tag {
        tags::ALL => RuleNode::All(reader.ids()?),
        tags::ANY => RuleNode::Any(reader.ids()?),
        tags::NOT => RuleNode::Not(RuleId(reader.u32()?)),
        tags::PUBKEY_MATCH => RuleNode::Predicate(Predicate::PubkeyMatch { keys: reader.keys()? }),
        tags::PROGRAM_OWNED => {
            RuleNode::Predicate(Predicate::ProgramOwned { programs: reader.keys()? })
        }
        tags::AMOUNT => {
            let op = reader.u8()?;
            let operator = CompareOp::from_u8(op).ok_or(RuleSetError::UnknownComparator(op))?;
            let amount = reader.u64()?;
            RuleNode::Predicate(Predicate::Amount { amount, operator })
        }
        tags::PASS => RuleNode::Predicate(Predicate::Pass),
        other => return Err(RuleSetError::UnknownPredicateKind(other)),
    };
    Ok(node)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn position(&self) -> usize {
        self.pos
    }

    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], RuleSetError> {
        if self.remaining() < len {
            return Err(RuleSetError::UnexpectedEof(self.pos));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], RuleSetError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, RuleSetError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, RuleSetError> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, RuleSetError> {
        self.array().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> Result<u64, RuleSetError> {
        self.array().map(u64::from_le_bytes)
    }

    fn pubkey(&mut self) -> Result<Pubkey, RuleSetError> {
        self.array::<PUBKEY_BYTES>().map(Pubkey::new)
    }

    fn string(&mut self) -> Result<String, RuleSetError> {
        let len = self.u16()? as usize;
        let raw = self.take(len)?;
        core::str::from_utf8(raw)
            .map(String::from)
            .map_err(|_| RuleSetError::InvalidUtf8)
    }

    /// Length-prefixed sequence; the count is checked against the bytes
    /// left before allocating.
    fn counted(&mut self, item_len: usize) -> Result<usize, RuleSetError> {
        let count = self.u32()? as usize;
        match count.checked_mul(item_len) {
            Some(total) if total <= self.remaining() => Ok(count),
            _ => Err(RuleSetError::UnexpectedEof(self.pos)),
        }
    }

    fn ids(&mut self) -> Result<Vec<RuleId>, RuleSetError> {
        let count = self.counted(4)?;
        (0..count).map(|_| self.u32().map(RuleId)).collect()
    }

    fn keys(&mut self) -> Result<Vec<Pubkey>, RuleSetError> {
        let count = self.counted(PUBKEY_BYTES)?;
        (0..count).map(|_| self.pubkey()).collect()
    }
}
