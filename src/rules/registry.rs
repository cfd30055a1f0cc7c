//! Published rule set storage.
//!
//! Rule sets are immutable once published. Replacing one means publishing
//! a newer revision at the same address; earlier revisions stay readable.
//! Readers receive an `Arc` snapshot, so an evaluation in progress keeps
//! the revision it started with even if a newer one is published.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use tracing::info;

use crate::config::EngineConfig;
use crate::rules::codec::{decode_rule_set, encode_rule_set};
use crate::rules::integrity::check_rule_set;
use crate::rules::types::{RuleSet, RuleSetError};
use crate::types::Pubkey;
use crate::utils::{digest_hex, rule_set_digest};

/// One published revision of a rule set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublishedRuleSet {
    pub address: Pubkey,
    /// Digest of the canonical encoding.
    pub digest: [u8; 32],
    pub rule_set: RuleSet,
}

impl PublishedRuleSet {
    pub fn revision(&self) -> u32 {
        self.rule_set.revision
    }
}

/// Append-only store of rule set revisions keyed by address.
#[derive(Debug, Default)]
pub struct RuleSetRegistry {
    config: EngineConfig,
    entries: BTreeMap<Pubkey, Vec<Arc<PublishedRuleSet>>>,
}

impl RuleSetRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            entries: BTreeMap::new(),
        }
    }

    /// Decode, check and publish an encoded rule set at `address`.
    pub fn publish_encoded(
        &mut self,
        address: Pubkey,
        bytes: &[u8],
    ) -> Result<Arc<PublishedRuleSet>, RuleSetError> {
        let rule_set = decode_rule_set(bytes)?;
        self.publish(address, rule_set)
    }

    /// Check and publish a rule set at `address`.
    ///
    /// The first publication fixes the owner. Later publications must come
    /// from that owner and carry a strictly greater revision.
    pub fn publish(
        &mut self,
        address: Pubkey,
        rule_set: RuleSet,
    ) -> Result<Arc<PublishedRuleSet>, RuleSetError> {
        check_rule_set(&rule_set, &self.config)?;

        if let Some(current) = self.latest(&address) {
            if current.rule_set.owner != rule_set.owner {
                return Err(RuleSetError::OwnerMismatch {
                    address,
                    expected: current.rule_set.owner,
                    offered: rule_set.owner,
                });
            }
            if rule_set.revision <= current.revision() {
                return Err(RuleSetError::StaleRevision {
                    offered: rule_set.revision,
                    current: current.revision(),
                });
            }
        }

        let digest = rule_set_digest(&encode_rule_set(&rule_set)?);
        let published = Arc::new(PublishedRuleSet {
            address,
            digest,
            rule_set,
        });

        info!(
            address = %address,
            name = %published.rule_set.name,
            revision = published.revision(),
            digest = %digest_hex(&digest),
            "published rule set"
        );

        self.entries
            .entry(address)
            .or_default()
            .push(Arc::clone(&published));
        Ok(published)
    }

    /// Latest revision published at `address`.
    pub fn latest(&self, address: &Pubkey) -> Option<Arc<PublishedRuleSet>> {
        self.entries
            .get(address)
            .and_then(|revisions| revisions.last())
            .cloned()
    }

    /// A specific revision published at `address`.
    pub fn revision(&self, address: &Pubkey, revision: u32) -> Option<Arc<PublishedRuleSet>> {
        self.entries
            .get(address)?
            .iter()
            .find(|published| published.revision() == revision)
            .cloned()
    }

    /// Every revision at `address`, oldest first.
    pub fn history(&self, address: &Pubkey) -> &[Arc<PublishedRuleSet>] {
        self.entries
            .get(address)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of addresses with at least one published revision.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}
