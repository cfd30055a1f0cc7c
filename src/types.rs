//! Core data model for transfer authorization.
//!
//! Provides the public key type, token standards, asset metadata and the
//! token account representation the engine reads and mutates.

use alloc::string::String;
use core::fmt;
use core::str::FromStr;
use core::sync::atomic::{AtomicU64, Ordering};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Length of a public key in bytes.
pub const PUBKEY_BYTES: usize = 32;

/// Address of the system program, which owns every plain wallet.
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey([0u8; PUBKEY_BYTES]);

/// Errors raised while decoding keys or account data.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid base58 pubkey: {0}")]
    InvalidBase58(String),
    #[error("Pubkey must be 32 bytes, got {0}")]
    InvalidPubkeyLength(usize),
    #[error("Token account data must be {expected} bytes, got {actual}")]
    InvalidAccountLength { expected: usize, actual: usize },
    #[error("Unknown token state tag {0}")]
    InvalidTokenState(u8),
    #[error("Invalid option tag {0}")]
    InvalidOptionTag(u8),
}

/// A 32-byte account address.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pubkey(pub [u8; PUBKEY_BYTES]);

static UNIQUE_COUNTER: AtomicU64 = AtomicU64::new(1);

impl Pubkey {
    pub const fn new(bytes: [u8; PUBKEY_BYTES]) -> Self {
        Self(bytes)
    }

    /// Produce a key distinct from every other key produced by this call
    /// in the same process. Intended for tests and fixtures.
    pub fn new_unique() -> Self {
        let n = UNIQUE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut bytes = [0u8; PUBKEY_BYTES];
        bytes[..8].copy_from_slice(&n.to_be_bytes());
        // keep clear of the all-zero system program id
        bytes[PUBKEY_BYTES - 1] = 0x01;
        Self(bytes)
    }

    pub fn to_bytes(&self) -> [u8; PUBKEY_BYTES] {
        self.0
    }

    pub fn as_bytes(&self) -> &[u8; PUBKEY_BYTES] {
        &self.0
    }

    /// Build a key from a byte slice, which must be exactly 32 bytes.
    pub fn try_from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
        let arr: [u8; PUBKEY_BYTES] = bytes
            .try_into()
            .map_err(|_| ParseError::InvalidPubkeyLength(bytes.len()))?;
        Ok(Self(arr))
    }
}

impl FromStr for Pubkey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| ParseError::InvalidBase58(alloc::format!("{}", e)))?;
        Self::try_from_slice(&bytes)
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(&self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({})", self)
    }
}

// base58 for human-readable formats, raw bytes otherwise
impl Serialize for Pubkey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let encoded = String::deserialize(deserializer)?;
            encoded.parse().map_err(serde::de::Error::custom)
        } else {
            <[u8; PUBKEY_BYTES]>::deserialize(deserializer).map(Pubkey)
        }
    }
}

impl From<[u8; PUBKEY_BYTES]> for Pubkey {
    fn from(bytes: [u8; PUBKEY_BYTES]) -> Self {
        Self(bytes)
    }
}

/// Asset classification governing divisibility and policy gating.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenStandard {
    /// Non-fungible asset with a master edition.
    NonFungible,
    /// Fungible asset carrying rich metadata (semi-fungible).
    FungibleAsset,
    /// Plain fungible token.
    Fungible,
    /// Print of a master edition.
    NonFungibleEdition,
    /// Non-fungible asset whose transfers are governed by a rule set.
    ProgrammableNonFungible,
}

impl TokenStandard {
    /// Whether exactly one unit exists per mint.
    pub fn is_non_divisible(&self) -> bool {
        matches!(
            self,
            TokenStandard::NonFungible
                | TokenStandard::NonFungibleEdition
                | TokenStandard::ProgrammableNonFungible
        )
    }
}

/// Programmable configuration attached to a programmable asset.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgrammableConfig {
    /// Address of the rule set governing transfers, if one was configured.
    pub rule_set: Option<Pubkey>,
}

/// Errors raised when metadata violates its classification invariant.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Programmable config is required for ProgrammableNonFungible assets")]
    MissingProgrammableConfig,
    #[error("Programmable config is only allowed on ProgrammableNonFungible assets, found {0:?}")]
    UnexpectedProgrammableConfig(TokenStandard),
}

/// Asset metadata, one per mint.
///
/// The programmable config is present if and only if the standard is
/// `ProgrammableNonFungible`; [`Metadata::new`] refuses anything else.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Metadata {
    mint: Pubkey,
    token_standard: TokenStandard,
    programmable_config: Option<ProgrammableConfig>,
}

impl Metadata {
    pub fn new(
        mint: Pubkey,
        token_standard: TokenStandard,
        programmable_config: Option<ProgrammableConfig>,
    ) -> Result<Self, MetadataError> {
        let is_programmable = token_standard == TokenStandard::ProgrammableNonFungible;
        match (is_programmable, programmable_config.is_some()) {
            (true, false) => Err(MetadataError::MissingProgrammableConfig),
            (false, true) => Err(MetadataError::UnexpectedProgrammableConfig(token_standard)),
            _ => Ok(Self {
                mint,
                token_standard,
                programmable_config,
            }),
        }
    }

    /// Metadata for an asset without programmable config.
    pub fn unrestricted(mint: Pubkey, token_standard: TokenStandard) -> Result<Self, MetadataError> {
        Self::new(mint, token_standard, None)
    }

    /// Metadata for a programmable asset governed by `rule_set`.
    pub fn programmable(mint: Pubkey, rule_set: Option<Pubkey>) -> Self {
        Self {
            mint,
            token_standard: TokenStandard::ProgrammableNonFungible,
            programmable_config: Some(ProgrammableConfig { rule_set }),
        }
    }

    pub fn mint(&self) -> &Pubkey {
        &self.mint
    }

    pub fn token_standard(&self) -> TokenStandard {
        self.token_standard
    }

    pub fn programmable_config(&self) -> Option<&ProgrammableConfig> {
        self.programmable_config.as_ref()
    }

    /// The configured rule set address, if any.
    pub fn rule_set(&self) -> Option<Pubkey> {
        self.programmable_config.as_ref().and_then(|c| c.rule_set)
    }
}

/// Lock state of a token account.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TokenState {
    #[default]
    Unlocked = 0,
    /// Frozen by a utility delegate; no transfers.
    Locked = 1,
    /// Listed for sale; only the sale delegate may move it.
    Listed = 2,
}

impl TryFrom<u8> for TokenState {
    type Error = ParseError;

    fn try_from(val: u8) -> Result<Self, Self::Error> {
        match val {
            0 => Ok(TokenState::Unlocked),
            1 => Ok(TokenState::Locked),
            2 => Ok(TokenState::Listed),
            other => Err(ParseError::InvalidTokenState(other)),
        }
    }
}

/// Serialized size of a [`TokenAccount`].
///
/// mint(32) | owner(32) | amount(8) | delegate tag(1) + key(32) |
/// delegated_amount(8) | state(1)
pub const TOKEN_ACCOUNT_LEN: usize = 32 + 32 + 8 + 1 + 32 + 8 + 1;

/// Balance of one asset held by one owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAccount {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub delegate: Option<Pubkey>,
    pub delegated_amount: u64,
    pub state: TokenState,
}

impl TokenAccount {
    /// An empty, unlocked account.
    pub fn new(mint: Pubkey, owner: Pubkey) -> Self {
        Self::with_amount(mint, owner, 0)
    }

    pub fn with_amount(mint: Pubkey, owner: Pubkey, amount: u64) -> Self {
        Self {
            mint,
            owner,
            amount,
            delegate: None,
            delegated_amount: 0,
            state: TokenState::Unlocked,
        }
    }

    /// Approve `delegate` to move up to `amount` tokens.
    pub fn approve(&mut self, delegate: Pubkey, amount: u64) {
        self.delegate = Some(delegate);
        self.delegated_amount = amount;
    }

    /// Serialize to the fixed little-endian account layout.
    pub fn to_bytes(&self) -> [u8; TOKEN_ACCOUNT_LEN] {
        let mut out = [0u8; TOKEN_ACCOUNT_LEN];
        out[0..32].copy_from_slice(&self.mint.0);
        out[32..64].copy_from_slice(&self.owner.0);
        out[64..72].copy_from_slice(&self.amount.to_le_bytes());
        if let Some(delegate) = &self.delegate {
            out[72] = 1;
            out[73..105].copy_from_slice(&delegate.0);
        }
        out[105..113].copy_from_slice(&self.delegated_amount.to_le_bytes());
        out[113] = self.state as u8;
        out
    }

    /// Deserialize from the fixed account layout.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ParseError> {
        if data.len() != TOKEN_ACCOUNT_LEN {
            return Err(ParseError::InvalidAccountLength {
                expected: TOKEN_ACCOUNT_LEN,
                actual: data.len(),
            });
        }

        let mint = Pubkey::try_from_slice(&data[0..32])?;
        let owner = Pubkey::try_from_slice(&data[32..64])?;
        let amount = u64::from_le_bytes(read_array(&data[64..72]));
        let delegate = match data[72] {
            0 => None,
            1 => Some(Pubkey::try_from_slice(&data[73..105])?),
            other => return Err(ParseError::InvalidOptionTag(other)),
        };
        let delegated_amount = u64::from_le_bytes(read_array(&data[105..113]));
        let state = TokenState::try_from(data[113])?;

        Ok(Self {
            mint,
            owner,
            amount,
            delegate,
            delegated_amount,
            state,
        })
    }
}

fn read_array(bytes: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(bytes);
    out
}
