//! Transfer authorization engine.
//!
//! Orchestrates one transfer decision:
//!
//! 1. structural validation,
//! 2. standard classification,
//! 3. rule set resolution and evaluation for programmable assets,
//! 4. the balance commit, only when every stage authorized.
//!
//! A denial at any stage returns before the commit, so account state is
//! never partially updated.

use alloc::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{ConfigError, EngineConfig};
use crate::engine::context::{Operation, TransferContext, TransferScenario};
use crate::engine::verdict::{DenialReason, PolicyError, Verdict};
use crate::rules::evaluator::RuleEvaluator;
use crate::rules::registry::{PublishedRuleSet, RuleSetRegistry};
use crate::rules::types::{RuleSet, RuleSetError};
use crate::standard::{classify, ValidationPath};
use crate::types::{Metadata, Pubkey, TokenAccount, TokenState, SYSTEM_PROGRAM_ID};
use crate::validator::{validate, StructuralError};

/// Inputs of a single transfer.
///
/// Both accounts are borrowed mutably so an authorized transfer can be
/// committed in place.
#[derive(Debug)]
pub struct TransferRequest<'a> {
    /// Signer of the transfer: the owner or one of its delegates.
    pub authority: Pubkey,
    /// Claimed owner of the source account.
    pub owner: Pubkey,
    pub source: &'a mut TokenAccount,
    /// Destination account; may be freshly created with a zero balance.
    pub destination: &'a mut TokenAccount,
    pub asset: &'a Metadata,
    pub amount: u64,
    /// Program owning the destination owner's account.
    pub destination_owner_program: Pubkey,
    /// Rule set the caller expects to be enforced.
    pub rule_set_override: Option<Pubkey>,
}

impl<'a> TransferRequest<'a> {
    /// Request signed by `authority` on behalf of the source account's owner.
    pub fn new(
        authority: Pubkey,
        source: &'a mut TokenAccount,
        destination: &'a mut TokenAccount,
        asset: &'a Metadata,
        amount: u64,
    ) -> Self {
        Self {
            authority,
            owner: source.owner,
            source,
            destination,
            asset,
            amount,
            destination_owner_program: SYSTEM_PROGRAM_ID,
            rule_set_override: None,
        }
    }

    pub fn with_owner(mut self, owner: Pubkey) -> Self {
        self.owner = owner;
        self
    }

    pub fn with_destination_owner_program(mut self, program: Pubkey) -> Self {
        self.destination_owner_program = program;
        self
    }

    pub fn with_rule_set_override(mut self, rule_set: Pubkey) -> Self {
        self.rule_set_override = Some(rule_set);
        self
    }

    fn context(&self) -> TransferContext {
        TransferContext {
            authority: self.authority,
            owner: self.owner,
            destination_owner: self.destination.owner,
            destination_owner_program: self.destination_owner_program,
            mint: *self.asset.mint(),
            amount: self.amount,
            operation: Operation::Transfer,
            scenario: TransferScenario::Holder,
        }
    }
}

/// Decides transfers against published rule sets.
///
/// Authorization only needs `&self`; publishing needs `&mut self`. Callers
/// sharing an engine across threads wrap it in a lock, and every decision
/// evaluates the rule set snapshot it resolved at the start.
#[derive(Debug, Default)]
pub struct TransferAuthorizationEngine {
    config: EngineConfig,
    registry: RuleSetRegistry,
}

impl TransferAuthorizationEngine {
    /// Create an engine with an empty registry.
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            registry: RuleSetRegistry::new(config.clone()),
            config,
        })
    }

    /// Engine configured from `TRANSFER_AUTH_*` environment variables.
    #[cfg(feature = "std")]
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(EngineConfig::from_env()?)
    }

    /// Create an engine over an existing registry.
    pub fn with_registry(registry: RuleSetRegistry) -> Result<Self, ConfigError> {
        let config = registry.config().clone();
        config.validate()?;
        Ok(Self { config, registry })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &RuleSetRegistry {
        &self.registry
    }

    /// Publish a rule set at `address`.
    pub fn publish_rule_set(
        &mut self,
        address: Pubkey,
        rule_set: RuleSet,
    ) -> Result<Arc<PublishedRuleSet>, RuleSetError> {
        self.registry.publish(address, rule_set)
    }

    /// Publish an encoded rule set at `address`.
    pub fn publish_encoded_rule_set(
        &mut self,
        address: Pubkey,
        bytes: &[u8],
    ) -> Result<Arc<PublishedRuleSet>, RuleSetError> {
        self.registry.publish_encoded(address, bytes)
    }

    /// Decide a transfer and, if authorized, apply it to both accounts.
    pub fn authorize(&self, request: TransferRequest<'_>) -> Verdict {
        let mut context = request.context();
        let asset = request.asset;
        debug!(
            mint = %context.mint,
            authority = %context.authority,
            amount = context.amount,
            standard = ?asset.token_standard(),
            "authorizing transfer"
        );

        context.scenario = match validate(&context, asset, request.source, request.destination) {
            Ok(scenario) => scenario,
            Err(e) => return deny(&context, e.into()),
        };

        if classify(asset.token_standard()) == ValidationPath::PolicyGated {
            if let Err(e) = self.enforce_policy(&context, asset, request.rule_set_override) {
                return deny(&context, e.into());
            }
        }

        let non_divisible = asset.token_standard().is_non_divisible();
        if let Err(e) = commit(request.source, request.destination, &context, non_divisible) {
            return deny(&context, e.into());
        }

        info!(
            mint = %context.mint,
            scenario = %context.scenario,
            amount = context.amount,
            destination = %context.destination_owner,
            "transfer authorized"
        );
        Verdict::Authorized
    }

    fn enforce_policy(
        &self,
        context: &TransferContext,
        asset: &Metadata,
        rule_set_override: Option<Pubkey>,
    ) -> Result<(), PolicyError> {
        let configured = asset.rule_set().ok_or(PolicyError::MissingRuleSet)?;
        if let Some(provided) = rule_set_override {
            if provided != configured {
                return Err(PolicyError::RuleSetMismatch {
                    expected: configured,
                    provided,
                });
            }
        }

        let published = self
            .registry
            .latest(&configured)
            .ok_or(PolicyError::RuleSetNotFound(configured))?;

        let scoped = context.scoped_operation();
        let root = published
            .rule_set
            .root_for(&scoped, context.operation.as_str())
            .ok_or(PolicyError::OperationNotFound(scoped))?;

        debug!(
            rule_set = %configured,
            revision = published.revision(),
            root = %root,
            "evaluating rule set"
        );
        RuleEvaluator::new(&published.rule_set, context, self.config.max_rule_depth).check(root)
    }
}

fn deny(context: &TransferContext, reason: DenialReason) -> Verdict {
    warn!(
        mint = %context.mint,
        authority = %context.authority,
        amount = context.amount,
        %reason,
        "transfer denied"
    );
    Verdict::Denied(reason)
}

/// Move `context.amount` from `source` to `destination`.
///
/// Every new value is computed before either account is touched, so a
/// failure here leaves both accounts unchanged.
fn commit(
    source: &mut TokenAccount,
    destination: &mut TokenAccount,
    context: &TransferContext,
    non_divisible: bool,
) -> Result<(), StructuralError> {
    let amount = context.amount;
    let source_amount = source
        .amount
        .checked_sub(amount)
        .ok_or(StructuralError::InsufficientBalance)?;
    let destination_amount = destination
        .amount
        .checked_add(amount)
        .ok_or(StructuralError::BalanceOverflow)?;
    let delegated_amount = if context.scenario.is_delegate() {
        source
            .delegated_amount
            .checked_sub(amount)
            .ok_or(StructuralError::UnauthorizedOwner)?
    } else {
        source.delegated_amount
    };

    source.amount = source_amount;
    destination.amount = destination_amount;
    source.delegated_amount = delegated_amount;
    if source.delegated_amount == 0 {
        source.delegate = None;
    }

    // the token changed hands, so approvals and listings on it lapse
    if non_divisible {
        source.delegate = None;
        source.delegated_amount = 0;
        source.state = TokenState::Unlocked;
    }
    Ok(())
}
