use std::sync::{Arc, RwLock};
use std::thread;

use token_transfer_auth::rules::codec::{FORMAT_VERSION, MAGIC};
use token_transfer_auth::utils::rule_set_digest;
use token_transfer_auth::{
    decode_rule_set, encode_rule_set, CompareOp, EngineConfig, Metadata, PolicyError, Predicate,
    Pubkey, RuleId, RuleSet, RuleSetBuilder, RuleSetError, RuleSetRegistry, TokenAccount,
    TransferAuthorizationEngine, TransferRequest,
};

fn allow_list(owner: Pubkey, revision: u32, allowed: Pubkey) -> RuleSet {
    let mut b = RuleSetBuilder::new("allow-list", owner).revision(revision);
    let root = b.predicate(Predicate::PubkeyMatch { keys: vec![allowed] });
    b.operation("Transfer", root);
    b.build()
}

#[test]
fn test_encoded_publication_round_trip() {
    let mut registry = RuleSetRegistry::default();
    let address = Pubkey::new_unique();

    let mut b = RuleSetBuilder::new("mixed", Pubkey::new_unique()).revision(3);
    let key = b.predicate(Predicate::PubkeyMatch { keys: vec![Pubkey::new_unique()] });
    let program = b.predicate(Predicate::ProgramOwned { programs: vec![Pubkey::new_unique()] });
    let small = b.predicate(Predicate::Amount { amount: 10, operator: CompareOp::LtEq });
    let either = b.any(vec![key, program]);
    let not_small = b.not(small);
    let root = b.all(vec![either, not_small]);
    b.operation("Transfer", root);
    b.operation("Transfer:SaleDelegate", key);
    let rule_set = b.build();

    let bytes = encode_rule_set(&rule_set).unwrap();
    assert_eq!(&bytes[..4], MAGIC);
    assert_eq!(bytes[4], FORMAT_VERSION);

    let published = registry.publish_encoded(address, &bytes).unwrap();
    assert_eq!(published.rule_set, rule_set);
    assert_eq!(published.revision(), 3);
    assert_eq!(published.digest, rule_set_digest(&bytes));
    assert_eq!(decode_rule_set(&bytes).unwrap(), rule_set);
}

#[test]
fn test_malformed_trees_rejected_at_publication() {
    let mut registry = RuleSetRegistry::default();
    let address = Pubkey::new_unique();

    // cyclic reference
    let mut b = RuleSetBuilder::new("cycle", Pubkey::new_unique());
    let first = b.all(vec![RuleId(1)]);
    b.any(vec![first]);
    b.operation("Transfer", first);
    assert!(matches!(
        registry.publish_encoded(address, &encode_rule_set(&b.build()).unwrap()),
        Err(RuleSetError::CycleDetected(_))
    ));

    // empty key set
    let mut b = RuleSetBuilder::new("empty", Pubkey::new_unique());
    let empty = b.predicate(Predicate::PubkeyMatch { keys: vec![] });
    b.operation("Transfer", empty);
    assert_eq!(
        registry.publish_encoded(address, &encode_rule_set(&b.build()).unwrap()).err(),
        Some(RuleSetError::EmptyKeySet(empty))
    );

    // unknown node tag: patch the single node's tag byte
    let mut b = RuleSetBuilder::new("t", Pubkey::new_unique());
    let pass = b.predicate(Predicate::Pass);
    b.operation("Transfer", pass);
    let mut bytes = encode_rule_set(&b.build()).unwrap();
    // magic(4) + format(1) + name len(2) + "t"(1) + owner(32) + revision(4) + count(4)
    let tag_offset = 4 + 1 + 2 + 1 + 32 + 4 + 4;
    bytes[tag_offset] = 0x7f;
    assert_eq!(
        registry.publish_encoded(address, &bytes).err(),
        Some(RuleSetError::UnknownPredicateKind(0x7f))
    );

    assert!(registry.latest(&address).is_none());
}

#[test]
fn test_publication_limits_follow_config() {
    let config = EngineConfig {
        max_operations: 1,
        ..EngineConfig::default()
    };
    let mut registry = RuleSetRegistry::new(config);

    let mut b = RuleSetBuilder::new("ops", Pubkey::new_unique());
    let pass = b.predicate(Predicate::Pass);
    b.operation("Transfer", pass);
    b.operation("Transfer:Holder", pass);

    assert_eq!(
        registry.publish(Pubkey::new_unique(), b.build()).err(),
        Some(RuleSetError::TooManyOperations { actual: 2, limit: 1 })
    );
}

#[test]
fn test_new_revision_governs_later_transfers() {
    let mut engine = TransferAuthorizationEngine::default();
    let address = Pubkey::new_unique();
    let publisher = Pubkey::new_unique();
    let first_allowed = Pubkey::new_unique();
    let second_allowed = Pubkey::new_unique();
    engine.publish_rule_set(address, allow_list(publisher, 1, first_allowed)).unwrap();

    let snapshot = engine.registry().latest(&address).unwrap();
    engine.publish_rule_set(address, allow_list(publisher, 2, second_allowed)).unwrap();

    // a held snapshot keeps the revision it was taken at
    assert_eq!(snapshot.revision(), 1);
    assert_eq!(engine.registry().history(&address).len(), 2);

    let mint = Pubkey::new_unique();
    let owner = Pubkey::new_unique();
    let asset = Metadata::programmable(mint, Some(address));

    let mut source = TokenAccount::with_amount(mint, owner, 1);
    let mut old_destination = TokenAccount::new(mint, first_allowed);
    let verdict = engine.authorize(TransferRequest::new(owner, &mut source, &mut old_destination, &asset, 1));
    assert!(matches!(verdict.policy_error(), Some(PolicyError::PredicateFailed(_))));

    let mut new_destination = TokenAccount::new(mint, second_allowed);
    let verdict = engine.authorize(TransferRequest::new(owner, &mut source, &mut new_destination, &asset, 1));
    assert!(verdict.is_authorized());
}

#[test]
fn test_replacement_rules() {
    let mut engine = TransferAuthorizationEngine::default();
    let address = Pubkey::new_unique();
    let publisher = Pubkey::new_unique();
    let allowed = Pubkey::new_unique();
    engine.publish_rule_set(address, allow_list(publisher, 2, allowed)).unwrap();

    assert_eq!(
        engine.publish_rule_set(address, allow_list(publisher, 1, allowed)).err(),
        Some(RuleSetError::StaleRevision { offered: 1, current: 2 })
    );

    let intruder = Pubkey::new_unique();
    assert_eq!(
        engine.publish_rule_set(address, allow_list(intruder, 3, allowed)).err(),
        Some(RuleSetError::OwnerMismatch { address, expected: publisher, offered: intruder })
    );
}

#[test]
fn test_concurrent_transfers_on_disjoint_accounts() {
    let mut engine = TransferAuthorizationEngine::default();
    let address = Pubkey::new_unique();
    let publisher = Pubkey::new_unique();
    let allowed = Pubkey::new_unique();
    engine.publish_rule_set(address, allow_list(publisher, 1, allowed)).unwrap();
    let engine = Arc::new(RwLock::new(engine));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mint = Pubkey::new_unique();
                let owner = Pubkey::new_unique();
                let asset = Metadata::programmable(mint, Some(address));
                let mut source = TokenAccount::with_amount(mint, owner, 1);
                let mut destination = TokenAccount::new(mint, allowed);
                let verdict = engine.read().unwrap().authorize(TransferRequest::new(
                    owner,
                    &mut source,
                    &mut destination,
                    &asset,
                    1,
                ));
                (verdict.is_authorized(), source.amount, destination.amount)
            })
        })
        .collect();

    // a publisher waits for in-flight decisions and then replaces the set
    engine
        .write()
        .unwrap()
        .publish_rule_set(address, allow_list(publisher, 2, allowed))
        .unwrap();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), (true, 0, 1));
    }
    assert_eq!(engine.read().unwrap().registry().history(&address).len(), 2);
}

#[test]
fn test_demo_rule_set_compiles() {
    let source = include_str!("../demos/marketplace-royalty.json");
    let rule_set: RuleSet = serde_json::from_str(source).unwrap();
    assert_eq!(rule_set.operations.len(), 2);
    assert_eq!(rule_set.root_for("Transfer:Holder", "Transfer"), Some(RuleId(4)));

    let mut registry = RuleSetRegistry::default();
    let bytes = encode_rule_set(&rule_set).unwrap();
    let published = registry.publish_encoded(Pubkey::new_unique(), &bytes).unwrap();
    assert_eq!(published.rule_set, rule_set);
}

fn chain(length: usize) -> RuleSet {
    let mut b = RuleSetBuilder::new("chain", Pubkey::new_unique());
    let mut id = b.predicate(Predicate::Pass);
    for _ in 1..length {
        id = b.all(vec![id]);
    }
    b.operation("Transfer", id);
    b.build()
}

fn ladder(owner: Pubkey, rungs: usize, allowed: Pubkey) -> RuleSet {
    let mut b = RuleSetBuilder::new("ladder", owner);
    let mut id = b.predicate(Predicate::PubkeyMatch { keys: vec![allowed] });
    for _ in 0..rungs {
        id = b.any(vec![id, id]);
    }
    b.operation("Transfer", id);
    b.build()
}

#[test]
fn test_publication_rejects_trees_deeper_than_limit() {
    let config = EngineConfig::default();
    let limit = config.max_rule_depth;
    let mut registry = RuleSetRegistry::new(config);
    let address = Pubkey::new_unique();

    assert_eq!(
        registry
            .publish_encoded(address, &encode_rule_set(&chain(limit + 1)).unwrap())
            .err(),
        Some(RuleSetError::TooDeep {
            operation: "Transfer".to_string(),
            depth: limit + 1,
            limit,
        })
    );
    assert!(registry.latest(&address).is_none());

    assert!(registry.publish(address, chain(limit)).is_ok());
}

#[test]
fn test_publication_rejects_exponential_shared_children() {
    let mut registry = RuleSetRegistry::default();
    let address = Pubkey::new_unique();

    // 31 rungs: 32 nodes and a depth of 32, but 2^32 - 1 visits when expanded
    let rule_set = ladder(Pubkey::new_unique(), 31, Pubkey::new_unique());
    assert_eq!(rule_set.nodes.len(), 32);
    assert!(matches!(
        registry.publish(address, rule_set),
        Err(RuleSetError::TooCostly { .. })
    ));
    assert!(registry.latest(&address).is_none());
}

#[test]
fn test_shared_children_within_cost_limit_authorize() {
    let mut engine = TransferAuthorizationEngine::default();
    let address = Pubkey::new_unique();
    let allowed = Pubkey::new_unique();
    // 2^12 - 1 = 4095 visits, just inside the default cost limit
    engine
        .publish_rule_set(address, ladder(Pubkey::new_unique(), 11, allowed))
        .unwrap();

    let mint = Pubkey::new_unique();
    let owner = Pubkey::new_unique();
    let asset = Metadata::programmable(mint, Some(address));

    let mut source = TokenAccount::with_amount(mint, owner, 1);
    let mut refused = TokenAccount::new(mint, Pubkey::new_unique());
    let verdict = engine.authorize(TransferRequest::new(owner, &mut source, &mut refused, &asset, 1));
    assert!(matches!(verdict.policy_error(), Some(PolicyError::NoneSatisfied(_))));
    assert_eq!(source.amount, 1);

    let mut destination = TokenAccount::new(mint, allowed);
    let verdict = engine.authorize(TransferRequest::new(owner, &mut source, &mut destination, &asset, 1));
    assert!(verdict.is_authorized());
    assert_eq!(destination.amount, 1);
}
