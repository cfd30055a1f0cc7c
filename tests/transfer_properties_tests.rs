use proptest::prelude::*;
use token_transfer_auth::{
    evaluate_rule_tree, CompareOp, Metadata, Operation, Predicate, Pubkey, RuleId, RuleSetBuilder,
    StructuralError, TokenAccount, TokenStandard, TransferAuthorizationEngine, TransferContext,
    TransferRequest, TransferScenario, Verdict,
};

/// Engine with an always-passing and an always-denying rule set published.
struct Fixture {
    engine: TransferAuthorizationEngine,
    pass_all: Pubkey,
    deny_all: Pubkey,
}

fn fixture() -> Fixture {
    let mut engine = TransferAuthorizationEngine::default();

    let pass_all = Pubkey::new_unique();
    let mut b = RuleSetBuilder::new("pass-all", Pubkey::new_unique());
    let pass = b.predicate(Predicate::Pass);
    b.operation("Transfer", pass);
    engine.publish_rule_set(pass_all, b.build()).unwrap();

    let deny_all = Pubkey::new_unique();
    let mut b = RuleSetBuilder::new("deny-all", Pubkey::new_unique());
    let pass = b.predicate(Predicate::Pass);
    let never = b.not(pass);
    b.operation("Transfer", never);
    engine.publish_rule_set(deny_all, b.build()).unwrap();

    Fixture {
        engine,
        pass_all,
        deny_all,
    }
}

fn asset(standard: TokenStandard, mint: Pubkey, rule_set: Pubkey) -> Metadata {
    if standard == TokenStandard::ProgrammableNonFungible {
        Metadata::programmable(mint, Some(rule_set))
    } else {
        Metadata::unrestricted(mint, standard).unwrap()
    }
}

fn arb_standard() -> impl Strategy<Value = TokenStandard> {
    prop_oneof![
        Just(TokenStandard::NonFungible),
        Just(TokenStandard::FungibleAsset),
        Just(TokenStandard::Fungible),
        Just(TokenStandard::NonFungibleEdition),
        Just(TokenStandard::ProgrammableNonFungible),
    ]
}

fn arb_unrestricted_standard() -> impl Strategy<Value = TokenStandard> {
    prop_oneof![
        Just(TokenStandard::NonFungible),
        Just(TokenStandard::FungibleAsset),
        Just(TokenStandard::Fungible),
        Just(TokenStandard::NonFungibleEdition),
    ]
}

fn arb_non_divisible() -> impl Strategy<Value = TokenStandard> {
    prop_oneof![
        Just(TokenStandard::NonFungible),
        Just(TokenStandard::NonFungibleEdition),
        Just(TokenStandard::ProgrammableNonFungible),
    ]
}

/// Small rule tree over `Amount` predicates, mirrored by [`expected`].
#[derive(Clone, Debug)]
enum Tree {
    Leaf { amount: u64, operator: CompareOp },
    All(Vec<Tree>),
    Any(Vec<Tree>),
    Not(Box<Tree>),
}

fn arb_operator() -> impl Strategy<Value = CompareOp> {
    prop_oneof![
        Just(CompareOp::Lt),
        Just(CompareOp::LtEq),
        Just(CompareOp::Eq),
        Just(CompareOp::GtEq),
        Just(CompareOp::Gt),
    ]
}

fn arb_tree() -> impl Strategy<Value = Tree> {
    let leaf = (0u64..8, arb_operator()).prop_map(|(amount, operator)| Tree::Leaf { amount, operator });
    leaf.prop_recursive(4, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Tree::All),
            prop::collection::vec(inner.clone(), 0..4).prop_map(Tree::Any),
            inner.prop_map(|t| Tree::Not(Box::new(t))),
        ]
    })
}

fn build(tree: &Tree, b: &mut RuleSetBuilder) -> RuleId {
    match tree {
        Tree::Leaf { amount, operator } => b.predicate(Predicate::Amount {
            amount: *amount,
            operator: *operator,
        }),
        Tree::All(children) => {
            let ids = children.iter().map(|c| build(c, b)).collect();
            b.all(ids)
        }
        Tree::Any(children) => {
            let ids = children.iter().map(|c| build(c, b)).collect();
            b.any(ids)
        }
        Tree::Not(child) => {
            let id = build(child, b);
            b.not(id)
        }
    }
}

fn expected(tree: &Tree, amount: u64) -> bool {
    match tree {
        Tree::Leaf { amount: rhs, operator } => operator.apply(amount, *rhs),
        Tree::All(children) => children.iter().all(|c| expected(c, amount)),
        Tree::Any(children) => children.iter().any(|c| expected(c, amount)),
        Tree::Not(child) => !expected(child, amount),
    }
}

fn context(amount: u64) -> TransferContext {
    TransferContext {
        authority: Pubkey::new_unique(),
        owner: Pubkey::new_unique(),
        destination_owner: Pubkey::new_unique(),
        destination_owner_program: Pubkey::default(),
        mint: Pubkey::new_unique(),
        amount,
        operation: Operation::Transfer,
        scenario: TransferScenario::Holder,
    }
}

proptest! {
    /// Authorized transfers move exactly `amount`; denied ones move nothing.
    #[test]
    fn balance_conservation_and_denial_atomicity(
        standard in arb_standard(),
        use_deny_all in any::<bool>(),
        balance in 0u64..200,
        destination_balance in 0u64..200,
        amount in 0u64..250,
    ) {
        let f = fixture();
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let rule_set = if use_deny_all { f.deny_all } else { f.pass_all };
        let asset = asset(standard, mint, rule_set);

        let mut source = TokenAccount::with_amount(mint, owner, balance);
        let mut destination = TokenAccount::with_amount(mint, Pubkey::new_unique(), destination_balance);
        let source_before = source.to_bytes();
        let destination_before = destination.to_bytes();

        let verdict = f.engine.authorize(TransferRequest::new(owner, &mut source, &mut destination, &asset, amount));

        if verdict.is_authorized() {
            prop_assert_eq!(destination.amount - destination_balance, amount);
            prop_assert_eq!(balance - source.amount, amount);
        } else {
            prop_assert_eq!(source.to_bytes(), source_before);
            prop_assert_eq!(destination.to_bytes(), destination_before);
        }
    }

    /// Only programmable non-fungibles consult a rule set, even a deny-all one.
    #[test]
    fn standard_gating(standard in arb_unrestricted_standard(), balance in 1u64..100) {
        let f = fixture();
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let asset = asset(standard, mint, f.deny_all);
        let (balance, amount) = if standard.is_non_divisible() { (1, 1) } else { (balance, balance) };

        let mut source = TokenAccount::with_amount(mint, owner, balance);
        let mut destination = TokenAccount::new(mint, Pubkey::new_unique());
        let request = TransferRequest::new(owner, &mut source, &mut destination, &asset, amount)
            .with_rule_set_override(f.deny_all);

        prop_assert_eq!(f.engine.authorize(request), Verdict::Authorized);
        prop_assert_eq!(destination.amount, amount);
    }

    /// Non-divisible standards only ever move a single whole token.
    #[test]
    fn non_divisibility(
        standard in arb_non_divisible(),
        balance in 0u64..5,
        amount in 0u64..5,
    ) {
        prop_assume!(amount != 1 || balance != 1);
        let f = fixture();
        let mint = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let asset = asset(standard, mint, f.pass_all);

        let mut source = TokenAccount::with_amount(mint, owner, balance);
        let mut destination = TokenAccount::new(mint, Pubkey::new_unique());
        let verdict = f.engine.authorize(TransferRequest::new(owner, &mut source, &mut destination, &asset, amount));

        prop_assert_eq!(verdict.structural_error(), Some(StructuralError::InvalidAmountForStandard));
    }

    /// Trees evaluate like their boolean reading, and double negation is neutral.
    #[test]
    fn rule_composition(tree in arb_tree(), amount in 0u64..8) {
        let mut b = RuleSetBuilder::new("generated", Pubkey::new_unique());
        let root = build(&tree, &mut b);
        let inner = b.not(root);
        let double = b.not(inner);
        let rule_set = b.build();
        let ctx = context(amount);

        let verdict = evaluate_rule_tree(&rule_set, root, &ctx, 32);
        prop_assert_eq!(verdict.is_authorized(), expected(&tree, amount));
        prop_assert_eq!(
            evaluate_rule_tree(&rule_set, double, &ctx, 32).is_authorized(),
            verdict.is_authorized()
        );
    }
}

#[test]
fn test_empty_combinators() {
    let mut b = RuleSetBuilder::new("empty", Pubkey::new_unique());
    let all = b.all(vec![]);
    let any = b.any(vec![]);
    let rule_set = b.build();
    let ctx = context(1);

    assert_eq!(evaluate_rule_tree(&rule_set, all, &ctx, 32), Verdict::Authorized);
    assert!(!evaluate_rule_tree(&rule_set, any, &ctx, 32).is_authorized());
}
