//! Rule Set Tool CLI.
//!
//! Compiles JSON rule sets into the binary publication format and inspects
//! encoded rule sets. Limits come from `TRANSFER_AUTH_*` variables; log
//! verbosity from `RUST_LOG`.
//!
//! Usage:
//!   cargo run --features cli --bin ruleset-tool -- compile rules.json rules.bin
//!   cargo run --features cli --bin ruleset-tool -- inspect rules.bin

use std::env;
use std::fs;

use token_transfer_auth::utils::{digest_hex, rule_set_digest};
use token_transfer_auth::{
    check_rule_set, decode_rule_set, encode_rule_set, EngineConfig, Result, RuleNode, RuleSet,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage:\n  ruleset-tool compile <rules.json> <out.bin>\n  ruleset-tool inspect <rules.bin>";

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let result = match args.get(1).map(String::as_str) {
        Some("compile") if args.len() == 4 => compile(&args[2], &args[3]),
        Some("inspect") if args.len() == 3 => inspect(&args[2]),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn compile(input: &str, output: &str) -> Result<()> {
    let config = EngineConfig::from_env()?;
    let source = fs::read_to_string(input)?;
    let rule_set: RuleSet = serde_json::from_str(&source)?;
    check_rule_set(&rule_set, &config)?;

    let bytes = encode_rule_set(&rule_set)?;
    fs::write(output, &bytes)?;

    info!(input, output, bytes = bytes.len(), "compiled rule set");
    println!("Compiled {} ({} bytes) to {}", rule_set.name, bytes.len(), output);
    println!("Digest: {}", digest_hex(&rule_set_digest(&bytes)));
    Ok(())
}

fn inspect(path: &str) -> Result<()> {
    let config = EngineConfig::from_env()?;
    let bytes = fs::read(path)?;
    let rule_set = decode_rule_set(&bytes)?;
    check_rule_set(&rule_set, &config)?;

    println!("Name:     {}", rule_set.name);
    println!("Owner:    {}", rule_set.owner);
    println!("Revision: {}", rule_set.revision);
    println!("Digest:   {}", digest_hex(&rule_set_digest(&bytes)));
    println!("Nodes:");
    for (index, node) in rule_set.nodes.iter().enumerate() {
        println!("  #{:<4} {}", index, describe(node));
    }
    println!("Operations:");
    for (operation, root) in &rule_set.operations {
        println!("  {:<28} -> {}", operation, root);
    }
    Ok(())
}

fn describe(node: &RuleNode) -> String {
    let ids = |children: &[token_transfer_auth::RuleId]| {
        children.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
    };
    match node {
        RuleNode::All(children) => format!("All[{}]", ids(children.as_slice())),
        RuleNode::Any(children) => format!("Any[{}]", ids(children.as_slice())),
        RuleNode::Not(child) => format!("Not[{}]", child),
        RuleNode::Predicate(predicate) => format!("{} {:?}", predicate.kind(), predicate),
    }
}
