//! Governance Kernel CLI
//!
//! Command-line interface for the governance kernel: runs the canonical
//! named scenarios through a real in-process `Kernel`, verifies a persisted
//! audit-log JSON dump's hash chain, and prints the Hamiltonian key
//! schedule derived from a given seed.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use governance_audit::AuditLog;
use governance_core::constants::{self, BRAIN_DIMENSIONS, POLYHEDRA};
use governance_core::kernel::{ActionInput, ActionType, Kernel, KernelConfig};
use governance_core::state::{Decision, MemoryEvent};

#[derive(Parser)]
#[command(name = "governance-cli")]
#[command(author)]
#[command(version = "1.0.0")]
#[command(about = "Governance kernel scenario runner, audit verifier and key-chain inspector")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one of the named scenarios through a fresh kernel instance
    Scenario {
        /// smooth-honest | boundary-pushing | phase-injection | torus-contradiction | sustained-flagging
        name: String,

        /// Number of steps to run (defaults to a scenario-appropriate count)
        #[arg(short, long)]
        steps: Option<u64>,
    },

    /// List the available named scenarios
    Scenarios,

    /// Verify a persisted audit-log JSON file's hash chain
    VerifyAudit {
        /// Path to a JSON dump of an `AuditLog` (see `AuditLogHandle::snapshot`)
        file: PathBuf,
    },

    /// Print the 16-step Hamiltonian key schedule derived from a seed
    KeySchedule {
        /// 32-byte shared secret, hex-encoded (64 hex chars)
        seed_hex: String,

        /// Intent fingerprint bound into the derivation
        #[arg(short, long, default_value = "governance-cli")]
        intent: String,

        /// Epoch counter bound into the derivation
        #[arg(short, long, default_value_t = 0)]
        epoch: u64,
    },

    /// Show build and constant information
    Info,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scenario { name, steps } => run_scenario(&name, steps, cli.json)?,
        Commands::Scenarios => list_scenarios(cli.json),
        Commands::VerifyAudit { file } => verify_audit(&file, cli.json)?,
        Commands::KeySchedule { seed_hex, intent, epoch } => {
            key_schedule(&seed_hex, &intent, epoch, cli.json)?
        }
        Commands::Info => info(cli.json),
    }

    Ok(())
}

const SCENARIO_NAMES: &[&str] = &[
    "smooth-honest",
    "boundary-pushing",
    "phase-injection",
    "torus-contradiction",
    "sustained-flagging",
];

fn list_scenarios(json: bool) {
    if json {
        println!("{}", serde_json::to_string_pretty(&SCENARIO_NAMES).unwrap());
    } else {
        println!("Available scenarios:");
        for name in SCENARIO_NAMES {
            println!("  {name}");
        }
    }
}

fn sine_action(step: u64) -> ActionInput {
    let mut v = [0.0_f64; BRAIN_DIMENSIONS];
    for (i, x) in v.iter_mut().take(5).enumerate() {
        *x = 0.95 + 0.2 * ((step as f64 * 0.1 + i as f64).sin());
    }
    ActionInput {
        action_type: ActionType::Navigate,
        state_vector: v,
        memory_event: None,
    }
}

fn phase_error_action() -> ActionInput {
    let mut v = [0.0_f64; BRAIN_DIMENSIONS];
    for i in constants::PHASE_RANGE {
        v[i] = std::f64::consts::PI;
    }
    ActionInput {
        action_type: ActionType::Navigate,
        state_vector: v,
        memory_event: None,
    }
}

fn boundary_action() -> ActionInput {
    let mut v = [0.0_f64; BRAIN_DIMENSIONS];
    let per_dim = 1.5 / (BRAIN_DIMENSIONS as f64).sqrt();
    for x in v.iter_mut() {
        *x = per_dim;
    }
    ActionInput {
        action_type: ActionType::Navigate,
        state_vector: v,
        memory_event: None,
    }
}

fn run_scenario(name: &str, steps: Option<u64>, json: bool) -> anyhow::Result<()> {
    let mut kernel = Kernel::new(KernelConfig::default());
    kernel.register_agent("cli-agent", [7u8; 32]);
    let accusers = HashSet::new();

    let default_steps = match name {
        "smooth-honest" => 100,
        "boundary-pushing" => 1,
        "phase-injection" => 50,
        "torus-contradiction" => 2,
        "sustained-flagging" => 300,
        other => anyhow::bail!("unknown scenario: {other} (see `scenarios` subcommand)"),
    };
    let n = steps.unwrap_or(default_steps);

    let mut last = None;
    for step in 0..n {
        let action = match name {
            "smooth-honest" => sine_action(step),
            "boundary-pushing" => boundary_action(),
            "phase-injection" | "sustained-flagging" => phase_error_action(),
            "torus-contradiction" => {
                let event = MemoryEvent {
                    content_hash: step,
                    domain: 5,
                    sequence: step * 500,
                    polarity: if step % 2 == 0 { -1.0 } else { 1.0 },
                    authority: 0.5 * step as f64,
                };
                ActionInput {
                    action_type: ActionType::Navigate,
                    state_vector: [0.02_f64; BRAIN_DIMENSIONS],
                    memory_event: Some(event),
                }
            }
            _ => unreachable!(),
        };

        let outcome = kernel.process_action("cli-agent", action, &accusers)?;
        let stop_early = matches!(name, "sustained-flagging")
            && outcome.state.immune_state == governance_core::state::ImmuneState::Expelled;
        last = Some(outcome);
        if stop_early {
            break;
        }
    }

    let outcome = last.expect("at least one step always runs");
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("Scenario: {name}");
        println!("Final decision: {:?}", outcome.decision);
        println!("Governance outcome: {:?}", outcome.governance_outcome);
        println!("Immune state: {:?}", outcome.state.immune_state);
        println!("Flux state: {:?} (nu = {:.3})", outcome.state.flux_state, outcome.state.flux);
        println!("Combined risk: {:.4}", outcome.metrics.combined_risk);
        println!("Audit anchor: {}", outcome.audit_hash);
        if outcome.decision != Decision::Allow {
            println!("(non-allow outcome, as expected for this scenario)");
        }
    }

    Ok(())
}

fn verify_audit(file: &PathBuf, json: bool) -> anyhow::Result<()> {
    let content = fs::read_to_string(file)?;
    let log: AuditLog = serde_json::from_str(&content)?;

    match log.verify_chain() {
        Ok(intact) => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "file": file,
                        "entries": log.len(),
                        "chain_intact": intact,
                        "last_hash": log.last_hash(),
                    }))?
                );
            } else {
                println!("Audit log: {}", file.display());
                println!("Entries: {}", log.len());
                println!("Chain intact: {intact}");
                println!("Last hash: {}", log.last_hash());
            }
            if !intact {
                std::process::exit(1);
            }
        }
        Err(e) => {
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "file": file,
                        "chain_intact": false,
                        "error": e.to_string(),
                    }))?
                );
            } else {
                eprintln!("Chain verification failed: {e}");
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

fn key_schedule(seed_hex: &str, intent: &str, epoch: u64, json: bool) -> anyhow::Result<()> {
    let bytes = hex::decode(seed_hex)?;
    anyhow::ensure!(bytes.len() == 32, "seed must be 32 bytes, got {}", bytes.len());
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&bytes);

    let k0 = governance_verification::derive_seed_key(&seed, intent, epoch)?;

    let mut steps = Vec::with_capacity(POLYHEDRA.len());
    let mut key = k0;
    for p in POLYHEDRA.iter() {
        key = governance_verification::hmac_step(&key, p.name)?;
        steps.push((p.name, p.category, p.min_flux, hex::encode(key)));
    }

    if json {
        let entries: Vec<_> = steps
            .iter()
            .map(|(name, category, min_flux, key_hex)| {
                serde_json::json!({
                    "polyhedron": name,
                    "category": category,
                    "min_flux": min_flux,
                    "key": key_hex,
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "seed_key": hex::encode(k0),
                "schedule": entries,
            }))?
        );
    } else {
        println!("Seed key K0: {}", hex::encode(k0));
        println!();
        for (name, category, min_flux, key_hex) in &steps {
            println!("  [{category:>12}] {name:<32} min_flux={min_flux:.2}  {key_hex}");
        }
    }

    Ok(())
}

fn info(json: bool) {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "name": "governance-cli",
                "version": "1.0.0",
                "brain_dimensions": BRAIN_DIMENSIONS,
                "polyhedra_count": POLYHEDRA.len(),
                "scenarios": SCENARIO_NAMES,
            }))
            .unwrap()
        );
    } else {
        println!("Governance Kernel CLI v1.0.0");
        println!("=============================");
        println!();
        println!("State dimensionality: {BRAIN_DIMENSIONS}");
        println!("Hamiltonian polyhedra: {}", POLYHEDRA.len());
        println!("Scenarios: {}", SCENARIO_NAMES.join(", "));
    }
}
