//! # Sarsaparilla REPL
//!
//! Interactive driver for the Horn-clause verifier core. Parses rule text,
//! declares initial cell states, and runs attack-search queries against the
//! accumulated rule set.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin sarsaparilla
//! cargo run --bin sarsaparilla -- --config config.toml --depth 8
//! ```
//!
//! Dot commands:
//! - `.rule <text>` - Parse and add a rule (see the rule-text grammar)
//! - `.state <cell> <msg>` - Declare an initial cell state
//! - `.query <msg>` - Run an attack-search query against the current rules
//! - `.rules` - List rules accumulated so far
//! - `.save-catalog <path>` - Write the declared cell catalog to a JSON file
//! - `.load-catalog <path>` - Read a previously saved cell catalog
//! - `.reset` - Clear rules and initial states
//! - `.help` - Show this help
//! - `.quit` - Exit

use std::collections::HashMap;

use clap::Parser;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use sarsaparilla::{
    parse_message, parse_rule, print_message, Attack, Catalog, Config, HornClause, Nession,
    OrchestratorConfig, QueryCallbacks, QueryOutcome, Rule,
};

/// Command-line arguments for the REPL binary.
#[derive(Parser, Debug)]
#[command(name = "sarsaparilla", about = "Stateful Horn-clause verifier REPL")]
struct Args {
    /// Path to a layered config file (see `Config::from_file`).
    #[arg(long)]
    config: Option<String>,

    /// Override `max_nession_depth` for this session.
    #[arg(long)]
    depth: Option<usize>,
}

struct ReplState {
    rules: Vec<Rule>,
    initial_states: HashMap<String, sarsaparilla::Message>,
    catalog: Catalog,
    config: OrchestratorConfig,
}

impl ReplState {
    fn new(config: OrchestratorConfig) -> Self {
        ReplState {
            rules: Vec::new(),
            initial_states: HashMap::new(),
            catalog: Catalog::new(),
            config,
        }
    }
}

struct ReportingCallbacks {
    verbose: bool,
}

impl QueryCallbacks for ReportingCallbacks {
    fn on_level_start(&mut self, depth: usize) {
        if self.verbose {
            println!("-- exploring nession depth {depth}");
        }
    }

    fn on_nession_assessed(&mut self, nession: &Nession, clauses: &[HornClause], attack: Option<&Attack>) {
        if self.verbose {
            println!(
                "   {} ({} frames, {} clauses): {}",
                nession.label(),
                nession.depth(),
                clauses.len(),
                if attack.is_some() { "attack" } else { "no attack" }
            );
        }
    }

    fn on_complete(&mut self, _outcome: &QueryOutcome) {}
}

fn main() {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path).unwrap_or_else(|err| {
            eprintln!("warning: failed to load config from {path}: {err}");
            Config::default()
        }),
        None => Config::default(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.logging.level))
        .init();

    let mut orchestrator_config = config.orchestrator;
    if let Some(depth) = args.depth {
        orchestrator_config.max_nession_depth = depth;
    }

    println!("Sarsaparilla verifier REPL");
    println!("==========================\n");
    print_help();

    let mut state = ReplState::new(orchestrator_config);
    let mut editor = DefaultEditor::new().expect("failed to initialize line editor");

    loop {
        match editor.readline("sarsa> ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if !dispatch(line, &mut state) {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("readline error: {err}");
                break;
            }
        }
    }
}

/// Handle one REPL line. Returns `false` to exit the loop.
fn dispatch(line: &str, state: &mut ReplState) -> bool {
    if line == ".quit" || line == ".exit" {
        println!("Goodbye!");
        return false;
    }

    if line == ".help" {
        print_help();
        return true;
    }

    if line == ".reset" {
        state.rules.clear();
        state.initial_states.clear();
        state.catalog = Catalog::new();
        println!("cleared rules and initial states");
        return true;
    }

    if line == ".rules" {
        if state.rules.is_empty() {
            println!("(no rules yet)");
        }
        for rule in &state.rules {
            println!("  {}", sarsaparilla::print_rule_source(rule));
        }
        return true;
    }

    if let Some(text) = line.strip_prefix(".rule ") {
        match parse_rule(text.trim()) {
            Ok(rule) => match state.catalog.validate_rule(&rule) {
                Ok(()) => {
                    println!("added rule #{}", rule.id());
                    state.rules.push(rule);
                }
                Err(err) => println!("rejected rule: {err}"),
            },
            Err(err) => println!("parse error: {err}"),
        }
        return true;
    }

    if let Some(rest) = line.strip_prefix(".state ") {
        let mut parts = rest.trim().splitn(2, char::is_whitespace);
        let (Some(cell), Some(msg_text)) = (parts.next(), parts.next()) else {
            println!("usage: .state <cell> <msg>");
            return true;
        };
        match parse_message(msg_text.trim()) {
            Ok(msg) => {
                println!("declared {cell} = {}", print_message(&msg));
                state.catalog.declare_cell(cell);
                state.initial_states.insert(cell.to_string(), msg);
            }
            Err(err) => println!("parse error: {err}"),
        }
        return true;
    }

    if let Some(text) = line.strip_prefix(".query ") {
        match parse_message(text.trim()) {
            Ok(query) => run_query(state, query),
            Err(err) => println!("parse error: {err}"),
        }
        return true;
    }

    if let Some(path) = line.strip_prefix(".save-catalog ") {
        match state.catalog.save_to_file(path.trim()) {
            Ok(()) => println!("wrote catalog to {}", path.trim()),
            Err(err) => println!("failed to save catalog: {err}"),
        }
        return true;
    }

    if let Some(path) = line.strip_prefix(".load-catalog ") {
        match Catalog::load_from_file(path.trim()) {
            Ok(catalog) => {
                println!("loaded {} cell(s) from {}", catalog.len(), path.trim());
                state.catalog = catalog;
            }
            Err(err) => println!("failed to load catalog: {err}"),
        }
        return true;
    }

    println!("unknown command: {line}");
    print_help();
    true
}

fn run_query(state: &ReplState, query: sarsaparilla::Message) {
    let engine = sarsaparilla::make_query_engine(
        state.rules.clone(),
        state.initial_states.clone(),
        vec![query],
        state.config.clone(),
    );

    let mut callbacks = ReportingCallbacks { verbose: true };
    let outcome = engine.execute(&mut callbacks);

    println!("status: {:?}", outcome.status);
    match outcome.attack {
        Some(attack) => print_attack(&attack, 0),
        None => println!("no attack found"),
    }
}

fn print_attack(attack: &Attack, depth: usize) {
    let indent = "  ".repeat(depth);
    println!(
        "{indent}derived {} (queried {}) via clause #{}",
        print_message(&attack.derived),
        print_message(&attack.queried),
        attack.clause_id
    );
    for premise in &attack.premises {
        print_attack(premise, depth + 1);
    }
}

fn print_help() {
    println!("Commands:");
    println!("  .rule <text>          - add a rule");
    println!("  .state <cell> <msg>   - declare an initial cell state");
    println!("  .query <msg>          - run an attack search");
    println!("  .rules                - list accumulated rules");
    println!("  .save-catalog <path>  - write the cell catalog to a JSON file");
    println!("  .load-catalog <path>  - read a previously saved cell catalog");
    println!("  .reset                - clear rules and initial states");
    println!("  .help                 - show this help");
    println!("  .quit                 - exit\n");
}
