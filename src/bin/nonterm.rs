//! Command-line front end
//!
//! `nonterm <file> [action] [options]`
//!
//! Actions: `-prove` (default), `-h`/`--help`, `--version`, `-print`,
//! `-stat`. Options: `-v` (verbose proofs), `-t=N` (seconds per
//! nontermination proof), `-cTI=PATH` (external cTI prover for LP
//! termination).
//!
//! Exit code 0 on normal completion of any verdict (including `MAYBE`);
//! nonzero only on I/O or parse failure.

#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use nonterm::{parse_file, prove_termination, ProgramStats, ProverConfig};

const USAGE: &str = "\
usage: nonterm <file> [action] [options]

actions:
  -prove        prove (non)termination of the problem (default)
  -print        echo the parsed program in canonical form
  -stat         print problem statistics as JSON
  -h, --help    show this help
  --version     show the version

options:
  -v            verbose proofs (print derivation descriptions)
  -t=N          seconds per nontermination proof (default 5)
  -cTI=PATH     path to the external cTI prover (LP termination)

file suffixes: .pl (logic program), .ari/.trs/.srs/.xml (rewrite system)";

/// `-key=value` option, if present.
fn parse_kv(args: &[String], key: &str) -> Option<String> {
    let prefix = format!("{key}=");
    args.iter().find_map(|a| a.strip_prefix(&prefix).map(str::to_string))
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() || has_flag(&args, "-h") || has_flag(&args, "--help") {
        println!("{USAGE}");
        return Ok(());
    }
    if has_flag(&args, "--version") {
        println!("nonterm {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // The environment filter keeps tracing silent unless asked for.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let file = PathBuf::from(&args[0]);
    let program = parse_file(&file)
        .with_context(|| format!("cannot load problem file {}", file.display()))?;

    if has_flag(&args, "-print") {
        print!("{}", program.render());
        return Ok(());
    }
    if has_flag(&args, "-stat") {
        println!("{}", ProgramStats::of(&program).to_json());
        return Ok(());
    }

    let verbose = has_flag(&args, "-v");
    let seconds: u64 = match parse_kv(&args, "-t") {
        Some(s) => s
            .parse()
            .with_context(|| format!("-t expects a number of seconds (got `{s}`)"))?,
        None => 5,
    };
    let config = ProverConfig {
        verbose,
        proof_timeout: Duration::from_secs(seconds),
        cti_path: parse_kv(&args, "-cTI").map(PathBuf::from),
        source_file: Some(file),
    };

    let outcome = prove_termination(&program, &config);
    println!("{}", outcome.render(verbose));
    Ok(())
}
