//! Proof coordinator: racing provers against a time budget
//!
//! `prove_termination` spawns one scoped worker thread per prover — for a
//! logic program the binary unfolder, the pattern unfolder, and (when a path
//! is configured) the cTI adapter; for a rewrite system the finiteness
//! pipeline and the infinite search. Workers push their answers into an
//! `mpsc` completion channel; the coordinator waits with a deadline and the
//! first conclusive verdict (`YES`/`NO`) wins and flips the shared
//! cancellation token. `ERROR` answers are logged and ignored; when the
//! deadline passes with only `MAYBE`s, the answer is `MAYBE` with the
//! "Timeout expired!" argument attached.
//!
//! Workers poll the token between units of work, so cancellation takes at
//! most one unfolding step, one unification, or one coefficient
//! instantiation to observe.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::program::{Program, ProgramKind};
use crate::prover_lp::{self, SharedModes};
use crate::prover_trs;
use crate::report::{ProofOutcome, Verdict};
use crate::CancelToken;

/// Coordinator configuration, filled in by the CLI.
#[derive(Clone, Debug)]
pub struct ProverConfig {
    /// Print verbose proof descriptions.
    pub verbose: bool,
    /// Budget per nontermination proof (`-t=N`).
    pub proof_timeout: Duration,
    /// Path to the external cTI prover (`-cTI=PATH`).
    pub cti_path: Option<PathBuf>,
    /// The problem file, handed to cTI verbatim.
    pub source_file: Option<PathBuf>,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            proof_timeout: Duration::from_secs(5),
            cti_path: None,
            source_file: None,
        }
    }
}

/// Race the provers appropriate for the program kind and merge the first
/// conclusive verdict.
pub fn prove_termination(program: &Program, config: &ProverConfig) -> ProofOutcome {
    let cancel = CancelToken::new();
    let (tx, rx) = mpsc::channel::<(&'static str, ProofOutcome)>();
    let deadline = Instant::now() + config.proof_timeout;
    let shared = SharedModes::new(&program.modes);

    let mut winner: Option<ProofOutcome> = None;
    let mut timed_out = false;

    thread::scope(|scope| {
        let mut expected = 0usize;
        match program.kind {
            ProgramKind::Lp => {
                spawn_worker(scope, "lp-binary", &tx, {
                    let (shared, cancel) = (&shared, cancel.clone());
                    move || prover_lp::prove_binary(program, shared, &cancel)
                });
                expected += 1;
                spawn_worker(scope, "lp-pattern", &tx, {
                    let (shared, cancel) = (&shared, cancel.clone());
                    move || prover_lp::prove_pattern(program, shared, &cancel)
                });
                expected += 1;
                if let (Some(cti), Some(file)) = (&config.cti_path, &config.source_file) {
                    let (cti, file) = (cti.clone(), file.clone());
                    spawn_worker(scope, "lp-cti", &tx, move || {
                        prover_lp::prove_cti(&cti, &file)
                    });
                    expected += 1;
                }
            }
            ProgramKind::Trs => {
                spawn_worker(scope, "trs-finite", &tx, {
                    let cancel = cancel.clone();
                    move || prover_trs::prove_finiteness(program, &cancel)
                });
                expected += 1;
                spawn_worker(scope, "trs-infinite", &tx, {
                    let cancel = cancel.clone();
                    move || prover_trs::prove_infinite(program, &cancel)
                });
                expected += 1;
            }
        }
        drop(tx);

        while expected > 0 {
            let now = Instant::now();
            if now >= deadline {
                timed_out = true;
                break;
            }
            match rx.recv_timeout(deadline - now) {
                Ok((name, outcome)) => {
                    expected -= 1;
                    debug!(prover = name, verdict = outcome.verdict.as_str(), "answer");
                    match outcome.verdict {
                        v if v.is_conclusive() => {
                            winner = Some(outcome);
                            break;
                        }
                        Verdict::Error => {
                            // Logged, never a winner; siblings keep racing.
                            warn!(prover = name, message = ?outcome.argument, "prover error");
                        }
                        _ => {}
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    timed_out = true;
                    break;
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        // First-success-wins: stop the rest, scope joins them on exit.
        cancel.cancel();
    });

    match winner {
        Some(outcome) => outcome,
        None if timed_out => ProofOutcome::with_argument(Verdict::Maybe, "Timeout expired!"),
        None => ProofOutcome::maybe(),
    }
}

fn spawn_worker<'scope, 'env>(
    scope: &'scope thread::Scope<'scope, 'env>,
    name: &'static str,
    tx: &mpsc::Sender<(&'static str, ProofOutcome)>,
    work: impl FnOnce() -> ProofOutcome + Send + 'scope,
) {
    let tx = tx.clone();
    thread::Builder::new()
        .name(name.to_string())
        .spawn_scoped(scope, move || {
            let outcome = work();
            // A closed channel just means the race is already decided.
            let _ = tx.send((name, outcome));
        })
        .expect("failed to spawn prover thread");
}
