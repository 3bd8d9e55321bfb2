//! LP provers
//!
//! Three racing tasks for a logic program: binary unfolding (`T^β`), pattern
//! unfolding (`T^π`), and the external cTI prover. A `NO` verdict is only
//! reported when a *single* task's witness set covers every declared mode;
//! partially covered mode sets keep the race running. The shared
//! "remaining modes" bitmap is maintained in one small critical section so
//! sibling provers can observe progress, but answers are never combined
//! across threads.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::path::Path;
use std::sync::Mutex;

use tracing::debug;

use crate::cti::{self, CtiAnswer};
use crate::program::{Mode, Program};
use crate::report::{ProofOutcome, Verdict};
use crate::symbols::SymbolRegistry;
use crate::term::Term;
use crate::unfold_lp::{BinaryUnfolding, PatternUnfolding, NB_ITE};
use crate::witness::{LoopingPair, Witness};
use crate::CancelToken;

/// Mode bookkeeping shared by the LP provers (the `checkModes` critical
/// section).
pub struct SharedModes {
    remaining: Mutex<Vec<Mode>>,
}

impl SharedModes {
    pub fn new(modes: &[Mode]) -> Self {
        Self { remaining: Mutex::new(modes.to_vec()) }
    }

    /// Record which modes the given queries discharge. Purely informative:
    /// verdicts still require one thread to cover everything.
    fn note_discharged(&self, covered: &[Mode]) {
        let mut remaining = self.remaining.lock().expect("mode bitmap poisoned");
        remaining.retain(|m| !covered.iter().any(|c| c.pred == m.pred && c.inputs == m.inputs));
    }

    pub fn remaining(&self) -> usize {
        self.remaining.lock().expect("mode bitmap poisoned").len()
    }
}

/// All-or-nothing mode coverage: every declared mode must get a witness
/// query from this thread's witness set.
fn check_modes(
    witnesses: &[Witness],
    modes: &[Mode],
    reg: &SymbolRegistry,
    shared: &SharedModes,
) -> Option<Vec<(Mode, Term)>> {
    if modes.is_empty() {
        return None;
    }
    let mut covered = Vec::with_capacity(modes.len());
    for mode in modes {
        let query = witnesses
            .iter()
            .find_map(|w| w.proves_non_termination_of(mode, reg))?;
        covered.push((mode.clone(), query));
    }
    shared.note_discharged(modes);
    Some(covered)
}

fn no_outcome(covered: Vec<(Mode, Term)>, detail: String, reg: &SymbolRegistry) -> ProofOutcome {
    let queries: Vec<String> = covered
        .iter()
        .map(|(m, q)| format!("{} does not terminate for the query {}", m.render(reg), q.render(reg)))
        .collect();
    let mut outcome = ProofOutcome::with_argument(Verdict::No, queries.join("\n"));
    outcome.description = Some(detail);
    outcome
}

/// `T^β`: iterate binary unfolding, check unit loops, extend looping pairs.
pub fn prove_binary(
    program: &Program,
    shared: &SharedModes,
    cancel: &CancelToken,
) -> ProofOutcome {
    let reg = &program.registry;
    if cancel.is_cancelled() {
        return ProofOutcome::maybe();
    }
    let mut unfolding = BinaryUnfolding::seed(program);
    let mut witnesses: Vec<Witness> = Vec::new();

    // The program's own binary clauses take part in the loop checks; the
    // fixpoint argument below is only sound once they have been examined.
    let seeds: Vec<usize> = (0..unfolding.rules.len()).collect();
    if let Some(outcome) =
        absorb_loops(&unfolding, &seeds, &mut witnesses, program, shared)
    {
        return outcome;
    }

    for _ in 0..NB_ITE {
        if cancel.is_cancelled() {
            return ProofOutcome::maybe();
        }
        let fresh = unfolding.iterate(cancel);
        if fresh.is_empty() {
            // The operator reached its fixpoint without producing anything:
            // the program terminates for every query.
            return ProofOutcome::with_argument(
                Verdict::Yes,
                format!(
                    "binary unfolding reaches its fixpoint at iteration {}",
                    unfolding.iteration()
                ),
            );
        }
        if let Some(outcome) =
            absorb_loops(&unfolding, &fresh, &mut witnesses, program, shared)
        {
            return outcome;
        }
    }
    ProofOutcome::maybe()
}

/// Check the given rules for unit loops, extend looping pairs, and return a
/// verdict when the witness set covers every declared mode.
fn absorb_loops(
    unfolding: &BinaryUnfolding<'_>,
    indices: &[usize],
    witnesses: &mut Vec<Witness>,
    program: &Program,
    shared: &SharedModes,
) -> Option<ProofOutcome> {
    let reg = &program.registry;
    for unfolded in unfolding.binary_rules(indices) {
        let Some(lp) = LoopingPair::unit_loop(&unfolded.rule) else { continue };
        debug!(rule = %unfolded.rule.render(reg), "unit loop found");
        let mut descr = format!(
            "unit loop at iteration {}:\n{}",
            unfolded.iteration,
            unfolded.rule.render(reg)
        );
        if let Some(parent) = unfolded.parent {
            let path: Vec<String> = unfolding
                .arena
                .path(parent)
                .into_iter()
                .map(|(it, text)| format!("  [{it}] {text}"))
                .collect();
            descr.push_str("\nderivation:\n");
            descr.push_str(&path.join("\n"));
        }
        // Try to extend existing pairs before registering the new loop.
        let extended: Vec<Witness> = witnesses
            .iter()
            .filter_map(|w| w.with_rule(&unfolded.rule))
            .collect();
        witnesses.extend(extended);
        witnesses.push(Witness::LoopingPair(lp));

        if program.modes.is_empty() {
            let w = witnesses.last().expect("just pushed");
            let mut outcome = ProofOutcome::with_argument(Verdict::No, w.describe(reg));
            outcome.description = Some(descr);
            return Some(outcome);
        }
        if let Some(covered) = check_modes(witnesses, &program.modes, reg, shared) {
            return Some(no_outcome(covered, descr, reg));
        }
    }
    None
}

/// `T^π`: seed pattern rules, compose, validate α-thresholds.
pub fn prove_pattern(
    program: &Program,
    shared: &SharedModes,
    cancel: &CancelToken,
) -> ProofOutcome {
    let reg = &program.registry;
    let mut unfolding = PatternUnfolding::seed(program);
    let mut witnesses: Vec<Witness> = Vec::new();

    // Seeds may already be validated. Rules composed from two binary rules
    // report as recurrent pairs, everything else as plain pattern rules.
    for i in 0..unfolding.rules.len() {
        if unfolding.rules[i].alpha().is_some() {
            witnesses.push(pattern_witness(&unfolding, i));
        }
    }

    for iteration in 0..NB_ITE {
        if cancel.is_cancelled() {
            return ProofOutcome::maybe();
        }
        if let Some(outcome) =
            pattern_verdict(&witnesses, program, reg, shared, iteration)
        {
            return outcome;
        }
        let fresh = unfolding.iterate(cancel);
        if fresh.is_empty() {
            break;
        }
        if let Some(i) = unfolding.find_witness(&fresh) {
            witnesses.push(pattern_witness(&unfolding, i));
        }
    }
    if let Some(outcome) = pattern_verdict(&witnesses, program, reg, shared, 0) {
        return outcome;
    }
    ProofOutcome::maybe()
}

fn pattern_witness(unfolding: &PatternUnfolding<'_>, i: usize) -> Witness {
    let rule = unfolding.rules[i].clone();
    match unfolding.source_pair(i) {
        Some((first, second)) => Witness::RecurrentPairLp {
            rule,
            first: first.clone(),
            second: second.clone(),
        },
        None => Witness::PatternRuleLp { rule },
    }
}

fn pattern_verdict(
    witnesses: &[Witness],
    program: &Program,
    reg: &SymbolRegistry,
    shared: &SharedModes,
    iteration: usize,
) -> Option<ProofOutcome> {
    if witnesses.is_empty() {
        return None;
    }
    if program.modes.is_empty() {
        let w = &witnesses[0];
        let mut outcome = ProofOutcome::with_argument(Verdict::No, w.describe(reg));
        outcome.description =
            Some(format!("pattern rule validated at iteration {iteration}"));
        return Some(outcome);
    }
    let covered = check_modes(witnesses, &program.modes, reg, shared)?;
    Some(no_outcome(
        covered,
        format!("pattern rule validated at iteration {iteration}"),
        reg,
    ))
}

/// The cTI adapter task.
pub fn prove_cti(cti_path: &Path, file: &Path) -> ProofOutcome {
    match cti::run(cti_path, file) {
        Ok(CtiAnswer::Yes { conditions }) => {
            let arg = if conditions.is_empty() {
                "cTI proves termination".to_string()
            } else {
                format!("cTI proves termination:\n{}", conditions.join("\n"))
            };
            ProofOutcome::with_argument(Verdict::Yes, arg)
        }
        Ok(CtiAnswer::Maybe) => ProofOutcome::maybe(),
        Err(e) => ProofOutcome::error(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::LpRule;
    use std::sync::Arc;

    fn loop_program(with_mode: bool) -> Program {
        let reg = Arc::new(SymbolRegistry::new());
        let p = reg.function("p", 1);
        let x = reg.fresh_var();
        // p(X) :- p(X): trivial self loop, caught on the seed rules.
        let rule = LpRule::new(
            Term::Fun(p, vec![Term::Var(x)]),
            vec![Term::Fun(p, vec![Term::Var(x)])],
            0,
        );
        let modes = if with_mode { vec![Mode::new(p, vec![0])] } else { vec![] };
        Program::lp(vec![rule], modes, reg)
    }

    #[test]
    fn binary_prover_answers_no_for_a_self_loop() {
        let program = loop_program(true);
        let shared = SharedModes::new(&program.modes);
        let cancel = CancelToken::new();
        let outcome = prove_binary(&program, &shared, &cancel);
        assert_eq!(outcome.verdict, Verdict::No);
        assert!(outcome.argument.unwrap().contains("does not terminate"));
        assert_eq!(shared.remaining(), 0);
    }

    #[test]
    fn binary_prover_answers_yes_on_fixpoint() {
        // p(a).  q(X) :- p(X): terminating, the unfolding dries up.
        let reg = Arc::new(SymbolRegistry::new());
        let p = reg.function("p", 1);
        let q = reg.function("q", 1);
        let a = reg.function("a", 0);
        let x = reg.fresh_var();
        let program = Program::lp(
            vec![
                LpRule::new(Term::Fun(p, vec![Term::Fun(a, vec![])]), vec![], 0),
                LpRule::new(
                    Term::Fun(q, vec![Term::Var(x)]),
                    vec![Term::Fun(p, vec![Term::Var(x)])],
                    1,
                ),
            ],
            vec![],
            reg,
        );
        let shared = SharedModes::new(&program.modes);
        let cancel = CancelToken::new();
        let outcome = prove_binary(&program, &shared, &cancel);
        assert_eq!(outcome.verdict, Verdict::Yes);
    }

    #[test]
    fn pattern_prover_answers_no_for_growing_recursion() {
        let reg = Arc::new(SymbolRegistry::new());
        let p = reg.function("p", 1);
        let f = reg.function("f", 1);
        let x = reg.fresh_var();
        let rule = LpRule::new(
            Term::Fun(p, vec![Term::Var(x)]),
            vec![Term::Fun(p, vec![Term::Fun(f, vec![Term::Var(x)])])],
            0,
        );
        let program = Program::lp(vec![rule], vec![], reg);
        let shared = SharedModes::new(&program.modes);
        let cancel = CancelToken::new();
        let outcome = prove_pattern(&program, &shared, &cancel);
        assert_eq!(outcome.verdict, Verdict::No);
    }

    #[test]
    fn cancelled_provers_return_maybe() {
        let program = loop_program(false);
        let shared = SharedModes::new(&program.modes);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(prove_binary(&program, &shared, &cancel).verdict, Verdict::Maybe);
        assert_eq!(prove_pattern(&program, &shared, &cancel).verdict, Verdict::Maybe);
    }
}
