//! TRS provers
//!
//! Two racing tasks for a rewrite system, both working on DP problems:
//!
//! - the **finiteness pipeline** applies the processors in order (SCC
//!   decomposition, then LPO / KBO / polynomial interpretations /
//!   homeomorphic embedding, with the argument-filtering retry) to every
//!   problem on the worklist; all problems discharged means `YES`;
//! - the **infinite search** runs the unfolding-based processors (Payet
//!   triples, EEG'12 narrowing, ICLP'25 pattern rules) per SCC subproblem;
//!   any witness means `NO`.
//!
//! Independent DP problems are handled independently: a decomposition pushes
//! its subproblems back onto the worklist.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use tracing::debug;

use crate::dpgraph::{dependency_pairs, DpProblem};
use crate::processors::{
    proc_embed, proc_kbo, proc_lpo, proc_poly, proc_scc, proc_unfold_eeg12,
    proc_unfold_iclp25, proc_unfold_payet, ProcOutcome, ResultDp,
};
use crate::program::Program;
use crate::report::{ProofOutcome, Verdict};
use crate::witness::Witness;
use crate::CancelToken;

/// Root DP problem of a program.
pub fn initial_problem(program: &Program) -> DpProblem {
    let pairs = dependency_pairs(&program.trs_rules, &program.registry);
    DpProblem::new(pairs, program.trs_rules.clone())
}

/// The finiteness pipeline; `YES` when every subproblem is discharged.
pub fn prove_finiteness(program: &Program, cancel: &CancelToken) -> ProofOutcome {
    let mut worklist = vec![initial_problem(program)];
    let mut trace = Vec::new();

    while let Some(problem) = worklist.pop() {
        if cancel.is_cancelled() {
            return ProofOutcome::maybe();
        }
        if problem.pairs.is_empty() {
            continue;
        }
        let outcome = finiteness_step(&problem, program, cancel);
        trace.push(outcome.trace.clone());
        match outcome.result {
            ResultDp::Finite => continue,
            ResultDp::Decomposed(subs) => worklist.extend(subs),
            ResultDp::Infinite(w) => {
                return infinite_outcome(w, program, trace.join("\n"));
            }
            ResultDp::Failed => return ProofOutcome::maybe(),
        }
    }
    let mut outcome =
        ProofOutcome::with_argument(Verdict::Yes, "every DP problem is finite");
    outcome.description = Some(trace.join("\n"));
    outcome
}

fn finiteness_step(
    problem: &DpProblem,
    program: &Program,
    cancel: &CancelToken,
) -> ProcOutcome {
    let reg = &program.registry;
    let steps: [&dyn Fn() -> ProcOutcome; 5] = [
        &|| proc_scc(problem, reg),
        &|| proc_lpo(problem, reg, true),
        &|| proc_kbo(problem, reg, true),
        &|| proc_poly(problem, reg, true),
        &|| proc_embed(problem),
    ];
    let mut last = None;
    for step in steps {
        if cancel.is_cancelled() {
            break;
        }
        let outcome = step();
        debug!(trace = %outcome.trace, "finiteness processor");
        if !matches!(outcome.result, ResultDp::Failed) {
            return outcome;
        }
        last = Some(outcome);
    }
    last.unwrap_or(ProcOutcome {
        result: ResultDp::Failed,
        trace: "cancelled before any processor ran".into(),
    })
}

/// The infinite search; `NO` on the first witness.
pub fn prove_infinite(program: &Program, cancel: &CancelToken) -> ProofOutcome {
    let reg = &program.registry;
    let root = initial_problem(program);
    if root.pairs.is_empty() {
        // Without pairs there is no chain to make infinite; leave YES to the
        // finiteness pipeline.
        return ProofOutcome::maybe();
    }

    // Work per SCC subproblem when the graph decomposes, else on the root.
    let mut problems = match proc_scc(&root, reg).result {
        ResultDp::Decomposed(subs) => subs,
        ResultDp::Finite => return ProofOutcome::maybe(),
        _ => vec![root],
    };

    while let Some(problem) = problems.pop() {
        if cancel.is_cancelled() {
            return ProofOutcome::maybe();
        }
        for proc in [proc_unfold_payet, proc_unfold_eeg12, proc_unfold_iclp25] {
            if cancel.is_cancelled() {
                return ProofOutcome::maybe();
            }
            let outcome = proc(&problem, reg, cancel);
            debug!(trace = %outcome.trace, "infinite processor");
            if let ResultDp::Infinite(w) = outcome.result {
                return infinite_outcome(w, program, outcome.trace);
            }
        }
    }
    ProofOutcome::maybe()
}

fn infinite_outcome(witness: Witness, program: &Program, trace: String) -> ProofOutcome {
    let reg = &program.registry;
    let mut argument = witness.describe(reg);
    if let Some(start) = witness.start_term() {
        argument.push_str(&format!(
            "\nthe term {} starts an infinite rewrite sequence",
            start.render(reg)
        ));
    }
    let mut outcome = ProofOutcome::with_argument(Verdict::No, argument);
    outcome.description = Some(trace);
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::TrsRule;
    use crate::symbols::SymbolRegistry;
    use crate::term::Term;
    use std::sync::Arc;

    fn trs_program(rules: Vec<TrsRule>, reg: Arc<SymbolRegistry>) -> Program {
        Program::trs(rules, reg)
    }

    #[test]
    fn swap_system_is_infinite() {
        // TRS1: f(x, y) → f(y, x).
        let reg = Arc::new(SymbolRegistry::new());
        let f = reg.function("f", 2);
        let x = reg.fresh_var();
        let y = reg.fresh_var();
        let rule = TrsRule::new(
            Term::Fun(f, vec![Term::Var(x), Term::Var(y)]),
            Term::Fun(f, vec![Term::Var(y), Term::Var(x)]),
            0,
        );
        let program = trs_program(vec![rule], reg);
        let cancel = CancelToken::new();
        let outcome = prove_infinite(&program, &cancel);
        assert_eq!(outcome.verdict, Verdict::No);
        assert!(outcome.argument.unwrap().contains("infinite rewrite sequence"));
    }

    #[test]
    fn toyama_system_is_infinite_via_recurrent_pair() {
        // TRS2: f(0, 1, x) → f(x, x, x) with the projection rules for g.
        let reg = Arc::new(SymbolRegistry::new());
        let f = reg.function("f", 3);
        let g = reg.function("g", 2);
        let zero = reg.function("0", 0);
        let one = reg.function("1", 0);
        let x = reg.fresh_var();
        let y = reg.fresh_var();
        let z0 = Term::Fun(zero, vec![]);
        let z1 = Term::Fun(one, vec![]);
        let rules = vec![
            TrsRule::new(
                Term::Fun(f, vec![z0.clone(), z1.clone(), Term::Var(x)]),
                Term::Fun(f, vec![Term::Var(x), Term::Var(x), Term::Var(x)]),
                0,
            ),
            TrsRule::new(
                Term::Fun(g, vec![Term::Var(x), Term::Var(y)]),
                Term::Var(x),
                1,
            ),
            TrsRule::new(
                Term::Fun(g, vec![Term::Var(x), Term::Var(y)]),
                Term::Var(y),
                2,
            ),
        ];
        let program = trs_program(rules, reg);
        let cancel = CancelToken::new();
        let outcome = prove_infinite(&program, &cancel);
        assert_eq!(outcome.verdict, Verdict::No);
    }

    #[test]
    fn distribution_system_is_finite_via_lpo() {
        // TRS3: g(f(x)) → f(g(x)).
        let reg = Arc::new(SymbolRegistry::new());
        let f = reg.function("f", 1);
        let g = reg.function("g", 1);
        let x = reg.fresh_var();
        let rule = TrsRule::new(
            Term::Fun(g, vec![Term::Fun(f, vec![Term::Var(x)])]),
            Term::Fun(f, vec![Term::Fun(g, vec![Term::Var(x)])]),
            0,
        );
        let program = trs_program(vec![rule], reg);
        let cancel = CancelToken::new();
        let outcome = prove_finiteness(&program, &cancel);
        assert_eq!(outcome.verdict, Verdict::Yes, "{:?}", outcome.argument);
    }

    #[test]
    fn empty_pair_set_is_finite() {
        // A system whose right sides contain no defined symbol has no pairs.
        let reg = Arc::new(SymbolRegistry::new());
        let f = reg.function("f", 1);
        let a = reg.function("a", 0);
        let x = reg.fresh_var();
        let rule = TrsRule::new(
            Term::Fun(f, vec![Term::Var(x)]),
            Term::Fun(a, vec![]),
            0,
        );
        let program = trs_program(vec![rule], reg);
        let cancel = CancelToken::new();
        assert_eq!(prove_finiteness(&program, &cancel).verdict, Verdict::Yes);
        assert_eq!(prove_infinite(&program, &cancel).verdict, Verdict::Maybe);
    }

    #[test]
    fn cancellation_yields_maybe() {
        let reg = Arc::new(SymbolRegistry::new());
        let f = reg.function("f", 1);
        let x = reg.fresh_var();
        let rule = TrsRule::new(
            Term::Fun(f, vec![Term::Var(x)]),
            Term::Fun(f, vec![Term::Var(x)]),
            0,
        );
        let program = trs_program(vec![rule], reg);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(prove_finiteness(&program, &cancel).verdict, Verdict::Maybe);
        assert_eq!(prove_infinite(&program, &cancel).verdict, Verdict::Maybe);
    }
}
