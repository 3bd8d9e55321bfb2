//! DP processors
//!
//! Every processor consumes a [`DpProblem`] and produces a [`ResultDp`] with
//! a proof trace. The finiteness processors share one retry discipline
//! (`run_with_filtering`): the unfiltered problem is attempted first and, if
//! that fails with filtering enabled, every argument-filter instantiation is
//! tried until one succeeds or the enumeration cap trips.
//!
//! The unfolding-based infinite-detection processors share a seed / iterate /
//! early-exit loop bounded by `NB_ITE` and `NB_UNF` (both `i32::MAX / 2`
//! for the Payet and Iclp25 variants, 200 unfolded rules for Eeg12 — kept
//! exactly). The Payet variant adapts its maximum depth starting from the
//! TRS's own depth and retries with variable unfolding when the first pass
//! comes up empty.

#![forbid(unsafe_code)]

use tracing::debug;

use crate::dpgraph::{
    better_decomposition, cyclic_sccs, decompose_after_removal, dependency_graph, DpProblem,
};
use crate::eeg::{narrow, theorem8, EegRule};
use crate::filtering::{enumerate_filters, signature_of};
use crate::orders::{kbo_strict_pairs, lpo_strict_pairs};
use crate::pattern::{PatternRule, PatternSubst, SimplePatternTerm};
use crate::poly::poly_strict_pairs;
use crate::program::TrsRule;
use crate::subst::Subst;
use crate::symbols::SymbolRegistry;
use crate::unfold_trs::{seed_triples, DpTriple};
use crate::unify;
use crate::witness::Witness;
use crate::CancelToken;

/// Iteration cap for the Payet and Iclp25 unfolding processors.
pub const NB_ITE: usize = (i32::MAX / 2) as usize;
/// Unfolded-rule cap for the Payet and Iclp25 unfolding processors.
pub const NB_UNF: usize = (i32::MAX / 2) as usize;
/// Unfolded-rule cap for the Eeg12 processor.
pub const NB_UNF_EEG12: usize = 200;
/// How far Payet's adaptive depth climbs above the TRS's own depth.
const PAYET_DEPTH_SLACK: usize = 3;

/// Outcome of one processor application.
#[derive(Clone, Debug)]
pub enum ResultDp {
    Finite,
    Infinite(Witness),
    Decomposed(Vec<DpProblem>),
    Failed,
}

/// Result plus its human-readable trace line.
#[derive(Clone, Debug)]
pub struct ProcOutcome {
    pub result: ResultDp,
    pub trace: String,
}

impl ProcOutcome {
    fn failed(trace: impl Into<String>) -> Self {
        Self { result: ResultDp::Failed, trace: trace.into() }
    }
}

// ============================================================================
// SCC decomposition
// ============================================================================

/// Decompose a problem along its dependency graph without removing pairs:
/// the cyclic SCCs become subproblems; no SCC at all means the problem is
/// finite outright.
pub fn proc_scc(problem: &DpProblem, reg: &SymbolRegistry) -> ProcOutcome {
    let adj = dependency_graph(problem, reg);
    let sccs = cyclic_sccs(&adj);
    if sccs.is_empty() {
        return ProcOutcome { result: ResultDp::Finite, trace: "graph has no cycle".into() };
    }
    let subs: Vec<DpProblem> = sccs
        .iter()
        .map(|comp| {
            DpProblem::new(
                comp.iter().map(|&i| problem.pairs[i].clone()).collect(),
                problem.trs.clone(),
            )
        })
        .collect();
    if subs.len() == 1 && subs[0].pairs.len() == problem.pairs.len() {
        // No progress: signal failure so the pipeline moves to the orders.
        return ProcOutcome::failed("graph is a single SCC");
    }
    ProcOutcome {
        trace: format!("dependency graph decomposes into {} SCC(s)", subs.len()),
        result: ResultDp::Decomposed(subs),
    }
}

// ============================================================================
// Reduction-pair processors (ProcForFiniteness retry discipline)
// ============================================================================

fn run_with_filtering(
    problem: &DpProblem,
    reg: &SymbolRegistry,
    use_filtering: bool,
    name: &str,
    attempt: impl Fn(&[TrsRule], &[TrsRule]) -> Option<Vec<usize>>,
) -> ProcOutcome {
    if let Some(strict) = attempt(&problem.pairs, &problem.trs) {
        return decompose_with(problem, &strict, reg, format!("{name} orients the problem"));
    }
    if !use_filtering {
        return ProcOutcome::failed(format!("{name} fails without filtering"));
    }
    let mut all = problem.trs.clone();
    all.extend(problem.pairs.iter().cloned());
    let signature = signature_of(&all);
    let Some(filters) = enumerate_filters(&signature) else {
        return ProcOutcome::failed(format!(
            "{name}: filter enumeration exceeds the instantiation cap"
        ));
    };
    // Among successful filterings keep the preferred decomposition: fewest
    // subproblems, then smallest average pair count. A fully finite result
    // cannot be beaten and exits immediately.
    let mut best: Option<Vec<DpProblem>> = None;
    for pi in &filters {
        let fp: Vec<TrsRule> = problem.pairs.iter().map(|p| pi.apply_rule(p)).collect();
        let fr: Vec<TrsRule> = problem.trs.iter().map(|r| pi.apply_rule(r)).collect();
        let Some(strict) = attempt(&fp, &fr) else { continue };
        let outcome = decompose_with(
            problem,
            &strict,
            reg,
            format!("{name} orients the problem under an argument filtering"),
        );
        match outcome.result {
            ResultDp::Finite => return outcome,
            ResultDp::Decomposed(subs) => {
                let replace = match &best {
                    None => true,
                    Some(cur) => {
                        better_decomposition(&subs, cur) == std::cmp::Ordering::Less
                    }
                };
                if replace {
                    best = Some(subs);
                }
            }
            _ => {}
        }
    }
    match best {
        Some(subs) => ProcOutcome {
            trace: format!("{name} orients the problem under an argument filtering"),
            result: ResultDp::Decomposed(subs),
        },
        None => ProcOutcome::failed(format!("{name} fails under every filtering")),
    }
}

/// Remove the strict pairs and decompose what remains.
fn decompose_with(
    problem: &DpProblem,
    strict: &[usize],
    reg: &SymbolRegistry,
    trace: String,
) -> ProcOutcome {
    let subs = decompose_after_removal(problem, strict, reg);
    if subs.is_empty() {
        return ProcOutcome { result: ResultDp::Finite, trace };
    }
    // A degenerate "removal" that keeps the whole problem is no progress.
    if subs.len() == 1 && subs[0].pairs.len() == problem.pairs.len() {
        return ProcOutcome::failed(trace + " but removes nothing");
    }
    ProcOutcome { result: ResultDp::Decomposed(subs), trace }
}

pub fn proc_lpo(problem: &DpProblem, reg: &SymbolRegistry, use_filtering: bool) -> ProcOutcome {
    run_with_filtering(problem, reg, use_filtering, "LPO", |pairs, rules| {
        lpo_strict_pairs(pairs, rules).map(|(_, strict)| strict)
    })
}

/// KBO with the 1-then-2 coefficient bound schedule.
pub fn proc_kbo(problem: &DpProblem, reg: &SymbolRegistry, use_filtering: bool) -> ProcOutcome {
    let size = problem.pairs.len() + problem.trs.len();
    let uppers: &[u64] =
        if size > crate::orders::KBO_SIZE_THRESHOLD { &[1] } else { &[1, 2] };
    for &upper in uppers {
        let outcome = run_with_filtering(problem, reg, use_filtering, "KBO", |pairs, rules| {
            kbo_strict_pairs(pairs, rules, upper).map(|(_, strict)| strict)
        });
        if !matches!(outcome.result, ResultDp::Failed) {
            return ProcOutcome {
                trace: format!("{} (coefficient bound {upper})", outcome.trace),
                result: outcome.result,
            };
        }
    }
    ProcOutcome::failed("KBO fails for every coefficient bound")
}

pub fn proc_poly(problem: &DpProblem, reg: &SymbolRegistry, use_filtering: bool) -> ProcOutcome {
    run_with_filtering(problem, reg, use_filtering, "polynomial interpretation", |pairs, rules| {
        poly_strict_pairs(pairs, rules).map(|(_, strict)| strict)
    })
}

/// Trivial homeomorphic-embedding closure.
pub fn proc_embed(problem: &DpProblem) -> ProcOutcome {
    if !problem.pairs.is_empty() && problem.pairs.iter().all(|p| p.lhs.embeds(&p.rhs)) {
        ProcOutcome {
            result: ResultDp::Finite,
            trace: "every pair's left side embeds its right side".into(),
        }
    } else {
        ProcOutcome::failed("homeomorphic embedding does not apply")
    }
}

// ============================================================================
// Unfolding-based infinite-detection processors
// ============================================================================

/// Payet's triple unfolding with adaptive depth and a variable-unfolding
/// retry.
pub fn proc_unfold_payet(
    problem: &DpProblem,
    reg: &SymbolRegistry,
    cancel: &CancelToken,
) -> ProcOutcome {
    let base_depth = problem
        .trs
        .iter()
        .chain(problem.pairs.iter())
        .map(TrsRule::depth)
        .max()
        .unwrap_or(1);
    for unfold_variables in [false, true] {
        for max_depth in base_depth..=base_depth + PAYET_DEPTH_SLACK {
            if cancel.is_cancelled() {
                return ProcOutcome::failed("cancelled");
            }
            let mut triples: Vec<DpTriple> =
                seed_triples(&problem.pairs, &problem.pairs)
                    .iter()
                    .flat_map(|t| t.expand(&problem.trs, reg))
                    .collect();
            let mut generated = triples.len();
            for iteration in 0..NB_ITE {
                if cancel.is_cancelled() {
                    return ProcOutcome::failed("cancelled");
                }
                for t in &triples {
                    if let Some(w) = t.non_termination_test(&problem.trs, reg) {
                        return ProcOutcome {
                            trace: format!(
                                "unfolding finds a loop at iteration {iteration} (depth {max_depth})"
                            ),
                            result: ResultDp::Infinite(w),
                        };
                    }
                }
                let mut next = Vec::new();
                for t in &triples {
                    for forward in [true, false] {
                        next.extend(
                            t.unfold(&problem.trs, reg, forward, unfold_variables, cancel),
                        );
                    }
                }
                next.retain(|t| t.elim(&problem.trs, max_depth, reg));
                generated += next.len();
                if next.is_empty() || generated >= NB_UNF {
                    break;
                }
                triples = next;
            }
        }
        debug!(unfold_variables, "payet pass exhausted");
    }
    ProcOutcome::failed("triple unfolding finds no loop")
}

/// EEG'12 narrowing with the 200-rule cap.
pub fn proc_unfold_eeg12(
    problem: &DpProblem,
    reg: &SymbolRegistry,
    cancel: &CancelToken,
) -> ProcOutcome {
    let mut rules: Vec<EegRule> = problem
        .trs
        .iter()
        .chain(problem.pairs.iter())
        .map(EegRule::seed)
        .collect();
    let mut cursor = 0;
    while cursor < rules.len() {
        if cancel.is_cancelled() {
            return ProcOutcome::failed("cancelled");
        }
        let rule = rules[cursor].clone();
        cursor += 1;
        let candidates: Vec<EegRule> = std::iter::once(rule.clone())
            .chain(rule.pattern_create())
            .collect();
        for candidate in &candidates {
            if let Some(w) = theorem8(candidate, reg) {
                return ProcOutcome {
                    trace: "EEG'12 narrowing reaches a Theorem 8 instance".into(),
                    result: ResultDp::Infinite(w),
                };
            }
        }
        for candidate in candidates {
            for other in rules.clone() {
                if rules.len() >= NB_UNF_EEG12 {
                    return ProcOutcome::failed("EEG'12 narrowing exhausts its rule budget");
                }
                for narrowed in narrow(&candidate, &other, reg, cancel) {
                    if !rules.contains(&narrowed) {
                        rules.push(narrowed);
                    }
                }
            }
        }
    }
    ProcOutcome::failed("EEG'12 narrowing finds no Theorem 8 instance")
}

/// ICLP'25 pattern rules for TRS: extract self-instantiating pairs and
/// validate their α-threshold.
pub fn proc_unfold_iclp25(
    problem: &DpProblem,
    reg: &SymbolRegistry,
    cancel: &CancelToken,
) -> ProcOutcome {
    let mut seen = 0usize;
    for pair in problem.pairs.iter().chain(problem.trs.iter()) {
        if cancel.is_cancelled() {
            return ProcOutcome::failed("cancelled");
        }
        seen += 1;
        if seen >= NB_UNF {
            break;
        }
        // The right side must instantiate the left via a pumping matcher.
        let Some(sigma) = unify::match_terms(&pair.lhs, &pair.rhs) else { continue };
        if sigma.is_empty() || sigma.is_variable_renaming() {
            continue;
        }
        let Ok(theta_l) = PatternSubst::new(vec![sigma.clone()], Subst::new()) else {
            continue;
        };
        let Ok(theta_r) = PatternSubst::new(vec![sigma.clone()], sigma.clone()) else {
            continue;
        };
        let Some(lhs) = SimplePatternTerm::try_new(reg, pair.lhs.clone(), &theta_l) else {
            continue;
        };
        let Some(rhs) = SimplePatternTerm::try_new(reg, pair.lhs.clone(), &theta_r) else {
            continue;
        };
        let mut rule = PatternRule::new(lhs, rhs);
        if rule.establish_alpha(reg).is_some() {
            return ProcOutcome {
                trace: "a pattern rule with a finite α-threshold was found".into(),
                result: ResultDp::Infinite(Witness::ArgumentIclp25 { rule }),
            };
        }
    }
    ProcOutcome::failed("no pattern rule validates")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dpgraph::dependency_pairs;
    use crate::symbols::SymbolRegistry;
    use crate::term::Term;
    use std::sync::Arc;

    fn problem_of(rules: Vec<TrsRule>, reg: &Arc<SymbolRegistry>) -> DpProblem {
        let pairs = dependency_pairs(&rules, reg);
        DpProblem::new(pairs, rules)
    }

    #[test]
    fn lpo_discharges_the_distribution_system() {
        let reg = Arc::new(SymbolRegistry::new());
        let f = reg.function("f", 1);
        let g = reg.function("g", 1);
        let x = reg.fresh_var();
        let rule = TrsRule::new(
            Term::Fun(g, vec![Term::Fun(f, vec![Term::Var(x)])]),
            Term::Fun(f, vec![Term::Fun(g, vec![Term::Var(x)])]),
            0,
        );
        let problem = problem_of(vec![rule], &reg);
        let outcome = proc_lpo(&problem, &reg, false);
        assert!(matches!(outcome.result, ResultDp::Finite), "{}", outcome.trace);
    }

    #[test]
    fn payet_unfolding_finds_the_swap_loop() {
        let reg = Arc::new(SymbolRegistry::new());
        let f = reg.function("f", 2);
        let x = reg.fresh_var();
        let y = reg.fresh_var();
        let rule = TrsRule::new(
            Term::Fun(f, vec![Term::Var(x), Term::Var(y)]),
            Term::Fun(f, vec![Term::Var(y), Term::Var(x)]),
            0,
        );
        let problem = problem_of(vec![rule], &reg);
        let cancel = CancelToken::new();
        let outcome = proc_unfold_payet(&problem, &reg, &cancel);
        assert!(matches!(outcome.result, ResultDp::Infinite(_)), "{}", outcome.trace);
    }

    #[test]
    fn eeg_narrowing_catches_context_growth() {
        let reg = Arc::new(SymbolRegistry::new());
        let f = reg.function("f", 1);
        let s = reg.function("s", 1);
        let x = reg.fresh_var();
        let rule = TrsRule::new(
            Term::Fun(f, vec![Term::Var(x)]),
            Term::Fun(f, vec![Term::Fun(s, vec![Term::Var(x)])]),
            0,
        );
        let problem = DpProblem::new(vec![], vec![rule]);
        let cancel = CancelToken::new();
        let outcome = proc_unfold_eeg12(&problem, &reg, &cancel);
        assert!(matches!(outcome.result, ResultDp::Infinite(_)), "{}", outcome.trace);
    }

    #[test]
    fn iclp25_validates_a_pumping_pair() {
        let reg = Arc::new(SymbolRegistry::new());
        let f = reg.function("f#", 1);
        let s = reg.function("s", 1);
        let x = reg.fresh_var();
        let pair = TrsRule::new(
            Term::Fun(f, vec![Term::Var(x)]),
            Term::Fun(f, vec![Term::Fun(s, vec![Term::Var(x)])]),
            0,
        );
        let problem = DpProblem::new(vec![pair], vec![]);
        let cancel = CancelToken::new();
        let outcome = proc_unfold_iclp25(&problem, &reg, &cancel);
        match outcome.result {
            ResultDp::Infinite(Witness::ArgumentIclp25 { rule }) => {
                assert_eq!(rule.alpha().map(|(a, _)| *a), Some(0));
            }
            other => panic!("expected ICLP'25 witness, got {other:?}"),
        }
    }

    #[test]
    fn embedding_processor_requires_every_pair() {
        let reg = Arc::new(SymbolRegistry::new());
        let g = reg.function("g#", 1);
        let f = reg.function("f", 1);
        let x = reg.fresh_var();
        let descending = TrsRule::new(
            Term::Fun(g, vec![Term::Fun(f, vec![Term::Var(x)])]),
            Term::Fun(g, vec![Term::Var(x)]),
            0,
        );
        let ok = DpProblem::new(vec![descending.clone()], vec![]);
        assert!(matches!(proc_embed(&ok).result, ResultDp::Finite));

        let swap = TrsRule::new(
            Term::Fun(g, vec![Term::Var(x)]),
            Term::Fun(g, vec![Term::Fun(f, vec![Term::Var(x)])]),
            1,
        );
        let bad = DpProblem::new(vec![descending, swap], vec![]);
        assert!(matches!(proc_embed(&bad).result, ResultDp::Failed));
    }

    #[test]
    fn cancellation_aborts_the_unfolding_processors() {
        let reg = Arc::new(SymbolRegistry::new());
        let f = reg.function("f", 1);
        let x = reg.fresh_var();
        let rule = TrsRule::new(
            Term::Fun(f, vec![Term::Var(x)]),
            Term::Fun(f, vec![Term::Var(x)]),
            0,
        );
        let problem = problem_of(vec![rule], &reg);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(
            proc_unfold_payet(&problem, &reg, &cancel).result,
            ResultDp::Failed
        ));
        assert!(matches!(
            proc_unfold_eeg12(&problem, &reg, &cancel).result,
            ResultDp::Failed
        ));
    }
}
