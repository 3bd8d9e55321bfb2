//! TRS dependency-pair triples and guided unfolding
//!
//! The unfolding search works on triples of three shapes, represented as one
//! tagged variant with a shared payload:
//!
//! - **unit** `(N, ∅, L)` — a single pair searched for a direct loop;
//! - **transitory** `(N, S, L)` — a pair still attached to its SCC `S`,
//!   expanded either to a unit triple (when `L` is not a simple cycle of the
//!   ambient TRS) or to composed triples, one per SCC member;
//! - **composed** `(N::N', S, L)` — a two-rule candidate for the
//!   recurrent-pair construction.
//!
//! `elim` prunes triples that cannot contribute (too deep, left embeds
//! right, or right not connectable back to left). Unfolding is *guided*: the
//! disagreement positions between the sides pick where to narrow, non-variable
//! positions first, descending only afterwards. Forward steps narrow the
//! right side with a rule's left-hand side; backward steps narrow the left
//! side with a rule's right-hand side.

#![forbid(unsafe_code)]

use crate::dpgraph::{connectable, is_simple_cycle};
use crate::pattern::groundify;
use crate::program::{TraceId, TrsRule};
use crate::symbols::SymbolRegistry;
use crate::term::{Position, Term};
use crate::unify::{self, disagreement_positions};
use crate::witness::{RecurrentPairTrs, Witness};
use crate::CancelToken;

/// Fields shared by every triple shape.
#[derive(Clone, Debug)]
pub struct TriplePayload {
    /// The primary pair `N`.
    pub pair: TrsRule,
    pub iteration: usize,
    pub parent: Option<TraceId>,
}

/// A dependency-pair triple; the tag drives `elim`/`unfold`/the
/// nontermination test.
#[derive(Clone, Debug)]
pub enum DpTriple {
    Unit { payload: TriplePayload, cycle: Vec<TrsRule> },
    Transitory { payload: TriplePayload, scc: Vec<TrsRule>, cycle: Vec<TrsRule> },
    Composed { payload: TriplePayload, second: TrsRule, scc: Vec<TrsRule>, cycle: Vec<TrsRule> },
}

impl DpTriple {
    pub fn payload(&self) -> &TriplePayload {
        match self {
            DpTriple::Unit { payload, .. }
            | DpTriple::Transitory { payload, .. }
            | DpTriple::Composed { payload, .. } => payload,
        }
    }

    pub fn depth(&self) -> usize {
        self.payload().pair.depth()
    }

    /// `elim`: keep the triple for further unfolding?
    pub fn elim(&self, trs: &[TrsRule], max_depth: usize, reg: &SymbolRegistry) -> bool {
        match self {
            DpTriple::Unit { payload, .. } => {
                payload.pair.depth() <= max_depth
                    && !payload.pair.lhs.embeds(&payload.pair.rhs)
                    && connectable(&payload.pair, &payload.pair, trs, reg)
            }
            // Transitory and composed triples survive on depth alone; their
            // structure is consumed by expansion.
            _ => self.depth() <= max_depth,
        }
    }

    /// The per-shape nontermination test.
    pub fn non_termination_test(
        &self,
        trs: &[TrsRule],
        reg: &SymbolRegistry,
    ) -> Option<Witness> {
        match self {
            DpTriple::Unit { payload, .. } => shallow_left_unify(&payload.pair, reg),
            DpTriple::Composed { payload, second, .. } => {
                if let Some(w) = shallow_left_unify(&payload.pair, reg) {
                    return Some(w);
                }
                let rp = RecurrentPairTrs::try_build(&payload.pair, second, trs, reg)?;
                if payload.iteration == 0 {
                    Some(Witness::RecurrentPair(rp))
                } else {
                    // A pair assembled by unfolding steps reports with its
                    // derivation flavor.
                    Some(Witness::ArgumentRecurrentPairTrs {
                        start: rp.start_term().clone(),
                        detail: format!(
                            "recurrent pair reached after {} unfolding step(s)",
                            payload.iteration
                        ),
                    })
                }
            }
            DpTriple::Transitory { .. } => None,
        }
    }

    /// Expand a transitory triple; other shapes pass through unchanged.
    pub fn expand(&self, trs: &[TrsRule], reg: &SymbolRegistry) -> Vec<DpTriple> {
        match self {
            DpTriple::Transitory { payload, scc, cycle } => {
                if !is_simple_cycle(cycle, trs, reg) {
                    vec![DpTriple::Unit { payload: payload.clone(), cycle: cycle.clone() }]
                } else {
                    scc.iter()
                        .map(|second| DpTriple::Composed {
                            payload: payload.clone(),
                            second: second.clone(),
                            scc: scc.clone(),
                            cycle: cycle.clone(),
                        })
                        .collect()
                }
            }
            other => vec![other.clone()],
        }
    }

    /// Guided unfolding: narrow at the disagreement positions between the
    /// triple's sides, forwards (`F`) or backwards (`B`). With
    /// `unfold_variables` set, variable positions are narrowed too by
    /// instantiating the variable with the rule's side.
    pub fn unfold(
        &self,
        trs: &[TrsRule],
        reg: &SymbolRegistry,
        forward: bool,
        unfold_variables: bool,
        cancel: &CancelToken,
    ) -> Vec<DpTriple> {
        let payload = self.payload();
        let (guide_l, guide_r) = match self {
            DpTriple::Composed { payload, second, .. } => {
                (payload.pair.rhs.clone(), second.lhs.clone())
            }
            _ => (payload.pair.lhs.clone(), payload.pair.rhs.clone()),
        };
        let mut positions = disagreement_positions(&guide_l, &guide_r);
        // Non-variable positions first, then by ascending depth.
        positions.sort_by_key(|p| {
            let at_var = matches!(
                (guide_l.subterm(p), guide_r.subterm(p)),
                (Some(Term::Var(_)), _) | (_, Some(Term::Var(_)))
            );
            (at_var, p.len())
        });

        let mut out = Vec::new();
        for pos in &positions {
            if cancel.is_cancelled() {
                return out;
            }
            for rule in trs {
                let fresh = rule.deep_copy(reg);
                if forward {
                    if let Some(t) = narrow_forward(&payload.pair, pos, &fresh, unfold_variables) {
                        out.push(self.with_pair(t));
                    }
                } else if let Some(t) =
                    narrow_backward(&payload.pair, pos, &fresh, unfold_variables)
                {
                    out.push(self.with_pair(t));
                }
            }
            // Instantiation step: unify the two sides' subterms outright when
            // both descend to this position.
            if let (Some(a), Some(b)) = (
                payload.pair.lhs.subterm(pos),
                payload.pair.rhs.subterm(pos),
            ) {
                if let Some(theta) = unify::unify(a, b) {
                    let pair = TrsRule::new(
                        theta.apply(&payload.pair.lhs),
                        theta.apply(&payload.pair.rhs),
                        payload.pair.num,
                    );
                    out.push(self.with_pair(pair));
                }
            }
        }
        reg.note_generated_rules(out.len() as u64);
        out
    }

    fn with_pair(&self, pair: TrsRule) -> DpTriple {
        let payload = TriplePayload {
            pair,
            iteration: self.payload().iteration + 1,
            parent: self.payload().parent,
        };
        match self {
            DpTriple::Unit { cycle, .. } => {
                DpTriple::Unit { payload, cycle: cycle.clone() }
            }
            DpTriple::Transitory { scc, cycle, .. } => {
                DpTriple::Transitory { payload, scc: scc.clone(), cycle: cycle.clone() }
            }
            DpTriple::Composed { second, scc, cycle, .. } => DpTriple::Composed {
                payload,
                second: second.clone(),
                scc: scc.clone(),
                cycle: cycle.clone(),
            },
        }
    }
}

/// Loop check: the right side an instance of the left means the pair rewrites
/// a term into a larger instance of itself forever.
fn shallow_left_unify(pair: &TrsRule, reg: &SymbolRegistry) -> Option<Witness> {
    unify::match_terms(&pair.lhs, &pair.rhs)?;
    Some(Witness::ArgumentGeneralized {
        start: groundify(&pair.lhs, reg),
        detail: "shallow left-unification: the right-hand side instantiates the left".into(),
    })
}

/// `F`: narrow `rhs|pos` with `rule.lhs`, rewriting it to `rule.rhs`.
fn narrow_forward(
    pair: &TrsRule,
    pos: &Position,
    rule: &TrsRule,
    unfold_variables: bool,
) -> Option<TrsRule> {
    let sub = pair.rhs.subterm(pos)?;
    if matches!(sub, Term::Var(_)) && !unfold_variables {
        return None;
    }
    let theta = unify::unify(sub, &rule.lhs)?;
    let replaced = pair.rhs.replace_at(pos, &rule.rhs)?;
    Some(TrsRule::new(theta.apply(&pair.lhs), theta.apply(&replaced), pair.num))
}

/// `B`: narrow `lhs|pos` with `rule.rhs`, rewriting it back to `rule.lhs`.
fn narrow_backward(
    pair: &TrsRule,
    pos: &Position,
    rule: &TrsRule,
    unfold_variables: bool,
) -> Option<TrsRule> {
    let sub = pair.lhs.subterm(pos)?;
    if matches!(sub, Term::Var(_)) && !unfold_variables {
        return None;
    }
    let theta = unify::unify(sub, &rule.rhs)?;
    let replaced = pair.lhs.replace_at(pos, &rule.lhs)?;
    Some(TrsRule::new(theta.apply(&replaced), theta.apply(&pair.rhs), pair.num))
}

/// Seed triples for a DP problem: each SCC pair becomes a transitory triple
/// carrying its component.
pub fn seed_triples(pairs: &[TrsRule], scc: &[TrsRule]) -> Vec<DpTriple> {
    pairs
        .iter()
        .map(|p| DpTriple::Transitory {
            payload: TriplePayload { pair: p.clone(), iteration: 0, parent: None },
            scc: scc.to_vec(),
            cycle: scc.to_vec(),
        })
        .collect()
}
