//! EEG'12 pattern-rule narrowing for TRS
//!
//! A pattern rule here is `s σ^n μ → t σ^n μ`: one pumping substitution `σ`
//! and one closing substitution `μ` shared by both sides. Rewrite rules seed
//! pattern rules with empty substitutions; *pattern creation* turns a rule
//! whose right side instantiates its left into a genuinely pumping rule.
//!
//! Narrowing chains one rule's right side into another rule's left side at a
//! non-variable position. Every binding of the connecting mgu is classified
//! (steps 1a–1e) by whether its variable lies in a pumping or closing
//! domain, both sides are then normalized so pumping and closing agree
//! pointwise on the relevant variables (Lemma 4 + Lemma 6 unions), and (VI)
//! assembles the narrowed rule.
//!
//! Nontermination is detected by Theorem 8 with the source's exact heuristic
//! bounds: `m ∈ {1,…,THEOREM8_M_RANGE}` and shift `b ≤ THEOREM8_MAX_SHIFT`.

#![forbid(unsafe_code)]

use crate::pattern::groundify;
use crate::program::TrsRule;
use crate::subst::Subst;
use crate::symbols::SymbolRegistry;
use crate::term::Term;
use crate::unify;
use crate::witness::Witness;
use crate::CancelToken;

/// Theorem 8 searches `σ^m` for `m` in `1..=THEOREM8_M_RANGE`.
pub const THEOREM8_M_RANGE: u64 = 2;
/// Theorem 8 compares `σ^b(s)` against subterms for `b` in
/// `0..=THEOREM8_MAX_SHIFT`.
pub const THEOREM8_MAX_SHIFT: u64 = 4;

/// `s σ^n μ → t σ^n μ`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EegRule {
    pub lhs: Term,
    pub rhs: Term,
    pub sigma: Subst,
    pub mu: Subst,
}

impl EegRule {
    /// Seed: a plain rewrite rule with empty pumping and closing.
    pub fn seed(rule: &TrsRule) -> EegRule {
        EegRule {
            lhs: rule.lhs.clone(),
            rhs: rule.rhs.clone(),
            sigma: Subst::new(),
            mu: Subst::new(),
        }
    }

    /// Pattern creation: when the right side instantiates the left via `θ`,
    /// the rule pumps by `θ` itself.
    pub fn pattern_create(&self) -> Option<EegRule> {
        let theta = unify::match_terms(&self.lhs, &self.rhs)?;
        if theta.is_empty() || theta.is_variable_renaming() {
            return None;
        }
        Some(EegRule {
            lhs: self.lhs.clone(),
            rhs: self.rhs.clone(),
            sigma: theta,
            mu: self.mu.clone(),
        })
    }

    /// Domain variables of either substitution.
    fn domain_vars(&self) -> Vec<crate::symbols::VarId> {
        let mut vs: Vec<_> = self.sigma.domain().chain(self.mu.domain()).collect();
        vs.sort_unstable();
        vs.dedup();
        vs
    }

    /// Apply `σ^b` to a term.
    fn pump(&self, t: &Term, b: u64) -> Term {
        let mut out = t.clone();
        for _ in 0..b {
            out = self.sigma.apply(&out);
        }
        out
    }
}

/// Narrow `first`'s right side into `second`'s left side at every
/// non-variable position, producing the (VI)-assembled rules.
pub fn narrow(
    first: &EegRule,
    second: &EegRule,
    reg: &SymbolRegistry,
    cancel: &CancelToken,
) -> Vec<EegRule> {
    let mut out = Vec::new();
    let mut copies = std::collections::HashMap::new();
    let second_lhs = second.lhs.deep_copy(reg, &mut copies);
    let second_rhs = second.rhs.deep_copy(reg, &mut copies);
    let second_sigma = second.sigma.deep_copy(reg, &mut copies);
    let second_mu = second.mu.deep_copy(reg, &mut copies);

    for (pos, sub) in first.rhs.positions() {
        if cancel.is_cancelled() {
            break;
        }
        if matches!(sub, Term::Var(_)) {
            continue;
        }
        let Some(theta) = unify::unify(sub, &second_lhs) else { continue };

        // Steps 1a–1e: classify every binding of the connecting mgu.
        let mut closing_ext = Subst::new();
        let mut admissible = true;
        for (x, s) in theta.iter() {
            let in_first = first.sigma.is_productive(x) || first.mu.contains(x);
            let in_second = second_sigma.is_productive(x) || second_mu.contains(x);
            let s_touches_domain = s
                .vars()
                .iter()
                .any(|v| first.sigma.is_productive(*v) || second_sigma.is_productive(*v));
            if first.sigma.is_productive(x) || second_sigma.is_productive(x) {
                // 1b/1c: a pumped variable may only be renamed, never bound
                // to structure.
                if !matches!(s, Term::Var(_)) {
                    admissible = false;
                    break;
                }
            } else if !in_first && !in_second && !s_touches_domain {
                // 1a: fresh on both sides.
                closing_ext.bind(x, s.clone());
            } else {
                // 1d/1e: closing-domain variable; fold into the closing
                // extension and let the union below arbitrate.
                closing_ext.bind(x, s.clone());
            }
        }
        if !admissible {
            continue;
        }

        // Steps 2–3: normalize. Pumping and closing substitutions of both
        // sides must union cleanly and commute on the relevant variables.
        let Ok(sigma) = first.sigma.union_with(&second_sigma) else { continue };
        let Ok(mu0) = first.mu.union_with(&second_mu) else { continue };
        let Ok(mu) = mu0.union_with(&closing_ext) else { continue };
        if !sigma.commutes_with(&mu) {
            continue;
        }

        // (VI): assemble the narrowed rule.
        let Some(replaced) = first.rhs.replace_at(&pos, &second_rhs) else { continue };
        let narrowed = EegRule {
            lhs: theta.apply(&first.lhs),
            rhs: theta.apply(&replaced),
            sigma,
            mu,
        };
        reg.note_generated_rules(1);
        out.push(narrowed);
    }
    out
}

/// Theorem 8: the pattern rule is nonterminating when some subterm of `t`
/// is reached from `s` by pumping, with a commuting more-generality witness.
pub fn theorem8(rule: &EegRule, reg: &SymbolRegistry) -> Option<Witness> {
    for (pos, sub) in rule.rhs.positions() {
        let Some(sigma_t) = unify::match_terms(&rule.lhs, sub) else { continue };
        for m in 1..=THEOREM8_M_RANGE {
            let mut sigma_m = Subst::new();
            let vars = rule.domain_vars();
            for v in &vars {
                sigma_m.bind(*v, rule.pump(&Term::Var(*v), m));
            }
            let mut witness = Subst::new();
            if !sigma_m.is_more_general_than(&sigma_t, &mut witness) {
                continue;
            }
            if !witness.commutes_with(&rule.sigma) {
                continue;
            }
            for b in 0..=THEOREM8_MAX_SHIFT {
                if rule.pump(&rule.lhs, b) == *sub {
                    let start = groundify(&rule.mu.apply(&rule.lhs), reg);
                    return Some(Witness::ArgumentEeg12 {
                        start,
                        detail: format!(
                            "EEG'12 Theorem 8 with m = {m}, b = {b} at position {pos}"
                        ),
                    });
                }
            }
        }
    }
    None
}
