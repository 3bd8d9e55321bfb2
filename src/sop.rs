//! Sets of Positions and the DN conditions
//!
//! A Set-of-Positions (SoP) `τ` maps each predicate symbol to a fixed-length
//! boolean array marking the argument positions that may be *disregarded*
//! when a binary-rule sequence is checked for a loop; predicates absent from
//! the map are "not in domain". `τ` is *DN* (derivation neutral) for the
//! sequence when it satisfies DN1–DN4:
//!
//! - **DN1** (no pair-position redundancy): a disregarded head argument is a
//!   variable occurring exactly once in its head.
//! - **DN2** (left-more-general-match): for consecutive rules, the body of
//!   `Ri` is τ-more-general than the head of `Ri+1`.
//! - **DN3** (τ-more-general): the last body is τ-more-general than the
//!   first head, closing the cycle.
//! - **DN4** (no forbidden variable sharing): the variable at a disregarded
//!   head position never reappears at a kept position of the same rule's
//!   body.
//!
//! The constructor seeds every predicate with all positions disregarded and
//! shrinks the arrays until DN1/DN4 reach a fixpoint (each pass only removes
//! positions, so the fixpoint exists); DN2/DN3 are then verified on the
//! result. τ-more-generality compares the **kept** positions only, under a
//! single matching substitution.

#![forbid(unsafe_code)]

use std::collections::HashMap;

use crate::program::LpRule;
use crate::subst::Subst;
use crate::symbols::SymId;
use crate::term::Term;
use crate::unify;

/// `τ`: per-predicate disregarded-position arrays.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SetOfPositions {
    arrays: HashMap<SymId, Box<[bool]>>,
}

impl SetOfPositions {
    /// Build the largest SoP satisfying DN1–DN4 for the binary sequence, or
    /// `None` when even the shrunken fixpoint violates DN2/DN3. Every rule
    /// must be binary.
    pub fn dn_for(rules: &[LpRule]) -> Option<SetOfPositions> {
        if rules.is_empty() || rules.iter().any(|r| !r.is_binary()) {
            return None;
        }
        let mut sop = SetOfPositions::default();
        for r in rules {
            for atom in std::iter::once(&r.head).chain(r.body.iter()) {
                if let Term::Fun(p, args) = atom {
                    sop.arrays
                        .entry(*p)
                        .or_insert_with(|| vec![true; args.len()].into_boxed_slice());
                }
            }
        }

        // Shrink to the DN1/DN4 fixpoint.
        loop {
            let mut changed = false;
            for r in rules {
                changed |= sop.enforce_neutrality(r);
            }
            if !changed {
                break;
            }
        }

        // DN2 along the chain, DN3 closing it.
        for w in rules.windows(2) {
            if !sop.tau_more_general(&w[0].body[0], &w[1].head) {
                return None;
            }
        }
        let last = rules.last()?;
        if !sop.tau_more_general(&last.body[0], &rules[0].head) {
            return None;
        }
        Some(sop)
    }

    /// The disregarded-position array of `p`, or `None` when `p` is not in
    /// domain.
    pub fn disregarded(&self, p: SymId) -> Option<&[bool]> {
        self.arrays.get(&p).map(|a| a.as_ref())
    }

    /// Is position `i` of `p` disregarded by `τ`?
    pub fn drops(&self, p: SymId, i: usize) -> bool {
        self.disregarded(p).map_or(false, |a| a.get(i).copied().unwrap_or(false))
    }

    /// `b` is τ-more-general than `h`: same predicate, and one substitution
    /// maps every **kept** argument of `b` onto the corresponding one of `h`.
    pub fn tau_more_general(&self, b: &Term, h: &Term) -> bool {
        let (Term::Fun(p, ba), Term::Fun(q, ha)) = (b, h) else { return false };
        if p != q || ba.len() != ha.len() {
            return false;
        }
        let Some(arr) = self.disregarded(*p) else { return false };
        let mut theta = Subst::new();
        for i in 0..ba.len() {
            let dropped = arr.get(i).copied().unwrap_or(false);
            if !dropped && !unify::match_extend(&ba[i], &ha[i], &mut theta) {
                return false;
            }
        }
        true
    }

    /// DN1 + DN4 for one rule: a disregarded head position must hold a
    /// variable that occurs once in the head (DN1) and does not reappear at
    /// a kept body position (DN4). Offending positions are kept instead.
    fn enforce_neutrality(&mut self, rule: &LpRule) -> bool {
        let Term::Fun(hp, hargs) = &rule.head else { return false };
        let Term::Fun(bp, bargs) = &rule.body[0] else { return false };
        let Some(harr) = self.arrays.get(hp).cloned() else { return false };
        let barr = self.arrays.get(bp).cloned();

        let kept_body_vars: Vec<_> = bargs
            .iter()
            .enumerate()
            .filter(|(i, _)| {
                !barr.as_ref().map_or(false, |a| a.get(*i).copied().unwrap_or(false))
            })
            .flat_map(|(_, a)| a.vars())
            .collect();

        let mut next = harr.clone();
        let mut changed = false;
        for (i, arg) in hargs.iter().enumerate() {
            if !next[i] {
                continue;
            }
            let neutral = match arg {
                Term::Var(v) => {
                    rule.head.count_var(*v) == 1 && !kept_body_vars.contains(v)
                }
                _ => false,
            };
            if !neutral {
                next[i] = false;
                changed = true;
            }
        }
        if changed {
            self.arrays.insert(*hp, next);
        }
        changed
    }

    /// Predicates in domain.
    pub fn domain(&self) -> impl Iterator<Item = SymId> + '_ {
        self.arrays.keys().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolRegistry;

    /// `p([X|Xs],[Y|Ys]) :- p(Xs,Ys).` — the classic self-loop shape.
    fn looping_rule(reg: &SymbolRegistry) -> LpRule {
        let p = reg.function("p", 2);
        let cons = reg.function(".", 2);
        let x = reg.fresh_var();
        let xs = reg.fresh_var();
        let y = reg.fresh_var();
        let ys = reg.fresh_var();
        let head = Term::Fun(
            p,
            vec![
                Term::Fun(cons, vec![Term::Var(x), Term::Var(xs)]),
                Term::Fun(cons, vec![Term::Var(y), Term::Var(ys)]),
            ],
        );
        let body = Term::Fun(p, vec![Term::Var(xs), Term::Var(ys)]);
        LpRule::new(head, vec![body], 0)
    }

    #[test]
    fn structured_heads_keep_every_position() {
        let reg = SymbolRegistry::new();
        let rule = looping_rule(&reg);
        let sop = SetOfPositions::dn_for(std::slice::from_ref(&rule)).unwrap();
        let p = reg.lookup("p", 2).unwrap();
        // Cons cells are not neutral, so nothing is disregarded; the loop
        // still closes because the body is fully more general.
        assert_eq!(sop.disregarded(p), Some(&[false, false][..]));
        assert!(sop.tau_more_general(&rule.body[0], &rule.head));
    }

    #[test]
    fn duplicated_head_variable_is_not_neutral() {
        let reg = SymbolRegistry::new();
        let p = reg.function("p", 2);
        let x = reg.fresh_var();
        // p(X, X) :- p(X, X): DN1 rejects both positions, the identity match
        // still closes the cycle.
        let head = Term::Fun(p, vec![Term::Var(x), Term::Var(x)]);
        let rule = LpRule::new(head.clone(), vec![head.clone()], 0);
        let sop = SetOfPositions::dn_for(std::slice::from_ref(&rule)).unwrap();
        assert_eq!(sop.disregarded(p), Some(&[false, false][..]));
    }

    #[test]
    fn neutral_position_rescues_a_growing_argument() {
        let reg = SymbolRegistry::new();
        let p = reg.function("p", 2);
        let f = reg.function("f", 1);
        let g = reg.function("g", 1);
        let x = reg.fresh_var();
        let y = reg.fresh_var();
        // p(X, g(Y)) :- p(f(Y), g(Y)): position 0 grows under f but the head
        // variable X is neutral, so τ drops it and the loop closes on
        // position 1.
        let head = Term::Fun(p, vec![Term::Var(x), Term::Fun(g, vec![Term::Var(y)])]);
        let body = Term::Fun(
            p,
            vec![Term::Fun(f, vec![Term::Var(y)]), Term::Fun(g, vec![Term::Var(y)])],
        );
        let rule = LpRule::new(head, vec![body], 0);
        let sop = SetOfPositions::dn_for(std::slice::from_ref(&rule)).unwrap();
        assert_eq!(sop.disregarded(p), Some(&[true, false][..]));
    }

    #[test]
    fn non_matching_cycle_yields_none() {
        let reg = SymbolRegistry::new();
        let p = reg.function("p", 1);
        let a = reg.function("a", 0);
        let b = reg.function("b", 0);
        // p(a) :- p(b): the kept position never matches.
        let rule = LpRule::new(
            Term::Fun(p, vec![Term::Fun(a, vec![])]),
            vec![Term::Fun(p, vec![Term::Fun(b, vec![])])],
            0,
        );
        assert!(SetOfPositions::dn_for(std::slice::from_ref(&rule)).is_none());
    }

    #[test]
    fn two_rule_chain_checks_dn2_between_links() {
        let reg = SymbolRegistry::new();
        let p = reg.function("p", 1);
        let q = reg.function("q", 1);
        let x = reg.fresh_var();
        let y = reg.fresh_var();
        // p(X) :- q(X).  q(Y) :- p(Y).
        let r1 = LpRule::new(
            Term::Fun(p, vec![Term::Var(x)]),
            vec![Term::Fun(q, vec![Term::Var(x)])],
            0,
        );
        let r2 = LpRule::new(
            Term::Fun(q, vec![Term::Var(y)]),
            vec![Term::Fun(p, vec![Term::Var(y)])],
            1,
        );
        let sop = SetOfPositions::dn_for(&[r1.clone(), r2.clone()]).unwrap();
        assert!(sop.tau_more_general(&r1.body[0], &r2.head));
        assert!(sop.tau_more_general(&r2.body[0], &r1.head));
    }

    #[test]
    fn facts_are_rejected() {
        let reg = SymbolRegistry::new();
        let p = reg.function("p", 0);
        let fact = LpRule::new(Term::Fun(p, vec![]), vec![], 0);
        assert!(SetOfPositions::dn_for(std::slice::from_ref(&fact)).is_none());
    }
}
