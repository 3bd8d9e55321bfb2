//! Unification and matching
//!
//! Robinson-style unification with occurs check, one-sided matching, and the
//! disagreement-position enumeration used to direct guided unfolding. The
//! accumulated unifier is kept idempotent: binding `x ↦ t` first resolves `t`
//! through the bindings found so far and then folds the new binding back into
//! every stored range term.
//!
//! Hat functions unify only against hat functions with identical symbol and
//! exponents; the exponent-aware cases belong to the pattern engine.

#![forbid(unsafe_code)]

use crate::subst::Subst;
use crate::symbols::VarId;
use crate::term::{Position, Term};

/// Most general unifier of `s` and `t`, or `None`.
pub fn unify(s: &Term, t: &Term) -> Option<Subst> {
    let mut theta = Subst::new();
    unify_extend(s, t, &mut theta).then_some(theta)
}

/// Extend `theta` to a unifier of `s` and `t`. On failure `theta` may hold a
/// partial unifier and must be discarded by the caller.
pub fn unify_extend(s: &Term, t: &Term, theta: &mut Subst) -> bool {
    let s = theta.apply(s);
    let t = theta.apply(t);
    match (&s, &t) {
        (Term::Var(a), Term::Var(b)) if a == b => true,
        (Term::Var(v), other) | (other, Term::Var(v)) => bind(*v, other, theta),
        (Term::Hole(a), Term::Hole(b)) => a == b,
        (Term::Fun(f, fa), Term::Fun(g, ga)) => {
            f == g
                && fa.len() == ga.len()
                && fa.iter().zip(ga).all(|(a, b)| unify_extend(a, b, theta))
        }
        (Term::Hat(a), Term::Hat(b)) => {
            a.sym == b.sym
                && a.coeffs == b.coeffs
                && a.offset == b.offset
                && unify_extend(&a.arg, &b.arg, theta)
        }
        _ => false,
    }
}

fn bind(v: VarId, t: &Term, theta: &mut Subst) -> bool {
    if *t == Term::Var(v) {
        return true;
    }
    if t.contains_var(v) {
        return false;
    }
    // Fold the new binding into existing ranges to stay idempotent.
    let unit = Subst::singleton(v, t.clone());
    let folded: Vec<(VarId, Term)> = theta.iter().map(|(w, r)| (w, unit.apply(r))).collect();
    for (w, r) in folded {
        theta.bind(w, r);
    }
    theta.bind(v, t.clone());
    true
}

/// One-sided matching: find `θ` with `θ(pattern) ≡ target`, or `None`.
pub fn match_terms(pattern: &Term, target: &Term) -> Option<Subst> {
    let mut theta = Subst::new();
    match_extend(pattern, target, &mut theta).then_some(theta)
}

/// Extend `theta` to a match of `pattern` onto `target`.
pub fn match_extend(pattern: &Term, target: &Term, theta: &mut Subst) -> bool {
    match (pattern, target) {
        (Term::Var(v), _) => match theta.get(*v) {
            Some(bound) => bound == target,
            None => {
                theta.bind(*v, target.clone());
                true
            }
        },
        (Term::Hole(a), Term::Hole(b)) => a == b,
        (Term::Fun(f, fa), Term::Fun(g, ga)) => {
            f == g
                && fa.len() == ga.len()
                && fa.iter().zip(ga).all(|(a, b)| match_extend(a, b, theta))
        }
        (Term::Hat(a), Term::Hat(b)) => {
            a.sym == b.sym
                && a.coeffs == b.coeffs
                && a.offset == b.offset
                && match_extend(&a.arg, &b.arg, theta)
        }
        _ => false,
    }
}

/// A unifier that is a variable-to-variable bijection, when one exists.
pub fn variant_unifier(s: &Term, t: &Term) -> Option<Subst> {
    if !s.is_variant_of(t) {
        return None;
    }
    let theta = unify(s, t)?;
    theta.is_variable_renaming().then_some(theta)
}

/// All positions where `s` and `t` disagree at the top of their subterms.
///
/// Descends only through common structure, so every returned position is
/// valid in both terms.
pub fn disagreement_positions(s: &Term, t: &Term) -> Vec<Position> {
    let mut out = Vec::new();
    collect_disagreements(s, t, Position::root(), &mut out);
    out
}

fn collect_disagreements(s: &Term, t: &Term, at: Position, out: &mut Vec<Position>) {
    match (s, t) {
        (Term::Var(a), Term::Var(b)) if a == b => {}
        (Term::Hole(a), Term::Hole(b)) if a == b => {}
        (Term::Fun(f, fa), Term::Fun(g, ga)) if f == g && fa.len() == ga.len() => {
            for (i, (a, b)) in fa.iter().zip(ga).enumerate() {
                collect_disagreements(a, b, at.append(i), out);
            }
        }
        (Term::Hat(a), Term::Hat(b))
            if a.sym == b.sym && a.coeffs == b.coeffs && a.offset == b.offset =>
        {
            collect_disagreements(&a.arg, &b.arg, at.append(0), out);
        }
        _ => out.push(at),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolRegistry;

    #[test]
    fn unifier_equalizes_both_sides() {
        let reg = SymbolRegistry::new();
        let f = reg.function("f", 2);
        let a = reg.function("a", 0);
        let x = reg.fresh_var();
        let y = reg.fresh_var();
        let s = Term::Fun(f, vec![Term::Var(x), Term::Fun(a, vec![])]);
        let t = Term::Fun(f, vec![Term::Fun(a, vec![]), Term::Var(y)]);
        let theta = unify(&s, &t).unwrap();
        assert_eq!(theta.apply(&s), theta.apply(&t));
    }

    #[test]
    fn occurs_check_rejects_cyclic_solutions() {
        let reg = SymbolRegistry::new();
        let f = reg.function("f", 1);
        let x = reg.fresh_var();
        let s = Term::Var(x);
        let t = Term::Fun(f, vec![Term::Var(x)]);
        assert!(unify(&s, &t).is_none());
    }

    #[test]
    fn transitive_bindings_stay_idempotent() {
        let reg = SymbolRegistry::new();
        let f = reg.function("f", 2);
        let a = reg.function("a", 0);
        let x = reg.fresh_var();
        let y = reg.fresh_var();
        // f(x, x) =? f(y, a)  ⇒  x ↦ a, y ↦ a.
        let s = Term::Fun(f, vec![Term::Var(x), Term::Var(x)]);
        let t = Term::Fun(f, vec![Term::Var(y), Term::Fun(a, vec![])]);
        let theta = unify(&s, &t).unwrap();
        assert_eq!(theta.apply(&Term::Var(x)), Term::Fun(a, vec![]));
        assert_eq!(theta.apply(&Term::Var(y)), Term::Fun(a, vec![]));
    }

    #[test]
    fn matching_is_one_sided() {
        let reg = SymbolRegistry::new();
        let f = reg.function("f", 1);
        let a = reg.function("a", 0);
        let x = reg.fresh_var();
        let pat = Term::Fun(f, vec![Term::Var(x)]);
        let tgt = Term::Fun(f, vec![Term::Fun(a, vec![])]);
        assert!(match_terms(&pat, &tgt).is_some());
        assert!(match_terms(&tgt, &pat).is_none());
    }

    #[test]
    fn nonlinear_pattern_must_agree() {
        let reg = SymbolRegistry::new();
        let f = reg.function("f", 2);
        let a = reg.function("a", 0);
        let b = reg.function("b", 0);
        let x = reg.fresh_var();
        let pat = Term::Fun(f, vec![Term::Var(x), Term::Var(x)]);
        let good = Term::Fun(f, vec![Term::Fun(a, vec![]), Term::Fun(a, vec![])]);
        let bad = Term::Fun(f, vec![Term::Fun(a, vec![]), Term::Fun(b, vec![])]);
        assert!(match_terms(&pat, &good).is_some());
        assert!(match_terms(&pat, &bad).is_none());
    }

    #[test]
    fn variant_unifier_is_a_renaming() {
        let reg = SymbolRegistry::new();
        let f = reg.function("f", 2);
        let x = reg.fresh_var();
        let y = reg.fresh_var();
        let u = reg.fresh_var();
        let v = reg.fresh_var();
        let s = Term::Fun(f, vec![Term::Var(x), Term::Var(y)]);
        let t = Term::Fun(f, vec![Term::Var(u), Term::Var(v)]);
        let theta = variant_unifier(&s, &t).unwrap();
        assert!(theta.is_variable_renaming());
    }

    #[test]
    fn disagreements_point_at_differing_subterms() {
        let reg = SymbolRegistry::new();
        let f = reg.function("f", 2);
        let g = reg.function("g", 1);
        let a = reg.function("a", 0);
        let b = reg.function("b", 0);
        let s = Term::Fun(f, vec![Term::Fun(a, vec![]), Term::Fun(g, vec![Term::Fun(a, vec![])])]);
        let t = Term::Fun(f, vec![Term::Fun(b, vec![]), Term::Fun(g, vec![Term::Fun(b, vec![])])]);
        let ps = disagreement_positions(&s, &t);
        assert_eq!(
            ps,
            vec![Position::from_indices([0]), Position::from_indices([1, 0])]
        );
    }

    #[test]
    fn equal_terms_have_no_disagreements() {
        let reg = SymbolRegistry::new();
        let a = reg.function("a", 0);
        let t = Term::Fun(a, vec![]);
        assert!(disagreement_positions(&t, &t).is_empty());
    }
}
