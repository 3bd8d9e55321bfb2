//! Substitution algebra
//!
//! A [`Subst`] is an ordered finite map from variables to terms. Application
//! is leftmost-outermost and never fails; the engine never assumes
//! idempotence (`θ(θ(t))` equals `θ(t)` only when `θ` happens to be
//! idempotent). Self-maps `x ↦ x` are tolerated but unproductive.
//!
//! The operations follow the usual contracts:
//! `compose` is `x ↦ η(θ(x))` extended by `η` outside `dom(θ)`, `union_with`
//! requires agreement on the shared domain, `commutes_with` checks pointwise
//! commutation, and `is_more_general_than` searches for a witness `ρ` with
//! `ρ∘θ ≡ η`.

#![forbid(unsafe_code)]

use std::collections::HashMap;

use crate::symbols::{SymbolRegistry, VarId};
use crate::term::{HatTerm, Term};

/// Errors surfaced by substitution combination.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SubstError {
    #[error("incompatible bindings for a shared variable")]
    Incompatible,
}

/// Ordered finite map variable → term.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Subst {
    pairs: Vec<(VarId, Term)>,
    index: HashMap<VarId, usize>,
}

impl Subst {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn singleton(v: VarId, t: Term) -> Self {
        let mut s = Self::new();
        s.bind(v, t);
        s
    }

    /// Insert or overwrite a binding, preserving first-insertion order.
    pub fn bind(&mut self, v: VarId, t: Term) {
        match self.index.get(&v) {
            Some(&i) => self.pairs[i].1 = t,
            None => {
                self.index.insert(v, self.pairs.len());
                self.pairs.push((v, t));
            }
        }
    }

    #[inline]
    pub fn get(&self, v: VarId) -> Option<&Term> {
        self.index.get(&v).map(|&i| &self.pairs[i].1)
    }

    #[inline]
    pub fn contains(&self, v: VarId) -> bool {
        self.index.contains_key(&v)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Bindings in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, &Term)> {
        self.pairs.iter().map(|(v, t)| (*v, t))
    }

    /// Domain in insertion order.
    pub fn domain(&self) -> impl Iterator<Item = VarId> + '_ {
        self.pairs.iter().map(|(v, _)| *v)
    }

    /// A binding is *productive* when it is not a self-map.
    pub fn is_productive(&self, v: VarId) -> bool {
        matches!(self.get(v), Some(t) if *t != Term::Var(v))
    }

    /// Apply leftmost-outermost. Variables outside the domain are unchanged;
    /// on functions and hat functions application maps over children (the
    /// exponent-adjusting form lives with the pattern engine).
    pub fn apply(&self, t: &Term) -> Term {
        match t {
            Term::Var(v) => self.get(*v).cloned().unwrap_or_else(|| t.clone()),
            Term::Hole(_) => t.clone(),
            Term::Fun(f, args) => Term::Fun(*f, args.iter().map(|a| self.apply(a)).collect()),
            Term::Hat(h) => Term::Hat(HatTerm { arg: Box::new(self.apply(&h.arg)), ..h.clone() }),
        }
    }

    /// In-place variant of [`Subst::apply`]. Never fails.
    pub fn apply_in_place(&self, t: &mut Term) {
        *t = self.apply(t);
    }

    /// `compose(η)`: `x ↦ η(θ(x))` on `dom(θ)`, extended by `η` on
    /// `dom(η) \ dom(θ)`. Never fails.
    pub fn compose(&self, eta: &Subst) -> Subst {
        let mut out = Subst::new();
        for (v, t) in self.iter() {
            out.bind(v, eta.apply(t));
        }
        for (v, t) in eta.iter() {
            if !self.contains(v) {
                out.bind(v, t.clone());
            }
        }
        out
    }

    /// `θ ∪ η` when the two agree on every shared variable, else
    /// [`SubstError::Incompatible`].
    pub fn union_with(&self, eta: &Subst) -> Result<Subst, SubstError> {
        for (v, t) in eta.iter() {
            if let Some(mine) = self.get(v) {
                if mine != t {
                    return Err(SubstError::Incompatible);
                }
            }
        }
        let mut out = self.clone();
        for (v, t) in eta.iter() {
            if !out.contains(v) {
                out.bind(v, t.clone());
            }
        }
        Ok(out)
    }

    /// True iff `θ(η(x)) ≡ η(θ(x))` for every variable touched by either map.
    pub fn commutes_with(&self, eta: &Subst) -> bool {
        let mut vars: Vec<VarId> = self.domain().chain(eta.domain()).collect();
        for (_, t) in self.iter().chain(eta.iter()) {
            vars.extend(t.vars());
        }
        vars.sort_unstable();
        vars.dedup();
        vars.into_iter().all(|v| {
            let x = Term::Var(v);
            self.apply(&eta.apply(&x)) == eta.apply(&self.apply(&x))
        })
    }

    /// True iff there is a `ρ` with `ρ∘θ ≡ η` on `dom(θ) ∪ dom(η)`. The
    /// witness is accumulated into `rho` (which may already carry bindings
    /// that constrain the search).
    pub fn is_more_general_than(&self, eta: &Subst, rho: &mut Subst) -> bool {
        let mut vars: Vec<VarId> = self.domain().chain(eta.domain()).collect();
        vars.sort_unstable();
        vars.dedup();
        for v in vars {
            let x = Term::Var(v);
            let mine = self.apply(&x);
            let theirs = eta.apply(&x);
            if !crate::unify::match_extend(&mine, &theirs, rho) {
                return false;
            }
        }
        true
    }

    /// Rename keys and values through the variable renaming `rho`.
    pub fn rename_with(&self, rho: &HashMap<VarId, VarId>) -> Subst {
        let rename_term = |t: &Term| -> Term {
            let mut s = Subst::new();
            for (&from, &to) in rho {
                s.bind(from, Term::Var(to));
            }
            s.apply(t)
        };
        let mut out = Subst::new();
        for (v, t) in self.iter() {
            let key = rho.get(&v).copied().unwrap_or(v);
            out.bind(key, rename_term(t));
        }
        out
    }

    /// Keep only the bindings for `vars`.
    pub fn restricted_to(&self, vars: &[VarId]) -> Subst {
        let mut out = Subst::new();
        for (v, t) in self.iter() {
            if vars.contains(&v) {
                out.bind(v, t.clone());
            }
        }
        out
    }

    /// Private-namespace copy: fresh variable for every variable appearing in
    /// keys or values, consistently via `copies`.
    pub fn deep_copy(&self, reg: &SymbolRegistry, copies: &mut HashMap<VarId, VarId>) -> Subst {
        let mut out = Subst::new();
        for (v, t) in self.iter() {
            let key = *copies.entry(v).or_insert_with(|| reg.fresh_var());
            out.bind(key, t.deep_copy(reg, copies));
        }
        out
    }

    /// True iff every binding maps a variable to a variable, injectively.
    pub fn is_variable_renaming(&self) -> bool {
        let mut seen = Vec::new();
        for (_, t) in self.iter() {
            match t {
                Term::Var(w) => {
                    if seen.contains(w) {
                        return false;
                    }
                    seen.push(*w);
                }
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolRegistry;

    fn setup() -> (SymbolRegistry, VarId, VarId, VarId) {
        let reg = SymbolRegistry::new();
        let x = reg.fresh_var();
        let y = reg.fresh_var();
        let z = reg.fresh_var();
        (reg, x, y, z)
    }

    #[test]
    fn apply_leaves_foreign_terms_alone() {
        let (reg, x, y, _) = setup();
        let f = reg.function("f", 1);
        let theta = Subst::singleton(x, Term::Var(y));
        let t = Term::Fun(f, vec![Term::Var(y)]);
        assert_eq!(theta.apply(&t), t);
    }

    #[test]
    fn compose_applies_right_to_left() {
        let (reg, x, y, z) = setup();
        let f = reg.function("f", 1);
        let theta = Subst::singleton(x, Term::Fun(f, vec![Term::Var(y)]));
        let eta = Subst::singleton(y, Term::Var(z));
        let comp = theta.compose(&eta);
        assert_eq!(comp.apply(&Term::Var(x)), Term::Fun(f, vec![Term::Var(z)]));
        // η extends the composition outside dom(θ).
        assert_eq!(comp.apply(&Term::Var(y)), Term::Var(z));
    }

    #[test]
    fn union_rejects_conflicting_bindings() {
        let (reg, x, _, _) = setup();
        let a = reg.function("a", 0);
        let b = reg.function("b", 0);
        let ta = Subst::singleton(x, Term::Fun(a, vec![]));
        let tb = Subst::singleton(x, Term::Fun(b, vec![]));
        assert_eq!(ta.union_with(&tb), Err(SubstError::Incompatible));
        assert!(ta.union_with(&ta).is_ok());
    }

    #[test]
    fn commutation_on_disjoint_ground_bindings() {
        let (reg, x, y, _) = setup();
        let a = reg.function("a", 0);
        let b = reg.function("b", 0);
        let ta = Subst::singleton(x, Term::Fun(a, vec![]));
        let tb = Subst::singleton(y, Term::Fun(b, vec![]));
        assert!(ta.commutes_with(&tb));
    }

    #[test]
    fn commutation_fails_on_interference() {
        let (reg, x, y, _) = setup();
        let a = reg.function("a", 0);
        let theta = Subst::singleton(x, Term::Var(y));
        let eta = Subst::singleton(y, Term::Fun(a, vec![]));
        // θ(η(x)) = y but η(θ(x)) = a.
        assert!(!theta.commutes_with(&eta));
    }

    #[test]
    fn more_general_finds_a_witness() {
        let (reg, x, y, _) = setup();
        let f = reg.function("f", 1);
        let a = reg.function("a", 0);
        let theta = Subst::singleton(x, Term::Fun(f, vec![Term::Var(y)]));
        let eta = Subst::singleton(x, Term::Fun(f, vec![Term::Fun(a, vec![])]));
        let mut rho = Subst::new();
        assert!(theta.is_more_general_than(&eta, &mut rho));
        assert_eq!(rho.apply(&Term::Var(y)), Term::Fun(a, vec![]));
        // Never the other way around.
        let mut back = Subst::new();
        assert!(!eta.is_more_general_than(&theta, &mut back));
    }

    #[test]
    fn rename_touches_keys_and_values() {
        let (reg, x, y, z) = setup();
        let _ = reg;
        let theta = Subst::singleton(x, Term::Var(y));
        let mut rho = HashMap::new();
        rho.insert(x, z);
        let renamed = theta.rename_with(&rho);
        assert_eq!(renamed.get(z), Some(&Term::Var(y)));
        assert!(!renamed.contains(x));
    }

    #[test]
    fn self_maps_are_tolerated() {
        let (_, x, _, _) = setup();
        let mut s = Subst::new();
        s.bind(x, Term::Var(x));
        assert!(!s.is_productive(x));
        assert_eq!(s.apply(&Term::Var(x)), Term::Var(x));
    }
}
