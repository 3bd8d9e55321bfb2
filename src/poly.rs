//! Polynomial interpretations
//!
//! Each symbol is mapped to a linear polynomial in its arguments with
//! natural coefficients, following the Giesl RTA'95 scheme: monotonicity
//! (every partial derivative ≥ 0), the subterm property (`P_f ≥ xi`), and
//! constants at least the domain minimum `μ`. A rule `l → r` is oriented by
//! reducing `P_l − P_r`: the variable coefficients must not go negative
//! (`diff1`), and the constant part, with every remaining variable replaced
//! by `μ`, decides weak versus strict (`diff2`).

#![forbid(unsafe_code)]

use std::collections::HashMap;

use crate::program::TrsRule;
use crate::symbols::{SymId, VarId};
use crate::term::Term;

/// Domain minimum: interpretations range over `{μ, μ+1, …}`.
pub const POLY_MU: u64 = 1;
/// Per-coefficient upper bound in the enumeration.
pub const POLY_COEFF_UPPER: u64 = 2;
/// Enumeration cap; beyond it the processor reports exhaustion.
pub const POLY_MAX_ASSIGNMENTS: u64 = 5000;

/// `P_f(x1,…,xn) = c0 + c1·x1 + … + cn·xn` per symbol.
#[derive(Clone, Debug)]
pub struct PolyModel {
    coeffs: HashMap<SymId, Vec<u64>>,
}

/// A term's value as a linear polynomial over its variables.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinPoly {
    pub constant: u64,
    pub vars: HashMap<VarId, u64>,
}

impl PolyModel {
    pub fn eval(&self, t: &Term) -> LinPoly {
        match t {
            Term::Var(v) => LinPoly { constant: 0, vars: HashMap::from([(*v, 1)]) },
            Term::Hole(_) => LinPoly::default(),
            Term::Hat(h) => self.eval(&h.arg),
            Term::Fun(f, args) => {
                let cs = self.coeffs.get(f).cloned().unwrap_or_default();
                let mut out = LinPoly {
                    constant: cs.first().copied().unwrap_or(0),
                    vars: HashMap::new(),
                };
                for (i, a) in args.iter().enumerate() {
                    let ci = cs.get(i + 1).copied().unwrap_or(1);
                    let sub = self.eval(a);
                    out.constant += ci * sub.constant;
                    for (v, c) in sub.vars {
                        *out.vars.entry(v).or_default() += ci * c;
                    }
                }
                out
            }
        }
    }

    /// `diff1`/`diff2` reduction; `Some(strict)` when `l ≥ r` holds for all
    /// valuations over the domain, with `strict` marking `l > r`.
    pub fn orients(&self, l: &Term, r: &Term) -> Option<bool> {
        let pl = self.eval(l);
        let pr = self.eval(r);
        // diff1: variable coefficients must not go negative.
        let mut slack = 0u64;
        for (v, &cr) in &pr.vars {
            let cl = pl.vars.get(v).copied().unwrap_or(0);
            if cl < cr {
                return None;
            }
        }
        for (v, &cl) in &pl.vars {
            let cr = pr.vars.get(v).copied().unwrap_or(0);
            slack += (cl - cr) * POLY_MU;
        }
        // diff2: remaining variables at the domain minimum.
        let lhs = pl.constant + slack;
        if lhs >= pr.constant + 1 {
            Some(true)
        } else if lhs >= pr.constant {
            Some(false)
        } else {
            None
        }
    }
}

fn symbols_with_arity(rules: &[TrsRule]) -> Vec<(SymId, usize)> {
    let mut out: Vec<(SymId, usize)> = Vec::new();
    for rule in rules {
        for t in [&rule.lhs, &rule.rhs] {
            for (_, sub) in t.positions() {
                if let Term::Fun(f, args) = sub {
                    if !out.iter().any(|(g, _)| g == f) {
                        out.push((*f, args.len()));
                    }
                }
            }
        }
    }
    out.sort_by_key(|(f, _)| *f);
    out
}

/// Search a valid interpretation orienting rules weakly and every pair
/// weakly, with at least one strict pair. `None` covers both failure and
/// enumeration exhaustion.
pub fn poly_strict_pairs(
    pairs: &[TrsRule],
    rules: &[TrsRule],
) -> Option<(PolyModel, Vec<usize>)> {
    let mut all: Vec<TrsRule> = rules.to_vec();
    all.extend(pairs.iter().cloned());
    let syms = symbols_with_arity(&all);
    if syms.is_empty() {
        return None;
    }

    // Ranges: c0 ∈ {μ..=UPPER} for constants, {0..=UPPER} otherwise; every
    // argument coefficient in {1..=UPPER} (subterm property).
    let mut ranges: Vec<(u64, u64)> = Vec::new();
    for &(_, arity) in &syms {
        if arity == 0 {
            ranges.push((POLY_MU, POLY_COEFF_UPPER));
        } else {
            ranges.push((0, POLY_COEFF_UPPER));
        }
        for _ in 0..arity {
            ranges.push((1, POLY_COEFF_UPPER));
        }
    }
    let mut total: u64 = 1;
    for &(lo, hi) in &ranges {
        total = total.saturating_mul(hi - lo + 1);
        if total > POLY_MAX_ASSIGNMENTS {
            return None;
        }
    }

    let mut assignment: Vec<u64> = ranges.iter().map(|&(lo, _)| lo).collect();
    loop {
        let model = build_model(&syms, &assignment);
        if let Some(strict) = orient_all(&model, pairs, rules) {
            return Some((model, strict));
        }
        // Advance the mixed-radix counter.
        let mut i = 0;
        loop {
            if i == assignment.len() {
                return None;
            }
            assignment[i] += 1;
            if assignment[i] <= ranges[i].1 {
                break;
            }
            assignment[i] = ranges[i].0;
            i += 1;
        }
    }
}

fn build_model(syms: &[(SymId, usize)], assignment: &[u64]) -> PolyModel {
    let mut coeffs = HashMap::new();
    let mut cursor = 0;
    for &(f, arity) in syms {
        let cs: Vec<u64> = assignment[cursor..cursor + arity + 1].to_vec();
        cursor += arity + 1;
        coeffs.insert(f, cs);
    }
    PolyModel { coeffs }
}

fn orient_all(model: &PolyModel, pairs: &[TrsRule], rules: &[TrsRule]) -> Option<Vec<usize>> {
    for r in rules {
        model.orients(&r.lhs, &r.rhs)?;
    }
    let mut strict = Vec::new();
    for (i, p) in pairs.iter().enumerate() {
        match model.orients(&p.lhs, &p.rhs)? {
            true => strict.push(i),
            false => {}
        }
    }
    if strict.is_empty() {
        return None;
    }
    Some(strict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::SymbolRegistry;

    #[test]
    fn size_decrease_is_oriented_strictly() {
        let reg = SymbolRegistry::new();
        let fs = reg.function("f#", 1);
        let s = reg.function("s", 1);
        let x = reg.fresh_var();
        let pair = TrsRule::new(
            Term::Fun(fs, vec![Term::Fun(s, vec![Term::Var(x)])]),
            Term::Fun(fs, vec![Term::Var(x)]),
            0,
        );
        let (model, strict) = poly_strict_pairs(std::slice::from_ref(&pair), &[]).unwrap();
        assert_eq!(strict, vec![0]);
        assert_eq!(model.orients(&pair.lhs, &pair.rhs), Some(true));
    }

    #[test]
    fn swap_has_no_strict_interpretation() {
        let reg = SymbolRegistry::new();
        let f = reg.function("f#", 2);
        let x = reg.fresh_var();
        let y = reg.fresh_var();
        let pair = TrsRule::new(
            Term::Fun(f, vec![Term::Var(x), Term::Var(y)]),
            Term::Fun(f, vec![Term::Var(y), Term::Var(x)]),
            0,
        );
        assert!(poly_strict_pairs(std::slice::from_ref(&pair), &[]).is_none());
    }

    #[test]
    fn variable_coefficients_catch_duplication() {
        let reg = SymbolRegistry::new();
        let f = reg.function("f#", 1);
        let g = reg.function("g", 2);
        let x = reg.fresh_var();
        // f#(x) → f#(g(x, x)) duplicates x on the right.
        let pair = TrsRule::new(
            Term::Fun(f, vec![Term::Var(x)]),
            Term::Fun(f, vec![Term::Fun(g, vec![Term::Var(x), Term::Var(x)])]),
            0,
        );
        assert!(poly_strict_pairs(std::slice::from_ref(&pair), &[]).is_none());
    }

    #[test]
    fn evaluation_is_linear() {
        let reg = SymbolRegistry::new();
        let s = reg.function("s", 1);
        let x = reg.fresh_var();
        let model = PolyModel { coeffs: HashMap::from([(s, vec![1, 1])]) };
        let p = model.eval(&Term::Fun(s, vec![Term::Fun(s, vec![Term::Var(x)])]));
        assert_eq!(p.constant, 2);
        assert_eq!(p.vars.get(&x), Some(&1));
    }

    #[test]
    fn oversized_signature_bails_out() {
        let reg = SymbolRegistry::new();
        let x = reg.fresh_var();
        // Ten binary symbols exceed the assignment cap by construction.
        let mut rules = Vec::new();
        for i in 0..10 {
            let f = reg.function(&format!("f{i}"), 2);
            rules.push(TrsRule::new(
                Term::Fun(f, vec![Term::Var(x), Term::Var(x)]),
                Term::Var(x),
                i,
            ));
        }
        assert!(poly_strict_pairs(&rules, &[]).is_none());
    }
}
