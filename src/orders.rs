//! Reduction orders: LPO and KBO
//!
//! Both orders are used as reduction pairs by the finiteness processors: the
//! ambient rules must orient weakly, every dependency pair at least weakly,
//! and the strictly decreasing pairs are removed from the DP problem.
//!
//! The LPO search runs a classical recursive-path-order *completion*: the
//! precedence starts empty and `f > g` facts are added on demand, rejecting
//! any addition that would close a cycle. The KBO search infers one natural
//! weight per symbol (constant polynomials with a bounded domain) plus the
//! variable weight, enforcing admissibility, and enumerates assignments with
//! per-coefficient upper bound 1 or 2 as chosen by the problem-size
//! threshold.

#![forbid(unsafe_code)]

use std::collections::HashMap;

use crate::program::TrsRule;
use crate::symbols::SymId;
use crate::term::Term;

/// Symbol count beyond which KBO weight inference refuses to enumerate.
pub const KBO_MAX_SYMBOLS: usize = 12;
/// Problem size (pairs + rules) at which the coefficient bound drops to 1.
pub const KBO_SIZE_THRESHOLD: usize = 24;

// ============================================================================
// Precedence
// ============================================================================

/// A strict partial order on symbols, maintained transitively closed.
#[derive(Clone, Debug, Default)]
pub struct Precedence {
    greater: HashMap<SymId, Vec<SymId>>,
}

impl Precedence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gt(&self, f: SymId, g: SymId) -> bool {
        self.greater.get(&f).map_or(false, |v| v.contains(&g))
    }

    /// Add `f > g` unless it would close a cycle; returns whether the fact
    /// holds afterwards.
    pub fn add(&mut self, f: SymId, g: SymId) -> bool {
        if f == g || self.gt(g, f) {
            return false;
        }
        if self.gt(f, g) {
            return true;
        }
        // Transitive closure: everything above f dominates everything below g.
        let below_g: Vec<SymId> = {
            let mut v = vec![g];
            v.extend(self.greater.get(&g).cloned().unwrap_or_default());
            v
        };
        let above_f: Vec<SymId> = {
            let mut v = vec![f];
            for (h, dom) in &self.greater {
                if dom.contains(&f) {
                    v.push(*h);
                }
            }
            v
        };
        for &h in &above_f {
            let entry = self.greater.entry(h).or_default();
            for &l in &below_g {
                if !entry.contains(&l) {
                    entry.push(l);
                }
            }
        }
        true
    }
}

// ============================================================================
// LPO
// ============================================================================

/// `s >_lpo t` under `prec`, completing the precedence on demand.
pub fn lpo_gt(s: &Term, t: &Term, prec: &mut Precedence) -> bool {
    match (s, t) {
        (Term::Var(_), _) | (Term::Hole(_), _) => false,
        (_, Term::Var(v)) => s.contains_var(*v),
        (Term::Fun(f, ss), Term::Fun(g, ts)) => {
            // (1) some argument of s already dominates t.
            if ss.iter().any(|si| si == t || lpo_gt(si, t, prec)) {
                return true;
            }
            if f == g {
                // (3) lexicographic descent plus domination of every t-arg.
                let mut strict = false;
                for (a, b) in ss.iter().zip(ts) {
                    if a == b {
                        continue;
                    }
                    strict = lpo_gt(a, b, prec);
                    break;
                }
                strict && ts.iter().all(|tj| tj == s || lpo_gt(s, tj, prec))
            } else {
                // (2) f > g (added to the completion when consistent) and s
                // dominates every argument of t.
                let mut speculative = prec.clone();
                if !speculative.add(*f, *g) {
                    return false;
                }
                if ts.iter().all(|tj| lpo_gt(s, tj, &mut speculative)) {
                    *prec = speculative;
                    true
                } else {
                    false
                }
            }
        }
        _ => false,
    }
}

/// Weak LPO: equality or strict descent.
pub fn lpo_ge(s: &Term, t: &Term, prec: &mut Precedence) -> bool {
    s == t || lpo_gt(s, t, prec)
}

/// Orient a DP problem with LPO: all rules weakly, all pairs weakly, at
/// least one pair strictly. Returns the completed precedence and the strict
/// pair indices.
pub fn lpo_strict_pairs(
    pairs: &[TrsRule],
    rules: &[TrsRule],
) -> Option<(Precedence, Vec<usize>)> {
    let mut prec = Precedence::new();
    for r in rules {
        if !lpo_ge(&r.lhs, &r.rhs, &mut prec) {
            return None;
        }
    }
    let mut strict = Vec::new();
    for (i, p) in pairs.iter().enumerate() {
        if lpo_gt(&p.lhs, &p.rhs, &mut prec) {
            strict.push(i);
        } else if p.lhs != p.rhs {
            return None;
        }
    }
    if strict.is_empty() {
        return None;
    }
    Some((prec, strict))
}

// ============================================================================
// KBO
// ============================================================================

/// An admissible KBO model: per-symbol weights plus the variable weight.
#[derive(Clone, Debug)]
pub struct KboModel {
    pub weights: HashMap<SymId, u64>,
    pub w0: u64,
    pub prec: Precedence,
}

impl KboModel {
    fn weight(&self, t: &Term) -> u64 {
        match t {
            Term::Var(_) => self.w0,
            Term::Hole(_) => 0,
            Term::Fun(f, args) => {
                self.weights.get(f).copied().unwrap_or(1)
                    + args.iter().map(|a| self.weight(a)).sum::<u64>()
            }
            Term::Hat(h) => self.weights.get(&h.sym).copied().unwrap_or(1) + self.weight(&h.arg),
        }
    }

    /// `s >_kbo t`.
    pub fn gt(&self, s: &Term, t: &Term) -> bool {
        // Variable condition: s must carry every variable at least as often.
        let mut counts: HashMap<crate::symbols::VarId, i64> = HashMap::new();
        for v in term_var_occurrences(s) {
            *counts.entry(v).or_default() += 1;
        }
        for v in term_var_occurrences(t) {
            *counts.entry(v).or_default() -= 1;
        }
        if counts.values().any(|&c| c < 0) {
            return false;
        }
        let (ws, wt) = (self.weight(s), self.weight(t));
        if ws > wt {
            return true;
        }
        if ws < wt {
            return false;
        }
        match (s, t) {
            // Equal weight: f^k(x) > x for a unary maximal symbol.
            (Term::Fun(_, _), Term::Var(v)) => s.contains_var(*v),
            (Term::Fun(f, ss), Term::Fun(g, ts)) => {
                if f != g {
                    return self.prec.gt(*f, *g);
                }
                for (a, b) in ss.iter().zip(ts) {
                    if a == b {
                        continue;
                    }
                    return self.gt(a, b);
                }
                false
            }
            _ => false,
        }
    }

    pub fn ge(&self, s: &Term, t: &Term) -> bool {
        s == t || self.gt(s, t)
    }
}

fn term_var_occurrences(t: &Term) -> Vec<crate::symbols::VarId> {
    let mut out = Vec::new();
    let mut stack = vec![t];
    while let Some(cur) = stack.pop() {
        match cur {
            Term::Var(v) => out.push(*v),
            Term::Fun(_, args) => stack.extend(args.iter()),
            Term::Hat(h) => stack.push(&h.arg),
            Term::Hole(_) => {}
        }
    }
    out
}

fn symbols_of(rules: &[TrsRule]) -> Vec<SymId> {
    let mut out = Vec::new();
    for r in rules {
        for t in [&r.lhs, &r.rhs] {
            for (_, sub) in t.positions() {
                match sub {
                    Term::Fun(f, _) => out.push(*f),
                    Term::Hat(h) => out.push(h.sym),
                    _ => {}
                }
            }
        }
    }
    out.sort_unstable();
    out.dedup();
    out
}

fn symbol_arity(sym: SymId, rules: &[TrsRule]) -> usize {
    for r in rules {
        for t in [&r.lhs, &r.rhs] {
            for (_, sub) in t.positions() {
                if let Term::Fun(f, args) = sub {
                    if *f == sym {
                        return args.len();
                    }
                }
            }
        }
    }
    0
}

/// Search an admissible KBO orienting rules weakly and pairs weakly with at
/// least one strict pair, enumerating weights in `0..=upper` (`w0 = 1`).
/// `None` also covers the "too many weights" exhaustion case.
pub fn kbo_strict_pairs(
    pairs: &[TrsRule],
    rules: &[TrsRule],
    upper: u64,
) -> Option<(KboModel, Vec<usize>)> {
    let mut all: Vec<TrsRule> = rules.to_vec();
    all.extend(pairs.iter().cloned());
    let syms = symbols_of(&all);
    if syms.is_empty() || syms.len() > KBO_MAX_SYMBOLS {
        return None;
    }
    let w0 = 1u64;
    let n = syms.len();
    let radix = upper + 1;
    let mut assignment = vec![0u64; n];
    loop {
        let weights: HashMap<SymId, u64> =
            syms.iter().copied().zip(assignment.iter().copied()).collect();
        if admissible(&weights, w0, &all) {
            // Derive a precedence lazily from the weight ties on pair roots.
            let mut model = KboModel { weights, w0, prec: Precedence::new() };
            complete_precedence(&mut model, &all);
            if let Some(strict) = orient_with(&model, pairs, rules) {
                return Some((model, strict));
            }
        }
        // Next assignment in the bounded grid.
        let mut i = 0;
        loop {
            if i == n {
                return None;
            }
            assignment[i] += 1;
            if assignment[i] < radix {
                break;
            }
            assignment[i] = 0;
            i += 1;
        }
    }
}

/// Admissibility: `w0 ≠ 0`, constants weigh at least `w0`, and a unary
/// symbol of weight 0 must dominate every other symbol.
fn admissible(weights: &HashMap<SymId, u64>, w0: u64, rules: &[TrsRule]) -> bool {
    if w0 == 0 {
        return false;
    }
    let mut zero_unary = 0usize;
    for (&sym, &w) in weights {
        let arity = symbol_arity(sym, rules);
        if arity == 0 && w < w0 {
            return false;
        }
        if arity == 1 && w == 0 {
            zero_unary += 1;
        }
    }
    // At most one weight-0 unary symbol can sit at the top of the precedence.
    zero_unary <= 1
}

fn complete_precedence(model: &mut KboModel, rules: &[TrsRule]) {
    // A weight-0 unary symbol must be maximal.
    let syms = symbols_of(rules);
    for &f in &syms {
        if symbol_arity(f, rules) == 1 && model.weights.get(&f) == Some(&0) {
            for &g in &syms {
                if g != f {
                    model.prec.add(f, g);
                }
            }
        }
    }
    // Greedy: orient remaining root ties by first use.
    for r in rules {
        if let (Term::Fun(f, _), Term::Fun(g, _)) = (&r.lhs, &r.rhs) {
            if f != g && model.weight(&r.lhs) == model.weight(&r.rhs) {
                model.prec.add(*f, *g);
            }
        }
    }
}

fn orient_with(model: &KboModel, pairs: &[TrsRule], rules: &[TrsRule]) -> Option<Vec<usize>> {
    for r in rules {
        if !model.ge(&r.lhs, &r.rhs) {
            return None;
        }
    }
    let mut strict = Vec::new();
    for (i, p) in pairs.iter().enumerate() {
        if model.gt(&p.lhs, &p.rhs) {
            strict.push(i);
        } else if !model.ge(&p.lhs, &p.rhs) {
            return None;
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
    fn precedence_rejects_cycles() {
        let reg = SymbolRegistry::new();
        let f = reg.function("f", 1);
        let g = reg.function("g", 1);
        let h = reg.function("h", 1);
        let mut p = Precedence::new();
        assert!(p.add(f, g));
        assert!(p.add(g, h));
        assert!(p.gt(f, h), "transitive closure expected");
        assert!(!p.add(h, f), "cycle must be rejected");
    }

    #[test]
    fn lpo_orients_the_distribution_rule() {
        // g(f(x)) > f(g(x)) with g > f found by completion.
        let reg = SymbolRegistry::new();
        let f = reg.function("f", 1);
        let g = reg.function("g", 1);
        let x = reg.fresh_var();
        let lhs = Term::Fun(g, vec![Term::Fun(f, vec![Term::Var(x)])]);
        let rhs = Term::Fun(f, vec![Term::Fun(g, vec![Term::Var(x)])]);
        let mut prec = Precedence::new();
        assert!(lpo_gt(&lhs, &rhs, &mut prec));
        assert!(prec.gt(g, f));
    }

    #[test]
    fn lpo_strict_orientation_covers_pairs() {
        let reg = SymbolRegistry::new();
        let f = reg.function("f", 1);
        let g = reg.function("g", 1);
        let gs = reg.sharp(g);
        let x = reg.fresh_var();
        let rule = TrsRule::new(
            Term::Fun(g, vec![Term::Fun(f, vec![Term::Var(x)])]),
            Term::Fun(f, vec![Term::Fun(g, vec![Term::Var(x)])]),
            0,
        );
        let pair = TrsRule::new(
            Term::Fun(gs, vec![Term::Fun(f, vec![Term::Var(x)])]),
            Term::Fun(gs, vec![Term::Var(x)]),
            0,
        );
        let (_, strict) =
            lpo_strict_pairs(std::slice::from_ref(&pair), std::slice::from_ref(&rule)).unwrap();
        assert_eq!(strict, vec![0]);
    }

    #[test]
    fn lpo_cannot_orient_a_swap() {
        let reg = SymbolRegistry::new();
        let f = reg.function("f", 2);
        let x = reg.fresh_var();
        let y = reg.fresh_var();
        let pair = TrsRule::new(
            Term::Fun(f, vec![Term::Var(x), Term::Var(y)]),
            Term::Fun(f, vec![Term::Var(y), Term::Var(x)]),
            0,
        );
        assert!(lpo_strict_pairs(std::slice::from_ref(&pair), &[]).is_none());
    }

    #[test]
    fn kbo_weighs_a_size_decrease() {
        // f#(s(x)) → f#(x): strict by weight with any positive s-weight.
        let reg = SymbolRegistry::new();
        let fs = reg.function("f#", 1);
        let s = reg.function("s", 1);
        let x = reg.fresh_var();
        let pair = TrsRule::new(
            Term::Fun(fs, vec![Term::Fun(s, vec![Term::Var(x)])]),
            Term::Fun(fs, vec![Term::Var(x)]),
            0,
        );
        let (model, strict) =
            kbo_strict_pairs(std::slice::from_ref(&pair), &[], 1).unwrap();
        assert_eq!(strict, vec![0]);
        assert!(model.gt(&pair.lhs, &pair.rhs));
    }

    #[test]
    fn kbo_variable_condition_blocks_duplication() {
        // f#(x) → g#(x, x) duplicates x; no KBO can orient it strictly.
        let reg = SymbolRegistry::new();
        let fs = reg.function("f#", 1);
        let gs = reg.function("g#", 2);
        let x = reg.fresh_var();
        let pair = TrsRule::new(
            Term::Fun(fs, vec![Term::Var(x)]),
            Term::Fun(gs, vec![Term::Var(x), Term::Var(x)]),
            0,
        );
        assert!(kbo_strict_pairs(std::slice::from_ref(&pair), &[], 2).is_none());
    }

    #[test]
    fn kbo_upper_two_succeeds_where_one_fails() {
        // Pair f#(s(x)) → f#(p(x, a)) with rule p(a, a) → a. The constant a
        // weighs at least w0 = 1, so a strict weight drop needs
        // w(s) > w(p) + w(a) ≥ 1, which the bound-1 grid cannot provide.
        let reg = SymbolRegistry::new();
        let fs = reg.function("f#", 1);
        let s = reg.function("s", 1);
        let p = reg.function("p", 2);
        let a = reg.function("a", 0);
        let x = reg.fresh_var();
        let ac = Term::Fun(a, vec![]);
        let pair = TrsRule::new(
            Term::Fun(fs, vec![Term::Fun(s, vec![Term::Var(x)])]),
            Term::Fun(fs, vec![Term::Fun(p, vec![Term::Var(x), ac.clone()])]),
            0,
        );
        let rule = TrsRule::new(Term::Fun(p, vec![ac.clone(), ac.clone()]), ac, 0);
        assert!(kbo_strict_pairs(
            std::slice::from_ref(&pair),
            std::slice::from_ref(&rule),
            1
        )
        .is_none());
        assert!(kbo_strict_pairs(
            std::slice::from_ref(&pair),
            std::slice::from_ref(&rule),
            2
        )
        .is_some());
    }
}
