//! First-order terms, positions, and context towers
//!
//! A [`Term`] is a variable, a function application, a hat function, or a
//! transient hole. Hat functions `f^{a1,…,al;b}(t)` stand for the lazy family
//! `{ c^{a1·n1+…+al·nl+b}(t) | ni ∈ ℕ }` where `c` is the 1-context carried
//! by the hat symbol; as a term, a hat function always has exactly one child.
//!
//! Equality is structural with **identity equality on variables**: two
//! variables are the same term iff they carry the same [`VarId`]. Deep copies
//! therefore allocate a fresh variable for every source variable and never
//! share structure with the source.
//!
//! Positions are finite sequences of child indices. Out-of-range access
//! returns `None` rather than failing.

#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};

use crate::symbols::{SymId, SymbolRegistry, VarId};

/// A hat-function node: exponents `coeffs = (a1,…,al)`, offset `b`, one child.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HatTerm {
    /// The hat symbol, whose registry entry carries the 1-context.
    pub sym: SymId,
    /// Pumping coefficients `a1,…,al` with `l > 0`.
    pub coeffs: Vec<u64>,
    /// Constant offset `b`.
    pub offset: u64,
    /// The embedded term.
    pub arg: Box<Term>,
}

/// First-order term.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Term {
    /// Identity-based variable.
    Var(VarId),
    /// `f(t1,…,ta)` with `a = arity(f)`.
    Fun(SymId, Vec<Term>),
    /// `f^{a1,…,al;b}(t)`.
    Hat(HatTerm),
    /// Named placeholder used transiently when synthesizing contexts.
    Hole(u32),
}

impl Term {
    /// Number of children as a term (hat functions always have one).
    pub fn child_count(&self) -> usize {
        match self {
            Term::Var(_) | Term::Hole(_) => 0,
            Term::Fun(_, args) => args.len(),
            Term::Hat(_) => 1,
        }
    }

    /// Child at index `i`, if in range.
    pub fn child(&self, i: usize) -> Option<&Term> {
        match self {
            Term::Var(_) | Term::Hole(_) => None,
            Term::Fun(_, args) => args.get(i),
            Term::Hat(h) => (i == 0).then(|| h.arg.as_ref()),
        }
    }

    /// Subterm at `pos`, or `None` when some index is out of range.
    pub fn subterm(&self, pos: &Position) -> Option<&Term> {
        let mut cur = self;
        for &i in pos.iter() {
            cur = cur.child(i)?;
        }
        Some(cur)
    }

    /// Replace the subterm at `pos` with `replacement`. `None` when `pos` is
    /// out of range.
    pub fn replace_at(&self, pos: &Position, replacement: &Term) -> Option<Term> {
        fn go(t: &Term, path: &[usize], replacement: &Term) -> Option<Term> {
            let Some((&i, rest)) = path.split_first() else {
                return Some(replacement.clone());
            };
            match t {
                Term::Fun(f, args) => {
                    if i >= args.len() {
                        return None;
                    }
                    let mut out = args.clone();
                    out[i] = go(&args[i], rest, replacement)?;
                    Some(Term::Fun(*f, out))
                }
                Term::Hat(h) if i == 0 => {
                    let arg = go(&h.arg, rest, replacement)?;
                    Some(Term::Hat(HatTerm { arg: Box::new(arg), ..h.clone() }))
                }
                _ => None,
            }
        }
        go(self, pos.as_slice(), replacement)
    }

    /// All positions of `self` in pre-order, paired with their subterms.
    pub fn positions(&self) -> Vec<(Position, &Term)> {
        let mut out = Vec::new();
        let mut stack = vec![(Position::root(), self)];
        while let Some((pos, t)) = stack.pop() {
            for i in (0..t.child_count()).rev() {
                if let Some(c) = t.child(i) {
                    stack.push((pos.append(i), c));
                }
            }
            out.push((pos, t));
        }
        out
    }

    /// Term depth: a variable or constant has depth 0.
    pub fn depth(&self) -> usize {
        match self {
            Term::Var(_) | Term::Hole(_) => 0,
            Term::Fun(_, args) => {
                1 + args.iter().map(Term::depth).max().unwrap_or(0)
            }
            Term::Hat(h) => 1 + h.arg.depth(),
        }
    }

    /// Variables of the term, in first-occurrence order.
    pub fn vars(&self) -> Vec<VarId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        self.visit(&mut |t| {
            if let Term::Var(v) = t {
                if seen.insert(*v) {
                    out.push(*v);
                }
            }
        });
        out
    }

    /// True when the term contains no variables (holes are ground).
    pub fn is_ground(&self) -> bool {
        let mut ground = true;
        self.visit(&mut |t| {
            if matches!(t, Term::Var(_)) {
                ground = false;
            }
        });
        ground
    }

    /// Largest symbol arity occurring anywhere in the term.
    pub fn max_arity(&self) -> usize {
        let mut m = 0;
        self.visit(&mut |t| {
            if let Term::Fun(_, args) = t {
                m = m.max(args.len());
            }
        });
        m
    }

    /// Does `v` occur in the term?
    pub fn contains_var(&self, v: VarId) -> bool {
        self.count_var(v) > 0
    }

    /// Number of occurrences of `v`.
    pub fn count_var(&self, v: VarId) -> usize {
        let mut n = 0;
        self.visit(&mut |t| {
            if matches!(t, Term::Var(w) if *w == v) {
                n += 1;
            }
        });
        n
    }

    fn visit(&self, f: &mut impl FnMut(&Term)) {
        let mut stack = vec![self];
        while let Some(t) = stack.pop() {
            f(t);
            match t {
                Term::Fun(_, args) => stack.extend(args.iter()),
                Term::Hat(h) => stack.push(&h.arg),
                _ => {}
            }
        }
    }

    /// Rewrite every occurrence of the variable `hole` to the canonical hole
    /// placeholder, producing the α-normal form of a 1-context.
    pub fn canonicalize_hole(&self, hole: VarId) -> Term {
        match self {
            Term::Var(v) if *v == hole => Term::Hole(0),
            Term::Var(_) | Term::Hole(_) => self.clone(),
            Term::Fun(f, args) => {
                Term::Fun(*f, args.iter().map(|a| a.canonicalize_hole(hole)).collect())
            }
            Term::Hat(h) => Term::Hat(HatTerm {
                arg: Box::new(h.arg.canonicalize_hole(hole)),
                ..h.clone()
            }),
        }
    }

    /// Plug `filler` into every canonical hole of a context.
    pub fn plug(&self, filler: &Term) -> Term {
        match self {
            Term::Hole(_) => filler.clone(),
            Term::Var(_) => self.clone(),
            Term::Fun(f, args) => Term::Fun(*f, args.iter().map(|a| a.plug(filler)).collect()),
            Term::Hat(h) => {
                Term::Hat(HatTerm { arg: Box::new(h.arg.plug(filler)), ..h.clone() })
            }
        }
    }

    /// Deep copy with a private variable namespace: every source variable is
    /// replaced by a fresh one, recorded in `copies` so related terms copied
    /// with the same map stay consistently renamed.
    pub fn deep_copy(&self, reg: &SymbolRegistry, copies: &mut HashMap<VarId, VarId>) -> Term {
        match self {
            Term::Var(v) => {
                let fresh = *copies.entry(*v).or_insert_with(|| reg.fresh_var());
                Term::Var(fresh)
            }
            Term::Hole(_) => self.clone(),
            Term::Fun(f, args) => {
                Term::Fun(*f, args.iter().map(|a| a.deep_copy(reg, copies)).collect())
            }
            Term::Hat(h) => Term::Hat(HatTerm {
                arg: Box::new(h.arg.deep_copy(reg, copies)),
                ..h.clone()
            }),
        }
    }

    /// True iff the terms are equal up to a variable-to-variable bijection.
    pub fn is_variant_of(&self, other: &Term) -> bool {
        variant_seq(std::slice::from_ref(self), std::slice::from_ref(other))
    }
}

/// Variance over sequences: one bijection must cover every component, so
/// variable sharing across the sequence is respected.
pub fn variant_seq(a: &[Term], b: &[Term]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut fwd = HashMap::new();
    let mut bwd = HashMap::new();
    a.iter().zip(b).all(|(x, y)| variant_go(x, y, &mut fwd, &mut bwd))
}

fn variant_go(
    s: &Term,
    t: &Term,
    fwd: &mut HashMap<VarId, VarId>,
    bwd: &mut HashMap<VarId, VarId>,
) -> bool {
    match (s, t) {
        (Term::Var(a), Term::Var(b)) => {
            let f_ok = *fwd.entry(*a).or_insert(*b) == *b;
            let b_ok = *bwd.entry(*b).or_insert(*a) == *a;
            f_ok && b_ok
        }
        (Term::Hole(a), Term::Hole(b)) => a == b,
        (Term::Fun(f, fa), Term::Fun(g, ga)) => {
            f == g
                && fa.len() == ga.len()
                && fa.iter().zip(ga).all(|(x, y)| variant_go(x, y, fwd, bwd))
        }
        (Term::Hat(a), Term::Hat(b)) => {
            a.sym == b.sym
                && a.coeffs == b.coeffs
                && a.offset == b.offset
                && variant_go(&a.arg, &b.arg, fwd, bwd)
        }
        _ => false,
    }
}

impl Term {
    /// Homeomorphic embedding: does `self` embed `other` (`self ⊒_emb other`)?
    pub fn embeds(&self, other: &Term) -> bool {
        if self == other {
            return true;
        }
        // Diving: some child of self embeds other.
        let dives = (0..self.child_count())
            .filter_map(|i| self.child(i))
            .any(|c| c.embeds(other));
        if dives {
            return true;
        }
        // Coupling: same root, children embed pointwise.
        match (self, other) {
            (Term::Fun(f, fa), Term::Fun(g, ga)) => {
                f == g && fa.len() == ga.len() && fa.iter().zip(ga).all(|(a, b)| a.embeds(b))
            }
            (Term::Hat(a), Term::Hat(b)) => {
                a.sym == b.sym && a.coeffs == b.coeffs && a.offset == b.offset
                    && a.arg.embeds(&b.arg)
            }
            _ => false,
        }
    }

    /// Render with human-readable symbol names. Variables are named `A`,
    /// `B`, … by first occurrence, so a deep copy prints exactly like its
    /// original.
    pub fn render(&self, reg: &SymbolRegistry) -> String {
        let mut names = VarNames::default();
        self.render_with(reg, &mut names)
    }

    /// Render with a caller-supplied naming map, so several terms (a rule's
    /// head and body, say) share variable names.
    pub fn render_with(&self, reg: &SymbolRegistry, names: &mut VarNames) -> String {
        match self {
            Term::Var(v) => names.name_of(*v),
            Term::Hole(n) => format!("[]{n}"),
            Term::Fun(f, args) => {
                let name = reg.name(*f);
                if args.is_empty() {
                    name
                } else {
                    let inner: Vec<String> =
                        args.iter().map(|a| a.render_with(reg, names)).collect();
                    format!("{}({})", name, inner.join(","))
                }
            }
            Term::Hat(h) => {
                let coeffs: Vec<String> = h.coeffs.iter().map(|c| c.to_string()).collect();
                format!(
                    "{}{{{};{}}}({})",
                    reg.name(h.sym),
                    coeffs.join(","),
                    h.offset,
                    h.arg.render_with(reg, names)
                )
            }
        }
    }
}

/// First-occurrence variable naming: `A`, `B`, …, `Z`, `A1`, `B1`, ….
#[derive(Default)]
pub struct VarNames {
    seen: Vec<VarId>,
}

impl VarNames {
    fn name_of(&mut self, v: VarId) -> String {
        let idx = match self.seen.iter().position(|w| *w == v) {
            Some(i) => i,
            None => {
                self.seen.push(v);
                self.seen.len() - 1
            }
        };
        let letter = (b'A' + (idx % 26) as u8) as char;
        if idx < 26 {
            letter.to_string()
        } else {
            format!("{}{}", letter, idx / 26)
        }
    }
}

/// Expand `c^k(t)` where `c` is a canonical 1-context (hole = `Hole(0)`).
pub fn context_power(context: &Term, k: u64, t: &Term) -> Term {
    let mut out = t.clone();
    for _ in 0..k {
        out = context.plug(&out);
    }
    out
}

/// Peel the maximal context tower: the largest `k` with `s = c^k(r)`, and the
/// residual `r`. Returns `(0, s)` when `s` does not start with `c`.
pub fn tower_of_contexts(s: &Term, context: &Term) -> (u64, Term) {
    let mut k = 0u64;
    let mut cur = s.clone();
    loop {
        match strip_context_once(&cur, context) {
            Some(rest) => {
                k += 1;
                cur = rest;
            }
            None => return (k, cur),
        }
    }
}

/// If `s = c[r]` for exactly one hole filling, return `r`.
fn strip_context_once(s: &Term, context: &Term) -> Option<Term> {
    match context {
        Term::Hole(_) => Some(s.clone()),
        Term::Fun(f, cargs) => match s {
            Term::Fun(g, sargs) if f == g && cargs.len() == sargs.len() => {
                let mut filler: Option<Term> = None;
                for (c, sub) in cargs.iter().zip(sargs) {
                    if c.is_ground() && !contains_hole(c) {
                        if c != sub {
                            return None;
                        }
                    } else {
                        match strip_context_once(sub, c) {
                            Some(r) => {
                                if filler.is_some() {
                                    return None;
                                }
                                filler = Some(r);
                            }
                            None => return None,
                        }
                    }
                }
                filler
            }
            _ => None,
        },
        _ => None,
    }
}

/// Does a context term contain a hole?
pub fn contains_hole(t: &Term) -> bool {
    match t {
        Term::Hole(_) => true,
        Term::Var(_) => false,
        Term::Fun(_, args) => args.iter().any(contains_hole),
        Term::Hat(h) => contains_hole(&h.arg),
    }
}

// ============================================================================
// Positions
// ============================================================================

/// Persistent sequence of child indices addressing a subterm.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Position(Vec<usize>);

impl Position {
    /// The empty (root) position.
    #[inline]
    pub fn root() -> Self {
        Position(Vec::new())
    }

    pub fn from_indices(ix: impl IntoIterator<Item = usize>) -> Self {
        Position(ix.into_iter().collect())
    }

    /// New position with `i` appended.
    pub fn append(&self, i: usize) -> Self {
        let mut v = self.0.clone();
        v.push(i);
        Position(v)
    }

    /// New position with `i` prepended.
    pub fn add_first(&self, i: usize) -> Self {
        let mut v = Vec::with_capacity(self.0.len() + 1);
        v.push(i);
        v.extend_from_slice(&self.0);
        Position(v)
    }

    /// Alias of [`Position::append`], kept for symmetry with `add_first`.
    #[inline]
    pub fn add_last(&self, i: usize) -> Self {
        self.append(i)
    }

    /// The position without its final index, or `None` at the root.
    pub fn proper_prefix(&self) -> Option<Position> {
        if self.0.is_empty() {
            None
        } else {
            Some(Position(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    /// Is `self` a (not necessarily proper) prefix of `other`?
    pub fn is_prefix_of(&self, other: &Position) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, usize> {
        self.0.iter()
    }

    #[inline]
    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            return write!(f, "ε");
        }
        let parts: Vec<String> = self.0.iter().map(|i| i.to_string()).collect();
        write!(f, "{}", parts.join("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg() -> SymbolRegistry {
        SymbolRegistry::new()
    }

    #[test]
    fn subterm_access_and_out_of_range() {
        let r = reg();
        let f = r.function("f", 2);
        let a = r.function("a", 0);
        let x = r.fresh_var();
        let t = Term::Fun(f, vec![Term::Var(x), Term::Fun(a, vec![])]);
        assert_eq!(t.subterm(&Position::from_indices([0])), Some(&Term::Var(x)));
        assert_eq!(t.subterm(&Position::from_indices([2])), None);
        assert_eq!(t.subterm(&Position::from_indices([1, 0])), None);
    }

    #[test]
    fn positions_enumerate_preorder() {
        let r = reg();
        let f = r.function("f", 2);
        let x = r.fresh_var();
        let y = r.fresh_var();
        let t = Term::Fun(f, vec![Term::Var(x), Term::Var(y)]);
        let ps: Vec<Position> = t.positions().into_iter().map(|(p, _)| p).collect();
        assert_eq!(
            ps,
            vec![
                Position::root(),
                Position::from_indices([0]),
                Position::from_indices([1])
            ]
        );
    }

    #[test]
    fn deep_copy_renames_every_variable_and_stays_equal_in_shape() {
        let r = reg();
        let f = r.function("f", 2);
        let x = r.fresh_var();
        let t = Term::Fun(f, vec![Term::Var(x), Term::Var(x)]);
        let mut copies = HashMap::new();
        let c = t.deep_copy(&r, &mut copies);
        assert!(t.is_variant_of(&c));
        for v in c.vars() {
            assert!(!t.contains_var(v));
        }
        // Shared source variables stay shared in the copy.
        assert_eq!(c.vars().len(), 1);
    }

    #[test]
    fn variant_requires_a_bijection() {
        let r = reg();
        let f = r.function("f", 2);
        let x = r.fresh_var();
        let y = r.fresh_var();
        let z = r.fresh_var();
        let s = Term::Fun(f, vec![Term::Var(x), Term::Var(x)]);
        let t = Term::Fun(f, vec![Term::Var(y), Term::Var(z)]);
        assert!(!s.is_variant_of(&t));
        let u = Term::Fun(f, vec![Term::Var(y), Term::Var(y)]);
        assert!(s.is_variant_of(&u));
    }

    #[test]
    fn context_tower_recognition() {
        let r = reg();
        let s = r.function("s", 1);
        let zero = r.function("0", 0);
        let ctx = Term::Fun(s, vec![Term::Hole(0)]);
        let t = context_power(&ctx, 3, &Term::Fun(zero, vec![]));
        let (k, residual) = tower_of_contexts(&t, &ctx);
        assert_eq!(k, 3);
        assert_eq!(residual, Term::Fun(zero, vec![]));
    }

    #[test]
    fn tower_of_zero_when_context_absent() {
        let r = reg();
        let s = r.function("s", 1);
        let zero = r.function("0", 0);
        let ctx = Term::Fun(s, vec![Term::Hole(0)]);
        let t = Term::Fun(zero, vec![]);
        let (k, residual) = tower_of_contexts(&t, &ctx);
        assert_eq!(k, 0);
        assert_eq!(residual, t);
    }

    #[test]
    fn embedding_accepts_subterm_and_coupling() {
        let r = reg();
        let f = r.function("f", 1);
        let g = r.function("g", 1);
        let x = r.fresh_var();
        let inner = Term::Fun(g, vec![Term::Var(x)]);
        assert!(Term::Fun(f, vec![inner.clone()]).embeds(&inner));
        assert!(inner.embeds(&Term::Var(x)));
        assert!(!Term::Var(x).embeds(&inner));
    }

    #[test]
    fn position_prefix_algebra() {
        let p = Position::from_indices([1, 2]);
        assert_eq!(p.proper_prefix(), Some(Position::from_indices([1])));
        assert!(Position::from_indices([1]).is_prefix_of(&p));
        assert_eq!(p.add_first(0), Position::from_indices([0, 1, 2]));
        assert_eq!(p.add_last(3), Position::from_indices([1, 2, 3]));
        assert_eq!(Position::root().proper_prefix(), None);
    }
}
