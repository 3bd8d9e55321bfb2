//! Pattern terms and the α-threshold machinery
//!
//! A pattern substitution is a tuple `(σ1,…,σl, μ)` of *pumping*
//! substitutions plus one *closing* substitution; a pattern term `(t, θ)`
//! denotes the family `p(n1,…,nl) = μ(σl^nl(…σ1^n1(t)…))`. The normalized
//! subclass [`SimplePatternTerm`] rewrites every mapped variable to either a
//! plain term or a single hat function `c^{a1,…,al;b}(t)`; the factory
//! rejects unconstructible instances.
//!
//! The central computation is the **α-threshold** of a pattern rule
//! `p → q`: the least natural `α` such that `p(n)θ` starts an infinite
//! derivation for every `n ≥ α` and every `θ`. The pipeline is:
//! refactor → validity classification (NT1/NT2/NT) → closed-form α, with a
//! Gauss–Jordan fallback over the naturals when classification fails, and a
//! final simplification step that migrates context towers from the base term
//! into substitution offsets.

#![forbid(unsafe_code)]

use std::collections::HashMap;

use crate::linsys::LinearSystem;
use crate::subst::Subst;
use crate::symbols::{SymbolRegistry, VarId};
use crate::term::{context_power, tower_of_contexts, HatTerm, Position, Term};
use crate::unify;

/// Errors surfaced by pattern-term construction and evaluation.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PatternError {
    #[error("a pattern substitution needs at least one pumping substitution")]
    NoPumping,
    #[error("pattern term expects {expected} pumping exponents (got {got})")]
    ExponentArity { expected: usize, got: usize },
}

// ============================================================================
// Pattern substitutions and raw pattern terms
// ============================================================================

/// `(σ1,…,σl, μ)` with `l ≥ 1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternSubst {
    pumping: Vec<Subst>,
    closing: Subst,
}

impl PatternSubst {
    pub fn new(pumping: Vec<Subst>, closing: Subst) -> Result<Self, PatternError> {
        if pumping.is_empty() {
            return Err(PatternError::NoPumping);
        }
        Ok(Self { pumping, closing })
    }

    /// Number of pumping indices `l`.
    #[inline]
    pub fn arity(&self) -> usize {
        self.pumping.len()
    }

    #[inline]
    pub fn pumping(&self) -> &[Subst] {
        &self.pumping
    }

    #[inline]
    pub fn closing(&self) -> &Subst {
        &self.closing
    }

    /// A variable is in the pumping domain iff some `σi` maps it to a
    /// non-self term.
    pub fn in_pumping_domain(&self, v: VarId) -> bool {
        self.pumping.iter().any(|s| s.is_productive(v))
    }

    /// All variables in some domain, pumping or closing.
    pub fn domain(&self) -> Vec<VarId> {
        let mut vs: Vec<VarId> = self
            .pumping
            .iter()
            .flat_map(|s| s.domain().collect::<Vec<_>>())
            .chain(self.closing.domain())
            .collect();
        vs.sort_unstable();
        vs.dedup();
        vs
    }

    /// `μ(σl^nl(…σ1^n1(t)…))`.
    pub fn evaluate(&self, base: &Term, ns: &[u64]) -> Result<Term, PatternError> {
        if ns.len() != self.pumping.len() {
            return Err(PatternError::ExponentArity { expected: self.pumping.len(), got: ns.len() });
        }
        let mut t = base.clone();
        for (sigma, &n) in self.pumping.iter().zip(ns) {
            for _ in 0..n {
                t = sigma.apply(&t);
            }
        }
        Ok(self.closing.apply(&t))
    }

    /// EEG'12 Lemma 6 well-formedness for the relevant variables of `base`:
    /// the closing substitution and every pumping substitution commute
    /// pairwise.
    pub fn well_formed(&self, _base: &Term) -> bool {
        for (i, si) in self.pumping.iter().enumerate() {
            if !si.commutes_with(&self.closing) {
                return false;
            }
            for sj in &self.pumping[i + 1..] {
                if !si.commutes_with(sj) {
                    return false;
                }
            }
        }
        true
    }

    /// Pointwise union of pumpings and closings; `None` when any union
    /// conflicts. Used when unfolding composes pattern substitutions.
    pub fn merge(&self, other: &PatternSubst) -> Option<PatternSubst> {
        if self.pumping.len() != other.pumping.len() {
            return None;
        }
        let mut pumping = Vec::with_capacity(self.pumping.len());
        for (a, b) in self.pumping.iter().zip(&other.pumping) {
            pumping.push(a.union_with(b).ok()?);
        }
        let closing = self.closing.union_with(&other.closing).ok()?;
        Some(PatternSubst { pumping, closing })
    }

    /// Private-namespace copy.
    pub fn deep_copy(&self, reg: &SymbolRegistry, copies: &mut HashMap<VarId, VarId>) -> Self {
        PatternSubst {
            pumping: self.pumping.iter().map(|s| s.deep_copy(reg, copies)).collect(),
            closing: self.closing.deep_copy(reg, copies),
        }
    }
}

/// A term paired with its pattern substitution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatternTerm {
    pub base: Term,
    pub theta: PatternSubst,
}

impl PatternTerm {
    pub fn new(base: Term, theta: PatternSubst) -> Self {
        Self { base, theta }
    }

    pub fn evaluate(&self, ns: &[u64]) -> Result<Term, PatternError> {
        self.theta.evaluate(&self.base, ns)
    }
}

// ============================================================================
// Simple pattern terms (normalized hat form)
// ============================================================================

/// Normalized pattern term: every mapped variable goes to a plain term or to
/// one hat function whose coefficient vector has length `l`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimplePatternTerm {
    pub base: Term,
    /// Number of pumping indices.
    pub l: usize,
    /// `x ↦ plain term` or `x ↦ Hat{…}` with `coeffs.len() == l`.
    pub map: Subst,
}

impl SimplePatternTerm {
    /// Interning factory: rewrite `(base, θ)` into hat form, or `None` when
    /// the instance is unconstructible.
    pub fn try_new(reg: &SymbolRegistry, base: Term, theta: &PatternSubst) -> Option<Self> {
        let l = theta.arity();
        let mut map = Subst::new();
        for v in theta.domain() {
            if !theta.in_pumping_domain(v) {
                // Closing-only variable: plain mapping.
                if let Some(t) = theta.closing().get(v) {
                    if *t != Term::Var(v) {
                        map.bind(v, t.clone());
                    }
                }
                continue;
            }
            let mut context: Option<Term> = None;
            let mut coeffs = vec![0u64; l];
            for (i, sigma) in theta.pumping().iter().enumerate() {
                if !sigma.is_productive(v) {
                    continue;
                }
                let image = sigma.apply(&Term::Var(v));
                let (c, a) = decompose_context_power(&image, v)?;
                match &context {
                    None => context = Some(c),
                    Some(prev) if *prev == c => {}
                    Some(_) => return None,
                }
                coeffs[i] = a;
            }
            let context = context?;
            let (offset, target) = match theta.closing().get(v) {
                Some(t) => tower_of_contexts(t, &context),
                None => (0, Term::Var(v)),
            };
            // Intern the context; the hole is already canonical.
            let hole = reg.fresh_var();
            let concrete = context.plug(&Term::Var(hole));
            let sym = reg.hat(&concrete, hole).ok()?;
            map.bind(
                v,
                Term::Hat(HatTerm { sym, coeffs, offset, arg: Box::new(target) }),
            );
        }
        Some(Self { base, l, map })
    }

    /// Trivial simple pattern term `t^*`: no mapped variables.
    pub fn trivial(base: Term, l: usize) -> Self {
        Self { base, l, map: Subst::new() }
    }

    /// Evaluate at concrete exponents by expanding every hat mapping.
    pub fn evaluate(&self, reg: &SymbolRegistry, ns: &[u64]) -> Result<Term, PatternError> {
        if ns.len() != self.l {
            return Err(PatternError::ExponentArity { expected: self.l, got: ns.len() });
        }
        let mut concrete = Subst::new();
        for (v, image) in self.map.iter() {
            match image {
                Term::Hat(h) => {
                    let e: u64 =
                        h.coeffs.iter().zip(ns).map(|(a, n)| a * n).sum::<u64>() + h.offset;
                    let context = reg.context(h.sym).unwrap_or(Term::Hole(0));
                    concrete.bind(v, context_power(&context, e, &h.arg));
                }
                other => concrete.bind(v, other.clone()),
            }
        }
        Ok(concrete.apply(&self.base))
    }

    /// Variables of the base term.
    pub fn relevant_vars(&self) -> Vec<VarId> {
        self.base.vars()
    }

    pub fn deep_copy(&self, reg: &SymbolRegistry, copies: &mut HashMap<VarId, VarId>) -> Self {
        Self {
            base: self.base.deep_copy(reg, copies),
            l: self.l,
            map: self.map.deep_copy(reg, copies),
        }
    }
}

/// Decompose `image = c^a(x)` for a ground 1-context `c` (canonical hole),
/// choosing the smallest repeating unit. `None` when `image` has no such
/// shape.
pub fn decompose_context_power(image: &Term, x: VarId) -> Option<(Term, u64)> {
    if image.count_var(x) != 1 {
        return None;
    }
    let path = find_var_path(image, x)?;
    for k in 1..=path.len() {
        let prefix = Position::from_indices(path[..k].iter().copied());
        let candidate = image.replace_at(&prefix, &Term::Hole(0))?;
        if !candidate.vars().is_empty() {
            continue; // context must be ground apart from its hole
        }
        let (a, rest) = tower_of_contexts(image, &candidate);
        if a > 0 && rest == Term::Var(x) {
            return Some((candidate, a));
        }
    }
    None
}

fn find_var_path(t: &Term, x: VarId) -> Option<Vec<usize>> {
    match t {
        Term::Var(v) if *v == x => Some(Vec::new()),
        Term::Fun(_, args) => args.iter().enumerate().find_map(|(i, a)| {
            find_var_path(a, x).map(|mut p| {
                p.insert(0, i);
                p
            })
        }),
        Term::Hat(h) => find_var_path(&h.arg, x).map(|mut p| {
            p.insert(0, 0);
            p
        }),
        _ => None,
    }
}

// ============================================================================
// Pattern-term unification (simple case)
// ============================================================================

/// Unify two simple pattern terms: the bases must be variants; the second
/// term's mappings are renamed into the first term's namespace and the two
/// maps must agree wherever they overlap. `None` on any failure.
pub fn unify_simple(p: &SimplePatternTerm, q: &SimplePatternTerm) -> Option<SimplePatternTerm> {
    if p.l != q.l {
        return None;
    }
    let rho = unify::variant_unifier(&q.base, &p.base)?;
    let mut renaming = HashMap::new();
    for (v, t) in rho.iter() {
        if let Term::Var(w) = t {
            renaming.insert(v, *w);
        }
    }
    let q_map = q.map.rename_with(&renaming);
    let map = p.map.union_with(&q_map).ok()?;
    Some(SimplePatternTerm { base: p.base.clone(), l: p.l, map })
}

// ============================================================================
// Pattern rules and the α-threshold
// ============================================================================

/// Validity classification of an aligned pattern rule.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum NtClass {
    /// Only variable-targeting mappings.
    Nt1,
    /// Only ground-targeting mappings.
    Nt2,
    /// Both kinds combined.
    Nt,
}

/// A pattern rule `p → q` with its α-threshold once established.
#[derive(Clone, Debug)]
pub struct PatternRule {
    pub lhs: SimplePatternTerm,
    pub rhs: SimplePatternTerm,
    /// `(α, ground nonterminating term)` once computed.
    alpha: Option<(u64, Term)>,
}

struct ParsedMapping {
    coeff: u64,
    offset: u64,
    context: Term,
    var_target: bool,
}

impl PatternRule {
    pub fn new(lhs: SimplePatternTerm, rhs: SimplePatternTerm) -> Self {
        Self { lhs, rhs, alpha: None }
    }

    /// The stored `(α, witness term)` if the rule was validated.
    pub fn alpha(&self) -> Option<&(u64, Term)> {
        self.alpha.as_ref()
    }

    /// Full α pipeline: refactor, validity, closed form, linear fallback.
    /// Returns the threshold on success and stores it with the rule.
    pub fn establish_alpha(&mut self, reg: &SymbolRegistry) -> Option<u64> {
        self.refactor(reg)?;
        let alpha = match self.check_validity(reg) {
            Some((class, a_l, a_r, d_l, d_r, k)) => {
                let _ = class;
                if a_l < a_r {
                    let num = a_l as i64 * k - (d_r as i64 - d_l as i64);
                    let den = (a_r - a_l) as i64;
                    if num <= 0 {
                        0
                    } else {
                        ((num + den - 1) / den) as u64
                    }
                } else {
                    0
                }
            }
            None => {
                // Linear-system fallback over the naturals.
                self.solve_linear(reg)?;
                0
            }
        };
        let ns = vec![alpha; self.lhs.l];
        let witness = groundify(&self.lhs.evaluate(reg, &ns).ok()?, reg);
        self.alpha = Some((alpha, witness));
        Some(alpha)
    }

    /// Step 1: align the two sides over a common domain. When `base(p)` is
    /// more general than `base(q)` via `η`, each binding `x ↦ c^a(x)` of `η`
    /// pushes `x ↦ c^{0;0}(θl(x))` into the left map and `x ↦ c^{0;a}(θr(x))`
    /// into the right map; aborts when `x` is already in a pumping domain.
    fn refactor(&mut self, reg: &SymbolRegistry) -> Option<()> {
        if self.lhs.base.is_variant_of(&self.rhs.base) {
            // Already aligned up to renaming; rename rhs onto lhs.
            let rho = unify::variant_unifier(&self.rhs.base, &self.lhs.base)?;
            let mut renaming = HashMap::new();
            for (v, t) in rho.iter() {
                if let Term::Var(w) = t {
                    renaming.insert(v, *w);
                }
            }
            self.rhs.base = rho.apply(&self.rhs.base);
            self.rhs.map = self.rhs.map.rename_with(&renaming);
            return Some(());
        }
        let eta = unify::match_terms(&self.lhs.base, &self.rhs.base)?;
        for (x, image) in eta.iter() {
            if *image == Term::Var(x) {
                continue;
            }
            let (context, a) = decompose_context_power(image, x)?;
            if mapping_is_pumping(&self.lhs.map, x) || mapping_is_pumping(&self.rhs.map, x) {
                return None;
            }
            let hole = reg.fresh_var();
            let concrete = context.plug(&Term::Var(hole));
            let sym = reg.hat(&concrete, hole).ok()?;
            let l = self.lhs.l;
            let left_arg = self.lhs.map.get(x).cloned().unwrap_or(Term::Var(x));
            let right_arg = self.rhs.map.get(x).cloned().unwrap_or(Term::Var(x));
            self.lhs.map.bind(
                x,
                Term::Hat(HatTerm { sym, coeffs: vec![0; l], offset: 0, arg: Box::new(left_arg) }),
            );
            self.rhs.map.bind(
                x,
                Term::Hat(HatTerm { sym, coeffs: vec![0; l], offset: a, arg: Box::new(right_arg) }),
            );
        }
        // The right base now speaks the left base's language.
        self.rhs.base = self.lhs.base.clone();
        Some(())
    }

    /// Step 2: walk the common domain, parse mappings into `(a, b, c, t)`
    /// tuples and keep the running `a_l, a_r, d_l, d_r, b_l, b_r, e` values
    /// coherent. Returns `(class, a_l, a_r, d_l, d_r, k)`.
    fn check_validity(
        &self,
        reg: &SymbolRegistry,
    ) -> Option<(NtClass, u64, u64, u64, u64, i64)> {
        if self.lhs.l != 1 {
            return None; // multi-index rules go to the linear system
        }
        let mut vars: Vec<VarId> =
            self.lhs.map.domain().chain(self.rhs.map.domain()).collect();
        vars.sort_unstable();
        vars.dedup();

        let mut a_l: Option<u64> = None;
        let mut a_r: Option<u64> = None;
        let mut d_l: Option<u64> = None;
        let mut d_r: Option<u64> = None;
        let mut b_l: Option<u64> = None;
        let mut b_r: Option<u64> = None;
        let mut e: Option<u64> = None;
        let mut ctx: Option<Term> = None;

        for v in vars {
            let left = parse_mapping(reg, self.lhs.map.get(v), v)?;
            let right = parse_mapping(reg, self.rhs.map.get(v), v)?;
            if left.context != right.context {
                return None;
            }
            match &ctx {
                None => ctx = Some(left.context.clone()),
                Some(c) if *c == left.context => {}
                Some(_) => return None,
            }
            if left.var_target != right.var_target {
                return None;
            }
            if left.var_target {
                if !merge_running(&mut a_l, left.coeff)
                    || !merge_running(&mut a_r, right.coeff)
                    || !merge_running(&mut d_l, left.offset)
                    || !merge_running(&mut d_r, right.offset)
                {
                    return None;
                }
            } else {
                if left.coeff != right.coeff {
                    return None;
                }
                if !merge_running(&mut e, left.coeff)
                    || !merge_running(&mut b_l, left.offset)
                    || !merge_running(&mut b_r, right.offset)
                {
                    return None;
                }
            }
        }

        let has_var = a_l.is_some();
        let has_ground = b_l.is_some();
        let class = match (has_var, has_ground) {
            (true, false) => NtClass::Nt1,
            (false, true) => NtClass::Nt2,
            (true, true) => NtClass::Nt,
            (false, false) => return None,
        };

        let (a_l, a_r) = (a_l.unwrap_or(0), a_r.unwrap_or(0));
        let (d_l, d_r) = (d_l.unwrap_or(0), d_r.unwrap_or(0));
        // Monotonicity on the variable-targeting side.
        if has_var && (a_l > a_r || d_l > d_r) {
            return None;
        }
        let k = if has_ground {
            let (b_l, b_r, e) = (b_l.unwrap(), b_r.unwrap(), e.unwrap());
            if e == 0 || b_r < b_l || (b_r - b_l) % e != 0 {
                return None;
            }
            ((b_r - b_l) / e) as i64
        } else {
            0
        };
        Some((class, a_l, a_r, d_l, d_r, k))
    }

    /// Step 4: the Gauss–Jordan fallback. Rows are mapped variables, columns
    /// are pumping indices, the constant column carries right-minus-left
    /// offsets.
    fn solve_linear(&self, reg: &SymbolRegistry) -> Option<()> {
        let mut vars: Vec<VarId> =
            self.lhs.map.domain().chain(self.rhs.map.domain()).collect();
        vars.sort_unstable();
        vars.dedup();
        if vars.is_empty() {
            return None;
        }
        let p = self.lhs.l;
        let n = vars.len();
        let mut a = vec![vec![0i64; p]; n];
        let mut b = vec![vec![0i64; p + 1]; n];
        for (i, &v) in vars.iter().enumerate() {
            let left = parse_mapping(reg, self.lhs.map.get(v), v)?;
            let right = parse_mapping(reg, self.rhs.map.get(v), v)?;
            let left_hat = hat_coeffs(self.lhs.map.get(v), p);
            let right_hat = hat_coeffs(self.rhs.map.get(v), p);
            for j in 0..p {
                a[i][j] = left_hat[j] as i64;
                b[i][j] = right_hat[j] as i64;
            }
            b[i][p] = right.offset as i64 - left.offset as i64;
        }
        let mut sys = LinearSystem::new(n, p, a, b).ok()?;
        sys.solve_gauss().then_some(())
    }

    /// Step 5: simplification. For each hat mapping `x ↦ c^{a;b}(t)`, find
    /// the largest `k` such that every occurrence of `x` in the base term is
    /// wrapped in `c^k(·)`; migrate that tower into the offset and strip it
    /// from the base. Preserves the denoted set `{p(n)}`.
    pub fn simplify_side(side: &mut SimplePatternTerm, reg: &SymbolRegistry) {
        let bindings: Vec<(VarId, Term)> =
            side.map.iter().map(|(v, t)| (v, t.clone())).collect();
        for (x, image) in bindings {
            let Term::Hat(h) = &image else { continue };
            let Some(context) = reg.context(h.sym) else { continue };
            let occurrences: Vec<Position> = side
                .base
                .positions()
                .into_iter()
                .filter(|(_, t)| matches!(t, Term::Var(v) if *v == x))
                .map(|(p, _)| p)
                .collect();
            if occurrences.is_empty() {
                continue;
            }
            let mut k_star = u64::MAX;
            for occ in &occurrences {
                k_star = k_star.min(embedding_depth(&side.base, occ, &context, x));
            }
            if k_star == 0 || k_star == u64::MAX {
                continue;
            }
            // Rewrite the base: replace each c^{k*} embedding by the bare x.
            let mut new_base = side.base.clone();
            loop {
                let occ = new_base
                    .positions()
                    .into_iter()
                    .find(|(p, t)| {
                        matches!(t, Term::Var(v) if *v == x)
                            && embedding_depth(&new_base, p, &context, x) >= k_star
                    })
                    .map(|(p, _)| p);
                let Some(occ) = occ else { break };
                let mut top = occ.clone();
                for _ in 0..k_star * context_depth(&context) {
                    match top.proper_prefix() {
                        Some(p) => top = p,
                        None => break,
                    }
                }
                match new_base.replace_at(&top, &Term::Var(x)) {
                    Some(b) => new_base = b,
                    None => break,
                }
            }
            side.base = new_base;
            side.map.bind(
                x,
                Term::Hat(HatTerm { offset: h.offset + k_star, ..h.clone() }),
            );
        }
    }
}

fn mapping_is_pumping(map: &Subst, v: VarId) -> bool {
    matches!(map.get(v), Some(Term::Hat(h)) if h.coeffs.iter().any(|&c| c > 0))
}

fn merge_running(slot: &mut Option<u64>, value: u64) -> bool {
    match slot {
        None => {
            *slot = Some(value);
            true
        }
        Some(prev) => *prev == value,
    }
}

fn parse_mapping(
    reg: &SymbolRegistry,
    image: Option<&Term>,
    v: VarId,
) -> Option<ParsedMapping> {
    match image {
        None => Some(ParsedMapping {
            coeff: 0,
            offset: 0,
            context: Term::Hole(0),
            var_target: true,
        }),
        Some(Term::Hat(h)) => {
            let context = reg.context(h.sym)?;
            let var_target = matches!(h.arg.as_ref(), Term::Var(_));
            Some(ParsedMapping {
                coeff: h.coeffs.first().copied().unwrap_or(0),
                offset: h.offset,
                context,
                var_target,
            })
        }
        Some(t) => {
            // Plain mapping: a degenerate c^{0;0} tower over the image.
            let var_target = matches!(t, Term::Var(w) if *w != v);
            Some(ParsedMapping {
                coeff: 0,
                offset: 0,
                context: Term::Hole(0),
                var_target: var_target || matches!(t, Term::Var(_)),
            })
        }
    }
}

fn hat_coeffs(image: Option<&Term>, l: usize) -> Vec<u64> {
    match image {
        Some(Term::Hat(h)) => h.coeffs.clone(),
        _ => vec![0; l],
    }
}

/// How many times is the occurrence at `occ` wrapped in `c(·)` inside `t`?
fn embedding_depth(t: &Term, occ: &Position, context: &Term, x: VarId) -> u64 {
    let unit = context_depth(context);
    if unit == 0 {
        return 0;
    }
    let mut k = 0u64;
    let mut pos = occ.clone();
    loop {
        let mut top = pos.clone();
        let mut ok = true;
        for _ in 0..unit {
            match top.proper_prefix() {
                Some(p) => top = p,
                None => {
                    ok = false;
                    break;
                }
            }
        }
        if !ok {
            return k;
        }
        let Some(sub) = t.subterm(&top) else { return k };
        let (tower, rest) = tower_of_contexts(sub, context);
        let residual_matches = matches!(&rest, r if r.contains_var(x) || *r == Term::Var(x));
        if tower >= 1 && residual_matches {
            k += 1;
            pos = top;
        } else {
            return k;
        }
    }
}

fn context_depth(context: &Term) -> u64 {
    fn hole_depth(t: &Term) -> Option<u64> {
        match t {
            Term::Hole(_) => Some(0),
            Term::Fun(_, args) => args.iter().find_map(hole_depth).map(|d| d + 1),
            Term::Hat(h) => hole_depth(&h.arg).map(|d| d + 1),
            Term::Var(_) => None,
        }
    }
    hole_depth(context).unwrap_or(0)
}

/// Replace every variable of `t` by the fresh constant `0`.
pub fn groundify(t: &Term, reg: &SymbolRegistry) -> Term {
    let zero = reg.function("0", 0);
    fn go(t: &Term, zero: crate::symbols::SymId) -> Term {
        match t {
            Term::Var(_) => Term::Fun(zero, vec![]),
            Term::Hole(_) => t.clone(),
            Term::Fun(f, args) => Term::Fun(*f, args.iter().map(|a| go(a, zero)).collect()),
            Term::Hat(h) => Term::Hat(HatTerm { arg: Box::new(go(&h.arg, zero)), ..h.clone() }),
        }
    }
    go(t, zero)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg() -> SymbolRegistry {
        SymbolRegistry::new()
    }

    /// `σ = {x ↦ s(x)}`, `μ = {x ↦ 0}` over base `f(x)`.
    fn counting_pattern(r: &SymbolRegistry) -> (PatternTerm, VarId) {
        let s = r.function("s", 1);
        let zero = r.function("0", 0);
        let f = r.function("f", 1);
        let x = r.fresh_var();
        let sigma = Subst::singleton(x, Term::Fun(s, vec![Term::Var(x)]));
        let mu = Subst::singleton(x, Term::Fun(zero, vec![]));
        let theta = PatternSubst::new(vec![sigma], mu).unwrap();
        (PatternTerm::new(Term::Fun(f, vec![Term::Var(x)]), theta), x)
    }

    #[test]
    fn evaluation_pumps_then_closes() {
        let r = reg();
        let (p, _) = counting_pattern(&r);
        let s = r.lookup("s", 1).unwrap();
        let zero = r.lookup("0", 0).unwrap();
        let f = r.lookup("f", 1).unwrap();
        let got = p.evaluate(&[2]).unwrap();
        let expect = Term::Fun(
            f,
            vec![Term::Fun(s, vec![Term::Fun(s, vec![Term::Fun(zero, vec![])])])],
        );
        assert_eq!(got, expect);
    }

    #[test]
    fn exponent_arity_is_checked() {
        let r = reg();
        let (p, _) = counting_pattern(&r);
        assert_eq!(
            p.evaluate(&[1, 2]),
            Err(PatternError::ExponentArity { expected: 1, got: 2 })
        );
    }

    #[test]
    fn simple_form_recognizes_context_towers() {
        let r = reg();
        let (p, x) = counting_pattern(&r);
        let simple = SimplePatternTerm::try_new(&r, p.base.clone(), &p.theta).unwrap();
        match simple.map.get(x) {
            Some(Term::Hat(h)) => {
                assert_eq!(h.coeffs, vec![1]);
                assert_eq!(h.offset, 0);
            }
            other => panic!("expected hat mapping, got {other:?}"),
        }
        // Simple evaluation matches raw evaluation.
        for n in 0..4 {
            assert_eq!(simple.evaluate(&r, &[n]).unwrap(), p.evaluate(&[n]).unwrap());
        }
    }

    #[test]
    fn double_step_pumping_has_coefficient_two() {
        let r = reg();
        let s = r.function("s", 1);
        let f = r.function("f", 1);
        let x = r.fresh_var();
        let sigma =
            Subst::singleton(x, Term::Fun(s, vec![Term::Fun(s, vec![Term::Var(x)])]));
        let theta = PatternSubst::new(vec![sigma], Subst::new()).unwrap();
        let simple =
            SimplePatternTerm::try_new(&r, Term::Fun(f, vec![Term::Var(x)]), &theta).unwrap();
        match simple.map.get(x) {
            Some(Term::Hat(h)) => assert_eq!(h.coeffs, vec![2]),
            other => panic!("expected hat mapping, got {other:?}"),
        }
    }

    #[test]
    fn non_context_pumping_is_unconstructible() {
        let r = reg();
        let g = r.function("g", 2);
        let f = r.function("f", 1);
        let x = r.fresh_var();
        // x ↦ g(x, x) duplicates the variable: no 1-context shape.
        let sigma = Subst::singleton(x, Term::Fun(g, vec![Term::Var(x), Term::Var(x)]));
        let theta = PatternSubst::new(vec![sigma], Subst::new()).unwrap();
        assert!(SimplePatternTerm::try_new(&r, Term::Fun(f, vec![Term::Var(x)]), &theta)
            .is_none());
    }

    #[test]
    fn alpha_zero_for_balanced_rule() {
        // f(x){x ↦ s^n(x)} → f(x){x ↦ s^{n+1}(x)}: same coefficient, growing
        // offset ⇒ valid with α = 0.
        let r = reg();
        let s = r.function("s", 1);
        let f = r.function("f", 1);
        let x = r.fresh_var();
        let sigma = Subst::singleton(x, Term::Fun(s, vec![Term::Var(x)]));
        let theta_l = PatternSubst::new(vec![sigma.clone()], Subst::new()).unwrap();
        let mu_r = Subst::singleton(x, Term::Fun(s, vec![Term::Var(x)]));
        let theta_r = PatternSubst::new(vec![sigma], mu_r).unwrap();
        let lhs =
            SimplePatternTerm::try_new(&r, Term::Fun(f, vec![Term::Var(x)]), &theta_l).unwrap();
        let rhs =
            SimplePatternTerm::try_new(&r, Term::Fun(f, vec![Term::Var(x)]), &theta_r).unwrap();
        let mut rule = PatternRule::new(lhs, rhs);
        assert_eq!(rule.establish_alpha(&r), Some(0));
        let (alpha, witness) = rule.alpha().unwrap();
        assert_eq!(*alpha, 0);
        assert!(witness.is_ground());
    }

    #[test]
    fn alpha_positive_in_the_combined_class() {
        // Variable-targeting x: left coefficient 1, right coefficient 2.
        // Ground-targeting y: e = 1, b_l = 0, b_r = 4 ⇒ k = 4.
        // α = ceil((1·4 − (0 − 0)) / (2 − 1)) = 4.
        let r = reg();
        let s = r.function("s", 1);
        let zero = r.function("0", 0);
        let f = r.function("f", 2);
        let x = r.fresh_var();
        let y = r.fresh_var();
        let z = Term::Fun(zero, vec![]);

        let mut sl = Subst::new();
        sl.bind(x, Term::Fun(s, vec![Term::Var(x)]));
        sl.bind(y, Term::Fun(s, vec![Term::Var(y)]));
        let mu_l = Subst::singleton(y, z.clone());
        let theta_l = PatternSubst::new(vec![sl], mu_l).unwrap();

        let mut sr = Subst::new();
        sr.bind(x, Term::Fun(s, vec![Term::Fun(s, vec![Term::Var(x)])]));
        sr.bind(y, Term::Fun(s, vec![Term::Var(y)]));
        let mu_r = Subst::singleton(
            y,
            Term::Fun(
                s,
                vec![Term::Fun(s, vec![Term::Fun(s, vec![Term::Fun(s, vec![z])])])],
            ),
        );
        let theta_r = PatternSubst::new(vec![sr], mu_r).unwrap();

        let base = Term::Fun(f, vec![Term::Var(x), Term::Var(y)]);
        let lhs = SimplePatternTerm::try_new(&r, base.clone(), &theta_l).unwrap();
        let rhs = SimplePatternTerm::try_new(&r, base, &theta_r).unwrap();
        let mut rule = PatternRule::new(lhs, rhs);
        assert_eq!(rule.establish_alpha(&r), Some(4));
    }

    #[test]
    fn linear_fallback_handles_mixed_contexts() {
        // Per-variable contexts differ (s vs c), defeating the running-value
        // classification, but the exponent system 2n = n + 2, 3n = n + 4 has
        // the natural solution n = 2.
        let r = reg();
        let s = r.function("s", 1);
        let c = r.function("c", 1);
        let f = r.function("f", 2);
        let x = r.fresh_var();
        let y = r.fresh_var();

        let mut sl = Subst::new();
        sl.bind(x, Term::Fun(s, vec![Term::Fun(s, vec![Term::Var(x)])]));
        sl.bind(y, Term::Fun(c, vec![Term::Fun(c, vec![Term::Fun(c, vec![Term::Var(y)])])]));
        let theta_l = PatternSubst::new(vec![sl], Subst::new()).unwrap();

        let mut sr = Subst::new();
        sr.bind(x, Term::Fun(s, vec![Term::Var(x)]));
        sr.bind(y, Term::Fun(c, vec![Term::Var(y)]));
        let mut mu_r = Subst::new();
        mu_r.bind(x, Term::Fun(s, vec![Term::Fun(s, vec![Term::Var(x)])]));
        mu_r.bind(
            y,
            Term::Fun(c, vec![Term::Fun(c, vec![Term::Fun(c, vec![Term::Fun(c, vec![Term::Var(y)])])])]),
        );
        let theta_r = PatternSubst::new(vec![sr], mu_r).unwrap();

        let base = Term::Fun(f, vec![Term::Var(x), Term::Var(y)]);
        let lhs = SimplePatternTerm::try_new(&r, base.clone(), &theta_l).unwrap();
        let rhs = SimplePatternTerm::try_new(&r, base, &theta_r).unwrap();
        let mut rule = PatternRule::new(lhs, rhs);
        assert_eq!(rule.establish_alpha(&r), Some(0));
    }

    #[test]
    fn simplification_migrates_towers_into_offsets() {
        // base f(s(x)) with x ↦ s^{n;0}(0) becomes base f(x), x ↦ s^{n;1}(0).
        let r = reg();
        let s = r.function("s", 1);
        let zero = r.function("0", 0);
        let f = r.function("f", 1);
        let x = r.fresh_var();
        let sigma = Subst::singleton(x, Term::Fun(s, vec![Term::Var(x)]));
        let mu = Subst::singleton(x, Term::Fun(zero, vec![]));
        let theta = PatternSubst::new(vec![sigma], mu).unwrap();
        let base = Term::Fun(f, vec![Term::Fun(s, vec![Term::Var(x)])]);
        let mut side = SimplePatternTerm::try_new(&r, base, &theta).unwrap();
        let before: Vec<Term> =
            (0..3).map(|n| side.evaluate(&r, &[n]).unwrap()).collect();
        PatternRule::simplify_side(&mut side, &r);
        assert_eq!(side.base, Term::Fun(f, vec![Term::Var(x)]));
        match side.map.get(x) {
            Some(Term::Hat(h)) => assert_eq!(h.offset, 1),
            other => panic!("expected hat mapping, got {other:?}"),
        }
        let after: Vec<Term> = (0..3).map(|n| side.evaluate(&r, &[n]).unwrap()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn merge_composes_compatible_pattern_substitutions() {
        let r = reg();
        let s = r.function("s", 1);
        let x = r.fresh_var();
        let y = r.fresh_var();
        let a = PatternSubst::new(
            vec![Subst::singleton(x, Term::Fun(s, vec![Term::Var(x)]))],
            Subst::new(),
        )
        .unwrap();
        let b = PatternSubst::new(
            vec![Subst::singleton(y, Term::Fun(s, vec![Term::Var(y)]))],
            Subst::new(),
        )
        .unwrap();
        let merged = a.merge(&b).unwrap();
        assert!(merged.in_pumping_domain(x));
        assert!(merged.in_pumping_domain(y));
    }
}
