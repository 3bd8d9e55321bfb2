//! LP unfolding operators
//!
//! **Binary unfolding `T^β`.** Starting from the program rules tagged with
//! iteration 0, iteration `i > 0` unfolds one body atom of a program rule
//! with a rule of tag exactly `i−1` (the `max = iteration − 1` invariant);
//! the remaining atoms ride along under the unifier. Facts reduce the body
//! length, and unfolding the last atom with a fact yields a new fact. An
//! iteration producing no new rule terminates the search and the program is
//! universally terminating.
//!
//! **Pattern unfolding `T^π`.** Operates on pattern rules. The seed set is
//! produced by three generator schemas (facts directly, fact + binary rule,
//! three-rule compositions) plus the trivial pattern `h^*` for rules not
//! otherwise used. One iteration unifies a rule's right side, as a simple
//! pattern term, with another rule's left side and composes the pattern
//! substitutions.
//!
//! Both operators poll the cancellation token between units of work and
//! return partial results on interrupt.

#![forbid(unsafe_code)]

use std::collections::HashMap;

use crate::pattern::{unify_simple, PatternRule, PatternSubst, SimplePatternTerm};
use crate::program::{LpRule, Program, TraceArena, TraceId, UnfoldedLpRule};
use crate::subst::Subst;
use crate::symbols::SymbolRegistry;
use crate::term::Term;
use crate::unify;
use crate::CancelToken;

/// Iteration/size caps shared with the TRS provers.
pub const NB_ITE: usize = (i32::MAX / 2) as usize;
pub const NB_UNF: usize = (i32::MAX / 2) as usize;

/// State of the `T^β` fixpoint computation.
pub struct BinaryUnfolding<'a> {
    program: &'a Program,
    /// All rules produced so far, every tag.
    pub rules: Vec<UnfoldedLpRule>,
    /// Trace arena for verbose proofs.
    pub arena: TraceArena,
    iteration: usize,
}

impl<'a> BinaryUnfolding<'a> {
    pub fn seed(program: &'a Program) -> Self {
        let mut arena = TraceArena::new();
        let rules = program
            .lp_rules
            .iter()
            .map(|r| {
                let parent =
                    Some(arena.push(r.render(&program.registry), 0, None));
                UnfoldedLpRule { rule: r.clone(), iteration: 0, parent }
            })
            .collect();
        Self { program, rules, arena, iteration: 0 }
    }

    #[inline]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Run one `T^β` iteration; returns the indices of the new rules, empty
    /// when the operator has reached its fixpoint.
    pub fn iterate(&mut self, cancel: &CancelToken) -> Vec<usize> {
        let reg = &self.program.registry;
        let next = self.iteration + 1;
        let previous: Vec<usize> = (0..self.rules.len())
            .filter(|&i| self.rules[i].iteration == self.iteration)
            .collect();
        let mut produced = Vec::new();

        for base in &self.program.lp_rules {
            for j in 0..base.body.len() {
                for &pi in &previous {
                    if cancel.is_cancelled() {
                        return produced;
                    }
                    let partner = self.rules[pi].rule.deep_copy(reg);
                    let Some(theta) = unify::unify(&base.body[j], &partner.head) else {
                        continue;
                    };
                    let mut body = Vec::with_capacity(base.body.len() + partner.body.len());
                    for (k, atom) in base.body.iter().enumerate() {
                        if k == j {
                            body.extend(partner.body.iter().map(|b| theta.apply(b)));
                        } else {
                            body.push(theta.apply(atom));
                        }
                    }
                    let candidate =
                        LpRule::new(theta.apply(&base.head), body, base.num);
                    if self.is_known(&candidate) {
                        continue;
                    }
                    let parent = self.rules[pi].parent;
                    let id = self.push(candidate, next, parent);
                    produced.push(id);
                    if self.rules.len() >= NB_UNF {
                        return produced;
                    }
                }
            }
        }
        self.iteration = next;
        reg.note_generated_rules(produced.len() as u64);
        produced
    }

    /// New *binary* rules among `indices`, ready for the loop checks.
    pub fn binary_rules(&self, indices: &[usize]) -> Vec<&UnfoldedLpRule> {
        indices
            .iter()
            .map(|&i| &self.rules[i])
            .filter(|u| u.rule.is_binary())
            .collect()
    }

    fn is_known(&self, candidate: &LpRule) -> bool {
        self.rules.iter().any(|u| {
            u.rule.body.len() == candidate.body.len()
                && u.rule.head.is_variant_of(&candidate.head)
                && rule_atom_variant(&u.rule, candidate)
        })
    }

    fn push(&mut self, rule: LpRule, iteration: usize, parent: Option<TraceId>) -> usize {
        let text = rule.render(&self.program.registry);
        let trace = self.arena.push(text, iteration, parent);
        self.rules.push(UnfoldedLpRule { rule, iteration, parent: Some(trace) });
        self.rules.len() - 1
    }
}

fn rule_atom_variant(a: &LpRule, b: &LpRule) -> bool {
    // One bijection must cover the head and every body atom.
    let seq = |r: &LpRule| -> Vec<Term> {
        std::iter::once(r.head.clone()).chain(r.body.iter().cloned()).collect()
    };
    crate::term::variant_seq(&seq(a), &seq(b))
}

// ============================================================================
// Pattern unfolding
// ============================================================================

/// State of the `T^π` computation over pattern rules.
pub struct PatternUnfolding<'a> {
    program: &'a Program,
    pub rules: Vec<PatternRule>,
    /// For rules produced by the two-binary-rule composition schema, the
    /// pair of source rules (a recurrent-pair provenance).
    pub sources: Vec<Option<(LpRule, LpRule)>>,
}

impl<'a> PatternUnfolding<'a> {
    /// Build the seed set `B` with the generator schemas.
    pub fn seed(program: &'a Program) -> Self {
        let reg = &program.registry;
        let mut rules = Vec::new();
        let mut sources: Vec<Option<(LpRule, LpRule)>> = Vec::new();
        let mut used: std::collections::HashSet<usize> = std::collections::HashSet::new();
        let binaries: Vec<&LpRule> =
            program.lp_rules.iter().filter(|r| r.is_binary()).collect();
        let facts: Vec<&LpRule> = program.lp_rules.iter().filter(|r| r.is_fact()).collect();

        // Schema 1: a binary rule whose head matches onto its own body spawns
        // a self-pumping rule.
        for r in &binaries {
            if let Some(pr) = self_pumping_rule(r, reg) {
                used.insert(r.num);
                rules.push(pr);
                sources.push(None);
            }
        }

        // Schema 2: fact + binary rule: the fact closes the pumped body.
        for r in &binaries {
            for f in &facts {
                if let Some(pr) = fact_closed_rule(r, f, reg) {
                    used.insert(r.num);
                    used.insert(f.num);
                    rules.push(pr);
                    sources.push(None);
                }
            }
        }

        // Schema 3: three-rule composition binary ∘ binary ∘ fact. A rule
        // born here carries its two binary parents as recurrent-pair
        // provenance.
        for r1 in &binaries {
            for r2 in &binaries {
                for f in &facts {
                    if let Some(pr) = composed_rule(r1, r2, f, reg) {
                        used.insert(r1.num);
                        used.insert(r2.num);
                        used.insert(f.num);
                        rules.push(pr);
                        sources.push(Some(((*r1).clone(), (*r2).clone())));
                    }
                }
            }
        }

        // Trivial patterns `h^*` for rules not otherwise used.
        for r in &program.lp_rules {
            if !used.contains(&r.num) {
                let side = SimplePatternTerm::trivial(r.head.clone(), 1);
                rules.push(PatternRule::new(side.clone(), side));
                sources.push(None);
            }
        }

        Self { program, rules, sources }
    }

    /// Recurrent-pair provenance of rule `i`, when it has one.
    pub fn source_pair(&self, i: usize) -> Option<&(LpRule, LpRule)> {
        self.sources.get(i).and_then(|s| s.as_ref())
    }

    /// One iteration: compose every pair `(p, q)` by unifying `rhs(p)` with
    /// `lhs(q)`. Returns the new rules' indices.
    pub fn iterate(&mut self, cancel: &CancelToken) -> Vec<usize> {
        let reg = &self.program.registry;
        let n = self.rules.len();
        let mut produced = Vec::new();
        for i in 0..n {
            for j in 0..n {
                if cancel.is_cancelled() {
                    return produced;
                }
                let mut copies = HashMap::new();
                let q_lhs = self.rules[j].lhs.deep_copy(reg, &mut copies);
                let q_rhs = self.rules[j].rhs.deep_copy(reg, &mut copies);
                let Some(glued) = unify_simple(&self.rules[i].rhs, &q_lhs) else {
                    continue;
                };
                let lhs = SimplePatternTerm {
                    base: self.rules[i].lhs.base.clone(),
                    l: glued.l,
                    map: match self.rules[i].lhs.map.union_with(&glued.map) {
                        Ok(m) => m,
                        Err(_) => continue,
                    },
                };
                let rhs = SimplePatternTerm {
                    base: q_rhs.base,
                    l: glued.l,
                    map: match q_rhs.map.union_with(&glued.map) {
                        Ok(m) => m,
                        Err(_) => continue,
                    },
                };
                let candidate = PatternRule::new(lhs, rhs);
                if self.rules.iter().any(|r| {
                    r.lhs.base.is_variant_of(&candidate.lhs.base)
                        && r.rhs.base.is_variant_of(&candidate.rhs.base)
                        && r.lhs.map.len() == candidate.lhs.map.len()
                        && r.rhs.map.len() == candidate.rhs.map.len()
                }) {
                    continue;
                }
                produced.push(self.rules.len());
                self.rules.push(candidate);
                self.sources.push(None);
                if self.rules.len() >= NB_UNF {
                    return produced;
                }
            }
        }
        self.program.registry.note_generated_rules(produced.len() as u64);
        produced
    }

    /// Try to validate rules (α-threshold); returns the index of the first
    /// rule that validates.
    pub fn find_witness(&mut self, indices: &[usize]) -> Option<usize> {
        let reg = &self.program.registry;
        for &i in indices {
            let mut rule = self.rules[i].clone();
            if rule.establish_alpha(reg).is_some() {
                self.rules[i] = rule;
                return Some(i);
            }
        }
        None
    }
}

/// Schema 1: `h ← b` with `match(h → b)` a context-growing substitution
/// builds `(h, σ^n) → (h, σ^{n+1})`.
fn self_pumping_rule(rule: &LpRule, reg: &SymbolRegistry) -> Option<PatternRule> {
    let body = &rule.body[0];
    let eta = unify::match_terms(&rule.head, body)?;
    if eta.is_empty() || eta.is_variable_renaming() {
        return None;
    }
    let sigma = eta;
    let theta_l = PatternSubst::new(vec![sigma.clone()], Subst::new()).ok()?;
    let theta_r = PatternSubst::new(vec![sigma.clone()], sigma).ok()?;
    let lhs = SimplePatternTerm::try_new(reg, rule.head.clone(), &theta_l)?;
    let rhs = SimplePatternTerm::try_new(reg, rule.head.clone(), &theta_r)?;
    let mut pr = PatternRule::new(lhs, rhs);
    pr.establish_alpha(reg)?;
    Some(pr)
}

/// Schema 2: the fact closes the body of a pumping binary rule, giving a
/// ground family.
fn fact_closed_rule(rule: &LpRule, fact: &LpRule, reg: &SymbolRegistry) -> Option<PatternRule> {
    let body = &rule.body[0];
    let fresh_fact = fact.deep_copy(reg);
    let mu = unify::unify(body, &fresh_fact.head)?;
    let sigma = unify::match_terms(&rule.head, body)?;
    if sigma.is_empty() || sigma.is_variable_renaming() {
        return None;
    }
    let theta_l = PatternSubst::new(vec![sigma.clone()], mu.clone()).ok()?;
    let theta_r = PatternSubst::new(vec![sigma.clone()], mu.compose(&sigma)).ok()?;
    let lhs = SimplePatternTerm::try_new(reg, rule.head.clone(), &theta_l)?;
    let rhs = SimplePatternTerm::try_new(reg, rule.head.clone(), &theta_r)?;
    let mut pr = PatternRule::new(lhs, rhs);
    pr.establish_alpha(reg)?;
    Some(pr)
}

/// Schema 3: compose two binary rules, then close with a fact.
fn composed_rule(
    r1: &LpRule,
    r2: &LpRule,
    fact: &LpRule,
    reg: &SymbolRegistry,
) -> Option<PatternRule> {
    let second = r2.deep_copy(reg);
    let theta = unify::unify(&r1.body[0], &second.head)?;
    let fused = LpRule::new(
        theta.apply(&r1.head),
        vec![theta.apply(&second.body[0])],
        r1.num,
    );
    if fused.head == fused.body[0] {
        return None;
    }
    fact_closed_rule(&fused, fact, reg).or_else(|| self_pumping_rule(&fused, reg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::Mode;
    use crate::witness::LoopingPair;
    use std::sync::Arc;

    /// The permute/delete program of the classic nontermination benchmark.
    fn permute_program() -> Program {
        let reg = Arc::new(SymbolRegistry::new());
        let delete = reg.function("delete", 3);
        let permute = reg.function("permute", 2);
        let cons = reg.function(".", 2);
        let nil = reg.function("[]", 0);

        // delete(X, [X|Xs], Xs).
        let (x, xs) = (reg.fresh_var(), reg.fresh_var());
        let r1 = LpRule::new(
            Term::Fun(
                delete,
                vec![
                    Term::Var(x),
                    Term::Fun(cons, vec![Term::Var(x), Term::Var(xs)]),
                    Term::Var(xs),
                ],
            ),
            vec![],
            0,
        );
        // delete(Y, [X|Xs], [X|Ys]) :- delete(Y, Xs, Ys).
        let (y, x2, xs2, ys) =
            (reg.fresh_var(), reg.fresh_var(), reg.fresh_var(), reg.fresh_var());
        let r2 = LpRule::new(
            Term::Fun(
                delete,
                vec![
                    Term::Var(y),
                    Term::Fun(cons, vec![Term::Var(x2), Term::Var(xs2)]),
                    Term::Fun(cons, vec![Term::Var(x2), Term::Var(ys)]),
                ],
            ),
            vec![Term::Fun(delete, vec![Term::Var(y), Term::Var(xs2), Term::Var(ys)])],
            1,
        );
        // permute([], []).
        let r3 = LpRule::new(
            Term::Fun(permute, vec![Term::Fun(nil, vec![]), Term::Fun(nil, vec![])]),
            vec![],
            2,
        );
        // permute([X|Xs], [Y|Ys]) :- delete(Y, [X|Xs], Zs), permute(Zs, Ys).
        let (x3, xs3, y3, ys3, zs) = (
            reg.fresh_var(),
            reg.fresh_var(),
            reg.fresh_var(),
            reg.fresh_var(),
            reg.fresh_var(),
        );
        let r4 = LpRule::new(
            Term::Fun(
                permute,
                vec![
                    Term::Fun(cons, vec![Term::Var(x3), Term::Var(xs3)]),
                    Term::Fun(cons, vec![Term::Var(y3), Term::Var(ys3)]),
                ],
            ),
            vec![
                Term::Fun(
                    delete,
                    vec![
                        Term::Var(y3),
                        Term::Fun(cons, vec![Term::Var(x3), Term::Var(xs3)]),
                        Term::Var(zs),
                    ],
                ),
                Term::Fun(permute, vec![Term::Var(zs), Term::Var(ys3)]),
            ],
            3,
        );
        let permute_mode = Mode::new(permute, vec![1]);
        Program::lp(vec![r1, r2, r3, r4], vec![permute_mode], reg)
    }

    #[test]
    fn binary_unfolding_finds_the_permute_loop() {
        let program = permute_program();
        let cancel = CancelToken::new();
        let mut unf = BinaryUnfolding::seed(&program);
        let mut found = None;
        for _ in 0..4 {
            let fresh = unf.iterate(&cancel);
            if fresh.is_empty() {
                break;
            }
            for u in unf.binary_rules(&fresh) {
                if let Some(lp) = LoopingPair::unit_loop(&u.rule) {
                    found = Some(lp);
                    break;
                }
            }
            if found.is_some() {
                break;
            }
        }
        let lp = found.expect("permute loop not found");
        let query = lp.query_for(&program.modes[0], &program.registry).unwrap();
        let Term::Fun(p, args) = &query else { panic!() };
        assert_eq!(*p, program.registry.lookup("permute", 2).unwrap());
        assert!(matches!(args[0], Term::Var(_)));
        assert!(args[1].is_ground());
    }

    #[test]
    fn iterations_tag_their_rules() {
        let program = permute_program();
        let cancel = CancelToken::new();
        let mut unf = BinaryUnfolding::seed(&program);
        let fresh = unf.iterate(&cancel);
        assert!(!fresh.is_empty());
        for &i in &fresh {
            assert_eq!(unf.rules[i].iteration, 1);
            assert!(unf.rules[i].parent.is_some());
        }
    }

    #[test]
    fn terminating_program_reaches_an_empty_iteration() {
        // p(a).  q(X) :- p(X).
        let reg = Arc::new(SymbolRegistry::new());
        let p = reg.function("p", 1);
        let q = reg.function("q", 1);
        let a = reg.function("a", 0);
        let x = reg.fresh_var();
        let fact = LpRule::new(Term::Fun(p, vec![Term::Fun(a, vec![])]), vec![], 0);
        let rule = LpRule::new(
            Term::Fun(q, vec![Term::Var(x)]),
            vec![Term::Fun(p, vec![Term::Var(x)])],
            1,
        );
        let program = Program::lp(vec![fact, rule], vec![], reg);
        let cancel = CancelToken::new();
        let mut unf = BinaryUnfolding::seed(&program);
        let mut iterations = 0;
        loop {
            let fresh = unf.iterate(&cancel);
            iterations += 1;
            if fresh.is_empty() {
                break;
            }
            assert!(iterations < 8, "fixpoint expected quickly");
        }
    }

    #[test]
    fn pattern_seed_finds_growing_recursion() {
        // p(X) :- p(f(X)): the self-pumping schema validates with α = 0.
        let reg = Arc::new(SymbolRegistry::new());
        let p = reg.function("p", 1);
        let f = reg.function("f", 1);
        let x = reg.fresh_var();
        let rule = LpRule::new(
            Term::Fun(p, vec![Term::Var(x)]),
            vec![Term::Fun(p, vec![Term::Fun(f, vec![Term::Var(x)])])],
            0,
        );
        let program = Program::lp(vec![rule], vec![], reg);
        let unfolding = PatternUnfolding::seed(&program);
        assert!(unfolding
            .rules
            .iter()
            .any(|r| matches!(r.alpha(), Some((0, t)) if t.is_ground())));
    }

    #[test]
    fn cancellation_stops_mid_iteration() {
        let program = permute_program();
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut unf = BinaryUnfolding::seed(&program);
        assert!(unf.iterate(&cancel).is_empty());
    }
}
