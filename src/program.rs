//! Rule and program model
//!
//! Containers for logic programs and rewrite systems, the LP *mode*
//! declarations, iteration-tagged unfolded rules, and the arena that records
//! parent links for verbose proof reconstruction. Rules carry their ordinal
//! in the input file so traces can point back at the source program.
//!
//! Arena nodes are integer-indexed and parents are back-indices; the arena
//! is dropped with the proof, so no cyclic ownership ever forms.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::Arc;

use crate::symbols::{SymId, SymbolRegistry, VarId};
use crate::term::Term;

/// An LP rule `h ← b1,…,bn`; a *fact* when `n = 0`, *binary* when `n = 1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LpRule {
    pub head: Term,
    pub body: Vec<Term>,
    /// Ordinal of the rule in the input file, for trace identification.
    pub num: usize,
}

impl LpRule {
    pub fn new(head: Term, body: Vec<Term>, num: usize) -> Self {
        Self { head, body, num }
    }

    #[inline]
    pub fn is_fact(&self) -> bool {
        self.body.is_empty()
    }

    #[inline]
    pub fn is_binary(&self) -> bool {
        self.body.len() == 1
    }

    /// Copy with a private variable namespace.
    pub fn deep_copy(&self, reg: &SymbolRegistry) -> LpRule {
        let mut copies = HashMap::new();
        LpRule {
            head: self.head.deep_copy(reg, &mut copies),
            body: self.body.iter().map(|b| b.deep_copy(reg, &mut copies)).collect(),
            num: self.num,
        }
    }

    pub fn render(&self, reg: &SymbolRegistry) -> String {
        let mut names = crate::term::VarNames::default();
        if self.body.is_empty() {
            format!("{}.", self.head.render_with(reg, &mut names))
        } else {
            let head = self.head.render_with(reg, &mut names);
            let body: Vec<String> =
                self.body.iter().map(|b| b.render_with(reg, &mut names)).collect();
            format!("{} :- {}.", head, body.join(", "))
        }
    }
}

/// A TRS rule `l → r`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrsRule {
    pub lhs: Term,
    pub rhs: Term,
    pub num: usize,
}

impl TrsRule {
    pub fn new(lhs: Term, rhs: Term, num: usize) -> Self {
        Self { lhs, rhs, num }
    }

    /// Root symbol of the left-hand side, when it is a function application.
    pub fn defined_symbol(&self) -> Option<SymId> {
        match &self.lhs {
            Term::Fun(f, _) => Some(*f),
            _ => None,
        }
    }

    pub fn depth(&self) -> usize {
        self.lhs.depth().max(self.rhs.depth())
    }

    pub fn deep_copy(&self, reg: &SymbolRegistry) -> TrsRule {
        let mut copies = HashMap::new();
        TrsRule {
            lhs: self.lhs.deep_copy(reg, &mut copies),
            rhs: self.rhs.deep_copy(reg, &mut copies),
            num: self.num,
        }
    }

    pub fn render(&self, reg: &SymbolRegistry) -> String {
        let mut names = crate::term::VarNames::default();
        format!(
            "{} -> {}",
            self.lhs.render_with(reg, &mut names),
            self.rhs.render_with(reg, &mut names)
        )
    }
}

/// Input-mode declaration for an LP predicate `p/n`: the set of argument
/// positions marked `i`/`b`/`g` in the `%query:` line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mode {
    pub pred: SymId,
    pub inputs: Vec<usize>,
}

impl Mode {
    pub fn new(pred: SymId, mut inputs: Vec<usize>) -> Self {
        inputs.sort_unstable();
        inputs.dedup();
        Self { pred, inputs }
    }

    pub fn render(&self, reg: &SymbolRegistry) -> String {
        let arity = reg.arity(self.pred);
        let marks: Vec<&str> =
            (0..arity).map(|i| if self.inputs.contains(&i) { "i" } else { "o" }).collect();
        format!("{}({})", reg.name(self.pred), marks.join(","))
    }
}

/// Which formalism a parsed file describes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProgramKind {
    Lp,
    Trs,
}

/// A parsed problem: rules of one formalism plus LP modes, sharing one
/// symbol registry for the whole proof.
#[derive(Clone, Debug)]
pub struct Program {
    pub kind: ProgramKind,
    pub lp_rules: Vec<LpRule>,
    pub trs_rules: Vec<TrsRule>,
    pub modes: Vec<Mode>,
    pub registry: Arc<SymbolRegistry>,
}

impl Program {
    pub fn lp(rules: Vec<LpRule>, modes: Vec<Mode>, registry: Arc<SymbolRegistry>) -> Self {
        Self { kind: ProgramKind::Lp, lp_rules: rules, trs_rules: Vec::new(), modes, registry }
    }

    pub fn trs(rules: Vec<TrsRule>, registry: Arc<SymbolRegistry>) -> Self {
        Self {
            kind: ProgramKind::Trs,
            lp_rules: Vec::new(),
            trs_rules: rules,
            modes: Vec::new(),
            registry,
        }
    }

    /// Root symbols of TRS left-hand sides.
    pub fn defined_symbols(&self) -> Vec<SymId> {
        let mut out: Vec<SymId> =
            self.trs_rules.iter().filter_map(TrsRule::defined_symbol).collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Maximum term depth across all rules.
    pub fn depth(&self) -> usize {
        let lp = self
            .lp_rules
            .iter()
            .map(|r| r.head.depth().max(r.body.iter().map(Term::depth).max().unwrap_or(0)))
            .max()
            .unwrap_or(0);
        let trs = self.trs_rules.iter().map(TrsRule::depth).max().unwrap_or(0);
        lp.max(trs)
    }

    pub fn rule_count(&self) -> usize {
        self.lp_rules.len() + self.trs_rules.len()
    }

    pub fn render(&self) -> String {
        let reg = &self.registry;
        let mut out = String::new();
        for r in &self.lp_rules {
            out.push_str(&r.render(reg));
            out.push('\n');
        }
        for r in &self.trs_rules {
            out.push_str(&r.render(reg));
            out.push('\n');
        }
        for m in &self.modes {
            out.push_str(&format!("%query: {}\n", m.render(reg)));
        }
        out
    }
}

// ============================================================================
// Iteration-tagged unfolded rules and the trace arena
// ============================================================================

/// Index of a trace node in its arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TraceId(pub u32);

struct TraceNode {
    text: String,
    iteration: usize,
    parent: Option<TraceId>,
}

/// Arena of derivation steps for verbose proofs. Parents are back-indices;
/// the whole arena is dropped once the proof is printed.
#[derive(Default)]
pub struct TraceArena {
    nodes: Vec<TraceNode>,
}

impl TraceArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, text: String, iteration: usize, parent: Option<TraceId>) -> TraceId {
        let id = TraceId(self.nodes.len() as u32);
        self.nodes.push(TraceNode { text, iteration, parent });
        id
    }

    /// The derivation path ending at `id`, root first.
    pub fn path(&self, id: TraceId) -> Vec<(usize, &str)> {
        let mut rev = Vec::new();
        let mut cur = Some(id);
        while let Some(TraceId(i)) = cur {
            let node = &self.nodes[i as usize];
            rev.push((node.iteration, node.text.as_str()));
            cur = node.parent;
        }
        rev.reverse();
        rev
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// An LP rule tagged with the unfolding iteration that produced it.
#[derive(Clone, Debug)]
pub struct UnfoldedLpRule {
    pub rule: LpRule,
    pub iteration: usize,
    pub parent: Option<TraceId>,
}

impl UnfoldedLpRule {
    pub fn seed(rule: LpRule) -> Self {
        Self { rule, iteration: 0, parent: None }
    }
}

/// Instantiate the input positions of `head` according to `mode`, replacing
/// each input argument by its groundified form. Used when a witness is
/// matched against a declared mode.
pub fn instantiate_inputs(head: &Term, mode: &Mode, reg: &SymbolRegistry) -> Option<Term> {
    let Term::Fun(f, args) = head else { return None };
    if *f != mode.pred {
        return None;
    }
    let out: Vec<Term> = args
        .iter()
        .enumerate()
        .map(|(i, a)| {
            if mode.inputs.contains(&i) {
                crate::pattern::groundify(a, reg)
            } else {
                Term::Var(reg.fresh_var())
            }
        })
        .collect();
    Some(Term::Fun(*f, out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn facts_and_binary_rules_are_classified() {
        let reg = SymbolRegistry::new();
        let p = reg.function("p", 1);
        let x = reg.fresh_var();
        let head = Term::Fun(p, vec![Term::Var(x)]);
        let fact = LpRule::new(head.clone(), vec![], 0);
        let binary = LpRule::new(head.clone(), vec![head.clone()], 1);
        assert!(fact.is_fact());
        assert!(binary.is_binary());
        assert!(!binary.is_fact());
    }

    #[test]
    fn deep_copy_gives_private_variables_across_head_and_body() {
        let reg = SymbolRegistry::new();
        let p = reg.function("p", 1);
        let x = reg.fresh_var();
        let rule = LpRule::new(
            Term::Fun(p, vec![Term::Var(x)]),
            vec![Term::Fun(p, vec![Term::Var(x)])],
            0,
        );
        let copy = rule.deep_copy(&reg);
        assert!(rule.head.is_variant_of(&copy.head));
        // The copy's head and body still share their variable.
        assert_eq!(copy.head, copy.body[0]);
        assert!(!copy.head.contains_var(x));
    }

    #[test]
    fn deep_copies_print_identically() {
        let reg = SymbolRegistry::new();
        let p = reg.function("p", 2);
        let f = reg.function("f", 1);
        let x = reg.fresh_var();
        let y = reg.fresh_var();
        let rule = LpRule::new(
            Term::Fun(p, vec![Term::Var(x), Term::Fun(f, vec![Term::Var(y)])]),
            vec![Term::Fun(p, vec![Term::Var(y), Term::Var(x)])],
            0,
        );
        let copy = rule.deep_copy(&reg);
        assert_eq!(rule.render(&reg), copy.render(&reg));
    }

    #[test]
    fn trace_paths_walk_back_indices() {
        let mut arena = TraceArena::new();
        let a = arena.push("r0".into(), 0, None);
        let b = arena.push("r1".into(), 1, Some(a));
        let c = arena.push("r2".into(), 2, Some(b));
        let path = arena.path(c);
        assert_eq!(path, vec![(0, "r0"), (1, "r1"), (2, "r2")]);
    }

    #[test]
    fn mode_instantiation_grounds_input_positions_only() {
        let reg = SymbolRegistry::new();
        let p = reg.function("p", 2);
        let x = reg.fresh_var();
        let y = reg.fresh_var();
        let head = Term::Fun(p, vec![Term::Var(x), Term::Var(y)]);
        let mode = Mode::new(p, vec![1]);
        let q = instantiate_inputs(&head, &mode, &reg).unwrap();
        let Term::Fun(_, args) = &q else { panic!() };
        assert!(matches!(args[0], Term::Var(_)));
        assert!(args[1].is_ground());
    }
}
