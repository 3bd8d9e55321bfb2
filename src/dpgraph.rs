//! Dependency pairs, the dependency graph, and SCC decomposition
//!
//! For a rule `l → r` and each subterm `g(…)` of `r` whose root is a defined
//! symbol, the dependency pair `l# → g#(…)` is emitted with tuple ("sharped")
//! root symbols. Graph edges are estimated with the usual `REN(CAP(·))`
//! approximation: the capped, linearized right-hand side of one pair must
//! unify with the left-hand side of the next.
//!
//! Decomposition removes strictly decreasing pairs and returns the SCCs of
//! the remaining subgraph as independent subproblems; among candidate
//! decompositions the preferred one has fewer subproblems, ties broken by a
//! smaller average pair count per SCC.

#![forbid(unsafe_code)]

use std::collections::HashMap;

use crate::program::TrsRule;
use crate::symbols::{SymId, SymbolRegistry};
use crate::term::Term;
use crate::unify;

/// A DP problem: the pairs under scrutiny plus the ambient rewrite rules.
#[derive(Clone, Debug)]
pub struct DpProblem {
    pub pairs: Vec<TrsRule>,
    pub trs: Vec<TrsRule>,
}

impl DpProblem {
    pub fn new(pairs: Vec<TrsRule>, trs: Vec<TrsRule>) -> Self {
        Self { pairs, trs }
    }
}

/// Extract the dependency pairs of `rules`, sharping the roots.
pub fn dependency_pairs(rules: &[TrsRule], reg: &SymbolRegistry) -> Vec<TrsRule> {
    let defined: Vec<SymId> = {
        let mut d: Vec<SymId> = rules.iter().filter_map(TrsRule::defined_symbol).collect();
        d.sort_unstable();
        d.dedup();
        d
    };
    let mut out = Vec::new();
    let mut num = 0;
    for rule in rules {
        let Term::Fun(lf, largs) = &rule.lhs else { continue };
        let sharp_l = Term::Fun(reg.sharp(*lf), largs.clone());
        for (_, sub) in rule.rhs.positions() {
            if let Term::Fun(g, gargs) = sub {
                if defined.contains(g) {
                    let sharp_r = Term::Fun(reg.sharp(*g), gargs.clone());
                    out.push(TrsRule::new(sharp_l.clone(), sharp_r, num));
                    num += 1;
                }
            }
        }
    }
    out
}

/// `CAP`: replace every subterm rooted in a defined symbol by a fresh
/// variable (the root itself is kept).
fn cap(t: &Term, defined: &[SymId], reg: &SymbolRegistry) -> Term {
    match t {
        Term::Fun(f, args) => Term::Fun(
            *f,
            args.iter()
                .map(|a| match a {
                    Term::Fun(g, _) if defined.contains(g) => Term::Var(reg.fresh_var()),
                    other => cap(other, defined, reg),
                })
                .collect(),
        ),
        _ => t.clone(),
    }
}

/// `REN`: replace every variable occurrence by a fresh variable.
fn ren(t: &Term, reg: &SymbolRegistry) -> Term {
    match t {
        Term::Var(_) => Term::Var(reg.fresh_var()),
        Term::Hole(_) => t.clone(),
        Term::Fun(f, args) => Term::Fun(*f, args.iter().map(|a| ren(a, reg)).collect()),
        Term::Hat(h) => Term::Hat(crate::term::HatTerm {
            arg: Box::new(ren(&h.arg, reg)),
            ..h.clone()
        }),
    }
}

/// Can a chain step go from `from` to `to`? (`REN(CAP(rhs))` unifies with a
/// renamed-apart copy of `lhs`.)
pub fn connectable(from: &TrsRule, to: &TrsRule, trs: &[TrsRule], reg: &SymbolRegistry) -> bool {
    let defined: Vec<SymId> = {
        let mut d: Vec<SymId> = trs.iter().filter_map(TrsRule::defined_symbol).collect();
        d.sort_unstable();
        d.dedup();
        d
    };
    let approx = ren(&cap(&from.rhs, &defined, reg), reg);
    let fresh_to = to.deep_copy(reg);
    unify::unify(&approx, &fresh_to.lhs).is_some()
}

/// Adjacency lists of the (estimated) dependency graph.
pub fn dependency_graph(problem: &DpProblem, reg: &SymbolRegistry) -> Vec<Vec<usize>> {
    let n = problem.pairs.len();
    let mut adj = vec![Vec::new(); n];
    for i in 0..n {
        for j in 0..n {
            if connectable(&problem.pairs[i], &problem.pairs[j], &problem.trs, reg) {
                adj[i].push(j);
            }
        }
    }
    adj
}

/// Tarjan's algorithm; returns only the *cyclic* SCCs (size > 1, or a single
/// node with a self-edge), each sorted ascending.
pub fn cyclic_sccs(adj: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = adj.len();
    let mut index = vec![usize::MAX; n];
    let mut low = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack: Vec<usize> = Vec::new();
    let mut next_index = 0usize;
    let mut out: Vec<Vec<usize>> = Vec::new();

    // Explicit DFS stack: (node, next-child cursor).
    for start in 0..n {
        if index[start] != usize::MAX {
            continue;
        }
        let mut work: Vec<(usize, usize)> = vec![(start, 0)];
        while !work.is_empty() {
            let (v, cursor) = *work.last().expect("work stack non-empty");
            if cursor == 0 {
                index[v] = next_index;
                low[v] = next_index;
                next_index += 1;
                stack.push(v);
                on_stack[v] = true;
            }
            if cursor < adj[v].len() {
                let w = adj[v][cursor];
                work.last_mut().expect("work stack non-empty").1 += 1;
                if index[w] == usize::MAX {
                    work.push((w, 0));
                } else if on_stack[w] {
                    low[v] = low[v].min(index[w]);
                }
            } else {
                if low[v] == index[v] {
                    let mut comp = Vec::new();
                    loop {
                        let w = stack.pop().expect("tarjan stack underflow");
                        on_stack[w] = false;
                        comp.push(w);
                        if w == v {
                            break;
                        }
                    }
                    comp.sort_unstable();
                    let cyclic = comp.len() > 1 || adj[comp[0]].contains(&comp[0]);
                    if cyclic {
                        out.push(comp);
                    }
                }
                work.pop();
                if let Some(&(parent, _)) = work.last() {
                    low[parent] = low[parent].min(low[v]);
                }
            }
        }
    }
    out.sort();
    out
}

/// Remove the pairs at `strict` and return the cyclic SCCs of the remaining
/// subgraph as subproblems.
pub fn decompose_after_removal(
    problem: &DpProblem,
    strict: &[usize],
    reg: &SymbolRegistry,
) -> Vec<DpProblem> {
    let keep: Vec<usize> =
        (0..problem.pairs.len()).filter(|i| !strict.contains(i)).collect();
    if keep.is_empty() {
        return Vec::new();
    }
    let sub = DpProblem::new(
        keep.iter().map(|&i| problem.pairs[i].clone()).collect(),
        problem.trs.clone(),
    );
    let adj = dependency_graph(&sub, reg);
    cyclic_sccs(&adj)
        .into_iter()
        .map(|comp| {
            DpProblem::new(
                comp.into_iter().map(|i| sub.pairs[i].clone()).collect(),
                problem.trs.clone(),
            )
        })
        .collect()
}

/// Preference between decompositions: fewer subproblems first, then smaller
/// average pair count per SCC.
pub fn better_decomposition(a: &[DpProblem], b: &[DpProblem]) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match a.len().cmp(&b.len()) {
        Ordering::Equal => {
            let avg = |ps: &[DpProblem]| -> f64 {
                if ps.is_empty() {
                    0.0
                } else {
                    ps.iter().map(|p| p.pairs.len()).sum::<usize>() as f64 / ps.len() as f64
                }
            };
            avg(a).partial_cmp(&avg(b)).unwrap_or(Ordering::Equal)
        }
        other => other,
    }
}

/// Is the pair set a *simple cycle* in the graph (every node exactly one
/// in-edge and one out-edge inside the set, single component)?
pub fn is_simple_cycle(pairs: &[TrsRule], trs: &[TrsRule], reg: &SymbolRegistry) -> bool {
    let n = pairs.len();
    if n == 0 {
        return false;
    }
    let problem = DpProblem::new(pairs.to_vec(), trs.to_vec());
    let adj = dependency_graph(&problem, reg);
    let mut indeg = vec![0usize; n];
    for edges in &adj {
        if edges.len() != 1 {
            return false;
        }
        indeg[edges[0]] += 1;
    }
    if indeg.iter().any(|&d| d != 1) {
        return false;
    }
    // One out-edge each and balanced in-degrees: a single cycle iff the walk
    // from node 0 visits everything.
    let mut seen = vec![false; n];
    let mut cur = 0usize;
    for _ in 0..n {
        if seen[cur] {
            return false;
        }
        seen[cur] = true;
        cur = adj[cur][0];
    }
    cur == 0 && seen.iter().all(|&s| s)
}

/// Group pairs by the root symbol of their left-hand sides. Used for quick
/// per-symbol statistics in reports.
pub fn pairs_by_root(pairs: &[TrsRule]) -> HashMap<SymId, Vec<usize>> {
    let mut out: HashMap<SymId, Vec<usize>> = HashMap::new();
    for (i, p) in pairs.iter().enumerate() {
        if let Some(root) = p.defined_symbol() {
            out.entry(root).or_default().push(i);
        }
    }
    out
}
