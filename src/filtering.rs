//! Argument filtering
//!
//! A filtering `π` chooses, for every symbol, either a *collapsing*
//! projection onto one argument or a *non-collapsing* subset of argument
//! positions to keep. Filtered problems are often orientable where the
//! original is not, so the finiteness processors retry each order under
//! every filtering — unless the instantiation count exceeds
//! [`FILTER_MAX_INSTANTIATIONS`], in which case the whole attempt bails out.

#![forbid(unsafe_code)]

use std::collections::HashMap;

use crate::program::TrsRule;
use crate::symbols::SymId;
use crate::term::Term;

/// Cap on the number of enumerated filterings.
pub const FILTER_MAX_INSTANTIATIONS: u64 = 5000;

/// Per-symbol choice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolFilter {
    /// Project onto the argument at this index.
    Collapsing(usize),
    /// Keep exactly these positions, ascending.
    NonCollapsing(Vec<usize>),
}

/// A complete filtering; symbols outside the map are kept untouched.
#[derive(Clone, Debug, Default)]
pub struct Filtering {
    map: HashMap<SymId, SymbolFilter>,
}

impl Filtering {
    pub fn identity() -> Self {
        Self::default()
    }

    pub fn set(&mut self, sym: SymId, filter: SymbolFilter) {
        self.map.insert(sym, filter);
    }

    pub fn get(&self, sym: SymId) -> Option<&SymbolFilter> {
        self.map.get(&sym)
    }

    /// Apply the filtering to a term.
    pub fn apply(&self, t: &Term) -> Term {
        match t {
            Term::Var(_) | Term::Hole(_) => t.clone(),
            Term::Hat(h) => {
                Term::Hat(crate::term::HatTerm { arg: Box::new(self.apply(&h.arg)), ..h.clone() })
            }
            Term::Fun(f, args) => match self.map.get(f) {
                None => Term::Fun(*f, args.iter().map(|a| self.apply(a)).collect()),
                Some(SymbolFilter::Collapsing(i)) => args
                    .get(*i)
                    .map(|a| self.apply(a))
                    .unwrap_or_else(|| Term::Fun(*f, Vec::new())),
                Some(SymbolFilter::NonCollapsing(keep)) => Term::Fun(
                    *f,
                    keep.iter().filter_map(|&i| args.get(i)).map(|a| self.apply(a)).collect(),
                ),
            },
        }
    }

    /// Apply to a whole rule.
    pub fn apply_rule(&self, rule: &TrsRule) -> TrsRule {
        TrsRule::new(self.apply(&rule.lhs), self.apply(&rule.rhs), rule.num)
    }
}

/// Count the instantiations for a signature: collapsing choices (`arity`)
/// plus non-collapsing subsets (`2^arity`) per symbol.
pub fn instantiation_count(signature: &[(SymId, usize)]) -> u64 {
    let mut total: u64 = 1;
    for &(_, arity) in signature {
        let per = arity as u64 + (1u64 << arity.min(20));
        total = total.saturating_mul(per);
        if total > FILTER_MAX_INSTANTIATIONS {
            return total;
        }
    }
    total
}

/// Enumerate every filtering of the signature, or `None` when the count
/// exceeds the cap.
pub fn enumerate_filters(signature: &[(SymId, usize)]) -> Option<Vec<Filtering>> {
    if instantiation_count(signature) > FILTER_MAX_INSTANTIATIONS {
        return None;
    }
    let mut out = vec![Filtering::identity()];
    for &(sym, arity) in signature {
        let mut choices: Vec<SymbolFilter> = Vec::new();
        for i in 0..arity {
            choices.push(SymbolFilter::Collapsing(i));
        }
        for mask in 0u32..(1u32 << arity) {
            let keep: Vec<usize> = (0..arity).filter(|&i| mask & (1 << i) != 0).collect();
            choices.push(SymbolFilter::NonCollapsing(keep));
        }
        let mut next = Vec::with_capacity(out.len() * choices.len());
        for base in &out {
            for choice in &choices {
                let mut f = base.clone();
                f.set(sym, choice.clone());
                next.push(f);
            }
        }
        out = next;
    }
    Some(out)
}

/// The signature (symbols with arity) occurring in a rule set.
pub fn signature_of(rules: &[TrsRule]) -> Vec<(SymId, usize)> {
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
