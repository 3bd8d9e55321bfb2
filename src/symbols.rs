//! Symbol registry: interned function symbols and the variable allocator
//!
//! Every symbol used in one proof comes from a single [`SymbolRegistry`].
//! Symbols are interned by `(name, arity, kind)`; hat symbols are interned
//! by their context **up to α-equivalence** (the hole variable is rewritten
//! to a canonical placeholder before the context is used as a key), so two
//! hat symbols with α-equivalent contexts are identified.
//!
//! Variables are deliberately *not* interned. A variable is an identity: two
//! variables are equal iff they carry the same [`VarId`], and the allocator
//! is a monotonically increasing counter. The registry also hosts the
//! process-wide "blackboard" counters (generated-rules count), updated
//! atomically so racing prover threads can share them without locking.
//!
//! The insert path takes the single write lock; lookups take the read lock
//! over the same append-only table, which preserves linearizability.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use crate::term::Term;

/// Identity of an interned symbol. Cheap to copy, valid for the whole process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SymId(pub u32);

impl SymId {
    /// Access the underlying index.
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Identity of a variable. Never reused within a process.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VarId(pub u64);

/// The three symbol kinds of the term model.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// Plain first-order function symbol.
    Function,
    /// Dependency-pair "sharped" variant of a function symbol.
    Tuple,
    /// Hat symbol carrying a ground 1-context.
    Hat,
}

/// Errors surfaced on symbol construction.
#[derive(Debug, thiserror::Error)]
pub enum SymbolError {
    #[error("hat symbol context must contain its hole exactly once (found {0})")]
    BadHoleCount(usize),
    #[error("hat symbol context must not be the bare hole")]
    EmptyContext,
}

#[derive(Debug)]
struct SymbolData {
    name: String,
    arity: usize,
    kind: SymbolKind,
    /// Canonicalized 1-context of a hat symbol (hole rewritten to `Hole(0)`).
    context: Option<Term>,
}

#[derive(Default, Debug)]
struct Inner {
    syms: Vec<SymbolData>,
    by_key: HashMap<(String, usize, SymbolKind), SymId>,
    by_context: HashMap<Term, SymId>,
}

/// Process-wide symbol table, variable allocator, and blackboard counters.
///
/// One registry is shared (behind `Arc`) by every prover thread racing on a
/// problem. `get`-style methods are idempotent and thread-safe.
#[derive(Debug)]
pub struct SymbolRegistry {
    inner: RwLock<Inner>,
    next_var: AtomicU64,
    rules_generated: AtomicU64,
}

impl SymbolRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            next_var: AtomicU64::new(0),
            rules_generated: AtomicU64::new(0),
        }
    }

    /// Intern a plain function symbol. Idempotent for equal `(name, arity)`.
    pub fn function(&self, name: &str, arity: usize) -> SymId {
        self.intern(name, arity, SymbolKind::Function, None)
    }

    /// Intern the tuple ("sharped") variant of `sym`, with the same arity.
    pub fn sharp(&self, sym: SymId) -> SymId {
        let (name, arity) = {
            let inner = self.inner.read().expect("registry poisoned");
            let d = &inner.syms[sym.as_usize()];
            (format!("{}#", d.name), d.arity)
        };
        self.intern(&name, arity, SymbolKind::Tuple, None)
    }

    /// Intern a hat symbol for the ground 1-context `context` whose hole is
    /// the variable `hole`. Contexts that are α-equivalent (equal after the
    /// hole is canonicalized) collapse to one identity.
    pub fn hat(&self, context: &Term, hole: VarId) -> Result<SymId, SymbolError> {
        let occurrences = context.count_var(hole);
        if occurrences != 1 {
            return Err(SymbolError::BadHoleCount(occurrences));
        }
        let canonical = context.canonicalize_hole(hole);
        if matches!(canonical, Term::Hole(_)) {
            return Err(SymbolError::EmptyContext);
        }

        if let Some(&id) = self.inner.read().expect("registry poisoned").by_context.get(&canonical) {
            return Ok(id);
        }
        let mut inner = self.inner.write().expect("registry poisoned");
        if let Some(&id) = inner.by_context.get(&canonical) {
            return Ok(id);
        }
        let id = SymId(inner.syms.len() as u32);
        let name = match &canonical {
            Term::Fun(root, _) => format!("{}^", inner.syms[root.as_usize()].name),
            _ => "ctx^".to_string(),
        };
        inner.syms.push(SymbolData {
            name,
            arity: 1,
            kind: SymbolKind::Hat,
            context: Some(canonical.clone()),
        });
        inner.by_context.insert(canonical, id);
        Ok(id)
    }

    fn intern(&self, name: &str, arity: usize, kind: SymbolKind, context: Option<Term>) -> SymId {
        let key = (name.to_string(), arity, kind);
        if let Some(&id) = self.inner.read().expect("registry poisoned").by_key.get(&key) {
            return id;
        }
        let mut inner = self.inner.write().expect("registry poisoned");
        if let Some(&id) = inner.by_key.get(&key) {
            return id;
        }
        let id = SymId(inner.syms.len() as u32);
        inner.syms.push(SymbolData { name: name.to_string(), arity, kind, context });
        inner.by_key.insert(key, id);
        id
    }

    /// Look up an existing function symbol without creating one.
    pub fn lookup(&self, name: &str, arity: usize) -> Option<SymId> {
        let inner = self.inner.read().expect("registry poisoned");
        inner.by_key.get(&(name.to_string(), arity, SymbolKind::Function)).copied()
    }

    pub fn name(&self, sym: SymId) -> String {
        self.inner.read().expect("registry poisoned").syms[sym.as_usize()].name.clone()
    }

    pub fn arity(&self, sym: SymId) -> usize {
        self.inner.read().expect("registry poisoned").syms[sym.as_usize()].arity
    }

    pub fn kind(&self, sym: SymId) -> SymbolKind {
        self.inner.read().expect("registry poisoned").syms[sym.as_usize()].kind
    }

    /// The canonical context of a hat symbol (hole is `Term::Hole(0)`).
    pub fn context(&self, sym: SymId) -> Option<Term> {
        self.inner.read().expect("registry poisoned").syms[sym.as_usize()].context.clone()
    }

    /// Number of interned symbols.
    pub fn len(&self) -> usize {
        self.inner.read().expect("registry poisoned").syms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All interned symbols of a given kind, in interning order.
    pub fn of_kind(&self, kind: SymbolKind) -> Vec<SymId> {
        let inner = self.inner.read().expect("registry poisoned");
        (0..inner.syms.len())
            .filter(|&i| inner.syms[i].kind == kind)
            .map(|i| SymId(i as u32))
            .collect()
    }

    // ------------------------- Variables & counters -------------------------

    /// Allocate a fresh variable identity.
    #[inline]
    pub fn fresh_var(&self) -> VarId {
        VarId(self.next_var.fetch_add(1, Ordering::Relaxed))
    }

    /// Record `n` newly generated rules on the shared blackboard.
    #[inline]
    pub fn note_generated_rules(&self, n: u64) {
        self.rules_generated.fetch_add(n, Ordering::Relaxed);
    }

    /// Total rules generated so far across all prover threads.
    #[inline]
    pub fn rules_generated(&self) -> u64 {
        self.rules_generated.load(Ordering::Relaxed)
    }
}

impl Default for SymbolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
