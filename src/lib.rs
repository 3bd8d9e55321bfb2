//! Crate root: public surface and proof-wide invariants
//!
//! `nonterm` is an automated (non)termination prover for pure logic programs
//! and term/string rewriting systems. Given a parsed [`program::Program`],
//! [`scheduler::prove_termination`] races several provers — unfolding-based
//! nontermination search and order-based finiteness processors — and merges
//! the first conclusive verdict.
//!
//! ## Invariants
//!
//! - **One registry per proof.** Every symbol used in a proof is interned in
//!   the single [`symbols::SymbolRegistry`] shared (behind `Arc`) by all
//!   racing prover threads; variables are identities from its monotone
//!   allocator and are never reused.
//! - **Private namespaces.** Whenever an unfolding step would otherwise
//!   mutate shared structure, rules and substitutions are deep-copied with
//!   fresh variables first. Witnesses are immutable once accepted.
//! - **Errors are values.** Every fallible operation returns `Result` or
//!   `Option`; prover failures surface as result variants and the
//!   coordinator treats `ERROR` as a logged non-answer, never a winner.
//! - **Cooperative cancellation.** Long loops poll a [`CancelToken`] between
//!   units of work and bail out with partial (`MAYBE`) results.

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Interned symbols, the variable allocator, and blackboard counters.
pub mod symbols;
/// First-order terms, positions, context towers.
pub mod term;
/// Substitution algebra.
pub mod subst;
/// Unification, matching, disagreement positions.
pub mod unify;
/// Gauss–Jordan over the naturals.
pub mod linsys;
/// Pattern substitutions, pattern terms, and the α-threshold machinery.
pub mod pattern;
/// Rules, programs, modes, unfolded rules, trace arena.
pub mod program;
/// Sets of Positions with the DN1–DN4 fixpoint.
pub mod sop;
/// Dependency pairs, graph estimation, SCC decomposition.
pub mod dpgraph;
/// LP binary and pattern unfolding operators.
pub mod unfold_lp;
/// TRS dependency-pair triples and guided unfolding.
pub mod unfold_trs;
/// EEG'12 pattern-rule narrowing and Theorem 8.
pub mod eeg;
/// Nontermination witnesses.
pub mod witness;
/// LPO and KBO reduction orders.
pub mod orders;
/// Polynomial interpretations.
pub mod poly;
/// Argument filtering.
pub mod filtering;
/// DP processors: finiteness and unfolding-based infinite detection.
pub mod processors;
/// LP prover tasks.
pub mod prover_lp;
/// TRS prover tasks.
pub mod prover_trs;
/// The race coordinator.
pub mod scheduler;
/// External cTI adapter.
pub mod cti;
/// Input-format adapters (`.pl`, `.ari`, `.trs`, `.srs`, `.xml`).
pub mod parse;
/// Verdicts, proof outcomes, statistics.
pub mod report;

// ============================================================================
// Canonical re-exports
// ============================================================================

pub use crate::parse::{parse_file, ParseError};
pub use crate::program::{Program, ProgramKind};
pub use crate::report::{ProgramStats, ProofOutcome, Verdict};
pub use crate::scheduler::{prove_termination, ProverConfig};
pub use crate::symbols::{SymId, SymbolRegistry, VarId};

// ============================================================================
// Cancellation
// ============================================================================

/// Shared cooperative-cancellation flag.
///
/// The coordinator owns one token per race; every long loop in the provers
/// polls it between elementary steps (one unfolding, one unification, one
/// coefficient instantiation) and returns a partial result once it flips.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; idempotent.
    #[inline]
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_is_shared_across_clones() {
        let a = CancelToken::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }
}
