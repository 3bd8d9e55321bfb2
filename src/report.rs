//! Verdicts, proof outcomes, and the textual report surface
//!
//! The final answer of a proof is a [`Verdict`] plus an optional *proof
//! argument* block and, in verbose mode, an additional *proof description*
//! block reconstructed from the trace arena. `MAYBE` answers append the
//! challenge hint. `-stat` serializes [`ProgramStats`] as JSON.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use serde::Serialize;

use crate::program::{Program, ProgramKind};

/// Final verdict of a proof.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Yes,
    No,
    Maybe,
    Error,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Yes => "YES",
            Verdict::No => "NO",
            Verdict::Maybe => "MAYBE",
            Verdict::Error => "ERROR",
        }
    }

    /// Conclusive answers win the race and cancel the other provers.
    #[inline]
    pub fn is_conclusive(self) -> bool {
        matches!(self, Verdict::Yes | Verdict::No)
    }
}

/// A prover's answer: verdict, argument, optional verbose description.
#[derive(Clone, Debug)]
pub struct ProofOutcome {
    pub verdict: Verdict,
    pub argument: Option<String>,
    pub description: Option<String>,
}

impl ProofOutcome {
    pub fn verdict(verdict: Verdict) -> Self {
        Self { verdict, argument: None, description: None }
    }

    pub fn with_argument(verdict: Verdict, argument: impl Into<String>) -> Self {
        Self { verdict, argument: Some(argument.into()), description: None }
    }

    pub fn maybe() -> Self {
        Self::verdict(Verdict::Maybe)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::with_argument(Verdict::Error, message)
    }

    /// Render the answer per the output contract: the verdict, then the
    /// delimited argument block, then (verbose only) the description block;
    /// `MAYBE` ends with the challenge hint.
    pub fn render(&self, verbose: bool) -> String {
        let mut out = String::from(self.verdict.as_str());
        if let Some(arg) = &self.argument {
            out.push_str("\n\n** BEGIN proof argument **\n");
            out.push_str(arg);
            out.push_str("\n** END proof argument **");
        }
        if verbose {
            if let Some(desc) = &self.description {
                out.push_str("\n\n** BEGIN proof description **\n");
                out.push_str(desc);
                out.push_str("\n** END proof description **");
            }
        }
        if self.verdict == Verdict::Maybe {
            out.push_str(
                "\n\nPlease submit challenging problems to the termination competition!",
            );
        }
        out
    }
}

/// Statistics of a parsed problem, for the `-stat` action.
#[derive(Debug, Serialize)]
pub struct ProgramStats {
    pub kind: &'static str,
    pub rules: usize,
    pub symbols: usize,
    pub max_arity: usize,
    pub depth: usize,
    pub modes: Vec<String>,
}

impl ProgramStats {
    pub fn of(program: &Program) -> Self {
        let reg = &program.registry;
        let max_arity = program
            .lp_rules
            .iter()
            .flat_map(|r| std::iter::once(&r.head).chain(r.body.iter()))
            .chain(program.trs_rules.iter().flat_map(|r| [&r.lhs, &r.rhs]))
            .map(|t| t.max_arity())
            .max()
            .unwrap_or(0);
        Self {
            kind: match program.kind {
                ProgramKind::Lp => "LP",
                ProgramKind::Trs => "TRS",
            },
            rules: program.rule_count(),
            symbols: reg.len(),
            max_arity,
            depth: program.depth(),
            modes: program.modes.iter().map(|m| m.render(reg)).collect(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conclusive_verdicts_are_yes_and_no() {
        assert!(Verdict::Yes.is_conclusive());
        assert!(Verdict::No.is_conclusive());
        assert!(!Verdict::Maybe.is_conclusive());
        assert!(!Verdict::Error.is_conclusive());
    }

    #[test]
    fn render_wraps_the_argument_block() {
        let o = ProofOutcome::with_argument(Verdict::No, "witness query p(_, [0|0])");
        let text = o.render(false);
        assert!(text.starts_with("NO"));
        assert!(text.contains("** BEGIN proof argument **"));
        assert!(text.contains("** END proof argument **"));
        assert!(!text.contains("submit challenging"));
    }

    #[test]
    fn maybe_appends_the_challenge_hint() {
        let text = ProofOutcome::maybe().render(false);
        assert!(text.starts_with("MAYBE"));
        assert!(text.contains("submit challenging"));
    }

    #[test]
    fn description_appears_only_in_verbose_mode() {
        let mut o = ProofOutcome::with_argument(Verdict::No, "arg");
        o.description = Some("derivation path".into());
        assert!(!o.render(false).contains("proof description"));
        assert!(o.render(true).contains("derivation path"));
    }
}
