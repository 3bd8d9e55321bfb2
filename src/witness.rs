//! Nontermination witnesses
//!
//! Every prover reports success through one closed [`Witness`] type. A
//! witness is immutable once accepted; extension with further binary rules
//! builds a *new* witness (and re-shrinks the SoP, so DN is preserved by
//! construction). `proves_non_termination_of` instantiates the witness
//! against a declared mode and yields the atomic query shown to the user,
//! when the induced τ-consistency check passes.

#![forbid(unsafe_code)]

use crate::pattern::{groundify, PatternRule};
use crate::program::{instantiate_inputs, LpRule, Mode, TrsRule};
use crate::sop::SetOfPositions;
use crate::symbols::SymbolRegistry;
use crate::term::{context_power, Term};
use crate::unify;

/// A looping binary-rule sequence together with its DN-witnessing SoP.
#[derive(Clone, Debug)]
pub struct LoopingPair {
    pub rules: Vec<LpRule>,
    pub tau: SetOfPositions,
}

impl LoopingPair {
    /// A single rule `R` is a unit loop iff its body is τ-more-general than
    /// its head for some DN SoP.
    pub fn unit_loop(rule: &LpRule) -> Option<LoopingPair> {
        if !rule.is_binary() {
            return None;
        }
        let tau = SetOfPositions::dn_for(std::slice::from_ref(rule))?;
        if !tau.tau_more_general(&rule.body[0], &rule.head) {
            return None;
        }
        Some(LoopingPair { rules: vec![rule.clone()], tau })
    }

    /// Append a binary rule, keeping DN: the constructor re-shrinks τ and the
    /// extension is rejected when the longer sequence has no DN SoP.
    pub fn with_rule(&self, rule: &LpRule) -> Option<LoopingPair> {
        if !rule.is_binary() {
            return None;
        }
        let mut rules = self.rules.clone();
        rules.push(rule.clone());
        let tau = SetOfPositions::dn_for(&rules)?;
        Some(LoopingPair { rules, tau })
    }

    /// Ground the mode's input positions of the first head and keep the
    /// query iff the loop still closes onto the grounded head.
    pub fn query_for(&self, mode: &Mode, reg: &SymbolRegistry) -> Option<Term> {
        let head = &self.rules.first()?.head;
        let query = instantiate_inputs(head, mode, reg)?;
        let last_body = &self.rules.last()?.body[0];
        self.tau.tau_more_general(last_body, &query).then_some(query)
    }
}

/// TRS recurrent pair: a regular cycle that pumps a context tower, or a
/// chooser-projection loop in the style of Toyama's example.
#[derive(Clone, Debug)]
pub enum RecurrentPairTrs {
    /// `c1[c2^{n1}(s), c2^{n2}(t)]` rewrites into a larger instance of
    /// itself.
    ContextPump {
        context2: Term,
        pump: Term,
        n1: u64,
        n2: u64,
        start: Term,
    },
    /// A chooser symbol projects one shared argument onto each required
    /// ground instance.
    Chooser { start: Term },
}

impl RecurrentPairTrs {
    /// Build from two chain rules of the same root, `v_k` a variant of
    /// `u_{3−k}`. Fails fast (`None`) on any shape or divisibility mismatch.
    pub fn try_build(
        first: &TrsRule,
        second: &TrsRule,
        trs: &[TrsRule],
        reg: &SymbolRegistry,
    ) -> Option<RecurrentPairTrs> {
        if let Some(w) = Self::try_chooser(first, trs) {
            return Some(w);
        }
        Self::try_context_pump(first, second, reg)
    }

    /// Toyama-style shape: `l = f(…gᵢ…)` with pairwise distinct ground
    /// arguments, `r` repeating one variable at those positions, and a TRS
    /// symbol projecting each argument of itself.
    fn try_chooser(pair: &TrsRule, trs: &[TrsRule]) -> Option<RecurrentPairTrs> {
        let Term::Fun(f, largs) = &pair.lhs else { return None };
        let Term::Fun(g, rargs) = &pair.rhs else { return None };
        if f != g || largs.len() != rargs.len() {
            return None;
        }
        // The right side must repeat a single variable everywhere.
        let var = rargs.iter().find_map(|a| match a {
            Term::Var(v) => Some(*v),
            _ => None,
        })?;
        if !rargs.iter().all(|a| *a == Term::Var(var)) {
            return None;
        }
        let needed: Vec<&Term> = largs.iter().filter(|a| a.is_ground()).collect();
        if needed.is_empty() {
            return None;
        }
        // Find a chooser symbol: every projection g(x1..xk) → xi exists.
        for candidate in trs {
            let Term::Fun(c, cargs) = &candidate.lhs else { continue };
            let k = cargs.len();
            if k < needed.len() {
                continue;
            }
            let projections_complete = (0..needed.len()).all(|i| {
                trs.iter().any(|r| match (&r.lhs, &r.rhs) {
                    (Term::Fun(cc, args), Term::Var(v)) => {
                        *cc == *c
                            && args.len() == k
                            && matches!(args.get(i), Some(Term::Var(w)) if w == v)
                    }
                    _ => false,
                })
            });
            if !projections_complete {
                continue;
            }
            // Shared start argument: chooser applied to the needed values,
            // padded with the first value.
            let mut picks: Vec<Term> = needed.iter().map(|t| (*t).clone()).collect();
            while picks.len() < k {
                picks.push(picks[0].clone());
            }
            let shared = Term::Fun(*c, picks);
            let start = Term::Fun(*f, vec![shared; largs.len()]);
            return Some(RecurrentPairTrs::Chooser { start });
        }
        None
    }

    /// Context-pumping shape over two rules whose sides cross-match.
    fn try_context_pump(
        first: &TrsRule,
        second: &TrsRule,
        reg: &SymbolRegistry,
    ) -> Option<RecurrentPairTrs> {
        let (u1, v1) = (&first.lhs, &first.rhs);
        let (u2, v2) = (&second.lhs, &second.rhs);
        let root = match (u1, v1, u2, v2) {
            (Term::Fun(a, _), Term::Fun(b, _), Term::Fun(c, _), Term::Fun(d, _))
                if a == b && b == c && c == d =>
            {
                *a
            }
            _ => return None,
        };
        // The chain must close: v1 a variant of u2, then v2 is read in u1's
        // namespace through that renaming.
        let rho = unify::variant_unifier(u2, v1)?;
        let v2r = rho.apply(v2);
        let (Term::Fun(_, u1a), Term::Fun(_, v2a)) = (u1, &v2r) else { return None };
        // Locate the pumping square: a position where v2 wraps u1's argument
        // in a ground 1-context.
        for (i, (ua, va)) in u1a.iter().zip(v2a).enumerate() {
            if ua == va {
                continue;
            }
            let Term::Var(x) = ua else { continue };
            let Some((c2, n)) = crate::pattern::decompose_context_power(va, *x) else {
                continue;
            };
            if n == 0 {
                return None;
            }
            // Every other argument must cross-match so the cycle closes.
            let closes = u1a
                .iter()
                .zip(v2a)
                .enumerate()
                .all(|(j, (a, b))| j == i || unify::unify(a, b).is_some());
            if !closes {
                return None;
            }
            let seed = groundify(ua, reg);
            let mut args: Vec<Term> = u1a.iter().map(|t| groundify(t, reg)).collect();
            args[i] = context_power(&c2, n, &seed);
            let start = Term::Fun(root, args);
            return Some(RecurrentPairTrs::ContextPump {
                context2: c2.clone(),
                pump: seed,
                n1: n,
                n2: n,
                start,
            });
        }
        None
    }

    pub fn start_term(&self) -> &Term {
        match self {
            RecurrentPairTrs::ContextPump { start, .. } => start,
            RecurrentPairTrs::Chooser { start } => start,
        }
    }
}

/// The closed witness interface.
#[derive(Clone, Debug)]
pub enum Witness {
    /// LP unit loop / looping pair with its SoP.
    LoopingPair(LoopingPair),
    /// LP recurrent pair, carried as its validated pattern rule.
    RecurrentPairLp { rule: PatternRule, first: LpRule, second: LpRule },
    /// LP pattern rule with α-threshold.
    PatternRuleLp { rule: PatternRule },
    /// TRS recurrent pair.
    RecurrentPair(RecurrentPairTrs),
    /// TRS argument built from a recurrent pair found mid-unfolding.
    ArgumentRecurrentPairTrs { start: Term, detail: String },
    /// EEG'12 Theorem 8 argument.
    ArgumentEeg12 { start: Term, detail: String },
    /// ICLP'25 pattern-rule argument with α-threshold.
    ArgumentIclp25 { rule: PatternRule },
    /// Generalized argument (shallow left-unification and friends).
    ArgumentGeneralized { start: Term, detail: String },
}

impl Witness {
    /// The atomic witness query proving nontermination of the given mode, if
    /// the witness applies to it.
    pub fn proves_non_termination_of(&self, mode: &Mode, reg: &SymbolRegistry) -> Option<Term> {
        match self {
            Witness::LoopingPair(lp) => lp.query_for(mode, reg),
            Witness::RecurrentPairLp { rule, first, .. } => {
                let (_, witness) = rule.alpha()?;
                // The threshold instance must speak about the mode's predicate.
                match (&first.head, witness) {
                    (Term::Fun(p, _), Term::Fun(q, _)) if *p == mode.pred && p == q => {
                        Some(witness.clone())
                    }
                    _ => None,
                }
            }
            Witness::PatternRuleLp { rule } | Witness::ArgumentIclp25 { rule } => {
                let (_, witness) = rule.alpha()?;
                match witness {
                    Term::Fun(p, _) if *p == mode.pred => Some(witness.clone()),
                    _ => None,
                }
            }
            // TRS witnesses do not answer mode queries.
            _ => None,
        }
    }

    /// Extend an LP looping witness with one more binary rule; other
    /// variants are closed.
    pub fn with_rule(&self, rule: &LpRule) -> Option<Witness> {
        match self {
            Witness::LoopingPair(lp) => lp.with_rule(rule).map(Witness::LoopingPair),
            _ => None,
        }
    }

    /// The ground term starting an infinite derivation, for TRS witnesses.
    pub fn start_term(&self) -> Option<&Term> {
        match self {
            Witness::RecurrentPair(rp) => Some(rp.start_term()),
            Witness::ArgumentRecurrentPairTrs { start, .. }
            | Witness::ArgumentEeg12 { start, .. }
            | Witness::ArgumentGeneralized { start, .. } => Some(start),
            Witness::PatternRuleLp { rule } | Witness::ArgumentIclp25 { rule } => {
                rule.alpha().map(|(_, t)| t)
            }
            _ => None,
        }
    }

    /// Human-readable proof-argument text.
    pub fn describe(&self, reg: &SymbolRegistry) -> String {
        match self {
            Witness::LoopingPair(lp) => {
                let rules: Vec<String> =
                    lp.rules.iter().map(|r| r.render(reg)).collect();
                format!("looping pair over {} binary rule(s):\n{}", rules.len(), rules.join("\n"))
            }
            Witness::RecurrentPairLp { first, second, .. } => format!(
                "recurrent pair of binary rules:\n{}\n{}",
                first.render(reg),
                second.render(reg)
            ),
            Witness::PatternRuleLp { rule } => match rule.alpha() {
                Some((a, t)) => format!(
                    "pattern rule with threshold alpha = {a}; nonterminating term {}",
                    t.render(reg)
                ),
                None => "pattern rule (threshold pending)".to_string(),
            },
            Witness::RecurrentPair(rp) => format!(
                "recurrent pair; infinite rewrite sequence starts at {}",
                rp.start_term().render(reg)
            ),
            Witness::ArgumentRecurrentPairTrs { start, detail } => {
                format!("{detail}; starts at {}", start.render(reg))
            }
            Witness::ArgumentEeg12 { start, detail } => {
                format!("{detail}; starts at {}", start.render(reg))
            }
            Witness::ArgumentIclp25 { rule } => match rule.alpha() {
                Some((a, t)) => format!(
                    "pattern rule (alpha = {a}); nonterminating term {}",
                    t.render(reg)
                ),
                None => "pattern rule (threshold pending)".to_string(),
            },
            Witness::ArgumentGeneralized { start, detail } => {
                format!("{detail}; starts at {}", start.render(reg))
            }
        }
    }
}
