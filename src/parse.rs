//! Input-format adapters
//!
//! The core consumes a [`Program`]; this module produces one from the
//! problem-file formats selected by suffix:
//!
//! - `.pl` — Prolog-like logic programs (`h :- b1, ..., bn.`, facts `h.`);
//!   a `%query:` comment line declares modes, marking input positions with
//!   `i`, `b`, or `g` and outputs with `o`;
//! - `.trs` / `.srs` — old human-readable TPDB (`(VAR …)` / `(RULES …)`);
//!   SRS words desugar to unary-symbol nestings over one shared variable;
//! - `.ari` — the Applicative Rewriting Input S-expression format;
//! - `.xml` — the old TPDB XML schema, read with `quick-xml`.
//!
//! Diagnostics carry line numbers where the format has them; a parse
//! failure is the only way the binary exits nonzero.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::program::{LpRule, Mode, Program, TrsRule};
use crate::symbols::{SymbolRegistry, VarId};
use crate::term::Term;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("read {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("syntax error at line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("unsupported file suffix `{0}` (expected .pl/.ari/.xml/.trs/.srs)")]
    UnknownSuffix(String),
    #[error("xml error: {0}")]
    Xml(#[from] quick_xml::Error),
}

fn syntax(line: usize, message: impl Into<String>) -> ParseError {
    ParseError::Syntax { line, message: message.into() }
}

/// Parse a problem file, dispatching on its suffix.
pub fn parse_file(path: &Path) -> Result<Program, ParseError> {
    let text = std::fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let suffix = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match suffix.as_str() {
        "pl" => parse_pl(&text),
        "trs" => parse_tpdb(&text, false),
        "srs" => parse_tpdb(&text, true),
        "ari" => parse_ari(&text),
        "xml" => parse_xml(&text),
        other => Err(ParseError::UnknownSuffix(other.to_string())),
    }
}

// ============================================================================
// Prolog-like logic programs
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
enum Tok {
    Atom(String),
    Var(String),
    Punct(char),
    Arrow, // :-
    Dot,
}

struct Lexer {
    toks: Vec<(usize, Tok)>,
    pos: usize,
}

impl Lexer {
    fn new(text: &str) -> Result<Self, ParseError> {
        let mut toks = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            let line_no = lineno + 1;
            let mut chars = line.char_indices().peekable();
            while let Some(&(_, c)) = chars.peek() {
                match c {
                    '%' => break, // comment to end of line
                    c if c.is_whitespace() => {
                        chars.next();
                    }
                    '(' | ')' | ',' | '[' | ']' | '|' => {
                        chars.next();
                        toks.push((line_no, Tok::Punct(c)));
                    }
                    '.' => {
                        chars.next();
                        toks.push((line_no, Tok::Dot));
                    }
                    ':' => {
                        chars.next();
                        match chars.peek() {
                            Some(&(_, '-')) => {
                                chars.next();
                                toks.push((line_no, Tok::Arrow));
                            }
                            _ => return Err(syntax(line_no, "expected `:-`")),
                        }
                    }
                    c if c.is_ascii_uppercase() || c == '_' => {
                        let mut name = String::new();
                        while let Some(&(_, d)) = chars.peek() {
                            if d.is_alphanumeric() || d == '_' {
                                name.push(d);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        toks.push((line_no, Tok::Var(name)));
                    }
                    c if c.is_ascii_lowercase() || c.is_ascii_digit() => {
                        let mut name = String::new();
                        while let Some(&(_, d)) = chars.peek() {
                            if d.is_alphanumeric() || d == '_' {
                                name.push(d);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        toks.push((line_no, Tok::Atom(name)));
                    }
                    other => {
                        return Err(syntax(line_no, format!("unexpected character `{other}`")))
                    }
                }
            }
        }
        Ok(Self { toks, pos: 0 })
    }

    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos).map(|(_, t)| t)
    }

    fn line(&self) -> usize {
        self.toks
            .get(self.pos.min(self.toks.len().saturating_sub(1)))
            .map(|(l, _)| *l)
            .unwrap_or(0)
    }

    fn next(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).map(|(_, t)| t.clone());
        self.pos += 1;
        t
    }

    fn expect(&mut self, want: &Tok) -> Result<(), ParseError> {
        let line = self.line();
        match self.next() {
            Some(ref t) if t == want => Ok(()),
            other => Err(syntax(line, format!("expected {want:?}, found {other:?}"))),
        }
    }
}

/// Per-clause variable scope: occurrences of one name share one identity.
struct VarScope<'a> {
    reg: &'a SymbolRegistry,
    map: HashMap<String, VarId>,
}

impl<'a> VarScope<'a> {
    fn new(reg: &'a SymbolRegistry) -> Self {
        Self { reg, map: HashMap::new() }
    }

    fn get(&mut self, name: &str) -> VarId {
        if name == "_" {
            return self.reg.fresh_var();
        }
        *self.map.entry(name.to_string()).or_insert_with(|| self.reg.fresh_var())
    }
}

pub fn parse_pl(text: &str) -> Result<Program, ParseError> {
    let reg = Arc::new(SymbolRegistry::new());
    let modes = parse_query_lines(text, &reg)?;
    let mut lx = Lexer::new(text)?;
    let mut rules = Vec::new();

    while lx.peek().is_some() {
        let mut scope = VarScope::new(&reg);
        let head = parse_pl_term(&mut lx, &mut scope)?;
        let mut body = Vec::new();
        match lx.next() {
            Some(Tok::Dot) => {}
            Some(Tok::Arrow) => loop {
                body.push(parse_pl_term(&mut lx, &mut scope)?);
                match lx.next() {
                    Some(Tok::Punct(',')) => continue,
                    Some(Tok::Dot) => break,
                    other => {
                        return Err(syntax(lx.line(), format!("expected `,` or `.`, found {other:?}")))
                    }
                }
            },
            other => {
                return Err(syntax(lx.line(), format!("expected `:-` or `.`, found {other:?}")))
            }
        }
        let num = rules.len();
        rules.push(LpRule::new(head, body, num));
    }
    Ok(Program::lp(rules, modes, reg))
}

fn parse_pl_term(lx: &mut Lexer, scope: &mut VarScope<'_>) -> Result<Term, ParseError> {
    let line = lx.line();
    match lx.next() {
        Some(Tok::Var(name)) => Ok(Term::Var(scope.get(&name))),
        Some(Tok::Atom(name)) => {
            if matches!(lx.peek(), Some(Tok::Punct('('))) {
                lx.next();
                let mut args = Vec::new();
                loop {
                    args.push(parse_pl_term(lx, scope)?);
                    match lx.next() {
                        Some(Tok::Punct(',')) => continue,
                        Some(Tok::Punct(')')) => break,
                        other => {
                            return Err(syntax(
                                lx.line(),
                                format!("expected `,` or `)`, found {other:?}"),
                            ))
                        }
                    }
                }
                let f = scope.reg.function(&name, args.len());
                Ok(Term::Fun(f, args))
            } else {
                Ok(Term::Fun(scope.reg.function(&name, 0), vec![]))
            }
        }
        Some(Tok::Punct('[')) => parse_pl_list(lx, scope),
        other => Err(syntax(line, format!("expected a term, found {other:?}"))),
    }
}

fn parse_pl_list(lx: &mut Lexer, scope: &mut VarScope<'_>) -> Result<Term, ParseError> {
    let reg = scope.reg;
    let nil = Term::Fun(reg.function("[]", 0), vec![]);
    if matches!(lx.peek(), Some(Tok::Punct(']'))) {
        lx.next();
        return Ok(nil);
    }
    let mut items = vec![parse_pl_term(lx, scope)?];
    let tail;
    loop {
        match lx.next() {
            Some(Tok::Punct(',')) => items.push(parse_pl_term(lx, scope)?),
            Some(Tok::Punct('|')) => {
                let t = parse_pl_term(lx, scope)?;
                lx.expect(&Tok::Punct(']'))?;
                tail = t;
                break;
            }
            Some(Tok::Punct(']')) => {
                tail = nil;
                break;
            }
            other => {
                return Err(syntax(
                    lx.line(),
                    format!("expected `,`, `|` or `]`, found {other:?}"),
                ))
            }
        }
    }
    let cons = reg.function(".", 2);
    Ok(items
        .into_iter()
        .rev()
        .fold(tail, |acc, item| Term::Fun(cons, vec![item, acc])))
}

/// `%query: p(i,o).` lines: positions marked `i`/`b`/`g` are inputs.
fn parse_query_lines(text: &str, reg: &SymbolRegistry) -> Result<Vec<Mode>, ParseError> {
    let mut modes = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line_no = lineno + 1;
        let Some(rest) = line.trim().strip_prefix("%query:") else { continue };
        let decl = rest.trim().trim_end_matches('.');
        let Some(open) = decl.find('(') else {
            return Err(syntax(line_no, "mode declaration needs arguments"));
        };
        let name = decl[..open].trim();
        let Some(close) = decl.rfind(')') else {
            return Err(syntax(line_no, "unclosed mode declaration"));
        };
        let args: Vec<&str> =
            decl[open + 1..close].split(',').map(str::trim).collect();
        let mut inputs = Vec::new();
        for (i, a) in args.iter().enumerate() {
            match *a {
                "i" | "b" | "g" => inputs.push(i),
                "o" => {}
                other => {
                    return Err(syntax(line_no, format!("unknown mode marker `{other}`")))
                }
            }
        }
        let pred = reg.function(name, args.len());
        modes.push(Mode::new(pred, inputs));
    }
    Ok(modes)
}

// ============================================================================
// Old TPDB .trs / .srs
// ============================================================================

fn tokenize_sexpr(text: &str) -> Vec<(usize, String)> {
    let mut toks = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line_no = lineno + 1;
        let mut cur = String::new();
        for c in line.chars() {
            match c {
                '(' | ')' | ',' => {
                    if !cur.is_empty() {
                        toks.push((line_no, std::mem::take(&mut cur)));
                    }
                    toks.push((line_no, c.to_string()));
                }
                '-' => cur.push(c),
                '>' if cur.ends_with('-') => {
                    cur.pop();
                    if !cur.is_empty() {
                        toks.push((line_no, std::mem::take(&mut cur)));
                    }
                    toks.push((line_no, "->".to_string()));
                }
                c if c.is_whitespace() => {
                    if !cur.is_empty() {
                        toks.push((line_no, std::mem::take(&mut cur)));
                    }
                }
                c => cur.push(c),
            }
        }
        if !cur.is_empty() {
            toks.push((line_no, cur));
        }
    }
    toks
}

pub fn parse_tpdb(text: &str, srs: bool) -> Result<Program, ParseError> {
    let reg = Arc::new(SymbolRegistry::new());
    let toks = tokenize_sexpr(text);
    let mut vars: Vec<String> = Vec::new();
    let mut rules: Vec<TrsRule> = Vec::new();
    let mut i = 0;

    while i < toks.len() {
        let (line, ref t) = toks[i];
        if t != "(" {
            return Err(syntax(line, format!("expected `(`, found `{t}`")));
        }
        i += 1;
        let (line, section) = toks
            .get(i)
            .map(|(l, s)| (*l, s.clone()))
            .ok_or_else(|| syntax(line, "unexpected end of file"))?;
        i += 1;
        match section.as_str() {
            "VAR" => {
                while i < toks.len() && toks[i].1 != ")" {
                    vars.push(toks[i].1.clone());
                    i += 1;
                }
                i += 1; // closing paren
            }
            "RULES" => {
                i = if srs {
                    parse_srs_rules(&toks, i, &reg, &mut rules)?
                } else {
                    parse_trs_rules(&toks, i, &reg, &vars, &mut rules)?
                };
            }
            _ => {
                // Skip unknown sections (COMMENT etc.) with balanced parens.
                let mut depth = 1;
                while i < toks.len() && depth > 0 {
                    match toks[i].1.as_str() {
                        "(" => depth += 1,
                        ")" => depth -= 1,
                        _ => {}
                    }
                    i += 1;
                }
            }
        }
    }
    Ok(Program::trs(rules, reg))
}

fn parse_trs_rules(
    toks: &[(usize, String)],
    mut i: usize,
    reg: &Arc<SymbolRegistry>,
    vars: &[String],
    rules: &mut Vec<TrsRule>,
) -> Result<usize, ParseError> {
    while i < toks.len() && toks[i].1 != ")" {
        let mut scope: HashMap<String, VarId> = HashMap::new();
        let (lhs, ni) = parse_trs_term(toks, i, reg, vars, &mut scope)?;
        i = ni;
        let (line, arrow) = toks
            .get(i)
            .map(|(l, s)| (*l, s.clone()))
            .ok_or_else(|| syntax(0, "unexpected end of file"))?;
        if arrow != "->" {
            return Err(syntax(line, format!("expected `->`, found `{arrow}`")));
        }
        i += 1;
        let (rhs, ni) = parse_trs_term(toks, i, reg, vars, &mut scope)?;
        i = ni;
        let num = rules.len();
        rules.push(TrsRule::new(lhs, rhs, num));
    }
    Ok(i + 1)
}

fn parse_trs_term(
    toks: &[(usize, String)],
    mut i: usize,
    reg: &Arc<SymbolRegistry>,
    vars: &[String],
    scope: &mut HashMap<String, VarId>,
) -> Result<(Term, usize), ParseError> {
    let (line, name) = toks
        .get(i)
        .map(|(l, s)| (*l, s.clone()))
        .ok_or_else(|| syntax(0, "unexpected end of file"))?;
    if name == "(" || name == ")" || name == "," || name == "->" {
        return Err(syntax(line, format!("expected a term, found `{name}`")));
    }
    i += 1;
    if toks.get(i).map(|(_, s)| s.as_str()) == Some("(") {
        i += 1;
        let mut args = Vec::new();
        if toks.get(i).map(|(_, s)| s.as_str()) == Some(")") {
            i += 1;
        } else {
            loop {
                let (arg, ni) = parse_trs_term(toks, i, reg, vars, scope)?;
                args.push(arg);
                i = ni;
                match toks.get(i).map(|(_, s)| s.as_str()) {
                    Some(",") => i += 1,
                    Some(")") => {
                        i += 1;
                        break;
                    }
                    other => {
                        return Err(syntax(line, format!("expected `,` or `)`, found {other:?}")))
                    }
                }
            }
        }
        Ok((Term::Fun(reg.function(&name, args.len()), args), i))
    } else if vars.contains(&name) {
        let v = *scope.entry(name).or_insert_with(|| reg.fresh_var());
        Ok((Term::Var(v), i))
    } else {
        Ok((Term::Fun(reg.function(&name, 0), vec![]), i))
    }
}

/// SRS words `a b c -> c b a` desugar to unary nestings over one variable.
fn parse_srs_rules(
    toks: &[(usize, String)],
    mut i: usize,
    reg: &Arc<SymbolRegistry>,
    rules: &mut Vec<TrsRule>,
) -> Result<usize, ParseError> {
    while i < toks.len() && toks[i].1 != ")" {
        let mut lhs_word = Vec::new();
        while i < toks.len() && toks[i].1 != "->" {
            lhs_word.push(toks[i].1.clone());
            i += 1;
        }
        let line = toks.get(i).map(|(l, _)| *l).unwrap_or(0);
        if i >= toks.len() {
            return Err(syntax(line, "expected `->` in SRS rule"));
        }
        i += 1; // ->
        let mut rhs_word = Vec::new();
        while i < toks.len() && toks[i].1 != "," && toks[i].1 != ")" {
            rhs_word.push(toks[i].1.clone());
            i += 1;
        }
        if toks.get(i).map(|(_, s)| s.as_str()) == Some(",") {
            i += 1;
        }
        let x = reg.fresh_var();
        let word_term = |word: &[String]| {
            word.iter().rev().fold(Term::Var(x), |acc, s| {
                Term::Fun(reg.function(s, 1), vec![acc])
            })
        };
        let num = rules.len();
        rules.push(TrsRule::new(word_term(&lhs_word), word_term(&rhs_word), num));
    }
    Ok(i + 1)
}

// ============================================================================
// ARI (S-expression) format
// ============================================================================

pub fn parse_ari(text: &str) -> Result<Program, ParseError> {
    let reg = Arc::new(SymbolRegistry::new());
    let toks = tokenize_sexpr(text);
    let mut funs: HashMap<String, usize> = HashMap::new();
    let mut rules: Vec<TrsRule> = Vec::new();
    let mut i = 0;

    while i < toks.len() {
        let (line, ref t) = toks[i];
        if t != "(" {
            return Err(syntax(line, format!("expected `(`, found `{t}`")));
        }
        let (_, head) = toks
            .get(i + 1)
            .cloned()
            .ok_or_else(|| syntax(line, "unexpected end of file"))?;
        match head.as_str() {
            "format" => i = skip_balanced(&toks, i),
            "fun" => {
                let name = toks
                    .get(i + 2)
                    .map(|(_, s)| s.clone())
                    .ok_or_else(|| syntax(line, "fun needs a name"))?;
                let arity: usize = toks
                    .get(i + 3)
                    .and_then(|(_, s)| s.parse().ok())
                    .ok_or_else(|| syntax(line, "fun needs a numeric arity"))?;
                funs.insert(name, arity);
                i = skip_balanced(&toks, i);
            }
            "rule" => {
                let mut scope: HashMap<String, VarId> = HashMap::new();
                let (lhs, ni) = parse_ari_term(&toks, i + 2, &reg, &funs, &mut scope)?;
                let (rhs, ni) = parse_ari_term(&toks, ni, &reg, &funs, &mut scope)?;
                let (line2, close) = toks
                    .get(ni)
                    .map(|(l, s)| (*l, s.clone()))
                    .ok_or_else(|| syntax(line, "unexpected end of file"))?;
                if close != ")" {
                    return Err(syntax(line2, format!("expected `)`, found `{close}`")));
                }
                let num = rules.len();
                rules.push(TrsRule::new(lhs, rhs, num));
                i = ni + 1;
            }
            _ => i = skip_balanced(&toks, i),
        }
    }
    Ok(Program::trs(rules, reg))
}

fn skip_balanced(toks: &[(usize, String)], start: usize) -> usize {
    let mut depth = 0;
    let mut i = start;
    while i < toks.len() {
        match toks[i].1.as_str() {
            "(" => depth += 1,
            ")" => {
                depth -= 1;
                if depth == 0 {
                    return i + 1;
                }
            }
            _ => {}
        }
        i += 1;
    }
    i
}

fn parse_ari_term(
    toks: &[(usize, String)],
    mut i: usize,
    reg: &Arc<SymbolRegistry>,
    funs: &HashMap<String, usize>,
    scope: &mut HashMap<String, VarId>,
) -> Result<(Term, usize), ParseError> {
    let (line, name) = toks
        .get(i)
        .map(|(l, s)| (*l, s.clone()))
        .ok_or_else(|| syntax(0, "unexpected end of file"))?;
    if name == "(" {
        i += 1;
        let (_, fname) = toks
            .get(i)
            .cloned()
            .ok_or_else(|| syntax(line, "unexpected end of file"))?;
        i += 1;
        let mut args = Vec::new();
        while toks.get(i).map(|(_, s)| s.as_str()) != Some(")") {
            let (arg, ni) = parse_ari_term(toks, i, reg, funs, scope)?;
            args.push(arg);
            i = ni;
        }
        Ok((Term::Fun(reg.function(&fname, args.len()), args), i + 1))
    } else if funs.contains_key(&name) {
        let arity = funs[&name];
        if arity != 0 {
            return Err(syntax(line, format!("symbol `{name}` needs {arity} argument(s)")));
        }
        Ok((Term::Fun(reg.function(&name, 0), vec![]), i + 1))
    } else {
        let v = *scope.entry(name).or_insert_with(|| reg.fresh_var());
        Ok((Term::Var(v), i + 1))
    }
}

// ============================================================================
// Old TPDB XML schema
// ============================================================================

#[derive(Default)]
struct XmlFrame {
    name: Option<String>,
    args: Vec<Term>,
}

fn attach(stack: &mut Vec<XmlFrame>, current: &mut Option<Term>, term: Term) {
    match stack.last_mut() {
        Some(frame) => frame.args.push(term),
        None => *current = Some(term),
    }
}

pub fn parse_xml(text: &str) -> Result<Program, ParseError> {
    let reg = Arc::new(SymbolRegistry::new());
    let mut reader = Reader::from_str(text);

    let mut rules: Vec<TrsRule> = Vec::new();
    let mut stack: Vec<XmlFrame> = Vec::new();
    let mut scope: HashMap<String, VarId> = HashMap::new();
    let mut lhs: Option<Term> = None;
    let mut current: Option<Term> = None;
    let mut in_name = false;
    let mut in_var = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"rule" => {
                    scope.clear();
                    lhs = None;
                    current = None;
                }
                b"funapp" => stack.push(XmlFrame::default()),
                b"name" => in_name = true,
                b"var" => in_var = true,
                _ => {}
            },
            Event::Text(t) => {
                let text = t
                    .xml_content()
                    .map_err(|e| syntax(0, format!("bad xml text: {e}")))?
                    .trim()
                    .to_string();
                if text.is_empty() {
                    continue;
                }
                if in_name {
                    if let Some(frame) = stack.last_mut() {
                        frame.name = Some(text);
                    }
                } else if in_var {
                    let v = *scope
                        .entry(text)
                        .or_insert_with(|| reg.fresh_var());
                    attach(&mut stack, &mut current, Term::Var(v));
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"name" => in_name = false,
                b"var" => in_var = false,
                b"funapp" => {
                    let frame = stack.pop().unwrap_or_default();
                    let name = frame.name.unwrap_or_default();
                    let f = reg.function(&name, frame.args.len());
                    attach(&mut stack, &mut current, Term::Fun(f, frame.args));
                }
                b"lhs" => {
                    lhs = current.take();
                }
                b"rule" => {
                    let rhs = current.take();
                    if let (Some(l), Some(r)) = (lhs.take(), rhs) {
                        let num = rules.len();
                        rules.push(TrsRule::new(l, r, num));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(Program::trs(rules, reg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prolog_program_with_modes_parses() {
        let text = "\
%query: permute(o,i).
delete(X,[X|Xs],Xs).
delete(Y,[X|Xs],[X|Ys]) :- delete(Y,Xs,Ys).
permute([],[]).
permute([X|Xs],[Y|Ys]) :- delete(Y,[X|Xs],Zs), permute(Zs,Ys).
";
        let program = parse_pl(text).unwrap();
        assert_eq!(program.lp_rules.len(), 4);
        assert_eq!(program.modes.len(), 1);
        let reg = &program.registry;
        assert_eq!(program.modes[0].pred, reg.lookup("permute", 2).unwrap());
        assert_eq!(program.modes[0].inputs, vec![1]);
        // Facts and binary classification.
        assert!(program.lp_rules[0].is_fact());
        assert!(program.lp_rules[1].is_binary());
        assert_eq!(program.lp_rules[3].body.len(), 2);
    }

    #[test]
    fn prolog_shared_variables_are_scoped_per_clause() {
        let text = "p(X) :- q(X).\nr(X).\n";
        let program = parse_pl(text).unwrap();
        let r0_vars = program.lp_rules[0].head.vars();
        let r1_vars = program.lp_rules[1].head.vars();
        assert_eq!(program.lp_rules[0].body[0].vars(), r0_vars);
        assert_ne!(r0_vars, r1_vars);
    }

    #[test]
    fn tpdb_trs_parses_vars_and_rules() {
        let text = "(VAR x y)\n(RULES\n  f(x,y) -> f(y,x)\n)\n";
        let program = parse_tpdb(text, false).unwrap();
        assert_eq!(program.trs_rules.len(), 1);
        let rule = &program.trs_rules[0];
        assert_eq!(rule.lhs.vars().len(), 2);
        // Shared scope across the two sides.
        assert_eq!(rule.lhs.vars(), {
            let mut v = rule.rhs.vars();
            v.swap(0, 1);
            v
        });
    }

    #[test]
    fn srs_words_desugar_to_unary_terms() {
        let text = "(RULES a b -> b a)\n";
        let program = parse_tpdb(text, true).unwrap();
        assert_eq!(program.trs_rules.len(), 1);
        let rule = &program.trs_rules[0];
        let reg = &program.registry;
        let a = reg.lookup("a", 1).unwrap();
        let b = reg.lookup("b", 1).unwrap();
        match &rule.lhs {
            Term::Fun(f, args) => {
                assert_eq!(*f, a);
                assert!(matches!(&args[0], Term::Fun(g, _) if *g == b));
            }
            other => panic!("unexpected lhs {other:?}"),
        }
    }

    #[test]
    fn ari_format_parses_rules() {
        let text = "(format TRS)\n(fun f 2)\n(fun a 0)\n(rule (f x a) (f a x))\n";
        let program = parse_ari(text).unwrap();
        assert_eq!(program.trs_rules.len(), 1);
        let rule = &program.trs_rules[0];
        assert_eq!(rule.lhs.vars(), rule.rhs.vars());
        assert_eq!(rule.lhs.vars().len(), 1);
    }

    #[test]
    fn xml_schema_parses_funapp_and_var() {
        let text = "<trs><rules><rule>\
<lhs><funapp><name>f</name><arg><var>x</var></arg></funapp></lhs>\
<rhs><funapp><name>f</name><arg><funapp><name>s</name><arg><var>x</var></arg></funapp></arg></funapp></rhs>\
</rule></rules></trs>";
        let program = parse_xml(text).unwrap();
        assert_eq!(program.trs_rules.len(), 1);
        let rule = &program.trs_rules[0];
        assert_eq!(rule.lhs.vars(), rule.rhs.vars());
        assert_eq!(rule.rhs.depth(), 2);
    }

    #[test]
    fn unknown_suffix_is_rejected() {
        let err = parse_file(Path::new("problem.exe")).unwrap_err();
        assert!(matches!(err, ParseError::Io { .. } | ParseError::UnknownSuffix(_)));
    }

    #[test]
    fn syntax_errors_carry_line_numbers() {
        let err = parse_pl("p(X) :- .\n").unwrap_err();
        match err {
            ParseError::Syntax { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected {other:?}"),
        }
    }
}
