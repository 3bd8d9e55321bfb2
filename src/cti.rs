//! External cTI adapter
//!
//! cTI is an external termination prover for logic programs. When the user
//! supplies a path, the LP prover spawns `<cti_path> <file>`, waits for the
//! child to exit, and reads its stdout: the first line must start with `YES`
//! to count as a termination proof; any `predicate_term_condition(...)`
//! lines that follow are captured as argument details. Any other first line
//! yields `MAYBE`; spawn or I/O failures surface as `ERROR` results that the
//! coordinator logs and ignores.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use std::path::Path;
use std::process::Command;

use tracing::debug;

/// What the child process answered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CtiAnswer {
    /// First line `YES…`, with the captured term conditions.
    Yes { conditions: Vec<String> },
    /// Anything else.
    Maybe,
}

#[derive(Debug, thiserror::Error)]
pub enum CtiError {
    #[error("failed to run cTI at {path}: {source}")]
    Spawn { path: String, source: std::io::Error },
    #[error("cTI produced non-UTF-8 output")]
    BadOutput,
}

/// Run cTI on the problem file and parse its text protocol.
pub fn run(cti_path: &Path, file: &Path) -> Result<CtiAnswer, CtiError> {
    let output = Command::new(cti_path).arg(file).output().map_err(|source| {
        CtiError::Spawn { path: cti_path.display().to_string(), source }
    })?;
    let stdout = String::from_utf8(output.stdout).map_err(|_| CtiError::BadOutput)?;
    debug!(status = ?output.status, "cTI exited");
    parse_output(&stdout)
}

fn parse_output(stdout: &str) -> Result<CtiAnswer, CtiError> {
    let mut lines = stdout.lines();
    let first = lines.next().unwrap_or("").trim();
    if !first.starts_with("YES") {
        return Ok(CtiAnswer::Maybe);
    }
    let conditions: Vec<String> = lines
        .map(str::trim)
        .filter(|l| l.starts_with("predicate_term_condition("))
        .map(str::to_string)
        .collect();
    Ok(CtiAnswer::Yes { conditions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yes_first_line_is_accepted() {
        let out = "YES\npredicate_term_condition(app(a,b,c)).\nnoise\n";
        match parse_output(out).unwrap() {
            CtiAnswer::Yes { conditions } => {
                assert_eq!(conditions, vec!["predicate_term_condition(app(a,b,c))."]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn anything_else_is_maybe() {
        assert_eq!(parse_output("NO\n").unwrap(), CtiAnswer::Maybe);
        assert_eq!(parse_output("").unwrap(), CtiAnswer::Maybe);
        assert_eq!(parse_output("MAYBE\nYES\n").unwrap(), CtiAnswer::Maybe);
    }
}
