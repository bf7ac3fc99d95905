//! Line scanner for submitted Égua code.
//!
//! The scanner does not interpret Égua. It classifies each line of a
//! submission into one of a handful of statement shapes and folds the
//! classified lines into a single simulated output string:
//!
//! - `var nome = "Maria"` declares a binding
//! - `nome = "João"` reassigns a binding
//! - `escreva("texto")` / `escreva(nome)` overwrites the output
//!
//! Every other line is ignored without error. Only the value of the last
//! recognized print survives.
//!
//! # Example
//!
//! ```
//! use egua_tutor::scanner::scan;
//!
//! let output = scan("var nome = \"Maria\"\nescreva(nome);");
//! assert_eq!(output, "Maria");
//! ```

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Marker that starts a comment line.
const COMMENT_MARKER: char = '#';

/// Prefix of a variable declaration.
const DECLARATION_PREFIX: &str = "var ";

/// Keyword excluded from reassignments (note: no trailing space).
const VAR_KEYWORD: &str = "var";

/// Prefix of the print builtin.
const PRINT_PREFIX: &str = "escreva";

/// Byte order mark, trimmed along with whitespace.
const BOM: char = '\u{feff}';

// `\w` is spelled out as the ASCII word class so non-ASCII identifiers are
// never recognized.
#[allow(clippy::expect_used)]
static DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"var\s+([A-Za-z0-9_]+)\s*=\s*"([^"]*)""#).expect("declaration pattern is valid")
});

#[allow(clippy::expect_used)]
static REASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z0-9_]+)\s*=\s*"([^"]*)""#).expect("reassignment pattern is valid")
});

#[allow(clippy::expect_used)]
static PRINT_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"escreva\("([^"]*)"\)"#).expect("literal print pattern is valid")
});

#[allow(clippy::expect_used)]
static PRINT_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"escreva\(([A-Za-z0-9_]+)\)").expect("identifier print pattern is valid")
});

// ============================================================================
// Statements
// ============================================================================

/// Argument of an `escreva(...)` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum PrintArg<'a> {
    /// A string literal, without the quotes.
    Literal(&'a str),
    /// A bare identifier, resolved against the bindings at fold time.
    Identifier(&'a str),
}

/// Why a line was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    /// Empty or whitespace-only line.
    Blank,
    /// Line starting with `#`.
    Comment,
    /// Line that matched none of the recognized shapes.
    Unrecognized,
}

/// Classification of a single source line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Statement<'a> {
    /// `var <name> = "<value>"`.
    Declaration {
        /// Declared identifier.
        name: &'a str,
        /// Literal value.
        value: &'a str,
    },
    /// `<name> = "<value>"`.
    Reassignment {
        /// Reassigned identifier.
        name: &'a str,
        /// Literal value.
        value: &'a str,
    },
    /// `escreva(...)`.
    Print {
        /// What to print.
        arg: PrintArg<'a>,
    },
    /// Anything else.
    Ignored {
        /// Why the line was skipped.
        reason: IgnoreReason,
    },
}

impl Statement<'_> {
    /// Returns `true` if the line takes no part in the simulation.
    #[must_use]
    pub const fn is_ignored(&self) -> bool {
        matches!(self, Self::Ignored { .. })
    }

    const fn ignored(reason: IgnoreReason) -> Self {
        Self::Ignored { reason }
    }
}

/// A classified line together with its 1-based line number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassifiedLine<'a> {
    /// 1-based line number in the submission.
    pub line: usize,
    /// What the line was recognized as.
    pub statement: Statement<'a>,
}

/// Returns the two capture groups of `re` when the second one is non-empty.
fn binding_captures<'a>(re: &Regex, line: &'a str) -> Option<(&'a str, &'a str)> {
    let caps = re.captures(line)?;
    let name = caps.get(1)?.as_str();
    let value = caps.get(2)?.as_str();
    (!value.is_empty()).then_some((name, value))
}

/// Classifies a single line of Égua source.
///
/// The checks run in a fixed order; the first shape whose prefix test
/// applies decides the outcome, even if its pattern then fails to match.
/// A line containing `=` is therefore never a print, and a line starting
/// with `var` (with or without a following space) is never a reassignment.
///
/// Literals must be non-empty: `var x = ""` and `escreva("")` are ignored.
#[must_use]
pub fn classify_line(line: &str) -> Statement<'_> {
    let line = line.trim_matches(|c: char| c.is_whitespace() || c == BOM);

    if line.is_empty() {
        return Statement::ignored(IgnoreReason::Blank);
    }
    if line.starts_with(COMMENT_MARKER) {
        return Statement::ignored(IgnoreReason::Comment);
    }

    if line.starts_with(DECLARATION_PREFIX) {
        return binding_captures(&DECLARATION, line).map_or(
            Statement::ignored(IgnoreReason::Unrecognized),
            |(name, value)| Statement::Declaration { name, value },
        );
    }

    if line.contains('=') && !line.starts_with(VAR_KEYWORD) {
        return binding_captures(&REASSIGNMENT, line).map_or(
            Statement::ignored(IgnoreReason::Unrecognized),
            |(name, value)| Statement::Reassignment { name, value },
        );
    }

    if line.starts_with(PRINT_PREFIX) {
        // A literal match takes precedence even when its text is empty.
        let arg = if let Some(caps) = PRINT_LITERAL.captures(line) {
            caps.get(1)
                .map(|m| m.as_str())
                .filter(|text| !text.is_empty())
                .map(PrintArg::Literal)
        } else {
            PRINT_IDENTIFIER
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| PrintArg::Identifier(m.as_str()))
        };

        return arg.map_or(Statement::ignored(IgnoreReason::Unrecognized), |arg| {
            Statement::Print { arg }
        });
    }

    Statement::ignored(IgnoreReason::Unrecognized)
}

/// Classifies every line of `source`, in order.
#[must_use]
pub fn classify(source: &str) -> Vec<ClassifiedLine<'_>> {
    source
        .split('\n')
        .enumerate()
        .map(|(index, text)| ClassifiedLine {
            line: index + 1,
            statement: classify_line(text),
        })
        .collect()
}

// ============================================================================
// Folding
// ============================================================================

/// Mutable state of a single scan: bindings plus the simulated output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Simulation {
    bindings: HashMap<String, String>,
    output: String,
}

impl Simulation {
    fn new() -> Self {
        Self::default()
    }

    /// Applies one statement.
    fn apply(&mut self, statement: &Statement<'_>) {
        match *statement {
            Statement::Declaration { name, value } | Statement::Reassignment { name, value } => {
                self.bindings.insert(name.to_string(), value.to_string());
            }
            Statement::Print {
                arg: PrintArg::Literal(text),
            } => {
                text.clone_into(&mut self.output);
            }
            Statement::Print {
                arg: PrintArg::Identifier(name),
            } => {
                self.output = self
                    .bindings
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| name.to_string());
            }
            Statement::Ignored { .. } => {}
        }
    }

}

/// Full result of a traced scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult<'a> {
    /// Simulated program output.
    pub output: String,
    /// Final variable bindings.
    pub bindings: HashMap<String, String>,
    /// Every line with its classification.
    pub lines: Vec<ClassifiedLine<'a>>,
}

impl ScanResult<'_> {
    /// Number of lines that were ignored.
    #[must_use]
    pub fn ignored_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| line.statement.is_ignored())
            .count()
    }
}

/// Scans `source` and returns the simulated output.
#[must_use]
pub fn scan(source: &str) -> String {
    let mut simulation = Simulation::new();
    for line in source.split('\n') {
        simulation.apply(&classify_line(line));
    }
    simulation.output
}

/// Scans `source`, keeping the per-line classification and final bindings.
#[must_use]
pub fn scan_with_trace(source: &str) -> ScanResult<'_> {
    let lines = classify(source);
    let mut simulation = Simulation::new();
    for line in &lines {
        tracing::debug!(line = line.line, statement = ?line.statement, "Classified line");
        simulation.apply(&line.statement);
    }

    let Simulation { bindings, output } = simulation;
    ScanResult {
        output,
        bindings,
        lines,
    }
}

// ============================================================================
// Tests
// ============================================================================
