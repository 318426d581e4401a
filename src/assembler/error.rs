// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Error types and diagnostics for the assembler.

use std::fmt;

use crate::parser::ParseError;
use crate::report::highlight_line;

/// Categories of assembler errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsmErrorKind {
    Cli,
    Io,
    Parser,
    Expression,
    Instruction,
    Symbol,
}

/// An assembler error with a kind and message.
#[derive(Debug, Clone)]
pub struct AsmError {
    kind: AsmErrorKind,
    message: String,
}

impl AsmError {
    pub fn new(kind: AsmErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> AsmErrorKind {
        self.kind
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AsmError {}

/// A fatal diagnostic with source location.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    line: u32,
    column: Option<usize>,
    error: AsmError,
    file: Option<String>,
}

impl Diagnostic {
    pub fn new(line: u32, error: AsmError) -> Self {
        Self {
            line,
            column: None,
            error,
            file: None,
        }
    }

    pub fn from_parse_error(err: &ParseError) -> Self {
        Self {
            line: err.line,
            column: Some(err.column),
            error: AsmError::new(AsmErrorKind::Parser, err.message.clone()),
            file: None,
        }
    }

    #[must_use]
    pub fn with_file(mut self, file: Option<String>) -> Self {
        self.file = file;
        self
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn error(&self) -> &AsmError {
        &self.error
    }

    pub fn format(&self) -> String {
        format!("{}: ERROR - {}", self.line, self.error.message())
    }

    /// Render with a source gutter:
    ///
    /// ```text
    /// prog.asm:3: ERROR
    ///     3 | jmp missing
    /// ERROR: unresolved symbol "missing"
    /// ```
    pub fn format_with_context(&self, lines: Option<&[String]>, use_color: bool) -> String {
        let header = match &self.file {
            Some(file) => format!("{file}:{}: ERROR", self.line),
            None => format!("{}: ERROR", self.line),
        };

        let line_idx = self.line.saturating_sub(1) as usize;
        let line_text = lines
            .and_then(|lines| lines.get(line_idx))
            .map(|line| line.as_str())
            .unwrap_or("<source unavailable>");
        let highlighted = highlight_line(line_text, self.column, use_color);

        let mut out = String::new();
        out.push_str(&header);
        out.push('\n');
        out.push_str(&format!("{:>5} | {}", self.line, highlighted));
        out.push('\n');
        out.push_str(&format!("ERROR: {}", self.error.message()));
        out
    }
}

/// Error from a failed assembler run.
#[derive(Debug)]
pub struct RunError {
    error: AsmError,
    diagnostic: Option<Diagnostic>,
    source_lines: Vec<String>,
}

impl RunError {
    pub fn new(diagnostic: Diagnostic, source_lines: Vec<String>) -> Self {
        Self {
            error: diagnostic.error().clone(),
            diagnostic: Some(diagnostic),
            source_lines,
        }
    }

    /// Error with no source location (CLI and I/O failures).
    pub fn bare(error: AsmError) -> Self {
        Self {
            error,
            diagnostic: None,
            source_lines: Vec::new(),
        }
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        self.diagnostic.as_ref()
    }

    pub fn source_lines(&self) -> &[String] {
        &self.source_lines
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for RunError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_format_includes_line() {
        let err = AsmError::new(AsmErrorKind::Symbol, "redefinition of label \"x\"");
        let diag = Diagnostic::new(12, err);
        assert_eq!(diag.format(), "12: ERROR - redefinition of label \"x\"");
    }

    #[test]
    fn context_format_shows_source_and_file() {
        let lines = vec!["nop".to_string(), "jmp missing".to_string()];
        let err = AsmError::new(AsmErrorKind::Symbol, "unresolved symbol \"missing\"");
        let diag = Diagnostic::new(2, err).with_file(Some("prog.asm".to_string()));
        let rendered = diag.format_with_context(Some(&lines), false);
        assert_eq!(
            rendered,
            "prog.asm:2: ERROR\n    2 | jmp missing\nERROR: unresolved symbol \"missing\""
        );
    }

    #[test]
    fn context_format_survives_missing_source() {
        let err = AsmError::new(AsmErrorKind::Parser, "expected value");
        let diag = Diagnostic::new(9, err);
        let rendered = diag.format_with_context(None, false);
        assert!(rendered.contains("<source unavailable>"));
    }

    #[test]
    fn run_error_displays_inner_message() {
        let err = RunError::bare(AsmError::new(AsmErrorKind::Cli, "no input file"));
        assert_eq!(err.to_string(), "no input file");
        assert!(err.diagnostic().is_none());
    }
}
