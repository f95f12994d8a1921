//! Diagnostics shared by every stage of the formula pipeline.
//!
//! Errors fall into three kinds:
//!
//! - **Syntax**: produced by the lexer and parser; fatal to parsing.
//! - **Semantic**: produced by the validator on a well-formed AST.
//! - **Runtime**: produced by the executor against a concrete context.
//!
//! Failures are reported as an [`ErrorList`] rather than a single error so
//! that a formula author sees every problem at once. A non-empty list always
//! means failure, even when a stage also managed to build a partial result.
//!
//! # Examples
//!
//! ```rust
//! use zman_syntax::error::{Error, ErrorKind, ErrorList};
//! use zman_syntax::token::Position;
//!
//! let err = Error::semantic("solar() degrees must be between 0 and 90")
//!     .at(Position::new(1, 7))
//!     .with_suggestion("Common values: 8.5 for nightfall, 16.1 for dawn");
//! assert_eq!(err.kind, ErrorKind::Semantic);
//!
//! let list = ErrorList::from(err).with_source("solar(100, before_sunrise)");
//! assert_eq!(list.len(), 1);
//! assert!(list.render().contains("solar(100, before_sunrise)"));
//! ```

use std::fmt;

use crate::token::Position;

/// The pipeline stage an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed token stream or grammar violation.
    Syntax,
    /// A structurally valid AST that breaks a static rule.
    Semantic,
    /// A failure while evaluating against a concrete context.
    Runtime,
}

impl ErrorKind {
    /// Header used when rendering an error for people.
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Syntax => "Syntax error",
            ErrorKind::Semantic => "Semantic error",
            ErrorKind::Runtime => "Runtime error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Syntax => "syntax",
            ErrorKind::Semantic => "semantic",
            ErrorKind::Runtime => "runtime",
        };
        f.write_str(s)
    }
}

/// A single diagnostic.
///
/// # Fields
///
/// - `kind`: which stage reported it
/// - `msg`: human-readable description
/// - `line` / `col`: optional 1-based location in the formula text
/// - `context`: the source line the location points into, when known
/// - `suggestion`: a corrective hint for the formula author
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub msg: String,
    pub line: Option<usize>,
    pub col: Option<usize>,
    pub context: Option<String>,
    pub suggestion: Option<String>,
}

impl Error {
    /// Creates an error with no location.
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
            line: None,
            col: None,
            context: None,
            suggestion: None,
        }
    }

    pub fn syntax(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Syntax, msg)
    }

    pub fn semantic(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Semantic, msg)
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, msg)
    }

    /// Creates an error pointing at `line`:`col`.
    ///
    /// ```rust
    /// use zman_syntax::{Error, ErrorKind};
    ///
    /// let err = Error::with_span(ErrorKind::Syntax, "unexpected end of formula", 1, 10);
    /// assert_eq!(err.to_string(), "unexpected end of formula at 1:10");
    /// ```
    pub fn with_span(kind: ErrorKind, msg: impl Into<String>, line: usize, col: usize) -> Self {
        Self {
            line: Some(line),
            col: Some(col),
            ..Self::new(kind, msg)
        }
    }

    /// Attaches a source position.
    pub fn at(mut self, pos: Position) -> Self {
        self.line = Some(pos.line);
        self.col = Some(pos.column);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Renders a multi-line block: header, location, source pointer and help.
    ///
    /// Presentation only; nothing in the pipeline inspects the output.
    pub fn render(&self) -> String {
        let mut out = format!("{}: {}\n", self.kind.label(), self.msg);
        if let (Some(line), Some(col)) = (self.line, self.col) {
            out.push_str(&format!("  --> line {}, column {}\n", line, col));
            if let Some(src_line) = &self.context {
                let gutter = format!("{:3} | ", line);
                out.push_str("    |\n");
                out.push_str(&gutter);
                out.push_str(src_line);
                out.push('\n');
                out.push_str(&" ".repeat(gutter.len() - 2));
                out.push_str("| ");
                out.push_str(&" ".repeat(col.saturating_sub(1)));
                out.push_str("^\n");
            }
        }
        if let Some(s) = &self.suggestion {
            out.push_str(&format!("  = help: {}\n", s));
        }
        out
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(l), Some(c)) = (self.line, self.col) {
            write!(f, "{} at {}:{}", self.msg, l, c)
        } else {
            write!(f, "{}", self.msg)
        }
    }
}

impl std::error::Error for Error {}

/// Ordered collection of errors; the unit of failure reporting.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorList(Vec<Error>);

impl ErrorList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, err: Error) {
        self.0.push(err);
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = Error>) {
        self.0.extend(other);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    pub fn first(&self) -> Option<&Error> {
        self.0.first()
    }

    pub fn as_slice(&self) -> &[Error] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Error> {
        self.0
    }

    /// Fills in the source line for every located error that lacks one.
    pub fn with_source(mut self, source: &str) -> Self {
        for err in &mut self.0 {
            if err.context.is_none() {
                if let Some(line) = err.line {
                    if let Some(text) = source.lines().nth(line.saturating_sub(1)) {
                        err.context = Some(text.to_string());
                    }
                }
            }
        }
        self
    }

    /// Renders every error with [`Error::render`], separated by blank lines.
    pub fn render(&self) -> String {
        self.0
            .iter()
            .map(Error::render)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for ErrorList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}: {}", err.kind, err)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorList {}

impl From<Error> for ErrorList {
    fn from(err: Error) -> Self {
        Self(vec![err])
    }
}

impl From<Vec<Error>> for ErrorList {
    fn from(errors: Vec<Error>) -> Self {
        Self(errors)
    }
}

impl FromIterator<Error> for ErrorList {
    fn from_iter<I: IntoIterator<Item = Error>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for ErrorList {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a ErrorList {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// A specialized `Result` for single-error operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Shorthand for `Err(Error::new(kind, msg).at(pos))`.
pub fn error_at<T>(kind: ErrorKind, pos: Position, msg: impl Into<String>) -> Result<T> {
    Err(Error::new(kind, msg).at(pos))
}
