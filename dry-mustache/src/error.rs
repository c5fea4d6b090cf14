//! Error handling for template compilation and rendering
//!
//! Three failures are reported to callers:
//!
//! - [`ParseError`]: the template text is malformed. Raised only while compiling.
//! - [`TemplateNotFoundError`]: a partial name could not be resolved. Raised when
//!   the partial tag is reached during rendering.
//! - [`RenderError`]: a filter is missing or rejected its argument, or a custom
//!   render function failed. Aborts the whole rendering.
//!
//! [`Error`] wraps all three so that entry points can use a single `Result`.

use std::fmt::{self, Display};

use thiserror::Error;

use crate::repository::TemplateId;

/// Line and column of a tag or text span, both starting at 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub(crate) fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Formats an optional template identity as an error suffix
fn in_template(template: &Option<TemplateId>) -> String {
    match template {
        Some(id) => format!(" of template `{}`", id),
        None => String::new(),
    }
}

/// Error type for template parsing failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at {position}{}: {message}", in_template(.template))]
pub struct ParseError {
    pub message: String,
    pub position: Position,
    pub template: Option<TemplateId>,
}

impl ParseError {
    pub(crate) fn new(message: impl Into<String>, position: Position) -> Self {
        Self {
            message: message.into(),
            position,
            template: None,
        }
    }

    /// Creates an error for tags that are never closed
    pub(crate) fn unclosed(position: Position) -> Self {
        Self::new("Unclosed Mustache tag", position)
    }

    pub(crate) fn in_template(mut self, template: Option<&TemplateId>) -> Self {
        self.template = template.cloned();
        self
    }
}

/// A partial or parent template name that the data source cannot serve
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no such template: `{name}`{}{}", relative_suffix(.relative_to), reason_suffix(.reason))]
pub struct TemplateNotFoundError {
    pub name: String,
    pub relative_to: Option<TemplateId>,
    pub reason: Option<String>,
}

fn relative_suffix(relative_to: &Option<TemplateId>) -> String {
    match relative_to {
        Some(id) => format!(" (from `{}`)", id),
        None => String::new(),
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(": {}", reason),
        None => String::new(),
    }
}

impl TemplateNotFoundError {
    pub fn new(name: impl Into<String>, relative_to: Option<&TemplateId>) -> Self {
        Self {
            name: name.into(),
            relative_to: relative_to.cloned(),
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Failures while evaluating expressions or running custom render functions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("missing filter `{0}`")]
    MissingFilter(String),
    #[error("`{0}` is not a filter")]
    NotAFilter(String),
    #[error("{0}")]
    Rejected(String),
    #[error("could not render `{tag}` at {position}{}: {source}", in_template(.template))]
    InTag {
        tag: String,
        position: Position,
        template: Option<TemplateId>,
        source: Box<RenderError>,
    },
}

impl RenderError {
    /// Error for filters and render functions refusing their input
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

/// Any failure raised by compiling or rendering
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    NotFound(#[from] TemplateNotFoundError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Result type for compile and render operations
pub type Result<T> = std::result::Result<T, Error>;
