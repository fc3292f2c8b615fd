use crate::source::SourceSpan;
use serde::Serialize;
use std::fmt;

/// Kind of parse or lowering error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    UnexpectedEndOfFile,
    UnbalancedDelimiter,
    UnexpectedTransition,
    ReservedWord,
    InvalidDirective,
    UnclosedTag,
    UnclosedComment,
    UnclosedSection,
    MisplacedImport,
    AmbiguousTagHelper,
    InvalidAttribute,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::UnexpectedEndOfFile => "Unexpected end of file",
            ErrorKind::UnbalancedDelimiter => "Unbalanced delimiter",
            ErrorKind::UnexpectedTransition => "Unexpected transition",
            ErrorKind::ReservedWord => "Reserved word",
            ErrorKind::InvalidDirective => "Invalid directive",
            ErrorKind::UnclosedTag => "Unclosed tag",
            ErrorKind::UnclosedComment => "Unclosed comment",
            ErrorKind::UnclosedSection => "Unclosed section",
            ErrorKind::MisplacedImport => "Misplaced import",
            ErrorKind::AmbiguousTagHelper => "Ambiguous tag helper",
            ErrorKind::InvalidAttribute => "Invalid attribute",
        }
    }
}

/// Error recorded during parsing or lowering.
///
/// These are diagnostics, not failures: the pipeline keeps going and returns
/// a best-effort tree alongside the error list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: SourceSpan,
    pub related_span: Option<SourceSpan>,
    pub related_label: Option<String>,
    pub help: Option<String>,
}

impl ParseError {
    /// Create a new parse error
    pub fn new(kind: ErrorKind, message: impl Into<String>, span: SourceSpan) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
            related_span: None,
            related_label: None,
            help: None,
        }
    }

    /// Add a related span (e.g. where an unclosed block was opened)
    pub fn with_related(mut self, span: SourceSpan) -> Self {
        self.related_span = Some(span);
        self
    }

    /// Set the label for the related span
    pub fn with_related_label(mut self, label: impl Into<String>) -> Self {
        self.related_label = Some(label.into());
        self
    }

    /// Add help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Render the error with source context
    pub fn render(&self, source: &str, filename: &str) -> String {
        self.render_inner(source, filename, false)
    }

    /// Render the error with ANSI color codes
    pub fn render_color(&self, source: &str, filename: &str) -> String {
        self.render_inner(source, filename, true)
    }

    fn render_inner(&self, source: &str, filename: &str, color: bool) -> String {
        let red = if color { "\x1b[1;31m" } else { "" };
        let dim = if color { "\x1b[2m" } else { "" };
        let cyan = if color { "\x1b[1;36m" } else { "" };
        let reset = if color { "\x1b[0m" } else { "" };

        let mut output = String::new();
        output.push('\n');

        let line = self.span.location.line + 1;
        let col = self.span.location.col + 1;
        output.push_str(&format!(" {}file:{} {}:{}:{}\n", dim, reset, filename, line, col));
        output.push_str(&format!("{}error:{} {}\n", red, reset, self.message));

        if let Some(source_line) = source.lines().nth(self.span.location.line) {
            let width = format!("{}", line).len().max(2);
            output.push_str(&format!("{}{:>width$} |{}\n", dim, "", reset, width = width));
            output.push_str(&format!("{}{:>width$} |{} {}\n", dim, line, reset, source_line, width = width));

            let caret_start = self.span.location.col;
            let caret_len = self
                .span
                .length
                .min(source_line.len().saturating_sub(caret_start))
                .max(1);
            output.push_str(&format!(
                "{}{:>width$} |{} {}{}{}{}\n",
                dim,
                "",
                reset,
                " ".repeat(caret_start),
                red,
                "^".repeat(caret_len),
                reset,
                width = width
            ));
        }

        if let Some(ref related) = self.related_span {
            let related_line = related.location.line + 1;
            if let Some(related_source_line) = source.lines().nth(related.location.line) {
                let width = format!("{}", related_line).len().max(2);
                output.push_str(&format!(
                    "{}{:>width$} |{} {}\n",
                    dim, related_line, reset, related_source_line, width = width
                ));
                let caret_start = related.location.col;
                let caret_len = related
                    .length
                    .min(related_source_line.len().saturating_sub(caret_start))
                    .max(1);
                let label = self.related_label.as_deref().unwrap_or("opened here");
                output.push_str(&format!(
                    "{}{:>width$} |{} {}{}{} {}{}\n",
                    dim,
                    "",
                    reset,
                    " ".repeat(caret_start),
                    dim,
                    "^".repeat(caret_len),
                    label,
                    reset,
                    width = width
                ));
            }
        }

        if let Some(ref help) = self.help {
            output.push('\n');
            for (i, help_line) in help.lines().enumerate() {
                if i == 0 {
                    output.push_str(&format!(" {}help:{} {}\n", cyan, reset, help_line));
                } else {
                    output.push_str(&format!("       {}\n", help_line));
                }
            }
        }

        output.push('\n');
        output
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Error terminating a whole compilation
#[derive(Debug)]
pub enum CompileError {
    /// The parse was cancelled; no output was produced
    Cancelled,
    /// Generation failed outright (not a diagnostic)
    Generate(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::Cancelled => write!(f, "compilation cancelled"),
            CompileError::Generate(msg) => write!(f, "Generation error: {}", msg),
        }
    }
}

impl std::error::Error for CompileError {}
