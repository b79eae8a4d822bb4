#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::buffer::BufferError;
use crate::sourcemap::LineIndex;

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_TEMPLATE_SYNTAX: &str = "S2T-PARSE-001";
pub const ERR_EXPRESSION_SYNTAX: &str = "S2T-PARSE-002";
pub const ERR_SCRIPT_SYNTAX: &str = "S2T-PARSE-003";
pub const ERR_UNCLOSED_BLOCK: &str = "S2T-PARSE-004";
pub const ERR_DYNAMIC_SLOT_NAME: &str = "S2T-STRUCT-001";
pub const ERR_COMPUTED_EVENT_KEY: &str = "S2T-STRUCT-002";
pub const ERR_INVALID_LET: &str = "S2T-STRUCT-003";
pub const ERR_DUPLICATE_SCRIPT: &str = "S2T-STRUCT-004";
pub const ERR_BUFFER_INVARIANT: &str = "S2T-INTERNAL-001";

// ═══════════════════════════════════════════════════════════════════════════════
// GUARANTEES
// ═══════════════════════════════════════════════════════════════════════════════

fn get_guarantee(code: &str) -> &'static str {
    match code {
        ERR_TEMPLATE_SYNTAX => "Markup is parsed before any rewriting takes place.",
        ERR_EXPRESSION_SYNTAX => {
            "Template expressions are valid JavaScript/TypeScript expressions."
        }
        ERR_SCRIPT_SYNTAX => "Component scripts are valid JavaScript/TypeScript modules.",
        ERR_UNCLOSED_BLOCK => "Every block and element opened in the template is closed.",
        ERR_DYNAMIC_SLOT_NAME => {
            "Slot names are string literals or constants initialized with a string literal."
        }
        ERR_COMPUTED_EVENT_KEY => "Declared event names are identifiers or string literals.",
        ERR_INVALID_LET => "let: directives bind identifiers or destructuring patterns.",
        ERR_DUPLICATE_SCRIPT => {
            "A component has at most one instance script and one module script."
        }
        ERR_BUFFER_INVARIANT => "Rewrites never overlap and moved ranges stay contiguous.",
        _ => "Unknown invariant.",
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// COMPILER ERROR
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
pub struct SourceLocation {
    /// 1-based.
    pub line: u32,
    /// 0-based.
    pub column: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
#[error("{message} ({file}:{line}:{column}) [{code}]")]
pub struct CompilerError {
    pub code: String,
    pub error_type: String,
    pub message: String,
    pub guarantee: String,
    pub file: String,
    pub line: u32,
    pub column: u32,
    pub start: u32,
    pub end: u32,
    pub context: Option<String>,
    pub hints: Vec<String>,
    pub frame: String,
}

impl CompilerError {
    pub fn new(code: &str, message: &str, file: &str, line: u32, column: u32) -> Self {
        Self::with_details(code, message, file, line, column, None, vec![])
    }

    pub fn with_details(
        code: &str,
        message: &str,
        file: &str,
        line: u32,
        column: u32,
        context: Option<String>,
        hints: Vec<String>,
    ) -> Self {
        CompilerError {
            code: code.to_string(),
            error_type: error_type_for(code).to_string(),
            message: message.to_string(),
            guarantee: get_guarantee(code).to_string(),
            file: file.to_string(),
            line,
            column,
            start: 0,
            end: 0,
            context,
            hints,
            frame: String::new(),
        }
    }

    /// Error at a byte range of `source`, with line/column and a code frame filled in.
    pub fn at(code: &str, message: &str, file: &str, source: &str, start: u32, end: u32) -> Self {
        let index = LineIndex::new(source);
        let (line, column) = index.line_col_utf16(source, start);
        let mut error = Self::new(code, message, file, line + 1, column);
        error.start = start;
        error.end = end.max(start);
        error.frame = code_frame(source, start, end);
        error
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hints.push(hint.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// The `{start, end, frame}` shape callers get back in strict mode.
    pub fn positioned(&self, source: &str) -> PositionedError {
        let index = LineIndex::new(source);
        let location = |offset: u32| {
            let (line, column) = index.line_col_utf16(source, offset);
            SourceLocation {
                line: line + 1,
                column,
            }
        };
        PositionedError {
            code: self.code.clone(),
            message: self.message.clone(),
            start: location(self.start),
            end: location(self.end),
            frame: if self.frame.is_empty() {
                code_frame(source, self.start, self.end)
            } else {
                self.frame.clone()
            },
        }
    }
}

fn error_type_for(code: &str) -> &'static str {
    if code.starts_with("S2T-PARSE") {
        "PARSE_ERROR"
    } else if code.starts_with("S2T-STRUCT") {
        "STRUCTURAL_VIOLATION"
    } else {
        "COMPILER_INVARIANT_VIOLATION"
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Error, PartialEq, Eq)]
#[cfg_attr(feature = "napi", napi(object))]
#[serde(rename_all = "camelCase")]
#[error("{message} ({}:{})", .start.line, .start.column)]
pub struct PositionedError {
    pub code: String,
    pub message: String,
    pub start: SourceLocation,
    pub end: SourceLocation,
    pub frame: String,
}

#[derive(Debug, Error)]
pub enum TransformError {
    /// The markup, a script, or an expression did not parse.
    #[error("parse error: {0}")]
    Parse(Box<CompilerError>),
    /// Strict-mode rethrow of a parse error.
    #[error("parse error: {0}")]
    Strict(PositionedError),
    #[error("invalid template structure: {0}")]
    Structural(Box<CompilerError>),
    /// A handler broke a buffer invariant. Always an engine defect.
    #[error("internal error while handling {context}: {source}")]
    Internal {
        context: String,
        #[source]
        source: BufferError,
    },
}

impl TransformError {
    pub fn parse(error: CompilerError) -> Self {
        TransformError::Parse(Box::new(error))
    }

    pub fn structural(error: CompilerError) -> Self {
        TransformError::Structural(Box::new(error))
    }

    pub fn internal(context: impl Into<String>, source: BufferError) -> Self {
        TransformError::Internal {
            context: context.into(),
            source,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            TransformError::Parse(e) | TransformError::Structural(e) => &e.code,
            TransformError::Strict(e) => &e.code,
            TransformError::Internal { .. } => ERR_BUFFER_INVARIANT,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransformError>;

/// Attach node context to buffer failures.
pub trait BufferResultExt<T> {
    fn in_node(self, kind: &str, start: u32, end: u32) -> Result<T>;
}

impl<T> BufferResultExt<T> for std::result::Result<T, BufferError> {
    fn in_node(self, kind: &str, start: u32, end: u32) -> Result<T> {
        self.map_err(|source| {
            TransformError::internal(format!("{} {}..{}", kind, start, end), source)
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CODE FRAMES
// ═══════════════════════════════════════════════════════════════════════════════

/// Source excerpt around `[start, end)`: two lines before, one after, carets under
/// the offending columns of the first line.
pub fn code_frame(source: &str, start: u32, end: u32) -> String {
    let index = LineIndex::new(source);
    let (line, column) = index.line_col(start.min(source.len() as u32));
    let first = line.saturating_sub(2) as usize;
    let last = ((line + 1) as usize).min(index.line_count() - 1);
    let width = (last + 1).to_string().len();

    let mut frame = String::new();
    for current in first..=last {
        let line_start = index.line_start(current).unwrap_or(0) as usize;
        let line_end = index
            .line_start(current + 1)
            .map(|next| next as usize - 1)
            .unwrap_or(source.len());
        let text = source
            .get(line_start..line_end)
            .unwrap_or_default()
            .trim_end_matches('\r');
        frame.push_str(&format!("{:>width$}: {}\n", current + 1, text, width = width));
        if current == line as usize {
            let span_len = if end > start {
                let line_rest = text.len().saturating_sub(column as usize);
                ((end - start) as usize).min(line_rest).max(1)
            } else {
                1
            };
            let pad: String = text
                .get(..column as usize)
                .unwrap_or_default()
                .chars()
                .map(|c| if c == '\t' { '\t' } else { ' ' })
                .collect();
            frame.push_str(&format!(
                "{:>width$}  {}{}\n",
                "",
                pad,
                "^".repeat(span_len),
                width = width
            ));
        }
    }
    frame.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_at_computes_location_and_frame() {
        let source = "<div>\n{a +}\n</div>";
        let error = CompilerError::at(
            ERR_EXPRESSION_SYNTAX,
            "Unexpected token",
            "App.svelte",
            source,
            7,
            10,
        );
        assert_eq!(error.line, 2);
        assert_eq!(error.column, 1);
        assert_eq!(error.error_type, "PARSE_ERROR");
        assert!(error.frame.contains("2: {a +}"));
        assert!(error.frame.contains("^^^"));
    }

    #[test]
    fn test_positioned_shape() {
        let source = "ab\ncd";
        let error = CompilerError::at(ERR_TEMPLATE_SYNTAX, "bad", "x.svelte", source, 3, 5);
        let positioned = error.positioned(source);
        assert_eq!(positioned.start, SourceLocation { line: 2, column: 0 });
        assert_eq!(positioned.end, SourceLocation { line: 2, column: 2 });
        assert!(!positioned.frame.is_empty());
    }

    #[test]
    fn test_guarantee_lookup() {
        let error = CompilerError::new(ERR_DYNAMIC_SLOT_NAME, "dynamic", "a.svelte", 1, 0);
        assert!(error.guarantee.starts_with("Slot names"));
        assert_eq!(error.error_type, "STRUCTURAL_VIOLATION");
    }
}
