use thiserror::Error;

use crate::span::{Position, render_caret};

/// Failures raised by the REX compile pipeline.
///
/// Every failure is fatal to the compile call that produced it: there is
/// no recovery and no partial result. Callers surface the display text to
/// the end user verbatim.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed token sequence. Carries the 1-based source position and
    /// the pre-rendered three-line caret message.
    #[error("{rendered}")]
    Syntax {
        line: u32,
        column: u32,
        message: String,
        rendered: String,
    },
    /// Operator, member, identifier, or expected-type mismatch.
    #[error("type error: {0}")]
    Type(String),
}

impl CoreError {
    /// Build a positioned syntax error against the original source text.
    pub fn syntax(source: &str, offset: u32, message: impl Into<String>) -> CoreError {
        let message = message.into();
        let Position { line, column } = crate::span::position_of(source, offset);
        let rendered = render_caret(source, offset, &message);
        CoreError::Syntax {
            line,
            column,
            message,
            rendered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn syntax_error_displays_rendered_caret() {
        let err = CoreError::syntax("1 +", 3, "unexpected end of input");
        let text = err.to_string();
        assert!(text.starts_with("unexpected end of input\n"));
        assert!(text.contains("<input>:1:1 +"));
        assert!(text.ends_with("^"));
    }

    #[test]
    fn syntax_error_carries_position() {
        let err = CoreError::syntax("a\nb ?", 4, "unexpected character");
        match err {
            CoreError::Syntax { line, column, .. } => {
                assert_eq!(line, 2);
                assert_eq!(column, 3);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
