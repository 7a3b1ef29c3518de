//! Source spans and diagnostic rendering for REX.
//!
//! Spans are byte offsets into the original expression text. They are
//! attached to tokens and AST nodes for diagnostics only and never
//! participate in equality of types or values.

/// A half-open byte range `[start, end)` into the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: u32,
    pub end: u32,
}

impl Span {
    pub fn new(start: u32, end: u32) -> Span {
        Span { start, end }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// A 1-based line/column pair derived from a span start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

/// Compute the 1-based line and column of a byte offset.
///
/// Columns count characters, not bytes, so a caret rendered from the
/// returned position lines up with the character the offset points at.
pub fn position_of(source: &str, offset: u32) -> Position {
    let offset = (offset as usize).min(source.len());
    let mut line = 1u32;
    let mut line_start = 0usize;
    for (i, b) in source.bytes().enumerate() {
        if i >= offset {
            break;
        }
        if b == b'\n' {
            line += 1;
            line_start = i + 1;
        }
    }
    let column = source[line_start..offset].chars().count() as u32 + 1;
    Position { line, column }
}

/// The full text of the line containing `offset`, without its newline.
pub fn line_text(source: &str, offset: u32) -> &str {
    let offset = (offset as usize).min(source.len());
    let start = source[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = source[start..]
        .find('\n')
        .map(|i| start + i)
        .unwrap_or(source.len());
    &source[start..end]
}

/// Render a syntax failure as a three-line message with a caret.
///
/// Line one is the message itself, line two quotes the offending source
/// line as `<input>:{line}:{lineText}`, and line three points a `^` at the
/// failing column. Tabs in the quoted line are kept as tabs in the padding
/// so the caret stays aligned under tab-indented input.
pub fn render_caret(source: &str, offset: u32, message: &str) -> String {
    let pos = position_of(source, offset);
    let line = line_text(source, offset);
    let prefix = format!("<input>:{}:", pos.line);

    let mut pad = String::new();
    for _ in prefix.chars() {
        pad.push(' ');
    }
    for ch in line.chars().take(pos.column as usize - 1) {
        pad.push(if ch == '\t' { '\t' } else { ' ' });
    }

    format!("{message}\n{prefix}{line}\n{pad}^")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_line_and_column() {
        let src = "a + b\nc * d";
        assert_eq!(position_of(src, 0), Position { line: 1, column: 1 });
        assert_eq!(position_of(src, 4), Position { line: 1, column: 5 });
        assert_eq!(position_of(src, 8), Position { line: 2, column: 3 });
    }

    #[test]
    fn renders_caret_under_failing_column() {
        let rendered = render_caret("1 + + 2", 4, "unexpected token");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "unexpected token");
        assert_eq!(lines[1], "<input>:1:1 + + 2");
        assert_eq!(lines[2], "              ^");
    }

    #[test]
    fn preserves_tabs_in_caret_padding() {
        let rendered = render_caret("\t1 +", 3, "unexpected end of input");
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[1], "<input>:1:\t1 +");
        // Ten prefix spaces, then the tab survives, then two spaces.
        assert_eq!(lines[2], "          \t  ^");
    }

    #[test]
    fn merges_spans() {
        let merged = Span::new(3, 5).merge(Span::new(1, 4));
        assert_eq!(merged, Span::new(1, 5));
    }
}
