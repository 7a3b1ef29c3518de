//! Lexer for REX expression text.
//!
//! The lexer is intentionally simple: it recognizes keywords, literals,
//! and operators, and leaves all interpretation (escape decoding, numeric
//! parsing) to the parser. The first malformed character aborts the whole
//! lex with a positioned syntax error.

use crate::error::CoreError;
use crate::span::Span;

/// Kind of a token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Special
    Eof,

    // Identifiers and literals
    Ident,
    /// Backtick-quoted identifier; text offsets exclude the backticks.
    QuotedIdent,
    IntLiteral,
    DoubleLiteral,
    /// Double-quoted string; text offsets exclude the quotes and escapes
    /// are still encoded.
    StringLiteral,
    BoolLiteral, // true / false

    // Punctuation
    LParen,   // (
    RParen,   // )
    LBrace,   // {
    RBrace,   // }
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Dot,      // .
    Colon,    // :
    Equal,    // =

    // Operators
    EqEq,     // ==
    NotEq,    // !=
    Le,       // <=
    Ge,       // >=
    Lt,       // <
    Gt,       // >
    Plus,     // +
    Minus,    // -
    Star,     // *
    Slash,    // /
    Percent,  // %
    Tilde,    // ~
    Bang,     // !
    AmpAmp,   // &&
    Amp,      // &
    PipePipe, // ||
    Pipe,     // |
    FatArrow, // =>

    // Keywords
    If,
    Else,
    Let,
    And,
    In,
}

/// A single token with its kind and span.
///
/// The `text_start` / `text_end` fields are byte offsets into the original
/// source string, so the parser can retrieve the concrete text when needed.
/// For quoted tokens they point at the content, not the delimiters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub text_start: u32,
    pub text_end: u32,
}

impl Token {
    /// The concrete text of this token within `source`.
    pub fn text<'src>(&self, source: &'src str) -> &'src str {
        &source[self.text_start as usize..self.text_end as usize]
    }
}

/// Lex a source string into tokens, ending with an `Eof` sentinel.
pub fn lex(source: &str) -> Result<Vec<Token>, CoreError> {
    let mut lexer = Lexer {
        source,
        bytes: source.as_bytes(),
        len: source.len(),
        index: 0,
    };
    lexer.run()
}

struct Lexer<'src> {
    source: &'src str,
    bytes: &'src [u8],
    len: usize,
    index: usize,
}

impl<'src> Lexer<'src> {
    fn run(&mut self) -> Result<Vec<Token>, CoreError> {
        let mut tokens = Vec::new();

        while let Some(ch) = self.peek_char() {
            if is_whitespace(ch) {
                self.consume_char();
                continue;
            }

            let start = self.index as u32;
            let token = match ch {
                b'(' => self.single(TokenKind::LParen, start),
                b')' => self.single(TokenKind::RParen, start),
                b'{' => self.single(TokenKind::LBrace, start),
                b'}' => self.single(TokenKind::RBrace, start),
                b'[' => self.single(TokenKind::LBracket, start),
                b']' => self.single(TokenKind::RBracket, start),
                b',' => self.single(TokenKind::Comma, start),
                b'.' => self.single(TokenKind::Dot, start),
                b':' => self.single(TokenKind::Colon, start),
                b'+' => self.single(TokenKind::Plus, start),
                b'-' => self.single(TokenKind::Minus, start),
                b'*' => self.single(TokenKind::Star, start),
                b'/' => self.single(TokenKind::Slash, start),
                b'%' => self.single(TokenKind::Percent, start),
                b'~' => self.single(TokenKind::Tilde, start),
                b'=' => {
                    self.consume_char();
                    match self.peek_char() {
                        Some(b'>') => {
                            self.consume_char();
                            self.simple_token(TokenKind::FatArrow, start)
                        }
                        Some(b'=') => {
                            self.consume_char();
                            self.simple_token(TokenKind::EqEq, start)
                        }
                        _ => self.simple_token(TokenKind::Equal, start),
                    }
                }
                b'!' => {
                    self.consume_char();
                    if self.peek_char() == Some(b'=') {
                        self.consume_char();
                        self.simple_token(TokenKind::NotEq, start)
                    } else {
                        self.simple_token(TokenKind::Bang, start)
                    }
                }
                b'<' => {
                    self.consume_char();
                    if self.peek_char() == Some(b'=') {
                        self.consume_char();
                        self.simple_token(TokenKind::Le, start)
                    } else {
                        self.simple_token(TokenKind::Lt, start)
                    }
                }
                b'>' => {
                    self.consume_char();
                    if self.peek_char() == Some(b'=') {
                        self.consume_char();
                        self.simple_token(TokenKind::Ge, start)
                    } else {
                        self.simple_token(TokenKind::Gt, start)
                    }
                }
                b'&' => {
                    self.consume_char();
                    if self.peek_char() == Some(b'&') {
                        self.consume_char();
                        self.simple_token(TokenKind::AmpAmp, start)
                    } else {
                        self.simple_token(TokenKind::Amp, start)
                    }
                }
                b'|' => {
                    self.consume_char();
                    if self.peek_char() == Some(b'|') {
                        self.consume_char();
                        self.simple_token(TokenKind::PipePipe, start)
                    } else {
                        self.simple_token(TokenKind::Pipe, start)
                    }
                }
                b'"' => self.lex_string(start)?,
                b'`' => self.lex_quoted_ident(start)?,
                b'0'..=b'9' => self.lex_number(start),
                _ => {
                    if is_ident_start(ch) {
                        self.lex_ident_or_keyword(start)
                    } else {
                        return Err(CoreError::syntax(
                            self.source,
                            start,
                            "unexpected character",
                        ));
                    }
                }
            };

            tokens.push(token);
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            span: Span::new(self.len as u32, self.len as u32),
            text_start: self.len as u32,
            text_end: self.len as u32,
        });

        Ok(tokens)
    }

    fn single(&mut self, kind: TokenKind, start: u32) -> Token {
        self.consume_char();
        self.simple_token(kind, start)
    }

    fn simple_token(&self, kind: TokenKind, start: u32) -> Token {
        let end = self.index as u32;
        Token {
            kind,
            span: Span::new(start, end),
            text_start: start,
            text_end: end,
        }
    }

    fn lex_string(&mut self, start: u32) -> Result<Token, CoreError> {
        // Consume the opening quote.
        self.consume_char();
        let content_start = self.index as u32;

        while let Some(ch) = self.peek_char() {
            match ch {
                b'"' => {
                    let content_end = self.index as u32;
                    self.consume_char(); // closing quote
                    return Ok(Token {
                        kind: TokenKind::StringLiteral,
                        span: Span::new(start, self.index as u32),
                        text_start: content_start,
                        text_end: content_end,
                    });
                }
                b'\\' => {
                    // Skip over backslash + next char; decoding happens later.
                    self.consume_char();
                    if self.peek_char().is_some() {
                        self.consume_char();
                    }
                }
                _ => self.consume_char(),
            }
        }

        Err(CoreError::syntax(
            self.source,
            start,
            "unterminated string literal",
        ))
    }

    fn lex_quoted_ident(&mut self, start: u32) -> Result<Token, CoreError> {
        // Consume the opening backtick.
        self.consume_char();
        let content_start = self.index as u32;

        while let Some(ch) = self.peek_char() {
            if ch == b'`' {
                let content_end = self.index as u32;
                self.consume_char(); // closing backtick
                return Ok(Token {
                    kind: TokenKind::QuotedIdent,
                    span: Span::new(start, self.index as u32),
                    text_start: content_start,
                    text_end: content_end,
                });
            }
            self.consume_char();
        }

        Err(CoreError::syntax(
            self.source,
            start,
            "unterminated quoted identifier",
        ))
    }

    fn lex_number(&mut self, start: u32) -> Token {
        while matches!(self.peek_char(), Some(b'0'..=b'9')) {
            self.consume_char();
        }

        let mut is_double = false;

        // Fractional part: '.' must be followed by a digit, so `1.size()`
        // still lexes as an integer and a method call.
        if self.peek_char() == Some(b'.') {
            if let Some(b'0'..=b'9') = self.peek_next() {
                is_double = true;
                self.consume_char(); // '.'
                while matches!(self.peek_char(), Some(b'0'..=b'9')) {
                    self.consume_char();
                }
            }
        }

        // Exponent: e / E with optional sign.
        if matches!(self.peek_char(), Some(b'e' | b'E')) {
            let mut lookahead = self.index + 1;
            if matches!(self.bytes.get(lookahead), Some(b'+' | b'-')) {
                lookahead += 1;
            }
            if matches!(self.bytes.get(lookahead), Some(b'0'..=b'9')) {
                is_double = true;
                while self.index < lookahead {
                    self.consume_char();
                }
                while matches!(self.peek_char(), Some(b'0'..=b'9')) {
                    self.consume_char();
                }
            }
        }

        // Trailing d / D marks a double even without '.' or exponent.
        if matches!(self.peek_char(), Some(b'd' | b'D')) {
            is_double = true;
            self.consume_char();
        }

        let end = self.index as u32;
        Token {
            kind: if is_double {
                TokenKind::DoubleLiteral
            } else {
                TokenKind::IntLiteral
            },
            span: Span::new(start, end),
            text_start: start,
            text_end: end,
        }
    }

    fn lex_ident_or_keyword(&mut self, start: u32) -> Token {
        while let Some(ch) = self.peek_char() {
            if is_ident_continue(ch) {
                self.consume_char();
            } else {
                break;
            }
        }

        let end = self.index as u32;
        let text = &self.source[start as usize..end as usize];

        let kind = match text {
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "let" => TokenKind::Let,
            "and" => TokenKind::And,
            "in" => TokenKind::In,
            "true" => TokenKind::BoolLiteral,
            "false" => TokenKind::BoolLiteral,
            _ => TokenKind::Ident,
        };

        Token {
            kind,
            span: Span::new(start, end),
            text_start: start,
            text_end: end,
        }
    }

    fn peek_char(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.bytes.get(self.index + 1).copied()
    }

    fn consume_char(&mut self) {
        if self.index < self.len {
            self.index += 1;
        }
    }
}

fn is_whitespace(ch: u8) -> bool {
    matches!(ch, b' ' | b'\t' | b'\n' | b'\r')
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source)
            .expect("lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_arithmetic_expression() {
        assert_eq!(
            kinds("1 + 2 * 3"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::Plus,
                TokenKind::IntLiteral,
                TokenKind::Star,
                TokenKind::IntLiteral,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn distinguishes_compound_operators() {
        assert_eq!(
            kinds("= == != <= >= => && & || |"),
            vec![
                TokenKind::Equal,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::FatArrow,
                TokenKind::AmpAmp,
                TokenKind::Amp,
                TokenKind::PipePipe,
                TokenKind::Pipe,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn classifies_numeric_literals() {
        assert_eq!(kinds("42")[0], TokenKind::IntLiteral);
        assert_eq!(kinds("4.5")[0], TokenKind::DoubleLiteral);
        assert_eq!(kinds("1e10")[0], TokenKind::DoubleLiteral);
        assert_eq!(kinds("2.5e-3")[0], TokenKind::DoubleLiteral);
        assert_eq!(kinds("7d")[0], TokenKind::DoubleLiteral);
        assert_eq!(kinds("7D")[0], TokenKind::DoubleLiteral);
    }

    #[test]
    fn integer_followed_by_method_call_stays_integer() {
        assert_eq!(
            kinds("1.toString()"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::Dot,
                TokenKind::Ident,
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_token_points_at_content() {
        let tokens = lex(r#""hi\tthere""#).expect("lex");
        assert_eq!(tokens[0].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[0].text(r#""hi\tthere""#), r"hi\tthere");
    }

    #[test]
    fn quoted_ident_strips_backticks() {
        let source = "`my column` + 1";
        let tokens = lex(source).expect("lex");
        assert_eq!(tokens[0].kind, TokenKind::QuotedIdent);
        assert_eq!(tokens[0].text(source), "my column");
    }

    #[test]
    fn recognizes_keywords() {
        assert_eq!(
            kinds("let x = true and y = false in if x else y"),
            vec![
                TokenKind::Let,
                TokenKind::Ident,
                TokenKind::Equal,
                TokenKind::BoolLiteral,
                TokenKind::And,
                TokenKind::Ident,
                TokenKind::Equal,
                TokenKind::BoolLiteral,
                TokenKind::In,
                TokenKind::If,
                TokenKind::Ident,
                TokenKind::Else,
                TokenKind::Ident,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn rejects_unexpected_character() {
        let err = lex("1 # 2").unwrap_err();
        assert!(matches!(err, CoreError::Syntax { column: 3, .. }));
    }

    #[test]
    fn rejects_unterminated_string() {
        let err = lex("\"abc").unwrap_err();
        assert!(matches!(err, CoreError::Syntax { .. }));
    }
}
