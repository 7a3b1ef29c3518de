//! Recursive descent parser for REX expressions.
//!
//! The grammar is precedence-layered, lowest to highest: lambda, `if`,
//! `let .. and .. in`, logical-or, logical-and, relational, equality,
//! additive, multiplicative, the `~` match operator, the postfix chain
//! (field access, method call, indexing), unary prefix, primary. All
//! binary levels fold left; unary prefixes fold right. The first grammar
//! error aborts the whole parse with a positioned syntax error.

use crate::ast::{BinaryOp, CompareOp, Expr, ExprKind, Literal, UnaryOp};
use crate::error::CoreError;
use crate::lexer::{Token, TokenKind, lex};
use crate::span::Span;

/// Parse one complete expression; trailing input is an error.
pub fn parse_expression(source: &str) -> Result<Expr, CoreError> {
    let tokens = lex(source)?;
    let mut parser = Parser {
        source,
        tokens: &tokens,
        pos: 0,
    };
    let expr = parser.expression()?;
    parser.expect_eof()?;
    Ok(expr)
}

pub(crate) struct Parser<'src> {
    source: &'src str,
    tokens: &'src [Token],
    pos: usize,
}

impl<'src> Parser<'src> {
    pub(crate) fn new(source: &'src str, tokens: &'src [Token]) -> Parser<'src> {
        Parser {
            source,
            tokens,
            pos: 0,
        }
    }

    pub(crate) fn expression(&mut self) -> Result<Expr, CoreError> {
        // Lambda needs two tokens of lookahead: `ident => ...`.
        if matches!(
            self.peek().kind,
            TokenKind::Ident | TokenKind::QuotedIdent
        ) && self.peek_ahead(1).kind == TokenKind::FatArrow
        {
            return self.lambda();
        }
        match self.peek().kind {
            TokenKind::If => self.if_expr(),
            TokenKind::Let => self.let_expr(),
            _ => self.or_expr(),
        }
    }

    fn lambda(&mut self) -> Result<Expr, CoreError> {
        let param_token = self.advance();
        let param = param_token.text(self.source).to_string();
        let start = param_token.span;
        self.advance(); // =>
        let body = self.expression()?;
        let span = start.merge(body.span);
        Ok(Expr::new(
            ExprKind::Lambda {
                param,
                body: Box::new(body),
            },
            span,
        ))
    }

    fn if_expr(&mut self) -> Result<Expr, CoreError> {
        let start = self.advance().span; // if
        // The condition is always parenthesized, so a then-branch starting
        // with '-' cannot be folded into the condition.
        self.expect(TokenKind::LParen, "expected '(' after 'if'")?;
        let cond = self.expression()?;
        self.expect(TokenKind::RParen, "expected ')' after condition")?;
        let then_branch = self.expression()?;
        self.expect(TokenKind::Else, "expected 'else'")?;
        let else_branch = self.expression()?;
        let span = start.merge(else_branch.span);
        Ok(Expr::new(
            ExprKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            span,
        ))
    }

    fn let_expr(&mut self) -> Result<Expr, CoreError> {
        let start = self.advance().span; // let
        let mut bindings = Vec::new();
        loop {
            let name = self.ident_name()?;
            self.expect(TokenKind::Equal, "expected '=' in let binding")?;
            let value = self.expression()?;
            bindings.push((name, value));
            if self.peek().kind == TokenKind::And {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(TokenKind::In, "expected 'in' after let bindings")?;
        let body = self.expression()?;
        let span = start.merge(body.span);
        Ok(Expr::new(
            ExprKind::Let {
                bindings,
                body: Box::new(body),
            },
            span,
        ))
    }

    fn or_expr(&mut self) -> Result<Expr, CoreError> {
        let mut lhs = self.and_expr()?;
        while matches!(self.peek().kind, TokenKind::PipePipe | TokenKind::Pipe) {
            self.advance();
            let rhs = self.and_expr()?;
            lhs = binary(BinaryOp::Or, lhs, rhs);
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, CoreError> {
        let mut lhs = self.rel_expr()?;
        while matches!(self.peek().kind, TokenKind::AmpAmp | TokenKind::Amp) {
            self.advance();
            let rhs = self.rel_expr()?;
            lhs = binary(BinaryOp::And, lhs, rhs);
        }
        Ok(lhs)
    }

    fn rel_expr(&mut self) -> Result<Expr, CoreError> {
        let mut lhs = self.eq_expr()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Le => CompareOp::Le,
                TokenKind::Ge => CompareOp::Ge,
                TokenKind::Lt => CompareOp::Lt,
                TokenKind::Gt => CompareOp::Gt,
                _ => break,
            };
            self.advance();
            let rhs = self.eq_expr()?;
            lhs = comparison(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn eq_expr(&mut self) -> Result<Expr, CoreError> {
        let mut lhs = self.add_expr()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::EqEq => CompareOp::Eq,
                TokenKind::NotEq => CompareOp::Ne,
                _ => break,
            };
            self.advance();
            let rhs = self.add_expr()?;
            lhs = comparison(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn add_expr(&mut self) -> Result<Expr, CoreError> {
        let mut lhs = self.mul_expr()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.mul_expr()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn mul_expr(&mut self) -> Result<Expr, CoreError> {
        let mut lhs = self.match_expr()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                TokenKind::Percent => BinaryOp::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.match_expr()?;
            lhs = binary(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn match_expr(&mut self) -> Result<Expr, CoreError> {
        let mut lhs = self.postfix_expr()?;
        while self.peek().kind == TokenKind::Tilde {
            self.advance();
            let rhs = self.postfix_expr()?;
            lhs = binary(BinaryOp::Match, lhs, rhs);
        }
        Ok(lhs)
    }

    fn postfix_expr(&mut self) -> Result<Expr, CoreError> {
        let mut target = self.unary_expr()?;
        loop {
            match self.peek().kind {
                TokenKind::Dot => {
                    self.advance();
                    let name = self.ident_name()?;
                    if self.peek().kind == TokenKind::LParen {
                        self.advance();
                        let mut args = Vec::new();
                        if self.peek().kind != TokenKind::RParen {
                            loop {
                                args.push(self.expression()?);
                                if self.peek().kind == TokenKind::Comma {
                                    self.advance();
                                } else {
                                    break;
                                }
                            }
                        }
                        let close =
                            self.expect(TokenKind::RParen, "expected ')' after arguments")?;
                        let span = target.span.merge(close.span);
                        target = Expr::new(
                            ExprKind::MethodCall {
                                target: Box::new(target),
                                method: name,
                                args,
                            },
                            span,
                        );
                    } else {
                        let span = target.span.merge(self.prev_span());
                        target = Expr::new(
                            ExprKind::Select {
                                target: Box::new(target),
                                field: name,
                            },
                            span,
                        );
                    }
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.expression()?;
                    let close = self.expect(TokenKind::RBracket, "expected ']' after index")?;
                    let span = target.span.merge(close.span);
                    target = Expr::new(
                        ExprKind::Index {
                            target: Box::new(target),
                            index: Box::new(index),
                        },
                        span,
                    );
                }
                _ => break,
            }
        }
        Ok(target)
    }

    fn unary_expr(&mut self) -> Result<Expr, CoreError> {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Neg,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.primary(),
        };
        let start = self.advance().span;
        // Prefixes fold right over the primary.
        let operand = self.unary_expr()?;
        let span = start.merge(operand.span);
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        ))
    }

    fn primary(&mut self) -> Result<Expr, CoreError> {
        let token = *self.peek();
        match token.kind {
            TokenKind::IntLiteral => {
                self.advance();
                let text = token.text(self.source);
                let value = text.parse::<i32>().map_err(|_| {
                    CoreError::syntax(self.source, token.span.start, "integer literal out of range")
                })?;
                Ok(Expr::new(ExprKind::Const(Literal::Int(value)), token.span))
            }
            TokenKind::DoubleLiteral => {
                self.advance();
                let text = token.text(self.source);
                let digits = text.trim_end_matches(['d', 'D']);
                let value = digits.parse::<f64>().map_err(|_| {
                    CoreError::syntax(self.source, token.span.start, "malformed double literal")
                })?;
                Ok(Expr::new(
                    ExprKind::Const(Literal::Double(value)),
                    token.span,
                ))
            }
            TokenKind::StringLiteral => {
                self.advance();
                let decoded = decode_escapes(token.text(self.source));
                Ok(Expr::new(
                    ExprKind::Const(Literal::String(decoded)),
                    token.span,
                ))
            }
            TokenKind::BoolLiteral => {
                self.advance();
                let value = token.text(self.source) == "true";
                Ok(Expr::new(ExprKind::Const(Literal::Bool(value)), token.span))
            }
            TokenKind::Ident | TokenKind::QuotedIdent => {
                self.advance();
                let name = token.text(self.source).to_string();
                Ok(Expr::new(ExprKind::SymRef(name), token.span))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.expression()?;
                self.expect(TokenKind::RParen, "expected ')'")?;
                Ok(expr)
            }
            TokenKind::LBrace => {
                self.advance();
                let expr = self.expression()?;
                self.expect(TokenKind::RBrace, "expected '}'")?;
                Ok(expr)
            }
            TokenKind::Eof => Err(CoreError::syntax(
                self.source,
                token.span.start,
                "unexpected end of input",
            )),
            _ => Err(CoreError::syntax(
                self.source,
                token.span.start,
                "unexpected token",
            )),
        }
    }

    pub(crate) fn ident_name(&mut self) -> Result<String, CoreError> {
        let token = *self.peek();
        match token.kind {
            TokenKind::Ident | TokenKind::QuotedIdent => {
                self.advance();
                Ok(token.text(self.source).to_string())
            }
            _ => Err(CoreError::syntax(
                self.source,
                token.span.start,
                "expected identifier",
            )),
        }
    }

    pub(crate) fn expect(
        &mut self,
        kind: TokenKind,
        message: &str,
    ) -> Result<Token, CoreError> {
        let token = *self.peek();
        if token.kind == kind {
            self.advance();
            Ok(token)
        } else {
            Err(CoreError::syntax(self.source, token.span.start, message))
        }
    }

    pub(crate) fn expect_eof(&mut self) -> Result<(), CoreError> {
        let token = self.peek();
        if token.kind == TokenKind::Eof {
            Ok(())
        } else {
            Err(CoreError::syntax(
                self.source,
                token.span.start,
                "unexpected trailing input",
            ))
        }
    }

    pub(crate) fn peek(&self) -> &Token {
        // The token stream always ends with Eof.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn source(&self) -> &'src str {
        self.source
    }

    fn peek_ahead(&self, offset: usize) -> &Token {
        &self.tokens[(self.pos + offset).min(self.tokens.len() - 1)]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = *self.peek();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn prev_span(&self) -> Span {
        self.tokens[self.pos.saturating_sub(1)].span
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.merge(rhs.span);
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}

fn comparison(op: CompareOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.merge(rhs.span);
    Expr::new(
        ExprKind::Comparison {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}

/// Decode backslash escapes in a string literal body.
///
/// Recognizes exactly `\\ \' \" \b \f \n \r \t`; any other backslash
/// sequence is left unmodified, backslash included.
pub fn decode_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
