//! The type declaration sub-grammar.
//!
//! Type syntax: a keyword literal for each primitive/domain type,
//! `Array[T]`, and `Struct(name: Type, ...)`. Field lists reuse the same
//! `name: Type` shape and accept empty input as zero fields.

use crate::error::CoreError;
use crate::lexer::{TokenKind, lex};
use crate::parser::Parser;
use crate::types::Type;

/// Parse a single type declaration, e.g. `Array[Struct(a: Int)]`.
pub fn parse_type(source: &str) -> Result<Type, CoreError> {
    let tokens = lex(source)?;
    let mut parser = Parser::new(source, &tokens);
    let ty = type_decl(&mut parser)?;
    parser.expect_eof()?;
    Ok(ty)
}

/// Parse a comma-separated `name: Type` list.
///
/// Blank input is valid and denotes zero fields, so schema declarations
/// can start empty. Field order is preserved for display and slot layout.
pub fn parse_field_list(source: &str) -> Result<Vec<(String, Type)>, CoreError> {
    let tokens = lex(source)?;
    let mut parser = Parser::new(source, &tokens);
    let fields = field_list(&mut parser)?;
    parser.expect_eof()?;
    Ok(fields)
}

fn type_decl(parser: &mut Parser) -> Result<Type, CoreError> {
    let token = *parser.peek();
    if token.kind != TokenKind::Ident {
        return Err(CoreError::syntax(
            parser.source(),
            token.span.start,
            "expected a type name",
        ));
    }
    let name = token.text(parser.source()).to_string();
    parser.advance();

    match name.as_str() {
        "Array" => {
            parser.expect(TokenKind::LBracket, "expected '[' after Array")?;
            let elem = type_decl(parser)?;
            parser.expect(TokenKind::RBracket, "expected ']' after element type")?;
            Ok(Type::Array(Box::new(elem)))
        }
        "Struct" => {
            parser.expect(TokenKind::LParen, "expected '(' after Struct")?;
            let fields = if parser.peek().kind == TokenKind::RParen {
                Vec::new()
            } else {
                field_list(parser)?
            };
            parser.expect(TokenKind::RParen, "expected ')' after struct fields")?;
            Ok(Type::Struct(fields))
        }
        _ => Type::from_keyword(&name).ok_or_else(|| {
            CoreError::syntax(
                parser.source(),
                token.span.start,
                format!("unknown type name '{name}'"),
            )
        }),
    }
}

fn field_list(parser: &mut Parser) -> Result<Vec<(String, Type)>, CoreError> {
    let mut fields = Vec::new();
    if parser.peek().kind == TokenKind::Eof {
        return Ok(fields);
    }
    loop {
        let name = parser.ident_name()?;
        parser.expect(TokenKind::Colon, "expected ':' after field name")?;
        let ty = type_decl(parser)?;
        fields.push((name, ty));
        if parser.peek().kind == TokenKind::Comma {
            parser.advance();
        } else {
            break;
        }
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_primitive_and_domain_types() {
        assert_eq!(parse_type("Int").expect("parse"), Type::Int);
        assert_eq!(parse_type("Boolean").expect("parse"), Type::Boolean);
        assert_eq!(parse_type("Record").expect("parse"), Type::Record);
    }

    #[test]
    fn parses_nested_array_and_struct() {
        let ty = parse_type("Array[Struct(a: Int, b: String)]").expect("parse");
        assert_eq!(ty.to_string(), "Array[Struct(a: Int, b: String)]");
    }

    #[test]
    fn parses_empty_struct() {
        assert_eq!(parse_type("Struct()").expect("parse"), Type::Struct(vec![]));
    }

    #[test]
    fn empty_field_list_is_zero_fields() {
        assert_eq!(parse_field_list("").expect("parse"), vec![]);
        assert_eq!(parse_field_list("   ").expect("parse"), vec![]);
    }

    #[test]
    fn field_list_preserves_order() {
        let fields = parse_field_list("a: Int, b: String").expect("parse");
        assert_eq!(
            fields,
            vec![
                ("a".to_string(), Type::Int),
                ("b".to_string(), Type::String),
            ]
        );
    }

    #[test]
    fn field_names_may_be_backtick_quoted() {
        let fields = parse_field_list("`allele depth`: Int").expect("parse");
        assert_eq!(fields[0].0, "allele depth");
    }

    #[test]
    fn rejects_unknown_type_name() {
        let err = parse_type("Quux").unwrap_err();
        match err {
            CoreError::Syntax { message, .. } => {
                assert_eq!(message, "unknown type name 'Quux'")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_colon() {
        assert!(parse_field_list("a Int").is_err());
    }
}
