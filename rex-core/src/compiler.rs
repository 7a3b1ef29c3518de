//! Top-level compile entry points.
//!
//! These sequence the pipeline (lex, parse, typecheck, compile) for the
//! four caller-facing shapes: a single expression, a type declaration, an
//! export column list, and an annotation assignment list. Every call is
//! synchronous and fails fast on the first error.

use crate::error::CoreError;
use crate::eval::{CompiledExpr, compile};
use crate::lexer::{TokenKind, lex};
use crate::parser::{Parser, parse_expression};
use crate::symbol::SymbolTable;
use crate::typecheck::typecheck;
use crate::typeparse::parse_field_list;
use crate::types::Type;

/// A compiled export column list.
///
/// `header` is present only for the named form, with the column names
/// joined by a tab; producers are kept in input order either way.
#[derive(Debug)]
pub struct ExportPlan {
    pub header: Option<String>,
    pub columns: Vec<CompiledExpr>,
}

/// One compiled `dotted.path = expression` annotation assignment.
#[derive(Debug)]
pub struct Annotation {
    pub path: Vec<String>,
    pub ty: Type,
    pub expr: CompiledExpr,
}

/// Compile one expression to a typed closure.
///
/// When `expected` is given, the root node's resolved type must equal it.
pub fn compile_expression(
    symbols: &SymbolTable,
    source: &str,
    expected: Option<&Type>,
) -> Result<CompiledExpr, CoreError> {
    let ast = parse_expression(source)?;
    let typed = typecheck(&ast, symbols)?;
    if let Some(expected) = expected {
        if typed.ty != *expected {
            return Err(CoreError::Type(format!(
                "expected result type {expected} but expression has type {}",
                typed.ty
            )));
        }
    }
    Ok(compile(typed))
}

/// Parse a comma-separated `name: Type` list into an ordered field list.
///
/// Empty input yields an empty list, not an error, so schema declarations
/// can start blank.
pub fn parse_annotation_types(source: &str) -> Result<Vec<(String, Type)>, CoreError> {
    parse_field_list(source)
}

/// Compile an export column list, disambiguating positional vs. named.
///
/// Ordered choice, positional first: if every top-level comma-separated
/// segment parses as a bare expression the list is positional and carries
/// no header. Otherwise each segment must be `name=expression`; names may
/// be backtick-quoted or any run of characters excluding whitespace,
/// control characters, `=`, and `,`.
pub fn compile_export_args(
    symbols: &SymbolTable,
    source: &str,
) -> Result<ExportPlan, CoreError> {
    let segments = split_top_level(source);

    // Whole-list positional attempt first; any failure falls through to
    // the named form rather than mixing the two.
    let positional: Result<Vec<_>, CoreError> = segments
        .iter()
        .map(|segment| parse_expression(segment))
        .collect();

    if let Ok(parsed) = positional {
        let mut columns = Vec::with_capacity(parsed.len());
        for ast in &parsed {
            columns.push(compile(typecheck(ast, symbols)?));
        }
        return Ok(ExportPlan {
            header: None,
            columns,
        });
    }

    let mut names = Vec::with_capacity(segments.len());
    let mut columns = Vec::with_capacity(segments.len());
    for segment in &segments {
        let (name, expr_text) = split_named_segment(segment)?;
        names.push(name);
        let ast = parse_expression(expr_text)?;
        columns.push(compile(typecheck(&ast, symbols)?));
    }

    Ok(ExportPlan {
        header: Some(names.join("\t")),
        columns,
    })
}

/// Compile a comma-separated list of `dotted.path = expression`
/// annotation assignments.
pub fn compile_annotations(
    symbols: &SymbolTable,
    source: &str,
) -> Result<Vec<Annotation>, CoreError> {
    let segments = split_top_level(source);
    let mut annotations = Vec::with_capacity(segments.len());

    for segment in &segments {
        let tokens = lex(segment)?;
        let mut parser = Parser::new(segment, &tokens);

        let mut path = vec![parser.ident_name()?];
        while parser.peek().kind == TokenKind::Dot {
            parser.advance();
            path.push(parser.ident_name()?);
        }
        parser.expect(TokenKind::Equal, "expected '=' after annotation path")?;

        let ast = parser.expression()?;
        parser.expect_eof()?;
        let typed = typecheck(&ast, symbols)?;
        let ty = typed.ty.clone();
        annotations.push(Annotation {
            path,
            ty,
            expr: compile(typed),
        });
    }

    Ok(annotations)
}

/// Split on commas at nesting depth zero, respecting string literals,
/// backtick identifiers, and `()[]{}` nesting.
fn split_top_level(source: &str) -> Vec<&str> {
    let bytes = source.as_bytes();
    let mut segments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut i = 0usize;

    while i < bytes.len() {
        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'`' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'`' {
                    i += 1;
                }
            }
            b',' if depth == 0 => {
                segments.push(&source[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    segments.push(&source[start..]);
    segments
}

/// Split one `name=expression` export segment.
///
/// Accepts a backtick-quoted name or any run of characters excluding
/// whitespace, control characters, `=`, and `,` (TSV-safe).
fn split_named_segment(segment: &str) -> Result<(String, &str), CoreError> {
    let trimmed = segment.trim_start();
    let offset = segment.len() - trimmed.len();

    let (name, rest) = if let Some(body) = trimmed.strip_prefix('`') {
        let Some(end) = body.find('`') else {
            return Err(CoreError::syntax(
                segment,
                offset as u32,
                "unterminated quoted identifier",
            ));
        };
        (body[..end].to_string(), &body[end + 1..])
    } else {
        let end = trimmed
            .find(|c: char| c.is_whitespace() || c.is_control() || c == '=' || c == ',')
            .unwrap_or(trimmed.len());
        (trimmed[..end].to_string(), &trimmed[end..])
    };

    if name.is_empty() {
        return Err(CoreError::syntax(
            segment,
            offset as u32,
            "expected an export column name",
        ));
    }

    let rest_trimmed = rest.trim_start();
    let Some(expr_text) = rest_trimmed.strip_prefix('=') else {
        let at = segment.len() - rest_trimmed.len();
        return Err(CoreError::syntax(
            segment,
            at as u32,
            "expected '=' after export column name",
        ));
    };

    Ok((name, expr_text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn table() -> SymbolTable {
        let mut symbols = SymbolTable::new();
        symbols.define("chrom".into(), Type::String);
        symbols.define("pos".into(), Type::Int);
        symbols
    }

    fn env() -> Vec<Value> {
        vec![Value::String("chr2".into()), Value::Int(42)]
    }

    #[test]
    fn compiles_expression_with_expected_type() {
        let compiled =
            compile_expression(&table(), "pos > 10", Some(&Type::Boolean)).expect("compile");
        assert_eq!(compiled.eval(&env()), Value::Boolean(true));
    }

    #[test]
    fn rejects_expected_type_mismatch() {
        let err = compile_expression(&table(), "pos + 1", Some(&Type::Boolean)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "type error: expected result type Boolean but expression has type Int"
        );
    }

    #[test]
    fn empty_annotation_types_is_empty_mapping() {
        assert!(parse_annotation_types("").expect("parse").is_empty());
    }

    #[test]
    fn annotation_types_preserve_order() {
        let fields = parse_annotation_types("a: Int, b: String").expect("parse");
        assert_eq!(fields[0], ("a".to_string(), Type::Int));
        assert_eq!(fields[1], ("b".to_string(), Type::String));
    }

    #[test]
    fn named_export_produces_tab_joined_header() {
        let plan = compile_export_args(&table(), "a=1,b=2").expect("compile");
        assert_eq!(plan.header.as_deref(), Some("a\tb"));
        assert_eq!(plan.columns.len(), 2);
        assert_eq!(plan.columns[0].eval(&env()), Value::Int(1));
        assert_eq!(plan.columns[1].eval(&env()), Value::Int(2));
    }

    #[test]
    fn positional_export_has_no_header() {
        let plan = compile_export_args(&table(), "1,2").expect("compile");
        assert!(plan.header.is_none());
        assert_eq!(plan.columns[0].eval(&env()), Value::Int(1));
        assert_eq!(plan.columns[1].eval(&env()), Value::Int(2));
    }

    #[test]
    fn export_names_accept_tsv_safe_characters() {
        let plan = compile_export_args(&table(), "sample-1%=pos, `my col`=chrom").expect("compile");
        assert_eq!(plan.header.as_deref(), Some("sample-1%\tmy col"));
        assert_eq!(plan.columns[0].eval(&env()), Value::Int(42));
    }

    #[test]
    fn export_split_respects_nesting_and_strings() {
        let plan =
            compile_export_args(&table(), "label=\"a,b\", max=if (pos > 0) pos else 0")
                .expect("compile");
        assert_eq!(plan.header.as_deref(), Some("label\tmax"));
        assert_eq!(plan.columns[0].eval(&env()), Value::String("a,b".into()));
        assert_eq!(plan.columns[1].eval(&env()), Value::Int(42));
    }

    #[test]
    fn mixed_export_forms_are_rejected() {
        // Positional parse fails on the named segment, and the named
        // parse then fails on the bare one.
        let err = compile_export_args(&table(), "1, b=2").unwrap_err();
        assert!(matches!(err, CoreError::Syntax { .. }));
    }

    #[test]
    fn export_expressions_are_type_checked() {
        let err = compile_export_args(&table(), "a=1 + \"x\"").unwrap_err();
        assert!(matches!(err, CoreError::Type(_)));
    }

    #[test]
    fn compiles_annotation_assignments() {
        let annotations =
            compile_annotations(&table(), "info.depth = pos * 2, label = chrom").expect("compile");
        assert_eq!(annotations.len(), 2);
        assert_eq!(annotations[0].path, vec!["info", "depth"]);
        assert_eq!(annotations[0].ty, Type::Int);
        assert_eq!(annotations[0].expr.eval(&env()), Value::Int(84));
        assert_eq!(annotations[1].path, vec!["label"]);
        assert_eq!(annotations[1].ty, Type::String);
    }

    #[test]
    fn annotation_paths_accept_backtick_segments() {
        let annotations =
            compile_annotations(&table(), "`read depth`.mean = pos").expect("compile");
        assert_eq!(annotations[0].path, vec!["read depth", "mean"]);
    }

    #[test]
    fn annotation_without_equals_is_rejected() {
        let err = compile_annotations(&table(), "info.depth").unwrap_err();
        match err {
            CoreError::Syntax { message, .. } => {
                assert_eq!(message, "expected '=' after annotation path")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
