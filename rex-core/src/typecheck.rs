//! Type checking for REX expressions.
//!
//! The checker walks the untyped AST bottom-up exactly once and produces
//! a typed tree (`TypedExpr`), resolving every identifier to a runtime
//! slot or local stack position and every method to a builtin. The first
//! mismatch aborts the compile with a message naming the offending
//! construct and the expected vs. actual types. The symbol table is never
//! mutated.

use crate::ast::{self, BinaryOp, CompareOp, Literal, UnaryOp};
use crate::error::CoreError;
use crate::span::Span;
use crate::symbol::SymbolTable;
use crate::types::Type;
use crate::value::Value;

/// An expression node with its resolved type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedExpr {
    pub kind: TypedExprKind,
    pub ty: Type,
    pub span: Span,
}

/// Typed expression kind; identifiers and fields are already resolved
/// to indices, so evaluation never looks names up.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedExprKind {
    Const(Value),
    /// Read of a symbol table slot in the runtime environment.
    Slot(usize),
    /// Read of a `let` binding or lambda parameter on the locals stack.
    /// The index is the absolute stack depth, fixed at compile time.
    Local(usize),
    Unary {
        op: UnaryOp,
        operand: Box<TypedExpr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<TypedExpr>,
        rhs: Box<TypedExpr>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<TypedExpr>,
        rhs: Box<TypedExpr>,
    },
    If {
        cond: Box<TypedExpr>,
        then_branch: Box<TypedExpr>,
        else_branch: Box<TypedExpr>,
    },
    /// Binding values in order; the body sees them as consecutive locals.
    Let {
        bindings: Vec<TypedExpr>,
        body: Box<TypedExpr>,
    },
    /// Struct field access, resolved to the field's ordinal.
    Field {
        target: Box<TypedExpr>,
        index: usize,
    },
    Index {
        target: Box<TypedExpr>,
        index: Box<TypedExpr>,
    },
    /// Builtin method call. For `map`/`filter`/`exists` the single
    /// argument is the lambda body, checked with the parameter pushed as
    /// a local.
    Method {
        target: Box<TypedExpr>,
        method: Method,
        args: Vec<TypedExpr>,
    },
}

/// The closed set of builtin methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    StrLength,
    StrUpper,
    StrLower,
    StrContains,
    StrStartsWith,
    ArraySize,
    ArrayMap,
    ArrayFilter,
    ArrayExists,
    ToDouble,
    ToInt,
    ToString,
}

/// Type-check a parsed expression against a symbol table.
pub fn typecheck(expr: &ast::Expr, symbols: &SymbolTable) -> Result<TypedExpr, CoreError> {
    let mut checker = TypeChecker {
        symbols,
        locals: Vec::new(),
    };
    checker.check_expr(expr)
}

struct TypeChecker<'a> {
    symbols: &'a SymbolTable,
    /// Lexical scope for `let` bindings and lambda parameters. The stack
    /// depth here matches the runtime locals stack exactly, so resolved
    /// indices stay valid during evaluation.
    locals: Vec<(String, Type)>,
}

impl<'a> TypeChecker<'a> {
    fn check_expr(&mut self, expr: &ast::Expr) -> Result<TypedExpr, CoreError> {
        use ast::ExprKind;

        match &expr.kind {
            ExprKind::Const(lit) => Ok(self.check_literal(expr.span, lit)),
            ExprKind::SymRef(name) => self.check_symref(expr.span, name),
            ExprKind::Unary { op, operand } => self.check_unary(expr.span, *op, operand),
            ExprKind::Binary { op, lhs, rhs } => self.check_binary(expr.span, *op, lhs, rhs),
            ExprKind::Comparison { op, lhs, rhs } => {
                self.check_comparison(expr.span, *op, lhs, rhs)
            }
            ExprKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.check_if(expr.span, cond, then_branch, else_branch),
            ExprKind::Let { bindings, body } => self.check_let(expr.span, bindings, body),
            ExprKind::Lambda { .. } => Err(CoreError::Type(
                "lambda expression is only allowed as a method argument".to_string(),
            )),
            ExprKind::Select { target, field } => self.check_select(expr.span, target, field),
            ExprKind::MethodCall {
                target,
                method,
                args,
            } => self.check_method(expr.span, target, method, args),
            ExprKind::Index { target, index } => self.check_index(expr.span, target, index),
        }
    }

    fn check_literal(&self, span: Span, lit: &Literal) -> TypedExpr {
        let (value, ty) = match lit {
            Literal::Int(v) => (Value::Int(*v), Type::Int),
            Literal::Double(v) => (Value::Double(*v), Type::Double),
            Literal::String(v) => (Value::String(v.clone()), Type::String),
            Literal::Bool(v) => (Value::Boolean(*v), Type::Boolean),
        };
        TypedExpr {
            kind: TypedExprKind::Const(value),
            ty,
            span,
        }
    }

    fn check_symref(&self, span: Span, name: &str) -> Result<TypedExpr, CoreError> {
        // Local bindings shadow symbol table entries.
        if let Some(index) = self.locals.iter().rposition(|(n, _)| n == name) {
            let ty = self.locals[index].1.clone();
            return Ok(TypedExpr {
                kind: TypedExprKind::Local(index),
                ty,
                span,
            });
        }
        match self.symbols.lookup(name) {
            Some(entry) => Ok(TypedExpr {
                kind: TypedExprKind::Slot(entry.slot),
                ty: entry.ty.clone(),
                span,
            }),
            None => Err(CoreError::Type(format!("unknown identifier '{name}'"))),
        }
    }

    fn check_unary(
        &mut self,
        span: Span,
        op: UnaryOp,
        operand: &ast::Expr,
    ) -> Result<TypedExpr, CoreError> {
        let operand = self.check_expr(operand)?;
        let ty = match op {
            UnaryOp::Neg if operand.ty.is_numeric() => operand.ty.clone(),
            UnaryOp::Not if operand.ty == Type::Boolean => Type::Boolean,
            UnaryOp::Neg => {
                return Err(CoreError::Type(format!(
                    "operator '-' expects a numeric operand but received {}",
                    operand.ty
                )));
            }
            UnaryOp::Not => {
                return Err(CoreError::Type(format!(
                    "operator '!' expects a Boolean operand but received {}",
                    operand.ty
                )));
            }
        };
        Ok(TypedExpr {
            kind: TypedExprKind::Unary {
                op,
                operand: Box::new(operand),
            },
            ty,
            span,
        })
    }

    fn check_binary(
        &mut self,
        span: Span,
        op: BinaryOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
    ) -> Result<TypedExpr, CoreError> {
        let lhs = self.check_expr(lhs)?;
        let rhs = self.check_expr(rhs)?;

        let ty = match op {
            BinaryOp::Add if lhs.ty == Type::String && rhs.ty == Type::String => Type::String,
            BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Rem => Type::promote(&lhs.ty, &rhs.ty).ok_or_else(|| {
                CoreError::Type(format!(
                    "operator '{op}' expects numeric operands but received {} and {}",
                    lhs.ty, rhs.ty
                ))
            })?,
            BinaryOp::And | BinaryOp::Or => {
                if lhs.ty == Type::Boolean && rhs.ty == Type::Boolean {
                    Type::Boolean
                } else {
                    return Err(CoreError::Type(format!(
                        "operator '{op}' expects Boolean operands but received {} and {}",
                        lhs.ty, rhs.ty
                    )));
                }
            }
            BinaryOp::Match => {
                if lhs.ty == Type::String && rhs.ty == Type::String {
                    Type::Boolean
                } else {
                    return Err(CoreError::Type(format!(
                        "operator '~' expects String operands but received {} and {}",
                        lhs.ty, rhs.ty
                    )));
                }
            }
        };

        Ok(TypedExpr {
            kind: TypedExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
            span,
        })
    }

    fn check_comparison(
        &mut self,
        span: Span,
        op: CompareOp,
        lhs: &ast::Expr,
        rhs: &ast::Expr,
    ) -> Result<TypedExpr, CoreError> {
        let lhs = self.check_expr(lhs)?;
        let rhs = self.check_expr(rhs)?;

        let comparable = match op {
            CompareOp::Eq | CompareOp::Ne => {
                lhs.ty == rhs.ty || Type::promote(&lhs.ty, &rhs.ty).is_some()
            }
            _ => {
                Type::promote(&lhs.ty, &rhs.ty).is_some()
                    || (lhs.ty == Type::String && rhs.ty == Type::String)
                    || (lhs.ty == Type::Char && rhs.ty == Type::Char)
            }
        };
        if !comparable {
            return Err(CoreError::Type(format!(
                "operator '{op}' cannot compare {} with {}",
                lhs.ty, rhs.ty
            )));
        }

        Ok(TypedExpr {
            kind: TypedExprKind::Compare {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty: Type::Boolean,
            span,
        })
    }

    fn check_if(
        &mut self,
        span: Span,
        cond: &ast::Expr,
        then_branch: &ast::Expr,
        else_branch: &ast::Expr,
    ) -> Result<TypedExpr, CoreError> {
        let cond = self.check_expr(cond)?;
        if cond.ty != Type::Boolean {
            return Err(CoreError::Type(format!(
                "if condition must be Boolean but is {}",
                cond.ty
            )));
        }
        let then_branch = self.check_expr(then_branch)?;
        let else_branch = self.check_expr(else_branch)?;
        if then_branch.ty != else_branch.ty {
            return Err(CoreError::Type(format!(
                "if branches disagree: then branch is {} but else branch is {}",
                then_branch.ty, else_branch.ty
            )));
        }
        let ty = then_branch.ty.clone();
        Ok(TypedExpr {
            kind: TypedExprKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            ty,
            span,
        })
    }

    fn check_let(
        &mut self,
        span: Span,
        bindings: &[(String, ast::Expr)],
        body: &ast::Expr,
    ) -> Result<TypedExpr, CoreError> {
        // All binding values are checked in the outer scope first:
        // bindings are simultaneous and must not see their siblings.
        let mut checked = Vec::with_capacity(bindings.len());
        for (_, value) in bindings {
            checked.push(self.check_expr(value)?);
        }

        for ((name, _), value) in bindings.iter().zip(&checked) {
            self.locals.push((name.clone(), value.ty.clone()));
        }
        let body = self.check_expr(body);
        self.locals.truncate(self.locals.len() - bindings.len());
        let body = body?;

        let ty = body.ty.clone();
        Ok(TypedExpr {
            kind: TypedExprKind::Let {
                bindings: checked,
                body: Box::new(body),
            },
            ty,
            span,
        })
    }

    fn check_select(
        &mut self,
        span: Span,
        target: &ast::Expr,
        field: &str,
    ) -> Result<TypedExpr, CoreError> {
        let target = self.check_expr(target)?;
        let Type::Struct(fields) = &target.ty else {
            return Err(CoreError::Type(format!(
                "type {} has no field named '{field}'",
                target.ty
            )));
        };
        let Some(index) = fields.iter().position(|(name, _)| name == field) else {
            return Err(CoreError::Type(format!(
                "type {} has no field named '{field}'",
                target.ty
            )));
        };
        let ty = fields[index].1.clone();
        Ok(TypedExpr {
            kind: TypedExprKind::Field {
                target: Box::new(target),
                index,
            },
            ty,
            span,
        })
    }

    fn check_index(
        &mut self,
        span: Span,
        target: &ast::Expr,
        index: &ast::Expr,
    ) -> Result<TypedExpr, CoreError> {
        let target = self.check_expr(target)?;
        let Type::Array(elem) = target.ty.clone() else {
            return Err(CoreError::Type(format!(
                "type {} cannot be indexed",
                target.ty
            )));
        };
        let index = self.check_expr(index)?;
        if index.ty != Type::Int {
            return Err(CoreError::Type(format!(
                "array index must be Int but is {}",
                index.ty
            )));
        }
        Ok(TypedExpr {
            kind: TypedExprKind::Index {
                target: Box::new(target),
                index: Box::new(index),
            },
            ty: *elem,
            span,
        })
    }

    fn check_method(
        &mut self,
        span: Span,
        target: &ast::Expr,
        method: &str,
        args: &[ast::Expr],
    ) -> Result<TypedExpr, CoreError> {
        let target = self.check_expr(target)?;

        let (resolved, checked_args, ty) = match (&target.ty, method) {
            (Type::String, "length") => {
                self.expect_arity(method, args, 0)?;
                (Method::StrLength, Vec::new(), Type::Int)
            }
            (Type::String, "toUpperCase") => {
                self.expect_arity(method, args, 0)?;
                (Method::StrUpper, Vec::new(), Type::String)
            }
            (Type::String, "toLowerCase") => {
                self.expect_arity(method, args, 0)?;
                (Method::StrLower, Vec::new(), Type::String)
            }
            (Type::String, "contains") => {
                let arg = self.single_string_arg(method, args)?;
                (Method::StrContains, vec![arg], Type::Boolean)
            }
            (Type::String, "startsWith") => {
                let arg = self.single_string_arg(method, args)?;
                (Method::StrStartsWith, vec![arg], Type::Boolean)
            }
            (Type::Array(_), "size") => {
                self.expect_arity(method, args, 0)?;
                (Method::ArraySize, Vec::new(), Type::Int)
            }
            (Type::Array(elem), "map") => {
                let elem = (**elem).clone();
                let body = self.lambda_body(method, args, elem)?;
                let result = Type::Array(Box::new(body.ty.clone()));
                (Method::ArrayMap, vec![body], result)
            }
            (Type::Array(elem), "filter") => {
                let elem = (**elem).clone();
                let body = self.lambda_body(method, args, elem.clone())?;
                if body.ty != Type::Boolean {
                    return Err(CoreError::Type(format!(
                        "method 'filter' expects a Boolean predicate but the lambda returns {}",
                        body.ty
                    )));
                }
                (Method::ArrayFilter, vec![body], Type::Array(Box::new(elem)))
            }
            (Type::Array(elem), "exists") => {
                let elem = (**elem).clone();
                let body = self.lambda_body(method, args, elem)?;
                if body.ty != Type::Boolean {
                    return Err(CoreError::Type(format!(
                        "method 'exists' expects a Boolean predicate but the lambda returns {}",
                        body.ty
                    )));
                }
                (Method::ArrayExists, vec![body], Type::Boolean)
            }
            (ty, "toDouble") if ty.is_numeric() => {
                self.expect_arity(method, args, 0)?;
                (Method::ToDouble, Vec::new(), Type::Double)
            }
            (ty, "toInt") if ty.is_numeric() => {
                self.expect_arity(method, args, 0)?;
                (Method::ToInt, Vec::new(), Type::Int)
            }
            (
                Type::Boolean
                | Type::Char
                | Type::Int
                | Type::Long
                | Type::Float
                | Type::Double
                | Type::String,
                "toString",
            ) => {
                self.expect_arity(method, args, 0)?;
                (Method::ToString, Vec::new(), Type::String)
            }
            (ty, _) => {
                return Err(CoreError::Type(format!(
                    "type {ty} has no method named '{method}'"
                )));
            }
        };

        Ok(TypedExpr {
            kind: TypedExprKind::Method {
                target: Box::new(target),
                method: resolved,
                args: checked_args,
            },
            ty,
            span,
        })
    }

    fn expect_arity(
        &self,
        method: &str,
        args: &[ast::Expr],
        expected: usize,
    ) -> Result<(), CoreError> {
        if args.len() == expected {
            Ok(())
        } else {
            Err(CoreError::Type(format!(
                "method '{method}' expects {expected} arguments but received {}",
                args.len()
            )))
        }
    }

    fn single_string_arg(
        &mut self,
        method: &str,
        args: &[ast::Expr],
    ) -> Result<TypedExpr, CoreError> {
        self.expect_arity(method, args, 1)?;
        let arg = self.check_expr(&args[0])?;
        if arg.ty != Type::String {
            return Err(CoreError::Type(format!(
                "method '{method}' expects a String argument but received {}",
                arg.ty
            )));
        }
        Ok(arg)
    }

    /// Check the lambda argument of `map`/`filter`/`exists`, binding its
    /// parameter to the array element type. Returns the checked body.
    fn lambda_body(
        &mut self,
        method: &str,
        args: &[ast::Expr],
        elem: Type,
    ) -> Result<TypedExpr, CoreError> {
        self.expect_arity(method, args, 1)?;
        let ast::ExprKind::Lambda { param, body } = &args[0].kind else {
            return Err(CoreError::Type(format!(
                "method '{method}' expects a lambda argument"
            )));
        };
        self.locals.push((param.clone(), elem));
        let body = self.check_expr(body);
        self.locals.pop();
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_expression;

    fn table() -> SymbolTable {
        let mut symbols = SymbolTable::new();
        symbols.define("chrom".into(), Type::String);
        symbols.define("pos".into(), Type::Int);
        symbols.define("depths".into(), Type::Array(Box::new(Type::Int)));
        symbols.define(
            "info".into(),
            Type::Struct(vec![
                ("qual".into(), Type::Double),
                ("name".into(), Type::String),
            ]),
        );
        symbols
    }

    fn check(source: &str) -> Result<TypedExpr, CoreError> {
        typecheck(&parse_expression(source).expect("parse"), &table())
    }

    #[test]
    fn annotates_arithmetic_with_promotion() {
        assert_eq!(check("pos + 1").expect("check").ty, Type::Int);
        assert_eq!(check("pos + 1.5").expect("check").ty, Type::Double);
        assert_eq!(check("pos * pos").expect("check").ty, Type::Int);
    }

    #[test]
    fn rejects_mixed_arithmetic() {
        let err = check("1 + \"a\"").unwrap_err();
        assert!(matches!(err, CoreError::Type(_)));
        assert!(err.to_string().contains("'+'"));
    }

    #[test]
    fn allows_string_concatenation() {
        assert_eq!(check("chrom + \"x\"").expect("check").ty, Type::String);
    }

    #[test]
    fn rejects_unknown_identifier() {
        let err = check("nope + 1").unwrap_err();
        assert_eq!(err.to_string(), "type error: unknown identifier 'nope'");
    }

    #[test]
    fn comparison_chain_is_rejected_by_types() {
        // Parses as (1 < 2) < 3; Boolean is not ordered against Int.
        let err = check("1 < 2 < 3").unwrap_err();
        assert!(err.to_string().contains("cannot compare"));
    }

    #[test]
    fn if_branches_must_agree() {
        let err = check("if (true) 1 else \"a\"").unwrap_err();
        assert!(err.to_string().contains("branches disagree"));
        assert_eq!(check("if (pos > 1) 1 else 2").expect("check").ty, Type::Int);
    }

    #[test]
    fn let_bindings_are_invisible_to_siblings() {
        let err = check("let x = 1 and y = x in y").unwrap_err();
        assert_eq!(err.to_string(), "type error: unknown identifier 'x'");
        assert_eq!(check("let x = 2 and y = 3 in x + y").expect("check").ty, Type::Int);
    }

    #[test]
    fn let_bindings_shadow_symbols() {
        let typed = check("let pos = \"p\" in pos").expect("check");
        assert_eq!(typed.ty, Type::String);
    }

    #[test]
    fn resolves_struct_field_ordinal() {
        let typed = check("info.name").expect("check");
        assert_eq!(typed.ty, Type::String);
        match typed.kind {
            TypedExprKind::Field { index, .. } => assert_eq!(index, 1),
            other => panic!("unexpected shape: {other:?}"),
        }
    }

    #[test]
    fn rejects_missing_field() {
        let err = check("info.missing").unwrap_err();
        assert!(err.to_string().contains("has no field named 'missing'"));
    }

    #[test]
    fn indexes_arrays_with_int() {
        assert_eq!(check("depths[0]").expect("check").ty, Type::Int);
        assert!(check("depths[\"a\"]").is_err());
        assert!(check("pos[0]").is_err());
    }

    #[test]
    fn resolves_builtin_methods() {
        assert_eq!(check("chrom.length()").expect("check").ty, Type::Int);
        assert_eq!(check("depths.size()").expect("check").ty, Type::Int);
        assert_eq!(check("pos.toDouble()").expect("check").ty, Type::Double);
        assert_eq!(
            check("chrom.contains(\"X\")").expect("check").ty,
            Type::Boolean
        );
    }

    #[test]
    fn map_result_follows_lambda_body_type() {
        let typed = check("depths.map(d => d.toString())").expect("check");
        assert_eq!(typed.ty, Type::Array(Box::new(Type::String)));
    }

    #[test]
    fn filter_requires_boolean_lambda() {
        assert_eq!(
            check("depths.filter(d => d > 10)").expect("check").ty,
            Type::Array(Box::new(Type::Int))
        );
        let err = check("depths.filter(d => d + 1)").unwrap_err();
        assert!(err.to_string().contains("Boolean predicate"));
    }

    #[test]
    fn rejects_unknown_method() {
        let err = check("pos.frobnicate()").unwrap_err();
        assert!(err
            .to_string()
            .contains("has no method named 'frobnicate'"));
    }

    #[test]
    fn rejects_bare_lambda() {
        let err = check("x => x + 1").unwrap_err();
        assert!(err.to_string().contains("only allowed as a method argument"));
    }

    #[test]
    fn rejects_wrong_arity() {
        let err = check("chrom.length(1)").unwrap_err();
        assert_eq!(
            err.to_string(),
            "type error: method 'length' expects 0 arguments but received 1"
        );
    }
}
