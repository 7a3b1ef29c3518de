//! Compilation of typed expressions into reusable closures.
//!
//! Each typed node is turned into a boxed closure exactly once; closure
//! composition mirrors the tree, so invocation never re-walks the AST.
//! A compiled expression holds no mutable state: every invocation reads
//! the caller's environment slice and uses a fresh locals stack, so the
//! same artifact can be shared read-only across workers as long as each
//! worker passes its own environment.

use crate::ast::{BinaryOp, CompareOp, UnaryOp};
use crate::typecheck::{Method, TypedExpr, TypedExprKind};
use crate::types::Type;
use crate::value::Value;

/// Per-invocation evaluation state: the caller's environment plus the
/// locals stack for `let` bindings and lambda parameters.
pub struct EvalCtx<'a> {
    env: &'a [Value],
    locals: Vec<Value>,
}

type Thunk = Box<dyn Fn(&mut EvalCtx) -> Value + Send + Sync>;

/// A type-checked expression compiled to a repeatedly-invokable closure.
pub struct CompiledExpr {
    ty: Type,
    thunk: Thunk,
}

impl std::fmt::Debug for CompiledExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledExpr")
            .field("ty", &self.ty)
            .finish_non_exhaustive()
    }
}

impl CompiledExpr {
    /// The resolved type of the root node.
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Evaluate against the current contents of `env`. Slot `i` of the
    /// environment must hold the value of the symbol whose table entry
    /// has index `i`.
    pub fn eval(&self, env: &[Value]) -> Value {
        let mut ctx = EvalCtx {
            env,
            locals: Vec::new(),
        };
        (self.thunk)(&mut ctx)
    }
}

/// Compile a typed tree. Called exactly once per expression per table.
pub fn compile(expr: TypedExpr) -> CompiledExpr {
    let ty = expr.ty.clone();
    CompiledExpr {
        ty,
        thunk: compile_node(expr),
    }
}

fn compile_node(expr: TypedExpr) -> Thunk {
    match expr.kind {
        TypedExprKind::Const(value) => Box::new(move |_| value.clone()),
        TypedExprKind::Slot(index) => Box::new(move |ctx| ctx.env[index].clone()),
        TypedExprKind::Local(index) => Box::new(move |ctx| ctx.locals[index].clone()),

        TypedExprKind::Unary { op, operand } => {
            let operand = compile_node(*operand);
            match op {
                UnaryOp::Neg => Box::new(move |ctx| negate(operand(ctx))),
                UnaryOp::Not => Box::new(move |ctx| Value::Boolean(!truth(operand(ctx)))),
            }
        }

        TypedExprKind::Binary { op, lhs, rhs } => {
            let lhs = compile_node(*lhs);
            let rhs = compile_node(*rhs);
            match op {
                // Lazy: the untaken operand's closure is never invoked.
                BinaryOp::And => Box::new(move |ctx| {
                    if truth(lhs(ctx)) {
                        rhs(ctx)
                    } else {
                        Value::Boolean(false)
                    }
                }),
                BinaryOp::Or => Box::new(move |ctx| {
                    if truth(lhs(ctx)) {
                        Value::Boolean(true)
                    } else {
                        rhs(ctx)
                    }
                }),
                BinaryOp::Match => Box::new(move |ctx| {
                    let value = string(lhs(ctx));
                    let pattern = string(rhs(ctx));
                    Value::Boolean(wildcard_match(&value, &pattern))
                }),
                _ => Box::new(move |ctx| arith(op, lhs(ctx), rhs(ctx))),
            }
        }

        TypedExprKind::Compare { op, lhs, rhs } => {
            let lhs = compile_node(*lhs);
            let rhs = compile_node(*rhs);
            Box::new(move |ctx| Value::Boolean(compare(op, lhs(ctx), rhs(ctx))))
        }

        TypedExprKind::If {
            cond,
            then_branch,
            else_branch,
        } => {
            let cond = compile_node(*cond);
            let then_branch = compile_node(*then_branch);
            let else_branch = compile_node(*else_branch);
            Box::new(move |ctx| {
                if truth(cond(ctx)) {
                    then_branch(ctx)
                } else {
                    else_branch(ctx)
                }
            })
        }

        TypedExprKind::Let { bindings, body } => {
            let bindings: Vec<Thunk> = bindings.into_iter().map(compile_node).collect();
            let body = compile_node(*body);
            Box::new(move |ctx| {
                let base = ctx.locals.len();
                for binding in &bindings {
                    let value = binding(ctx);
                    ctx.locals.push(value);
                }
                let result = body(ctx);
                ctx.locals.truncate(base);
                result
            })
        }

        TypedExprKind::Field { target, index } => {
            let target = compile_node(*target);
            Box::new(move |ctx| match target(ctx) {
                Value::Struct(mut fields) => fields.swap_remove(index).1,
                other => bad_value(&other),
            })
        }

        TypedExprKind::Index { target, index } => {
            let target = compile_node(*target);
            let index = compile_node(*index);
            Box::new(move |ctx| {
                let items = array(target(ctx));
                let i = int(index(ctx));
                // The checker cannot see values; a bad index at runtime
                // aborts the evaluation, like division by zero.
                if i < 0 || i as usize >= items.len() {
                    panic!("array index {i} out of bounds for size {}", items.len());
                }
                items[i as usize].clone()
            })
        }

        TypedExprKind::Method {
            target,
            method,
            args,
        } => compile_method(*target, method, args),
    }
}

fn compile_method(target: TypedExpr, method: Method, args: Vec<TypedExpr>) -> Thunk {
    let target = compile_node(target);
    let mut args: Vec<Thunk> = args.into_iter().map(compile_node).collect();

    match method {
        Method::StrLength => Box::new(move |ctx| {
            Value::Int(string(target(ctx)).chars().count() as i32)
        }),
        Method::StrUpper => {
            Box::new(move |ctx| Value::String(string(target(ctx)).to_uppercase()))
        }
        Method::StrLower => {
            Box::new(move |ctx| Value::String(string(target(ctx)).to_lowercase()))
        }
        Method::StrContains => {
            let needle = args.remove(0);
            Box::new(move |ctx| {
                Value::Boolean(string(target(ctx)).contains(&string(needle(ctx))))
            })
        }
        Method::StrStartsWith => {
            let prefix = args.remove(0);
            Box::new(move |ctx| {
                Value::Boolean(string(target(ctx)).starts_with(&string(prefix(ctx))))
            })
        }
        Method::ArraySize => {
            Box::new(move |ctx| Value::Int(array(target(ctx)).len() as i32))
        }
        Method::ArrayMap => {
            let body = args.remove(0);
            Box::new(move |ctx| {
                let items = array(target(ctx));
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    ctx.locals.push(item);
                    out.push(body(ctx));
                    ctx.locals.pop();
                }
                Value::Array(out)
            })
        }
        Method::ArrayFilter => {
            let body = args.remove(0);
            Box::new(move |ctx| {
                let items = array(target(ctx));
                let mut out = Vec::new();
                for item in items {
                    ctx.locals.push(item.clone());
                    let keep = truth(body(ctx));
                    ctx.locals.pop();
                    if keep {
                        out.push(item);
                    }
                }
                Value::Array(out)
            })
        }
        Method::ArrayExists => {
            let body = args.remove(0);
            Box::new(move |ctx| {
                let items = array(target(ctx));
                for item in items {
                    ctx.locals.push(item);
                    let hit = truth(body(ctx));
                    ctx.locals.pop();
                    if hit {
                        return Value::Boolean(true);
                    }
                }
                Value::Boolean(false)
            })
        }
        Method::ToDouble => Box::new(move |ctx| Value::Double(to_f64(target(ctx)))),
        Method::ToInt => Box::new(move |ctx| {
            Value::Int(match target(ctx) {
                Value::Int(v) => v,
                Value::Long(v) => v as i32,
                Value::Float(v) => v as i32,
                Value::Double(v) => v as i32,
                other => bad_value(&other),
            })
        }),
        Method::ToString => Box::new(move |ctx| Value::String(target(ctx).to_string())),
    }
}

// ---------------------------------------------------------------------
// Value operations
//
// The type checker has already constrained operand shapes, so the
// fallback arms below are unreachable in a compiled expression.
// ---------------------------------------------------------------------

fn bad_value(value: &Value) -> ! {
    unreachable!("value shape rejected by the type checker: {value:?}")
}

fn truth(value: Value) -> bool {
    match value {
        Value::Boolean(v) => v,
        other => bad_value(&other),
    }
}

fn string(value: Value) -> String {
    match value {
        Value::String(v) => v,
        other => bad_value(&other),
    }
}

fn array(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        other => bad_value(&other),
    }
}

fn int(value: Value) -> i32 {
    match value {
        Value::Int(v) => v,
        other => bad_value(&other),
    }
}

fn to_f64(value: Value) -> f64 {
    match value {
        Value::Int(v) => v as f64,
        Value::Long(v) => v as f64,
        Value::Float(v) => v as f64,
        Value::Double(v) => v,
        other => bad_value(&other),
    }
}

fn negate(value: Value) -> Value {
    match value {
        Value::Int(v) => Value::Int(v.wrapping_neg()),
        Value::Long(v) => Value::Long(v.wrapping_neg()),
        Value::Float(v) => Value::Float(-v),
        Value::Double(v) => Value::Double(-v),
        other => bad_value(&other),
    }
}

/// Arithmetic at the promoted operand type.
fn arith(op: BinaryOp, lhs: Value, rhs: Value) -> Value {
    use Value::*;
    if let (String(a), String(b)) = (&lhs, &rhs) {
        debug_assert!(matches!(op, BinaryOp::Add));
        return String(format!("{a}{b}"));
    }
    match (&lhs, &rhs) {
        (Double(_), _) | (_, Double(_)) => Double(apply_arith(op, to_f64(lhs), to_f64(rhs))),
        (Float(_), _) | (_, Float(_)) => Float(apply_arith(op, to_f32(lhs), to_f32(rhs))),
        (Long(_), _) | (_, Long(_)) => Long(apply_arith(op, to_i64(lhs), to_i64(rhs))),
        (Int(a), Int(b)) => Int(apply_arith(op, *a, *b)),
        _ => bad_value(&lhs),
    }
}

fn to_f32(value: Value) -> f32 {
    match value {
        Value::Int(v) => v as f32,
        Value::Long(v) => v as f32,
        Value::Float(v) => v,
        other => bad_value(&other),
    }
}

fn to_i64(value: Value) -> i64 {
    match value {
        Value::Int(v) => v as i64,
        Value::Long(v) => v,
        other => bad_value(&other),
    }
}

fn apply_arith<T>(op: BinaryOp, a: T, b: T) -> T
where
    T: Copy
        + std::ops::Add<Output = T>
        + std::ops::Sub<Output = T>
        + std::ops::Mul<Output = T>
        + std::ops::Div<Output = T>
        + std::ops::Rem<Output = T>,
{
    match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        BinaryOp::Rem => a % b,
        _ => unreachable!("non-arithmetic operator in arith"),
    }
}

fn compare(op: CompareOp, lhs: Value, rhs: Value) -> bool {
    use std::cmp::Ordering;

    let ordering = match (&lhs, &rhs) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Char(a), Value::Char(b)) => a.cmp(b),
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Long(_) | Value::Int(_), Value::Long(_) | Value::Int(_)) => {
            to_i64(lhs.clone()).cmp(&to_i64(rhs.clone()))
        }
        _ if matches!(
            (&lhs, &rhs),
            (
                Value::Float(_) | Value::Double(_) | Value::Int(_) | Value::Long(_),
                Value::Float(_) | Value::Double(_) | Value::Int(_) | Value::Long(_),
            )
        ) =>
        {
            let a = to_f64(lhs);
            let b = to_f64(rhs);
            return match op {
                CompareOp::Lt => a < b,
                CompareOp::Le => a <= b,
                CompareOp::Gt => a > b,
                CompareOp::Ge => a >= b,
                CompareOp::Eq => a == b,
                CompareOp::Ne => a != b,
            };
        }
        // Equality on same-typed non-ordered values.
        _ => {
            return match op {
                CompareOp::Eq => lhs == rhs,
                CompareOp::Ne => lhs != rhs,
                _ => bad_value(&lhs),
            };
        }
    };

    match op {
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Le => ordering != Ordering::Greater,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Ge => ordering != Ordering::Less,
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
    }
}

/// Glob-style match: `*` matches any run of characters, `?` exactly one.
fn wildcard_match(value: &str, pattern: &str) -> bool {
    let text: Vec<char> = value.chars().collect();
    let pat: Vec<char> = pattern.chars().collect();

    let (mut t, mut p) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pat.len() && (pat[p] == '?' || pat[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pat.len() && pat[p] == '*' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            // Backtrack: let the last '*' absorb one more character.
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pat.len() && pat[p] == '*' {
        p += 1;
    }
    p == pat.len()
}
