//! The REX type algebra.
//!
//! Types are immutable values compared structurally. The domain record
//! types (`Record`, `Segment`, `Variant`) are uninterpreted leaves: the
//! core passes their values through but knows no fields or methods on
//! them; the host system gives them meaning.

use std::fmt;

/// A REX type.
#[derive(Debug, Clone)]
pub enum Type {
    Empty,
    Boolean,
    Char,
    Int,
    Long,
    Float,
    Double,
    String,

    // Opaque domain record types supplied by the host.
    Record,
    Segment,
    Variant,

    Array(Box<Type>),

    /// Ordered fields; order is significant for display but not equality.
    Struct(Vec<(String, Type)>),
}

impl PartialEq for Type {
    fn eq(&self, other: &Type) -> bool {
        use Type::*;
        match (self, other) {
            (Empty, Empty)
            | (Boolean, Boolean)
            | (Char, Char)
            | (Int, Int)
            | (Long, Long)
            | (Float, Float)
            | (Double, Double)
            | (String, String)
            | (Record, Record)
            | (Segment, Segment)
            | (Variant, Variant) => true,
            (Array(a), Array(b)) => a == b,
            (Struct(a), Struct(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(name, ty)| {
                        b.iter().any(|(n, t)| n == name && t == ty)
                    })
            }
            _ => false,
        }
    }
}

impl Eq for Type {}

impl Type {
    /// Map a type-grammar keyword to its type, if it names one.
    pub fn from_keyword(name: &str) -> Option<Type> {
        match name {
            "Empty" => Some(Type::Empty),
            "Boolean" => Some(Type::Boolean),
            "Char" => Some(Type::Char),
            "Int" => Some(Type::Int),
            "Long" => Some(Type::Long),
            "Float" => Some(Type::Float),
            "Double" => Some(Type::Double),
            "String" => Some(Type::String),
            "Record" => Some(Type::Record),
            "Segment" => Some(Type::Segment),
            "Variant" => Some(Type::Variant),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Long | Type::Float | Type::Double)
    }

    /// Rank in the numeric promotion order Int < Long < Float < Double.
    fn numeric_rank(&self) -> Option<u8> {
        match self {
            Type::Int => Some(0),
            Type::Long => Some(1),
            Type::Float => Some(2),
            Type::Double => Some(3),
            _ => None,
        }
    }

    /// The wider of two numeric types, or None if either is non-numeric.
    pub fn promote(a: &Type, b: &Type) -> Option<Type> {
        let ra = a.numeric_rank()?;
        let rb = b.numeric_rank()?;
        Some(if ra >= rb { a.clone() } else { b.clone() })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Empty => write!(f, "Empty"),
            Type::Boolean => write!(f, "Boolean"),
            Type::Char => write!(f, "Char"),
            Type::Int => write!(f, "Int"),
            Type::Long => write!(f, "Long"),
            Type::Float => write!(f, "Float"),
            Type::Double => write!(f, "Double"),
            Type::String => write!(f, "String"),
            Type::Record => write!(f, "Record"),
            Type::Segment => write!(f, "Segment"),
            Type::Variant => write!(f, "Variant"),
            Type::Array(elem) => write!(f, "Array[{elem}]"),
            Type::Struct(fields) => {
                write!(f, "Struct(")?;
                for (i, (name, ty)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn struct_equality_ignores_field_order() {
        let a = Type::Struct(vec![
            ("x".into(), Type::Int),
            ("y".into(), Type::String),
        ]);
        let b = Type::Struct(vec![
            ("y".into(), Type::String),
            ("x".into(), Type::Int),
        ]);
        assert_eq!(a, b);
    }

    #[test]
    fn struct_equality_requires_matching_fields() {
        let a = Type::Struct(vec![("x".into(), Type::Int)]);
        let b = Type::Struct(vec![("x".into(), Type::Long)]);
        assert_ne!(a, b);
        let c = Type::Struct(vec![
            ("x".into(), Type::Int),
            ("y".into(), Type::Int),
        ]);
        assert_ne!(a, c);
    }

    #[test]
    fn display_preserves_field_order() {
        let ty = Type::Struct(vec![
            ("b".into(), Type::Array(Box::new(Type::Int))),
            ("a".into(), Type::Double),
        ]);
        assert_eq!(ty.to_string(), "Struct(b: Array[Int], a: Double)");
    }

    #[test]
    fn promotes_to_wider_numeric_type() {
        assert_eq!(Type::promote(&Type::Int, &Type::Long), Some(Type::Long));
        assert_eq!(Type::promote(&Type::Double, &Type::Int), Some(Type::Double));
        assert_eq!(Type::promote(&Type::Int, &Type::Int), Some(Type::Int));
        assert_eq!(Type::promote(&Type::Int, &Type::String), None);
    }
}
