//! Type compatibility between JSON values and declared parameter types
//!
//! [`matches`] answers one coarse question: could this JSON value plausibly
//! be converted into a parameter of this declared type? It is only used to
//! break ties between overloads that accept the same number of arguments. It
//! never rejects a request by itself; the real conversion happens at
//! invocation time and may still fail there.
//!
//! The rules, in priority order:
//!
//! 1. `null` matches any type
//! 2. a string matches only textual types
//! 3. a number matches any numeric type, without range or precision checks
//! 4. an array against a fixed array type matches when it is non-empty and
//!    its first element matches the element type (empty arrays never match).
//!    Byte buffers count as fixed arrays of integers.
//! 5. an array against any other type matches array-like and collection types
//! 6. a boolean matches only boolean types
//! 7. an object matches every type that is not textual, numeric or boolean
//!
//! JSON as parsed by `serde_json` has no binary value, so byte buffers are
//! only ever reached through rule 4.

use serde_json::Value;
use std::fmt;

/// Flavour of a numeric parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericKind {
    /// Signed or unsigned integers of any width
    Integer,
    /// `f32` / `f64`
    Float,
    /// Width-agnostic numbers such as `serde_json::Number`
    Any,
}

/// Declared type of an operation parameter
///
/// This is the static stand-in for reflection: every parameter descriptor
/// carries one, computed once when the operation table is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// `String`, `&str`, `char`
    Text,
    /// Integer and floating point primitives
    Numeric(NumericKind),
    /// `bool`
    Boolean,
    /// Byte buffers (`Vec<u8>`, `[u8; N]`, `&[u8]`)
    Bytes,
    /// Fixed-size arrays `[T; N]`
    Array(Box<TypeKind>),
    /// Ordered or unordered collections (`Vec<T>`, `HashSet<T>`, ...)
    Collection(Box<TypeKind>),
    /// Key/value maps
    Map,
    /// Any other structured type, by name
    Struct(String),
    /// `Option<T>`, matched as its inner type
    Optional(Box<TypeKind>),
}

impl TypeKind {
    /// Shorthand for `TypeKind::Numeric(NumericKind::Integer)`
    pub const INTEGER: TypeKind = TypeKind::Numeric(NumericKind::Integer);
    /// Shorthand for `TypeKind::Numeric(NumericKind::Float)`
    pub const FLOAT: TypeKind = TypeKind::Numeric(NumericKind::Float);

    /// A structured type with the given name
    pub fn structure(name: impl Into<String>) -> Self {
        TypeKind::Struct(name.into())
    }

    /// An array of the given element type
    pub fn array_of(element: TypeKind) -> Self {
        TypeKind::Array(Box::new(element))
    }

    /// A collection of the given element type
    pub fn collection_of(element: TypeKind) -> Self {
        TypeKind::Collection(Box::new(element))
    }

    /// An optional value of the given type
    pub fn optional(inner: TypeKind) -> Self {
        TypeKind::Optional(Box::new(inner))
    }

    /// The type with any `Optional` wrappers removed
    pub fn unwrapped(&self) -> &TypeKind {
        match self {
            TypeKind::Optional(inner) => inner.unwrapped(),
            other => other,
        }
    }

    fn is_scalar(&self) -> bool {
        matches!(self, TypeKind::Text | TypeKind::Numeric(_) | TypeKind::Boolean)
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Text => f.write_str("string"),
            TypeKind::Numeric(NumericKind::Integer) => f.write_str("integer"),
            TypeKind::Numeric(NumericKind::Float) => f.write_str("float"),
            TypeKind::Numeric(NumericKind::Any) => f.write_str("number"),
            TypeKind::Boolean => f.write_str("boolean"),
            TypeKind::Bytes => f.write_str("bytes"),
            TypeKind::Array(element) => write!(f, "[{}]", element),
            TypeKind::Collection(element) => write!(f, "collection<{}>", element),
            TypeKind::Map => f.write_str("map"),
            TypeKind::Struct(name) => f.write_str(name),
            TypeKind::Optional(inner) => write!(f, "{}?", inner),
        }
    }
}

/// Does `value` plausibly fit a parameter declared as `kind`?
///
/// # Examples
///
/// ```rust
/// use jrex_server::matcher::{matches, TypeKind};
/// use serde_json::json;
///
/// assert!(matches(&json!(5), &TypeKind::INTEGER));
/// assert!(!matches(&json!("5"), &TypeKind::INTEGER));
/// assert!(matches(&json!(null), &TypeKind::Boolean));
/// assert!(!matches(&json!([]), &TypeKind::array_of(TypeKind::Text)));
/// ```
pub fn matches(value: &Value, kind: &TypeKind) -> bool {
    let kind = kind.unwrapped();
    match value {
        Value::Null => true,
        Value::String(_) => matches!(kind, TypeKind::Text),
        Value::Number(_) => matches!(kind, TypeKind::Numeric(_)),
        Value::Array(items) => match kind {
            TypeKind::Array(element) => items.first().is_some_and(|first| matches(first, element)),
            TypeKind::Bytes => items.first().is_some_and(|first| matches(first, &TypeKind::INTEGER)),
            TypeKind::Collection(_) => true,
            _ => false,
        },
        Value::Bool(_) => matches!(kind, TypeKind::Boolean),
        Value::Object(_) => !kind.is_scalar(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn all_kinds() -> Vec<TypeKind> {
        vec![
            TypeKind::Text,
            TypeKind::INTEGER,
            TypeKind::FLOAT,
            TypeKind::Numeric(NumericKind::Any),
            TypeKind::Boolean,
            TypeKind::Bytes,
            TypeKind::array_of(TypeKind::Text),
            TypeKind::collection_of(TypeKind::INTEGER),
            TypeKind::Map,
            TypeKind::structure("Point"),
            TypeKind::optional(TypeKind::Text),
        ]
    }

    #[test]
    fn test_null_matches_everything() {
        for kind in all_kinds() {
            assert!(matches(&Value::Null, &kind), "null should match {}", kind);
        }
    }

    #[test]
    fn test_string_matches_only_text() {
        assert!(matches(&json!("a"), &TypeKind::Text));
        assert!(matches(&json!("a"), &TypeKind::optional(TypeKind::Text)));
        assert!(!matches(&json!("a"), &TypeKind::INTEGER));
        assert!(!matches(&json!("a"), &TypeKind::structure("Point")));
        assert!(!matches(&json!("a"), &TypeKind::Map));
    }

    #[test]
    fn test_number_matches_any_numeric_width() {
        assert!(matches(&json!(1), &TypeKind::INTEGER));
        assert!(matches(&json!(1), &TypeKind::FLOAT));
        assert!(matches(&json!(1.5), &TypeKind::INTEGER));
        assert!(matches(&json!(u64::MAX), &TypeKind::Numeric(NumericKind::Any)));
        assert!(!matches(&json!(1), &TypeKind::Text));
        assert!(!matches(&json!(1), &TypeKind::Boolean));
    }

    #[test]
    fn test_array_against_fixed_array_recurses_on_first_element() {
        let texts = TypeKind::array_of(TypeKind::Text);
        assert!(matches(&json!(["a", 1]), &texts));
        assert!(!matches(&json!([1, "a"]), &texts));
        assert!(!matches(&json!([]), &texts));
        assert!(matches(&json!([null]), &texts));
    }

    #[test]
    fn test_array_against_collections() {
        assert!(matches(&json!([]), &TypeKind::collection_of(TypeKind::Text)));
        assert!(matches(&json!([1, 2]), &TypeKind::collection_of(TypeKind::Text)));
        assert!(!matches(&json!([1, 2]), &TypeKind::Map));
        assert!(!matches(&json!([1, 2]), &TypeKind::structure("Point")));
        assert!(!matches(&json!([1, 2]), &TypeKind::Text));
    }

    #[test]
    fn test_array_against_bytes_needs_a_numeric_first_element() {
        assert!(matches(&json!([1, 2]), &TypeKind::Bytes));
        assert!(matches(&json!([null]), &TypeKind::Bytes));
        assert!(!matches(&json!(["a", "b"]), &TypeKind::Bytes));
        assert!(!matches(&json!([[1]]), &TypeKind::Bytes));
        assert!(!matches(&json!([{"b": 1}]), &TypeKind::Bytes));
        assert!(!matches(&json!([]), &TypeKind::Bytes));
    }

    #[test]
    fn test_boolean_matches_only_boolean() {
        assert!(matches(&json!(true), &TypeKind::Boolean));
        assert!(!matches(&json!(false), &TypeKind::INTEGER));
        assert!(!matches(&json!(false), &TypeKind::structure("Flag")));
    }

    #[test]
    fn test_object_matches_structured_types() {
        let object = json!({"x": 1});
        assert!(matches(&object, &TypeKind::structure("Point")));
        assert!(matches(&object, &TypeKind::Map));
        assert!(matches(&object, &TypeKind::collection_of(TypeKind::Text)));
        assert!(matches(&object, &TypeKind::array_of(TypeKind::Text)));
        assert!(!matches(&object, &TypeKind::Text));
        assert!(!matches(&object, &TypeKind::FLOAT));
        assert!(!matches(&object, &TypeKind::Boolean));
        assert!(!matches(&object, &TypeKind::optional(TypeKind::Boolean)));
    }

    #[test]
    fn test_display() {
        assert_eq!(TypeKind::collection_of(TypeKind::INTEGER).to_string(), "collection<integer>");
        assert_eq!(TypeKind::optional(TypeKind::Text).to_string(), "string?");
        assert_eq!(TypeKind::structure("Vehicle").to_string(), "Vehicle");
    }
}
