//! Operation descriptors
//!
//! An [`OperationDescriptor`] is everything the resolver and the error
//! resolvers need to know about one callable: its wire name, its ordered
//! parameters (declared type, optional explicit name, required flag), how its
//! return value is marshaled, and the application errors it declares.
//!
//! Descriptors are immutable. They are created once when a contract is built
//! and then shared by every request.
//!
//! # Examples
//!
//! ```rust
//! use jrex_server::{OperationDescriptor, ParamDescriptor, ReturnType, TypeKind};
//!
//! let transfer = OperationDescriptor::new("transfer")
//!     .param(ParamDescriptor::named("from", TypeKind::Text))
//!     .param(ParamDescriptor::named("amount", TypeKind::INTEGER))
//!     .param(ParamDescriptor::named("memo", TypeKind::Text).optional())
//!     .returns(ReturnType::Value(TypeKind::Boolean));
//!
//! assert_eq!(transfer.arity(), 3);
//! assert_eq!(transfer.signature(), "transfer(from: string, amount: integer, memo?: string) -> boolean");
//! ```

use crate::matcher::TypeKind;
use serde_json::Value;
use std::fmt;

/// One declared parameter of an operation
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDescriptor {
    /// Declared type, used for tie-breaking between overloads
    pub kind: TypeKind,
    /// Explicit name for named-parameter calls
    ///
    /// Parameters without a name can only be filled positionally. In a
    /// named call they still occupy their slot and receive `null`.
    pub name: Option<String>,
    /// Whether the parameter is documented as required
    pub required: bool,
}

impl ParamDescriptor {
    /// A required parameter without an explicit name
    pub fn positional(kind: TypeKind) -> Self {
        Self {
            kind,
            name: None,
            required: true,
        }
    }

    /// A required parameter with an explicit name
    pub fn named(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            kind,
            name: Some(name.into()),
            required: true,
        }
    }

    /// Mark the parameter as optional
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Declared element type of a collection-returning operation
///
/// When `discriminator` is set, each element is serialized through its
/// declared type so that the named type tag is present on every element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementType {
    /// Name of the declared element type
    pub name: String,
    /// Name of the type-tag property added to every element
    pub discriminator: Option<String>,
}

impl ElementType {
    /// An element type serialized as-is
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            discriminator: None,
        }
    }

    /// A polymorphic element type carrying a type tag
    pub fn tagged(name: impl Into<String>, discriminator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            discriminator: Some(discriminator.into()),
        }
    }
}

/// How an operation's return value is turned into a JSON result
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnType {
    /// No result; the call still answers `"result": null`
    Unit,
    /// A single value of the given type
    Value(TypeKind),
    /// A collection whose element type is known at registration time
    Collection {
        /// Declared element type
        element: ElementType,
    },
}

/// Application error declared by an operation
///
/// When the operation fails with an error of the given category, the
/// declared code (and optional message and data) is reported instead of the
/// generic fallback.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorMapping {
    /// Failure category, matched against the full category name or its last
    /// path segment
    pub category: String,
    /// JSON-RPC error code
    pub code: i32,
    /// Message override; the failure's own message is used when absent
    pub message: Option<String>,
    /// Data override; the failure's own data is used when absent
    pub data: Option<Value>,
}

impl ErrorMapping {
    /// Map a failure category to a code
    pub fn new(category: impl Into<String>, code: i32) -> Self {
        Self {
            category: category.into(),
            code,
            message: None,
            data: None,
        }
    }

    /// Override the reported message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Override the reported data
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Does this mapping apply to the given category name?
    pub fn applies_to(&self, category: &str) -> bool {
        category == self.category
            || category
                .rsplit("::")
                .next()
                .is_some_and(|last| last == self.category)
    }
}

/// Static description of one exposed operation
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    /// Wire name of the operation (several overloads may share it)
    pub name: String,
    /// Ordered parameters
    pub params: Vec<ParamDescriptor>,
    /// Result marshaling strategy
    pub returns: ReturnType,
    /// Declared application errors
    pub errors: Vec<ErrorMapping>,
}

impl OperationDescriptor {
    /// A parameterless operation without a result
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            returns: ReturnType::Unit,
            errors: Vec::new(),
        }
    }

    /// Append a parameter
    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    /// Set the return type
    pub fn returns(mut self, returns: ReturnType) -> Self {
        self.returns = returns;
        self
    }

    /// Declare an application error
    pub fn error(mut self, mapping: ErrorMapping) -> Self {
        self.errors.push(mapping);
        self
    }

    /// Number of declared parameters
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Human-readable signature, used in logs
    pub fn signature(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for OperationDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            let marker = if param.required { "" } else { "?" };
            match &param.name {
                Some(name) => write!(f, "{}{}: {}", name, marker, param.kind)?,
                None => write!(f, "{}{}", param.kind, marker)?,
            }
        }
        f.write_str(")")?;
        match &self.returns {
            ReturnType::Unit => Ok(()),
            ReturnType::Value(kind) => write!(f, " -> {}", kind),
            ReturnType::Collection { element } => write!(f, " -> collection<{}>", element.name),
        }
    }
}
