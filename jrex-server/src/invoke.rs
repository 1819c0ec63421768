//! Argument coercion, invocation and result marshaling
//!
//! Once the resolver has picked an operation and laid out its raw JSON
//! arguments, this module turns them into typed Rust values, calls the
//! operation, and turns the return value back into JSON.
//!
//! # Coercion
//!
//! Each argument is deserialized into the declared parameter type with
//! serde. A failure is reported as [`InvocationError::Coercion`] and goes
//! through the error resolvers like any other failure.
//!
//! # Polymorphic collections
//!
//! A collection whose element type is a closed set of variants (typically an
//! untagged enum) loses its variant information under plain serialization.
//! [`marshal_tagged`] serializes each element through its declared element
//! type instead and writes the element's [`TypeTagged::type_tag`] under the
//! [`TypeTagged::DISCRIMINATOR`] property. If that fails for any element the
//! whole collection falls back to plain serialization with a warning; the
//! call itself is never aborted by it.
//!
//! # Panics
//!
//! [`invoke`] catches a panicking operation and reports it as
//! [`InvocationError::Panicked`], so a faulty handler cannot take the
//! dispatching thread down with it.

use crate::error::ServiceError;
use crate::registry::Operation;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error;

static NULL: Value = Value::Null;

/// A failure captured while invoking an operation
#[derive(Debug, Error)]
pub enum InvocationError {
    /// An argument could not be converted to its declared type
    #[error("cannot convert argument {position}: {source}")]
    Coercion {
        /// Zero-based parameter position
        position: usize,
        /// Conversion failure
        #[source]
        source: serde_json::Error,
    },

    /// The operation returned an error
    #[error("{0}")]
    Service(ServiceError),

    /// The return value could not be serialized
    #[error("cannot serialize result: {0}")]
    Marshal(#[source] serde_json::Error),

    /// The operation panicked
    #[error("operation panicked: {0}")]
    Panicked(String),
}

impl InvocationError {
    /// Category name used by error resolvers and the generic fallback
    pub fn category(&self) -> &str {
        match self {
            InvocationError::Coercion { .. } => "Coercion",
            InvocationError::Service(err) => err.category(),
            InvocationError::Marshal(_) => "Marshal",
            InvocationError::Panicked(_) => "Panic",
        }
    }

    /// Message reported to the client by the generic fallback
    pub fn message(&self) -> String {
        match self {
            InvocationError::Service(err) => err.message().to_string(),
            other => other.to_string(),
        }
    }
}

impl From<ServiceError> for InvocationError {
    fn from(err: ServiceError) -> Self {
        InvocationError::Service(err)
    }
}

/// Polymorphic element type of a collection result
///
/// # Examples
///
/// ```rust
/// use jrex_server::TypeTagged;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Truck { axles: u8 }
/// #[derive(Serialize)]
/// struct Van { seats: u8 }
///
/// #[derive(Serialize)]
/// #[serde(untagged)]
/// enum Vehicle { Truck(Truck), Van(Van) }
///
/// impl TypeTagged for Vehicle {
///     const DISCRIMINATOR: &'static str = "type";
///
///     fn type_tag(&self) -> &str {
///         match self {
///             Vehicle::Truck(_) => "truck",
///             Vehicle::Van(_) => "van",
///         }
///     }
/// }
///
/// let fleet = vec![Vehicle::Truck(Truck { axles: 3 }), Vehicle::Van(Van { seats: 8 })];
/// let json = jrex_server::invoke::marshal_tagged(&fleet).unwrap();
/// assert_eq!(json[0]["type"], "truck");
/// assert_eq!(json[1]["seats"], 8);
/// ```
pub trait TypeTagged {
    /// Property name the tag is written under
    const DISCRIMINATOR: &'static str;

    /// Tag identifying this element's concrete variant
    fn type_tag(&self) -> &str;
}

/// Types that can be built from a resolved argument list
///
/// Implemented for tuples of up to eight deserializable values. The tuple
/// length must equal the operation's declared arity.
pub trait FromArguments: Sized {
    /// Number of arguments consumed
    const ARITY: usize;

    /// Coerce the arguments in order
    fn from_arguments(arguments: &[Value]) -> Result<Self, InvocationError>;
}

macro_rules! impl_from_arguments {
    ($arity:expr; $($ty:ident $index:tt),*) => {
        impl<$($ty: DeserializeOwned),*> FromArguments for ($($ty,)*) {
            const ARITY: usize = $arity;

            #[allow(unused_variables)]
            fn from_arguments(arguments: &[Value]) -> Result<Self, InvocationError> {
                Ok(($(coerce::<$ty>(arguments, $index)?,)*))
            }
        }
    };
}

impl_from_arguments!(0;);
impl_from_arguments!(1; A 0);
impl_from_arguments!(2; A 0, B 1);
impl_from_arguments!(3; A 0, B 1, C 2);
impl_from_arguments!(4; A 0, B 1, C 2, D 3);
impl_from_arguments!(5; A 0, B 1, C 2, D 3, E 4);
impl_from_arguments!(6; A 0, B 1, C 2, D 3, E 4, F 5);
impl_from_arguments!(7; A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_from_arguments!(8; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

/// Convert the argument at `position` into `T`
///
/// A missing slot is treated as JSON `null`, so `Option<T>` parameters
/// accept it and required parameters fail with a coercion error.
///
/// # Errors
///
/// Returns `InvocationError::Coercion` when deserialization fails.
pub fn coerce<T: DeserializeOwned>(arguments: &[Value], position: usize) -> Result<T, InvocationError> {
    let value = arguments.get(position).unwrap_or(&NULL);
    T::deserialize(value).map_err(|source| InvocationError::Coercion { position, source })
}

/// Serialize a return value with its default representation
///
/// # Errors
///
/// Returns `InvocationError::Marshal` when serialization fails.
pub fn marshal<T: Serialize + ?Sized>(value: &T) -> Result<Value, InvocationError> {
    serde_json::to_value(value).map_err(InvocationError::Marshal)
}

/// Serialize a collection through its declared polymorphic element type
///
/// Falls back to [`marshal`] (with a warning) when an element cannot be
/// serialized as a JSON object.
///
/// # Errors
///
/// Only fails if the fallback serialization fails too.
pub fn marshal_tagged<'a, C, E>(collection: &'a C) -> Result<Value, InvocationError>
where
    C: Serialize + ?Sized,
    &'a C: IntoIterator<Item = &'a E>,
    E: TypeTagged + Serialize + 'a,
{
    match tag_elements(collection) {
        Ok(tagged) => Ok(tagged),
        Err(reason) => {
            tracing::warn!(
                element = std::any::type_name::<E>(),
                reason = %reason,
                "Could not serialize collection through its element type, falling back to default"
            );
            marshal(collection)
        }
    }
}

fn tag_elements<'a, C, E>(collection: &'a C) -> Result<Value, String>
where
    C: ?Sized,
    &'a C: IntoIterator<Item = &'a E>,
    E: TypeTagged + Serialize + 'a,
{
    let mut tagged = Vec::new();
    for element in collection {
        match serde_json::to_value(element).map_err(|e| e.to_string())? {
            Value::Object(mut fields) => {
                fields.insert(
                    E::DISCRIMINATOR.to_string(),
                    Value::String(element.type_tag().to_string()),
                );
                tagged.push(Value::Object(fields));
            }
            other => {
                return Err(format!(
                    "element tagged '{}' serialized to {} instead of an object",
                    element.type_tag(),
                    json_kind(&other)
                ))
            }
        }
    }
    Ok(Value::Array(tagged))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Call an operation on a handler
///
/// Returns `Ok(None)` for operations without a result.
///
/// # Errors
///
/// Any coercion, service or marshaling failure, or a caught panic.
pub fn invoke<S: ?Sized>(
    handler: &S,
    operation: &Operation<S>,
    arguments: &[Value],
) -> Result<Option<Value>, InvocationError> {
    tracing::debug!(
        operation = %operation.descriptor().name,
        arguments = arguments.len(),
        "Invoking operation"
    );

    panic::catch_unwind(AssertUnwindSafe(|| operation.call(handler, arguments)))
        .unwrap_or_else(|payload| Err(InvocationError::Panicked(panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
