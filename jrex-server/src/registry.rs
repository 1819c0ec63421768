//! Operation tables
//!
//! A [`Contract`] is the precomputed list of operations a handler type
//! exposes, indexed by wire name. Several operations may share a name
//! (overloads); [`Contract::candidates`] returns them in registration order,
//! which is also the order the resolver breaks ties in.
//!
//! Contracts are built once, either by hand through [`ContractBuilder`] or by
//! the `#[rpc_service]` attribute, and are then shared read-only between all
//! requests.
//!
//! `S` may be a trait object. A `Contract<dyn Ledger>` only exposes the
//! operations of the `Ledger` trait, whatever concrete type ends up handling
//! the calls.
//!
//! # Examples
//!
//! ```rust
//! use jrex_server::{Contract, OperationDescriptor, ParamDescriptor, ReturnType, ServiceError, TypeKind};
//!
//! struct Greeter;
//!
//! let contract = Contract::<Greeter>::builder()
//!     .method(
//!         OperationDescriptor::new("greet")
//!             .param(ParamDescriptor::named("name", TypeKind::Text))
//!             .returns(ReturnType::Value(TypeKind::Text)),
//!         |_: &Greeter, (name,): (String,)| Ok::<_, ServiceError>(format!("hello {}", name)),
//!     )
//!     .build();
//!
//! assert_eq!(contract.candidates("greet").len(), 1);
//! assert!(!contract.contains("farewell"));
//! ```

use crate::descriptor::{ElementType, OperationDescriptor, ReturnType};
use crate::error::ServiceError;
use crate::invoke::{marshal, marshal_tagged, FromArguments, InvocationError, TypeTagged};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// One callable entry of a contract
pub struct Operation<S: ?Sized> {
    descriptor: OperationDescriptor,
    #[allow(clippy::type_complexity)]
    call: Box<dyn Fn(&S, &[Value]) -> Result<Option<Value>, InvocationError> + Send + Sync>,
}

impl<S: ?Sized> Operation<S> {
    /// Wrap a raw operation working on resolved JSON arguments
    ///
    /// The closure receives exactly `descriptor.arity()` arguments and
    /// returns `None` when the operation has no result.
    pub fn new<F>(descriptor: OperationDescriptor, call: F) -> Self
    where
        F: Fn(&S, &[Value]) -> Result<Option<Value>, InvocationError> + Send + Sync + 'static,
    {
        Self {
            descriptor,
            call: Box::new(call),
        }
    }

    /// Static description of the operation
    pub fn descriptor(&self) -> &OperationDescriptor {
        &self.descriptor
    }

    /// Run the operation without panic protection
    ///
    /// The dispatcher goes through [`crate::invoke::invoke`] instead.
    pub fn call(&self, handler: &S, arguments: &[Value]) -> Result<Option<Value>, InvocationError> {
        (self.call)(handler, arguments)
    }
}

impl<S: ?Sized> fmt::Debug for Operation<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("signature", &self.descriptor.signature())
            .finish()
    }
}

/// Operation table of a handler type
pub struct Contract<S: ?Sized> {
    operations: Vec<Operation<S>>,
    index: HashMap<String, Vec<usize>>,
}

impl<S: ?Sized> Contract<S> {
    /// Start building a contract
    pub fn builder() -> ContractBuilder<S> {
        ContractBuilder::new()
    }

    /// All operations registered under `name`, in registration order
    pub fn candidates(&self, name: &str) -> Vec<&Operation<S>> {
        self.index
            .get(name)
            .map(|positions| positions.iter().map(|&i| &self.operations[i]).collect())
            .unwrap_or_default()
    }

    /// Is at least one operation registered under `name`?
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Every operation, in registration order
    pub fn operations(&self) -> &[Operation<S>] {
        &self.operations
    }

    /// Every descriptor, in registration order
    pub fn descriptors(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.operations.iter().map(Operation::descriptor)
    }

    /// Number of operations (overloads counted separately)
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Does the contract expose nothing?
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

impl<S: ?Sized> fmt::Debug for Contract<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.operations.iter()).finish()
    }
}

/// Builder for [`Contract`]
pub struct ContractBuilder<S: ?Sized> {
    operations: Vec<Operation<S>>,
}

impl<S: ?Sized> Default for ContractBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ?Sized> ContractBuilder<S> {
    /// Create an empty builder
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// Register a raw operation
    pub fn operation<F>(mut self, descriptor: OperationDescriptor, call: F) -> Self
    where
        F: Fn(&S, &[Value]) -> Result<Option<Value>, InvocationError> + Send + Sync + 'static,
    {
        self.operations.push(Operation::new(descriptor, call));
        self
    }

    /// Register a typed operation
    ///
    /// Arguments are coerced into the tuple `A`; the result is serialized
    /// with its default representation. An operation declared with
    /// `ReturnType::Unit` produces no result whatever `R` serializes to.
    pub fn method<A, R, E, F>(self, descriptor: OperationDescriptor, f: F) -> Self
    where
        A: FromArguments,
        R: Serialize,
        E: Into<ServiceError>,
        F: Fn(&S, A) -> Result<R, E> + Send + Sync + 'static,
    {
        check_arity::<A>(&descriptor);
        let unit = descriptor.returns == ReturnType::Unit;
        self.operation(descriptor, move |handler, arguments| {
            let value = f(handler, A::from_arguments(arguments)?).map_err(|e| InvocationError::Service(e.into()))?;
            if unit {
                Ok(None)
            } else {
                marshal(&value).map(Some)
            }
        })
    }

    /// Register a typed operation returning a polymorphic collection
    ///
    /// The descriptor's return type is set to a collection of `El`, and every
    /// element is written with its type tag (see [`marshal_tagged`]).
    pub fn method_tagged<A, C, El, E, F>(self, descriptor: OperationDescriptor, f: F) -> Self
    where
        A: FromArguments,
        C: Serialize,
        for<'a> &'a C: IntoIterator<Item = &'a El>,
        El: TypeTagged + Serialize,
        E: Into<ServiceError>,
        F: Fn(&S, A) -> Result<C, E> + Send + Sync + 'static,
    {
        check_arity::<A>(&descriptor);
        let descriptor = descriptor.returns(ReturnType::Collection {
            element: ElementType::tagged(short_type_name::<El>(), El::DISCRIMINATOR),
        });
        self.operation(descriptor, move |handler, arguments| {
            let collection = f(handler, A::from_arguments(arguments)?).map_err(|e| InvocationError::Service(e.into()))?;
            marshal_tagged(&collection).map(Some)
        })
    }

    /// Finish the table
    pub fn build(self) -> Contract<S> {
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (position, operation) in self.operations.iter().enumerate() {
            index
                .entry(operation.descriptor.name.clone())
                .or_default()
                .push(position);
        }
        Contract {
            operations: self.operations,
            index,
        }
    }
}

fn check_arity<A: FromArguments>(descriptor: &OperationDescriptor) {
    if descriptor.arity() != A::ARITY {
        tracing::warn!(
            operation = %descriptor.name,
            declared = descriptor.arity(),
            accepted = A::ARITY,
            "Declared parameter count differs from the argument tuple"
        );
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Handler types with a contract of their own
///
/// Implemented by `#[rpc_service]`; implement it by hand to pair a handler
/// type with a hand-built contract.
pub trait RpcService: Send + Sync + 'static {
    /// The shared operation table
    fn contract() -> Arc<Contract<Self>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ParamDescriptor;
    use crate::matcher::TypeKind;
    use serde_json::json;

    struct Counter {
        base: i64,
    }

    fn contract() -> Contract<Counter> {
        Contract::builder()
            .method(
                OperationDescriptor::new("add")
                    .param(ParamDescriptor::positional(TypeKind::INTEGER))
                    .returns(ReturnType::Value(TypeKind::INTEGER)),
                |c: &Counter, (n,): (i64,)| Ok::<_, ServiceError>(c.base + n),
            )
            .method(
                OperationDescriptor::new("add")
                    .param(ParamDescriptor::positional(TypeKind::Text))
                    .returns(ReturnType::Value(TypeKind::Text)),
                |c: &Counter, (s,): (String,)| Ok::<_, ServiceError>(format!("{}{}", c.base, s)),
            )
            .method(OperationDescriptor::new("reset"), |_: &Counter, (): ()| {
                Ok::<_, ServiceError>("ignored")
            })
            .build()
    }

    #[test]
    fn test_candidates_keep_registration_order() {
        let contract = contract();
        let adds = contract.candidates("add");
        assert_eq!(adds.len(), 2);
        assert_eq!(adds[0].descriptor().params[0].kind, TypeKind::INTEGER);
        assert_eq!(adds[1].descriptor().params[0].kind, TypeKind::Text);
        assert!(contract.candidates("missing").is_empty());
        assert_eq!(contract.len(), 3);
    }

    #[test]
    fn test_typed_method_round_trip() {
        let contract = contract();
        let counter = Counter { base: 40 };
        let adds = contract.candidates("add");
        assert_eq!(adds[0].call(&counter, &[json!(2)]).unwrap(), Some(json!(42)));
        assert_eq!(adds[1].call(&counter, &[json!("!")]).unwrap(), Some(json!("40!")));
    }

    #[test]
    fn test_unit_operation_has_no_result() {
        let contract = contract();
        let reset = contract.candidates("reset");
        assert_eq!(reset[0].call(&Counter { base: 0 }, &[]).unwrap(), None);
    }

    #[test]
    fn test_service_error_propagates() {
        let contract = Contract::<()>::builder()
            .method(
                OperationDescriptor::new("parse")
                    .param(ParamDescriptor::positional(TypeKind::Text))
                    .returns(ReturnType::Value(TypeKind::INTEGER)),
                |_: &(), (s,): (String,)| s.parse::<i64>(),
            )
            .build();
        let err = contract.candidates("parse")[0].call(&(), &[json!("x")]).unwrap_err();
        assert!(err.category().ends_with("ParseIntError"));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<String>(), "String");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }
}
