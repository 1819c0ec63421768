//! `#[rpc_service]` implementation
//!
//! # Expansion
//!
//! Input:
//! ```ignore
//! #[rpc_service]
//! impl Bank {
//!     #[rpc(name = "balance.get")]
//!     pub fn balance(&self, #[param("account")] account: &str) -> i64 { .. }
//! }
//! ```
//!
//! Generated output (abridged):
//! ```ignore
//! impl Bank {
//!     pub fn balance(&self, account: &str) -> i64 { .. }
//! }
//!
//! impl ::jrex_server::RpcService for Bank {
//!     fn contract() -> Arc<Contract<Self>> {
//!         static CONTRACT: OnceLock<Arc<Contract<Bank>>> = OnceLock::new();
//!         CONTRACT.get_or_init(|| Arc::new(
//!             Contract::<Bank>::builder()
//!                 .operation(
//!                     OperationDescriptor::new("balance.get")
//!                         .param(ParamDescriptor::named("account", TypeKind::Text))
//!                         .returns(ReturnType::Value(TypeKind::INTEGER)),
//!                     |__service: &Bank, __args: &[Value]| {
//!                         let (__arg0,): (String,) = FromArguments::from_arguments(__args)?;
//!                         let __value = __service.balance(&__arg0);
//!                         marshal(&__value).map(Some)
//!                     },
//!                 )
//!                 .build(),
//!         )).clone()
//!     }
//! }
//! ```
//!
//! Helper attributes (`#[rpc]`, `#[param]`) are always stripped from the
//! impl, also when expansion fails, so that only the real error is reported.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote, ToTokens};
use syn::parse::ParseStream;
use syn::spanned::Spanned;
use syn::{
    parse_macro_input, Attribute, Expr, FnArg, GenericArgument, Ident, ImplItem, ImplItemFn, ItemImpl, LitStr,
    PathArguments, PathSegment, ReturnType, Token, Type, Visibility,
};

const COLLECTIONS: &[&str] = &["Vec", "VecDeque", "LinkedList", "HashSet", "BTreeSet", "BinaryHeap"];
const MAPS: &[&str] = &["HashMap", "BTreeMap", "Map", "IndexMap"];
const INTEGERS: &[&str] = &[
    "i8", "i16", "i32", "i64", "i128", "isize", "u8", "u16", "u32", "u64", "u128", "usize",
];
const WRAPPERS: &[&str] = &["Box", "Arc", "Rc", "Cow"];

#[derive(Default)]
struct MethodOptions {
    annotated: bool,
    name: Option<LitStr>,
    skip: bool,
    tagged: bool,
    errors: Vec<DeclaredError>,
}

struct DeclaredError {
    category: LitStr,
    code: Expr,
    message: Option<LitStr>,
}

struct ParamOptions {
    name: Option<LitStr>,
    optional: bool,
}

/// Implementation of the `rpc_service` attribute macro
pub fn rpc_service_impl(attr: TokenStream, item: TokenStream) -> TokenStream {
    let attr = TokenStream2::from(attr);
    let mut item_impl = parse_macro_input!(item as ItemImpl);

    let generated = expand(attr, &mut item_impl);
    let output = match generated {
        Ok(service_impl) => quote! {
            #item_impl
            #service_impl
        },
        Err(err) => {
            let error = err.to_compile_error();
            quote! {
                #item_impl
                #error
            }
        }
    };
    TokenStream::from(output)
}

fn expand(attr: TokenStream2, item_impl: &mut ItemImpl) -> syn::Result<TokenStream2> {
    let mut errors: Option<syn::Error> = None;
    let mut record = |err: syn::Error| match &mut errors {
        Some(existing) => existing.combine(err),
        None => errors = Some(err),
    };

    if !attr.is_empty() {
        record(syn::Error::new(attr.span(), "#[rpc_service] takes no arguments"));
    }
    if let Some((_, path, _)) = &item_impl.trait_ {
        record(syn::Error::new(
            path.span(),
            "#[rpc_service] goes on an inherent impl block, not a trait impl",
        ));
    }
    if !item_impl.generics.params.is_empty() {
        record(syn::Error::new(
            item_impl.generics.span(),
            "#[rpc_service] does not support generic impl blocks",
        ));
    }

    let self_ty = (*item_impl.self_ty).clone();
    let mut operations = Vec::new();
    for item in &mut item_impl.items {
        if let ImplItem::Fn(method) = item {
            match operation(&self_ty, method) {
                Ok(Some(tokens)) => operations.push(tokens),
                Ok(None) => {}
                Err(err) => record(err),
            }
        }
    }

    if let Some(err) = errors {
        return Err(err);
    }

    Ok(quote! {
        impl ::jrex_server::RpcService for #self_ty {
            fn contract() -> ::std::sync::Arc<::jrex_server::Contract<Self>> {
                static CONTRACT: ::std::sync::OnceLock<::std::sync::Arc<::jrex_server::Contract<#self_ty>>> =
                    ::std::sync::OnceLock::new();
                ::std::sync::Arc::clone(CONTRACT.get_or_init(|| {
                    ::std::sync::Arc::new(
                        ::jrex_server::Contract::<#self_ty>::builder()
                            #(#operations)*
                            .build(),
                    )
                }))
            }
        }
    })
}

/// Build the `.operation(..)` call for one method, or `None` if it is not exposed
fn operation(self_ty: &Type, method: &mut ImplItemFn) -> syn::Result<Option<TokenStream2>> {
    let options = take_method_options(&mut method.attrs);
    let params = take_param_options(method);
    let options = options?;
    let params = params?;

    if options.skip {
        return Ok(None);
    }

    let sig = &method.sig;
    let public = matches!(method.vis, Visibility::Public(_));
    let shared_receiver = matches!(
        sig.inputs.first(),
        Some(FnArg::Receiver(receiver)) if receiver.reference.is_some() && receiver.mutability.is_none()
    );
    if !public || !shared_receiver {
        if options.annotated {
            return Err(syn::Error::new(
                sig.ident.span(),
                "exposed operations must be `pub` and take `&self`",
            ));
        }
        return Ok(None);
    }
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new(
            asyncness.span(),
            "async operations are not supported, mark the method #[rpc(skip)]",
        ));
    }
    if !sig.generics.params.is_empty() {
        return Err(syn::Error::new(
            sig.generics.span(),
            "generic methods cannot be exposed, mark the method #[rpc(skip)]",
        ));
    }

    let method_ident = &sig.ident;
    let wire_name = options
        .name
        .clone()
        .unwrap_or_else(|| LitStr::new(&method_ident.to_string(), method_ident.span()));

    let mut bindings = Vec::new();
    let mut coerce_types = Vec::new();
    let mut call_args = Vec::new();
    let mut descriptors = Vec::new();
    for (index, (input, param)) in sig.inputs.iter().skip(1).zip(&params).enumerate() {
        let FnArg::Typed(pat_type) = input else {
            continue;
        };
        let binding = format_ident!("__arg{}", index);
        let (coerce_type, call_arg) = argument_binding(&pat_type.ty, &binding)?;

        let kind = type_kind(&pat_type.ty);
        let mut descriptor = match &param.name {
            Some(name) => quote!(::jrex_server::ParamDescriptor::named(#name, #kind)),
            None => quote!(::jrex_server::ParamDescriptor::positional(#kind)),
        };
        if param.optional || is_option(&pat_type.ty) {
            descriptor = quote!(#descriptor.optional());
        }

        bindings.push(binding);
        coerce_types.push(coerce_type);
        call_args.push(call_arg);
        descriptors.push(descriptor);
    }

    let (returns, finish) = result_handling(&sig.output, options.tagged)?;

    let declared_errors = options.errors.iter().map(|declared| {
        let category = &declared.category;
        let code = &declared.code;
        match &declared.message {
            Some(message) => quote!(::jrex_server::ErrorMapping::new(#category, #code).with_message(#message)),
            None => quote!(::jrex_server::ErrorMapping::new(#category, #code)),
        }
    });

    Ok(Some(quote! {
        .operation(
            ::jrex_server::OperationDescriptor::new(#wire_name)
                #(.param(#descriptors))*
                .returns(#returns)
                #(.error(#declared_errors))*,
            |__service: &#self_ty, __args: &[::jrex_server::serde_json::Value]| -> ::std::result::Result<
                ::std::option::Option<::jrex_server::serde_json::Value>,
                ::jrex_server::InvocationError,
            > {
                let (#(#bindings,)*): (#(#coerce_types,)*) = ::jrex_server::FromArguments::from_arguments(__args)?;
                let __value = __service.#method_ident(#(#call_args),*);
                #finish
            },
        )
    }))
}

/// Return-type descriptor and the code turning `__value` into a result
fn result_handling(output: &ReturnType, tagged: bool) -> syn::Result<(TokenStream2, TokenStream2)> {
    let unit = (
        quote!(::jrex_server::ReturnType::Unit),
        quote! {
            let _ = __value;
            ::std::result::Result::Ok(::std::option::Option::None)
        },
    );

    let ty = match output {
        ReturnType::Default => return Ok(unit),
        ReturnType::Type(_, ty) => ty.as_ref(),
    };

    let (value_ty, unwrap) = match result_value(ty) {
        Some(inner) => (
            inner,
            quote! {
                let __value = __value.map_err(|__err| {
                    ::jrex_server::InvocationError::Service(::core::convert::Into::into(__err))
                })?;
            },
        ),
        None => (ty, TokenStream2::new()),
    };

    if is_unit(value_ty) {
        let (returns, finish) = unit;
        return Ok((returns, quote!(#unwrap #finish)));
    }

    let element = collection_element(value_ty);
    if tagged {
        let Some(element) = element else {
            return Err(syn::Error::new(
                value_ty.span(),
                "#[rpc(tagged)] needs a collection return type such as `Vec<T>`",
            ));
        };
        let element_name = type_label(element);
        return Ok((
            quote! {
                ::jrex_server::ReturnType::Collection {
                    element: ::jrex_server::ElementType::tagged(
                        #element_name,
                        <#element as ::jrex_server::TypeTagged>::DISCRIMINATOR,
                    ),
                }
            },
            quote! {
                #unwrap
                ::jrex_server::invoke::marshal_tagged(&__value).map(::std::option::Option::Some)
            },
        ));
    }

    let returns = match element {
        Some(element) if !is_bytes(value_ty) => {
            let element_name = type_label(element);
            quote! {
                ::jrex_server::ReturnType::Collection {
                    element: ::jrex_server::ElementType::plain(#element_name),
                }
            }
        }
        _ => {
            let kind = type_kind(value_ty);
            quote!(::jrex_server::ReturnType::Value(#kind))
        }
    };
    Ok((
        returns,
        quote! {
            #unwrap
            ::jrex_server::invoke::marshal(&__value).map(::std::option::Option::Some)
        },
    ))
}

/// Owned type to coerce into, and the expression passed to the method
fn argument_binding(ty: &Type, binding: &Ident) -> syn::Result<(TokenStream2, TokenStream2)> {
    match ty {
        Type::Reference(reference) => {
            if reference.mutability.is_some() {
                return Err(syn::Error::new(ty.span(), "`&mut` parameters cannot be exposed"));
            }
            let owned = match reference.elem.as_ref() {
                Type::Path(path) if path.path.is_ident("str") => quote!(::std::string::String),
                Type::Slice(slice) => {
                    let element = &slice.elem;
                    quote!(::std::vec::Vec<#element>)
                }
                other => other.to_token_stream(),
            };
            Ok((owned, quote!(&#binding)))
        }
        Type::ImplTrait(_) => Err(syn::Error::new(ty.span(), "`impl Trait` parameters cannot be exposed")),
        other => Ok((other.to_token_stream(), binding.to_token_stream())),
    }
}

/// Declared `TypeKind` for a parameter or result type
fn type_kind(ty: &Type) -> TokenStream2 {
    match ty {
        Type::Reference(reference) => type_kind(&reference.elem),
        Type::Paren(paren) => type_kind(&paren.elem),
        Type::Group(group) => type_kind(&group.elem),
        Type::Slice(slice) => {
            if is_byte(&slice.elem) {
                quote!(::jrex_server::TypeKind::Bytes)
            } else {
                let element = type_kind(&slice.elem);
                quote!(::jrex_server::TypeKind::collection_of(#element))
            }
        }
        Type::Array(array) => {
            if is_byte(&array.elem) {
                quote!(::jrex_server::TypeKind::Bytes)
            } else {
                let element = type_kind(&array.elem);
                quote!(::jrex_server::TypeKind::array_of(#element))
            }
        }
        Type::Tuple(tuple) => {
            let element = tuple
                .elems
                .first()
                .map(type_kind)
                .unwrap_or_else(|| quote!(::jrex_server::TypeKind::structure("()")));
            quote!(::jrex_server::TypeKind::collection_of(#element))
        }
        Type::Path(_) => path_kind(ty),
        other => {
            let label = other.to_token_stream().to_string().replace(' ', "");
            quote!(::jrex_server::TypeKind::structure(#label))
        }
    }
}

fn path_kind(ty: &Type) -> TokenStream2 {
    let Some(segment) = last_segment(ty) else {
        return quote!(::jrex_server::TypeKind::structure("?"));
    };
    let ident = segment.ident.to_string();
    let inner = first_type_arg(segment);

    match ident.as_str() {
        "String" | "str" | "char" => quote!(::jrex_server::TypeKind::Text),
        "f32" | "f64" => quote!(::jrex_server::TypeKind::FLOAT),
        "Number" => quote!(::jrex_server::TypeKind::Numeric(::jrex_server::NumericKind::Any)),
        "bool" => quote!(::jrex_server::TypeKind::Boolean),
        name if INTEGERS.contains(&name) || name.starts_with("NonZero") => {
            quote!(::jrex_server::TypeKind::INTEGER)
        }
        "Option" => {
            let inner = inner
                .map(type_kind)
                .unwrap_or_else(|| quote!(::jrex_server::TypeKind::structure("?")));
            quote!(::jrex_server::TypeKind::optional(#inner))
        }
        name if WRAPPERS.contains(&name) => match inner {
            Some(inner) => type_kind(inner),
            None => quote!(::jrex_server::TypeKind::Text),
        },
        "Vec" if inner.is_some_and(is_byte) => quote!(::jrex_server::TypeKind::Bytes),
        name if COLLECTIONS.contains(&name) => {
            let element = inner
                .map(type_kind)
                .unwrap_or_else(|| quote!(::jrex_server::TypeKind::structure("?")));
            quote!(::jrex_server::TypeKind::collection_of(#element))
        }
        name if MAPS.contains(&name) => quote!(::jrex_server::TypeKind::Map),
        name => quote!(::jrex_server::TypeKind::structure(#name)),
    }
}

fn last_segment(ty: &Type) -> Option<&PathSegment> {
    match ty {
        Type::Path(path) if path.qself.is_none() => path.path.segments.last(),
        _ => None,
    }
}

fn first_type_arg(segment: &PathSegment) -> Option<&Type> {
    let PathArguments::AngleBracketed(arguments) = &segment.arguments else {
        return None;
    };
    arguments.args.iter().find_map(|arg| match arg {
        GenericArgument::Type(ty) => Some(ty),
        _ => None,
    })
}

/// `T` of `Result<T, E>` (or of any alias named `Result`)
fn result_value(ty: &Type) -> Option<&Type> {
    let segment = last_segment(ty)?;
    if segment.ident != "Result" {
        return None;
    }
    first_type_arg(segment)
}

/// Element type of a collection-like type
fn collection_element(ty: &Type) -> Option<&Type> {
    match ty {
        Type::Reference(reference) => collection_element(&reference.elem),
        Type::Slice(slice) => Some(&slice.elem),
        Type::Array(array) => Some(&array.elem),
        Type::Path(_) => {
            let segment = last_segment(ty)?;
            let name = segment.ident.to_string();
            if COLLECTIONS.contains(&name.as_str()) {
                first_type_arg(segment)
            } else if WRAPPERS.contains(&name.as_str()) {
                collection_element(first_type_arg(segment)?)
            } else {
                None
            }
        }
        _ => None,
    }
}

fn type_label(ty: &Type) -> String {
    match last_segment(ty) {
        Some(segment) => segment.ident.to_string(),
        None => ty.to_token_stream().to_string().replace(' ', ""),
    }
}

fn is_byte(ty: &Type) -> bool {
    last_segment(ty).is_some_and(|segment| segment.ident == "u8" && segment.arguments.is_empty())
}

fn is_bytes(ty: &Type) -> bool {
    match ty {
        Type::Reference(reference) => is_bytes(&reference.elem),
        Type::Slice(slice) => is_byte(&slice.elem),
        Type::Array(array) => is_byte(&array.elem),
        _ => last_segment(ty)
            .filter(|segment| segment.ident == "Vec")
            .and_then(first_type_arg)
            .is_some_and(is_byte),
    }
}

fn is_option(ty: &Type) -> bool {
    last_segment(ty).is_some_and(|segment| segment.ident == "Option")
}

fn is_unit(ty: &Type) -> bool {
    matches!(ty, Type::Tuple(tuple) if tuple.elems.is_empty())
}

fn take_method_options(attrs: &mut Vec<Attribute>) -> syn::Result<MethodOptions> {
    let mut options = MethodOptions::default();
    let mut failure: Option<syn::Error> = None;

    attrs.retain(|attr| {
        if !attr.path().is_ident("rpc") {
            return true;
        }
        options.annotated = true;
        if let Err(err) = parse_rpc_attr(attr, &mut options) {
            match &mut failure {
                Some(existing) => existing.combine(err),
                None => failure = Some(err),
            }
        }
        false
    });

    match failure {
        Some(err) => Err(err),
        None => Ok(options),
    }
}

fn parse_rpc_attr(attr: &Attribute, options: &mut MethodOptions) -> syn::Result<()> {
    attr.parse_nested_meta(|meta| {
        if meta.path.is_ident("name") {
            options.name = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("skip") {
            options.skip = true;
        } else if meta.path.is_ident("tagged") {
            options.tagged = true;
        } else if meta.path.is_ident("error") {
            let mut category = None;
            let mut code = None;
            let mut message = None;
            meta.parse_nested_meta(|inner| {
                if inner.path.is_ident("category") {
                    category = Some(inner.value()?.parse::<LitStr>()?);
                } else if inner.path.is_ident("code") {
                    code = Some(inner.value()?.parse::<Expr>()?);
                } else if inner.path.is_ident("message") {
                    message = Some(inner.value()?.parse::<LitStr>()?);
                } else {
                    return Err(inner.error("expected `category`, `code` or `message`"));
                }
                Ok(())
            })?;
            match (category, code) {
                (Some(category), Some(code)) => options.errors.push(DeclaredError {
                    category,
                    code,
                    message,
                }),
                _ => return Err(meta.error("`error(..)` needs both `category` and `code`")),
            }
        } else {
            return Err(meta.error("expected `name`, `skip`, `tagged` or `error(..)`"));
        }
        Ok(())
    })
}

/// Strip `#[param]` attributes from every typed parameter, in order
fn take_param_options(method: &mut ImplItemFn) -> syn::Result<Vec<ParamOptions>> {
    let mut params = Vec::new();
    let mut failure: Option<syn::Error> = None;

    for input in method.sig.inputs.iter_mut() {
        let FnArg::Typed(pat_type) = input else {
            continue;
        };
        let mut options = ParamOptions {
            name: None,
            optional: false,
        };
        pat_type.attrs.retain(|attr| {
            if !attr.path().is_ident("param") {
                return true;
            }
            match attr.parse_args_with(parse_param_args) {
                Ok((name, optional)) => {
                    options.name = Some(name);
                    options.optional = optional;
                }
                Err(err) => match &mut failure {
                    Some(existing) => existing.combine(err),
                    None => failure = Some(err),
                },
            }
            false
        });
        params.push(options);
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(params),
    }
}

fn parse_param_args(input: ParseStream) -> syn::Result<(LitStr, bool)> {
    let name: LitStr = input.parse()?;
    let mut optional = false;
    if input.parse::<Option<Token![,]>>()?.is_some() {
        let flag: Ident = input.parse()?;
        if flag != "optional" {
            return Err(syn::Error::new(flag.span(), "expected `optional`"));
        }
        optional = true;
    }
    Ok((name, optional))
}
