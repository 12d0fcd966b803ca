//! Procedure declarations and the signature contract every handler must meet.
//!
//! A procedure is anything taking `(call context, argument, &mut result)` and
//! returning `Result<(), Fault>`. Typed procedures implement [`Procedure`] (or
//! wrap a closure with [`procedure_fn`]) and have their [`Signature`] derived
//! from their associated types. [`RawProcedure`]s work on JSON values and
//! declare their signature by hand.

use std::any::{Any, type_name};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use httprpc_protocol::Fault;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::context::CallContext;
use crate::error::RegistryError;

/// Whether a handler may be exposed to remote callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    Internal,
}

/// Classification of a payload type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// Numbers, strings, booleans, unit, raw JSON and containers of those
    Builtin,
    /// A user type meant to cross the wire
    Exported,
    /// A user type that must stay in-process
    Internal,
}

/// Name and kind of a payload type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeInfo {
    pub name: &'static str,
    pub kind: PayloadKind,
}

impl TypeInfo {
    pub fn of<T: Payload>() -> Self {
        Self {
            name: type_name::<T>(),
            kind: T::kind(),
        }
    }

    pub fn new(name: &'static str, kind: PayloadKind) -> Self {
        Self { name, kind }
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// A type usable as a procedure argument or result.
///
/// Payloads are allocated zero-valued (`Default`) before every call, decoded
/// from the request params and encoded into the response result. User types
/// opt in with an empty impl; overriding [`Payload::kind`] with
/// [`PayloadKind::Internal`] keeps the type from being registered.
///
/// ```rust
/// use httprpc_server::{Payload, PayloadKind};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct Args {
///     a: i64,
///     b: i64,
/// }
///
/// impl Payload for Args {}
///
/// assert_eq!(Args::kind(), PayloadKind::Exported);
/// ```
pub trait Payload: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    fn kind() -> PayloadKind {
        PayloadKind::Exported
    }
}

macro_rules! builtin_payload {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Payload for $ty {
                fn kind() -> PayloadKind {
                    PayloadKind::Builtin
                }
            }
        )*
    };
}

builtin_payload!(
    (),
    bool,
    i8,
    i16,
    i32,
    i64,
    isize,
    u8,
    u16,
    u32,
    u64,
    usize,
    f32,
    f64,
    String,
    Value,
);

// Containers take the kind of their element
impl<T: Payload> Payload for Vec<T> {
    fn kind() -> PayloadKind {
        T::kind()
    }
}

impl<T: Payload> Payload for Option<T> {
    fn kind() -> PayloadKind {
        T::kind()
    }
}

impl<T: Payload> Payload for HashMap<String, T> {
    fn kind() -> PayloadKind {
        T::kind()
    }
}

impl<T: Payload> Payload for BTreeMap<String, T> {
    fn kind() -> PayloadKind {
        T::kind()
    }
}

/// One declared handler input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Context,
    Payload(TypeInfo),
    Other(&'static str),
}

/// One declared handler output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Fault,
    Other(&'static str),
}

/// Declared shape of a handler, checked once at registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub visibility: Visibility,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
}

impl Signature {
    /// `(context, argument, &mut result) -> Result<(), Fault>`
    pub fn standard(visibility: Visibility, argument: TypeInfo, result: TypeInfo) -> Self {
        Self {
            visibility,
            inputs: vec![
                Input::Context,
                Input::Payload(argument),
                Input::Payload(result),
            ],
            outputs: vec![Output::Fault],
        }
    }

    pub fn of<A: Payload, R: Payload>(visibility: Visibility) -> Self {
        Self::standard(visibility, TypeInfo::of::<A>(), TypeInfo::of::<R>())
    }

    /// Check the signature and return the argument and result type descriptors
    pub fn validate(&self, name: &str) -> Result<(TypeInfo, TypeInfo), RegistryError> {
        if self.visibility == Visibility::Internal {
            return Err(RegistryError::NotExported {
                name: name.to_string(),
            });
        }

        if self.inputs.len() != 3 {
            return Err(RegistryError::signature(
                name,
                format!("expected 3 inputs, found {}", self.inputs.len()),
            ));
        }

        if self.inputs[0] != Input::Context {
            return Err(RegistryError::signature(
                name,
                "first input must be the call context",
            ));
        }

        let argument = payload_input(name, "argument", self.inputs[1])?;
        let result = payload_input(name, "result", self.inputs[2])?;

        match self.outputs.as_slice() {
            [Output::Fault] => Ok((argument, result)),
            [Output::Other(ty)] => Err(RegistryError::signature(
                name,
                format!("return type {} is not Result<(), Fault>", ty),
            )),
            outputs => Err(RegistryError::signature(
                name,
                format!("expected exactly one output, found {}", outputs.len()),
            )),
        }
    }
}

fn payload_input(name: &str, role: &str, input: Input) -> Result<TypeInfo, RegistryError> {
    match input {
        Input::Payload(info) if info.kind == PayloadKind::Internal => Err(RegistryError::signature(
            name,
            format!("{} type {} is not exported", role, info.name),
        )),
        Input::Payload(info) => Ok(info),
        Input::Context => Err(RegistryError::signature(
            name,
            format!("{} must be a payload, found the call context", role),
        )),
        Input::Other(ty) => Err(RegistryError::signature(
            name,
            format!("{} type {} is not a payload", role, ty),
        )),
    }
}

/// A typed remote procedure
#[async_trait]
pub trait Procedure: Send + Sync + 'static {
    type Args: Payload;
    type Reply: Payload;

    /// Fill `reply` from `args`; a returned fault becomes the response error
    async fn call(
        &self,
        ctx: &CallContext,
        args: Self::Args,
        reply: &mut Self::Reply,
    ) -> Result<(), Fault>;
}

/// Synchronous closure adapted into a [`Procedure`]
pub struct FnProcedure<F, A, R> {
    f: F,
    _types: PhantomData<fn(A) -> R>,
}

/// Wrap a closure as a procedure
pub fn procedure_fn<F, A, R>(f: F) -> FnProcedure<F, A, R>
where
    F: Fn(&CallContext, A, &mut R) -> Result<(), Fault> + Send + Sync + 'static,
    A: Payload,
    R: Payload,
{
    FnProcedure {
        f,
        _types: PhantomData,
    }
}

#[async_trait]
impl<F, A, R> Procedure for FnProcedure<F, A, R>
where
    F: Fn(&CallContext, A, &mut R) -> Result<(), Fault> + Send + Sync + 'static,
    A: Payload,
    R: Payload,
{
    type Args = A;
    type Reply = R;

    async fn call(&self, ctx: &CallContext, args: A, reply: &mut R) -> Result<(), Fault> {
        (self.f)(ctx, args, reply)
    }
}

type RawHandler =
    Arc<dyn Fn(CallContext, Value) -> BoxFuture<'static, Result<Value, Fault>> + Send + Sync>;

/// Untyped procedure over JSON values with a hand-declared signature.
///
/// Useful for gateways and generated bindings where payload types are not
/// known to the compiler. The returned value becomes the result.
#[derive(Clone)]
pub struct RawProcedure {
    signature: Signature,
    handler: RawHandler,
}

impl RawProcedure {
    pub fn new<F, Fut>(signature: Signature, handler: F) -> Self
    where
        F: Fn(CallContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Fault>> + Send + 'static,
    {
        Self {
            signature,
            handler: Arc::new(move |ctx, params| Box::pin(handler(ctx, params))),
        }
    }

    /// Public handler taking and returning any JSON value
    pub fn json<F, Fut>(handler: F) -> Self
    where
        F: Fn(CallContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, Fault>> + Send + 'static,
    {
        Self::new(Signature::of::<Value, Value>(Visibility::Public), handler)
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

impl fmt::Debug for RawProcedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawProcedure")
            .field("signature", &self.signature)
            .finish()
    }
}

/// A zero-valued argument awaiting decoding
pub trait ArgumentSlot: Send {
    /// Overwrite the slot with the decoded params. `null` params leave the
    /// zero value in place.
    fn decode(&mut self, params: Value) -> Result<(), serde_json::Error>;

    fn type_name(&self) -> &'static str;

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

pub(crate) struct TypedSlot<A>(pub(crate) A);

impl<A: Payload> ArgumentSlot for TypedSlot<A> {
    fn decode(&mut self, params: Value) -> Result<(), serde_json::Error> {
        if params.is_null() {
            return Ok(());
        }
        self.0 = serde_json::from_value(params)?;
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        type_name::<A>()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Why an invocation produced no result
#[derive(Debug)]
pub(crate) enum CallFailure {
    Fault(Fault),
    Encode(serde_json::Error),
    ArgumentType(&'static str),
}

/// Type-erased procedure as stored in the registry
#[async_trait]
pub(crate) trait Callable: Send + Sync {
    fn allocate_argument(&self) -> Box<dyn ArgumentSlot>;

    async fn invoke(
        &self,
        ctx: CallContext,
        argument: Box<dyn ArgumentSlot>,
    ) -> Result<Value, CallFailure>;
}

pub(crate) struct TypedCallable<P>(pub(crate) P);

#[async_trait]
impl<P: Procedure> Callable for TypedCallable<P> {
    fn allocate_argument(&self) -> Box<dyn ArgumentSlot> {
        Box::new(TypedSlot(P::Args::default()))
    }

    async fn invoke(
        &self,
        ctx: CallContext,
        argument: Box<dyn ArgumentSlot>,
    ) -> Result<Value, CallFailure> {
        let args = argument
            .into_any()
            .downcast::<TypedSlot<P::Args>>()
            .map_err(|_| CallFailure::ArgumentType(type_name::<P::Args>()))?
            .0;

        let mut reply = P::Reply::default();
        self.0
            .call(&ctx, args, &mut reply)
            .await
            .map_err(CallFailure::Fault)?;
        serde_json::to_value(&reply).map_err(CallFailure::Encode)
    }
}

#[async_trait]
impl Callable for RawProcedure {
    fn allocate_argument(&self) -> Box<dyn ArgumentSlot> {
        Box::new(TypedSlot(Value::Null))
    }

    async fn invoke(
        &self,
        ctx: CallContext,
        argument: Box<dyn ArgumentSlot>,
    ) -> Result<Value, CallFailure> {
        let params = argument
            .into_any()
            .downcast::<TypedSlot<Value>>()
            .map_err(|_| CallFailure::ArgumentType(type_name::<Value>()))?
            .0;
        (self.handler)(ctx, params).await.map_err(CallFailure::Fault)
    }
}
