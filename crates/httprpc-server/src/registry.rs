//! Name → procedure table shared by every dispatch

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;
use std::sync::Arc;

use httprpc_protocol::Fault;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info};

use crate::context::CallContext;
use crate::error::RegistryError;
use crate::procedure::{
    ArgumentSlot, CallFailure, Callable, Procedure, RawProcedure, Signature, TypeInfo,
    TypedCallable, Visibility,
};

/// A registered procedure: the erased callable plus its payload types.
/// Immutable once inserted.
pub struct ProcedureDescriptor {
    callable: Box<dyn Callable>,
    argument_type: TypeInfo,
    result_type: TypeInfo,
}

impl ProcedureDescriptor {
    pub fn argument_type(&self) -> TypeInfo {
        self.argument_type
    }

    pub fn result_type(&self) -> TypeInfo {
        self.result_type
    }

    /// Fresh zero-valued argument for one call
    pub fn allocate_argument(&self) -> Box<dyn ArgumentSlot> {
        self.callable.allocate_argument()
    }

    pub(crate) async fn invoke(
        &self,
        ctx: CallContext,
        argument: Box<dyn ArgumentSlot>,
    ) -> Result<Value, CallFailure> {
        self.callable.invoke(ctx, argument).await
    }

    /// Invoke in-process with JSON params
    pub async fn call_value(&self, ctx: CallContext, params: Value) -> Result<Value, Fault> {
        let mut argument = self.allocate_argument();
        argument.decode(params).map_err(Fault::invalid_params)?;
        self.invoke(ctx, argument).await.map_err(|failure| match failure {
            CallFailure::Fault(fault) => fault,
            CallFailure::Encode(err) => Fault::internal_error(err),
            CallFailure::ArgumentType(ty) => {
                Fault::internal_error(format!("argument slot is not {}", ty))
            }
        })
    }
}

impl fmt::Debug for ProcedureDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcedureDescriptor")
            .field("argument_type", &self.argument_type)
            .field("result_type", &self.result_type)
            .finish()
    }
}

/// Concurrency-safe procedure table.
///
/// Registration takes the write lock for the duplicate check and insert, so
/// racing registrations of one name produce exactly one success. Lookups take
/// the read lock and hand out an `Arc`, so no lock is held while a procedure
/// runs.
#[derive(Default)]
pub struct ProcedureRegistry {
    procedures: RwLock<HashMap<String, Arc<ProcedureDescriptor>>>,
}

impl ProcedureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a public procedure
    pub fn register<P>(&self, name: impl Into<String>, procedure: P) -> Result<(), RegistryError>
    where
        P: Procedure,
    {
        self.register_with_visibility(name, Visibility::Public, procedure)
    }

    pub fn register_with_visibility<P>(
        &self,
        name: impl Into<String>,
        visibility: Visibility,
        procedure: P,
    ) -> Result<(), RegistryError>
    where
        P: Procedure,
    {
        let name = name.into();
        let (argument_type, result_type) =
            Signature::of::<P::Args, P::Reply>(visibility).validate(&name)?;

        self.insert(
            name,
            ProcedureDescriptor {
                callable: Box::new(TypedCallable(procedure)),
                argument_type,
                result_type,
            },
        )
    }

    /// Register a JSON-level procedure under its declared signature
    pub fn register_raw(
        &self,
        name: impl Into<String>,
        procedure: RawProcedure,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        let (argument_type, result_type) = procedure.signature().validate(&name)?;

        self.insert(
            name,
            ProcedureDescriptor {
                callable: Box::new(procedure),
                argument_type,
                result_type,
            },
        )
    }

    fn insert(&self, name: String, descriptor: ProcedureDescriptor) -> Result<(), RegistryError> {
        let argument_type = descriptor.argument_type;
        let result_type = descriptor.result_type;

        match self.procedures.write().entry(name) {
            Entry::Occupied(entry) => {
                debug!(method = %entry.key(), "Rejected duplicate registration");
                Err(RegistryError::AlreadyDefined(entry.key().clone()))
            }
            Entry::Vacant(entry) => {
                info!(
                    method = %entry.key(),
                    argument = %argument_type,
                    result = %result_type,
                    "Registered procedure"
                );
                entry.insert(Arc::new(descriptor));
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<Arc<ProcedureDescriptor>, RegistryError> {
        self.procedures
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::MethodNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.procedures.read().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.procedures.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.procedures.read().is_empty()
    }

    /// Registered names, sorted
    pub fn registered_methods(&self) -> Vec<String> {
        let mut methods: Vec<String> = self.procedures.read().keys().cloned().collect();
        methods.sort();
        methods
    }
}

impl fmt::Debug for ProcedureRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcedureRegistry")
            .field("methods", &self.registered_methods())
            .finish()
    }
}
