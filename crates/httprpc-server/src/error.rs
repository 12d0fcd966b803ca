use httprpc_protocol::{Fault, FaultCode};
use thiserror::Error;

/// Server-side errors that escape the accept loop
#[derive(Debug, Error)]
pub enum HttpRpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Registration and lookup failures of the procedure table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("rpc: method handler {name:?} is not exported")]
    NotExported { name: String },

    #[error(
        "rpc: method handler {name:?} must have signature fn(&CallContext, <Args>, &mut <Reply>) -> Result<(), Fault>: {reason}"
    )]
    SignatureMismatch { name: String, reason: String },

    #[error("rpc: method already defined: {0}")]
    AlreadyDefined(String),

    #[error("rpc: can't find method {0:?}")]
    MethodNotFound(String),
}

impl RegistryError {
    pub(crate) fn signature(name: &str, reason: impl Into<String>) -> Self {
        Self::SignatureMismatch {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<RegistryError> for Fault {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::MethodNotFound(ref method) => Fault::method_not_found(method),
            other => Fault::new(FaultCode::InternalError, other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_not_found_maps_to_wire_code() {
        let fault: Fault = RegistryError::MethodNotFound("Missing".to_string()).into();
        assert_eq!(fault.kind(), FaultCode::MethodNotFound);
        assert!(fault.message.contains("Missing"));
    }

    #[test]
    fn test_registry_error_display() {
        let err = RegistryError::AlreadyDefined("Echo".to_string());
        assert_eq!(err.to_string(), "rpc: method already defined: Echo");
    }
}
