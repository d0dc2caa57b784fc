use thiserror::Error;

/// Failure taxonomy shared by the model client and the CRM gateway.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum IntegrationError {
    #[error("API Error: {status} - {body}")]
    Provider { status: u16, body: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("decode failure: {0}")]
    Decode(String),
    #[error("unknown tool")]
    UnknownTool(String),
    #[error("provider returned no usable content")]
    EmptyResponse,
    #[error("configuration failure: {0}")]
    Configuration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn bad_request(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self::BadRequest { message: message.into(), correlation_id: correlation_id.into() }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "La solicitud no se pudo procesar. Revisa los datos e intenta de nuevo."
            }
            Self::ServiceUnavailable { .. } => {
                "El servicio no está disponible en este momento. Intenta de nuevo en unos minutos."
            }
            Self::Internal { .. } => "Ocurrió un error interno inesperado.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl IntegrationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<IntegrationError> for InterfaceError {
    fn from(value: IntegrationError) -> Self {
        let unassigned = || "unassigned".to_owned();
        match value {
            IntegrationError::UnknownTool(name) => Self::BadRequest {
                message: format!("unknown tool `{name}`"),
                correlation_id: unassigned(),
            },
            error @ (IntegrationError::Provider { .. }
            | IntegrationError::Transport(_)
            | IntegrationError::Decode(_)
            | IntegrationError::EmptyResponse) => {
                Self::ServiceUnavailable { message: error.to_string(), correlation_id: unassigned() }
            }
            IntegrationError::Configuration(message) => {
                Self::Internal { message, correlation_id: unassigned() }
            }
        }
    }
}
