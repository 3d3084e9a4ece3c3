use thiserror::Error;

use crate::domain::booking::BookingRejection;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    Rejected(#[from] BookingRejection),
    #[error("invalid dialog state: {0}")]
    InvalidDialogState(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("rejected: {message}")]
    Rejected { message: String, correlation_id: String },
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    /// Text safe to show inside a Slack dialog or DM.
    pub fn user_message(&self) -> &str {
        match self {
            Self::Rejected { message, .. } => message,
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The booking service is temporarily unavailable. Please retry shortly."
            }
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::Rejected { correlation_id: id, .. }
            | InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. } => {
                *id = correlation_id
            }
        }
        mapped
    }
}

impl From<BookingRejection> for ApplicationError {
    fn from(value: BookingRejection) -> Self {
        Self::Domain(DomainError::Rejected(value))
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        match value {
            ApplicationError::Domain(DomainError::Rejected(rejection)) => Self::Rejected {
                message: rejection.user_message().to_owned(),
                correlation_id: "unassigned".to_owned(),
            },
            ApplicationError::Domain(DomainError::InvalidDialogState(message)) => {
                Self::BadRequest { message, correlation_id: "unassigned".to_owned() }
            }
            ApplicationError::Persistence(message) | ApplicationError::Integration(message) => {
                Self::ServiceUnavailable { message, correlation_id: "unassigned".to_owned() }
            }
        }
    }
}
