use thiserror::Error;

use crate::catalog::CatalogError;
use crate::domain::customer::CustomerField;
use crate::ledger::LedgerError;

/// Malformed customer input. Recovered by re-prompting the same stage.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("expected a non-empty answer")]
    EmptyInput,
    #[error("phone `{input}` must be exactly 10 digits")]
    MalformedPhone { input: String },
    #[error("quantity `{input}` must be a positive integer")]
    InvalidQuantity { input: String },
    #[error("`{input}` does not name any of the listed products")]
    UnknownSelection { input: String },
    #[error("quantity `{input}` makes the order amount too large")]
    QuantityTooLarge { input: String },
    #[error("cannot finish an order without items")]
    EmptyCart,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("customer {} was already captured for this session", field.as_str())]
    CustomerFieldAlreadySet { field: CustomerField },
    #[error("customer data is incomplete: missing {}", missing.as_str())]
    IncompleteCustomer { missing: CustomerField },
    #[error("an order needs at least one line item")]
    EmptyCart,
    #[error("session has no order id assigned")]
    MissingOrderId,
    #[error("message has no conversation id")]
    MissingConversationId,
    #[error("amount for `{product}` exceeds the supported range")]
    AmountOverflow { product: String },
}

/// Failure of an external collaborator during a turn.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Everything a single conversation turn can fail with. None of these end the session.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no catalog product matches `{term}`")]
    NotFound { term: String },
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl From<CatalogError> for TurnError {
    fn from(value: CatalogError) -> Self {
        Self::Service(ServiceError::Catalog(value))
    }
}

impl From<LedgerError> for TurnError {
    fn from(value: LedgerError) -> Self {
        Self::Service(ServiceError::Ledger(value))
    }
}

/// Failure raised outside a conversation turn, before any session is touched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// What an outer surface reports back to its caller.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        match self {
            Self::Domain(error) => {
                InterfaceError::BadRequest { message: error.to_string(), correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::CatalogError;
    use crate::errors::{
        ApplicationError, DomainError, InterfaceError, ServiceError, TurnError, ValidationError,
    };

    #[test]
    fn domain_error_maps_to_bad_request_interface_error() {
        let interface =
            ApplicationError::from(DomainError::MissingConversationId).into_interface("req-1");

        assert_eq!(
            interface,
            InterfaceError::BadRequest {
                message: "message has no conversation id".to_owned(),
                correlation_id: "req-1".to_owned(),
            }
        );
        assert_eq!(interface.correlation_id(), "req-1");
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn catalog_errors_convert_into_service_turn_errors() {
        let error = TurnError::from(CatalogError::Timeout { after_secs: 5 });
        assert!(matches!(error, TurnError::Service(ServiceError::Catalog(_))));

        let error = TurnError::from(ValidationError::EmptyCart);
        assert_eq!(error.to_string(), "cannot finish an order without items");
    }
}
