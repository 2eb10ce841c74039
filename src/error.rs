//! Error types for the store, lineage validation and session checks.
//!
//! The pure derivations (aggregation, ranking, trees) never fail; these
//! errors come from the data-access boundary and from business rules.

use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("Not permitted: {role} cannot {action}")]
    NotPermitted { role: String, action: String },

    #[error("A cell cannot multiply into itself: {0}")]
    SelfMultiplication(Uuid),

    #[error("Cell {0} is already registered as a multiplication destination")]
    DestinationAlreadyUsed(Uuid),

    #[error("Multiplication {origin} -> {destination} would make a cell its own ancestor")]
    MultiplicationCycle { origin: Uuid, destination: Uuid },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let id = Uuid::nil();
        let err = AppError::NotFound {
            entity: "Cell",
            id,
        };
        assert_eq!(err.to_string(), format!("Cell not found: {}", id));

        let err = AppError::NotPermitted {
            role: "Cell leader".to_string(),
            action: "delete a weekly report".to_string(),
        };
        assert!(err.to_string().contains("cannot delete a weekly report"));
    }
}
