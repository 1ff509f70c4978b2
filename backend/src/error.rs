//! Error handling for the Stock Back Office
//!
//! Provides consistent error responses in English and French

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::LedgerViolation;
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Ledger rule errors
    #[error(transparent)]
    Ledger(#[from] LedgerViolation),

    #[error("Batch rejected at material {material_id}: {source}")]
    BatchLineRejected {
        material_id: Uuid,
        source: Box<AppError>,
    },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_fr: String,
    },

    #[error("Duplicate code: {0}")]
    DuplicateCode(String),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_fr: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    /// Validation error on one input field
    pub fn validation(field: &str, message: impl Into<String>, message_fr: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
            message_fr: message_fr.into(),
        }
    }

    /// Errors expected from user input, as opposed to failures of the system
    pub fn is_client_error(&self) -> bool {
        self.parts().0.is_client_error()
    }

    fn parts(&self) -> (StatusCode, ErrorDetail) {
        match self {
            AppError::Ledger(violation) => ledger_parts(violation),
            AppError::BatchLineRejected { material_id, source } => {
                let (status, mut detail) = source.parts();
                detail.message_en = format!("Material {}: {}", material_id, detail.message_en);
                detail.message_fr = format!("Matériel {} : {}", material_id, detail.message_fr);
                detail.field = Some(format!("quantities.{}", material_id));
                (status, detail)
            }
            AppError::Validation { field, message, message_fr } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_fr: message_fr.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::DuplicateCode(field) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "DUPLICATE_CODE".to_string(),
                    message_en: format!("A record with this {} already exists", field),
                    message_fr: format!("Un enregistrement avec ce {} existe déjà", field),
                    field: Some(field.clone()),
                },
            ),
            AppError::Conflict { resource, message, message_fr } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONFLICT".to_string(),
                    message_en: message.clone(),
                    message_fr: message_fr.clone(),
                    field: Some(resource.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_fr: format!("{} introuvable", resource),
                    field: None,
                },
            ),
            AppError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "CONFIGURATION_ERROR".to_string(),
                    message_en: format!("Configuration error: {}", msg),
                    message_fr: format!("Erreur de configuration : {}", msg),
                    field: None,
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_fr: "Une erreur de base de données est survenue".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_fr: "Erreur interne du serveur".to_string(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: "An internal server error occurred".to_string(),
                    message_fr: "Erreur interne du serveur".to_string(),
                    field: None,
                },
            ),
        }
    }
}

fn ledger_parts(violation: &LedgerViolation) -> (StatusCode, ErrorDetail) {
    let message_en = violation.to_string();
    let (code, message_fr, field) = match violation {
        LedgerViolation::InvalidQuantity { quantity } => (
            "INVALID_QUANTITY",
            format!("La quantité doit être supérieure à zéro (reçu {})", quantity),
            Some("quantity"),
        ),
        LedgerViolation::StoreRequired { action } => (
            "STORE_REQUIRED",
            format!("Un magasin est obligatoire pour l'action {}", action),
            Some("store_id"),
        ),
        LedgerViolation::InsufficientCentralStock { available, requested, .. } => (
            "INSUFFICIENT_CENTRAL_STOCK",
            format!(
                "Stock central insuffisant : {} disponible(s), {} demandé(s)",
                available, requested
            ),
            Some("quantity"),
        ),
        LedgerViolation::InsufficientStoreStock { available, requested, .. } => (
            "INSUFFICIENT_STORE_STOCK",
            format!(
                "Stock magasin insuffisant : {} disponible(s), {} demandé(s)",
                available, requested
            ),
            Some("quantity"),
        ),
        LedgerViolation::ImmutableTypeViolation { recorded, submitted } => (
            "IMMUTABLE_MOVEMENT_TYPE",
            format!(
                "Le type d'un mouvement ne peut pas passer de {} à {}",
                recorded, submitted
            ),
            Some("movement_type"),
        ),
    };

    (
        StatusCode::UNPROCESSABLE_ENTITY,
        ErrorDetail {
            code: code.to_string(),
            message_en,
            message_fr,
            field: field.map(str::to_string),
        },
    )
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|f| f.to_string())
            .unwrap_or_default();
        AppError::Validation {
            message: format!("Invalid value for {}", field),
            message_fr: format!("Valeur invalide pour {}", field),
            field,
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message_en: String,
    pub message_fr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = self.parts();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Rejected request: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_violations_are_unprocessable() {
        let err = AppError::from(LedgerViolation::InvalidQuantity { quantity: 0 });
        let (status, detail) = err.parts();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(detail.code, "INVALID_QUANTITY");
        assert_eq!(detail.field.as_deref(), Some("quantity"));
    }

    #[test]
    fn test_batch_rejection_keeps_inner_code() {
        let material_id = Uuid::new_v4();
        let err = AppError::BatchLineRejected {
            material_id,
            source: Box::new(AppError::from(LedgerViolation::InsufficientCentralStock {
                material_id,
                available: 2,
                requested: 5,
            })),
        };
        let (status, detail) = err.parts();
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(detail.code, "INSUFFICIENT_CENTRAL_STOCK");
        assert!(detail.message_en.contains(&material_id.to_string()));
        assert_eq!(detail.field, Some(format!("quantities.{}", material_id)));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::NotFound("Material".into()).parts().0, StatusCode::NOT_FOUND);
        assert_eq!(AppError::DuplicateCode("code".into()).parts().0, StatusCode::CONFLICT);
        assert_eq!(
            AppError::validation("quantities", "empty", "vide").parts().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Internal("boom".into()).parts().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(AppError::NotFound("Store".into()).is_client_error());
        assert!(!AppError::Internal("boom".into()).is_client_error());
    }
}
