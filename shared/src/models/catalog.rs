//! Reference catalog models: suppliers, materials, stores and lookup tables

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// A supplier delivering materials to the central depot
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Supplier {
    pub id: Uuid,
    /// Unique business code
    pub code: String,
    pub name: String,
}

/// Input for creating or updating a supplier
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SupplierInput {
    #[validate(length(min = 1, max = 100))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

/// A trackable article
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Material {
    pub id: Uuid,
    /// Unique article code
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    /// Unit price excluding tax
    pub unit_price: Decimal,
    pub supplier_id: Option<Uuid>,
}

/// Input for creating or updating a material
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MaterialInput {
    #[validate(length(min = 1, max = 100))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub description: Option<String>,
    pub unit_price: Decimal,
    pub supplier_id: Option<Uuid>,
}

/// Material with its supplier name and central quantity, for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaterialDetail {
    #[serde(flatten)]
    pub material: Material,
    pub supplier_name: Option<String>,
    pub central_quantity: i64,
}

/// A store of the retail chain
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Store {
    pub id: Uuid,
    /// Unique store code
    pub code: String,
    pub name: String,
    pub city_id: Uuid,
    pub chain_id: Uuid,
    pub status_id: Uuid,
    pub project_type_id: Uuid,
}

/// Input for creating or updating a store
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StoreInput {
    #[validate(length(min = 1, max = 100))]
    pub code: String,
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    pub city_id: Uuid,
    pub chain_id: Uuid,
    pub status_id: Uuid,
    pub project_type_id: Uuid,
}

/// Store with the names of its reference items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreDetail {
    #[serde(flatten)]
    pub store: Store,
    pub city: String,
    pub chain: String,
    pub status: String,
    pub project_type: String,
}

/// Lookup tables a store refers to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    City,
    /// Purchasing chain (centrale)
    Chain,
    Status,
    ProjectType,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 4] = [
        ReferenceKind::City,
        ReferenceKind::Chain,
        ReferenceKind::Status,
        ReferenceKind::ProjectType,
    ];

    /// Path segment used by the API
    pub fn slug(&self) -> &'static str {
        match self {
            ReferenceKind::City => "cities",
            ReferenceKind::Chain => "chains",
            ReferenceKind::Status => "statuses",
            ReferenceKind::ProjectType => "project-types",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.slug() == slug)
    }

    /// Human readable label, used in error messages
    pub fn label(&self) -> &'static str {
        match self {
            ReferenceKind::City => "City",
            ReferenceKind::Chain => "Chain",
            ReferenceKind::Status => "Status",
            ReferenceKind::ProjectType => "Project type",
        }
    }

    /// Only city names are unique
    pub fn has_unique_name(&self) -> bool {
        matches!(self, ReferenceKind::City)
    }
}

/// A row of one of the lookup tables
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReferenceItem {
    pub id: Uuid,
    pub kind: ReferenceKind,
    pub name: String,
}

/// Input for creating a lookup row
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ReferenceInput {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
}

/// Record counts shown on the dashboard
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CatalogCounts {
    pub suppliers: u64,
    pub materials: u64,
    pub stores: u64,
}
