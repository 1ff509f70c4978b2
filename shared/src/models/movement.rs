//! Stock movement models

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ledger event type. Never changes once a movement is recorded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementType {
    /// Inbound to the depot: supplier delivery or return from a store
    Entree,
    /// Outbound from the depot toward a store
    Sortie,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Entree => "ENTREE",
            MovementType::Sortie => "SORTIE",
        }
    }

    /// Contribution sign to the central stock
    pub fn central_sign(&self) -> i64 {
        match self {
            MovementType::Entree => 1,
            MovementType::Sortie => -1,
        }
    }

    /// Contribution sign to a store balance, opposite to the central one
    pub fn store_sign(&self) -> i64 {
        -self.central_sign()
    }
}

impl fmt::Display for MovementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MovementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ENTREE" => Ok(MovementType::Entree),
            "SORTIE" => Ok(MovementType::Sortie),
            other => Err(format!("unknown movement type: {}", other)),
        }
    }
}

/// Where a movement happens, relative to the central depot
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Location {
    /// The depot itself (supplier replenishment)
    Central,
    /// A store on the other side of the movement
    Store { store_id: Uuid },
}

impl Location {
    pub fn from_store(store_id: Option<Uuid>) -> Self {
        match store_id {
            Some(store_id) => Location::Store { store_id },
            None => Location::Central,
        }
    }

    pub fn store_id(&self) -> Option<Uuid> {
        match self {
            Location::Central => None,
            Location::Store { store_id } => Some(*store_id),
        }
    }
}

/// What the operator wants to do; determines type and location
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MovementAction {
    /// Supplier delivery to the depot
    Replenish,
    /// Depot to store
    Dispatch,
    /// Store back to the depot
    Return,
}

impl MovementAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementAction::Replenish => "replenish",
            MovementAction::Dispatch => "dispatch",
            MovementAction::Return => "return",
        }
    }
}

impl fmt::Display for MovementAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded stock movement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Movement {
    pub id: Uuid,
    pub moved_at: DateTime<Utc>,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub material_id: Uuid,
    pub location: Location,
}

impl Movement {
    /// Signed effect of this movement on the material's central stock
    pub fn central_delta(&self) -> i64 {
        i64::from(self.quantity) * self.movement_type.central_sign()
    }
}

/// A movement about to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMovement {
    pub moved_at: DateTime<Utc>,
    pub movement_type: MovementType,
    pub quantity: i32,
    pub material_id: Uuid,
    pub location: Location,
}

impl NewMovement {
    pub fn into_movement(self, id: Uuid) -> Movement {
        Movement {
            id,
            moved_at: self.moved_at,
            movement_type: self.movement_type,
            quantity: self.quantity,
            material_id: self.material_id,
            location: self.location,
        }
    }
}

/// Movement with the labels needed by listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementDetail {
    #[serde(flatten)]
    pub movement: Movement,
    pub material_code: String,
    pub material_name: String,
    pub store_name: Option<String>,
}

/// Input for recording one movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMovementInput {
    pub action: MovementAction,
    pub material_id: Uuid,
    pub store_id: Option<Uuid>,
    pub quantity: i32,
    pub moved_at: Option<DateTime<Utc>>,
}

/// Input for recording several materials with one action and one store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkMovementInput {
    pub action: MovementAction,
    pub store_id: Option<Uuid>,
    /// Requested quantity per material
    pub quantities: BTreeMap<Uuid, i32>,
}

/// Correction of an existing movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditMovementInput {
    /// Must equal the recorded type
    pub movement_type: MovementType,
    pub quantity: i32,
    pub material_id: Uuid,
    pub store_id: Option<Uuid>,
    pub moved_at: Option<DateTime<Utc>>,
}

/// Filters for the movement listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MovementFilter {
    /// Free text over material name, store name and type; integers also
    /// match the quantity
    pub q: Option<String>,
    pub movement_type: Option<MovementType>,
    pub material_id: Option<Uuid>,
    pub store_id: Option<Uuid>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl MovementFilter {
    /// Lowercased search text, `None` when blank
    pub fn search_text(&self) -> Option<String> {
        self.q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_lowercase)
    }

    /// Quantity to match when the search text is an integer
    pub fn search_quantity(&self) -> Option<i32> {
        self.q.as_deref().and_then(|q| q.trim().parse().ok())
    }

    pub fn date_range(&self) -> crate::types::DateRange {
        crate::types::DateRange {
            start: self.date_from,
            end: self.date_to,
        }
    }
}

/// Central stock of one material
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CentralStock {
    pub material_id: Uuid,
    pub quantity: i64,
}

/// Derived stock of one material at one store. Not clamped.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreBalance {
    pub store_id: Uuid,
    pub material_id: Uuid,
    pub quantity: i64,
}

/// A (store, material) row of the store stock report
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreStockLine {
    pub store_id: Uuid,
    pub store_name: String,
    pub material_id: Uuid,
    pub material_code: String,
    pub material_name: String,
    pub description: Option<String>,
    pub quantity: i64,
}

/// Balances before and after a recorded movement
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BalanceChange {
    pub central_before: i64,
    pub central_after: i64,
    pub store_before: Option<i64>,
    pub store_after: Option<i64>,
}

/// Result of recording one movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MovementReceipt {
    pub movement: Movement,
    pub change: BalanceChange,
}

/// Result of recording a batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkMovementReceipt {
    pub action: MovementAction,
    pub movements: Vec<MovementReceipt>,
}

/// Central stock of one material before and after a correction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppliedAdjustment {
    pub material_id: Uuid,
    pub before: i64,
    pub after: i64,
}

/// Result of editing or deleting a movement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionReceipt {
    pub movement: Movement,
    pub adjustments: Vec<AppliedAdjustment>,
}

/// Cached central counter compared with the ledger recomputation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CentralReconciliation {
    pub material_id: Uuid,
    pub cached: i64,
    pub recomputed: i64,
    pub consistent: bool,
}

impl CentralReconciliation {
    pub fn new(material_id: Uuid, cached: i64, recomputed: i64) -> Self {
        Self {
            material_id,
            cached,
            recomputed,
            consistent: cached == recomputed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_movement_type_signs() {
        assert_eq!(MovementType::Entree.central_sign(), 1);
        assert_eq!(MovementType::Sortie.central_sign(), -1);
        assert_eq!(MovementType::Entree.store_sign(), -1);
        assert_eq!(MovementType::Sortie.store_sign(), 1);
    }

    #[test]
    fn test_movement_type_parsing() {
        assert_eq!("ENTREE".parse::<MovementType>(), Ok(MovementType::Entree));
        assert_eq!("sortie".parse::<MovementType>(), Ok(MovementType::Sortie));
        assert!("TRANSFER".parse::<MovementType>().is_err());
    }

    #[test]
    fn test_movement_type_wire_format() {
        let json = serde_json::to_string(&MovementType::Sortie).unwrap();
        assert_eq!(json, "\"SORTIE\"");
    }

    #[test]
    fn test_location_is_tagged() {
        let store_id = Uuid::new_v4();
        let json = serde_json::to_value(Location::Store { store_id }).unwrap();
        assert_eq!(json["kind"], "store");
        assert_eq!(json["store_id"], store_id.to_string());

        let json = serde_json::to_value(Location::Central).unwrap();
        assert_eq!(json["kind"], "central");
    }

    #[test]
    fn test_location_from_optional_store() {
        let store_id = Uuid::new_v4();
        assert_eq!(Location::from_store(None), Location::Central);
        assert_eq!(
            Location::from_store(Some(store_id)).store_id(),
            Some(store_id)
        );
    }

    #[test]
    fn test_central_delta() {
        let mut movement = Movement {
            id: Uuid::new_v4(),
            moved_at: Utc::now(),
            movement_type: MovementType::Entree,
            quantity: 7,
            material_id: Uuid::new_v4(),
            location: Location::Central,
        };
        assert_eq!(movement.central_delta(), 7);

        movement.movement_type = MovementType::Sortie;
        assert_eq!(movement.central_delta(), -7);
    }

    #[test]
    fn test_filter_search_text() {
        let filter = MovementFilter {
            q: Some("  Souris ".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.search_text().as_deref(), Some("souris"));
        assert_eq!(filter.search_quantity(), None);

        let filter = MovementFilter {
            q: Some("12".to_string()),
            ..Default::default()
        };
        assert_eq!(filter.search_quantity(), Some(12));

        let blank = MovementFilter {
            q: Some("   ".to_string()),
            ..Default::default()
        };
        assert_eq!(blank.search_text(), None);
    }

    #[test]
    fn test_reconciliation_flags_drift() {
        let id = Uuid::new_v4();
        assert!(CentralReconciliation::new(id, 4, 4).consistent);
        assert!(!CentralReconciliation::new(id, 4, 5).consistent);
    }
}
