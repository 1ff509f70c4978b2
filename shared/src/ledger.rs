//! Stock ledger rules
//!
//! Pure functions shared by every write path: single and bulk creation go
//! through [`resolve_line`] and [`ResolvedLine::check`], edits and deletions
//! through [`plan_edit`], [`plan_delete`] and [`CentralAdjustment::apply_to`].
//! Callers fetch the balances under lock and persist the outcome.

use std::collections::BTreeMap;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    BalanceChange, EditMovementInput, Location, Movement, MovementAction, MovementType,
    NewMovement,
};

/// Business rule violations. All are recoverable; nothing is persisted
/// when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerViolation {
    #[error("Quantity must be greater than zero (got {quantity})")]
    InvalidQuantity { quantity: i32 },

    #[error("A store is required to {action}")]
    StoreRequired { action: &'static str },

    #[error("Insufficient central stock for material {material_id}: {available} available, {requested} requested")]
    InsufficientCentralStock {
        material_id: Uuid,
        available: i64,
        requested: i64,
    },

    #[error("Insufficient store stock for material {material_id} at store {store_id}: {available} available, {requested} requested")]
    InsufficientStoreStock {
        store_id: Uuid,
        material_id: Uuid,
        available: i64,
        requested: i64,
    },

    #[error("Movement type cannot change from {recorded} to {submitted}")]
    ImmutableTypeViolation {
        recorded: MovementType,
        submitted: MovementType,
    },
}

/// A line item whose type and location are settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLine {
    pub action: MovementAction,
    pub material_id: Uuid,
    pub movement_type: MovementType,
    pub location: Location,
    pub quantity: i32,
}

/// Validate quantity, derive the movement type and check the store
/// requirement. A store given with `Replenish` is dropped.
pub fn resolve_line(
    action: MovementAction,
    material_id: Uuid,
    store_id: Option<Uuid>,
    quantity: i32,
) -> Result<ResolvedLine, LedgerViolation> {
    if quantity <= 0 {
        return Err(LedgerViolation::InvalidQuantity { quantity });
    }

    let (movement_type, location) = match action {
        MovementAction::Replenish => (MovementType::Entree, Location::Central),
        MovementAction::Dispatch | MovementAction::Return => {
            let store_id = store_id.ok_or(LedgerViolation::StoreRequired {
                action: action.as_str(),
            })?;
            let movement_type = if action == MovementAction::Dispatch {
                MovementType::Sortie
            } else {
                MovementType::Entree
            };
            (movement_type, Location::Store { store_id })
        }
    };

    Ok(ResolvedLine {
        action,
        material_id,
        movement_type,
        location,
        quantity,
    })
}

impl ResolvedLine {
    pub fn central_delta(&self) -> i64 {
        i64::from(self.quantity) * self.movement_type.central_sign()
    }

    /// Store whose derived balance must be read before [`Self::check`]
    pub fn store_id(&self) -> Option<Uuid> {
        self.location.store_id()
    }

    /// Check the line against the locked central quantity and, for
    /// store-bound lines, the current store balance.
    ///
    /// The store-side bound applies to `Return` only: goods leave the store.
    pub fn check(
        &self,
        central_before: i64,
        store_before: Option<i64>,
    ) -> Result<BalanceChange, LedgerViolation> {
        let requested = i64::from(self.quantity);

        if self.action == MovementAction::Return {
            let available = store_before.unwrap_or(0);
            if available < requested {
                return Err(LedgerViolation::InsufficientStoreStock {
                    store_id: self.store_id().unwrap_or_default(),
                    material_id: self.material_id,
                    available,
                    requested,
                });
            }
        }

        let central_after = central_before + self.central_delta();
        if self.movement_type == MovementType::Sortie && central_after < 0 {
            return Err(LedgerViolation::InsufficientCentralStock {
                material_id: self.material_id,
                available: central_before,
                requested,
            });
        }

        let store_after =
            store_before.map(|before| before + requested * self.movement_type.store_sign());

        Ok(BalanceChange {
            central_before,
            central_after,
            store_before,
            store_after,
        })
    }

    pub fn to_new_movement(&self, moved_at: chrono::DateTime<chrono::Utc>) -> NewMovement {
        NewMovement {
            moved_at,
            movement_type: self.movement_type,
            quantity: self.quantity,
            material_id: self.material_id,
            location: self.location,
        }
    }
}

/// Signed change to one material's central stock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CentralAdjustment {
    pub material_id: Uuid,
    pub delta: i64,
}

impl CentralAdjustment {
    /// New central quantity, refusing to go below zero
    pub fn apply_to(&self, current: i64) -> Result<i64, LedgerViolation> {
        let after = current + self.delta;
        if after < 0 {
            return Err(LedgerViolation::InsufficientCentralStock {
                material_id: self.material_id,
                available: current,
                requested: -self.delta,
            });
        }
        Ok(after)
    }
}

/// Compensating adjustments for a corrected movement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditPlan {
    pub movement_type: MovementType,
    pub quantity: i32,
    pub material_id: Uuid,
    pub location: Location,
    /// Sorted by material id, which is also the lock order
    pub adjustments: Vec<CentralAdjustment>,
}

/// Validate a correction and compute the central stock adjustments.
///
/// The type check comes first so a type change is rejected whatever the
/// other fields contain.
pub fn plan_edit(prior: &Movement, input: &EditMovementInput) -> Result<EditPlan, LedgerViolation> {
    if input.movement_type != prior.movement_type {
        return Err(LedgerViolation::ImmutableTypeViolation {
            recorded: prior.movement_type,
            submitted: input.movement_type,
        });
    }
    if input.quantity <= 0 {
        return Err(LedgerViolation::InvalidQuantity {
            quantity: input.quantity,
        });
    }
    if input.movement_type == MovementType::Sortie && input.store_id.is_none() {
        return Err(LedgerViolation::StoreRequired {
            action: MovementAction::Dispatch.as_str(),
        });
    }

    let delta_old = prior.central_delta();
    let delta_new = i64::from(input.quantity) * input.movement_type.central_sign();

    let mut adjustments = if prior.material_id == input.material_id {
        vec![CentralAdjustment {
            material_id: input.material_id,
            delta: delta_new - delta_old,
        }]
    } else {
        vec![
            CentralAdjustment {
                material_id: prior.material_id,
                delta: -delta_old,
            },
            CentralAdjustment {
                material_id: input.material_id,
                delta: delta_new,
            },
        ]
    };
    adjustments.sort_by_key(|a| a.material_id);

    Ok(EditPlan {
        movement_type: input.movement_type,
        quantity: input.quantity,
        material_id: input.material_id,
        location: Location::from_store(input.store_id),
        adjustments,
    })
}

/// Adjustment reversing a movement that is being deleted
pub fn plan_delete(movement: &Movement) -> CentralAdjustment {
    CentralAdjustment {
        material_id: movement.material_id,
        delta: -movement.central_delta(),
    }
}

/// Central stock of one material recomputed from the ledger
pub fn ledger_central_total<'a>(
    movements: impl IntoIterator<Item = &'a Movement>,
    material_id: Uuid,
) -> i64 {
    movements
        .into_iter()
        .filter(|m| m.material_id == material_id)
        .map(Movement::central_delta)
        .sum()
}

/// Store balances per (store, material), unclamped. Central movements do
/// not contribute.
pub fn project_store_balances<'a>(
    movements: impl IntoIterator<Item = &'a Movement>,
) -> BTreeMap<(Uuid, Uuid), i64> {
    let mut balances = BTreeMap::new();
    for movement in movements {
        if let Location::Store { store_id } = movement.location {
            *balances.entry((store_id, movement.material_id)).or_insert(0) +=
                i64::from(movement.quantity) * movement.movement_type.store_sign();
        }
    }
    balances
}

/// Keep only the pairs a store actually holds
pub fn positive_balances(balances: BTreeMap<(Uuid, Uuid), i64>) -> BTreeMap<(Uuid, Uuid), i64> {
    balances.into_iter().filter(|(_, qty)| *qty > 0).collect()
}

/// Net quantity that left the depot toward stores, never negative
pub fn net_outbound(store_sorties: i64, store_returns: i64) -> i64 {
    (store_sorties - store_returns).max(0)
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn action_strategy() -> impl Strategy<Value = MovementAction> {
        prop_oneof![
            Just(MovementAction::Replenish),
            Just(MovementAction::Dispatch),
            Just(MovementAction::Return),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Replaying accepted lines keeps central stock non-negative and
        /// equal to the ledger total.
        #[test]
        fn prop_accepted_lines_keep_central_consistent(
            ops in prop::collection::vec((action_strategy(), 0usize..2, 1i32..50), 1..60)
        ) {
            let material = Uuid::new_v4();
            let stores = [Uuid::new_v4(), Uuid::new_v4()];
            let mut central = 0i64;
            let mut ledger: Vec<Movement> = Vec::new();

            for (action, store_idx, qty) in ops {
                let line = resolve_line(action, material, Some(stores[store_idx]), qty).unwrap();
                let store_before = line
                    .store_id()
                    .map(|s| project_store_balances(&ledger).get(&(s, material)).copied().unwrap_or(0));

                if let Ok(change) = line.check(central, store_before) {
                    prop_assert_eq!(change.central_before, central);
                    central = change.central_after;
                    ledger.push(line.to_new_movement(Utc::now()).into_movement(Uuid::new_v4()));
                }

                prop_assert!(central >= 0);
                prop_assert_eq!(central, ledger_central_total(&ledger, material));
            }
        }

        /// Returns are only accepted up to what the store holds, so balances
        /// built from accepted lines never go negative.
        #[test]
        fn prop_accepted_returns_keep_store_balance_non_negative(
            ops in prop::collection::vec((action_strategy(), 1i32..30), 1..60)
        ) {
            let material = Uuid::new_v4();
            let store = Uuid::new_v4();
            let mut central = 0i64;
            let mut ledger: Vec<Movement> = Vec::new();

            for (action, qty) in ops {
                let line = resolve_line(action, material, Some(store), qty).unwrap();
                let store_before = line
                    .store_id()
                    .map(|s| project_store_balances(&ledger).get(&(s, material)).copied().unwrap_or(0));
                if let Ok(change) = line.check(central, store_before) {
                    central = change.central_after;
                    ledger.push(line.to_new_movement(Utc::now()).into_movement(Uuid::new_v4()));
                }
                let balance = project_store_balances(&ledger).get(&(store, material)).copied().unwrap_or(0);
                prop_assert!(balance >= 0);
            }
        }

        /// Deleting a movement reverses exactly its contribution
        #[test]
        fn prop_delete_reverses_contribution(qty in 1i32..1000, sortie in any::<bool>()) {
            let movement = Movement {
                id: Uuid::new_v4(),
                moved_at: Utc::now(),
                movement_type: if sortie { MovementType::Sortie } else { MovementType::Entree },
                quantity: qty,
                material_id: Uuid::new_v4(),
                location: Location::Store { store_id: Uuid::new_v4() },
            };
            prop_assert_eq!(plan_delete(&movement).delta + movement.central_delta(), 0);
        }

        /// An edit's adjustments sum to the change in ledger contribution
        #[test]
        fn prop_edit_adjustments_match_ledger(
            old_qty in 1i32..1000,
            new_qty in 1i32..1000,
            same_material in any::<bool>(),
        ) {
            let prior = Movement {
                id: Uuid::new_v4(),
                moved_at: Utc::now(),
                movement_type: MovementType::Entree,
                quantity: old_qty,
                material_id: Uuid::new_v4(),
                location: Location::Central,
            };
            let material_id = if same_material { prior.material_id } else { Uuid::new_v4() };
            let input = EditMovementInput {
                movement_type: MovementType::Entree,
                quantity: new_qty,
                material_id,
                store_id: None,
                moved_at: None,
            };
            let plan = plan_edit(&prior, &input).unwrap();
            let total: i64 = plan.adjustments.iter().map(|a| a.delta).sum();
            prop_assert_eq!(total, i64::from(new_qty) - i64::from(old_qty));
        }
    }
}
