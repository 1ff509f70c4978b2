//! Movement service: records, corrects and removes stock movements
//!
//! Every write runs in one ledger transaction. The central counter of each
//! touched material is locked before any balance is read, and materials are
//! locked in ascending id order.

use std::sync::Arc;

use chrono::Utc;
use shared::ledger::{self, CentralAdjustment, ResolvedLine};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{
    AppliedAdjustment, BalanceChange, BulkMovementInput, BulkMovementReceipt, CorrectionReceipt,
    CreateMovementInput, EditMovementInput, MovementDetail, MovementFilter, MovementReceipt,
    PaginatedResponse, Pagination,
};
use crate::repositories::{LedgerRepository, LedgerTransaction};

/// Movement service for the stock ledger
#[derive(Clone)]
pub struct MovementService {
    ledger: Arc<dyn LedgerRepository>,
}

impl MovementService {
    pub fn new(ledger: Arc<dyn LedgerRepository>) -> Self {
        Self { ledger }
    }

    /// Record one movement
    pub async fn create(&self, input: CreateMovementInput) -> AppResult<MovementReceipt> {
        let moved_at = input.moved_at.unwrap_or_else(Utc::now);
        let line = ledger::resolve_line(input.action, input.material_id, input.store_id, input.quantity)
            .map_err(|e| rejected(e.into()))?;

        let mut tx = self.ledger.begin().await?;
        let receipt = apply_line(tx.as_mut(), &line, moved_at)
            .await
            .map_err(rejected)?;
        tx.commit().await?;

        log_recorded(&line, &receipt);
        Ok(receipt)
    }

    /// Record several materials with one action and one store, all or nothing
    pub async fn create_bulk(&self, input: BulkMovementInput) -> AppResult<BulkMovementReceipt> {
        if input.quantities.is_empty() {
            return Err(AppError::validation(
                "quantities",
                "At least one material quantity is required",
                "Au moins une quantité de matériel est requise",
            ));
        }

        let moved_at = Utc::now();
        let mut tx = self.ledger.begin().await?;
        let mut lines = Vec::with_capacity(input.quantities.len());
        let mut movements = Vec::with_capacity(input.quantities.len());

        // BTreeMap order is the lock order
        for (&material_id, &quantity) in &input.quantities {
            let outcome = match ledger::resolve_line(input.action, material_id, input.store_id, quantity) {
                Ok(line) => apply_line(tx.as_mut(), &line, moved_at).await.map(|r| (line, r)),
                Err(violation) => Err(violation.into()),
            };

            match outcome {
                Ok((line, receipt)) => {
                    lines.push(line);
                    movements.push(receipt);
                }
                Err(err) if err.is_client_error() => {
                    tracing::warn!(
                        "Bulk {} rejected at material {}: {}",
                        input.action,
                        material_id,
                        err
                    );
                    return Err(AppError::BatchLineRejected {
                        material_id,
                        source: Box::new(err),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        tx.commit().await?;

        for (line, receipt) in lines.iter().zip(&movements) {
            log_recorded(line, receipt);
        }
        Ok(BulkMovementReceipt {
            action: input.action,
            movements,
        })
    }

    /// Correct quantity, material, location or date of a movement. The type
    /// never changes.
    pub async fn edit(&self, id: Uuid, input: EditMovementInput) -> AppResult<CorrectionReceipt> {
        let mut tx = self.ledger.begin().await?;

        let prior = tx
            .movement_for_update(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Movement".to_string()))?;

        let plan = ledger::plan_edit(&prior, &input).map_err(|e| rejected(e.into()))?;

        if !tx.material_exists(plan.material_id).await? {
            return Err(AppError::NotFound("Material".to_string()));
        }
        if let Some(store_id) = plan.location.store_id() {
            if !tx.store_exists(store_id).await? {
                return Err(AppError::NotFound("Store".to_string()));
            }
        }

        let adjustments = apply_adjustments(tx.as_mut(), &plan.adjustments)
            .await
            .map_err(rejected)?;

        let mut movement = prior.clone();
        movement.quantity = plan.quantity;
        movement.material_id = plan.material_id;
        movement.location = plan.location;
        if let Some(moved_at) = input.moved_at {
            movement.moved_at = moved_at;
        }
        tx.update_movement(&movement).await?;
        tx.commit().await?;

        tracing::info!(
            "Movement {} corrected: {} {} x{} -> material {} x{} ({:?})",
            id,
            prior.movement_type,
            prior.material_id,
            prior.quantity,
            movement.material_id,
            movement.quantity,
            adjustments
        );
        Ok(CorrectionReceipt {
            movement,
            adjustments,
        })
    }

    /// Remove a movement and reverse its effect on central stock
    pub async fn delete(&self, id: Uuid) -> AppResult<CorrectionReceipt> {
        let mut tx = self.ledger.begin().await?;

        let movement = tx
            .movement_for_update(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Movement".to_string()))?;

        let adjustments = apply_adjustments(tx.as_mut(), &[ledger::plan_delete(&movement)])
            .await
            .map_err(rejected)?;

        tx.delete_movement(id).await?;
        tx.commit().await?;

        tracing::info!(
            "Movement {} deleted: {} {} x{} ({:?})",
            id,
            movement.movement_type,
            movement.material_id,
            movement.quantity,
            adjustments
        );
        Ok(CorrectionReceipt {
            movement,
            adjustments,
        })
    }

    pub async fn get(&self, id: Uuid) -> AppResult<MovementDetail> {
        self.ledger
            .get_movement(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Movement".to_string()))
    }

    /// Newest first
    pub async fn list(
        &self,
        filter: &MovementFilter,
        page: Pagination,
    ) -> AppResult<PaginatedResponse<MovementDetail>> {
        shared::validate_date_range(filter.date_from, filter.date_to).map_err(|msg| {
            AppError::validation(
                "date_from",
                msg,
                "La date de début doit précéder la date de fin",
            )
        })?;
        let (items, total) = self.ledger.list_movements(filter, page).await?;
        Ok(PaginatedResponse::new(items, page, total))
    }
}

/// Check one resolved line against locked balances, then persist it
async fn apply_line(
    tx: &mut dyn LedgerTransaction,
    line: &ResolvedLine,
    moved_at: chrono::DateTime<Utc>,
) -> AppResult<MovementReceipt> {
    if !tx.material_exists(line.material_id).await? {
        return Err(AppError::NotFound("Material".to_string()));
    }
    if let Some(store_id) = line.store_id() {
        if !tx.store_exists(store_id).await? {
            return Err(AppError::NotFound("Store".to_string()));
        }
    }

    let central_before = tx.ensure_central_stock(line.material_id).await?;
    let store_before = match line.store_id() {
        Some(store_id) => Some(tx.store_balance(store_id, line.material_id).await?),
        None => None,
    };

    let change = line.check(central_before, store_before)?;

    let movement = tx.insert_movement(&line.to_new_movement(moved_at)).await?;
    let central_after = tx
        .apply_central_delta(line.material_id, line.central_delta())
        .await?;

    Ok(MovementReceipt {
        movement,
        change: BalanceChange {
            central_after,
            ..change
        },
    })
}

/// Lock, check and apply central adjustments in the given (ascending) order
async fn apply_adjustments(
    tx: &mut dyn LedgerTransaction,
    adjustments: &[CentralAdjustment],
) -> AppResult<Vec<AppliedAdjustment>> {
    let mut applied = Vec::with_capacity(adjustments.len());
    for adjustment in adjustments {
        let before = tx.ensure_central_stock(adjustment.material_id).await?;
        adjustment.apply_to(before)?;
        let after = if adjustment.delta == 0 {
            before
        } else {
            tx.apply_central_delta(adjustment.material_id, adjustment.delta)
                .await?
        };
        applied.push(AppliedAdjustment {
            material_id: adjustment.material_id,
            before,
            after,
        });
    }
    Ok(applied)
}

fn rejected(err: AppError) -> AppError {
    if err.is_client_error() {
        tracing::warn!("Movement rejected: {}", err);
    }
    err
}

fn log_recorded(line: &ResolvedLine, receipt: &MovementReceipt) {
    let change = &receipt.change;
    tracing::info!(
        "Movement {} recorded: {} {} material {} store {:?} qty {} central {} -> {} store {:?} -> {:?}",
        receipt.movement.id,
        line.action,
        line.movement_type,
        line.material_id,
        line.store_id(),
        line.quantity,
        change.central_before,
        change.central_after,
        change.store_before,
        change.store_after
    );
}
