//! Models for the Stock Back Office
//!
//! Re-exports models from the shared crate and adds backend-specific models

use uuid::Uuid;

pub use shared::models::*;
pub use shared::types::*;

/// Store-bound flow totals of one material
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterialFlow {
    pub material_id: Uuid,
    /// Σ SORTIE toward stores
    pub store_sorties: i64,
    /// Σ ENTREE coming back from stores
    pub store_returns: i64,
}

impl MaterialFlow {
    pub fn net_outbound(&self) -> i64 {
        shared::ledger::net_outbound(self.store_sorties, self.store_returns)
    }
}
