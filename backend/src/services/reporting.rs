//! Reporting service for the dashboard and data export

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{CatalogCounts, MaterialDetail, MaterialFlow};
use crate::repositories::{CatalogRepository, LedgerRepository};

/// Group label for materials without a supplier
pub const NO_SUPPLIER: &str = "—";

/// Reporting service for dashboard metrics
#[derive(Clone)]
pub struct ReportingService {
    catalog: Arc<dyn CatalogRepository>,
    ledger: Arc<dyn LedgerRepository>,
}

/// Stock and outbound figures of one material
#[derive(Debug, Clone, Serialize)]
pub struct MaterialStockLine {
    pub material_id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub supplier_name: Option<String>,
    pub central_quantity: i64,
    pub unit_price: Decimal,
    /// central_quantity × unit_price
    pub stock_value: Decimal,
    /// Store-bound SORTIE net of store returns, never negative
    pub outbound_quantity: i64,
    pub outbound_value: Decimal,
}

/// Figures aggregated per supplier
#[derive(Debug, Clone, Serialize)]
pub struct SupplierStockSummary {
    pub supplier_name: String,
    pub stock_quantity: i64,
    pub stock_value: Decimal,
    pub outbound_quantity: i64,
    pub outbound_value: Decimal,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DashboardTotals {
    pub stock_value: Decimal,
    pub outbound_value: Decimal,
}

/// Dashboard metrics
#[derive(Debug, Clone, Serialize)]
pub struct DashboardMetrics {
    pub counts: CatalogCounts,
    pub movement_count: u64,
    pub materials: Vec<MaterialStockLine>,
    pub suppliers: Vec<SupplierStockSummary>,
    pub totals: DashboardTotals,
}

impl MaterialStockLine {
    fn new(detail: MaterialDetail, flow: Option<&MaterialFlow>) -> Self {
        let outbound_quantity = flow.map(MaterialFlow::net_outbound).unwrap_or(0);
        let unit_price = detail.material.unit_price;
        Self {
            material_id: detail.material.id,
            code: detail.material.code,
            name: detail.material.name,
            description: detail.material.description,
            supplier_name: detail.supplier_name,
            central_quantity: detail.central_quantity,
            unit_price,
            stock_value: Decimal::from(detail.central_quantity) * unit_price,
            outbound_quantity,
            outbound_value: Decimal::from(outbound_quantity) * unit_price,
        }
    }
}

/// Aggregate material lines per supplier, in order of first appearance
pub fn summarize_by_supplier(lines: &[MaterialStockLine]) -> (Vec<SupplierStockSummary>, DashboardTotals) {
    let mut summaries: Vec<SupplierStockSummary> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut totals = DashboardTotals::default();

    for line in lines {
        let name = line
            .supplier_name
            .clone()
            .unwrap_or_else(|| NO_SUPPLIER.to_string());
        let slot = *index.entry(name.clone()).or_insert_with(|| {
            summaries.push(SupplierStockSummary {
                supplier_name: name,
                stock_quantity: 0,
                stock_value: Decimal::ZERO,
                outbound_quantity: 0,
                outbound_value: Decimal::ZERO,
            });
            summaries.len() - 1
        });

        let summary = &mut summaries[slot];
        summary.stock_quantity += line.central_quantity;
        summary.stock_value += line.stock_value;
        summary.outbound_quantity += line.outbound_quantity;
        summary.outbound_value += line.outbound_value;

        totals.stock_value += line.stock_value;
        totals.outbound_value += line.outbound_value;
    }

    (summaries, totals)
}

impl ReportingService {
    pub fn new(catalog: Arc<dyn CatalogRepository>, ledger: Arc<dyn LedgerRepository>) -> Self {
        Self { catalog, ledger }
    }

    /// Get dashboard metrics
    pub async fn get_dashboard_metrics(&self) -> AppResult<DashboardMetrics> {
        let counts = self.catalog.counts().await?;
        let movement_count = self.ledger.count_movements().await?;
        let materials = self.catalog.all_materials().await?;
        let flows: HashMap<Uuid, MaterialFlow> = self
            .ledger
            .material_flows()
            .await?
            .into_iter()
            .map(|f| (f.material_id, f))
            .collect();

        let lines: Vec<MaterialStockLine> = materials
            .into_iter()
            .map(|m| {
                let flow = flows.get(&m.material.id);
                MaterialStockLine::new(m, flow)
            })
            .collect();
        let (suppliers, totals) = summarize_by_supplier(&lines);

        Ok(DashboardMetrics {
            counts,
            movement_count,
            materials: lines,
            suppliers,
            totals,
        })
    }

    /// Export data to CSV format
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record).map_err(|e| {
                crate::error::AppError::Internal(format!("CSV serialization error: {}", e))
            })?;
        }
        let csv_data = String::from_utf8(wtr.into_inner().map_err(|e| {
            crate::error::AppError::Internal(format!("CSV writer error: {}", e))
        })?)
        .map_err(|e| crate::error::AppError::Internal(format!("UTF-8 conversion error: {}", e)))?;
        Ok(csv_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Material;

    fn detail(name: &str, supplier: Option<&str>, quantity: i64, price: i64) -> MaterialDetail {
        MaterialDetail {
            material: Material {
                id: Uuid::new_v4(),
                code: name.to_uppercase(),
                name: name.to_string(),
                description: None,
                unit_price: Decimal::from(price),
                supplier_id: None,
            },
            supplier_name: supplier.map(str::to_string),
            central_quantity: quantity,
        }
    }

    #[test]
    fn test_material_line_values() {
        let d = detail("souris", Some("Logitech"), 4, 10);
        let flow = MaterialFlow {
            material_id: d.material.id,
            store_sorties: 7,
            store_returns: 2,
        };
        let line = MaterialStockLine::new(d, Some(&flow));
        assert_eq!(line.stock_value, Decimal::from(40));
        assert_eq!(line.outbound_quantity, 5);
        assert_eq!(line.outbound_value, Decimal::from(50));
    }

    #[test]
    fn test_outbound_is_never_negative() {
        let d = detail("clavier", None, 0, 10);
        let flow = MaterialFlow {
            material_id: d.material.id,
            store_sorties: 1,
            store_returns: 3,
        };
        let line = MaterialStockLine::new(d, Some(&flow));
        assert_eq!(line.outbound_quantity, 0);
        assert_eq!(line.outbound_value, Decimal::ZERO);
    }

    #[test]
    fn test_supplier_grouping_and_totals() {
        let lines: Vec<MaterialStockLine> = vec![
            MaterialStockLine::new(detail("a", Some("Cisco"), 2, 5), None),
            MaterialStockLine::new(detail("b", None, 1, 3), None),
            MaterialStockLine::new(detail("c", Some("Cisco"), 3, 1), None),
        ];
        let (suppliers, totals) = summarize_by_supplier(&lines);

        assert_eq!(suppliers.len(), 2);
        assert_eq!(suppliers[0].supplier_name, "Cisco");
        assert_eq!(suppliers[0].stock_quantity, 5);
        assert_eq!(suppliers[0].stock_value, Decimal::from(13));
        assert_eq!(suppliers[1].supplier_name, NO_SUPPLIER);
        assert_eq!(totals.stock_value, Decimal::from(16));
    }

    #[test]
    fn test_export_to_csv_has_header() {
        let lines = vec![MaterialStockLine::new(detail("souris", Some("Logitech"), 4, 10), None)];
        let csv = ReportingService::export_to_csv(&lines).unwrap();
        let mut rows = csv.lines();
        assert!(rows.next().unwrap().starts_with("material_id,code,name"));
        assert!(rows.next().unwrap().contains("souris"));
    }
}
