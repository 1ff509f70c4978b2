//! Business logic services for the Stock Back Office

pub mod catalog;
pub mod movement;
pub mod reporting;
pub mod stock;

pub use catalog::CatalogService;
pub use movement::MovementService;
pub use reporting::ReportingService;
pub use stock::StockService;
