//! Domain types for HistLab

pub mod record;
pub mod table;

pub use record::{AggregateRecord, AggregateResponse, FinancialsRecord, VolatilityPoint};
pub use table::{Table, TableColumn};
