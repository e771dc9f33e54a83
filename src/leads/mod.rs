//! Lead domain: model and ingestion.

pub mod model;
pub mod parser;

pub use model::{Lead, LeadSource, LeadStatus};
pub use parser::CsvLeadParser;
