pub mod harvest;

pub use harvest::{HarvestConfig, ReportSettings};
