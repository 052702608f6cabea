pub mod database;
pub mod memory;
pub mod metrics;
pub mod pricing;
pub mod quote_workflow;
pub mod store;

pub use database::Database;
pub use memory::MemoryStore;
pub use metrics::{get_metrics, init_metrics};
pub use store::Store;
