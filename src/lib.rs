pub mod core;

// Re-export commonly used types
pub use crate::core::errors::{FactoryError, Role};
pub use crate::core::execution::{FactoryConfig, SimulationConfig, WorkerRegistry};
pub use crate::core::gates::GateFlags;
pub use crate::core::monitor::{FactoryMonitor, MonitorStats, ThiefPass};
pub use crate::core::product::{Product, ProductId, WorkerId};
pub use crate::core::theft_ledger::TheftRecord;
