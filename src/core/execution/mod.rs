pub mod config;
pub mod simulation;
pub mod workers;

pub use config::{CrewConfig, FactoryConfig, SimulationConfig};
pub use simulation::{Simulation, SimulationReport};
pub use workers::WorkerRegistry;
