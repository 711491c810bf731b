use super::product::WorkerId;

/// Worker role, used to tag orchestration errors and thread names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Producer,
    SimpleBuyer,
    CompanyBuyer,
    Thief,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Role::Producer => "producer",
            Role::SimpleBuyer => "simple-buyer",
            Role::CompanyBuyer => "company",
            Role::Thief => "thief",
        };
        f.write_str(name)
    }
}

/// Errors raised around the monitor: worker bookkeeping, config and simulation checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactoryError {
    /// A worker with this id is still registered for the role
    DuplicateWorker(Role, WorkerId),
    /// No worker with this id was started for the role
    UnknownWorker(Role, WorkerId),
    /// The worker's thread panicked before producing a result
    WorkerPanicked(Role, WorkerId),
    /// The OS refused to spawn the worker's thread
    SpawnFailed(Role, WorkerId, String),
    InvalidConfig(String),
    /// Product conservation did not hold after a simulation round
    InvariantViolated(String),
}

impl std::fmt::Display for FactoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactoryError::DuplicateWorker(role, id) => {
                write!(f, "{} {} is already running", role, id)
            }
            FactoryError::UnknownWorker(role, id) => {
                write!(f, "{} {} was never started", role, id)
            }
            FactoryError::WorkerPanicked(role, id) => write!(f, "{} {} panicked", role, id),
            FactoryError::SpawnFailed(role, id, msg) => {
                write!(f, "failed to spawn {} {}: {}", role, id, msg)
            }
            FactoryError::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            FactoryError::InvariantViolated(msg) => write!(f, "Invariant violated: {}", msg),
        }
    }
}

impl std::error::Error for FactoryError {}
