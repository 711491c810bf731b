//! Configuration for the factory monitor and the simulation driver
//!
//! Both configs follow the same builder shape: `new()` gives the defaults,
//! `with_*` setters adjust single fields and `validate()` checks the result
//! before anything is run.

use log::warn;
use serde::{Deserialize, Serialize};

/// Initial state of a [`crate::core::monitor::FactoryMonitor`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactoryConfig {
    /// Whether the factory gate starts open
    pub factory_open: bool,
    /// Whether the returning service starts open
    pub returning_open: bool,
    /// Capacity reserved up front for the product queue
    pub initial_capacity: usize,
}

impl FactoryConfig {
    /// Both services open, room for 16 products
    pub fn new() -> Self {
        Self {
            factory_open: true,
            returning_open: true,
            initial_capacity: 16,
        }
    }

    /// Set whether the factory gate starts open
    pub fn with_factory_open(mut self, open: bool) -> Self {
        self.factory_open = open;
        self
    }

    /// Set whether the returning service starts open
    pub fn with_returning_open(mut self, open: bool) -> Self {
        self.returning_open = open;
        self
    }

    /// Set the capacity reserved for the product queue
    pub fn with_initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Sizes of one class of workers per round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrewConfig {
    pub count: u32,
    pub min_products: u32,
    pub max_products: u32,
}

impl CrewConfig {
    /// `count` workers, each wanting between `min_products` and `max_products`
    pub fn new(count: u32, min_products: u32, max_products: u32) -> Self {
        Self {
            count,
            min_products,
            max_products,
        }
    }
}

/// Configuration of a randomized multi-round run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub factory: FactoryConfig,
    pub rounds: u32,
    pub producers_per_round: u32,
    /// Mean of the Poisson distribution producer batch sizes are drawn from
    pub mean_batch_size: f64,
    pub min_value: i32,
    pub max_value: i32,
    pub companies: CrewConfig,
    /// Companies return every bought product worth less than this
    pub company_min_value: i32,
    pub thieves: CrewConfig,
    /// Non-blocking purchase attempts fired in parallel each round
    pub simple_buyer_probes: u32,
    /// Close both gates while the round's consumers start, reopen after
    pub cycle_gates: bool,
    pub random_seed: Option<u64>,
}

impl SimulationConfig {
    /// Create a configuration with the default workload
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overlaid with `RFACTORY_SEED` and `RFACTORY_ROUNDS`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("RFACTORY_SEED") {
            match raw.parse() {
                Ok(seed) => config.random_seed = Some(seed),
                Err(_) => warn!("RFACTORY_SEED '{}' is not a number, using default", raw),
            }
        }
        if let Ok(raw) = std::env::var("RFACTORY_ROUNDS") {
            match raw.parse() {
                Ok(rounds) => config.rounds = rounds,
                Err(_) => warn!("RFACTORY_ROUNDS '{}' is not a number, using default", raw),
            }
        }

        config
    }

    /// Set the initial gate states of the monitor
    pub fn with_factory(mut self, factory: FactoryConfig) -> Self {
        self.factory = factory;
        self
    }

    /// Set the number of produce-then-consume rounds
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds;
        self
    }

    /// Set the producers per round and their Poisson mean batch size
    pub fn with_producers(mut self, per_round: u32, mean_batch_size: f64) -> Self {
        self.producers_per_round = per_round;
        self.mean_batch_size = mean_batch_size;
        self
    }

    /// Set the inclusive range product values are drawn from
    pub fn with_value_range(mut self, min: i32, max: i32) -> Self {
        self.min_value = min;
        self.max_value = max;
        self
    }

    /// Set the company crew and the value below which they return products
    pub fn with_companies(mut self, companies: CrewConfig, min_value: i32) -> Self {
        self.companies = companies;
        self.company_min_value = min_value;
        self
    }

    /// Set the thief crew
    pub fn with_thieves(mut self, thieves: CrewConfig) -> Self {
        self.thieves = thieves;
        self
    }

    /// Set the number of `try_buy_one` attempts per round
    pub fn with_simple_buyer_probes(mut self, probes: u32) -> Self {
        self.simple_buyer_probes = probes;
        self
    }

    /// Close both gates while each round's consumers start
    pub fn with_gate_cycling(mut self, enabled: bool) -> Self {
        self.cycle_gates = enabled;
        self
    }

    /// Fix the RNG seed, or `None` to seed from entropy
    pub fn with_random_seed(mut self, seed: Option<u64>) -> Self {
        self.random_seed = seed;
        self
    }

    /// Check that the workload is runnable
    ///
    /// # Returns
    /// `Err` with a description of the first invalid setting
    pub fn validate(&self) -> Result<(), String> {
        if self.rounds == 0 {
            return Err("Rounds must be greater than 0".to_string());
        }

        if self.producers_per_round == 0 {
            return Err("At least one producer per round is required".to_string());
        }

        if self.mean_batch_size <= 0.0 || !self.mean_batch_size.is_finite() {
            return Err("Mean batch size must be a positive number".to_string());
        }

        if self.min_value > self.max_value {
            return Err("Min product value cannot be greater than max value".to_string());
        }

        for (name, crew) in [("company", &self.companies), ("thief", &self.thieves)] {
            if crew.min_products > crew.max_products {
                return Err(format!(
                    "Min {} order cannot be greater than max order",
                    name
                ));
            }
        }

        Ok(())
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            factory: FactoryConfig::default(),
            rounds: 5,
            producers_per_round: 4,
            mean_batch_size: 8.0,
            min_value: 1,
            max_value: 20,
            companies: CrewConfig::new(3, 1, 4),
            company_min_value: 10,
            thieves: CrewConfig::new(2, 1, 3),
            simple_buyer_probes: 16,
            cycle_gates: true,
            random_seed: Some(42),
        }
    }
}
