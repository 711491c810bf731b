use super::config::SimulationConfig;
use super::workers::WorkerRegistry;
use crate::core::errors::FactoryError;
use crate::core::monitor::FactoryMonitor;
use crate::core::product::{Product, ProductId, WorkerId};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Poisson};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Totals collected over a simulation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub run_id: String,
    pub rounds: u32,
    pub produced: usize,
    pub simple_bought: usize,
    pub company_bought: usize,
    pub returned: usize,
    pub stolen: usize,
    pub available: usize,
    pub ledger_entries: usize,
}

impl SimulationReport {
    /// Stock implied by the totals: produced + returned - bought - stolen
    pub fn expected_available(&self) -> Option<usize> {
        (self.produced + self.returned)
            .checked_sub(self.simple_bought + self.company_bought + self.stolen)
    }
}

/// Demands handed to the consumers of one round
struct RoundPlan {
    thieves: Vec<usize>,
    companies: Vec<usize>,
    probes: usize,
}

/// Randomized multi-round workload over a single factory monitor
///
/// Every round produces stock, then lets thieves, companies and simple
/// buyers compete for it. Demands are sized against the stock of the round
/// so every blocking worker is guaranteed to finish.
pub struct Simulation {
    config: SimulationConfig,
    registry: WorkerRegistry,
    rng: StdRng,
    batch_sizes: Poisson<f64>,
    next_product_id: ProductId,
    report: SimulationReport,
}

impl Simulation {
    /// Validate `config` and build a fresh monitor for the run
    pub fn new(config: SimulationConfig) -> Result<Self, FactoryError> {
        config.validate().map_err(FactoryError::InvalidConfig)?;
        let batch_sizes = Poisson::new(config.mean_batch_size)
            .map_err(|e| FactoryError::InvalidConfig(e.to_string()))?;

        let rng = match config.random_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let monitor = Arc::new(FactoryMonitor::with_config(&config.factory));

        Ok(Self {
            registry: WorkerRegistry::new(monitor),
            rng,
            batch_sizes,
            next_product_id: 0,
            report: SimulationReport {
                run_id: Uuid::new_v4().to_string(),
                ..SimulationReport::default()
            },
            config,
        })
    }

    /// The monitor the run operates on
    pub fn monitor(&self) -> &Arc<FactoryMonitor> {
        self.registry.monitor()
    }

    /// Run every configured round and return the totals
    pub fn run(mut self) -> Result<SimulationReport, FactoryError> {
        info!(
            "[Simulation:{}] starting {} rounds",
            self.report.run_id, self.config.rounds
        );

        for round in 0..self.config.rounds {
            self.run_round(round)?;
        }

        info!(
            "[Simulation:{}] done: produced {}, available {}, stolen {}",
            self.report.run_id, self.report.produced, self.report.available, self.report.stolen
        );
        Ok(self.report)
    }

    fn run_round(&mut self, round: u32) -> Result<(), FactoryError> {
        self.produce_round()?;

        let stock = self.monitor().list_available_products().len();
        let plan = self.plan_round(stock);
        debug!(
            "[Simulation:{}] round {}: stock {}, thieves {:?}, companies {:?}, probes {}",
            self.report.run_id, round, stock, plan.thieves, plan.companies, plan.probes
        );

        self.consume_round(&plan)?;
        self.report.rounds = round + 1;
        self.check_conservation(round)
    }

    fn produce_round(&mut self) -> Result<(), FactoryError> {
        let mut produced = 0;

        for id in 0..self.config.producers_per_round {
            let batch = self.next_batch();
            produced += batch.len();
            self.registry.start_production(batch, id)?;
        }
        for id in 0..self.config.producers_per_round {
            self.registry.finish_production(id)?;
        }

        self.report.produced += produced;
        Ok(())
    }

    fn next_batch(&mut self) -> Vec<Product> {
        let size = self.batch_sizes.sample(&mut self.rng) as usize;
        let (min, max) = (self.config.min_value, self.config.max_value);

        (0..size)
            .map(|_| {
                let id = self.next_product_id;
                self.next_product_id += 1;
                Product::new(id, self.rng.gen_range(min..=max))
            })
            .collect()
    }

    /// Draw every demand of the round, capped so that their sum fits `stock`
    fn plan_round(&mut self, stock: usize) -> RoundPlan {
        let probes = (self.config.simple_buyer_probes as usize).min(stock);
        let mut budget = stock - probes;

        let mut draw = |rng: &mut StdRng, min: u32, max: u32| {
            let want = (rng.gen_range(min..=max) as usize).min(budget);
            budget -= want;
            want
        };

        let thieves = (0..self.config.thieves.count)
            .map(|_| draw(&mut self.rng, self.config.thieves.min_products, self.config.thieves.max_products))
            .collect();
        let companies = (0..self.config.companies.count)
            .map(|_| {
                draw(
                    &mut self.rng,
                    self.config.companies.min_products,
                    self.config.companies.max_products,
                )
            })
            .collect();

        RoundPlan {
            thieves,
            companies,
            probes,
        }
    }

    fn consume_round(&mut self, plan: &RoundPlan) -> Result<(), FactoryError> {
        let monitor = Arc::clone(self.monitor());

        if self.config.cycle_gates {
            monitor.close_factory();
            monitor.close_returning_service();
        }

        for (id, &want) in plan.thieves.iter().enumerate() {
            self.registry.start_thief(want, id as WorkerId)?;
        }
        for (id, &want) in plan.companies.iter().enumerate() {
            self.registry
                .start_company_buyer(want, self.config.company_min_value, id as WorkerId)?;
        }

        // Simple buyers fail outright on a closed factory, so they go once it
        // reopens and race the thieves and companies it just released.
        monitor.open_factory();
        let bought: Vec<ProductId> = (0..plan.probes)
            .into_par_iter()
            .filter_map(|_| monitor.try_buy_one())
            .collect();
        self.report.simple_bought += bought.len();

        // Companies holding rejects cannot finish before this.
        monitor.open_returning_service();

        for id in 0..plan.thieves.len() {
            self.report.stolen += self.registry.finish_thief(id as WorkerId)?;
        }
        for id in 0..plan.companies.len() {
            self.report.returned += self.registry.finish_company_buyer(id as WorkerId)?;
        }
        self.report.company_bought += plan.companies.iter().sum::<usize>();
        Ok(())
    }

    fn check_conservation(&mut self, round: u32) -> Result<(), FactoryError> {
        let stats = self.monitor().stats();
        self.report.available = stats.available;
        self.report.ledger_entries = stats.stolen;

        let expected = self.report.expected_available();
        if expected != Some(stats.available) {
            return Err(FactoryError::InvariantViolated(format!(
                "round {}: {} products available, totals imply {:?}",
                round, stats.available, expected
            )));
        }
        if stats.stolen != self.report.stolen {
            return Err(FactoryError::InvariantViolated(format!(
                "round {}: ledger holds {} thefts, thieves reported {}",
                round, stats.stolen, self.report.stolen
            )));
        }

        debug!(
            "[Simulation:{}] round {} balanced: {} available",
            self.report.run_id, round, stats.available
        );
        Ok(())
    }
}
