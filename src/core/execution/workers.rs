use crate::core::errors::{FactoryError, Role};
use crate::core::monitor::FactoryMonitor;
use crate::core::product::{Product, ProductId, WorkerId};
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

/// Running workers of one role, keyed by worker id
struct Crew<T> {
    role: Role,
    handles: Mutex<HashMap<WorkerId, JoinHandle<T>>>,
}

impl<T: Send + 'static> Crew<T> {
    fn new(role: Role) -> Self {
        Self {
            role,
            handles: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<WorkerId, JoinHandle<T>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `work` on a new thread registered under `id`
    fn spawn<F>(&self, id: WorkerId, work: F) -> Result<(), FactoryError>
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let mut handles = self.lock();
        if handles.contains_key(&id) {
            return Err(FactoryError::DuplicateWorker(self.role, id));
        }

        let handle = thread::Builder::new()
            .name(format!("{}-{}", self.role, id))
            .spawn(work)
            .map_err(|e| FactoryError::SpawnFailed(self.role, id, e.to_string()))?;
        handles.insert(id, handle);
        debug!("[Workers] started {} {}", self.role, id);
        Ok(())
    }

    /// Wait for the worker registered under `id` and take its result
    ///
    /// The id is free for reuse once this returns, whatever the outcome.
    fn join(&self, id: WorkerId) -> Result<T, FactoryError> {
        let handle = self
            .lock()
            .remove(&id)
            .ok_or(FactoryError::UnknownWorker(self.role, id))?;

        handle.join().map_err(|_| {
            warn!("[Workers] {} {} panicked", self.role, id);
            FactoryError::WorkerPanicked(self.role, id)
        })
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Starts role workers on their own threads and collects their results
///
/// Ids are unique per role while a worker is registered; `finish_*` frees
/// the id again. Results travel back through the typed join handles.
pub struct WorkerRegistry {
    monitor: Arc<FactoryMonitor>,
    producers: Crew<()>,
    simple_buyers: Crew<Option<ProductId>>,
    companies: Crew<usize>,
    thieves: Crew<usize>,
}

impl WorkerRegistry {
    /// Create an empty registry whose workers all share `monitor`
    pub fn new(monitor: Arc<FactoryMonitor>) -> Self {
        Self {
            monitor,
            producers: Crew::new(Role::Producer),
            simple_buyers: Crew::new(Role::SimpleBuyer),
            companies: Crew::new(Role::CompanyBuyer),
            thieves: Crew::new(Role::Thief),
        }
    }

    /// The monitor every worker operates on
    pub fn monitor(&self) -> &Arc<FactoryMonitor> {
        &self.monitor
    }

    /// Number of workers started and not yet finished, across all roles
    pub fn active_workers(&self) -> usize {
        self.producers.len() + self.simple_buyers.len() + self.companies.len() + self.thieves.len()
    }

    /// Start a producer that appends `products` to the queue in one step
    pub fn start_production(&self, products: Vec<Product>, id: WorkerId) -> Result<(), FactoryError> {
        let monitor = Arc::clone(&self.monitor);
        self.producers.spawn(id, move || monitor.produce(products))
    }

    /// Wait for the producer to finish
    pub fn finish_production(&self, id: WorkerId) -> Result<(), FactoryError> {
        self.producers.join(id)
    }

    /// Start a buyer that makes a single non-blocking purchase attempt
    pub fn start_simple_buyer(&self, id: WorkerId) -> Result<(), FactoryError> {
        let monitor = Arc::clone(&self.monitor);
        self.simple_buyers.spawn(id, move || monitor.try_buy_one())
    }

    /// Id of the product the buyer got, if any
    pub fn finish_simple_buyer(&self, id: WorkerId) -> Result<Option<ProductId>, FactoryError> {
        self.simple_buyers.join(id)
    }

    /// Start a company that buys `num_products` and sends back every product
    /// worth less than `min_value`
    pub fn start_company_buyer(
        &self,
        num_products: usize,
        min_value: i32,
        id: WorkerId,
    ) -> Result<(), FactoryError> {
        let monitor = Arc::clone(&self.monitor);
        self.companies.spawn(id, move || {
            let bought = monitor.buy_products(num_products);
            let (kept, rejected): (Vec<Product>, Vec<Product>) = bought
                .into_iter()
                .partition(|product| product.value() >= min_value);

            let returned = rejected.len();
            monitor.return_products(rejected);
            debug!("[Company:{}] kept {}, returned {}", id, kept.len(), returned);
            returned
        })
    }

    /// Number of products the company returned
    pub fn finish_company_buyer(&self, id: WorkerId) -> Result<usize, FactoryError> {
        self.companies.join(id)
    }

    /// Start a thief; it counts as active from this call until its steal returns
    pub fn start_thief(&self, num_products: usize, fake_id: WorkerId) -> Result<(), FactoryError> {
        let pass = self.monitor.admit_thief();
        let monitor = Arc::clone(&self.monitor);
        self.thieves.spawn(fake_id, move || {
            let stolen = monitor.steal_products(num_products, fake_id);
            drop(pass);
            stolen
        })
    }

    /// Number of products the thief stole
    pub fn finish_thief(&self, fake_id: WorkerId) -> Result<usize, FactoryError> {
        self.thieves.join(fake_id)
    }
}
