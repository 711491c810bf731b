use super::execution::config::FactoryConfig;
use super::gates::{Gate, GateFlags};
use super::product::{Product, ProductId, WorkerId};
use super::product_queue::ProductQueue;
use super::roles::{CompanyBuyer, Producer, SimpleBuyer, Thief};
use super::theft_ledger::{TheftLedger, TheftRecord};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, TryLockError};

/// State guarded by the primary lock
#[derive(Debug)]
pub(crate) struct Floor {
    pub(crate) queue: ProductQueue,
    pub(crate) factory: Gate,
    pub(crate) thieves_active: usize,
    pub(crate) companies_waiting: usize,
}

impl Floor {
    /// True while a company asking for `wanted` products has to keep waiting
    pub(crate) fn companies_blocked(&self, wanted: usize) -> bool {
        self.queue.len() < wanted || self.thieves_active > 0 || !self.factory.is_open()
    }
}

/// Point-in-time counters of the monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStats {
    pub available: usize,
    pub stolen: usize,
    pub thieves_active: usize,
    pub companies_waiting: usize,
    pub gates: GateFlags,
}

/// The synchronized core of the factory
///
/// Owns the product queue, both service gates and the theft ledger. Lock
/// order is fixed: the returning-service lock is never held while the floor
/// lock is taken, and the floor lock is always taken before the ledger lock.
///
/// Every role operation is exposed here; the procedures themselves live in
/// [`super::roles`] and are built on the crate-private wait/notify
/// primitives below.
pub struct FactoryMonitor {
    floor: Mutex<Floor>,
    /// Paired with `floor`; companies and returners wait here
    companies_condition: Condvar,
    /// Paired with `floor`; thieves wait here while the factory is closed
    factory_open_condition: Condvar,
    returning: Mutex<Gate>,
    returning_open_condition: Condvar,
    ledger: Mutex<TheftLedger>,
}

impl FactoryMonitor {
    /// Create a monitor with both services open and no stock
    pub fn new() -> Self {
        Self::with_config(&FactoryConfig::default())
    }

    /// Create a monitor with the gate states and queue capacity of `config`
    pub fn with_config(config: &FactoryConfig) -> Self {
        Self {
            floor: Mutex::new(Floor {
                queue: ProductQueue::with_capacity(config.initial_capacity),
                factory: Gate::new(config.factory_open),
                thieves_active: 0,
                companies_waiting: 0,
            }),
            companies_condition: Condvar::new(),
            factory_open_condition: Condvar::new(),
            returning: Mutex::new(Gate::new(config.returning_open)),
            returning_open_condition: Condvar::new(),
            ledger: Mutex::new(TheftLedger::new()),
        }
    }

    // Role operations

    /// Append products at the newest end of the queue. Never blocks.
    pub fn produce(&self, products: Vec<Product>) {
        Producer::produce(self, products);
    }

    /// Buy the oldest product if the floor lock is free, stock exists and the
    /// factory is open. Never blocks.
    pub fn try_buy_one(&self) -> Option<ProductId> {
        SimpleBuyer::try_buy_one(self)
    }

    /// Block until `count` products can be bought together, then take the
    /// `count` oldest.
    pub fn buy_products(&self, count: usize) -> Vec<Product> {
        CompanyBuyer::buy_products(self, count)
    }

    /// Put products back at the newest end, once the returning service is open
    /// and no thief is active.
    pub fn return_products(&self, products: Vec<Product>) {
        CompanyBuyer::return_products(self, products);
    }

    /// Steal up to `count` oldest products and file them in the ledger.
    ///
    /// The caller is expected to hold a [`ThiefPass`] for the thief's whole
    /// lifetime; stealing itself does not touch the active-thief count.
    pub fn steal_products(&self, count: usize, thief_id: WorkerId) -> usize {
        Thief::steal_products(self, count, thief_id)
    }

    /// Mark a thief as active until the returned pass is dropped
    ///
    /// While any pass is alive, companies cannot buy or return.
    pub fn admit_thief(self: &Arc<Self>) -> ThiefPass {
        let mut floor = self.lock_floor();
        floor.thieves_active += 1;
        trace!("[Factory] thief admitted ({} active)", floor.thieves_active);
        ThiefPass {
            monitor: Arc::clone(self),
        }
    }

    fn release_thief(&self) {
        let mut floor = self.lock_floor();
        floor.thieves_active = floor.thieves_active.saturating_sub(1);
        let last = floor.thieves_active == 0;
        trace!("[Factory] thief released ({} active)", floor.thieves_active);
        drop(floor);

        if last {
            self.notify_companies();
        }
    }

    // Gates

    /// Open the factory gate and wake thieves and companies held by it
    pub fn open_factory(&self) {
        let mut floor = self.lock_floor();
        if floor.factory.open() {
            debug!("[Factory] factory opened ({} waiting thieves)", floor.factory.waiters());
            self.factory_open_condition.notify_all();
            self.companies_condition.notify_all();
        }
    }

    /// Close the factory gate. Simple buyers fail, thieves and companies wait.
    pub fn close_factory(&self) {
        let mut floor = self.lock_floor();
        if floor.factory.close() {
            debug!("[Factory] factory closed");
        }
    }

    /// Open the returning service and wake every waiting returner
    pub fn open_returning_service(&self) {
        let mut returning = self.lock_returning();
        if returning.open() {
            debug!(
                "[Factory] returning service opened ({} waiting)",
                returning.waiters()
            );
            self.returning_open_condition.notify_all();
        }
    }

    /// Close the returning service; later returns wait until it reopens
    pub fn close_returning_service(&self) {
        let mut returning = self.lock_returning();
        if returning.close() {
            debug!("[Factory] returning service closed");
        }
    }

    /// Snapshot of both gates and their waiter counts
    pub fn gate_flags(&self) -> GateFlags {
        let factory = self.lock_floor().factory;
        let returning = *self.lock_returning();
        GateFlags::from_gates(&factory, &returning)
    }

    // Listing

    /// Available products, oldest first
    pub fn list_available_products(&self) -> Vec<Product> {
        self.lock_floor().queue.snapshot()
    }

    /// Filed thefts in the order they happened
    pub fn list_stolen_products(&self) -> Vec<TheftRecord> {
        self.lock_ledger().snapshot()
    }

    /// Counters of the whole monitor, read under the floor then the ledger lock
    pub fn stats(&self) -> MonitorStats {
        let (available, thieves_active, companies_waiting, stolen, factory) = {
            let floor = self.lock_floor();
            let stolen = self.lock_ledger().len();
            (
                floor.queue.len(),
                floor.thieves_active,
                floor.companies_waiting,
                stolen,
                floor.factory,
            )
        };
        let returning = *self.lock_returning();

        MonitorStats {
            available,
            stolen,
            thieves_active,
            companies_waiting,
            gates: GateFlags::from_gates(&factory, &returning),
        }
    }

    // Primitives for the role procedures. Poisoned locks are recovered:
    // every mutation under them is a single queue or ledger step.

    pub(crate) fn lock_floor(&self) -> MutexGuard<'_, Floor> {
        self.floor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn try_lock_floor(&self) -> Option<MutexGuard<'_, Floor>> {
        match self.floor.try_lock() {
            Ok(floor) => Some(floor),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub(crate) fn lock_ledger(&self) -> MutexGuard<'_, TheftLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_returning(&self) -> MutexGuard<'_, Gate> {
        self.returning.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait on the companies condition while `blocked` holds
    ///
    /// The caller is counted in `companies_waiting` for as long as it sleeps.
    pub(crate) fn wait_for_companies<'a, F>(
        &self,
        mut floor: MutexGuard<'a, Floor>,
        mut blocked: F,
    ) -> MutexGuard<'a, Floor>
    where
        F: FnMut(&Floor) -> bool,
    {
        if !blocked(&*floor) {
            return floor;
        }

        floor.companies_waiting += 1;
        trace!("[Factory] company waiting ({} waiting)", floor.companies_waiting);
        let mut floor = self
            .companies_condition
            .wait_while(floor, |floor| blocked(&*floor))
            .unwrap_or_else(PoisonError::into_inner);
        floor.companies_waiting -= 1;
        floor
    }

    /// Wait on the factory-open condition until the factory gate is open
    pub(crate) fn wait_for_factory_open<'a>(
        &self,
        mut floor: MutexGuard<'a, Floor>,
    ) -> MutexGuard<'a, Floor> {
        if floor.factory.is_open() {
            return floor;
        }

        floor.factory.register_waiter();
        trace!("[Factory] waiting for factory to open");
        let mut floor = self
            .factory_open_condition
            .wait_while(floor, |floor| !floor.factory.is_open())
            .unwrap_or_else(PoisonError::into_inner);
        floor.factory.deregister_waiter();
        floor
    }

    /// Block until the returning service is open
    ///
    /// Takes and releases the returning lock; the floor lock must not be held.
    pub(crate) fn wait_for_returning_open(&self) {
        let mut returning = self.lock_returning();
        if returning.is_open() {
            return;
        }

        returning.register_waiter();
        trace!("[Factory] waiting for returning service to open");
        let mut returning = self
            .returning_open_condition
            .wait_while(returning, |gate| !gate.is_open())
            .unwrap_or_else(PoisonError::into_inner);
        returning.deregister_waiter();
    }

    pub(crate) fn notify_companies(&self) {
        self.companies_condition.notify_all();
    }
}

impl Default for FactoryMonitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks one thief as active for as long as it lives
///
/// Dropping the last pass wakes companies that were held back by thieves.
pub struct ThiefPass {
    monitor: Arc<FactoryMonitor>,
}

impl Drop for ThiefPass {
    fn drop(&mut self) {
        self.monitor.release_thief();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::{Duration, Instant};

    fn batch(ids: std::ops::Range<u32>, value: i32) -> Vec<Product> {
        ids.map(|id| Product::new(id, value)).collect()
    }

    /// Poll the monitor's stats until `condition` holds, failing after 10s
    fn wait_until(monitor: &FactoryMonitor, condition: impl Fn(&MonitorStats) -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition(&monitor.stats()) {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_new_monitor_is_open_and_empty() {
        let monitor = FactoryMonitor::new();
        let stats = monitor.stats();
        assert_eq!(stats.available, 0);
        assert_eq!(stats.stolen, 0);
        assert_eq!(stats.thieves_active, 0);
        assert!(stats.gates.factory_open);
        assert!(stats.gates.returning_open);
    }

    #[test]
    fn test_with_config_initial_gates() {
        let config = FactoryConfig::new()
            .with_factory_open(false)
            .with_returning_open(false);
        let monitor = FactoryMonitor::with_config(&config);
        let flags = monitor.gate_flags();
        assert!(!flags.factory_open);
        assert!(!flags.returning_open);
    }

    #[test]
    fn test_gate_toggles_are_idempotent() {
        let monitor = FactoryMonitor::new();
        monitor.close_factory();
        monitor.close_factory();
        assert!(!monitor.gate_flags().factory_open);
        monitor.open_factory();
        monitor.open_factory();
        assert!(monitor.gate_flags().factory_open);

        monitor.close_returning_service();
        monitor.close_returning_service();
        assert!(!monitor.gate_flags().returning_open);
        monitor.open_returning_service();
        assert!(monitor.gate_flags().returning_open);
    }

    #[test]
    fn test_thief_pass_counts() {
        let monitor = Arc::new(FactoryMonitor::new());
        let first = monitor.admit_thief();
        let second = monitor.admit_thief();
        assert_eq!(monitor.stats().thieves_active, 2);
        drop(first);
        assert_eq!(monitor.stats().thieves_active, 1);
        drop(second);
        assert_eq!(monitor.stats().thieves_active, 0);
    }

    #[test]
    fn test_dropping_last_pass_releases_company() {
        let monitor = Arc::new(FactoryMonitor::new());
        monitor.produce(batch(0..3, 1));
        let pass = monitor.admit_thief();

        let (tx, rx) = mpsc::channel();
        let buyer = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || {
                tx.send(monitor.buy_products(2)).unwrap();
            })
        };

        wait_until(&monitor, |stats| stats.companies_waiting == 1);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        drop(pass);
        let bought = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(bought.len(), 2);
        buyer.join().unwrap();
        assert_eq!(monitor.stats().companies_waiting, 0);
    }

    #[test]
    fn test_opening_factory_wakes_thief() {
        let monitor = Arc::new(FactoryMonitor::new());
        monitor.produce(batch(0..2, 1));
        monitor.close_factory();

        let thief = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || {
                let _pass = monitor.admit_thief();
                monitor.steal_products(5, 42)
            })
        };

        wait_until(&monitor, |stats| stats.gates.factory_waiters == 1);
        assert_eq!(monitor.stats().available, 2);

        monitor.open_factory();
        assert_eq!(thief.join().unwrap(), 2);
        assert_eq!(monitor.gate_flags().factory_waiters, 0);
        assert_eq!(monitor.stats().stolen, 2);
    }

    #[test]
    fn test_opening_returning_service_wakes_returner() {
        let monitor = Arc::new(FactoryMonitor::new());
        monitor.close_returning_service();

        let returner = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || monitor.return_products(batch(9..10, 4)))
        };

        wait_until(&monitor, |stats| stats.gates.returning_waiters == 1);
        assert!(monitor.list_available_products().is_empty());

        monitor.open_returning_service();
        returner.join().unwrap();
        assert_eq!(monitor.list_available_products(), batch(9..10, 4));
    }

    #[test]
    fn test_stats_after_mixed_operations() {
        let monitor = FactoryMonitor::new();
        monitor.produce(batch(0..6, 2));
        assert_eq!(monitor.steal_products(2, 1), 2);
        assert_eq!(monitor.buy_products(1).len(), 1);
        assert!(monitor.try_buy_one().is_some());

        let stats = monitor.stats();
        assert_eq!(stats.available, 2);
        assert_eq!(stats.stolen, 2);
        assert_eq!(stats.companies_waiting, 0);
    }
}
