//! Role procedures built on the monitor's lock and wait primitives.
//!
//! Each role is a stateless unit struct; the worker identity and any
//! per-worker bookkeeping stay with the caller.

use super::monitor::FactoryMonitor;
use super::product::{Product, ProductId, WorkerId};
use log::{debug, trace};

/// Adds freshly made products to the stock
pub struct Producer;

impl Producer {
    /// Append `products` at the newest end and wake companies if no thief is active
    pub fn produce<I>(monitor: &FactoryMonitor, products: I)
    where
        I: IntoIterator<Item = Product>,
    {
        let mut floor = monitor.lock_floor();
        let before = floor.queue.len();
        floor.queue.extend_newest(products);
        let added = floor.queue.len() - before;
        // Companies are held back by thieves anyway; the last thief to leave wakes them.
        let wake_companies = added > 0 && floor.thieves_active == 0;
        drop(floor);

        trace!("[Producer] added {} products", added);
        if wake_companies {
            monitor.notify_companies();
        }
    }
}

/// Opportunistic buyer of a single product
pub struct SimpleBuyer;

impl SimpleBuyer {
    /// One non-blocking attempt at buying the oldest product
    ///
    /// Returns `None` when the floor lock is busy, the queue is empty or the
    /// factory is closed, without changing anything.
    pub fn try_buy_one(monitor: &FactoryMonitor) -> Option<ProductId> {
        let mut floor = monitor.try_lock_floor()?;
        if !floor.factory.is_open() {
            return None;
        }
        floor.queue.pop_oldest().map(|product| product.id())
    }
}

/// Bulk, all-or-nothing buyer that may return part of its purchase
pub struct CompanyBuyer;

impl CompanyBuyer {
    /// Wait until `count` products are available with the factory open and no
    /// thief active, then take the `count` oldest at once.
    pub fn buy_products(monitor: &FactoryMonitor, count: usize) -> Vec<Product> {
        let floor = monitor.lock_floor();
        let mut floor = monitor.wait_for_companies(floor, |floor| floor.companies_blocked(count));

        let bought = floor.queue.take_oldest(count);
        // Another waiter may want fewer than what is left.
        monitor.notify_companies();
        drop(floor);

        debug!("[Company] bought {} products", bought.len());
        bought
    }

    /// Put products back as the newest stock
    ///
    /// Waits first for the returning service, then for every thief to leave.
    /// The returning lock is released before the floor lock is taken.
    pub fn return_products(monitor: &FactoryMonitor, products: Vec<Product>) {
        if products.is_empty() {
            return;
        }

        monitor.wait_for_returning_open();

        let floor = monitor.lock_floor();
        let mut floor = monitor.wait_for_companies(floor, |floor| floor.thieves_active > 0);
        let returned = products.len();
        floor.queue.extend_newest(products);
        monitor.notify_companies();
        drop(floor);

        debug!("[Company] returned {} products", returned);
    }
}

/// Exclusive taker of products, recorded in the theft ledger
pub struct Thief;

impl Thief {
    /// Steal up to `count` oldest products once the factory is open
    ///
    /// Returns how many were taken; fewer than `count` just means the stock
    /// ran short. Ledger entries are appended in removal order.
    pub fn steal_products(monitor: &FactoryMonitor, count: usize, thief_id: WorkerId) -> usize {
        let floor = monitor.lock_floor();
        let mut floor = monitor.wait_for_factory_open(floor);

        let mut ledger = monitor.lock_ledger();
        let stolen = floor.queue.take_oldest(count);
        drop(floor);

        let taken = stolen.len();
        ledger.record(stolen, thief_id);
        drop(ledger);

        debug!("[Thief:{}] stole {} of {} requested", thief_id, taken, count);
        taken
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{mpsc, Arc, Barrier};
    use std::thread;
    use std::time::{Duration, Instant};

    fn batch(ids: std::ops::Range<u32>, value: i32) -> Vec<Product> {
        ids.map(|id| Product::new(id, value)).collect()
    }

    fn ids(products: &[Product]) -> Vec<u32> {
        products.iter().map(Product::id).collect()
    }

    fn wait_until(condition: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(Instant::now() < deadline, "condition not reached in time");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_produce_appends_in_order() {
        let monitor = FactoryMonitor::new();
        Producer::produce(&monitor, batch(0..3, 1));
        Producer::produce(&monitor, Vec::new());
        Producer::produce(&monitor, batch(3..5, 2));
        assert_eq!(ids(&monitor.list_available_products()), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_try_buy_one_takes_head() {
        let monitor = FactoryMonitor::new();
        assert_eq!(SimpleBuyer::try_buy_one(&monitor), None);

        Producer::produce(&monitor, batch(10..12, 1));
        assert_eq!(SimpleBuyer::try_buy_one(&monitor), Some(10));
        assert_eq!(SimpleBuyer::try_buy_one(&monitor), Some(11));
        assert_eq!(SimpleBuyer::try_buy_one(&monitor), None);
    }

    #[test]
    fn test_try_buy_one_fails_when_closed() {
        let monitor = FactoryMonitor::new();
        Producer::produce(&monitor, batch(0..1, 1));
        monitor.close_factory();

        assert_eq!(SimpleBuyer::try_buy_one(&monitor), None);
        assert_eq!(monitor.list_available_products().len(), 1);
    }

    #[test]
    fn test_try_buy_one_fails_when_lock_busy() {
        let monitor = FactoryMonitor::new();
        Producer::produce(&monitor, batch(0..1, 1));

        let floor = monitor.lock_floor();
        let started = Instant::now();
        assert_eq!(SimpleBuyer::try_buy_one(&monitor), None);
        assert!(started.elapsed() < Duration::from_secs(1));
        drop(floor);

        assert_eq!(SimpleBuyer::try_buy_one(&monitor), Some(0));
    }

    #[test]
    fn test_buy_products_takes_exactly_n_oldest() {
        let monitor = FactoryMonitor::new();
        Producer::produce(&monitor, batch(0..5, 1));

        let bought = CompanyBuyer::buy_products(&monitor, 3);
        assert_eq!(ids(&bought), vec![0, 1, 2]);
        assert_eq!(ids(&monitor.list_available_products()), vec![3, 4]);
    }

    #[test]
    fn test_buy_zero_returns_immediately() {
        let monitor = FactoryMonitor::new();
        assert!(CompanyBuyer::buy_products(&monitor, 0).is_empty());
    }

    #[test]
    fn test_buy_products_waits_for_stock() {
        let monitor = Arc::new(FactoryMonitor::new());
        Producer::produce(&monitor, batch(0..1, 1));

        let (tx, rx) = mpsc::channel();
        let buyer = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || tx.send(CompanyBuyer::buy_products(&monitor, 3)).unwrap())
        };

        wait_until(|| monitor.stats().companies_waiting == 1);
        Producer::produce(&monitor, batch(1..2, 1));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());

        Producer::produce(&monitor, batch(2..4, 1));
        let bought = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(ids(&bought), vec![0, 1, 2]);
        buyer.join().unwrap();
        assert_eq!(ids(&monitor.list_available_products()), vec![3]);
    }

    #[test]
    fn test_buy_products_waits_for_factory() {
        let monitor = Arc::new(FactoryMonitor::new());
        Producer::produce(&monitor, batch(0..2, 1));
        monitor.close_factory();

        let buyer = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || CompanyBuyer::buy_products(&monitor, 2))
        };

        wait_until(|| monitor.stats().companies_waiting == 1);
        monitor.open_factory();
        assert_eq!(ids(&buyer.join().unwrap()), vec![0, 1]);
    }

    #[test]
    fn test_satisfied_company_wakes_smaller_company() {
        let monitor = Arc::new(FactoryMonitor::new());
        let barrier = Arc::new(Barrier::new(3));

        let spawn_buyer = |count: usize| {
            let monitor = Arc::clone(&monitor);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                CompanyBuyer::buy_products(&monitor, count)
            })
        };
        let large = spawn_buyer(4);
        let small = spawn_buyer(2);

        barrier.wait();
        wait_until(|| monitor.stats().companies_waiting == 2);
        Producer::produce(&monitor, batch(0..6, 1));

        assert_eq!(large.join().unwrap().len(), 4);
        assert_eq!(small.join().unwrap().len(), 2);
        assert!(monitor.list_available_products().is_empty());
    }

    #[test]
    fn test_return_products_appends_to_tail() {
        let monitor = FactoryMonitor::new();
        Producer::produce(&monitor, batch(0..3, 1));
        let mut bought = CompanyBuyer::buy_products(&monitor, 2);

        let back = bought.split_off(1);
        CompanyBuyer::return_products(&monitor, back);
        assert_eq!(ids(&monitor.list_available_products()), vec![2, 1]);
    }

    #[test]
    fn test_return_empty_is_noop_even_when_closed() {
        let monitor = FactoryMonitor::new();
        monitor.close_returning_service();
        CompanyBuyer::return_products(&monitor, Vec::new());
        assert!(monitor.list_available_products().is_empty());
        assert_eq!(monitor.gate_flags().returning_waiters, 0);
    }

    #[test]
    fn test_return_waits_for_thieves() {
        let monitor = Arc::new(FactoryMonitor::new());
        let pass = monitor.admit_thief();

        let returner = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || CompanyBuyer::return_products(&monitor, batch(7..8, 3)))
        };

        wait_until(|| monitor.stats().companies_waiting == 1);
        assert!(monitor.list_available_products().is_empty());

        drop(pass);
        returner.join().unwrap();
        assert_eq!(ids(&monitor.list_available_products()), vec![7]);
    }

    #[test]
    fn test_steal_partial_and_full() {
        let monitor = FactoryMonitor::new();
        Producer::produce(&monitor, batch(0..5, 1));
        assert_eq!(Thief::steal_products(&monitor, 3, 1), 3);
        assert_eq!(Thief::steal_products(&monitor, 10, 2), 2);
        assert_eq!(Thief::steal_products(&monitor, 1, 3), 0);
        assert!(monitor.list_available_products().is_empty());

        let ledger = monitor.list_stolen_products();
        let stolen: Vec<(u32, u32)> = ledger
            .iter()
            .map(|record| (record.product.id(), record.thief_id))
            .collect();
        assert_eq!(stolen, vec![(0, 1), (1, 1), (2, 1), (3, 2), (4, 2)]);
    }

    #[test]
    fn test_steal_blocks_while_factory_closed() {
        let monitor = Arc::new(FactoryMonitor::new());
        Producer::produce(&monitor, batch(0..3, 1));
        monitor.close_factory();

        let (tx, rx) = mpsc::channel();
        let thief = {
            let monitor = Arc::clone(&monitor);
            thread::spawn(move || {
                let _pass = monitor.admit_thief();
                tx.send(Thief::steal_products(&monitor, 2, 5)).unwrap();
            })
        };

        wait_until(|| monitor.gate_flags().factory_waiters == 1);
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        assert!(monitor.list_stolen_products().is_empty());

        monitor.open_factory();
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 2);
        thief.join().unwrap();
        assert_eq!(ids(&monitor.list_available_products()), vec![2]);
    }
}
