use serde::{Deserialize, Serialize};

/// An open/closed switch with a count of callers waiting for it to open
///
/// A `Gate` carries no lock of its own; it always lives inside the state
/// guarded by the monitor lock that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gate {
    open: bool,
    waiters: usize,
}

impl Gate {
    pub fn new(open: bool) -> Self {
        Self { open, waiters: 0 }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn waiters(&self) -> usize {
        self.waiters
    }

    /// Open the gate, returns true if it was closed
    pub fn open(&mut self) -> bool {
        let changed = !self.open;
        self.open = true;
        changed
    }

    /// Close the gate, returns true if it was open
    pub fn close(&mut self) -> bool {
        let changed = self.open;
        self.open = false;
        changed
    }

    pub fn register_waiter(&mut self) {
        self.waiters += 1;
    }

    pub fn deregister_waiter(&mut self) {
        self.waiters = self.waiters.saturating_sub(1);
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Snapshot of both service switches and their waiters
///
/// The factory half and the returning half are read under different locks,
/// so the two halves are not guaranteed to be mutually consistent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateFlags {
    pub factory_open: bool,
    pub returning_open: bool,
    pub factory_waiters: usize,
    pub returning_waiters: usize,
}

impl GateFlags {
    pub fn from_gates(factory: &Gate, returning: &Gate) -> Self {
        Self {
            factory_open: factory.is_open(),
            returning_open: returning.is_open(),
            factory_waiters: factory.waiters(),
            returning_waiters: returning.waiters(),
        }
    }
}
