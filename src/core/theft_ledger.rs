use super::product::{Product, WorkerId};
use serde::{Deserialize, Serialize};

/// A single filed theft: which product, stolen by which thief
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TheftRecord {
    pub product: Product,
    pub thief_id: WorkerId,
}

/// Append-only, chronological log of thefts
#[derive(Debug, Default)]
pub struct TheftLedger {
    records: Vec<TheftRecord>,
}

impl TheftLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// File one record per product, in the given order
    pub fn record<I>(&mut self, products: I, thief_id: WorkerId)
    where
        I: IntoIterator<Item = Product>,
    {
        self.records.extend(
            products
                .into_iter()
                .map(|product| TheftRecord { product, thief_id }),
        );
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn snapshot(&self) -> Vec<TheftRecord> {
        self.records.clone()
    }
}
