use super::product::Product;
use std::collections::VecDeque;

/// FIFO store of available products
///
/// Insertion order is production order; the head is always the oldest
/// product that is still available.
#[derive(Debug, Clone, Default)]
pub struct ProductQueue {
    items: VecDeque<Product>,
}

impl ProductQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append products at the newest end, preserving their order
    pub fn extend_newest<I>(&mut self, products: I)
    where
        I: IntoIterator<Item = Product>,
    {
        self.items.extend(products);
    }

    /// Remove the oldest product
    pub fn pop_oldest(&mut self) -> Option<Product> {
        self.items.pop_front()
    }

    /// Remove up to `count` oldest products, oldest first
    ///
    /// Takes `min(count, len)` items. Callers that need exactly `count`
    /// check `len()` first.
    pub fn take_oldest(&mut self, count: usize) -> Vec<Product> {
        let count = count.min(self.items.len());
        self.items.drain(..count).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Product> {
        self.items.iter()
    }

    /// Point-in-time copy, oldest first
    pub fn snapshot(&self) -> Vec<Product> {
        self.items.iter().copied().collect()
    }
}
