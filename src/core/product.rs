use serde::{Deserialize, Serialize};

/// Identifier of a product
pub type ProductId = u32;

/// Identifier of a worker (producer, buyer, company or thief)
pub type WorkerId = u32;

/// An immutable product: an id paired with a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    value: i32,
}

impl Product {
    pub fn new(id: ProductId, value: i32) -> Self {
        Self { id, value }
    }

    pub fn id(&self) -> ProductId {
        self.id
    }

    pub fn value(&self) -> i32 {
        self.value
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}(value {})", self.id, self.value)
    }
}
