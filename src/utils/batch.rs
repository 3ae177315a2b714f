use serde::Serialize;

pub const DEFAULT_BATCH_SIZE: u64 = 500;
pub const MAX_BATCH_SIZE: u64 = 10_000;

/// Page size for row scans; falls back to the default and is kept within
/// `1..=MAX_BATCH_SIZE`.
pub fn clamp_batch_size(size: Option<u64>) -> u64 {
    size.unwrap_or(DEFAULT_BATCH_SIZE).clamp(1, MAX_BATCH_SIZE)
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchInfo {
    pub total_batches: u64,
    pub total_items: u64,
    pub items_per_batch: u64,
}

impl BatchInfo {
    pub fn new(total_items: u64, items_per_batch: u64) -> Self {
        let items_per_batch = items_per_batch.max(1);
        Self {
            total_batches: total_items.div_ceil(items_per_batch),
            total_items,
            items_per_batch,
        }
    }
}
