//! Row-major decimal attribute store with reusable row indices.
//!
//! Each live row carries a logical identifier drawn from a monotone counter
//! and mirrored into the key's identifier column, so a recycled row can be
//! told apart from its predecessor in exported statistics.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::marker::PhantomData;

use rust_decimal::Decimal;

use crate::error::SimError;

/// Column enum of an [`AttributeMatrix`].
pub trait AttributeKey: Copy + fmt::Debug + 'static {
    const COUNT: usize;
    const IDENTIFIER: Self;
    fn column(self) -> usize;
}

/// Hands out row indices, preferring the lowest released row over growth.
#[derive(Debug, Clone, Default)]
pub struct IndexAllocator {
    capacity: Option<usize>,
    high_water: usize,
    free: BTreeSet<usize>,
}

impl IndexAllocator {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            capacity,
            high_water: 0,
            free: BTreeSet::new(),
        }
    }

    pub fn allocate(&mut self) -> Result<usize, SimError> {
        if let Some(index) = self.free.pop_first() {
            return Ok(index);
        }
        if let Some(capacity) = self.capacity {
            if self.high_water >= capacity {
                return Err(SimError::Capacity {
                    requested: self.high_water + 1,
                    capacity,
                });
            }
        }
        let index = self.high_water;
        self.high_water += 1;
        Ok(index)
    }

    /// Returns false when `index` was never handed out or is already free.
    pub fn release(&mut self, index: usize) -> bool {
        index < self.high_water && self.free.insert(index)
    }

    pub fn is_live(&self, index: usize) -> bool {
        index < self.high_water && !self.free.contains(&index)
    }

    pub fn live_count(&self) -> usize {
        self.high_water - self.free.len()
    }

    pub fn high_water(&self) -> usize {
        self.high_water
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}

#[derive(Debug, Clone)]
pub struct AttributeMatrix<K: AttributeKey> {
    values: Vec<Decimal>,
    allocator: IndexAllocator,
    row_ids: Vec<Option<u64>>,
    id_index: BTreeMap<u64, usize>,
    next_id: u64,
    _key: PhantomData<K>,
}

impl<K: AttributeKey> Default for AttributeMatrix<K> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<K: AttributeKey> AttributeMatrix<K> {
    /// A `Some` capacity pre-sizes storage and turns overflow into an error.
    pub fn new(capacity: Option<usize>) -> Self {
        let reserve = capacity.unwrap_or(0);
        Self {
            values: Vec::with_capacity(reserve * K::COUNT),
            allocator: IndexAllocator::new(capacity),
            row_ids: Vec::with_capacity(reserve),
            id_index: BTreeMap::new(),
            next_id: 0,
            _key: PhantomData,
        }
    }

    /// Allocates a zeroed row with a fresh logical identifier.
    pub fn allocate(&mut self) -> Result<usize, SimError> {
        let row = self.allocator.allocate()?;
        if row >= self.row_ids.len() {
            self.row_ids.resize(row + 1, None);
            self.values.resize((row + 1) * K::COUNT, Decimal::ZERO);
        }
        self.clear_row(row);
        self.assign_identifier(row);
        Ok(row)
    }

    /// Gives a live row a new logical identifier and zeroes its values.
    pub fn renew(&mut self, row: usize) -> Result<u64, SimError> {
        if !self.allocator.is_live(row) {
            return Err(SimError::upstream(format!("row {row} is not live")));
        }
        self.forget_identifier(row);
        self.clear_row(row);
        Ok(self.assign_identifier(row))
    }

    pub fn release(&mut self, row: usize) -> bool {
        if !self.allocator.release(row) {
            return false;
        }
        self.forget_identifier(row);
        self.clear_row(row);
        true
    }

    /// Panics if `row` was never allocated.
    pub fn get(&self, row: usize, key: K) -> Decimal {
        self.values[row * K::COUNT + key.column()]
    }

    pub fn set(&mut self, row: usize, key: K, value: Decimal) {
        self.values[row * K::COUNT + key.column()] = value;
    }

    pub fn add(&mut self, row: usize, key: K, delta: Decimal) {
        self.values[row * K::COUNT + key.column()] += delta;
    }

    pub fn row(&self, row: usize) -> &[Decimal] {
        let start = row * K::COUNT;
        &self.values[start..start + K::COUNT]
    }

    pub fn identifier(&self, row: usize) -> Option<u64> {
        self.row_ids.get(row).copied().flatten()
    }

    pub fn row_of(&self, identifier: u64) -> Option<usize> {
        self.id_index.get(&identifier).copied()
    }

    pub fn is_live(&self, row: usize) -> bool {
        self.allocator.is_live(row)
    }

    pub fn live_rows(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.allocator.high_water()).filter(|row| self.allocator.is_live(*row))
    }

    pub fn len(&self) -> usize {
        self.allocator.live_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn row_count(&self) -> usize {
        self.allocator.high_water()
    }

    fn clear_row(&mut self, row: usize) {
        let start = row * K::COUNT;
        self.values[start..start + K::COUNT].fill(Decimal::ZERO);
    }

    fn assign_identifier(&mut self, row: usize) -> u64 {
        let identifier = self.next_id;
        self.next_id += 1;
        self.row_ids[row] = Some(identifier);
        self.id_index.insert(identifier, row);
        self.set(row, K::IDENTIFIER, Decimal::from(identifier));
        identifier
    }

    fn forget_identifier(&mut self, row: usize) {
        if let Some(identifier) = self.row_ids[row].take() {
            self.id_index.remove(&identifier);
        }
    }
}
