//! Uniform sampling from streams of unknown length (Vitter's Algorithm R).
//!
//! [`Reservoir`] holds at most `capacity` items regardless of how many are
//! offered. After `n >= capacity` offers every item is retained with
//! probability `capacity / n`, independent of arrival order.
//!
//! [`ReservoirSampler`] applies the same algorithm to the rows of Arrow
//! record batches. The rows a chunk leaves in the reservoir are copied out
//! with one `take` per chunk, so a sample never pins the buffers of the chunk
//! it came from.
use std::sync::Arc;

use arrow::{
    array::UInt32Array,
    compute::{interleave_record_batch, take_record_batch},
    datatypes::{Schema, SchemaRef},
    record_batch::RecordBatch,
};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::errors::SamplingError;

/// Algorithm R over arbitrary items.
///
/// Items are stored with their origin index, the 0-based position at which
/// they arrived in the stream.
#[derive(Debug)]
pub struct Reservoir<T> {
    capacity: usize,
    items: Vec<(u64, T)>,
    items_seen: u64,
    rng: StdRng,
}

impl<T> Reservoir<T> {
    /// Create a reservoir holding up to `capacity` items.
    ///
    /// A `seed` makes the sequence of replacement decisions reproducible.
    pub fn new(capacity: usize, seed: Option<u64>) -> Result<Self, SamplingError> {
        if capacity == 0 {
            return Err(SamplingError::ZeroCapacity);
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            capacity,
            // Small capacities are allocated up front, large ones grow with the stream.
            items: Vec::with_capacity(capacity.min(4096)),
            items_seen: 0,
            rng,
        })
    }

    /// Offer one item. Returns the slot it landed in, or `None` if discarded.
    pub fn offer(&mut self, item: T) -> Option<usize> {
        match self.try_offer_with(|| Ok::<T, std::convert::Infallible>(item)) {
            Ok(slot) => slot,
            Err(never) => match never {},
        }
    }

    /// Offer one item that is only built when it is actually retained.
    ///
    /// The replacement decision is drawn before `make` runs, so an error from
    /// `make` still counts the item as seen.
    pub fn try_offer_with<E, F>(&mut self, make: F) -> Result<Option<usize>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        self.items_seen += 1;
        let origin = self.items_seen - 1;

        if self.items.len() < self.capacity {
            self.items.push((origin, make()?));
            return Ok(Some(self.items.len() - 1));
        }

        let j = self.rng.random_range(0..self.items_seen);
        if j < self.capacity as u64 {
            let slot = j as usize;
            self.items[slot] = (origin, make()?);
            Ok(Some(slot))
        } else {
            Ok(None)
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of items offered so far.
    pub fn items_seen(&self) -> u64 {
        self.items_seen
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// True once more items were offered than the reservoir can hold.
    pub fn is_saturated(&self) -> bool {
        self.items_seen > self.capacity as u64
    }

    /// Retained `(origin_index, item)` pairs in slot order.
    pub fn entries(&self) -> &[(u64, T)] {
        &self.items
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.items.iter().map(|(_, item)| item)
    }

    fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut().map(|(_, item)| item)
    }
}

/// Snapshot of a [`ReservoirSampler`].
#[derive(Debug, Clone)]
pub struct Sample {
    /// Sampled rows, in reservoir slot order
    pub batch: RecordBatch,
    /// Dataset row index of each sampled row
    pub origin_indices: Vec<u64>,
    /// Number of rows offered to the sampler
    pub population_size: u64,
}

impl Sample {
    pub fn len(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.num_rows() == 0
    }
}

/// Position of a retained row: `(segment, row within the segment)`.
type RowRef = (usize, usize);

/// Row-level reservoir sampling over record batches.
///
/// Retained rows live in segments, one compacted batch per chunk that
/// contributed rows. Segments are merged once replaced rows make up more
/// than half of what they hold.
#[derive(Debug)]
pub struct ReservoirSampler {
    reservoir: Reservoir<RowRef>,
    segments: Vec<RecordBatch>,
    schema: Option<SchemaRef>,
}

impl ReservoirSampler {
    pub fn new(capacity: usize, seed: Option<u64>) -> Result<Self, SamplingError> {
        Ok(Self {
            reservoir: Reservoir::new(capacity, seed)?,
            segments: Vec::new(),
            schema: None,
        })
    }

    /// Consume every row of `chunk`, in order.
    pub fn add_chunk(&mut self, chunk: &RecordBatch) -> Result<(), SamplingError> {
        match &self.schema {
            Some(schema) if schema.as_ref() != chunk.schema().as_ref() => {
                return Err(SamplingError::SchemaMismatch);
            }
            Some(_) => {}
            None => self.schema = Some(chunk.schema()),
        }

        let segment = self.segments.len();
        for row in 0..chunk.num_rows() {
            self.reservoir.offer((segment, row));
        }

        // Rows of this chunk that survived its own replacements, in slot order.
        let mut kept = Vec::new();
        for item in self.reservoir.values_mut() {
            if item.0 == segment {
                kept.push(item.1 as u32);
                item.1 = kept.len() - 1;
            }
        }
        if kept.is_empty() {
            return Ok(());
        }
        self.segments
            .push(take_record_batch(chunk, &UInt32Array::from(kept))?);

        if self.buffered_rows() > 2 * self.reservoir.len() {
            self.compact()?;
        }
        Ok(())
    }

    /// Materialize the current reservoir without changing it.
    pub fn get_sample(&self) -> Result<Sample, SamplingError> {
        let schema = self
            .schema
            .clone()
            .unwrap_or_else(|| Arc::new(Schema::empty()));
        let batch = if self.reservoir.is_empty() {
            RecordBatch::new_empty(schema)
        } else {
            self.interleave()?
        };
        let origin_indices = self
            .reservoir
            .entries()
            .iter()
            .map(|(origin, _)| *origin)
            .collect();

        Ok(Sample {
            batch,
            origin_indices,
            population_size: self.reservoir.items_seen(),
        })
    }

    /// Rows held across segments, replaced ones included.
    pub fn buffered_rows(&self) -> usize {
        self.segments.iter().map(RecordBatch::num_rows).sum()
    }

    fn interleave(&self) -> Result<RecordBatch, SamplingError> {
        let segments: Vec<&RecordBatch> = self.segments.iter().collect();
        let indices: Vec<RowRef> = self.reservoir.values().copied().collect();
        Ok(interleave_record_batch(&segments, &indices)?)
    }

    /// Collapse every segment into one batch in slot order.
    fn compact(&mut self) -> Result<(), SamplingError> {
        let merged = self.interleave()?;
        for (slot, item) in self.reservoir.values_mut().enumerate() {
            *item = (0, slot);
        }
        self.segments = vec![merged];
        Ok(())
    }

    pub fn capacity(&self) -> usize {
        self.reservoir.capacity()
    }

    pub fn items_seen(&self) -> u64 {
        self.reservoir.items_seen()
    }

    pub fn len(&self) -> usize {
        self.reservoir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reservoir.is_empty()
    }
}
