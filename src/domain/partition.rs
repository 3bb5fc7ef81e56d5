//! Identifier-range partitioning.
//!
//! Link and edge identifiers are UUIDs ordered by their raw bytes, which is the
//! same order Postgres uses for the `uuid` type. Scans accept a half-open range
//! `[from, to)`; workers that split the keyspace with [`PartitionRange`] get
//! disjoint, contiguous ranges and therefore never process a row twice.

use uuid::Uuid;

/// Half-open identifier range `[from, to)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Partition {
    pub from: Uuid,
    pub to: Uuid,
}

impl Partition {
    pub fn new(from: Uuid, to: Uuid) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.from.as_bytes() <= id.as_bytes() && id.as_bytes() < self.to.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.from.as_bytes() >= self.to.as_bytes()
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PartitionError {
    #[error("number of partitions must be greater than zero")]
    NoPartitions,
    #[error("range start must be lower than range end")]
    InvalidRange,
    #[error("range is too narrow for {0} partitions")]
    TooManyPartitions(usize),
    #[error("partition index {0} out of bounds")]
    OutOfBounds(usize),
    #[error("identifier {0} is outside the partitioned range")]
    OutsideRange(Uuid),
}

/// Splits `[start, end)` into `n` equally sized contiguous partitions. The last
/// partition absorbs the division remainder and always ends at `end`.
#[derive(Debug, Clone)]
pub struct PartitionRange {
    start: u128,
    end: u128,
    width: u128,
    count: usize,
}

impl PartitionRange {
    pub fn new(start: Uuid, end: Uuid, count: usize) -> Result<Self, PartitionError> {
        if count == 0 {
            return Err(PartitionError::NoPartitions);
        }
        let (start, end) = (start.as_u128(), end.as_u128());
        if start >= end {
            return Err(PartitionError::InvalidRange);
        }
        let width = (end - start) / count as u128;
        if width == 0 {
            return Err(PartitionError::TooManyPartitions(count));
        }
        Ok(Self {
            start,
            end,
            width,
            count,
        })
    }

    /// Partitions covering the whole UUID keyspace.
    pub fn full(count: usize) -> Result<Self, PartitionError> {
        Self::new(Uuid::nil(), Uuid::max(), count)
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn extents(&self, index: usize) -> Result<Partition, PartitionError> {
        if index >= self.count {
            return Err(PartitionError::OutOfBounds(index));
        }
        let from = self.start + self.width * index as u128;
        let to = if index + 1 == self.count {
            self.end
        } else {
            from + self.width
        };
        Ok(Partition::new(Uuid::from_u128(from), Uuid::from_u128(to)))
    }

    pub fn partitions(&self) -> Vec<Partition> {
        (0..self.count)
            .filter_map(|i| self.extents(i).ok())
            .collect()
    }

    /// Index of the partition that owns `id`.
    pub fn partition_for(&self, id: &Uuid) -> Result<usize, PartitionError> {
        let v = id.as_u128();
        if v < self.start || v >= self.end {
            return Err(PartitionError::OutsideRange(*id));
        }
        let index = ((v - self.start) / self.width) as usize;
        Ok(index.min(self.count - 1))
    }
}
