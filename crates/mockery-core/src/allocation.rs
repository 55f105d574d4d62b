//! Test-owned heap block bookkeeping
//!
//! Blocks live inside the tracker and are addressed by synthetic [`Address`]es,
//! so code under test can hand addresses around like pointers while every read
//! and write stays bounds-checked. A [`Checkpoint`] captures the live address set
//! before an item runs; diffing against it afterwards yields the leaked blocks.

use crate::errors::{FailureKind, TestFailure};
use crate::location::SourceLocation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::{debug, warn};

/// Byte pattern written into freshly allocated (non-zeroed) blocks
pub const DEFAULT_ALLOC_FILL: u8 = 0xBA;

/// First address handed out; keeps real-looking, non-null values
const BASE_ADDRESS: u64 = 0x1000;
/// Blocks start on this boundary with at least this much space in between
const ALIGNMENT: u64 = 16;

/// Address of a tracked block
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Address(u64);

impl Address {
    /// The null address; never refers to a block
    pub const NULL: Address = Address(0);

    /// Wrap a raw address
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Whether this is [`Address::NULL`]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// One outstanding block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    /// Block address
    pub address: Address,
    /// Requested size in bytes
    pub size: usize,
    /// Allocation site
    pub location: SourceLocation,
}

impl AllocationRecord {
    /// Report this block as leaked by `owner`
    pub fn into_leak(self, owner: &str) -> TestFailure {
        let message = format!(
            "{owner} leaked block {} ({} bytes)",
            self.address, self.size
        );
        TestFailure::new(FailureKind::MemoryLeak, self.location, message)
    }
}

/// Why a tracked free was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FreeError {
    /// Freeing the null address
    #[error("attempt to free a null block")]
    Null,
    /// No live block at the address (double free or foreign address)
    #[error("{0} is not an allocated block")]
    UnknownBlock(Address),
}

impl FreeError {
    /// Report the rejected free
    pub fn into_failure(self, location: SourceLocation) -> TestFailure {
        TestFailure::new(FailureKind::InvalidFree, location, self.to_string())
    }
}

/// Immutable snapshot of the live address set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    live: BTreeSet<Address>,
}

impl Checkpoint {
    /// Whether the block was live when the snapshot was taken
    pub fn contains(&self, address: Address) -> bool {
        self.live.contains(&address)
    }

    /// Number of blocks live at snapshot time
    pub fn len(&self) -> usize {
        self.live.len()
    }

    /// Whether no blocks were live at snapshot time
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[derive(Debug, Clone)]
struct Block {
    record: AllocationRecord,
    data: Vec<u8>,
}

/// Live test-owned blocks
#[derive(Debug, Clone)]
pub struct AllocationTracker {
    blocks: BTreeMap<Address, Block>,
    next_address: u64,
    bytes_in_use: usize,
    heap_limit: Option<usize>,
    fill: u8,
}

impl Default for AllocationTracker {
    fn default() -> Self {
        Self::new(None, DEFAULT_ALLOC_FILL)
    }
}

impl AllocationTracker {
    /// Create a tracker with an optional byte cap and an allocation fill pattern
    pub fn new(heap_limit: Option<usize>, fill: u8) -> Self {
        Self {
            blocks: BTreeMap::new(),
            next_address: BASE_ADDRESS,
            bytes_in_use: 0,
            heap_limit,
            fill,
        }
    }

    /// Allocate `size` bytes filled with the allocation pattern
    ///
    /// Returns `None` when the heap limit would be exceeded.
    pub fn alloc(&mut self, size: usize, location: SourceLocation) -> Option<Address> {
        self.allocate(size, self.fill, location)
    }

    /// Allocate `count * size` zeroed bytes; `None` on overflow or exhaustion
    pub fn calloc(&mut self, count: usize, size: usize, location: SourceLocation) -> Option<Address> {
        let total = count.checked_mul(size)?;
        self.allocate(total, 0, location)
    }

    fn allocate(&mut self, size: usize, fill: u8, location: SourceLocation) -> Option<Address> {
        let in_use = self.bytes_in_use.checked_add(size)?;
        if self.heap_limit.is_some_and(|limit| in_use > limit) {
            debug!(size, in_use = self.bytes_in_use, "Tracked allocation refused by heap limit");
            return None;
        }

        let span = u64::try_from(size).ok()?.max(1);
        let stride = span.checked_add(2 * ALIGNMENT - 1)? / ALIGNMENT * ALIGNMENT;
        let address = Address(self.next_address);
        self.next_address = self.next_address.checked_add(stride)?;

        self.bytes_in_use = in_use;
        debug!(%address, size, %location, "Tracked allocation");
        self.blocks.insert(
            address,
            Block {
                record: AllocationRecord {
                    address,
                    size,
                    location,
                },
                data: vec![fill; size],
            },
        );
        Some(address)
    }

    /// Release the block at `address`
    pub fn free(
        &mut self,
        address: Address,
        location: &SourceLocation,
    ) -> Result<AllocationRecord, FreeError> {
        if address.is_null() {
            warn!(%location, "Free of null block");
            return Err(FreeError::Null);
        }
        let Some(block) = self.blocks.remove(&address) else {
            warn!(%address, %location, "Free of unknown block");
            return Err(FreeError::UnknownBlock(address));
        };
        self.bytes_in_use -= block.record.size;
        debug!(%address, size = block.record.size, %location, "Tracked free");
        Ok(block.record)
    }

    /// Snapshot the live address set
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            live: self.blocks.keys().copied().collect(),
        }
    }

    /// Blocks live now that were not live at `checkpoint`, in address order
    pub fn diff(&self, checkpoint: &Checkpoint) -> Vec<AllocationRecord> {
        self.blocks
            .values()
            .filter(|block| !checkpoint.contains(block.record.address))
            .map(|block| block.record.clone())
            .collect()
    }

    /// Free every block allocated since `checkpoint`, returning their records
    pub fn reclaim(&mut self, checkpoint: &Checkpoint) -> Vec<AllocationRecord> {
        let leaked: Vec<Address> = self
            .blocks
            .keys()
            .filter(|address| !checkpoint.contains(**address))
            .copied()
            .collect();
        let mut records = Vec::with_capacity(leaked.len());
        for address in leaked {
            if let Some(block) = self.blocks.remove(&address) {
                self.bytes_in_use -= block.record.size;
                records.push(block.record);
            }
        }
        records
    }

    /// Contents of a live block
    pub fn block(&self, address: Address) -> Option<&[u8]> {
        self.blocks.get(&address).map(|block| block.data.as_slice())
    }

    /// Mutable contents of a live block
    pub fn block_mut(&mut self, address: Address) -> Option<&mut [u8]> {
        self.blocks
            .get_mut(&address)
            .map(|block| block.data.as_mut_slice())
    }

    /// Bookkeeping record of a live block
    pub fn record(&self, address: Address) -> Option<&AllocationRecord> {
        self.blocks.get(&address).map(|block| &block.record)
    }

    /// Number of live blocks
    pub fn live_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// Bytes held by live blocks
    pub fn bytes_in_use(&self) -> usize {
        self.bytes_in_use
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(line: u32) -> SourceLocation {
        SourceLocation::new("allocation.rs", line)
    }

    #[test]
    fn test_alloc_fill_and_calloc_zeroes() {
        let mut heap = AllocationTracker::default();
        let a = heap.alloc(4, at(1)).unwrap();
        let b = heap.calloc(2, 3, at(2)).unwrap();

        assert_eq!(heap.block(a), Some(&[0xBA; 4][..]));
        assert_eq!(heap.block(b), Some(&[0u8; 6][..]));
        assert_eq!(heap.bytes_in_use(), 10);
        assert!(b > a);
    }

    #[test]
    fn test_addresses_are_distinct_for_empty_blocks() {
        let mut heap = AllocationTracker::default();
        let a = heap.alloc(0, at(1)).unwrap();
        let b = heap.alloc(0, at(1)).unwrap();
        assert_ne!(a, b);
        assert!(!a.is_null());
    }

    #[test]
    fn test_heap_limit_and_overflow() {
        let mut heap = AllocationTracker::new(Some(8), DEFAULT_ALLOC_FILL);
        assert!(heap.alloc(8, at(1)).is_some());
        assert!(heap.alloc(1, at(2)).is_none());
        assert!(heap.calloc(usize::MAX, 2, at(3)).is_none());
    }

    #[test]
    fn test_invalid_frees() {
        let mut heap = AllocationTracker::default();
        let a = heap.alloc(16, at(1)).unwrap();

        assert!(heap.free(a, &at(2)).is_ok());
        assert_eq!(heap.free(a, &at(3)), Err(FreeError::UnknownBlock(a)));
        assert_eq!(heap.free(Address::NULL, &at(4)), Err(FreeError::Null));
        assert_eq!(heap.bytes_in_use(), 0);
    }

    #[test]
    fn test_checkpoint_diff_and_reclaim() {
        let mut heap = AllocationTracker::default();
        let before = heap.alloc(1, at(1)).unwrap();
        let checkpoint = heap.checkpoint();
        let leaked = heap.alloc(32, at(7)).unwrap();
        let freed = heap.alloc(2, at(8)).unwrap();
        heap.free(freed, &at(9)).unwrap();

        let diff = heap.diff(&checkpoint);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].address, leaked);
        assert_eq!(diff[0].location, at(7));

        let reclaimed = heap.reclaim(&checkpoint);
        assert_eq!(reclaimed, diff);
        assert_eq!(heap.live_blocks(), 1);
        assert!(heap.block(before).is_some());
    }

    #[test]
    fn test_block_writes_are_bounded() {
        let mut heap = AllocationTracker::default();
        let a = heap.alloc(4, at(1)).unwrap();
        heap.block_mut(a).unwrap().copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(heap.block(a).unwrap(), &[1, 2, 3, 4]);
        assert!(heap.block_mut(Address::from_raw(a.as_u64() + 1)).is_none());
    }
}
