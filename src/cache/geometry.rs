use crate::sim::config::CacheConfig;

/// Address slicing for a set-associative array: `| tag | index | offset |`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub sets: usize,
    pub ways: usize,
    offset_bits: u32,
    index_bits: u32,
}

impl Geometry {
    /// `sets` and `block_size` must be powers of two; `CacheConfig::ensure_valid` checks this.
    pub fn new(sets: usize, ways: usize, block_size: usize) -> Self {
        debug_assert!(sets.is_power_of_two() && block_size.is_power_of_two());
        Self {
            sets,
            ways,
            offset_bits: block_size.trailing_zeros(),
            index_bits: sets.trailing_zeros(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.num_sets(), config.assoc, config.block_size)
    }

    pub fn offset_bits(&self) -> u32 {
        self.offset_bits
    }

    pub fn block_size(&self) -> u64 {
        1u64 << self.offset_bits
    }

    /// Address with the block offset cleared.
    pub fn line_of(&self, addr: u64) -> u64 {
        addr & !(self.block_size() - 1)
    }

    pub fn index_of(&self, addr: u64) -> usize {
        ((addr >> self.offset_bits) as usize) & (self.sets - 1)
    }

    pub fn tag_of(&self, addr: u64) -> u64 {
        addr.checked_shr(self.offset_bits + self.index_bits).unwrap_or(0)
    }

    /// Bits of an address that make up the tag.
    pub fn tag_mask(&self) -> u64 {
        let low = self.offset_bits + self.index_bits;
        if low >= 64 {
            0
        } else {
            !0u64 << low
        }
    }

    pub fn num_slots(&self) -> usize {
        self.sets * self.ways
    }
}
