use std::ops::Range;

use log::{debug, trace, warn};

use crate::cache_line::CacheLine;
use crate::config::{CacheConfig, WORD_BYTES};
use crate::error::{AccessError, ConfigError};

/// Splits an address into `tag | block index | byte offset`.
///
/// The three fields partition the 64 address bits with no overlap, so
/// [`AddressLayout::compose`] rebuilds any address from its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressLayout {
    line_size: u64,
    bits_for_line_offset: u32,
    block_index_mask: u64,
    tag_shift: u32,
}

impl AddressLayout {
    pub fn new(config: &CacheConfig) -> Self {
        let bits_for_line_offset = config.line_size().trailing_zeros();
        let bits_for_block_index = config.num_blocks().trailing_zeros();
        AddressLayout {
            line_size: config.line_size(),
            bits_for_line_offset,
            block_index_mask: (1u64 << bits_for_block_index) - 1,
            tag_shift: bits_for_block_index + bits_for_line_offset,
        }
    }

    pub fn bits_for_line_offset(&self) -> u32 {
        self.bits_for_line_offset
    }

    pub fn tag_shift(&self) -> u32 {
        self.tag_shift
    }

    /// Address of the first byte of the line holding `address`.
    pub fn line_address(&self, address: u64) -> u64 {
        (address >> self.bits_for_line_offset) << self.bits_for_line_offset
    }

    pub fn byte_index(&self, address: u64) -> u64 {
        address & (self.line_size - 1)
    }

    pub fn word_index(&self, address: u64) -> usize {
        (self.byte_index(address) / WORD_BYTES) as usize
    }

    /// The memory line index modulo the number of blocks.
    pub fn block_index(&self, address: u64) -> usize {
        ((address >> self.bits_for_line_offset) & self.block_index_mask) as usize
    }

    pub fn tag_of(&self, address: u64) -> u64 {
        address >> self.tag_shift
    }

    pub fn compose(&self, tag: u64, block_index: usize, byte_index: u64) -> u64 {
        (tag << self.tag_shift)
            | ((block_index as u64) << self.bits_for_line_offset)
            | byte_index
    }
}

/// Set-associative line storage.
///
/// `lines` holds `num_blocks` contiguous groups of `num_ways` ways. Blocks
/// are handed out as sub-slices of it.
#[derive(Debug)]
pub struct CacheStore {
    config: CacheConfig,
    layout: AddressLayout,
    lines: Vec<CacheLine>,
    // per block: ways in install order, oldest first
    fill_order: Vec<Vec<usize>>,
    evictions: u64,
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        let num_lines = config.num_lines() as usize;
        let num_blocks = config.num_blocks() as usize;
        CacheStore {
            config,
            layout: AddressLayout::new(&config),
            lines: vec![CacheLine::new(); num_lines],
            fill_order: (0..num_blocks)
                .map(|_| Vec::with_capacity(config.num_ways() as usize))
                .collect(),
            evictions: 0,
        }
    }

    pub fn with_sizes(
        memory_size: u64,
        cache_size: u64,
        line_size: u64,
        num_ways: u64,
    ) -> Result<Self, ConfigError> {
        CacheConfig::new(memory_size, cache_size, line_size, num_ways).map(CacheStore::new)
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn layout(&self) -> &AddressLayout {
        &self.layout
    }

    pub fn num_blocks(&self) -> usize {
        self.fill_order.len()
    }

    pub fn num_ways(&self) -> usize {
        self.config.num_ways() as usize
    }

    /// Number of occupied ways that were claimed for a different line.
    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    pub fn line_address(&self, address: u64) -> u64 {
        self.layout.line_address(address)
    }

    pub fn byte_index(&self, address: u64) -> u64 {
        self.layout.byte_index(address)
    }

    pub fn word_index(&self, address: u64) -> usize {
        self.layout.word_index(address)
    }

    pub fn block_index(&self, address: u64) -> usize {
        self.layout.block_index(address)
    }

    pub fn tag_of(&self, address: u64) -> u64 {
        self.layout.tag_of(address)
    }

    fn block_range(&self, block: usize) -> Range<usize> {
        let start = block * self.num_ways();
        start..start + self.num_ways()
    }

    pub fn block(&self, block: usize) -> Option<&[CacheLine]> {
        if block < self.num_blocks() {
            Some(&self.lines[self.block_range(block)])
        } else {
            None
        }
    }

    /// Way within the block of `address` that holds its tag.
    fn find_way(&self, address: u64) -> Option<usize> {
        let tag = self.tag_of(address);
        self.block(self.block_index(address))?
            .iter()
            .position(|line| line.tag() == Some(tag))
    }

    /// The resident line for `address`, valid or not.
    pub fn find_line(&self, address: u64) -> Option<&CacheLine> {
        let way = self.find_way(address)?;
        let block = self.block_index(address);
        Some(&self.lines[self.block_range(block).start + way])
    }

    pub fn find_line_mut(&mut self, address: u64) -> Option<&mut CacheLine> {
        let way = self.find_way(address)?;
        let start = self.block_range(self.block_index(address)).start;
        Some(&mut self.lines[start + way])
    }

    /// Way to fill next in `block`: the first empty way, otherwise the way
    /// installed longest ago. `None` if `block` does not exist.
    pub fn pick_or_evict(&self, block: usize) -> Option<usize> {
        let lines = self.block(block)?;
        let way = lines
            .iter()
            .position(CacheLine::is_empty)
            .or_else(|| self.fill_order[block].first().copied())
            .unwrap_or(0);
        Some(way)
    }

    /// Installs `source` as the line for `address` and returns the slot.
    ///
    /// A resident tag keeps its way; otherwise a way is claimed with
    /// [`CacheStore::pick_or_evict`]. `source` must hold at least one line;
    /// only the first line's worth of words is taken.
    pub fn allocate_line(
        &mut self,
        address: u64,
        source: &[u32],
    ) -> Result<&CacheLine, AccessError> {
        let (index, _) = self.install(address, source)?;
        Ok(&self.lines[index])
    }

    /// Loads `source` into the way for `address`. Returns the slot index and
    /// whether the tag was already resident.
    fn install(&mut self, address: u64, source: &[u32]) -> Result<(usize, bool), AccessError> {
        let words = self.config.words_per_line();
        if source.len() < words {
            return Err(AccessError::ShortBuffer {
                expected: words,
                actual: source.len(),
            });
        }

        let block = self.block_index(address);
        let tag = self.tag_of(address);
        let (way, hit) = match self.find_way(address) {
            Some(way) => (way, true),
            None => (self.claim_way(block), false),
        };
        let index = self.block_range(block).start + way;
        self.lines[index].load(tag, &source[..words])?;
        trace!(
            "install {} 0x{address:016x} -> block {block} way {way}",
            if hit { "hit" } else { "miss" }
        );
        Ok((index, hit))
    }

    fn claim_way(&mut self, block: usize) -> usize {
        // block_index() is masked to num_blocks, so the block always exists
        let way = self.pick_or_evict(block).unwrap_or(0);
        let index = self.block_range(block).start + way;

        let victim = &mut self.lines[index];
        if let Some(old_tag) = victim.tag() {
            debug!("block {block}: evict way {way} holding tag 0x{old_tag:x}");
            self.evictions += 1;
        }
        victim.set_empty();

        let order = &mut self.fill_order[block];
        order.retain(|&w| w != way);
        order.push(way);
        way
    }

    /// Copies the line holding `address` into `dest`. Returns false on a
    /// miss, on an invalidated line, or when `dest` cannot hold a line;
    /// `dest` is untouched in all three cases.
    pub fn get_data_line(&self, address: u64, dest: &mut [u32]) -> bool {
        let words = self.config.words_per_line();
        if dest.len() < words {
            warn!(
                "read of 0x{address:016x} into a {}-word buffer, line needs {words}",
                dest.len()
            );
            return false;
        }

        let Some(line) = self.find_line(address) else {
            trace!("read miss 0x{address:016x}");
            return false;
        };
        if !line.is_valid() {
            trace!("read of invalidated line 0x{address:016x}");
            return false;
        }
        let Some(data) = line.words().filter(|data| data.len() == words) else {
            warn!("line for 0x{address:016x} does not hold {words} words");
            return false;
        };
        dest[..words].copy_from_slice(data);
        trace!("read hit 0x{address:016x}");
        true
    }

    /// Loads a whole line for `address`, allocating a way if its tag is not
    /// resident. Returns whether the tag was resident before the call.
    pub fn set_data_line(&mut self, address: u64, source: &[u32]) -> Result<bool, AccessError> {
        self.install(address, source).map(|(_, hit)| hit)
    }

    /// Marks the line for `address` invalid. Returns false if it was not
    /// resident.
    pub fn invalidate(&mut self, address: u64) -> bool {
        match self.find_line_mut(address) {
            Some(line) => {
                line.invalidate();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_store() -> CacheStore {
        // 8 blocks of 2 ways, 8-byte lines
        CacheStore::with_sizes(1 << 10, 1 << 7, 8, 2).unwrap()
    }

    #[test]
    fn word_and_byte_index() {
        let cs = small_store();
        assert_eq!(cs.word_index(0x0), 0);
        assert_eq!(cs.word_index(0x4), 1);
        assert_eq!(cs.word_index(0x8), 0);
        assert_eq!(cs.word_index(0xC), 1);
        assert_eq!(cs.word_index(0xFFFF), 1);
        assert_eq!(cs.word_index(0xFFFF + 1), 0);
        for offset in 0..8 {
            assert_eq!(cs.byte_index(0xFFF8 + offset), offset);
        }
    }

    #[test]
    fn line_address_clears_offset_bits() {
        let cs = small_store();
        assert_eq!(cs.line_address(u64::MAX), 0xFFFF_FFFF_FFFF_FFF8);
        assert_eq!(cs.line_address(0x1237), 0x1230);
    }

    #[test]
    fn block_index_wraps_on_memory_line() {
        let cs = small_store();
        assert_eq!(cs.block_index(0b0000_0000), 0);
        assert_eq!(cs.block_index(0b0000_1000), 1);
        assert_eq!(cs.block_index(0b0001_0000), 2);
        assert_eq!(cs.block_index(0b0001_1000), 3);
        assert_eq!(cs.block_index(0b0010_0000), 4);
        assert_eq!(cs.block_index(0b0011_1000), 7);
        assert_eq!(cs.block_index(0b0100_0000), 0);
        assert_eq!(cs.block_index(0b0100_1000), 1);
        assert_eq!(cs.block_index(0b0111_1000), 7);
        assert_eq!(cs.block_index(0b1000_0000), 0);
    }

    #[test]
    fn tag_is_high_bits() {
        let cs = small_store();
        assert_eq!(cs.layout().tag_shift(), 6);
        assert_eq!(cs.tag_of(1 << 5), 0);
        assert_eq!(cs.tag_of(2 << 5), 1);
        assert_eq!(cs.tag_of(3 << 5), 1);
        assert_eq!(cs.tag_of(10 << 5), 5);
        assert_eq!(cs.tag_of(777 << 6), 777);
        assert_eq!(cs.tag_of(3 << 7), 6);
    }

    #[test]
    fn allocate_prefers_empty_ways_then_oldest() {
        let mut cs = small_store();
        let data = [0, 1];
        let addrs = [0x0_0000, 0x1_0000, 0x2_0000, 0x3_0000];
        assert!(addrs.iter().all(|&a| cs.block_index(a) == 0));

        let line = cs.allocate_line(addrs[0], &data).unwrap();
        assert_eq!(line.tag(), Some(0));
        assert_eq!(cs.pick_or_evict(0), Some(1));

        cs.allocate_line(addrs[1], &data).unwrap();
        assert_eq!(cs.block(0).unwrap()[0].tag(), Some(0));
        assert_eq!(cs.block(0).unwrap()[1].tag(), Some(1024));

        // both ways taken: the first one installed goes first
        assert_eq!(cs.pick_or_evict(0), Some(0));
        let line = cs.allocate_line(addrs[2], &data).unwrap();
        assert_eq!(line.tag(), Some(2048));
        assert_eq!(cs.block(0).unwrap()[0].tag(), Some(2048));

        cs.allocate_line(addrs[3], &data).unwrap();
        assert_eq!(cs.block(0).unwrap()[1].tag(), Some(3072));
        assert_eq!(cs.evictions(), 2);
    }

    #[test]
    fn allocate_reuses_resident_way() {
        let mut cs = small_store();
        cs.set_data_line(0x40, &[1, 2]).unwrap();
        let line = cs.allocate_line(0x40, &[5, 6]).unwrap();
        assert_eq!(line.words(), Some(&[5, 6][..]));

        let tag = cs.tag_of(0x40);
        let block = cs.block(cs.block_index(0x40)).unwrap();
        assert_eq!(block.iter().filter(|l| l.tag() == Some(tag)).count(), 1);
        assert!(block[1].is_empty());
        assert_eq!(cs.evictions(), 0);
    }

    #[test]
    fn allocate_takes_whole_lines_only() {
        let mut cs = small_store();
        assert_eq!(
            cs.allocate_line(0x40, &[1]).map(|line| line.tag()),
            Err(AccessError::ShortBuffer {
                expected: 2,
                actual: 1
            })
        );
        assert!(cs.find_line(0x40).is_none());

        // extra words are dropped, so later reads see exactly one line
        cs.allocate_line(0x40, &[1, 2, 3, 4]).unwrap();
        let mut out = [0u32; 2];
        assert!(cs.get_data_line(0x40, &mut out));
        assert_eq!(out, [1, 2]);
    }

    #[test]
    fn hits_do_not_refresh_eviction_order() {
        let mut cs = small_store();
        let mut out = [0u32; 2];
        cs.set_data_line(0x0_0000, &[1, 1]).unwrap();
        cs.set_data_line(0x1_0000, &[2, 2]).unwrap();

        // touch the oldest line; it is still the next victim
        assert!(cs.get_data_line(0x0_0000, &mut out));
        assert_eq!(cs.set_data_line(0x0_0000, &[3, 3]), Ok(true));
        assert_eq!(cs.set_data_line(0x2_0000, &[4, 4]), Ok(false));

        assert!(cs.find_line(0x0_0000).is_none());
        assert!(cs.get_data_line(0x1_0000, &mut out));
        assert_eq!(out, [2, 2]);
    }

    #[test]
    fn store_can_move_across_threads() {
        fn assert_send<T: Send>() {}
        assert_send::<CacheStore>();
    }

    #[test]
    fn pick_or_evict_rejects_missing_block() {
        let cs = small_store();
        assert_eq!(cs.pick_or_evict(cs.num_blocks()), None);
        assert!(cs.block(cs.num_blocks()).is_none());
    }

    #[test]
    fn get_and_set_data_line() {
        let mut cs = small_store();
        let adr1 = 0x0_0000;
        let adr2 = 0x1_0000;
        let mut out = [0u32; 2];

        assert_eq!(cs.set_data_line(adr1, &[0, 1]), Ok(false));
        assert!(cs.get_data_line(adr1, &mut out));
        assert_eq!(out, [0, 1]);

        assert_eq!(cs.set_data_line(adr2, &[10, 11]), Ok(false));
        assert!(cs.get_data_line(adr2, &mut out));
        assert_eq!(out, [10, 11]);

        assert_eq!(cs.set_data_line(adr1, &[10, 17]), Ok(true));
        assert!(cs.get_data_line(adr1, &mut out));
        assert_eq!(out, [10, 17]);

        let bytes: [u8; 8] = [10, 11, 12, 13, 14, 15, 16, 17];
        let packed = [
            u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        ];
        assert_eq!(cs.set_data_line(adr2, &packed), Ok(true));
        assert!(cs.get_data_line(adr2, &mut out));
        assert_eq!(out[1].to_le_bytes()[3], 17);

        let mut untouched = [99u32; 2];
        assert!(!cs.get_data_line(0x2_0000, &mut untouched));
        assert_eq!(untouched, [99, 99]);
    }

    #[test]
    fn short_buffers_are_refused() {
        let mut cs = small_store();
        assert_eq!(
            cs.set_data_line(0x40, &[1]),
            Err(AccessError::ShortBuffer {
                expected: 2,
                actual: 1
            })
        );
        assert!(cs.find_line(0x40).is_none());

        cs.set_data_line(0x40, &[1, 2]).unwrap();
        let mut out = [0u32; 1];
        assert!(!cs.get_data_line(0x40, &mut out));
        assert_eq!(out, [0]);

        // longer buffers only take one line
        let mut wide = [7u32; 4];
        assert!(cs.get_data_line(0x40, &mut wide));
        assert_eq!(wide, [1, 2, 7, 7]);
    }

    #[test]
    fn invalidate_keeps_line_resident() {
        let mut cs = small_store();
        cs.set_data_line(0x1100, &[5, 6]).unwrap();
        assert!(cs.invalidate(0x1100));

        let mut out = [0u32; 2];
        assert!(!cs.get_data_line(0x1100, &mut out));
        let line = cs.find_line(0x1100).unwrap();
        assert!(!line.is_valid());
        assert_eq!(line.tag(), Some(cs.tag_of(0x1100)));

        assert!(!cs.invalidate(0x2200));

        // reloading an invalidated line reuses its way and revalidates it
        assert_eq!(cs.set_data_line(0x1100, &[7, 8]), Ok(true));
        assert!(cs.get_data_line(0x1100, &mut out));
        assert_eq!(out, [7, 8]);
    }
}
