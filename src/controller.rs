use log::{debug, trace};

use crate::backing::BackingStore;
use crate::cache_store::CacheStore;
use crate::config::{CacheConfig, WORD_BYTES};
use crate::error::{AccessError, ConfigError};
use crate::stats::CacheStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Hit,
    Miss,
}

impl Access {
    pub fn is_hit(self) -> bool {
        self == Access::Hit
    }
}

/// Word-granular front end of a [`CacheStore`].
///
/// Reads fill whole lines from the backing store on a miss. Writes go
/// through to the backing store and allocate the line on a miss.
#[derive(Debug)]
pub struct CacheController<M> {
    store: CacheStore,
    memory: M,
    stats: CacheStats,
    line_buf: Vec<u32>,
}

impl<M: BackingStore> CacheController<M> {
    /// Fails if `memory` is smaller than the address space `config`
    /// describes, since every in-range line must be fetchable.
    pub fn new(config: CacheConfig, memory: M) -> Result<Self, ConfigError> {
        if memory.size() < config.memory_size() {
            return Err(ConfigError::BackingTooSmall {
                backing_size: memory.size(),
                memory_size: config.memory_size(),
            });
        }
        Ok(CacheController {
            store: CacheStore::new(config),
            memory,
            stats: CacheStats::default(),
            line_buf: vec![0; config.words_per_line()],
        })
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut M {
        &mut self.memory
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            evictions: self.store.evictions(),
            ..self.stats.clone()
        }
    }

    fn check_address(&self, address: u64) -> Result<(), AccessError> {
        if address % WORD_BYTES != 0 {
            return Err(AccessError::Unaligned(address));
        }
        let size = self.store.config().memory_size();
        if address >= size {
            return Err(AccessError::AddressOutOfRange { address, size });
        }
        Ok(())
    }

    /// Pulls the whole line holding `address` into the cache. Leaves the
    /// line in `line_buf`.
    fn fill_line(&mut self, address: u64) -> Result<(), AccessError> {
        let line_address = self.store.line_address(address);
        self.memory.read_line(line_address, &mut self.line_buf)?;
        self.store.set_data_line(line_address, &self.line_buf)?;
        debug!("filled line 0x{line_address:016x}");
        Ok(())
    }

    pub fn read_word(&mut self, address: u64) -> Result<(u32, Access), AccessError> {
        self.check_address(address)?;
        let word = self.store.word_index(address);

        if self.store.get_data_line(address, &mut self.line_buf) {
            self.stats.read_hits += 1;
            return Ok((self.line_buf[word], Access::Hit));
        }

        self.fill_line(address)?;
        self.stats.read_misses += 1;
        Ok((self.line_buf[word], Access::Miss))
    }

    pub fn write_word(&mut self, address: u64, value: u32) -> Result<Access, AccessError> {
        self.check_address(address)?;

        if self.store.get_data_line(address, &mut self.line_buf) {
            self.line_buf[self.store.word_index(address)] = value;
            self.store.set_data_line(address, &self.line_buf)?;
            self.memory.write_word(address, value)?;
            self.stats.write_hits += 1;
            trace!("write hit 0x{address:016x} = 0x{value:08x}");
            return Ok(Access::Hit);
        }

        self.memory.write_word(address, value)?;
        self.fill_line(address)?;
        self.stats.write_misses += 1;
        trace!("write miss 0x{address:016x} = 0x{value:08x}");
        Ok(Access::Miss)
    }

    /// Drops the cached copy of `address`, as an external agent would.
    pub fn invalidate(&mut self, address: u64) -> bool {
        let resident = self.store.invalidate(address);
        if resident {
            self.stats.invalidations += 1;
        }
        resident
    }
}
