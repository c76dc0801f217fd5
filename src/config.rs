use crate::error::ConfigError;

pub const WORD_BYTES: u64 = 4;

/// Cache geometry, in bytes except for `num_ways`. Every field is a power of
/// two; [`CacheConfig::new`] refuses anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    memory_size: u64,
    cache_size: u64,
    line_size: u64,
    num_ways: u64,
}

impl CacheConfig {
    pub fn new(
        memory_size: u64,
        cache_size: u64,
        line_size: u64,
        num_ways: u64,
    ) -> Result<Self, ConfigError> {
        check_power_of_two("memory_size", memory_size)?;
        check_power_of_two("cache_size", cache_size)?;
        check_power_of_two("line_size", line_size)?;
        check_power_of_two("num_ways", num_ways)?;

        if line_size < WORD_BYTES {
            return Err(ConfigError::LineTooSmall(line_size));
        }
        if cache_size > memory_size {
            return Err(ConfigError::CacheLargerThanMemory {
                cache_size,
                memory_size,
            });
        }
        if line_size > cache_size {
            return Err(ConfigError::LineLargerThanCache {
                line_size,
                cache_size,
            });
        }
        let num_lines = cache_size / line_size;
        if num_ways > num_lines {
            return Err(ConfigError::TooManyWays {
                num_ways,
                num_lines,
            });
        }

        Ok(CacheConfig {
            memory_size,
            cache_size,
            line_size,
            num_ways,
        })
    }

    pub fn memory_size(&self) -> u64 {
        self.memory_size
    }

    pub fn cache_size(&self) -> u64 {
        self.cache_size
    }

    pub fn line_size(&self) -> u64 {
        self.line_size
    }

    pub fn num_ways(&self) -> u64 {
        self.num_ways
    }

    pub fn num_lines(&self) -> u64 {
        self.cache_size / self.line_size
    }

    pub fn num_blocks(&self) -> u64 {
        self.num_lines() / self.num_ways
    }

    pub fn words_per_line(&self) -> usize {
        (self.line_size / WORD_BYTES) as usize
    }
}

impl Default for CacheConfig {
    /// 1 GiB of memory behind a 1 MiB direct-mapped cache of 8-byte lines.
    fn default() -> Self {
        CacheConfig {
            memory_size: 1 << 30,
            cache_size: 1 << 20,
            line_size: 8,
            num_ways: 1,
        }
    }
}

fn check_power_of_two(param: &'static str, value: u64) -> Result<(), ConfigError> {
    if value.is_power_of_two() {
        Ok(())
    } else {
        Err(ConfigError::NotPowerOfTwo { param, value })
    }
}
