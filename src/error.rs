use std::error::Error;
use std::fmt;

/// Rejected cache geometry. Raised only while building a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    NotPowerOfTwo { param: &'static str, value: u64 },
    /// A line must hold at least one whole 32-bit word.
    LineTooSmall(u64),
    CacheLargerThanMemory { cache_size: u64, memory_size: u64 },
    LineLargerThanCache { line_size: u64, cache_size: u64 },
    TooManyWays { num_ways: u64, num_lines: u64 },
    /// The backing store does not cover the configured address space.
    BackingTooSmall { backing_size: u64, memory_size: u64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NotPowerOfTwo { param, value } => {
                write!(f, "{param} must be a power of two, got {value}")
            }
            ConfigError::LineTooSmall(size) => {
                write!(f, "line size {size} does not hold a whole 32-bit word")
            }
            ConfigError::CacheLargerThanMemory {
                cache_size,
                memory_size,
            } => write!(
                f,
                "cache size {cache_size} exceeds memory size {memory_size}"
            ),
            ConfigError::LineLargerThanCache {
                line_size,
                cache_size,
            } => write!(f, "line size {line_size} exceeds cache size {cache_size}"),
            ConfigError::TooManyWays {
                num_ways,
                num_lines,
            } => write!(
                f,
                "{num_ways} ways do not fit in a cache of {num_lines} lines"
            ),
            ConfigError::BackingTooSmall {
                backing_size,
                memory_size,
            } => write!(
                f,
                "backing store of {backing_size} bytes is smaller than memory size {memory_size}"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Recoverable failure of a single access. Misses are not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// Word index past the end of a line.
    OutOfRange { index: usize, len: usize },
    /// The slot has never been loaded, so it has no data buffer.
    Uninitialized,
    ShortBuffer { expected: usize, actual: usize },
    /// A loaded slot was reloaded with a line of a different length.
    LineSizeMismatch { expected: usize, actual: usize },
    Unaligned(u64),
    AddressOutOfRange { address: u64, size: u64 },
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessError::OutOfRange { index, len } => {
                write!(f, "word index {index} out of range for a {len}-word line")
            }
            AccessError::Uninitialized => write!(f, "cache line has never been loaded"),
            AccessError::ShortBuffer { expected, actual } => {
                write!(f, "buffer holds {actual} words, a line needs {expected}")
            }
            AccessError::LineSizeMismatch { expected, actual } => {
                write!(f, "line holds {expected} words, cannot load {actual}")
            }
            AccessError::Unaligned(address) => {
                write!(f, "address 0x{address:016x} is not word aligned")
            }
            AccessError::AddressOutOfRange { address, size } => write!(
                f,
                "address 0x{address:016x} outside memory of {size} bytes"
            ),
        }
    }
}

impl Error for AccessError {}
