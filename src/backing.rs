use std::collections::HashMap;

use log::{debug, trace};

use crate::config::WORD_BYTES;
use crate::error::AccessError;

/// Word-addressed memory behind the cache. Addresses are byte addresses and
/// must be word aligned.
pub trait BackingStore {
    /// Size in bytes.
    fn size(&self) -> u64;

    /// Fills `line` with consecutive words starting at `address`.
    fn read_line(&mut self, address: u64, line: &mut [u32]) -> Result<(), AccessError>;

    fn write_word(&mut self, address: u64, value: u32) -> Result<(), AccessError>;

    fn read_word(&mut self, address: u64) -> Result<u32, AccessError> {
        let mut word = [0u32; 1];
        self.read_line(address, &mut word)?;
        Ok(word[0])
    }
}

fn check_range(address: u64, words: usize, size: u64) -> Result<(), AccessError> {
    if address % WORD_BYTES != 0 {
        return Err(AccessError::Unaligned(address));
    }
    let end = address.checked_add(words as u64 * WORD_BYTES);
    match end {
        Some(end) if end <= size => Ok(()),
        _ => Err(AccessError::AddressOutOfRange { address, size }),
    }
}

/// One contiguous, zero-initialised buffer.
#[derive(Debug)]
pub struct FlatMemory {
    words: Vec<u32>,
}

impl FlatMemory {
    pub fn new(size: u64) -> Self {
        FlatMemory {
            words: vec![0; (size / WORD_BYTES) as usize],
        }
    }

    /// Copies `data` in starting at `address`.
    pub fn load(&mut self, data: &[u32], address: u64) -> Result<(), AccessError> {
        check_range(address, data.len(), self.size())?;
        let start = (address / WORD_BYTES) as usize;
        self.words[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }
}

impl BackingStore for FlatMemory {
    fn size(&self) -> u64 {
        self.words.len() as u64 * WORD_BYTES
    }

    fn read_line(&mut self, address: u64, line: &mut [u32]) -> Result<(), AccessError> {
        check_range(address, line.len(), self.size())?;
        let start = (address / WORD_BYTES) as usize;
        line.copy_from_slice(&self.words[start..start + line.len()]);
        Ok(())
    }

    fn write_word(&mut self, address: u64, value: u32) -> Result<(), AccessError> {
        check_range(address, 1, self.size())?;
        self.words[(address / WORD_BYTES) as usize] = value;
        Ok(())
    }
}

pub const PAGE_WORDS: u64 = 1024;
const PAGE_BYTES: u64 = PAGE_WORDS * WORD_BYTES;

/// Memory that only materialises the 4 KiB pages that have been touched.
///
/// A fresh page reads back as the test pattern 0, 1, 0, 1, ...
#[derive(Debug)]
pub struct SparseMemory {
    size: u64,
    pages: HashMap<u64, Box<[u32]>>,
}

impl SparseMemory {
    pub fn new(size: u64) -> Self {
        SparseMemory {
            size,
            pages: HashMap::new(),
        }
    }

    fn page(&mut self, page_id: u64) -> &mut [u32] {
        self.pages.entry(page_id).or_insert_with(|| {
            debug!("allocate page 0x{page_id:x}");
            (0..PAGE_WORDS as u32).map(|i| i & 1).collect()
        })
    }

    /// Page numbers allocated so far, ascending.
    pub fn allocated_pages(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.pages.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

impl BackingStore for SparseMemory {
    fn size(&self) -> u64 {
        self.size
    }

    fn read_line(&mut self, address: u64, line: &mut [u32]) -> Result<(), AccessError> {
        check_range(address, line.len(), self.size)?;
        trace!("sparse read {} words at 0x{address:016x}", line.len());
        for (i, word) in line.iter_mut().enumerate() {
            let addr = address + i as u64 * WORD_BYTES;
            let offset = ((addr % PAGE_BYTES) / WORD_BYTES) as usize;
            *word = self.page(addr / PAGE_BYTES)[offset];
        }
        Ok(())
    }

    fn write_word(&mut self, address: u64, value: u32) -> Result<(), AccessError> {
        check_range(address, 1, self.size)?;
        let offset = ((address % PAGE_BYTES) / WORD_BYTES) as usize;
        self.page(address / PAGE_BYTES)[offset] = value;
        Ok(())
    }
}
