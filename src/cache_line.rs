use crate::error::AccessError;

/// One way of a cache block.
///
/// Occupancy and validity are tracked separately: an invalidated line keeps
/// its tag and its (stale) words until it is reloaded or claimed as a victim.
#[derive(Debug, Clone, Default)]
pub struct CacheLine {
    // None while the slot is empty
    tag: Option<u64>,
    valid: bool,
    data: Option<Box<[u32]>>,
}

impl CacheLine {
    pub fn new() -> Self {
        CacheLine::default()
    }

    /// Overwrites tag and contents and marks the line valid. The word buffer
    /// is allocated on the first load and keeps its length from then on.
    pub fn load(&mut self, tag: u64, line: &[u32]) -> Result<(), AccessError> {
        if let Some(data) = self.data.as_deref_mut() {
            if data.len() != line.len() {
                return Err(AccessError::LineSizeMismatch {
                    expected: data.len(),
                    actual: line.len(),
                });
            }
            data.copy_from_slice(line);
        } else {
            self.data = Some(line.into());
        }
        self.tag = Some(tag);
        self.valid = true;
        Ok(())
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Releases the slot's tag so it can be claimed. Data and validity are
    /// left as they are; the next `load` overwrites both.
    pub fn set_empty(&mut self) {
        self.tag = None;
    }

    pub fn is_empty(&self) -> bool {
        self.tag.is_none()
    }

    pub fn tag(&self) -> Option<u64> {
        self.tag
    }

    pub fn data(&self, index: usize) -> Result<&u32, AccessError> {
        let data = self.data.as_deref().ok_or(AccessError::Uninitialized)?;
        data.get(index).ok_or(AccessError::OutOfRange {
            index,
            len: data.len(),
        })
    }

    /// The whole line, or `None` before the first load.
    pub fn words(&self) -> Option<&[u32]> {
        self.data.as_deref()
    }

    pub fn invalidate(&mut self) {
        self.valid = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: [u32; 8] = [0, 1, 2, 3, 4, 5, 6, 7];

    #[test]
    fn fresh_line_is_empty_and_invalid() {
        let line = CacheLine::new();
        assert!(!line.is_valid());
        assert!(line.is_empty());
        assert_eq!(line.tag(), None);
        assert_eq!(line.data(0), Err(AccessError::Uninitialized));
        assert_eq!(line.words(), None);
    }

    #[test]
    fn load_makes_line_valid() {
        let mut line = CacheLine::new();
        line.load(1111, &DATA[..1]).unwrap();
        assert!(line.is_valid());
        assert!(!line.is_empty());
        assert_eq!(line.tag(), Some(1111));
    }

    #[test]
    fn invalidate_keeps_tag_and_data() {
        let mut line = CacheLine::new();
        line.load(1111, &DATA[..2]).unwrap();
        line.invalidate();
        assert!(!line.is_valid());
        assert_eq!(line.tag(), Some(1111));
        assert_eq!(line.data(1), Ok(&1));

        line.set_valid(true);
        assert!(line.is_valid());
    }

    #[test]
    fn data_is_bounds_checked() {
        let mut line = CacheLine::new();
        line.load(1111, &DATA).unwrap();
        assert_eq!(line.data(0), Ok(&0));
        assert_eq!(line.data(4), Ok(&4));
        assert_eq!(line.data(7), Ok(&7));
        assert_eq!(
            line.data(8),
            Err(AccessError::OutOfRange { index: 8, len: 8 })
        );
    }

    #[test]
    fn set_empty_only_clears_tag() {
        let mut line = CacheLine::new();
        line.load(7, &DATA[..4]).unwrap();
        line.set_empty();
        assert!(line.is_empty());
        assert!(line.is_valid());
        assert_eq!(line.words(), Some(&DATA[..4]));
    }

    #[test]
    fn reload_reuses_buffer() {
        let mut line = CacheLine::new();
        line.load(1, &[1, 1, 1, 1]).unwrap();
        line.invalidate();
        line.load(2, &[2, 3, 4, 5]).unwrap();
        assert_eq!(line.tag(), Some(2));
        assert!(line.is_valid());
        assert_eq!(line.words(), Some(&[2, 3, 4, 5][..]));

        assert_eq!(
            line.load(3, &[9, 9]),
            Err(AccessError::LineSizeMismatch {
                expected: 4,
                actual: 2
            })
        );
        assert_eq!(line.tag(), Some(2));
    }
}
