use smallvec::SmallVec;

use super::error::CacheError;
use super::request::ProcRequest;

#[derive(Debug, Clone)]
pub struct MshrEntry {
    pub line_addr: u64,
    pub request: ProcRequest,
}

/// Outstanding miss transactions, at most one per line.
#[derive(Debug)]
pub struct MshrTable {
    capacity: usize,
    entries: SmallVec<[MshrEntry; 8]>,
}

impl MshrTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: SmallVec::new(),
        }
    }

    pub fn has_match(&self, line_addr: u64) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.line_addr == line_addr)
    }

    /// Record `request` as the outstanding transaction for `line_addr`.  The caller checks for an
    /// existing entry first; a duplicate is a logic error.
    pub fn allocate(&mut self, line_addr: u64, request: ProcRequest) -> Result<(), CacheError> {
        debug_assert!(!self.has_match(line_addr), "duplicate mshr entry for {:#x}", line_addr);
        if self.is_full() {
            return Err(CacheError::MshrFull);
        }
        self.entries.push(MshrEntry { line_addr, request });
        Ok(())
    }

    pub fn release(&mut self, line_addr: u64) -> Option<MshrEntry> {
        let pos = self
            .entries
            .iter()
            .position(|entry| entry.line_addr == line_addr)?;
        Some(self.entries.remove(pos))
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::MshrTable;
    use crate::cache::error::CacheError;
    use crate::cache::request::ProcRequest;

    #[test]
    fn allocate_and_release() {
        let mut mshr = MshrTable::new(2);
        assert!(mshr.allocate(0x40, ProcRequest::load(0, 0x44)).is_ok());
        assert!(mshr.has_match(0x40));
        let entry = mshr.release(0x40).expect("entry exists");
        assert_eq!(entry.line_addr, 0x40);
        assert_eq!(entry.request.addr, 0x44);
        assert!(!mshr.has_match(0x40));
        assert!(mshr.release(0x40).is_none());
    }

    #[test]
    fn capacity_is_enforced() {
        let mut mshr = MshrTable::new(2);
        mshr.allocate(0x00, ProcRequest::load(0, 0x00)).unwrap();
        mshr.allocate(0x20, ProcRequest::store(1, 0x20)).unwrap();
        assert!(mshr.is_full());
        assert_eq!(
            mshr.allocate(0x40, ProcRequest::load(2, 0x40)),
            Err(CacheError::MshrFull)
        );
        assert_eq!(mshr.len(), 2);
        mshr.release(0x00);
        assert!(mshr.allocate(0x40, ProcRequest::load(2, 0x40)).is_ok());
    }
}
