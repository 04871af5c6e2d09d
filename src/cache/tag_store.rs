use super::geometry::Geometry;

/// Flat index of a (set, way) pair: `set * ways + way`.
pub type SlotId = usize;

/// Outcome of `TagStore::reserve_block_for`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// The line is already present.
    Hit(SlotId),
    /// A free way was found and the line now occupies it.
    Installed(SlotId),
    /// The set is full; `line` currently occupies the LRU way and has to be evicted before the
    /// new line can be installed.  Nothing is modified.
    Victim { slot: SlotId, line: u64 },
}

/// Tag array with strict per-set LRU.  Holds line addresses (offset cleared).
#[derive(Debug)]
pub struct TagStore {
    geometry: Geometry,
    tags: Vec<Vec<Option<u64>>>,
    // per set, way indices ordered most- to least-recently used
    lru: Vec<Vec<usize>>,
}

impl TagStore {
    pub fn new(geometry: Geometry) -> Self {
        let mut tags = Vec::with_capacity(geometry.sets);
        let mut lru = Vec::with_capacity(geometry.sets);
        for _ in 0..geometry.sets {
            tags.push(vec![None; geometry.ways]);
            lru.push((0..geometry.ways).collect());
        }
        Self { geometry, tags, lru }
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn get_line_addr(&self, addr: u64) -> u64 {
        self.geometry.line_of(addr)
    }

    pub fn has_match(&self, addr: u64) -> bool {
        self.get_entry(addr).is_some()
    }

    pub fn get_entry(&self, addr: u64) -> Option<SlotId> {
        let line = self.geometry.line_of(addr);
        let set_idx = self.geometry.index_of(addr);
        self.tags[set_idx]
            .iter()
            .position(|tag| *tag == Some(line))
            .map(|way| self.slot_id(set_idx, way))
    }

    /// Line currently bound to `slot`, if any.
    pub fn line_at(&self, slot: SlotId) -> Option<u64> {
        let (set_idx, way) = self.split(slot);
        self.tags[set_idx][way]
    }

    /// Find room for `addr`'s line.  A hit or a free way is installed and touched; a full set
    /// reports its LRU occupant without displacing it.
    pub fn reserve_block_for(&mut self, addr: u64) -> Reservation {
        if let Some(slot) = self.get_entry(addr) {
            return Reservation::Hit(slot);
        }
        let set_idx = self.geometry.index_of(addr);
        if let Some(way) = self.tags[set_idx].iter().position(|tag| tag.is_none()) {
            let slot = self.slot_id(set_idx, way);
            self.install(slot, addr);
            return Reservation::Installed(slot);
        }
        let way = *self.lru[set_idx]
            .last()
            .expect("a set always has at least one way");
        let slot = self.slot_id(set_idx, way);
        let line = self.tags[set_idx][way].expect("full set has no empty way");
        Reservation::Victim { slot, line }
    }

    /// Bind `slot` to `addr`'s line and make it most recently used.
    pub fn install(&mut self, slot: SlotId, addr: u64) {
        let (set_idx, way) = self.split(slot);
        debug_assert_eq!(set_idx, self.geometry.index_of(addr), "line installed in wrong set");
        self.tags[set_idx][way] = Some(self.geometry.line_of(addr));
        self.touch(slot);
    }

    pub fn touch(&mut self, slot: SlotId) {
        let (set_idx, way) = self.split(slot);
        let order = &mut self.lru[set_idx];
        if let Some(pos) = order.iter().position(|&idx| idx == way) {
            order.remove(pos);
        }
        order.insert(0, way);
    }

    /// Unbind `slot` and make it the first candidate for replacement.
    pub fn invalidate(&mut self, slot: SlotId) {
        let (set_idx, way) = self.split(slot);
        self.tags[set_idx][way] = None;
        let order = &mut self.lru[set_idx];
        if let Some(pos) = order.iter().position(|&idx| idx == way) {
            order.remove(pos);
        }
        order.push(way);
    }

    /// 0 is most recently used, `ways - 1` is the replacement candidate.
    pub fn lru_rank(&self, slot: SlotId) -> usize {
        let (set_idx, way) = self.split(slot);
        self.lru[set_idx]
            .iter()
            .position(|&idx| idx == way)
            .expect("every way has a rank")
    }

    /// Number of valid lines.
    pub fn occupancy(&self) -> usize {
        self.tags
            .iter()
            .map(|set| set.iter().filter(|tag| tag.is_some()).count())
            .sum()
    }

    fn slot_id(&self, set_idx: usize, way: usize) -> SlotId {
        set_idx * self.geometry.ways + way
    }

    fn split(&self, slot: SlotId) -> (usize, usize) {
        (slot / self.geometry.ways, slot % self.geometry.ways)
    }
}

#[cfg(test)]
mod tests {
    use super::{Reservation, TagStore};
    use crate::cache::geometry::Geometry;

    // 4 sets of 2 ways, 32-byte lines: addresses 0x80 apart share a set.
    fn small() -> TagStore {
        TagStore::new(Geometry::new(4, 2, 32))
    }

    #[test]
    fn empty_store_has_no_match() {
        let tags = small();
        assert!(!tags.has_match(0x1234));
        assert_eq!(tags.occupancy(), 0);
    }

    #[test]
    fn reserve_installs_into_free_way() {
        let mut tags = small();
        let res = tags.reserve_block_for(0x1004);
        let slot = match res {
            Reservation::Installed(slot) => slot,
            other => panic!("expected install, got {:?}", other),
        };
        assert!(tags.has_match(0x1000));
        assert!(tags.has_match(0x101f));
        assert_eq!(tags.get_entry(0x1010), Some(slot));
        assert_eq!(tags.line_at(slot), Some(0x1000));
        assert_eq!(tags.reserve_block_for(0x1008), Reservation::Hit(slot));
    }

    #[test]
    fn full_set_reports_lru_victim_without_displacing_it() {
        let mut tags = small();
        tags.reserve_block_for(0x000);
        tags.reserve_block_for(0x080);
        match tags.reserve_block_for(0x100) {
            Reservation::Victim { line, slot } => {
                assert_eq!(line, 0x000);
                assert_eq!(tags.get_entry(0x000), Some(slot));
            }
            other => panic!("expected victim, got {:?}", other),
        }
        assert!(tags.has_match(0x000));
        assert!(!tags.has_match(0x100));
    }

    #[test]
    fn touch_changes_victim() {
        let mut tags = small();
        tags.reserve_block_for(0x000);
        tags.reserve_block_for(0x080);
        let first = tags.get_entry(0x000).unwrap();
        tags.touch(first);
        assert_eq!(
            tags.reserve_block_for(0x100),
            Reservation::Victim { slot: tags.get_entry(0x080).unwrap(), line: 0x080 }
        );
    }

    #[test]
    fn ranks_are_distinct_within_a_set() {
        let mut tags = small();
        tags.reserve_block_for(0x000);
        tags.reserve_block_for(0x080);
        let a = tags.get_entry(0x000).unwrap();
        let b = tags.get_entry(0x080).unwrap();
        assert_eq!(tags.lru_rank(b), 0);
        assert_eq!(tags.lru_rank(a), 1);
    }

    #[test]
    fn invalidate_then_install_new_line() {
        let mut tags = small();
        tags.reserve_block_for(0x000);
        tags.reserve_block_for(0x080);
        let victim = tags.get_entry(0x000).unwrap();
        tags.invalidate(victim);
        assert!(!tags.has_match(0x000));
        assert_eq!(tags.occupancy(), 1);
        tags.install(victim, 0x100);
        assert_eq!(tags.get_entry(0x100), Some(victim));
        assert_eq!(tags.lru_rank(victim), 0);
    }

    #[test]
    fn single_set_single_way() {
        let mut tags = TagStore::new(Geometry::new(1, 1, 32));
        assert!(matches!(tags.reserve_block_for(0x20), Reservation::Installed(0)));
        assert_eq!(
            tags.reserve_block_for(0x40),
            Reservation::Victim { slot: 0, line: 0x20 }
        );
    }
}
