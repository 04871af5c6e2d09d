use super::error::CacheError;
use super::NodeId;
use crate::sim::config::{DestConfig, DestKind};

/// Resolves the manager responsible for an address.
pub trait DestMap: std::fmt::Debug {
    fn lookup(&self, addr: u64) -> NodeId;
}

/// Every address maps to one manager.
#[derive(Debug, Clone, Copy)]
pub struct FixedDestMap {
    node: NodeId,
}

impl FixedDestMap {
    pub fn new(node: NodeId) -> Self {
        Self { node }
    }
}

impl DestMap for FixedDestMap {
    fn lookup(&self, _addr: u64) -> NodeId {
        self.node
    }
}

/// Interleaves pages across managers using the address bits right above the page offset.
#[derive(Debug, Clone)]
pub struct PageBasedMap {
    nodes: Vec<NodeId>,
    page_offset_bits: u32,
    selector_mask: u64,
}

impl PageBasedMap {
    pub fn new(nodes: Vec<NodeId>, page_offset_bits: u32) -> Result<Self, CacheError> {
        if nodes.is_empty() {
            return Err(CacheError::InvalidConfig(
                "page based map needs at least one node".to_string(),
            ));
        }
        let bits = nodes.len().next_power_of_two().trailing_zeros();
        Ok(Self {
            nodes,
            page_offset_bits,
            selector_mask: (1u64 << bits) - 1,
        })
    }
}

impl DestMap for PageBasedMap {
    fn lookup(&self, addr: u64) -> NodeId {
        let page = addr.checked_shr(self.page_offset_bits).unwrap_or(0);
        // the mask covers the next power of two; fold the excess back onto the node list
        let selector = (page & self.selector_mask) as usize;
        self.nodes[selector % self.nodes.len()]
    }
}

/// Build the map described by the `[l1.dest]` section.
pub fn from_config(config: &DestConfig) -> Result<Box<dyn DestMap>, CacheError> {
    match config.kind {
        DestKind::Fixed => {
            let node = config.nodes.first().copied().ok_or_else(|| {
                CacheError::InvalidConfig("fixed dest map needs a node".to_string())
            })?;
            Ok(Box::new(FixedDestMap::new(node)))
        }
        DestKind::PageBased => Ok(Box::new(PageBasedMap::new(
            config.nodes.clone(),
            config.page_offset_bits,
        )?)),
    }
}
