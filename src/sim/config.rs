use std::str::FromStr;

use log::warn;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use toml::*;

use crate::cache::error::CacheError;
use crate::cache::NodeId;
use crate::timeq::Cycle;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReplacementPolicy {
    #[default]
    Lru,
}

impl FromStr for ReplacementPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "lru" => Ok(Self::Lru),
            _ => Err(format!(
                "unsupported replacement policy '{}', expected one of: lru",
                value
            )),
        }
    }
}

pub trait Config: DeserializeOwned + Default {
    fn from_section(section: Option<&Value>) -> Self {
        Self::try_from_section(section).expect("cannot deserialize config")
    }

    fn try_from_section(section: Option<&Value>) -> Result<Self, de::Error> {
        match section {
            Some(value) => value.clone().try_into(),
            None => {
                warn!("config section not found");
                Ok(Self::default())
            }
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimConfig {
    pub log_level: u64,
    pub timeout: Cycle,
}

impl Config for SimConfig {}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            log_level: 0,
            timeout: 100_000,
        }
    }
}

/// Array parameters of one cache.  Sizes are in bytes, times in cycles.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub name: String,
    pub size: usize,
    pub assoc: usize,
    pub block_size: usize,
    pub hit_time: Cycle,
    pub lookup_time: Cycle,
    pub replacement_policy: ReplacementPolicy,
}

impl Config for CacheConfig {}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "L1D".to_string(),
            size: 0x1 << 14, // 16 KiB
            assoc: 4,
            block_size: 32,
            hit_time: 2,
            lookup_time: 11,
            replacement_policy: ReplacementPolicy::Lru,
        }
    }
}

impl CacheConfig {
    pub fn num_sets(&self) -> usize {
        self.size / (self.assoc * self.block_size)
    }

    pub fn ensure_valid(&self) -> Result<(), CacheError> {
        let bad = |why: String| Err(CacheError::InvalidConfig(format!("{}: {}", self.name, why)));
        if self.block_size == 0 || !self.block_size.is_power_of_two() {
            return bad(format!("block_size {} must be a power of two", self.block_size));
        }
        if self.assoc == 0 {
            return bad("assoc must be > 0".to_string());
        }
        if self.size == 0 || self.size % (self.assoc * self.block_size) != 0 {
            return bad(format!(
                "size {} must be a non-zero multiple of assoc * block_size ({})",
                self.size,
                self.assoc * self.block_size
            ));
        }
        let sets = self.num_sets();
        if !sets.is_power_of_two() {
            return bad(format!("number of sets {} must be a power of two", sets));
        }
        Ok(())
    }
}

/// Packet type discriminators shared with the network: one value marks coherence packets, the
/// other marks flow-control credits.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct MsgTypes {
    pub coh_msg: i32,
    pub credit_msg: i32,
}

impl Default for MsgTypes {
    fn default() -> Self {
        Self {
            coh_msg: 123,
            credit_msg: 456,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DestKind {
    #[default]
    Fixed,
    PageBased,
}

/// Where manager-directed messages go.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DestConfig {
    pub kind: DestKind,
    pub nodes: Vec<NodeId>,
    pub page_offset_bits: u32,
}

impl Default for DestConfig {
    fn default() -> Self {
        Self {
            kind: DestKind::Fixed,
            nodes: vec![13],
            page_offset_bits: 12,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct L1Config {
    pub node_id: NodeId,
    pub mshr_size: usize,
    pub downstream_credits: usize,
    pub cache: CacheConfig,
    pub msg_types: MsgTypes,
    pub dest: DestConfig,
}

impl Config for L1Config {}

impl Default for L1Config {
    fn default() -> Self {
        Self {
            node_id: 11,
            mshr_size: 8,
            downstream_credits: 30,
            cache: CacheConfig::default(),
            msg_types: MsgTypes::default(),
            dest: DestConfig::default(),
        }
    }
}

impl L1Config {
    /// Reject configurations the cache cannot be built from.  Called once by `L1Cache::new`;
    /// nothing is re-checked at runtime.
    pub fn ensure_valid(&self) -> Result<(), CacheError> {
        self.cache.ensure_valid()?;
        if self.mshr_size == 0 {
            return Err(CacheError::InvalidConfig("mshr_size must be > 0".to_string()));
        }
        if self.downstream_credits == 0 {
            return Err(CacheError::InvalidConfig(
                "downstream_credits must be > 0".to_string(),
            ));
        }
        if self.msg_types.coh_msg == self.msg_types.credit_msg {
            return Err(CacheError::InvalidConfig(format!(
                "coh_msg and credit_msg must differ (both {})",
                self.msg_types.coh_msg
            )));
        }
        if self.dest.nodes.is_empty() {
            return Err(CacheError::InvalidConfig(
                "dest.nodes must name at least one manager".to_string(),
            ));
        }
        Ok(())
    }
}
