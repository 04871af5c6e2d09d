use serde::Deserialize;

use crate::cache::{ClientState, NodeId};
use crate::sim::config::Config;
use crate::timeq::Cycle;

/// The `[traffic]` section of a scenario file.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TrafficConfig {
    /// Lines installed before cycle 0.
    pub warm: Vec<WarmLine>,
    pub events: Vec<EventSpec>,
    pub random: RandomTrafficSpec,
    pub results_json: Option<String>,
}

impl Config for TrafficConfig {}

#[derive(Debug, Deserialize, Clone)]
pub struct WarmLine {
    pub addr: u64,
    pub state: ClientState,
}

/// One scripted input.  Exactly one of `load`, `store`, `msg` and `credit` is set.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct EventSpec {
    pub at: Cycle,
    pub load: Option<u64>,
    pub store: Option<u64>,
    pub msg: Option<MsgSpec>,
    pub credit: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MsgSpec {
    /// Protocol name, e.g. `"MC_GRANT_S_DATA"`.
    pub kind: String,
    pub addr: u64,
    /// Sender; the first manager node when absent.
    pub src: Option<NodeId>,
    pub forward_id: Option<NodeId>,
}

/// Uniform random loads and stores on top of the scripted events.  Off when `count` is 0.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RandomTrafficSpec {
    pub count: usize,
    pub seed: u64,
    pub min_addr: u64,
    pub max_addr: u64,
    pub store_ratio: f64,
    pub start: Cycle,
    pub interval: Cycle,
}

impl Default for RandomTrafficSpec {
    fn default() -> Self {
        Self {
            count: 0,
            seed: 0,
            min_addr: 0,
            max_addr: 0x10_0000,
            store_ratio: 0.25,
            start: 1,
            interval: 1,
        }
    }
}
