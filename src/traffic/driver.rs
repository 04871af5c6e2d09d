use anyhow::{bail, Context};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use toml::Table;

use crate::cache::{
    CoherenceMessage, L1Cache, L1Stats, MessageKind, NetworkPacket, NodeId, ProcRequest,
};
use crate::sim::config::{Config, L1Config, MsgTypes, SimConfig};
use crate::timeq::Cycle;
use crate::traffic::config::{EventSpec, RandomTrafficSpec, TrafficConfig};

#[derive(Debug, Clone)]
pub enum Event {
    Request(ProcRequest),
    Packet(NetworkPacket),
}

#[derive(Debug, Clone)]
struct Scheduled {
    at: Cycle,
    event: Event,
}

#[derive(Debug, Clone, Serialize)]
pub struct SentRecord {
    pub cycle: Cycle,
    pub packet: NetworkPacket,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplyRecord {
    pub cycle: Cycle,
    pub request: ProcRequest,
}

#[derive(Debug, Default, Serialize)]
pub struct ScenarioReport {
    pub cycles: Cycle,
    pub timed_out: bool,
    pub sent: Vec<SentRecord>,
    pub replies: Vec<ReplyRecord>,
    pub stats: L1Stats,
}

/// Feeds a scripted sequence of processor requests and network packets into one `L1Cache` and
/// records everything it puts out.  There is no manager: every grant, forward or demand the
/// cache sees comes from the script.
#[derive(Debug)]
pub struct ScenarioDriver {
    cache: L1Cache,
    events: Vec<Scheduled>,
    next: usize,
    timeout: Cycle,
    report: ScenarioReport,
}

impl ScenarioDriver {
    pub fn new(sim: &SimConfig, l1: L1Config, traffic: &TrafficConfig) -> anyhow::Result<Self> {
        let manager = l1.dest.nodes.first().copied().unwrap_or_default();
        let msg_types = l1.msg_types;
        let mut cache = L1Cache::from_config(l1).context("cannot build L1 cache")?;
        for line in &traffic.warm {
            cache
                .seed_line(line.addr, line.state)
                .with_context(|| format!("cannot warm line {:#x}", line.addr))?;
        }

        let mut compiler = EventCompiler {
            next_id: 0,
            manager,
            node_id: cache.node_id(),
            msg_types,
        };
        let mut events = Vec::with_capacity(traffic.events.len() + traffic.random.count);
        for (idx, spec) in traffic.events.iter().enumerate() {
            let event = compiler
                .compile(spec)
                .with_context(|| format!("event #{}", idx))?;
            events.push(Scheduled { at: spec.at, event });
        }
        events.extend(compiler.random(&traffic.random)?);
        // stable: scripted events keep their file order within a cycle
        events.sort_by_key(|scheduled| scheduled.at);

        Ok(Self {
            cache,
            events,
            next: 0,
            timeout: sim.timeout,
            report: ScenarioReport::default(),
        })
    }

    /// Build a driver from a whole scenario file: `[sim]`, `[l1]` and `[traffic]`.
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        let table: Table = toml::from_str(text).context("cannot parse scenario toml")?;
        let sim = SimConfig::try_from_section(table.get("sim")).context("bad [sim] section")?;
        let l1 = L1Config::try_from_section(table.get("l1")).context("bad [l1] section")?;
        let traffic =
            TrafficConfig::try_from_section(table.get("traffic")).context("bad [traffic] section")?;
        Self::new(&sim, l1, &traffic)
    }

    pub fn cache(&self) -> &L1Cache {
        &self.cache
    }

    pub fn report(&self) -> &ScenarioReport {
        &self.report
    }

    /// Tick from cycle 0 until every event is delivered and the cache has nothing left in
    /// flight, or until the timeout.  A protocol error aborts the run.
    pub fn run(&mut self) -> anyhow::Result<&ScenarioReport> {
        let mut now: Cycle = 0;
        loop {
            while let Some(scheduled) = self.events.get(self.next) {
                if scheduled.at > now {
                    break;
                }
                let event = scheduled.event.clone();
                self.next += 1;
                self.deliver(now, event);
            }

            self.cache
                .tick(now)
                .with_context(|| format!("{} failed at cycle {}", self.cache.name(), now))?;
            self.collect(now);

            if self.next == self.events.len() && self.cache.is_quiescent() {
                break;
            }
            if now >= self.timeout {
                warn!("scenario timed out at cycle {}", now);
                self.report.timed_out = true;
                break;
            }
            now += 1;
        }

        self.report.cycles = now;
        self.report.stats = *self.cache.stats();
        info!(
            "scenario finished at cycle {}: {} packets, {} replies, {} requests still stalled",
            now,
            self.report.sent.len(),
            self.report.replies.len(),
            self.cache.stall_buffer().len()
        );
        Ok(&self.report)
    }

    fn deliver(&mut self, now: Cycle, event: Event) {
        match event {
            Event::Request(request) => {
                info!("@{} proc -> {:?} {:#x}", now, request.kind, request.addr);
                self.cache.handle_processor_request(request);
            }
            Event::Packet(packet) => {
                match &packet.payload {
                    Some(msg) => info!(
                        "@{} net -> {} {:#x} from {}",
                        now,
                        msg.msg.name(),
                        msg.addr,
                        packet.src
                    ),
                    None => info!("@{} net -> credit from {}", now, packet.src),
                }
                self.cache.handle_peer_and_manager_request(packet);
            }
        }
    }

    fn collect(&mut self, now: Cycle) {
        for request in self.cache.drain_processor_replies() {
            info!("@{} proc <- {:?} {:#x}", now, request.kind, request.addr);
            self.report.replies.push(ReplyRecord { cycle: now, request });
        }
        for packet in self.cache.drain_network_output() {
            match &packet.payload {
                Some(msg) => info!(
                    "@{} net <- {} {:#x} to {}",
                    now,
                    msg.msg.name(),
                    msg.addr,
                    packet.dst
                ),
                None => info!("@{} net <- credit to {}", now, packet.dst),
            }
            self.report.sent.push(SentRecord { cycle: now, packet });
        }
    }
}

struct EventCompiler {
    next_id: u64,
    manager: NodeId,
    node_id: NodeId,
    msg_types: MsgTypes,
}

impl EventCompiler {
    fn request_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn compile(&mut self, spec: &EventSpec) -> anyhow::Result<Event> {
        let set = [
            spec.load.is_some(),
            spec.store.is_some(),
            spec.msg.is_some(),
            spec.credit,
        ]
        .iter()
        .filter(|set| **set)
        .count();
        if set != 1 {
            bail!(
                "at cycle {}: expected exactly one of load, store, msg, credit; found {}",
                spec.at,
                set
            );
        }

        if let Some(addr) = spec.load {
            return Ok(Event::Request(ProcRequest::load(self.request_id(), addr)));
        }
        if let Some(addr) = spec.store {
            return Ok(Event::Request(ProcRequest::store(self.request_id(), addr)));
        }
        if let Some(msg) = &spec.msg {
            let Some(kind) = MessageKind::from_name(&msg.kind) else {
                bail!("unknown message kind '{}'", msg.kind);
            };
            let src = msg.src.unwrap_or(self.manager);
            let mut coh = CoherenceMessage::new(kind, msg.addr, src, self.node_id);
            coh.forward_id = msg.forward_id;
            return Ok(Event::Packet(NetworkPacket::coherence(self.msg_types.coh_msg, coh)));
        }
        Ok(Event::Packet(NetworkPacket::credit(
            self.msg_types.credit_msg,
            self.manager,
            self.node_id,
        )))
    }

    fn random(&mut self, spec: &RandomTrafficSpec) -> anyhow::Result<Vec<Scheduled>> {
        if spec.count == 0 {
            return Ok(Vec::new());
        }
        if spec.min_addr >= spec.max_addr {
            bail!(
                "random traffic needs min_addr < max_addr ({:#x} >= {:#x})",
                spec.min_addr,
                spec.max_addr
            );
        }
        if !(0.0..=1.0).contains(&spec.store_ratio) {
            bail!("store_ratio {} is not a probability", spec.store_ratio);
        }
        let mut rng = StdRng::seed_from_u64(spec.seed);
        let mut events = Vec::with_capacity(spec.count);
        for i in 0..spec.count {
            let addr = rng.gen_range(spec.min_addr..spec.max_addr);
            let id = self.request_id();
            let request = if rng.gen_bool(spec.store_ratio) {
                ProcRequest::store(id, addr)
            } else {
                ProcRequest::load(id, addr)
            };
            events.push(Scheduled {
                at: spec.start + i as Cycle * spec.interval,
                event: Event::Request(request),
            });
        }
        Ok(events)
    }
}
