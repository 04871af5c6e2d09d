/*
Private L1 cache speaking MESI to a directory manager and to peer caches.

The cache is driven by three callbacks from the surrounding simulation:
    - `handle_processor_request` queues a load or store from the core
    - `handle_peer_and_manager_request` queues a packet from the network
    - `tick` processes everything queued, network packets first, and releases delayed outputs

Dispatch itself is untimed.  Each processed input runs to completion, including any stalled
requests it wakes, before the next input is looked at.  Results are parked in delay queues and
become visible `hit_time` (processor replies) or `lookup_time` (coherence messages) cycles later.
Coherence messages then wait in the downstream buffer until a credit is available.
*/

mod message;
mod request;

use std::collections::VecDeque;
use std::io::{self, Write};

use log::{debug, trace};

use super::client::{Client, ClientState, Outbound};
use super::dest_map::{self, DestMap};
use super::error::{CacheError, StallCause};
use super::message::{CoherenceMessage, NetworkPacket};
use super::mshr::MshrTable;
use super::request::{ProcRequest, ReqKind};
use super::stall::{StallBuffer, StallKind};
use super::stats::L1Stats;
use super::tag_store::{Reservation, TagStore};
use super::geometry::Geometry;
use super::NodeId;
use crate::sim::config::L1Config;
use crate::timeq::{Cycle, DelayQueue};

#[derive(Debug)]
pub struct L1Cache {
    config: L1Config,
    node_id: NodeId,
    tags: TagStore,
    // one per tag store slot
    clients: Vec<Client>,
    mshr: MshrTable,
    stalls: StallBuffer,
    dest_map: Box<dyn DestMap>,

    now: Cycle,
    proc_inbox: VecDeque<ProcRequest>,
    net_inbox: VecDeque<NetworkPacket>,
    delayed_replies: DelayQueue<ProcRequest>,
    delayed_msgs: DelayQueue<CoherenceMessage>,
    downstream: VecDeque<NetworkPacket>,
    credits: usize,
    replies_out: Vec<ProcRequest>,
    packets_out: Vec<NetworkPacket>,

    stats: L1Stats,
}

impl L1Cache {
    pub fn new(config: L1Config, dest_map: Box<dyn DestMap>) -> Result<Self, CacheError> {
        config.ensure_valid()?;
        let geometry = Geometry::from_config(&config.cache);
        debug!(
            "{}: node {} with {} sets x {} ways, {}B lines, {} mshrs",
            config.cache.name,
            config.node_id,
            geometry.sets,
            geometry.ways,
            geometry.block_size(),
            config.mshr_size
        );
        Ok(Self {
            node_id: config.node_id,
            tags: TagStore::new(geometry),
            clients: vec![Client::new(); geometry.num_slots()],
            mshr: MshrTable::new(config.mshr_size),
            stalls: StallBuffer::new(),
            dest_map,
            now: 0,
            proc_inbox: VecDeque::new(),
            net_inbox: VecDeque::new(),
            delayed_replies: DelayQueue::new(),
            delayed_msgs: DelayQueue::new(),
            downstream: VecDeque::new(),
            credits: config.downstream_credits,
            replies_out: Vec::new(),
            packets_out: Vec::new(),
            stats: L1Stats::default(),
            config,
        })
    }

    /// Build the cache with the dest map described by `config.dest`.
    pub fn from_config(config: L1Config) -> Result<Self, CacheError> {
        let map = dest_map::from_config(&config.dest)?;
        Self::new(config, map)
    }

    pub fn name(&self) -> &str {
        &self.config.cache.name
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn handle_processor_request(&mut self, request: ProcRequest) {
        self.proc_inbox.push_back(request);
    }

    pub fn handle_peer_and_manager_request(&mut self, packet: NetworkPacket) {
        self.net_inbox.push_back(packet);
    }

    /// Advance to cycle `now`.  Any error is a protocol failure and ends the run.
    pub fn tick(&mut self, now: Cycle) -> Result<(), CacheError> {
        self.now = now;

        while let Some(packet) = self.net_inbox.pop_front() {
            self.receive_packet(packet)?;
        }
        while let Some(request) = self.proc_inbox.pop_front() {
            self.process_processor_request(request)?;
        }

        let replies = &mut self.replies_out;
        self.delayed_replies.drain_ready(now, |req| replies.push(req));
        let downstream = &mut self.downstream;
        let coh_msg = self.config.msg_types.coh_msg;
        self.delayed_msgs
            .drain_ready(now, |msg| downstream.push_back(NetworkPacket::coherence(coh_msg, msg)));

        while self.credits > 0 {
            let Some(packet) = self.downstream.pop_front() else {
                break;
            };
            self.credits -= 1;
            self.stats.coh_msgs_sent += 1;
            self.packets_out.push(packet);
        }
        trace!(
            "{} @{}: credits {}, {} packets waiting",
            self.name(),
            now,
            self.credits,
            self.downstream.len()
        );

        self.stats.cycles += 1;
        let occupancy = self.tags.occupancy() as u64;
        self.stats.occupancy_accum += occupancy;
        if occupancy == 0 {
            self.stats.empty_cycles += 1;
        }
        Ok(())
    }

    fn receive_packet(&mut self, packet: NetworkPacket) -> Result<(), CacheError> {
        let types = self.config.msg_types;
        if packet.msg_type == types.credit_msg {
            self.credits += 1;
            self.stats.credits_received += 1;
            trace!("{}: credit from {}, now {}", self.name(), packet.src, self.credits);
            Ok(())
        } else if packet.msg_type == types.coh_msg {
            let msg = packet.payload.ok_or(CacheError::MissingPayload)?;
            self.stats.coh_msgs_received += 1;
            // credits go back upstream right away and are not subject to flow control
            self.packets_out
                .push(NetworkPacket::credit(types.credit_msg, self.node_id, packet.src));
            self.stats.credits_sent += 1;
            self.process_peer_and_manager_request(msg)
        } else {
            Err(CacheError::UnknownPacketType(packet.msg_type))
        }
    }

    /// Processor replies released so far, oldest first.
    pub fn drain_processor_replies(&mut self) -> Vec<ProcRequest> {
        std::mem::take(&mut self.replies_out)
    }

    /// Packets put on the network so far, oldest first.
    pub fn drain_network_output(&mut self) -> Vec<NetworkPacket> {
        std::mem::take(&mut self.packets_out)
    }

    /// Nothing queued, in flight or waiting for credits.
    pub fn is_quiescent(&self) -> bool {
        self.proc_inbox.is_empty()
            && self.net_inbox.is_empty()
            && self.delayed_replies.is_empty()
            && self.delayed_msgs.is_empty()
            && self.downstream.is_empty()
    }

    /// Install `addr`'s line in a stable state without any protocol traffic.
    pub fn seed_line(&mut self, addr: u64, state: ClientState) -> Result<(), CacheError> {
        if state.is_transient() || state == ClientState::I {
            return Err(CacheError::InvalidConfig(format!(
                "cannot seed line {:#x} in state {:?}",
                addr, state
            )));
        }
        match self.tags.reserve_block_for(addr) {
            Reservation::Hit(slot) if self.clients[slot].state().is_transient() => {
                Err(CacheError::InvalidConfig(format!(
                    "cannot seed line {:#x}: it is in state {:?}",
                    addr,
                    self.clients[slot].state()
                )))
            }
            Reservation::Hit(slot) | Reservation::Installed(slot) => {
                self.clients[slot].set_stable(state);
                Ok(())
            }
            Reservation::Victim { .. } => Err(CacheError::InvalidConfig(format!(
                "cannot seed line {:#x}: set is full",
                addr
            ))),
        }
    }

    pub fn line_of(&self, addr: u64) -> u64 {
        self.tags.get_line_addr(addr)
    }

    /// Coherence state of `addr`'s line, if it is bound to a slot.
    pub fn client_state(&self, addr: u64) -> Option<ClientState> {
        self.tags
            .get_entry(addr)
            .map(|slot| self.clients[slot].state())
    }

    /// Request parked on or owned by the slot holding `addr`'s line.
    pub fn pending_request(&self, addr: u64) -> Option<&ProcRequest> {
        self.tags
            .get_entry(addr)
            .and_then(|slot| self.clients[slot].pending())
    }

    pub fn tag_store(&self) -> &TagStore {
        &self.tags
    }

    pub fn mshr(&self) -> &MshrTable {
        &self.mshr
    }

    pub fn stall_buffer(&self) -> &StallBuffer {
        &self.stalls
    }

    pub fn credits(&self) -> usize {
        self.credits
    }

    pub fn stats(&self) -> &L1Stats {
        &self.stats
    }

    pub fn print_stats<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.stats.write_report(self.name(), out)
    }

    fn reply(&mut self, request: ProcRequest) {
        debug!("{}: reply {:?} {:#x}", self.name(), request.kind, request.addr);
        self.delayed_replies
            .push(self.now, self.config.cache.hit_time, request);
    }

    /// Queue the messages of a transition on `line`.  Peer data goes to `forward_id`, everything
    /// else to the line's manager.
    fn send(
        &mut self,
        outbound: &[Outbound],
        line: u64,
        forward_id: Option<NodeId>,
    ) -> Result<(), CacheError> {
        for out in outbound {
            let msg = match *out {
                Outbound::Manager(kind) => {
                    let dst = self.dest_map.lookup(line);
                    CoherenceMessage::new(kind, line, self.node_id, dst)
                }
                Outbound::Peer(kind) => {
                    let dst = forward_id.ok_or(CacheError::MissingForwardId { msg: kind, addr: line })?;
                    CoherenceMessage::new(kind, line, self.node_id, dst)
                }
            };
            self.enqueue(msg);
        }
        Ok(())
    }

    fn enqueue(&mut self, msg: CoherenceMessage) {
        debug!(
            "{}: send {} {:#x} to {}",
            self.name(),
            msg.msg.name(),
            msg.addr,
            msg.dst_id
        );
        self.delayed_msgs
            .push(self.now, self.config.cache.lookup_time, msg);
    }

    fn stall(&mut self, cause: StallCause, request: ProcRequest, blocking: u64) {
        let kind = StallKind::from(cause);
        debug!(
            "{}: {:?} {:#x} deferred, {:?} on {:#x}",
            self.name(),
            request.kind,
            request.addr,
            kind,
            blocking
        );
        self.stalls.defer(kind, request, blocking);
        self.stats.record_stall(kind, self.stalls.len());
    }

    /// Replay, in arrival order, every stalled request cleared by a transaction finishing on
    /// `line`.  Replays run to completion and may stall again.
    fn wake(&mut self, line: u64, mshr_freed: bool) -> Result<(), CacheError> {
        let woken = self
            .stalls
            .wake_matching(|entry| entry.is_woken_by(line, mshr_freed));
        for entry in woken {
            debug!(
                "{}: replay {:?} {:#x} after {:?}",
                self.name(),
                entry.request.kind,
                entry.request.addr,
                entry.kind
            );
            self.dispatch_request(entry.request)?;
        }
        Ok(())
    }

    fn count_request(&mut self, kind: ReqKind) {
        match kind {
            ReqKind::Load => self.stats.read_requests += 1,
            ReqKind::Store => self.stats.write_requests += 1,
        }
    }
}
