use crate::cache::{
    ClientState, CoherenceMessage, FixedDestMap, L1Cache, MessageKind, NetworkPacket, NodeId,
    ProcRequest,
};
use crate::sim::config::{L1Config, MsgTypes};
use crate::timeq::Cycle;

pub const NODE: NodeId = 11;
pub const MANAGER: NodeId = 13;
pub const PEER: NodeId = 7;

// default geometry: 128 sets of 4 ways, 32-byte lines
pub const SET_STRIDE: u64 = 0x1000;

/// `count` line addresses that all land in the same set as `base`.
pub fn same_set(base: u64, count: usize) -> Vec<u64> {
    (0..count as u64).map(|i| base + i * SET_STRIDE).collect()
}

/// Ticks one `L1Cache` and records what comes out of it.
pub struct Harness {
    pub cache: L1Cache,
    pub now: Cycle,
    pub sent: Vec<CoherenceMessage>,
    pub credits_out: Vec<NetworkPacket>,
    pub replies: Vec<ProcRequest>,
    msg_types: MsgTypes,
    next_id: u64,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(L1Config::default())
    }

    pub fn with_config(config: L1Config) -> Self {
        let config = L1Config {
            node_id: NODE,
            ..config
        };
        let msg_types = config.msg_types;
        let cache = L1Cache::new(config, Box::new(FixedDestMap::new(MANAGER)))
            .expect("valid cache config");
        Self {
            cache,
            now: 0,
            sent: Vec::new(),
            credits_out: Vec::new(),
            replies: Vec::new(),
            msg_types,
            next_id: 0,
        }
    }

    pub fn seed(&mut self, addr: u64, state: ClientState) {
        self.cache.seed_line(addr, state).expect("seedable line");
    }

    pub fn load(&mut self, addr: u64) -> ProcRequest {
        let request = ProcRequest::load(self.id(), addr);
        self.cache.handle_processor_request(request);
        self.settle();
        request
    }

    pub fn store(&mut self, addr: u64) -> ProcRequest {
        let request = ProcRequest::store(self.id(), addr);
        self.cache.handle_processor_request(request);
        self.settle();
        request
    }

    pub fn deliver(&mut self, kind: MessageKind, addr: u64) {
        self.deliver_msg(CoherenceMessage::new(kind, addr, MANAGER, NODE));
    }

    pub fn forward(&mut self, kind: MessageKind, addr: u64, requester: NodeId) {
        self.deliver_msg(CoherenceMessage::new(kind, addr, MANAGER, NODE).with_forward(requester));
    }

    pub fn deliver_msg(&mut self, msg: CoherenceMessage) {
        self.deliver_packet(NetworkPacket::coherence(self.msg_types.coh_msg, msg));
    }

    pub fn deliver_packet(&mut self, packet: NetworkPacket) {
        self.cache.handle_peer_and_manager_request(packet);
        self.settle();
    }

    pub fn credit(&mut self) {
        self.deliver_packet(NetworkPacket::credit(self.msg_types.credit_msg, MANAGER, NODE));
    }

    pub fn msg_types(&self) -> MsgTypes {
        self.msg_types
    }

    fn id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn step(&mut self) {
        self.cache.tick(self.now).expect("no protocol error");
        self.collect();
        self.now += 1;
    }

    /// Tick until nothing is in flight, or for a bounded number of cycles when credits run out.
    pub fn settle(&mut self) {
        self.step();
        for _ in 0..64 {
            if self.cache.is_quiescent() {
                break;
            }
            self.step();
        }
    }

    pub fn collect(&mut self) {
        self.replies.extend(self.cache.drain_processor_replies());
        for packet in self.cache.drain_network_output() {
            match packet.payload {
                Some(msg) => self.sent.push(msg),
                None => self.credits_out.push(packet),
            }
        }
    }

    /// Messages sent since the last call, as (kind, addr).
    pub fn take_sent(&mut self) -> Vec<(MessageKind, u64)> {
        self.sent.drain(..).map(|msg| (msg.msg, msg.addr)).collect()
    }

    pub fn take_replies(&mut self) -> Vec<ProcRequest> {
        std::mem::take(&mut self.replies)
    }

    pub fn state(&self, addr: u64) -> Option<ClientState> {
        self.cache.client_state(addr)
    }

    pub fn line(&self, addr: u64) -> u64 {
        self.cache.line_of(addr)
    }

    pub fn has_mshr(&self, addr: u64) -> bool {
        self.cache.mshr().has_match(self.cache.line_of(addr))
    }
}
