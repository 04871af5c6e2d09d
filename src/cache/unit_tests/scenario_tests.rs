use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::harness::{Harness, MANAGER, NODE, SET_STRIDE};
use crate::cache::{ClientState, CoherenceMessage, MessageKind, NetworkPacket, ProcRequest};
use crate::sim::config::L1Config;

#[test]
fn single_load_end_to_end() {
    let config = L1Config::default();
    let lookup_time = config.cache.lookup_time;
    let hit_time = config.cache.hit_time;
    let mut h = Harness::with_config(config);
    let addr = 0x1234_5678;
    let line = h.line(addr);
    assert_eq!(line, 0x1234_5660);

    h.now = 1;
    let request = ProcRequest::load(42, addr);
    h.cache.handle_processor_request(request);
    h.step();
    assert!(h.has_mshr(addr));
    assert_eq!(h.state(addr), Some(ClientState::IE));

    // grant shows up at tick 2, long before the request itself leaves
    let grant = CoherenceMessage::new(MessageKind::McGrantSData, addr, MANAGER, NODE);
    let packet = NetworkPacket::coherence(h.msg_types().coh_msg, grant);
    h.cache.handle_peer_and_manager_request(packet);
    h.step();
    assert_eq!(h.state(addr), Some(ClientState::S));
    assert!(!h.has_mshr(addr));

    let mut seen = Vec::new();
    let mut replied_at = None;
    while h.now <= 2 + lookup_time {
        let now = h.now;
        h.step();
        seen.extend(h.take_sent().into_iter().map(|(kind, a)| (now, kind, a)));
        if replied_at.is_none() && !h.replies.is_empty() {
            replied_at = Some(now);
        }
    }
    assert_eq!(
        seen,
        vec![
            (1 + lookup_time, MessageKind::CmIToS, line),
            (2 + lookup_time, MessageKind::CmUnblockS, line)
        ]
    );
    assert_eq!(replied_at, Some(2 + hit_time));
    assert_eq!(h.take_replies(), vec![request]);
    assert!(h.cache.is_quiescent());
    // one credit back for the grant
    assert_eq!(h.credits_out.len(), 1);
}

/// Directory stand-in for a cache that is the only sharer of every line: grants whatever is
/// asked for and returns a credit per message.
struct SoleOwnerManager {
    coh_msg: i32,
    credit_msg: i32,
    requests_seen: HashMap<MessageKind, u64>,
}

impl SoleOwnerManager {
    fn new(h: &Harness) -> Self {
        let types = h.msg_types();
        Self {
            coh_msg: types.coh_msg,
            credit_msg: types.credit_msg,
            requests_seen: HashMap::new(),
        }
    }

    fn respond(&mut self, msg: &CoherenceMessage) -> Vec<NetworkPacket> {
        assert_eq!(msg.src_id, NODE);
        assert_eq!(msg.dst_id, MANAGER);
        *self.requests_seen.entry(msg.msg).or_default() += 1;

        let mut out = vec![NetworkPacket::credit(self.credit_msg, MANAGER, NODE)];
        let answer = match msg.msg {
            MessageKind::CmIToS => Some(MessageKind::McGrantSData),
            MessageKind::CmIToE => Some(MessageKind::McGrantEData),
            MessageKind::CmEToI | MessageKind::CmMToI => Some(MessageKind::McGrantI),
            _ => None,
        };
        if let Some(kind) = answer {
            let reply = CoherenceMessage::new(kind, msg.addr, MANAGER, NODE);
            out.push(NetworkPacket::coherence(self.coh_msg, reply));
        }
        out
    }
}

#[test]
fn random_traffic_against_sole_owner_manager() {
    let config = L1Config {
        mshr_size: 4,
        downstream_credits: 3,
        ..L1Config::default()
    };
    let mut h = Harness::with_config(config);
    let mut manager = SoleOwnerManager::new(&h);
    let mut rng = StdRng::seed_from_u64(2024);

    let total = 400;
    let mut issued: Vec<ProcRequest> = Vec::new();
    let mut answered: HashMap<u64, usize> = HashMap::new();
    let mut to_cache: Vec<NetworkPacket> = Vec::new();

    while h.now < 50_000 {
        if issued.len() < total && rng.gen_bool(0.5) {
            // two sets, eight tags each: plenty of conflicts and evictions
            let set = rng.gen_range(0..2u64) * 0x20;
            let tag = rng.gen_range(0..8u64) * SET_STRIDE;
            let addr = 0x40_0000 + set + tag + rng.gen_range(0..32u64);
            let id = issued.len() as u64;
            let request = if rng.gen_bool(0.3) {
                ProcRequest::store(id, addr)
            } else {
                ProcRequest::load(id, addr)
            };
            h.cache.handle_processor_request(request);
            issued.push(request);
        }
        for packet in to_cache.drain(..) {
            h.cache.handle_peer_and_manager_request(packet);
        }

        h.step();

        for msg in std::mem::take(&mut h.sent) {
            to_cache.extend(manager.respond(&msg));
        }
        for reply in h.take_replies() {
            *answered.entry(reply.id).or_default() += 1;
        }

        if issued.len() == total
            && answered.len() == total
            && to_cache.is_empty()
            && h.cache.is_quiescent()
        {
            break;
        }
    }

    assert_eq!(issued.len(), total);
    assert_eq!(answered.len(), total, "requests left unanswered");
    assert!(answered.values().all(|&n| n == 1));
    assert!(h.cache.mshr().is_empty());
    assert!(h.cache.stall_buffer().is_empty());
    assert!(h.cache.tag_store().occupancy() <= 8);

    // every grant was unblocked, every eviction was answered
    let seen = |kind| manager.requests_seen.get(&kind).copied().unwrap_or(0);
    assert_eq!(
        seen(MessageKind::CmIToS) + seen(MessageKind::CmIToE),
        seen(MessageKind::CmUnblockS) + seen(MessageKind::CmUnblockE)
    );
    assert_eq!(
        seen(MessageKind::CmEToI) + seen(MessageKind::CmMToI),
        seen(MessageKind::CmUnblockI) + seen(MessageKind::CmUnblockIDirty)
    );
    assert!(seen(MessageKind::CmEToI) + seen(MessageKind::CmMToI) > 0);

    let stats = h.cache.stats();
    assert_eq!(stats.read_requests + stats.write_requests, total as u64);
    assert_eq!(stats.hits + stats.misses, total as u64);
}
