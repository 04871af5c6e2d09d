use log::debug;

use super::L1Cache;
use crate::cache::client::Effect;
use crate::cache::error::CacheError;
use crate::cache::message::{CoherenceMessage, MessageKind};
use crate::cache::request::ProcRequest;
use crate::cache::tag_store::SlotId;

impl L1Cache {
    /// Entry point for a coherence message from the manager or a peer cache.
    pub fn process_peer_and_manager_request(
        &mut self,
        msg: CoherenceMessage,
    ) -> Result<(), CacheError> {
        let line = self.tags.get_line_addr(msg.addr);
        let Some(slot) = self.tags.get_entry(msg.addr) else {
            return self.respond_with_default(&msg);
        };

        let transition = self.clients[slot].process_message(msg.msg, line)?;
        self.send(&transition.outbound, line, msg.forward_id)?;

        match transition.effect {
            Effect::Completed(request) => {
                self.mshr.release(line);
                self.reply(request);
                self.wake(line, true)
            }
            Effect::EvictionDone(parked) => {
                self.tags.invalidate(slot);
                if let Some(request) = parked {
                    self.resume_parked(slot, request)?;
                }
                self.wake(line, false)
            }
            Effect::Invalidated => {
                self.tags.invalidate(slot);
                Ok(())
            }
            Effect::Downgraded | Effect::Unchanged | Effect::Hit | Effect::Opened => Ok(()),
        }
    }

    /// Answer a message for a line this cache has no record of.  A shared line dropped silently
    /// is still listed at the manager, so its invalidation is acknowledged as if the line had
    /// been here.  The reply carries the inbound address unchanged.
    pub fn respond_with_default(&mut self, msg: &CoherenceMessage) -> Result<(), CacheError> {
        debug!(
            "{}: no record of {:#x} for {}, default reply",
            self.name(),
            msg.addr,
            msg.msg.name()
        );
        let dst = self.dest_map.lookup(msg.addr);
        let reply = CoherenceMessage::new(MessageKind::CmUnblockI, msg.addr, self.node_id, dst);
        self.enqueue(reply);
        Ok(())
    }

    /// The eviction of the slot's old line is over; hand the slot to the request that caused it.
    fn resume_parked(&mut self, slot: SlotId, request: ProcRequest) -> Result<(), CacheError> {
        let line = self.tags.get_line_addr(request.addr);
        debug!(
            "{}: slot {} now holds {:#x}, resuming {:?}",
            self.name(),
            slot,
            line,
            request.kind
        );
        self.tags.install(slot, request.addr);
        self.start_miss(slot, request, line)
    }
}
