use log::debug;

use super::L1Cache;
use crate::cache::client::Effect;
use crate::cache::error::{CacheError, StallCause};
use crate::cache::request::ProcRequest;
use crate::cache::tag_store::{Reservation, SlotId};

impl L1Cache {
    /// Entry point for a new load or store from the processor.
    pub fn process_processor_request(&mut self, request: ProcRequest) -> Result<(), CacheError> {
        self.count_request(request.kind);
        self.dispatch_request(request)
    }

    /// Shared by new requests and replays from the stall buffer.
    pub(super) fn dispatch_request(&mut self, request: ProcRequest) -> Result<(), CacheError> {
        let line = self.tags.get_line_addr(request.addr);

        // the MSHR entry is taken before the tag lookup and given back on a clean hit
        if self.mshr.has_match(line) {
            self.stall(StallCause::LineAlreadyPending, request, line);
            return Ok(());
        }
        if self.mshr.is_full() {
            self.stall(StallCause::MshrFull, request, line);
            return Ok(());
        }
        self.mshr.allocate(line, request)?;

        match self.tags.reserve_block_for(request.addr) {
            Reservation::Hit(slot) => self.access_present_line(slot, request, line),
            Reservation::Installed(slot) => {
                self.stats.misses += 1;
                self.start_miss(slot, request, line)
            }
            Reservation::Victim { slot, line: victim } => {
                self.start_eviction(slot, victim, request, line)
            }
        }
    }

    fn access_present_line(
        &mut self,
        slot: SlotId,
        request: ProcRequest,
        line: u64,
    ) -> Result<(), CacheError> {
        if self.clients[slot].state().is_evicting() {
            // the line is still in the array but its slot already belongs to another line
            self.mshr.release(line);
            self.stall(StallCause::TargetMidEviction, request, line);
            return Ok(());
        }
        let transition = self.clients[slot].process_request(request, line)?;
        self.tags.touch(slot);
        match transition.effect {
            Effect::Hit => {
                self.stats.hits += 1;
                self.mshr.release(line);
                self.reply(request);
            }
            _ => {
                // upgrade from S
                self.stats.misses += 1;
                self.send(&transition.outbound, line, None)?;
            }
        }
        Ok(())
    }

    /// Run the miss path for `request` in a slot already bound to its line.
    pub(super) fn start_miss(
        &mut self,
        slot: SlotId,
        request: ProcRequest,
        line: u64,
    ) -> Result<(), CacheError> {
        let transition = self.clients[slot].process_request(request, line)?;
        self.send(&transition.outbound, line, None)
    }

    fn start_eviction(
        &mut self,
        slot: SlotId,
        victim: u64,
        request: ProcRequest,
        line: u64,
    ) -> Result<(), CacheError> {
        if self.clients[slot].state().is_transient() {
            self.mshr.release(line);
            self.stall(StallCause::VictimBusy, request, victim);
            return Ok(());
        }
        self.stats.misses += 1;
        debug!(
            "{}: evict {:#x} ({:?}) for {:#x}",
            self.name(),
            victim,
            self.clients[slot].state(),
            line
        );
        let transition = self.clients[slot].evict(request, victim)?;
        match transition.effect {
            Effect::Invalidated => {
                // shared victims leave without telling the manager
                self.tags.invalidate(slot);
                self.tags.install(slot, request.addr);
                self.start_miss(slot, request, line)
            }
            _ => self.send(&transition.outbound, victim, None),
        }
    }
}
