use log::debug;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use super::error::CacheError;
use super::message::MessageKind;
use super::request::{ProcRequest, ReqKind};

/// Per-slot MESI state.  `IE`, `SE`, `EI` and `MI` are transient and always carry a pending
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ClientState {
    #[default]
    I,
    S,
    E,
    M,
    /// Waiting for data after a miss.
    IE,
    /// Holding S, waiting for an upgrade grant.
    SE,
    /// Evicting an E line.
    EI,
    /// Evicting an M line.
    MI,
}

impl ClientState {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::IE | Self::SE | Self::EI | Self::MI)
    }

    pub fn is_evicting(&self) -> bool {
        matches!(self, Self::EI | Self::MI)
    }
}

/// Where an outbound message goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outbound {
    /// To the line's manager, resolved through the dest map.
    Manager(MessageKind),
    /// To the requester named by the inbound forward id.
    Peer(MessageKind),
}

/// What the cache has to do after a client transition besides sending `outbound`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Processor request satisfied locally.
    Hit,
    /// A transaction was opened; its MSHR entry stays allocated.
    Opened,
    /// The requester transaction finished with this request.
    Completed(ProcRequest),
    /// The victim is gone; the parked request can claim the slot.
    EvictionDone(Option<ProcRequest>),
    /// A stable line was given up; the slot is free.
    Invalidated,
    /// E or M dropped to S.
    Downgraded,
    /// Only the state (if anything) changed.
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub outbound: SmallVec<[Outbound; 2]>,
    pub effect: Effect,
}

impl Transition {
    fn new(outbound: SmallVec<[Outbound; 2]>, effect: Effect) -> Self {
        Self { outbound, effect }
    }

    fn silent(effect: Effect) -> Self {
        Self::new(SmallVec::new(), effect)
    }
}

/// Coherence state machine of one cache slot.  The slot keeps its client across
/// reassignments; only the line bound to the slot changes.
#[derive(Debug, Default, Clone)]
pub struct Client {
    state: ClientState,
    pending: Option<ProcRequest>,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn pending(&self) -> Option<&ProcRequest> {
        self.pending.as_ref()
    }

    /// Force a stable state, used to seed lines in tests and scenario warm-up.
    pub fn set_stable(&mut self, state: ClientState) {
        debug_assert!(!state.is_transient());
        self.state = state;
        self.pending = None;
    }

    fn move_to(&mut self, next: ClientState, line: u64, cause: &str) {
        debug!(
            "client {:#x}: {:?} -> {:?} on {}",
            line, self.state, next, cause
        );
        self.state = next;
    }

    /// Processor load or store to the line bound to this slot.
    pub fn process_request(
        &mut self,
        request: ProcRequest,
        line: u64,
    ) -> Result<Transition, CacheError> {
        use ClientState::*;
        let cause = match request.kind {
            ReqKind::Load => "load",
            ReqKind::Store => "store",
        };
        let transition = match (self.state, request.kind) {
            (I, ReqKind::Load) => {
                self.move_to(IE, line, cause);
                self.pending = Some(request);
                Transition::new(smallvec![Outbound::Manager(MessageKind::CmIToS)], Effect::Opened)
            }
            (I, ReqKind::Store) => {
                self.move_to(IE, line, cause);
                self.pending = Some(request);
                Transition::new(smallvec![Outbound::Manager(MessageKind::CmIToE)], Effect::Opened)
            }
            (S, ReqKind::Store) => {
                self.move_to(SE, line, cause);
                self.pending = Some(request);
                Transition::new(smallvec![Outbound::Manager(MessageKind::CmIToE)], Effect::Opened)
            }
            (E, ReqKind::Store) => {
                self.move_to(M, line, cause);
                Transition::silent(Effect::Hit)
            }
            (S | E | M, _) => Transition::silent(Effect::Hit),
            (state, kind) => {
                return Err(CacheError::UnexpectedRequest {
                    state,
                    kind,
                    addr: line,
                })
            }
        };
        Ok(transition)
    }

    /// Start evicting the line bound to this slot so `parked` can take it over.  An S line goes
    /// silently; E and M lines notify the manager and park the request until the eviction
    /// resolves.
    pub fn evict(&mut self, parked: ProcRequest, line: u64) -> Result<Transition, CacheError> {
        use ClientState::*;
        let transition = match self.state {
            I => Transition::silent(Effect::Invalidated),
            S => {
                self.move_to(I, line, "silent eviction");
                Transition::silent(Effect::Invalidated)
            }
            E => {
                self.move_to(EI, line, "eviction");
                self.pending = Some(parked);
                Transition::new(smallvec![Outbound::Manager(MessageKind::CmEToI)], Effect::Opened)
            }
            M => {
                self.move_to(MI, line, "eviction");
                self.pending = Some(parked);
                Transition::new(smallvec![Outbound::Manager(MessageKind::CmMToI)], Effect::Opened)
            }
            state => {
                return Err(CacheError::UnexpectedRequest {
                    state,
                    kind: parked.kind,
                    addr: line,
                })
            }
        };
        Ok(transition)
    }

    /// Inbound coherence message from the manager or a peer.
    pub fn process_message(
        &mut self,
        msg: MessageKind,
        line: u64,
    ) -> Result<Transition, CacheError> {
        use ClientState::*;
        use MessageKind::*;
        let cause = msg.name();
        let transition = match (self.state, msg) {
            // requester side
            (IE, CcSData | McGrantSData) => {
                self.move_to(S, line, cause);
                self.complete(CmUnblockS)
            }
            (IE, McGrantEData | CcEData) => {
                let store = self.pending.map_or(false, |req| req.is_store());
                self.move_to(if store { M } else { E }, line, cause);
                self.complete(CmUnblockE)
            }
            (IE, CcMData) | (SE, McGrantEData | CcEData | CcMData) => {
                self.move_to(M, line, cause);
                self.complete(CmUnblockE)
            }
            // the S copy is gone but the request is still outstanding
            (IE | SE, McDemandI) => {
                self.move_to(IE, line, cause);
                Transition::new(smallvec![Outbound::Manager(CmUnblockI)], Effect::Unchanged)
            }

            // owner side
            (E, McFwdE) => {
                self.move_to(I, line, cause);
                Transition::new(smallvec![Outbound::Peer(CcEData)], Effect::Invalidated)
            }
            (M, McFwdE) => {
                self.move_to(I, line, cause);
                Transition::new(smallvec![Outbound::Peer(CcMData)], Effect::Invalidated)
            }
            (E, McFwdS) => {
                self.move_to(S, line, cause);
                Transition::new(
                    smallvec![Outbound::Peer(CcSData), Outbound::Manager(CmClean)],
                    Effect::Downgraded,
                )
            }
            (M, McFwdS) => {
                self.move_to(S, line, cause);
                Transition::new(
                    smallvec![Outbound::Peer(CcSData), Outbound::Manager(CmWriteback)],
                    Effect::Downgraded,
                )
            }
            (S | E, McDemandI) => {
                self.move_to(I, line, cause);
                Transition::new(smallvec![Outbound::Manager(CmUnblockI)], Effect::Invalidated)
            }
            (M, McDemandI) => {
                self.move_to(I, line, cause);
                Transition::new(
                    smallvec![Outbound::Manager(CmUnblockIDirty)],
                    Effect::Invalidated,
                )
            }

            // eviction
            (EI, McGrantI) => {
                self.finish_eviction(line, cause, smallvec![Outbound::Manager(CmUnblockI)])
            }
            (MI, McGrantI) => {
                self.finish_eviction(line, cause, smallvec![Outbound::Manager(CmUnblockIDirty)])
            }
            // a forward or demand overtook the grant; the line is leaving, so a forward hands the
            // whole line to the requester whichever copy it asked for
            (EI, McFwdE | McFwdS) => {
                self.finish_eviction(line, cause, smallvec![Outbound::Peer(CcEData)])
            }
            (MI, McFwdE | McFwdS) => {
                self.finish_eviction(line, cause, smallvec![Outbound::Peer(CcMData)])
            }
            (EI, McDemandI) => {
                self.finish_eviction(line, cause, smallvec![Outbound::Manager(CmUnblockI)])
            }
            (MI, McDemandI) => {
                self.finish_eviction(line, cause, smallvec![Outbound::Manager(CmUnblockIDirty)])
            }

            (state, msg) => {
                return Err(CacheError::ProtocolViolation {
                    state,
                    msg,
                    addr: line,
                })
            }
        };
        Ok(transition)
    }

    fn complete(&mut self, unblock: MessageKind) -> Transition {
        let effect = match self.pending.take() {
            Some(request) => Effect::Completed(request),
            None => Effect::Unchanged,
        };
        Transition::new(smallvec![Outbound::Manager(unblock)], effect)
    }

    fn finish_eviction(
        &mut self,
        line: u64,
        cause: &str,
        outbound: SmallVec<[Outbound; 2]>,
    ) -> Transition {
        self.move_to(ClientState::I, line, cause);
        Transition::new(outbound, Effect::EvictionDone(self.pending.take()))
    }
}
