use super::client::ClientState;
use super::message::MessageKind;
use super::request::ReqKind;
use super::stall::StallKind;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("protocol violation: {msg:?} received in state {state:?} for line {addr:#x}")]
    ProtocolViolation {
        state: ClientState,
        msg: MessageKind,
        addr: u64,
    },

    #[error("unexpected {kind:?} request in state {state:?} for line {addr:#x}")]
    UnexpectedRequest {
        state: ClientState,
        kind: ReqKind,
        addr: u64,
    },

    #[error("unknown packet type {0}")]
    UnknownPacketType(i32),

    #[error("{msg:?} for line {addr:#x} needs a forward id")]
    MissingForwardId { msg: MessageKind, addr: u64 },

    #[error("coherence packet without a payload")]
    MissingPayload,

    #[error("mshr full")]
    MshrFull,
}

/// Why a processor request could not proceed.  Recovered locally by deferring the request;
/// never returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StallCause {
    MshrFull,
    LineAlreadyPending,
    VictimBusy,
    TargetMidEviction,
}

impl From<StallCause> for StallKind {
    fn from(cause: StallCause) -> Self {
        match cause {
            StallCause::MshrFull => StallKind::MshrStall,
            StallCause::LineAlreadyPending => StallKind::PrevPendStall,
            StallCause::VictimBusy => StallKind::LruBusyStall,
            StallCause::TargetMidEviction => StallKind::TransStall,
        }
    }
}
