use phf::phf_map;
use serde::Serialize;

use super::NodeId;

/// MESI protocol messages.  `Cm*` go client to manager, `Mc*` manager to client, `Cc*` client
/// to client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MessageKind {
    CmIToS,
    CmIToE,
    CmEToI,
    CmMToI,
    CmUnblockS,
    CmUnblockE,
    CmUnblockI,
    CmUnblockIDirty,
    CmClean,
    CmWriteback,
    McGrantSData,
    McGrantEData,
    McGrantI,
    McFwdS,
    McFwdE,
    McDemandI,
    CcSData,
    CcEData,
    CcMData,
}

static MESSAGE_NAMES: phf::Map<&'static str, MessageKind> = phf_map! {
    "CM_I_to_S" => MessageKind::CmIToS,
    "CM_I_to_E" => MessageKind::CmIToE,
    "CM_E_to_I" => MessageKind::CmEToI,
    "CM_M_to_I" => MessageKind::CmMToI,
    "CM_UNBLOCK_S" => MessageKind::CmUnblockS,
    "CM_UNBLOCK_E" => MessageKind::CmUnblockE,
    "CM_UNBLOCK_I" => MessageKind::CmUnblockI,
    "CM_UNBLOCK_I_DIRTY" => MessageKind::CmUnblockIDirty,
    "CM_CLEAN" => MessageKind::CmClean,
    "CM_WRITEBACK" => MessageKind::CmWriteback,
    "MC_GRANT_S_DATA" => MessageKind::McGrantSData,
    "MC_GRANT_E_DATA" => MessageKind::McGrantEData,
    "MC_GRANT_I" => MessageKind::McGrantI,
    "MC_FWD_S" => MessageKind::McFwdS,
    "MC_FWD_E" => MessageKind::McFwdE,
    "MC_DEMAND_I" => MessageKind::McDemandI,
    "CC_S_DATA" => MessageKind::CcSData,
    "CC_E_DATA" => MessageKind::CcEData,
    "CC_M_DATA" => MessageKind::CcMData,
};

impl MessageKind {
    /// Look up a message by its protocol name, e.g. `"MC_GRANT_S_DATA"`.
    pub fn from_name(name: &str) -> Option<Self> {
        MESSAGE_NAMES.get(name).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::CmIToS => "CM_I_to_S",
            Self::CmIToE => "CM_I_to_E",
            Self::CmEToI => "CM_E_to_I",
            Self::CmMToI => "CM_M_to_I",
            Self::CmUnblockS => "CM_UNBLOCK_S",
            Self::CmUnblockE => "CM_UNBLOCK_E",
            Self::CmUnblockI => "CM_UNBLOCK_I",
            Self::CmUnblockIDirty => "CM_UNBLOCK_I_DIRTY",
            Self::CmClean => "CM_CLEAN",
            Self::CmWriteback => "CM_WRITEBACK",
            Self::McGrantSData => "MC_GRANT_S_DATA",
            Self::McGrantEData => "MC_GRANT_E_DATA",
            Self::McGrantI => "MC_GRANT_I",
            Self::McFwdS => "MC_FWD_S",
            Self::McFwdE => "MC_FWD_E",
            Self::McDemandI => "MC_DEMAND_I",
            Self::CcSData => "CC_S_DATA",
            Self::CcEData => "CC_E_DATA",
            Self::CcMData => "CC_M_DATA",
        }
    }

    /// Requests open a transaction at the manager; everything else answers one.
    pub fn coh_type(&self) -> CohType {
        match self {
            Self::CmIToS | Self::CmIToE | Self::CmEToI | Self::CmMToI => CohType::Req,
            _ => CohType::Rply,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CohType {
    Req,
    Rply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CoherenceMessage {
    pub coh_type: CohType,
    pub addr: u64,
    pub msg: MessageKind,
    pub src_id: NodeId,
    pub dst_id: NodeId,
    pub forward_id: Option<NodeId>,
}

impl CoherenceMessage {
    pub fn new(msg: MessageKind, addr: u64, src_id: NodeId, dst_id: NodeId) -> Self {
        Self {
            coh_type: msg.coh_type(),
            addr,
            msg,
            src_id,
            dst_id,
            forward_id: None,
        }
    }

    pub fn with_forward(mut self, forward_id: NodeId) -> Self {
        self.forward_id = Some(forward_id);
        self
    }
}

/// Transport envelope.  `msg_type` is one of the two configured discriminators; credit packets
/// carry no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkPacket {
    pub msg_type: i32,
    pub src: NodeId,
    pub dst: NodeId,
    pub payload: Option<CoherenceMessage>,
}

impl NetworkPacket {
    pub fn coherence(msg_type: i32, msg: CoherenceMessage) -> Self {
        Self {
            msg_type,
            src: msg.src_id,
            dst: msg.dst_id,
            payload: Some(msg),
        }
    }

    pub fn credit(msg_type: i32, src: NodeId, dst: NodeId) -> Self {
        Self {
            msg_type,
            src,
            dst,
            payload: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_name_round_trips() {
        for (name, kind) in MESSAGE_NAMES.entries() {
            assert_eq!(kind.name(), *name);
        }
        assert_eq!(MESSAGE_NAMES.len(), 19);
        assert_eq!(MessageKind::from_name("MC_GRANT_X"), None);
    }

    #[test]
    fn requests_and_replies_are_typed() {
        assert_eq!(MessageKind::CmIToS.coh_type(), CohType::Req);
        assert_eq!(MessageKind::CmMToI.coh_type(), CohType::Req);
        assert_eq!(MessageKind::CmUnblockIDirty.coh_type(), CohType::Rply);
        assert_eq!(MessageKind::CcSData.coh_type(), CohType::Rply);
    }
}
