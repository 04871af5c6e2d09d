use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReqKind {
    Load,
    Store,
}

/// A processor memory request.  Returned unchanged to the processor when it completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProcRequest {
    pub id: u64,
    pub addr: u64,
    pub kind: ReqKind,
}

impl ProcRequest {
    pub fn load(id: u64, addr: u64) -> Self {
        Self {
            id,
            addr,
            kind: ReqKind::Load,
        }
    }

    pub fn store(id: u64, addr: u64) -> Self {
        Self {
            id,
            addr,
            kind: ReqKind::Store,
        }
    }

    pub fn is_store(&self) -> bool {
        self.kind == ReqKind::Store
    }
}
