use serde::Serialize;
use std::io::{self, Write};
use std::ops::AddAssign;

use super::stall::StallKind;
use crate::timeq::Cycle;

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct L1Stats {
    pub cycles: Cycle,
    pub read_requests: u64,
    pub write_requests: u64,
    pub hits: u64,
    pub misses: u64,
    pub mshr_stalls: u64,
    pub prev_pend_stalls: u64,
    pub lru_busy_stalls: u64,
    pub trans_stalls: u64,
    pub max_stall_buffer_size: usize,
    /// Sum over ticks of the number of valid lines.
    pub occupancy_accum: u64,
    pub empty_cycles: u64,
    pub coh_msgs_sent: u64,
    pub coh_msgs_received: u64,
    pub credits_sent: u64,
    pub credits_received: u64,
}

impl AddAssign<&L1Stats> for L1Stats {
    fn add_assign(&mut self, other: &L1Stats) {
        self.cycles = self.cycles.max(other.cycles);
        self.read_requests = self.read_requests.saturating_add(other.read_requests);
        self.write_requests = self.write_requests.saturating_add(other.write_requests);
        self.hits = self.hits.saturating_add(other.hits);
        self.misses = self.misses.saturating_add(other.misses);
        self.mshr_stalls = self.mshr_stalls.saturating_add(other.mshr_stalls);
        self.prev_pend_stalls = self.prev_pend_stalls.saturating_add(other.prev_pend_stalls);
        self.lru_busy_stalls = self.lru_busy_stalls.saturating_add(other.lru_busy_stalls);
        self.trans_stalls = self.trans_stalls.saturating_add(other.trans_stalls);
        self.max_stall_buffer_size = self.max_stall_buffer_size.max(other.max_stall_buffer_size);
        self.occupancy_accum = self.occupancy_accum.saturating_add(other.occupancy_accum);
        self.empty_cycles = self.empty_cycles.saturating_add(other.empty_cycles);
        self.coh_msgs_sent = self.coh_msgs_sent.saturating_add(other.coh_msgs_sent);
        self.coh_msgs_received = self.coh_msgs_received.saturating_add(other.coh_msgs_received);
        self.credits_sent = self.credits_sent.saturating_add(other.credits_sent);
        self.credits_received = self.credits_received.saturating_add(other.credits_received);
    }
}

impl L1Stats {
    pub fn record_stall(&mut self, kind: StallKind, buffer_len: usize) {
        let counter = match kind {
            StallKind::MshrStall => &mut self.mshr_stalls,
            StallKind::PrevPendStall => &mut self.prev_pend_stalls,
            StallKind::LruBusyStall => &mut self.lru_busy_stalls,
            StallKind::TransStall => &mut self.trans_stalls,
        };
        *counter += 1;
        self.max_stall_buffer_size = self.max_stall_buffer_size.max(buffer_len);
    }

    pub fn total_stalls(&self) -> u64 {
        self.mshr_stalls + self.prev_pend_stalls + self.lru_busy_stalls + self.trans_stalls
    }

    pub fn miss_rate(&self) -> f64 {
        let accesses = self.hits + self.misses;
        if accesses == 0 {
            0.0
        } else {
            self.misses as f64 / accesses as f64
        }
    }

    pub fn avg_occupancy(&self) -> f64 {
        if self.cycles == 0 {
            0.0
        } else {
            self.occupancy_accum as f64 / self.cycles as f64
        }
    }

    pub fn write_report<W: Write>(&self, name: &str, out: &mut W) -> io::Result<()> {
        writeln!(out, "{} stats", name)?;
        writeln!(out, "  cycles                {}", self.cycles)?;
        writeln!(out, "  processor reads       {}", self.read_requests)?;
        writeln!(out, "  processor writes      {}", self.write_requests)?;
        writeln!(out, "  hits                  {}", self.hits)?;
        writeln!(out, "  misses                {}", self.misses)?;
        writeln!(out, "  miss rate             {:.3}", self.miss_rate())?;
        writeln!(out, "  mshr stalls           {}", self.mshr_stalls)?;
        writeln!(out, "  prev pend stalls      {}", self.prev_pend_stalls)?;
        writeln!(out, "  lru busy stalls       {}", self.lru_busy_stalls)?;
        writeln!(out, "  trans stalls          {}", self.trans_stalls)?;
        writeln!(out, "  max stall buffer      {}", self.max_stall_buffer_size)?;
        writeln!(out, "  avg occupancy         {:.2}", self.avg_occupancy())?;
        writeln!(out, "  empty cycles          {}", self.empty_cycles)?;
        writeln!(out, "  coh msgs sent         {}", self.coh_msgs_sent)?;
        writeln!(out, "  coh msgs received     {}", self.coh_msgs_received)?;
        writeln!(out, "  credits sent          {}", self.credits_sent)?;
        writeln!(out, "  credits received      {}", self.credits_received)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stall_counters_by_kind() {
        let mut stats = L1Stats::default();
        stats.record_stall(StallKind::MshrStall, 1);
        stats.record_stall(StallKind::TransStall, 3);
        stats.record_stall(StallKind::TransStall, 2);
        assert_eq!(stats.mshr_stalls, 1);
        assert_eq!(stats.trans_stalls, 2);
        assert_eq!(stats.total_stalls(), 3);
        assert_eq!(stats.max_stall_buffer_size, 3);
    }

    #[test]
    fn aggregate_saturates() {
        let mut a = L1Stats {
            hits: u64::MAX,
            misses: 1,
            cycles: 10,
            ..Default::default()
        };
        let b = L1Stats {
            hits: 5,
            misses: 2,
            cycles: 7,
            ..Default::default()
        };
        a += &b;
        assert_eq!(a.hits, u64::MAX);
        assert_eq!(a.misses, 3);
        assert_eq!(a.cycles, 10);
    }

    #[test]
    fn report_mentions_every_counter() {
        let stats = L1Stats::default();
        let mut out = Vec::new();
        stats.write_report("L1D", &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("L1D stats"));
        assert!(text.contains("trans stalls"));
        assert!(text.contains("credits received"));
    }
}
