//! Per-thread event aggregation state machine
//!
//! A thread context folds the primitive stream of one logical thread into
//! SynchroTrace events. It owns the compute and communication aggregators,
//! the thread's encoder, and the running event id. The dispatcher guarantees
//! a context is only driven while its thread is current, so the shared
//! shadow memory is passed in mutably without locking.

use tracing::warn;

use crate::encoder::Encoder;
use crate::error::{Result, TraceError};
use crate::events::{CommEvent, CompEvent, InstrMarker};
use crate::shadow::ShadowMemory;
use crate::stats::{BarrierStatsTracker, BarrierTally, Stats, ThreadSummary};
use crate::types::{Addr, Eid, SyncOp, Tid, MAX_TID};

pub struct ThreadContext {
    tid: Tid,
    prims_per_comp_ev: u32,
    /// Next event id to emit. Ids start at 1 and stay contiguous.
    eid: Eid,
    comp: CompEvent,
    comm: CommEvent,
    marker: InstrMarker,
    stats: Stats,
    barrier_stats: BarrierStatsTracker,
    encoder: Box<dyn Encoder>,
    // local bytes of the load currently being classified
    local_bytes: Vec<Addr>,
}

impl ThreadContext {
    pub fn new(tid: Tid, prims_per_comp_ev: u32, encoder: Box<dyn Encoder>) -> Result<Self> {
        if tid < 1 || tid > MAX_TID {
            return Err(TraceError::InvalidTid { tid: tid as u64 });
        }
        debug_assert!(prims_per_comp_ev >= 1 && prims_per_comp_ev <= 100);
        Ok(Self {
            tid,
            prims_per_comp_ev,
            eid: 1,
            comp: CompEvent::new(),
            comm: CommEvent::new(),
            marker: InstrMarker::new(),
            stats: Stats::default(),
            barrier_stats: BarrierStatsTracker::new(),
            encoder,
            local_bytes: Vec::new(),
        })
    }

    pub fn tid(&self) -> Tid {
        self.tid
    }

    pub fn on_iop(&mut self) -> Result<()> {
        self.comm_flush_if_active()?;
        self.comp.inc_iop();
        self.stats.iops += 1;
        self.barrier_stats.inc_iops();
        Ok(())
    }

    pub fn on_flop(&mut self) -> Result<()> {
        self.comm_flush_if_active()?;
        self.comp.inc_flop();
        self.stats.flops += 1;
        self.barrier_stats.inc_flops();
        Ok(())
    }

    /// Classify a load byte by byte against the shadow memory.
    ///
    /// A byte whose last writer is another thread, and which this thread has
    /// not read since that write, contributes a communication edge. All other
    /// bytes are thread-local. A load mixing both is coarsened to a
    /// communication event and its local bytes are dropped, losing a little
    /// granularity.
    pub fn on_read(&mut self, shadow: &mut ShadowMemory, start: Addr, size: u64) -> Result<()> {
        if size == 0 {
            return Ok(());
        }

        let tid = self.tid;
        let mut is_comm_edge = false;
        self.local_bytes.clear();

        for i in 0..size {
            let addr = start + i;
            let observed = (|| -> Result<(Option<Tid>, bool, Eid)> {
                let writer = shadow.writer(addr)?;
                let was_reader = shadow.is_reader(addr, tid)?;
                if !was_reader {
                    shadow.update_reader(addr, 1, tid)?;
                }
                let writer_eid = match writer {
                    Some(_) => shadow.writer_eid(addr)?,
                    None => 0,
                };
                Ok((writer, was_reader, writer_eid))
            })();

            match observed {
                Ok((Some(writer), false, writer_eid)) if writer != tid => {
                    is_comm_edge = true;
                    self.comm.add_edge(writer, writer_eid, addr);
                }
                Ok(_) => self.local_bytes.push(addr),
                Err(e) => {
                    // an unwritten byte beyond the shadowed space is still a
                    // read the replay needs; keep it as local compute
                    warn!(addr, error = %e, "treating load as a local compute read");
                    self.local_bytes.push(addr);
                }
            }
        }

        if is_comm_edge {
            self.comp_flush_if_active()?;
        } else {
            self.comm_flush_if_active()?;
            for &addr in &self.local_bytes {
                self.comp.record_read_range(addr, 1);
            }
            self.comp.inc_read();
        }

        self.check_comp_flush_limit()?;
        self.stats.reads += 1;
        self.barrier_stats.inc_mem_accesses();
        Ok(())
    }

    pub fn on_write(&mut self, shadow: &mut ShadowMemory, start: Addr, size: u64) -> Result<()> {
        if size == 0 {
            return Ok(());
        }

        self.comm_flush_if_active()?;
        self.comp.inc_write();
        self.comp.record_write_range(start, size);
        if let Err(e) = shadow.update_writer(start, size, self.tid, self.eid) {
            warn!(start, size, error = %e, "store beyond shadowed space dropped from tracking");
        }

        self.check_comp_flush_limit()?;
        self.stats.writes += 1;
        self.barrier_stats.inc_mem_accesses();
        Ok(())
    }

    /// Emit a synchronization event. `op` must be encodable; the dispatcher
    /// consumes `Swap` before it gets here.
    pub fn on_sync(&mut self, op: SyncOp, addr: Addr) -> Result<()> {
        let kind = match op.code() {
            Some(kind) => kind,
            None => return Ok(()),
        };

        self.comp_flush_if_active()?;
        self.comm_flush_if_active()?;

        match op {
            SyncOp::MutexLock => self.barrier_stats.inc_locks(),
            SyncOp::BarrierWait => self.barrier_stats.on_barrier(addr),
            _ => {}
        }

        self.encoder.emit_sync(self.eid, self.tid, kind, addr)?;
        self.bump_eid()
    }

    pub fn on_instr(&mut self) -> Result<()> {
        self.stats.instrs += 1;
        self.barrier_stats.inc_instrs();
        if let Some(count) = self.marker.record() {
            self.encoder.emit_instr_marker(count)?;
        }
        Ok(())
    }

    fn check_comp_flush_limit(&mut self) -> Result<()> {
        let cap = self.prims_per_comp_ev as u64;
        if self.comp.writes >= cap || self.comp.reads >= cap {
            self.comp_flush_if_active()?;
        }
        debug_assert!(
            !self.comp.is_active() || (self.comp.writes < cap && self.comp.reads < cap)
        );
        Ok(())
    }

    pub fn comp_flush_if_active(&mut self) -> Result<()> {
        if self.comp.is_active() {
            self.encoder.emit_comp(self.eid, self.tid, &self.comp)?;
            self.comp.reset();
            self.bump_eid()?;
        }
        Ok(())
    }

    pub fn comm_flush_if_active(&mut self) -> Result<()> {
        if self.comm.is_active() {
            self.encoder.emit_comm(self.eid, self.tid, &self.comm)?;
            self.comm.reset();
            self.bump_eid()?;
        }
        Ok(())
    }

    fn bump_eid(&mut self) -> Result<()> {
        self.eid = self
            .eid
            .checked_add(1)
            .ok_or(TraceError::EidOverflow { tid: self.tid })?;
        Ok(())
    }

    /// Flush any active aggregator and close the encoder.
    pub fn finish(&mut self) -> Result<()> {
        self.comp_flush_if_active()?;
        self.comm_flush_if_active()?;
        self.encoder.close()
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn barrier_tallies(&self) -> &[(Addr, BarrierTally)] {
        self.barrier_stats.tallies()
    }

    pub fn summary(&self) -> ThreadSummary {
        ThreadSummary {
            tid: self.tid,
            stats: self.stats,
            barriers: self.barrier_stats.tallies().to_vec(),
        }
    }
}
