//! Primitive dispatch and run-wide bookkeeping
//!
//! The generator routes a globally ordered primitive stream to the per-thread
//! contexts. Thread identity is carried in the stream by swap primitives; the
//! generator keeps a cursor to the current context, creates contexts lazily
//! on first sight of a thread, and records the spawn, thread-order, and
//! barrier-participation metadata that ends up in the run summaries.
//!
//! Primitive processing is single-threaded, so contexts and the shared
//! shadow memory are mutated without locks. The metadata tables sit behind
//! one mutex that is only taken on swap, create, barrier, and shutdown.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing::debug;

use crate::encoder::EncoderKind;
use crate::error::{Result, TraceError};
use crate::shadow::ShadowMemory;
use crate::stats::{self, ThreadSummary};
use crate::thread_context::ThreadContext;
use crate::types::{Addr, CompKind, CxtKind, MemKind, Primitive, SyncOp, Tid, MAX_TID};

/// Run configuration.
#[derive(Debug, Clone)]
pub struct GenConfig {
    pub output_dir: PathBuf,
    /// Maximum reads or writes folded into one compute event, 1..=100.
    pub prims_per_comp_ev: u32,
    pub encoder: EncoderKind,
}

impl Default for GenConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            prims_per_comp_ev: 100,
            encoder: EncoderKind::Text,
        }
    }
}

/// Metadata shared across the run, guarded by the generator's mutex.
#[derive(Debug, Default)]
pub struct RunMetadata {
    /// Each thread's id, in the order it was first seen.
    pub threads_in_order: Vec<Tid>,
    /// (spawner, child address) pairs in program order.
    pub thread_spawns: Vec<(Tid, Addr)>,
    /// Barrier participants, insertion-ordered by first wait on the barrier.
    pub barrier_participants: Vec<(Addr, BTreeSet<Tid>)>,
}

/// Event-generation engine: the frontend's callback surface.
pub struct Generator {
    config: GenConfig,
    shadow: ShadowMemory,
    tcxts: HashMap<Tid, ThreadContext>,
    current: Option<Tid>,
    meta: Mutex<RunMetadata>,
}

impl Generator {
    pub fn new(config: GenConfig) -> Self {
        Self {
            config,
            shadow: ShadowMemory::new(),
            tcxts: HashMap::new(),
            current: None,
            meta: Mutex::new(RunMetadata::default()),
        }
    }

    /// Route one primitive.
    pub fn on_primitive(&mut self, prim: Primitive) -> Result<()> {
        match prim {
            Primitive::Mem { kind, addr, size } => self.on_mem(kind, addr, size),
            Primitive::Comp(kind) => self.on_comp(kind),
            Primitive::Sync { op, addr } => self.on_sync(op, addr),
            Primitive::Cxt(kind) => self.on_cxt(kind),
        }
    }

    pub fn on_mem(&mut self, kind: MemKind, addr: Addr, size: u64) -> Result<()> {
        let tid = self.current.ok_or(TraceError::NoCurrentThread)?;
        let tcxt = self
            .tcxts
            .get_mut(&tid)
            .ok_or(TraceError::NoCurrentThread)?;
        match kind {
            MemKind::Load => tcxt.on_read(&mut self.shadow, addr, size),
            MemKind::Store => tcxt.on_write(&mut self.shadow, addr, size),
        }
    }

    pub fn on_comp(&mut self, kind: CompKind) -> Result<()> {
        let tcxt = self.current_context()?;
        match kind {
            CompKind::Iop => tcxt.on_iop(),
            CompKind::Flop => tcxt.on_flop(),
        }
    }

    pub fn on_sync(&mut self, op: SyncOp, addr: Addr) -> Result<()> {
        match op {
            SyncOp::Swap => {
                if addr == 0 || addr > MAX_TID as u64 {
                    return Err(TraceError::InvalidTid { tid: addr });
                }
                return self.swap_thread(addr as Tid);
            }
            SyncOp::Create => {
                let tid = self.current.ok_or(TraceError::NoCurrentThread)?;
                let mut meta = lock(&self.meta);
                meta.thread_spawns.push((tid, addr));
            }
            SyncOp::BarrierWait => {
                let tid = self.current.ok_or(TraceError::NoCurrentThread)?;
                let mut meta = lock(&self.meta);
                match meta
                    .barrier_participants
                    .iter_mut()
                    .find(|(barrier, _)| *barrier == addr)
                {
                    Some((_, tids)) => {
                        tids.insert(tid);
                    }
                    None => meta
                        .barrier_participants
                        .push((addr, BTreeSet::from([tid]))),
                }
            }
            _ => {}
        }
        self.current_context()?.on_sync(op, addr)
    }

    pub fn on_cxt(&mut self, kind: CxtKind) -> Result<()> {
        let tcxt = self.current_context()?;
        match kind {
            CxtKind::Instr => tcxt.on_instr(),
        }
    }

    fn current_context(&mut self) -> Result<&mut ThreadContext> {
        let tid = self.current.ok_or(TraceError::NoCurrentThread)?;
        self.tcxts
            .get_mut(&tid)
            .ok_or(TraceError::NoCurrentThread)
    }

    /// Change the current logical thread. Creates the context on first
    /// sight, flushes the outgoing thread's active aggregators, and emits
    /// no event of its own.
    fn swap_thread(&mut self, new_tid: Tid) -> Result<()> {
        if self.current == Some(new_tid) {
            return Ok(());
        }

        if !self.tcxts.contains_key(&new_tid) {
            debug!(tid = new_tid, "creating thread context");
            let encoder = self
                .config
                .encoder
                .create(&self.config.output_dir, new_tid)?;
            let tcxt = ThreadContext::new(new_tid, self.config.prims_per_comp_ev, encoder)?;
            self.tcxts.insert(new_tid, tcxt);
            lock(&self.meta).threads_in_order.push(new_tid);
        }

        if let Some(prev) = self.current {
            if let Some(tcxt) = self.tcxts.get_mut(&prev) {
                tcxt.comp_flush_if_active()?;
                tcxt.comm_flush_if_active()?;
            }
        }

        self.current = Some(new_tid);
        Ok(())
    }

    /// Snapshot of the shared metadata (mainly for tests).
    pub fn metadata(&self) -> RunMetadata {
        let meta = lock(&self.meta);
        RunMetadata {
            threads_in_order: meta.threads_in_order.clone(),
            thread_spawns: meta.thread_spawns.clone(),
            barrier_participants: meta.barrier_participants.clone(),
        }
    }

    /// Flush and close every thread context, then write the run summaries
    /// (`sigil.pthread.out`, `sigil.stats.out`).
    pub fn finish(mut self) -> Result<()> {
        let meta = lock(&self.meta);
        let mut summaries: Vec<ThreadSummary> = Vec::with_capacity(meta.threads_in_order.len());
        let order = meta.threads_in_order.clone();
        drop(meta);

        for tid in &order {
            if let Some(tcxt) = self.tcxts.get_mut(tid) {
                tcxt.finish()?;
                summaries.push(tcxt.summary());
            }
        }

        let meta = lock(&self.meta);
        stats::write_pthread_file(
            &self.config.output_dir.join("sigil.pthread.out"),
            &meta.threads_in_order,
            &meta.thread_spawns,
            &meta.barrier_participants,
        )?;
        stats::write_stats_file(
            &self.config.output_dir.join("sigil.stats.out"),
            &summaries,
        )?;
        Ok(())
    }
}

// single-threaded in practice; recover the data if a test ever poisons it
fn lock(meta: &Mutex<RunMetadata>) -> std::sync::MutexGuard<'_, RunMetadata> {
    meta.lock().unwrap_or_else(|e| e.into_inner())
}
