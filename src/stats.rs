//! Per-thread and per-barrier counters, plus the run summary artifacts

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::types::{Addr, Tid};

/// Primitive counts for one thread over the whole run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Stats {
    pub iops: u64,
    pub flops: u64,
    pub reads: u64,
    pub writes: u64,
    pub instrs: u64,
}

/// Work observed between two barrier waits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BarrierTally {
    pub iops: u64,
    pub flops: u64,
    pub instrs: u64,
    pub locks: u64,
    pub mem_accesses: u64,
}

impl BarrierTally {
    fn absorb(&mut self, other: &BarrierTally) {
        self.iops += other.iops;
        self.flops += other.flops;
        self.instrs += other.instrs;
        self.locks += other.locks;
        self.mem_accesses += other.mem_accesses;
    }
}

/// Attributes the work a thread performs between barriers to the barrier
/// that ends the interval. Tallies are kept per barrier address, in the
/// order each barrier was first hit.
#[derive(Debug, Default)]
pub struct BarrierStatsTracker {
    open: BarrierTally,
    tallies: Vec<(Addr, BarrierTally)>,
}

impl BarrierStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_iops(&mut self) {
        self.open.iops += 1;
    }

    pub fn inc_flops(&mut self) {
        self.open.flops += 1;
    }

    pub fn inc_instrs(&mut self) {
        self.open.instrs += 1;
    }

    pub fn inc_locks(&mut self) {
        self.open.locks += 1;
    }

    pub fn inc_mem_accesses(&mut self) {
        self.open.mem_accesses += 1;
    }

    /// Close the open interval, folding it into `barrier`'s tally.
    pub fn on_barrier(&mut self, barrier: Addr) {
        let open = std::mem::take(&mut self.open);
        match self.tallies.iter_mut().find(|(addr, _)| *addr == barrier) {
            Some((_, tally)) => tally.absorb(&open),
            None => self.tallies.push((barrier, open)),
        }
    }

    /// Per-barrier tallies in first-hit order.
    pub fn tallies(&self) -> &[(Addr, BarrierTally)] {
        &self.tallies
    }
}

/// Everything a finished thread contributes to `sigil.stats.out`.
#[derive(Debug)]
pub struct ThreadSummary {
    pub tid: Tid,
    pub stats: Stats,
    pub barriers: Vec<(Addr, BarrierTally)>,
}

/// Write `sigil.pthread.out`: spawned threads in first-seen order, spawner
/// and child-address pairs, and barrier participant lists with sorted tids.
pub fn write_pthread_file(
    path: &Path,
    threads_in_order: &[Tid],
    thread_spawns: &[(Tid, Addr)],
    barrier_participants: &[(Addr, BTreeSet<Tid>)],
) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    for tid in threads_in_order {
        writeln!(out, "thread:{tid}")?;
    }
    for (spawner, child) in thread_spawns {
        writeln!(out, "spawn:{spawner}^{child:016x}")?;
    }
    for (barrier, tids) in barrier_participants {
        let list = tids
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join(",");
        writeln!(out, "barrier:{barrier:016x}^{list}")?;
    }
    out.flush()
}

/// Write `sigil.stats.out`: one counter line per thread, then one line per
/// (thread, barrier) sub-tally.
pub fn write_stats_file(path: &Path, summaries: &[ThreadSummary]) -> std::io::Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "# thread,iops,flops,reads,writes,instrs")?;
    for s in summaries {
        writeln!(
            out,
            "{},{},{},{},{},{}",
            s.tid, s.stats.iops, s.stats.flops, s.stats.reads, s.stats.writes, s.stats.instrs
        )?;
    }
    writeln!(out, "# thread,barrier,iops,flops,instrs,locks,mem_accesses")?;
    for s in summaries {
        for (addr, tally) in &s.barriers {
            writeln!(
                out,
                "{},{:016x},{},{},{},{},{}",
                s.tid, addr, tally.iops, tally.flops, tally.instrs, tally.locks,
                tally.mem_accesses
            )?;
        }
    }
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barrier_tracker_attributes_open_interval() {
        let mut tracker = BarrierStatsTracker::new();
        tracker.inc_iops();
        tracker.inc_iops();
        tracker.inc_mem_accesses();
        tracker.on_barrier(0xB);

        assert_eq!(tracker.tallies().len(), 1);
        let (addr, tally) = tracker.tallies()[0];
        assert_eq!(addr, 0xB);
        assert_eq!(tally.iops, 2);
        assert_eq!(tally.mem_accesses, 1);
        assert_eq!(tally.locks, 0);
    }

    #[test]
    fn test_barrier_tracker_resets_between_intervals() {
        let mut tracker = BarrierStatsTracker::new();
        tracker.inc_flops();
        tracker.on_barrier(0xB);
        tracker.inc_locks();
        tracker.on_barrier(0xC);

        let tallies = tracker.tallies();
        assert_eq!(tallies[0].1.flops, 1);
        assert_eq!(tallies[0].1.locks, 0);
        assert_eq!(tallies[1].1.locks, 1);
        assert_eq!(tallies[1].1.flops, 0);
    }

    #[test]
    fn test_barrier_tracker_accumulates_repeat_barriers() {
        let mut tracker = BarrierStatsTracker::new();
        tracker.inc_instrs();
        tracker.on_barrier(0xB);
        tracker.inc_instrs();
        tracker.inc_instrs();
        tracker.on_barrier(0xB);

        assert_eq!(tracker.tallies().len(), 1);
        assert_eq!(tracker.tallies()[0].1.instrs, 3);
    }

    #[test]
    fn test_barrier_order_is_first_hit_order() {
        let mut tracker = BarrierStatsTracker::new();
        tracker.on_barrier(0xC);
        tracker.on_barrier(0xB);
        tracker.on_barrier(0xC);
        let addrs: Vec<_> = tracker.tallies().iter().map(|(a, _)| *a).collect();
        assert_eq!(addrs, vec![0xC, 0xB]);
    }

    #[test]
    fn test_pthread_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sigil.pthread.out");
        let barriers = vec![(0xBu64, BTreeSet::from([2u32, 1u32]))];
        write_pthread_file(&path, &[1, 2], &[(1, 0xA)], &barriers).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "thread:1",
                "thread:2",
                "spawn:1^000000000000000a",
                "barrier:000000000000000b^1,2",
            ]
        );
    }

    #[test]
    fn test_stats_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sigil.stats.out");
        let summaries = vec![ThreadSummary {
            tid: 1,
            stats: Stats {
                iops: 2,
                flops: 0,
                reads: 1,
                writes: 1,
                instrs: 5,
            },
            barriers: vec![(
                0xB,
                BarrierTally {
                    iops: 2,
                    flops: 0,
                    instrs: 5,
                    locks: 0,
                    mem_accesses: 2,
                },
            )],
        }];
        write_stats_file(&path, &summaries).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("1,2,0,1,1,5"));
        assert!(text.contains("1,000000000000000b,2,0,5,0,2"));
    }
}
