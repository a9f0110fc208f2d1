//! Event aggregators
//!
//! Trace runs produce billions of primitives, so events are aggregated in
//! place and reset after every flush instead of being allocated per event.
//! One compute and one communication aggregator live in each thread context;
//! at most one of them is active at any instant. Synchronization events carry
//! no state and are emitted immediately by the encoder.

use crate::addr_range::AddrRangeSet;
use crate::types::{Addr, AddrRange, Eid, Tid};

/// Aggregates a run of compute and thread-local memory primitives.
#[derive(Debug, Default)]
pub struct CompEvent {
    pub iops: u64,
    pub flops: u64,
    pub reads: u64,
    pub writes: u64,
    read_ranges: AddrRangeSet,
    write_ranges: AddrRangeSet,
    active: bool,
}

impl CompEvent {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_iop(&mut self) {
        self.active = true;
        self.iops += 1;
    }

    pub fn inc_flop(&mut self) {
        self.active = true;
        self.flops += 1;
    }

    pub fn inc_read(&mut self) {
        self.active = true;
        self.reads += 1;
    }

    pub fn inc_write(&mut self) {
        self.active = true;
        self.writes += 1;
    }

    pub fn record_read_range(&mut self, begin: Addr, size: u64) {
        debug_assert!(size > 0);
        self.read_ranges.insert(AddrRange::new(begin, begin + size - 1));
    }

    pub fn record_write_range(&mut self, begin: Addr, size: u64) {
        debug_assert!(size > 0);
        self.write_ranges.insert(AddrRange::new(begin, begin + size - 1));
    }

    pub fn read_ranges(&self) -> &AddrRangeSet {
        &self.read_ranges
    }

    pub fn write_ranges(&self) -> &AddrRangeSet {
        &self.write_ranges
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn reset(&mut self) {
        self.iops = 0;
        self.flops = 0;
        self.reads = 0;
        self.writes = 0;
        self.read_ranges.clear();
        self.write_ranges.clear();
        self.active = false;
    }
}

/// One producer to consumer edge: the writer thread, the writer's event id
/// at the time of the store, and the bytes this consumer read from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommEdge {
    pub producer_tid: Tid,
    pub producer_eid: Eid,
    pub ranges: AddrRangeSet,
}

/// Aggregates the communication edges of one outgoing event.
#[derive(Debug, Default)]
pub struct CommEvent {
    edges: Vec<CommEdge>,
    active: bool,
}

impl CommEvent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `addr` was read from the store `(producer_tid,
    /// producer_eid)`. Edges per event are few, so a linear probe for an
    /// existing edge is fine.
    pub fn add_edge(&mut self, producer_tid: Tid, producer_eid: Eid, addr: Addr) {
        self.active = true;
        for edge in &mut self.edges {
            if edge.producer_tid == producer_tid && edge.producer_eid == producer_eid {
                edge.ranges.insert(AddrRange::new(addr, addr));
                return;
            }
        }
        let mut ranges = AddrRangeSet::new();
        ranges.insert(AddrRange::new(addr, addr));
        self.edges.push(CommEdge {
            producer_tid,
            producer_eid,
            ranges,
        });
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> &[CommEdge] {
        &self.edges
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn reset(&mut self) {
        self.edges.clear();
        self.active = false;
    }
}

/// Emits a checkpoint marker every `INTERVAL` observed instructions.
/// Markers are pseudo-events and consume no event id.
#[derive(Debug, Default)]
pub struct InstrMarker {
    seen: u64,
}

impl InstrMarker {
    pub const INTERVAL: u64 = 1 << 12;

    pub fn new() -> Self {
        Self::default()
    }

    /// Count one instruction; returns the marker payload when one is due.
    pub fn record(&mut self) -> Option<u64> {
        self.seen += 1;
        (self.seen & (Self::INTERVAL - 1) == 0).then_some(Self::INTERVAL)
    }

    pub fn seen(&self) -> u64 {
        self.seen
    }
}
