//! Packed binary encoder
//!
//! Serializes events into length-delimited `EventStream` batches: records
//! accumulate until the batch cap, then the batch is bincode-encoded, length
//! prefixed (u32 little-endian), and appended to the gzip stream. Readers
//! decode frame by frame; a short final frame simply holds fewer events.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use super::{Encoder, TRACE_FILE_PREFIX};
use crate::error::Result;
use crate::events::{CommEvent, CompEvent};
use crate::types::{Addr, Eid, Tid};

/// Events batched per stream frame.
pub const EVENTS_PER_STREAM: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinRange {
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinCommEdge {
    pub producer_thread: Tid,
    pub producer_event: Eid,
    pub addrs: Vec<BinRange>,
}

/// One packed trace record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinEvent {
    Comp {
        iops: u64,
        flops: u64,
        reads: u64,
        writes: u64,
        write_addrs: Vec<BinRange>,
        read_addrs: Vec<BinRange>,
    },
    Comm {
        edges: Vec<BinCommEdge>,
    },
    Sync {
        kind: u8,
        id: Addr,
    },
    Marker {
        count: u64,
    },
}

/// Root message of one length-delimited frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EventStream {
    pub events: Vec<BinEvent>,
}

pub struct BinaryEncoder {
    out: Option<GzEncoder<BufWriter<File>>>,
    pending: Vec<BinEvent>,
}

impl BinaryEncoder {
    pub fn new(dir: &Path, tid: Tid) -> Result<Self> {
        let path = dir.join(format!("{TRACE_FILE_PREFIX}{tid}.bin.gz"));
        let file = File::create(path)?;
        Ok(Self {
            out: Some(GzEncoder::new(BufWriter::new(file), Compression::default())),
            pending: Vec::with_capacity(EVENTS_PER_STREAM),
        })
    }

    fn push(&mut self, event: BinEvent) -> Result<()> {
        self.pending.push(event);
        if self.pending.len() == EVENTS_PER_STREAM {
            self.flush_stream()?;
        }
        Ok(())
    }

    fn flush_stream(&mut self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let stream = EventStream {
            events: std::mem::take(&mut self.pending),
        };
        let bytes = bincode::serialize(&stream)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        if let Some(out) = self.out.as_mut() {
            out.write_all(&(bytes.len() as u32).to_le_bytes())?;
            out.write_all(&bytes)?;
        }
        Ok(())
    }

    fn ranges(set: &crate::addr_range::AddrRangeSet) -> Vec<BinRange> {
        set.iter()
            .map(|r| BinRange {
                start: r.first,
                end: r.last,
            })
            .collect()
    }
}

impl Encoder for BinaryEncoder {
    fn emit_comp(&mut self, _eid: Eid, _tid: Tid, ev: &CompEvent) -> Result<()> {
        self.push(BinEvent::Comp {
            iops: ev.iops,
            flops: ev.flops,
            reads: ev.reads,
            writes: ev.writes,
            write_addrs: Self::ranges(ev.write_ranges()),
            read_addrs: Self::ranges(ev.read_ranges()),
        })
    }

    fn emit_comm(&mut self, _eid: Eid, _tid: Tid, ev: &CommEvent) -> Result<()> {
        self.push(BinEvent::Comm {
            edges: ev
                .edges()
                .iter()
                .map(|edge| BinCommEdge {
                    producer_thread: edge.producer_tid,
                    producer_event: edge.producer_eid,
                    addrs: Self::ranges(&edge.ranges),
                })
                .collect(),
        })
    }

    fn emit_sync(&mut self, _eid: Eid, _tid: Tid, kind: u8, addr: Addr) -> Result<()> {
        self.push(BinEvent::Sync { kind, id: addr })
    }

    fn emit_instr_marker(&mut self, count: u64) -> Result<()> {
        self.push(BinEvent::Marker { count })
    }

    fn close(&mut self) -> Result<()> {
        self.flush_stream()?;
        if let Some(out) = self.out.take() {
            out.finish()?.flush()?;
        }
        Ok(())
    }
}

impl Drop for BinaryEncoder {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use super::*;

    fn read_frames(dir: &Path, tid: Tid) -> Vec<EventStream> {
        let path = dir.join(format!("{TRACE_FILE_PREFIX}{tid}.bin.gz"));
        let mut bytes = Vec::new();
        GzDecoder::new(File::open(path).unwrap())
            .read_to_end(&mut bytes)
            .unwrap();

        let mut frames = Vec::new();
        let mut at = 0;
        while at < bytes.len() {
            let len = u32::from_le_bytes(bytes[at..at + 4].try_into().unwrap()) as usize;
            at += 4;
            frames.push(bincode::deserialize(&bytes[at..at + len]).unwrap());
            at += len;
        }
        frames
    }

    #[test]
    fn test_comp_read_ranges_come_from_read_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut enc = BinaryEncoder::new(dir.path(), 1).unwrap();

        let mut ev = CompEvent::new();
        ev.inc_write();
        ev.inc_read();
        ev.record_write_range(0x1000, 4);
        ev.record_read_range(0x2000, 2);
        enc.emit_comp(1, 1, &ev).unwrap();
        enc.close().unwrap();

        let frames = read_frames(dir.path(), 1);
        assert_eq!(frames.len(), 1);
        match &frames[0].events[0] {
            BinEvent::Comp {
                write_addrs,
                read_addrs,
                ..
            } => {
                assert_eq!(
                    write_addrs,
                    &vec![BinRange {
                        start: 0x1000,
                        end: 0x1003
                    }]
                );
                assert_eq!(
                    read_addrs,
                    &vec![BinRange {
                        start: 0x2000,
                        end: 0x2001
                    }]
                );
            }
            other => panic!("expected comp event, got {other:?}"),
        }
    }

    #[test]
    fn test_events_batch_into_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut enc = BinaryEncoder::new(dir.path(), 1).unwrap();

        for _ in 0..(EVENTS_PER_STREAM + 5) {
            enc.emit_sync(1, 1, 1, 0x10).unwrap();
        }
        enc.close().unwrap();

        let frames = read_frames(dir.path(), 1);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].events.len(), EVENTS_PER_STREAM);
        assert_eq!(frames[1].events.len(), 5);
    }

    #[test]
    fn test_comm_edges_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut enc = BinaryEncoder::new(dir.path(), 2).unwrap();

        let mut ev = CommEvent::new();
        ev.add_edge(1, 3, 0x4004);
        ev.add_edge(1, 3, 0x4005);
        enc.emit_comm(1, 2, &ev).unwrap();
        enc.close().unwrap();

        let frames = read_frames(dir.path(), 2);
        match &frames[0].events[0] {
            BinEvent::Comm { edges } => {
                assert_eq!(edges.len(), 1);
                assert_eq!(edges[0].producer_thread, 1);
                assert_eq!(edges[0].producer_event, 3);
                assert_eq!(
                    edges[0].addrs,
                    vec![BinRange {
                        start: 0x4004,
                        end: 0x4005
                    }]
                );
            }
            other => panic!("expected comm event, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_run_produces_no_frames() {
        let dir = tempfile::tempdir().unwrap();
        let mut enc = BinaryEncoder::new(dir.path(), 1).unwrap();
        enc.close().unwrap();
        assert!(read_frames(dir.path(), 1).is_empty());
    }

    #[test]
    fn test_sync_and_marker_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut enc = BinaryEncoder::new(dir.path(), 1).unwrap();
        enc.emit_sync(1, 1, 5, 0xB).unwrap();
        enc.emit_instr_marker(4096).unwrap();
        enc.close().unwrap();

        let frames = read_frames(dir.path(), 1);
        assert_eq!(
            frames[0].events,
            vec![
                BinEvent::Sync { kind: 5, id: 0xB },
                BinEvent::Marker { count: 4096 }
            ]
        );
    }
}
