//! Output encoder strategies
//!
//! An encoder owns one thread's output artifact for the lifetime of the run:
//! it opens the file at construction, receives every flushed event, and
//! closes the stream at shutdown. The strategy is chosen once per run and is
//! shared by all per-thread encoders.

mod binary;
mod null;
mod text;

use std::path::Path;

use clap::ValueEnum;

use crate::error::Result;
use crate::events::{CommEvent, CompEvent};
use crate::types::{Addr, Eid, Tid};

pub use binary::{BinCommEdge, BinEvent, BinRange, BinaryEncoder, EventStream, EVENTS_PER_STREAM};
pub use null::NullEncoder;
pub use text::TextEncoder;

/// Per-thread trace file stem, kept for compatibility with existing
/// SynchroTrace tooling.
pub const TRACE_FILE_PREFIX: &str = "sigil.events.out-";

/// Sink for flushed SynchroTrace events.
pub trait Encoder {
    fn emit_comp(&mut self, eid: Eid, tid: Tid, ev: &CompEvent) -> Result<()>;
    fn emit_comm(&mut self, eid: Eid, tid: Tid, ev: &CommEvent) -> Result<()>;
    fn emit_sync(&mut self, eid: Eid, tid: Tid, kind: u8, addr: Addr) -> Result<()>;
    fn emit_instr_marker(&mut self, count: u64) -> Result<()>;

    /// Flush buffered records and close the output stream. Idempotent;
    /// errors surface here rather than in drop.
    fn close(&mut self) -> Result<()>;
}

/// Trace encoding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum EncoderKind {
    /// One record per line, gzip-compressed
    Text,
    /// Length-delimited packed records, gzip-compressed
    #[value(alias = "capnp")]
    Binary,
    /// Discard all events (for profiling the frontend)
    Null,
}

impl EncoderKind {
    /// Open the output artifact for `tid` under `dir`.
    pub fn create(self, dir: &Path, tid: Tid) -> Result<Box<dyn Encoder>> {
        Ok(match self {
            EncoderKind::Text => Box::new(TextEncoder::new(dir, tid)?),
            EncoderKind::Binary => Box::new(BinaryEncoder::new(dir, tid)?),
            EncoderKind::Null => Box::new(NullEncoder),
        })
    }
}
