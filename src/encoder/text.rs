//! Line-oriented text encoder
//!
//! The established SynchroTrace text format: one record per line, fields
//! separated by `,`, address ranges introduced by `$` (writes), `*` (reads),
//! and `#` (communication edges), instruction markers by `!`. Addresses are
//! lowercase hex, zero-padded to the pointer width, without a prefix. The
//! stream is gzip-compressed.

use std::fmt::Write as _;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use super::{Encoder, TRACE_FILE_PREFIX};
use crate::error::Result;
use crate::events::{CommEvent, CompEvent};
use crate::types::{Addr, Eid, Tid};

pub struct TextEncoder {
    out: Option<GzEncoder<BufWriter<File>>>,
    line: String,
}

impl TextEncoder {
    pub fn new(dir: &Path, tid: Tid) -> Result<Self> {
        let path = dir.join(format!("{TRACE_FILE_PREFIX}{tid}.gz"));
        let file = File::create(path)?;
        Ok(Self {
            out: Some(GzEncoder::new(BufWriter::new(file), Compression::default())),
            line: String::new(),
        })
    }

    fn write_line(&mut self) -> Result<()> {
        self.line.push('\n');
        if let Some(out) = self.out.as_mut() {
            out.write_all(self.line.as_bytes())?;
        }
        self.line.clear();
        Ok(())
    }
}

impl Encoder for TextEncoder {
    fn emit_comp(&mut self, eid: Eid, tid: Tid, ev: &CompEvent) -> Result<()> {
        let _ = write!(
            self.line,
            "{eid},{tid},{},{},{},{}",
            ev.iops, ev.flops, ev.reads, ev.writes
        );
        for r in ev.write_ranges().iter() {
            let _ = write!(self.line, " $ {:016x} {:016x}", r.first, r.last);
        }
        for r in ev.read_ranges().iter() {
            let _ = write!(self.line, " * {:016x} {:016x}", r.first, r.last);
        }
        self.write_line()
    }

    fn emit_comm(&mut self, eid: Eid, tid: Tid, ev: &CommEvent) -> Result<()> {
        let _ = write!(self.line, "{eid},{tid}");
        for edge in ev.edges() {
            for r in edge.ranges.iter() {
                let _ = write!(
                    self.line,
                    " # {} {} {:016x} {:016x}",
                    edge.producer_tid, edge.producer_eid, r.first, r.last
                );
            }
        }
        self.write_line()
    }

    fn emit_sync(&mut self, eid: Eid, tid: Tid, kind: u8, addr: Addr) -> Result<()> {
        let _ = write!(self.line, "{eid},{tid},pth_ty:{kind}^{addr:016x}");
        self.write_line()
    }

    fn emit_instr_marker(&mut self, count: u64) -> Result<()> {
        let _ = write!(self.line, "! {count:016x} ");
        self.write_line()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(out) = self.out.take() {
            out.finish()?.flush()?;
        }
        Ok(())
    }
}

impl Drop for TextEncoder {
    fn drop(&mut self) {
        // backstop for abnormal teardown; normal shutdown calls close()
        let _ = self.close();
    }
}
