//! Discarding encoder, used to measure frontend overhead in isolation

use super::Encoder;
use crate::error::Result;
use crate::events::{CommEvent, CompEvent};
use crate::types::{Addr, Eid, Tid};

pub struct NullEncoder;

impl Encoder for NullEncoder {
    fn emit_comp(&mut self, _eid: Eid, _tid: Tid, _ev: &CompEvent) -> Result<()> {
        Ok(())
    }

    fn emit_comm(&mut self, _eid: Eid, _tid: Tid, _ev: &CommEvent) -> Result<()> {
        Ok(())
    }

    fn emit_sync(&mut self, _eid: Eid, _tid: Tid, _kind: u8, _addr: Addr) -> Result<()> {
        Ok(())
    }

    fn emit_instr_marker(&mut self, _count: u64) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}
