//! Core primitive and identifier types shared across the generator

use crate::error::{Result, TraceError};

/// Logical thread identity. Positive, assigned by the frontend.
pub type Tid = u32;

/// Per-thread event id. Starts at 1 and increments by one per emitted
/// compute, communication, or synchronization event.
pub type Eid = u32;

/// Byte address in the traced program's address space.
pub type Addr = u64;

/// Highest thread id the shadow memory reader bitsets can represent.
pub const MAX_TID: Tid = 128;

/// A closed byte-address interval, `first <= last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AddrRange {
    pub first: Addr,
    pub last: Addr,
}

impl AddrRange {
    pub fn new(first: Addr, last: Addr) -> Self {
        debug_assert!(first <= last);
        Self { first, last }
    }
}

/// Direction of a memory access primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemKind {
    Load,
    Store,
}

/// Cost class of a compute primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompKind {
    Iop,
    Flop,
}

/// Context markers delivered by the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CxtKind {
    Instr,
}

/// Synchronization primitives.
///
/// `Swap` is a control primitive marking a change of the frontend's logical
/// thread of execution. It is consumed by the dispatcher and never encoded
/// into the trace; the other kinds carry the canonical SynchroTrace numeric
/// codes used by downstream replay tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOp {
    Swap,
    MutexLock,
    MutexUnlock,
    Create,
    Join,
    BarrierWait,
    CondWait,
    CondSignal,
    CondBroadcast,
    SpinLock,
    SpinUnlock,
}

impl SyncOp {
    /// Translate a frontend sync code. Code 0 is the thread-swap control
    /// value; 1..=10 are the encodable kinds. Anything else (semaphore codes
    /// included) is rejected.
    pub fn from_code(code: u32) -> Result<Self> {
        match code {
            0 => Ok(SyncOp::Swap),
            1 => Ok(SyncOp::MutexLock),
            2 => Ok(SyncOp::MutexUnlock),
            3 => Ok(SyncOp::Create),
            4 => Ok(SyncOp::Join),
            5 => Ok(SyncOp::BarrierWait),
            6 => Ok(SyncOp::CondWait),
            7 => Ok(SyncOp::CondSignal),
            8 => Ok(SyncOp::CondBroadcast),
            9 => Ok(SyncOp::SpinLock),
            10 => Ok(SyncOp::SpinUnlock),
            _ => Err(TraceError::BadSyncCode { code }),
        }
    }

    /// Canonical numeric encoding, `None` for the swap control value.
    pub fn code(self) -> Option<u8> {
        match self {
            SyncOp::Swap => None,
            SyncOp::MutexLock => Some(1),
            SyncOp::MutexUnlock => Some(2),
            SyncOp::Create => Some(3),
            SyncOp::Join => Some(4),
            SyncOp::BarrierWait => Some(5),
            SyncOp::CondWait => Some(6),
            SyncOp::CondSignal => Some(7),
            SyncOp::CondBroadcast => Some(8),
            SyncOp::SpinLock => Some(9),
            SyncOp::SpinUnlock => Some(10),
        }
    }
}

/// One frontend-observed execution primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Primitive {
    Mem { kind: MemKind, addr: Addr, size: u64 },
    Comp(CompKind),
    Sync { op: SyncOp, addr: Addr },
    Cxt(CxtKind),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_codes_round_trip() {
        for code in 1..=10u32 {
            let op = SyncOp::from_code(code).unwrap();
            assert_eq!(op.code(), Some(code as u8));
        }
    }

    #[test]
    fn test_swap_has_no_encoding() {
        assert_eq!(SyncOp::from_code(0).unwrap(), SyncOp::Swap);
        assert_eq!(SyncOp::Swap.code(), None);
    }

    #[test]
    fn test_semaphore_codes_rejected() {
        for code in 11..=15u32 {
            assert!(matches!(
                SyncOp::from_code(code),
                Err(TraceError::BadSyncCode { .. })
            ));
        }
    }

    #[test]
    fn test_addr_range_ordering() {
        let a = AddrRange::new(1, 5);
        let b = AddrRange::new(1, 9);
        let c = AddrRange::new(2, 3);
        assert!(a < b);
        assert!(b < c);
    }
}
