//! Error taxonomy for trace generation

use thiserror::Error;

use crate::types::{Addr, Tid};

/// Errors raised while generating a trace.
///
/// Only `AddressOutOfRange` is recoverable: the load path demotes it to a
/// local compute read and the store path drops the shadow update. Everything
/// else terminates the run.
#[derive(Error, Debug)]
pub enum TraceError {
    /// Access beyond the shadowed address space (strict mode only).
    #[error("address {addr:#x} is outside the shadowed address space")]
    AddressOutOfRange { addr: Addr },

    /// A thread's event counter wrapped. Fatal, the trace is unusable.
    #[error("event id overflow in thread {tid}")]
    EidOverflow { tid: Tid },

    /// The frontend delivered a sync primitive with an unknown code.
    #[error("unknown sync code {code} from frontend")]
    BadSyncCode { code: u32 },

    /// Thread ids must be in 1..=128 to fit the shadow reader bitsets.
    #[error("thread id {tid} is outside the supported range 1..=128")]
    InvalidTid { tid: u64 },

    /// A memory, compute, or context primitive arrived before any thread
    /// swap established a current thread.
    #[error("primitive received before any thread swap")]
    NoCurrentThread,

    /// A malformed line in the serialized primitive stream.
    #[error("malformed primitive record at line {line}: {msg}")]
    BadRecord { line: usize, msg: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for trace generation operations.
pub type Result<T> = std::result::Result<T, TraceError>;
