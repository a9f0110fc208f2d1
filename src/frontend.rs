//! Serialized primitive stream adapter
//!
//! Instrumentation frontends hand the generator one globally ordered stream
//! of primitives. This adapter reads the line-oriented form of that stream:
//!
//! ```text
//! l <addr> <size>     load
//! s <addr> <size>     store
//! i                   integer op
//! f                   floating-point op
//! y <code> <id>       sync primitive (code 0 = thread swap, 1..=10 encodable)
//! x                   instruction boundary
//! ```
//!
//! Addresses and sync ids are hex (`0x` prefix optional), sizes and sync
//! codes decimal. Blank lines and lines starting with `#` are skipped.

use std::io::BufRead;

use crate::dispatch::Generator;
use crate::error::{Result, TraceError};
use crate::types::{CompKind, CxtKind, MemKind, Primitive, SyncOp};

/// Parse one line. `Ok(None)` for blanks and comments.
pub fn parse_line(line: &str) -> Result<Option<Primitive>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut tokens = line.split_whitespace();
    let tag = tokens.next().unwrap_or_default();
    let prim = match tag {
        "l" | "s" => {
            let addr = hex_field(tokens.next(), "address")?;
            let size = dec_field(tokens.next(), "size")?;
            Primitive::Mem {
                kind: if tag == "l" {
                    MemKind::Load
                } else {
                    MemKind::Store
                },
                addr,
                size,
            }
        }
        "i" => Primitive::Comp(CompKind::Iop),
        "f" => Primitive::Comp(CompKind::Flop),
        "y" => {
            let code = dec_field(tokens.next(), "sync code")?;
            let code = u32::try_from(code).unwrap_or(u32::MAX);
            let addr = hex_field(tokens.next(), "sync id")?;
            Primitive::Sync {
                op: SyncOp::from_code(code)?,
                addr,
            }
        }
        "x" => Primitive::Cxt(CxtKind::Instr),
        other => return Err(bad(format!("unknown primitive tag {other:?}"))),
    };

    if tokens.next().is_some() {
        return Err(bad(format!("trailing tokens after {tag:?} record")));
    }
    Ok(Some(prim))
}

/// Feed every primitive in `input` to the generator.
pub fn run_stream<R: BufRead>(generator: &mut Generator, input: R) -> Result<()> {
    for (idx, line) in input.lines().enumerate() {
        let line = line?;
        let parsed = parse_line(&line).map_err(|e| at_line(e, idx + 1))?;
        if let Some(prim) = parsed {
            generator.on_primitive(prim)?;
        }
    }
    Ok(())
}

fn hex_field(token: Option<&str>, what: &str) -> Result<u64> {
    let token = token.ok_or_else(|| bad(format!("missing {what}")))?;
    let digits = token.strip_prefix("0x").unwrap_or(token);
    u64::from_str_radix(digits, 16).map_err(|e| bad(format!("bad {what} {token:?}: {e}")))
}

fn dec_field(token: Option<&str>, what: &str) -> Result<u64> {
    let token = token.ok_or_else(|| bad(format!("missing {what}")))?;
    token
        .parse()
        .map_err(|e| bad(format!("bad {what} {token:?}: {e}")))
}

fn bad(msg: String) -> TraceError {
    TraceError::BadRecord { line: 0, msg }
}

fn at_line(err: TraceError, line: usize) -> TraceError {
    match err {
        TraceError::BadRecord { msg, .. } => TraceError::BadRecord { line, msg },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_memory_primitives() {
        assert_eq!(
            parse_line("l 1000 4").unwrap(),
            Some(Primitive::Mem {
                kind: MemKind::Load,
                addr: 0x1000,
                size: 4
            })
        );
        assert_eq!(
            parse_line("s 0x2000 1").unwrap(),
            Some(Primitive::Mem {
                kind: MemKind::Store,
                addr: 0x2000,
                size: 1
            })
        );
    }

    #[test]
    fn test_parse_compute_and_instr() {
        assert_eq!(
            parse_line("i").unwrap(),
            Some(Primitive::Comp(CompKind::Iop))
        );
        assert_eq!(
            parse_line("f").unwrap(),
            Some(Primitive::Comp(CompKind::Flop))
        );
        assert_eq!(
            parse_line("x").unwrap(),
            Some(Primitive::Cxt(CxtKind::Instr))
        );
    }

    #[test]
    fn test_parse_sync_primitives() {
        assert_eq!(
            parse_line("y 0 2").unwrap(),
            Some(Primitive::Sync {
                op: SyncOp::Swap,
                addr: 2
            })
        );
        assert_eq!(
            parse_line("y 5 b").unwrap(),
            Some(Primitive::Sync {
                op: SyncOp::BarrierWait,
                addr: 0xB
            })
        );
    }

    #[test]
    fn test_blank_lines_and_comments_skipped() {
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# swap to thread 1").unwrap(), None);
    }

    #[test]
    fn test_unknown_tag_is_bad_record() {
        assert!(matches!(
            parse_line("q 1 2"),
            Err(TraceError::BadRecord { .. })
        ));
    }

    #[test]
    fn test_missing_field_is_bad_record() {
        assert!(matches!(
            parse_line("l 1000"),
            Err(TraceError::BadRecord { .. })
        ));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(matches!(
            parse_line("i 7"),
            Err(TraceError::BadRecord { .. })
        ));
    }

    #[test]
    fn test_unknown_sync_code_is_fatal() {
        assert!(matches!(
            parse_line("y 12 0"),
            Err(TraceError::BadSyncCode { code: 12 })
        ));
    }

    #[test]
    fn test_run_stream_reports_line_numbers() {
        use crate::dispatch::{GenConfig, Generator};
        use crate::encoder::EncoderKind;

        let dir = tempfile::tempdir().unwrap();
        let mut generator = Generator::new(GenConfig {
            output_dir: dir.path().to_path_buf(),
            prims_per_comp_ev: 100,
            encoder: EncoderKind::Null,
        });

        let input = "y 0 1\ni\nbogus\n";
        let err = run_stream(&mut generator, input.as_bytes()).unwrap_err();
        match err {
            TraceError::BadRecord { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
