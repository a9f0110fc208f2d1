//! CLI argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::dispatch::GenConfig;
use crate::encoder::EncoderKind;

#[derive(Parser, Debug)]
#[command(name = "stgen")]
#[command(version)]
#[command(about = "SynchroTrace event trace generator", long_about = None)]
pub struct Cli {
    /// Output directory for trace and summary files
    #[arg(short = 'o', value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Compression level: reads or writes folded into one compute event
    #[arg(short = 'c', value_name = "N", default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(1..=100))]
    pub compression: u32,

    /// Trace encoding strategy
    #[arg(short = 'l', value_enum, default_value = "text", value_name = "STRATEGY")]
    pub log_strategy: EncoderKind,
}

impl Cli {
    pub fn to_config(&self) -> GenConfig {
        GenConfig {
            output_dir: self.output_dir.clone(),
            prims_per_comp_ev: self.compression,
            encoder: self.log_strategy,
        }
    }
}
