use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use grpcwire_frame::FrameConfig;

use crate::exit::{io_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod decode;
pub mod encode;
pub mod replay;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Frame payloads into a gRPC message stream.
    Encode(EncodeArgs),
    /// Reassemble and print messages from a framed byte stream.
    Decode(DecodeArgs),
    /// Serve a framed byte stream through an echo worker and print the response.
    Replay(ReplayArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Replay(args) => replay::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// String payload (repeatable, one message each).
    #[arg(long, value_name = "TEXT")]
    pub data: Vec<String>,
    /// Read a payload from file (repeatable, framed after every --data).
    #[arg(long, value_name = "PATH")]
    pub file: Vec<PathBuf>,
    /// Mark every message as compressed.
    #[arg(long)]
    pub compressed: bool,
    /// Write the framed stream here instead of stdout.
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Framed input file, or `-` for stdin.
    pub input: PathBuf,
    /// Bytes pulled from the input per read.
    #[arg(long, default_value = "8192")]
    pub chunk_size: usize,
    /// Largest accepted message, in bytes (0 disables the limit).
    #[arg(long, env = "GRPCWIRE_MAX_MESSAGE_SIZE", default_value = "4194304")]
    pub max_message_size: usize,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Framed input file, or `-` for stdin.
    pub input: PathBuf,
    /// Bytes pulled from the input per read.
    #[arg(long, default_value = "8192")]
    pub chunk_size: usize,
    /// Largest accepted message, in bytes (0 disables the limit).
    #[arg(long, env = "GRPCWIRE_MAX_MESSAGE_SIZE", default_value = "4194304")]
    pub max_message_size: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Open a file, or stdin for `-`.
pub fn open_input(path: &Path) -> CliResult<Box<dyn Read + Send>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path)
        .map_err(|err| io_error(&format!("failed opening {}", path.display()), err))?;
    Ok(Box::new(file))
}

/// Build the framing config from CLI limits.
pub fn frame_config(chunk_size: usize, max_message_size: usize) -> CliResult<FrameConfig> {
    if chunk_size == 0 {
        return Err(CliError::new(USAGE, "--chunk-size must be greater than zero"));
    }
    let base = if max_message_size == 0 {
        FrameConfig::unbounded()
    } else {
        FrameConfig::default().with_max_message_size(max_message_size)
    };
    Ok(FrameConfig {
        read_chunk_size: chunk_size,
        ..base
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_max_disables_limit() {
        let config = frame_config(16, 0).unwrap();
        assert_eq!(config.max_message_size, None);
        assert_eq!(config.read_chunk_size, 16);

        let config = frame_config(16, 100).unwrap();
        assert_eq!(config.max_message_size, Some(100));
    }

    #[test]
    fn zero_chunk_size_is_usage_error() {
        let err = frame_config(0, 100).unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
