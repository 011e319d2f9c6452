mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "grpcwire", version, about = "gRPC message framing CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        env = "GRPCWIRE_LOG_LEVEL",
        default_value = "warn",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    #[test]
    fn parses_repeated_encode_payloads() {
        let cli = Cli::try_parse_from([
            "grpcwire", "encode", "--data", "one", "--data", "two", "--file", "three.bin",
            "--compressed",
        ])
        .expect("encode args should parse");

        match cli.command {
            Command::Encode(args) => {
                assert_eq!(args.data, ["one", "two"]);
                assert_eq!(args.file.len(), 1);
                assert!(args.compressed);
                assert!(args.output.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_decode_with_limits() {
        let cli = Cli::try_parse_from([
            "grpcwire",
            "--format",
            "json",
            "decode",
            "-",
            "--chunk-size",
            "3",
            "--max-message-size",
            "10",
        ])
        .expect("decode args should parse");

        assert_eq!(cli.format, Some(OutputFormat::Json));
        match cli.command {
            Command::Decode(args) => {
                assert_eq!(args.input, Path::new("-"));
                assert_eq!(args.chunk_size, 3);
                assert_eq!(args.max_message_size, 10);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["grpcwire", "replay", "in.bin", "--log-level", "debug"])
            .expect("replay args should parse");
        assert_eq!(cli.log_level, LogLevel::Debug);
        assert!(matches!(cli.command, Command::Replay(_)));
    }

    #[test]
    fn rejects_unknown_format() {
        let err = Cli::try_parse_from(["grpcwire", "--format", "xml", "version"])
            .expect_err("unknown format should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::InvalidValue);
    }
}
