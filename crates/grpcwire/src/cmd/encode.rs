use std::fs;
use std::io::Write;

use bytes::BytesMut;
use grpcwire_frame::{encode_frame, FLAG_COMPRESSED, FLAG_UNCOMPRESSED};

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_encode_summary, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let payloads = resolve_payloads(&args)?;
    if payloads.is_empty() {
        return Err(CliError::new(USAGE, "nothing to encode: pass --data or --file"));
    }

    let flag = if args.compressed {
        FLAG_COMPRESSED
    } else {
        FLAG_UNCOMPRESSED
    };
    let mut buf = BytesMut::new();
    for payload in &payloads {
        encode_frame(flag, payload, &mut buf).map_err(|err| frame_error("encode failed", err))?;
    }
    tracing::debug!(messages = payloads.len(), bytes = buf.len(), "stream encoded");

    match &args.output {
        Some(path) => {
            fs::write(path, &buf)
                .map_err(|err| io_error(&format!("failed writing {}", path.display()), err))?;
            let output = path.display().to_string();
            print_encode_summary(payloads.len(), buf.len(), &output, format);
        }
        None => {
            let mut out = std::io::stdout().lock();
            out.write_all(&buf)
                .and_then(|()| out.flush())
                .map_err(|err| io_error("failed writing stdout", err))?;
        }
    }

    Ok(SUCCESS)
}

fn resolve_payloads(args: &EncodeArgs) -> CliResult<Vec<Vec<u8>>> {
    let mut payloads: Vec<Vec<u8>> = args.data.iter().map(|d| d.as_bytes().to_vec()).collect();
    for path in &args.file {
        let payload = fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?;
        payloads.push(payload);
    }
    Ok(payloads)
}
