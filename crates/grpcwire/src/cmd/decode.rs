use grpcwire_frame::MessageReader;

use crate::cmd::{frame_config, open_input, DecodeArgs};
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::output::{print_messages, MessageRow, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = frame_config(args.chunk_size, args.max_message_size)?;
    let input = open_input(&args.input)?;
    let mut reader = MessageReader::from_reader(input, config);

    let mut rows = Vec::new();
    let failure = loop {
        match reader.next_message() {
            Ok(Some(frame)) => rows.push(MessageRow::new(rows.len(), &frame)),
            Ok(None) => break None,
            Err(err) => break Some(err),
        }
    };
    tracing::debug!(
        messages = rows.len(),
        pulls = reader.pulls(),
        "input decoded"
    );

    let message = failure.as_ref().map(ToString::to_string);
    print_messages(&rows, message.as_deref(), format);

    match failure {
        Some(err) => Err(frame_error("decode failed", err)),
        None => Ok(SUCCESS),
    }
}
