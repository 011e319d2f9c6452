use grpcwire_stream::{Echo, StreamConfig, StreamWorker};
use grpcwire_transport::{ReadSource, RecordingSink};

use crate::cmd::{frame_config, open_input, ReplayArgs};
use crate::exit::{stream_error, CliResult, SUCCESS};
use crate::output::{print_events, EventRow, OutputFormat};

pub fn run(args: ReplayArgs, format: OutputFormat) -> CliResult<i32> {
    let frame = frame_config(args.chunk_size, args.max_message_size)?;
    let source = ReadSource::with_chunk_size(open_input(&args.input)?, frame.read_chunk_size);
    let sink = RecordingSink::new();
    let config = StreamConfig::named("replay")
        .with_frame_config(frame)
        .with_header("x-grpcwire-replay", "echo");

    let worker = StreamWorker::spawn(source, sink.clone(), config, Echo)
        .map_err(|err| stream_error("failed to start worker", err))?;
    let outcome = worker.join().map_err(|err| stream_error("replay failed", err))?;

    let events: Vec<EventRow> = sink.events().iter().map(EventRow::from_event).collect();
    let status = outcome.status.to_string();
    print_events(
        &events,
        &status,
        outcome.received,
        outcome.sent,
        &sink.body(),
        format,
    );

    match outcome.error {
        Some(err) => Err(stream_error("replay failed", err)),
        None => Ok(SUCCESS),
    }
}
