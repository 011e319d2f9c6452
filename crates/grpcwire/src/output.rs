use std::io::{IsTerminal, Write};

use bytes::Bytes;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use grpcwire_frame::{decode_frame, status_from_trailers, Frame};
use grpcwire_transport::{Metadata, SinkEvent};
use serde::Serialize;

const PREVIEW_LIMIT: usize = 64;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// One reassembled message.
#[derive(Serialize, Debug)]
pub struct MessageRow {
    pub index: usize,
    pub flag: u8,
    pub compressed: bool,
    pub size: usize,
    pub payload: String,
    #[serde(skip)]
    raw: Bytes,
}

impl MessageRow {
    pub fn new(index: usize, frame: &Frame) -> Self {
        Self {
            index,
            flag: frame.flag,
            compressed: frame.is_compressed(),
            size: frame.payload.len(),
            payload: payload_preview(&frame.payload),
            raw: frame.payload.clone(),
        }
    }
}

#[derive(Serialize)]
struct DecodeOutput<'a> {
    count: usize,
    complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    messages: &'a [MessageRow],
}

/// Print decoded messages. `error` is the failure that stopped decoding.
pub fn print_messages(rows: &[MessageRow], error: Option<&str>, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = DecodeOutput {
                count: rows.len(),
                complete: error.is_none(),
                error,
                messages: rows,
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["#", "FLAG", "SIZE", "PAYLOAD"]);
            for row in rows {
                table.add_row(vec![
                    row.index.to_string(),
                    flag_name(row.flag).to_string(),
                    row.size.to_string(),
                    row.payload.clone(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for row in rows {
                println!(
                    "message={} flag={} size={} payload={}",
                    row.index,
                    flag_name(row.flag),
                    row.size,
                    row.payload
                );
            }
            match error {
                Some(err) => println!("incomplete after {} message(s): {err}", rows.len()),
                None => println!("{} message(s)", rows.len()),
            }
        }
        OutputFormat::Raw => {
            for row in rows {
                print_raw(&row.raw);
            }
        }
    }
}

/// One outbound call observed during a replay.
#[derive(Serialize, Debug, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventRow {
    Headers {
        status: u16,
        headers: Vec<(String, String)>,
    },
    Message {
        flag: u8,
        size: usize,
        payload: String,
    },
    Trailers {
        status: u32,
        message: String,
        trailers: Vec<(String, String)>,
    },
}

impl EventRow {
    pub fn from_event(event: &SinkEvent) -> Self {
        match event {
            SinkEvent::Open { status, headers } => EventRow::Headers {
                status: *status,
                headers: pairs(headers),
            },
            SinkEvent::Data(bytes) => match decode_frame(bytes, None) {
                Ok(Some(frame)) => EventRow::Message {
                    flag: frame.flag,
                    size: frame.payload.len(),
                    payload: payload_preview(frame.payload),
                },
                _ => EventRow::Message {
                    flag: 0,
                    size: bytes.len(),
                    payload: format!("<unframed {} bytes>", bytes.len()),
                },
            },
            SinkEvent::Close { trailers } => {
                let (status, message) = status_from_trailers(trailers);
                EventRow::Trailers {
                    status: status.code(),
                    message,
                    trailers: pairs(trailers),
                }
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            EventRow::Headers { .. } => "HEADERS",
            EventRow::Message { .. } => "MESSAGE",
            EventRow::Trailers { .. } => "TRAILERS",
        }
    }

    fn detail(&self) -> String {
        match self {
            EventRow::Headers { status, headers } => format!("{status} {}", join(headers)),
            EventRow::Message {
                flag,
                size,
                payload,
            } => format!("flag={} size={size} payload={payload}", flag_name(*flag)),
            EventRow::Trailers { trailers, .. } => join(trailers),
        }
    }
}

#[derive(Serialize)]
struct ReplayOutput<'a> {
    status: &'a str,
    received: usize,
    sent: usize,
    events: &'a [EventRow],
}

/// Print the outbound sequence of a replayed stream.
pub fn print_events(
    events: &[EventRow],
    status: &str,
    received: usize,
    sent: usize,
    body: &[u8],
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => print_json(&ReplayOutput {
            status,
            received,
            sent,
            events,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["#", "EVENT", "DETAIL"]);
            for (seq, event) in events.iter().enumerate() {
                table.add_row(vec![seq.to_string(), event.kind().to_string(), event.detail()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for event in events {
                println!("{:<8} {}", event.kind(), event.detail());
            }
            println!("status={status} received={received} sent={sent}");
        }
        OutputFormat::Raw => print_raw(body),
    }
}

#[derive(Serialize)]
struct EncodeOutput<'a> {
    messages: usize,
    bytes: usize,
    output: &'a str,
}

pub fn print_encode_summary(messages: usize, bytes: usize, output: &str, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EncodeOutput {
            messages,
            bytes,
            output,
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["MESSAGES", "BYTES", "OUTPUT"]);
            table.add_row(vec![messages.to_string(), bytes.to_string(), output.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            println!("wrote {messages} message(s), {bytes} bytes to {output}");
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

pub fn flag_name(flag: u8) -> &'static str {
    if flag == 0 {
        "plain"
    } else {
        "compressed"
    }
}

fn pairs(metadata: &Metadata) -> Vec<(String, String)> {
    metadata
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

fn join(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if text.len() <= PREVIEW_LIMIT => text.to_string(),
        Ok(text) => {
            let mut end = PREVIEW_LIMIT;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... ({} bytes)", &text[..end], payload.len())
        }
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}
