//! Decoder for the `data: <json>` progress streams of generation and smart-build jobs.
//!
//! The backend writes one record per flush:
//!
//! ```text
//! data: {"progress": 25, "stage": "Generating audio...", "eta": 12}\n\n
//! data: {"progress": 100, "stage": "Done", "eta": 0, "done": true, "audio_url": "/api/audio/x.wav"}\n\n
//! ```
//!
//! [`StreamDecoder`] turns raw reads into [`StreamEvent`]s and [`EventStream`] pulls reads
//! from an HTTP body lazily, one suspension per read.

use std::collections::VecDeque;

use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{ConsoleError, Result};

const RECORD_SEPARATOR: &str = "\n\n";
const DATA_PREFIX: &str = "data: ";
const MALFORMED_RECORD: &str = "Malformed record in progress stream";
const TRUNCATED_STREAM: &str = "Progress stream ended before the job completed";

/// How record boundaries are found across reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// Each read is split on its own. A record straddling two reads is lost,
    /// which is safe only while the server flushes whole records per write.
    #[default]
    PerChunk,
    /// An unterminated trailing record is carried into the next read.
    Buffered,
}

impl Framing {
    pub fn from_buffering(buffer_partial_records: bool) -> Self {
        if buffer_partial_records {
            Self::Buffered
        } else {
            Self::PerChunk
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub percent: u8,
    pub stage: String,
    pub eta_seconds: Option<f64>,
}

impl Progress {
    /// Numeric estimate while one is known, a finishing label otherwise.
    pub fn eta_label(&self) -> String {
        match self.eta_seconds {
            Some(eta) if eta > 0.0 => format!("Estimated time: {eta}s"),
            _ => "Finishing...".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Progress(Progress),
    Error { message: String },
    Complete { result_ref: Option<String> },
}

/// Incremental text decoder and record splitter.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    framing: Framing,
    utf8_tail: Vec<u8>,
    pending: String,
}

impl StreamDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            ..Self::default()
        }
    }

    /// Decodes one read and returns the events of every record it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let text = self.decode_text(chunk);
        match self.framing {
            Framing::PerChunk => text.split(RECORD_SEPARATOR).filter_map(parse_record).collect(),
            Framing::Buffered => {
                self.pending.push_str(&text);
                let mut events = Vec::new();
                while let Some(idx) = self.pending.find(RECORD_SEPARATOR) {
                    let record: String = self.pending.drain(..idx + RECORD_SEPARATOR.len()).collect();
                    events.extend(parse_record(&record[..idx]));
                }
                events
            }
        }
    }

    /// End of data: flushes a final record that was never terminated.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if !self.utf8_tail.is_empty() {
            debug!(bytes = self.utf8_tail.len(), "Dropping incomplete UTF-8 sequence at end of stream");
            self.utf8_tail.clear();
        }
        let rest = std::mem::take(&mut self.pending);
        parse_record(&rest).into_iter().collect()
    }

    fn decode_text(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.utf8_tail);
        bytes.extend_from_slice(chunk);
        let invalid = std::str::from_utf8(&bytes).err();
        // A multi-byte sequence was cut by the read boundary.
        if let Some(err) = invalid.filter(|err| err.error_len().is_none()) {
            self.utf8_tail = bytes.split_off(err.valid_up_to());
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn parse_record(record: &str) -> Option<StreamEvent> {
    let payload = record.strip_prefix(DATA_PREFIX)?;
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            warn!(error = %err, "Malformed stream record");
            return Some(StreamEvent::Error {
                message: MALFORMED_RECORD.to_string(),
            });
        }
    };
    let Some(object) = value.as_object() else {
        warn!("Stream record is not a JSON object");
        return Some(StreamEvent::Error {
            message: MALFORMED_RECORD.to_string(),
        });
    };

    if let Some(message) = object.get("error").and_then(error_message) {
        return Some(StreamEvent::Error { message });
    }

    if object.get("done").and_then(Value::as_bool) == Some(true) {
        let result_ref = object
            .get("audio_url")
            .and_then(Value::as_str)
            .map(str::to_string);
        return Some(StreamEvent::Complete { result_ref });
    }

    if let Some(percent) = object.get("progress").and_then(Value::as_f64) {
        return Some(StreamEvent::Progress(Progress {
            percent: percent.round().clamp(0.0, 100.0) as u8,
            stage: object
                .get("stage")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            eta_seconds: object.get("eta").and_then(Value::as_f64),
        }));
    }

    debug!(record = payload, "Ignoring stream record without progress, error or done");
    None
}

fn error_message(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Bool(false) => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Lazy, finite, non-restartable sequence of events read from a response body.
pub struct EventStream {
    body: ByteStream,
    decoder: StreamDecoder,
    queued: VecDeque<StreamEvent>,
    finished: bool,
}

impl EventStream {
    pub fn new(body: ByteStream, framing: Framing) -> Self {
        Self {
            body,
            decoder: StreamDecoder::new(framing),
            queued: VecDeque::new(),
            finished: false,
        }
    }

    pub fn from_response(response: reqwest::Response, framing: Framing) -> Self {
        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(ConsoleError::from))
            .boxed();
        Self::new(body, framing)
    }

    /// Next event in arrival order. After an `Error` event, a transport failure or
    /// the end of data, every further call returns `None`.
    pub async fn next_event(&mut self) -> Option<Result<StreamEvent>> {
        loop {
            if let Some(event) = self.queued.pop_front() {
                if matches!(event, StreamEvent::Error { .. }) {
                    self.queued.clear();
                    self.finished = true;
                }
                return Some(Ok(event));
            }
            if self.finished {
                return None;
            }
            match self.body.next().await {
                Some(Ok(chunk)) => self.queued.extend(self.decoder.push(&chunk)),
                Some(Err(err)) => {
                    self.finished = true;
                    return Some(Err(err));
                }
                None => {
                    self.finished = true;
                    self.queued.extend(self.decoder.finish());
                }
            }
        }
    }

    /// Reads until `Complete` and returns its result reference. `on_progress` sees
    /// every progress event; the first `Error` event aborts with its message.
    pub async fn run_to_completion<F>(mut self, mut on_progress: F) -> Result<Option<String>>
    where
        F: FnMut(&Progress),
    {
        while let Some(event) = self.next_event().await {
            match event? {
                StreamEvent::Progress(progress) => on_progress(&progress),
                StreamEvent::Error { message } => return Err(ConsoleError::Stream(message)),
                StreamEvent::Complete { result_ref } => return Ok(result_ref),
            }
        }
        Err(ConsoleError::Stream(TRUNCATED_STREAM.to_string()))
    }
}
