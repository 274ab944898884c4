// Slow-query log reassembly
use crate::error::{AdvisorError, AdvisorResult};
use crate::types::QueryRecord;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::BufRead;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, instrument, warn};

/// Prefix of the first line of every log entry
pub const RECORD_START_MARKER: &str = "# Time: ";

const USER_HOST_MARKER: &str = "# User@Host:";
const TIMING_MARKER: &str = "# Query_time:";
const COMMENT_MARKER: char = '#';

static TIME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^# Time:\s+(\S+)").expect("valid time pattern"));

// `user[qualifier] @ host [ip]`, every part after the user name optional
static USER_HOST_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^# User@Host:\s*([^\[@\s]+)\s*(?:\[[^\]]*\])?\s*(?:@\s*([^\[\s]*)\s*(?:\[[^\]]*\])?)?")
        .expect("valid user/host pattern")
});

static TIMING_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^# Query_time:\s*(\d+(?:\.\d+)?)\s+Lock_time:\s*(\d+(?:\.\d+)?)\s+Rows_sent:\s*(\d+)\s+Rows_examined:\s*(\d+)",
    )
    .expect("valid timing pattern")
});

static USE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^use\s+`?([^`;\s]+)`?\s*;").expect("valid use pattern"));

/// Parse result containing the reassembled records and the tolerated format problems
#[derive(Debug, Default)]
pub struct ParseResult {
    pub records: Vec<QueryRecord>,
    /// Header lines that carried a marker but did not match their pattern
    pub format_errors: Vec<AdvisorError>,
    pub lines_read: usize,
    /// Entries opened by a `# Time:` line
    pub entries_seen: usize,
    /// Entries dropped because they had no SQL body
    pub entries_without_query: usize,
    /// Parsing stopped early on request
    pub cancelled: bool,
}

/// Lines of one log entry, kept with their 1-based line numbers
#[derive(Debug, Default)]
struct EntryBuffer {
    lines: Vec<(usize, String)>,
}

#[derive(Debug)]
enum ParserState {
    Idle,
    InRecord(EntryBuffer),
}

/// Single-pass state machine turning log lines into records
#[derive(Debug)]
struct RecordAssembler {
    state: ParserState,
    result: ParseResult,
}

impl RecordAssembler {
    fn new() -> Self {
        Self {
            state: ParserState::Idle,
            result: ParseResult::default(),
        }
    }

    fn starts_record(line: &str) -> bool {
        line.trim().starts_with(RECORD_START_MARKER.trim_end())
    }

    fn feed(&mut self, line: String) {
        self.result.lines_read += 1;
        let line_number = self.result.lines_read;

        if Self::starts_record(&line) {
            self.flush();
            self.result.entries_seen += 1;
            let mut buffer = EntryBuffer::default();
            buffer.lines.push((line_number, line));
            self.state = ParserState::InRecord(buffer);
            return;
        }

        match &mut self.state {
            ParserState::InRecord(buffer) => buffer.lines.push((line_number, line)),
            ParserState::Idle => debug!("Ignoring line {} outside of any entry", line_number),
        }
    }

    fn flush(&mut self) {
        if let ParserState::InRecord(buffer) = std::mem::replace(&mut self.state, ParserState::Idle) {
            let (record, errors) = finalize_entry(&buffer);
            for error in &errors {
                warn!("{}", error);
            }
            self.result.format_errors.extend(errors);
            match record {
                Some(record) => self.result.records.push(record),
                None => self.result.entries_without_query += 1,
            }
        }
    }

    fn finish(mut self) -> ParseResult {
        self.flush();
        self.result
    }
}

/// Build the record of one entry; `None` when the entry has no SQL body
fn finalize_entry(buffer: &EntryBuffer) -> (Option<QueryRecord>, Vec<AdvisorError>) {
    let mut errors = Vec::new();
    let mut timestamp = None;
    let mut user = None;
    let mut host = None;
    let mut timing = None;
    let mut schema = None;
    let mut body: Vec<&str> = Vec::new();

    for (line_number, raw_line) in &buffer.lines {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with(RECORD_START_MARKER.trim_end()) {
            match TIME_PATTERN.captures(line) {
                Some(caps) => timestamp = Some(caps[1].to_string()),
                None => errors.push(AdvisorError::log_format(*line_number, "time header without a value")),
            }
        } else if line.starts_with(USER_HOST_MARKER) {
            match parse_user_host(line) {
                Some((parsed_user, parsed_host)) => {
                    user = Some(parsed_user);
                    host = parsed_host;
                }
                None => errors.push(AdvisorError::log_format(*line_number, "malformed User@Host header")),
            }
        } else if line.starts_with(TIMING_MARKER) {
            match parse_timing(line) {
                Some(parsed) => timing = Some(parsed),
                None => errors.push(AdvisorError::log_format(*line_number, "malformed Query_time header")),
            }
        } else if is_use_line(line) {
            match USE_PATTERN.captures(line) {
                Some(caps) => schema = Some(caps[1].trim().to_string()),
                None => errors.push(AdvisorError::log_format(*line_number, "malformed use statement")),
            }
        } else if line.starts_with(COMMENT_MARKER) {
            // Other server annotations (Thread_id, Bytes_sent, ...)
            continue;
        } else {
            body.push(line);
        }
    }

    let query_text = body.join(" ").trim().to_string();
    if query_text.is_empty() {
        return (None, errors);
    }

    let (query_time, lock_time, rows_sent, rows_examined) = match timing {
        Some(t) => (Some(t.query_time), Some(t.lock_time), Some(t.rows_sent), Some(t.rows_examined)),
        None => (None, None, None, None),
    };

    let record = QueryRecord {
        timestamp,
        user,
        host,
        query_time,
        lock_time,
        rows_sent,
        rows_examined,
        schema,
        query_text,
    };
    (Some(record), errors)
}

fn is_use_line(line: &str) -> bool {
    line.get(..4).map(|head| head.eq_ignore_ascii_case("use ")).unwrap_or(false)
}

/// User name and optional host; bracketed qualifiers are ignored
fn parse_user_host(line: &str) -> Option<(String, Option<String>)> {
    let caps = USER_HOST_PATTERN.captures(line)?;
    let user = caps.get(1)?.as_str().trim().to_string();
    let host = caps
        .get(2)
        .map(|m| m.as_str().trim())
        .filter(|h| !h.is_empty())
        .map(str::to_string);
    Some((user, host))
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct TimingHeader {
    query_time: f64,
    lock_time: f64,
    rows_sent: u64,
    rows_examined: u64,
}

fn parse_timing(line: &str) -> Option<TimingHeader> {
    let caps = TIMING_PATTERN.captures(line)?;
    Some(TimingHeader {
        query_time: caps[1].parse().ok()?,
        lock_time: caps[2].parse().ok()?,
        rows_sent: caps[3].parse().ok()?,
        rows_examined: caps[4].parse().ok()?,
    })
}

/// Parser for MySQL slow-query logs
#[derive(Debug, Clone, Default)]
pub struct SlowLogParser;

impl SlowLogParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse log text held in memory
    pub fn parse_str(&self, text: &str) -> ParseResult {
        self.parse_bytes(text.as_bytes())
    }

    /// Parse raw bytes; undecodable sequences are replaced, never rejected
    pub fn parse_bytes(&self, bytes: &[u8]) -> ParseResult {
        let mut assembler = RecordAssembler::new();
        let mut lines = bytes.split(|b| *b == b'\n').peekable();
        while let Some(line) = lines.next() {
            // A trailing newline leaves one empty slice behind
            if line.is_empty() && lines.peek().is_none() {
                break;
            }
            assembler.feed(String::from_utf8_lossy(line).into_owned());
        }
        assembler.finish()
    }

    /// Parse from any buffered reader
    pub fn parse_reader<R: BufRead>(&self, reader: R) -> AdvisorResult<ParseResult> {
        self.parse_reader_until(reader, &AtomicBool::new(false))
    }

    /// Parse from a reader, stopping before the next entry once `stop` is set.
    ///
    /// The flag is only consulted at entry boundaries, so an entry is never cut in half.
    pub fn parse_reader_until<R: BufRead>(&self, mut reader: R, stop: &AtomicBool) -> AdvisorResult<ParseResult> {
        let mut assembler = RecordAssembler::new();
        let mut raw = Vec::new();

        loop {
            raw.clear();
            let read = reader.read_until(b'\n', &mut raw)?;
            if read == 0 {
                break;
            }
            if raw.ends_with(b"\n") {
                raw.pop();
            }
            let line = String::from_utf8_lossy(&raw).into_owned();

            if RecordAssembler::starts_record(&line) && stop.load(Ordering::Relaxed) {
                info!("Log parsing cancelled after {} entries", assembler.result.entries_seen);
                let mut result = assembler.finish();
                result.cancelled = true;
                return Ok(result);
            }
            assembler.feed(line);
        }

        Ok(assembler.finish())
    }

    /// Read and parse a log file; a missing or unreadable file is the only fatal case
    #[instrument(skip_all)]
    pub async fn parse_file(&self, path: impl AsRef<Path>) -> AdvisorResult<ParseResult> {
        let path = path.as_ref();
        let shown = path.display().to_string();

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| AdvisorError::file_access(&shown, e.to_string()))?;
        if !metadata.is_file() {
            return Err(AdvisorError::file_access(&shown, "not a regular file"));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AdvisorError::file_access(&shown, e.to_string()))?;
        info!("Reading slow-query log: {} ({} bytes)", shown, bytes.len());

        let result = self.parse_bytes(&bytes);
        info!(
            "Extracted {} queries from {} entries ({} format issues)",
            result.records.len(),
            result.entries_seen,
            result.format_errors.len()
        );
        Ok(result)
    }
}
