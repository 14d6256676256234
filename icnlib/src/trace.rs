//! Request traces: one `time receiver content [log]` request per line
//!
//! Fields are whitespace separated. `log` is `1`/`0` or `true`/`false` and defaults to true. Blank
//! lines and lines starting with `#` are skipped

use std::io::BufRead;

use crate::error::SimulationError;
use crate::strategy::Event;

fn trace_error(line: usize, message: impl Into<String>) -> SimulationError {
    SimulationError::Trace {
        line,
        message: message.into(),
    }
}

/// Parses one line, numbered from 1. Returns `None` for lines carrying no request
pub fn parse_line(text: &str, line: usize) -> Result<Option<Event>, SimulationError> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }
    let fields: Vec<&str> = text.split_whitespace().collect();
    if !(3..=4).contains(&fields.len()) {
        return Err(trace_error(line, format!("expected 3 or 4 fields, found {}", fields.len())));
    }
    let time = fields[0]
        .parse::<f64>()
        .map_err(|e| trace_error(line, format!("invalid time '{}': {e}", fields[0])))?;
    if !time.is_finite() {
        return Err(trace_error(line, format!("invalid time '{}'", fields[0])));
    }
    let receiver = fields[1]
        .parse()
        .map_err(|e| trace_error(line, format!("invalid receiver '{}': {e}", fields[1])))?;
    let content = fields[2]
        .parse()
        .map_err(|e| trace_error(line, format!("invalid content '{}': {e}", fields[2])))?;
    let log = match fields.get(3).copied() {
        None | Some("1") | Some("true") => true,
        Some("0") | Some("false") => false,
        Some(other) => return Err(trace_error(line, format!("invalid log flag '{other}'"))),
    };
    Ok(Some(Event::new(time, receiver, content, log)))
}

/// Parses a whole trace held in memory
pub fn parse_trace(text: &str) -> Result<Vec<Event>, SimulationError> {
    text.lines()
        .enumerate()
        .filter_map(|(i, line)| parse_line(line, i + 1).transpose())
        .collect()
}

/// Streams the requests of a trace, one line at a time
pub struct TraceReader<R> {
    reader: R,
    line: usize,
    buffer: String,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buffer: String::new(),
        }
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<Event, SimulationError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.buffer.clear();
            match self.reader.read_line(&mut self.buffer) {
                Ok(0) => return None,
                Ok(_) => {
                    self.line += 1;
                    match parse_line(&self.buffer, self.line) {
                        Ok(None) => continue,
                        Ok(Some(event)) => return Some(Ok(event)),
                        Err(e) => return Some(Err(e)),
                    }
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}
