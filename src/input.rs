//! Newline-delimited JSON input.
//!
//! Each line is one command. Most lines are events; a few keys turn a line
//! into a pipeline operation instead:
//!
//! ```text
//! {"type":"feedback.submit","data":{"rating":4},"rid":"r-1"}   emit
//! {"mark":"checkout"}                                          start a mark
//! {"markEnd":"checkout","type":"perf"}                         finish a mark
//! {"vital":"LCP","value":2100,"rating":"good"}                 observation
//! {"flush":true}                                               force a flush
//! ```
//!
//! Event lines use the collector's field names (`type`, `data`, `durMs`,
//! `rid`, `role`, `anonId`). Missing or odd fields are coerced the same way
//! `Pipeline::emit` coerces them; only lines that are not JSON objects are
//! rejected.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use beacon_adapters::{observe, ChannelSource, Observation, Rating};
use beacon_sdk::{EventDraft, Pipeline};
use serde_json::{Map, Value as Json};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One parsed input line.
#[derive(Debug, Clone)]
pub enum Command {
    Emit(EventDraft),
    Mark(String),
    MarkEnd {
        name: String,
        event_type: Option<String>,
    },
    Vital(Observation),
    Flush,
}

/// Parse a single line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let json: Json = serde_json::from_str(line)?;
    let Json::Object(obj) = json else {
        bail!("expected a JSON object");
    };

    if let Some(name) = str_field(&obj, "mark") {
        return Ok(Some(Command::Mark(name.to_string())));
    }
    if let Some(name) = str_field(&obj, "markEnd") {
        return Ok(Some(Command::MarkEnd {
            name: name.to_string(),
            event_type: str_field(&obj, "type").map(str::to_string),
        }));
    }
    if let Some(name) = str_field(&obj, "vital") {
        return parse_vital(name, &obj).map(|o| Some(Command::Vital(o)));
    }
    if obj.get("flush").and_then(Json::as_bool) == Some(true) {
        return Ok(Some(Command::Flush));
    }

    Ok(Some(Command::Emit(parse_event(&obj))))
}

fn str_field<'a>(obj: &'a Map<String, Json>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Json::as_str)
}

fn parse_event(obj: &Map<String, Json>) -> EventDraft {
    let event_type = match obj.get("type") {
        Some(Json::String(s)) => s.clone(),
        Some(Json::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };

    let mut draft = EventDraft::new(event_type);
    if let Some(data) = obj.get("data") {
        draft = draft.data_json(data);
    }
    if let Some(duration) = obj.get("durMs").and_then(Json::as_f64) {
        draft = draft.duration_ms(duration);
    }
    if let Some(rid) = str_field(obj, "rid") {
        draft = draft.correlation_id(rid);
    }
    if let Some(role) = str_field(obj, "role") {
        draft = draft.role(role);
    }
    if let Some(anon) = str_field(obj, "anonId") {
        draft = draft.anonymous_id(anon);
    }
    draft
}

fn parse_vital(name: &str, obj: &Map<String, Json>) -> Result<Observation> {
    let value = obj
        .get("value")
        .and_then(Json::as_f64)
        .ok_or_else(|| anyhow!("vital {name:?} has no numeric value"))?;

    match obj.get("rating") {
        Some(rating) => {
            let rating: Rating = serde_json::from_value(rating.clone())?;
            Ok(Observation::new(name, value, rating))
        }
        None => Observation::rated(name, value)
            .ok_or_else(|| anyhow!("vital {name:?} needs an explicit rating")),
    }
}

/// Commands read from an async byte stream by a background task.
///
/// # Example
///
/// ```
/// use std::io::Cursor;
/// use beacon::CommandStream;
///
/// # tokio_test::block_on(async {
/// let data = b"{\"type\":\"ping\"}\n";
/// let mut commands = CommandStream::spawn(Cursor::new(data.to_vec()), "example");
/// assert!(commands.next().await.is_some());
/// assert!(commands.next().await.is_none());
/// # });
/// ```
#[derive(Debug)]
pub struct CommandStream {
    receiver: mpsc::Receiver<Command>,
    description: String,
    rejected: Arc<AtomicU64>,
}

impl CommandStream {
    /// Spawn a task that reads newline-delimited commands from `reader`.
    ///
    /// Malformed lines are logged and counted, never fatal. The stream ends
    /// at EOF or on a read error.
    pub fn spawn<R>(reader: R, description: &str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(64);
        let rejected = Arc::new(AtomicU64::new(0));
        let rejected_handle = rejected.clone();
        let desc = description.to_string();

        tokio::spawn(async move {
            let mut reader = BufReader::new(reader);
            let mut line = String::new();
            let mut line_no = 0u64;

            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        tracing::debug!(source = %desc, lines = line_no, "input ended");
                        break;
                    }
                    Ok(_) => {
                        line_no += 1;
                        match parse_line(&line) {
                            Ok(Some(command)) => {
                                if tx.send(command).await.is_err() {
                                    break;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                rejected_handle.fetch_add(1, Ordering::Relaxed);
                                tracing::warn!(source = %desc, line = line_no, error = %e, "skipping input line");
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!(source = %desc, error = %e, "input read failed");
                        break;
                    }
                }
            }
        });

        Self {
            receiver: rx,
            description: format!("stream: {}", description),
            rejected,
        }
    }

    /// Next command, or `None` once the input is exhausted.
    pub async fn next(&mut self) -> Option<Command> {
        self.receiver.recv().await
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Lines skipped because they could not be parsed.
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}

/// Carries [`Command::Vital`] observations into a pipeline as `web_vital`
/// events.
#[derive(Debug)]
pub struct VitalsFeed {
    sender: mpsc::Sender<Observation>,
    task: Option<JoinHandle<()>>,
}

impl VitalsFeed {
    pub fn attach(pipeline: &Pipeline) -> Self {
        let (sender, source) = ChannelSource::create("input");
        let task = observe(pipeline, source);
        Self { sender, task }
    }

    pub async fn send(&self, observation: Observation) {
        if self.sender.send(observation).await.is_err() {
            tracing::debug!("observation source closed");
        }
    }

    /// Close the feed and wait until everything sent has been emitted.
    pub async fn close(self) {
        drop(self.sender);
        if let Some(task) = self.task {
            if let Err(e) = task.await {
                tracing::debug!(error = %e, "observation task failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_sdk::{Pipeline, Value};
    use std::io::Cursor;

    fn emit_one(line: &str) -> beacon_sdk::Event {
        let Some(Command::Emit(draft)) = parse_line(line).unwrap() else {
            panic!("expected an event line");
        };
        let pipeline = Pipeline::builder().build();
        pipeline.emit(draft);
        pipeline.queued_events().remove(0)
    }

    #[test]
    fn test_event_line_fields() {
        let event = emit_one(
            r#"{"type":"feedback.submit","data":{"rating":4,"note":"ok"},"durMs":12.5,"rid":"r-1","role":"admin","anonId":"abc"}"#,
        );
        assert_eq!(event.event_type, "feedback.submit");
        assert_eq!(event.get("rating"), Some(&Value::Int(4)));
        assert_eq!(event.get("note"), Some(&Value::from("ok")));
        assert_eq!(event.duration_ms, Some(12.5));
        assert_eq!(event.correlation_id.as_deref(), Some("r-1"));
        assert_eq!(event.role.as_deref(), Some("admin"));
        assert_eq!(event.anonymous_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_missing_type_is_coerced() {
        let event = emit_one(r#"{"data":{"k":"v"}}"#);
        assert_eq!(event.event_type, beacon_sdk::UNKNOWN_EVENT_TYPE);
    }

    #[test]
    fn test_denylisted_input_keys_are_stripped() {
        let event = emit_one(r#"{"type":"signup","data":{"email":"a@b.c","plan":"pro"}}"#);
        assert!(event.get("email").is_none());
        assert_eq!(event.get("plan"), Some(&Value::from("pro")));
    }

    #[test]
    fn test_operation_lines() {
        assert!(matches!(
            parse_line(r#"{"mark":"checkout"}"#).unwrap(),
            Some(Command::Mark(name)) if name == "checkout"
        ));
        assert!(matches!(
            parse_line(r#"{"markEnd":"checkout","type":"timing"}"#).unwrap(),
            Some(Command::MarkEnd { name, event_type: Some(t) }) if name == "checkout" && t == "timing"
        ));
        assert!(matches!(
            parse_line(r#"{"flush":true}"#).unwrap(),
            Some(Command::Flush)
        ));
    }

    #[test]
    fn test_vital_lines() {
        let Some(Command::Vital(explicit)) =
            parse_line(r#"{"vital":"CLS","value":0.3,"rating":"needs-improvement"}"#).unwrap()
        else {
            panic!("expected a vital");
        };
        assert_eq!(explicit.rating, Rating::NeedsImprovement);

        let Some(Command::Vital(derived)) =
            parse_line(r#"{"vital":"LCP","value":5000}"#).unwrap()
        else {
            panic!("expected a vital");
        };
        assert_eq!(derived.rating, Rating::Poor);

        assert!(parse_line(r#"{"vital":"custom","value":1}"#).is_err());
        assert!(parse_line(r#"{"vital":"LCP"}"#).is_err());
        assert!(parse_line(r#"{"vital":"LCP","value":1,"rating":"great"}"#).is_err());
    }

    #[test]
    fn test_blank_and_invalid_lines() {
        assert!(parse_line("   \n").unwrap().is_none());
        assert!(parse_line("not json").is_err());
        assert!(parse_line("[1,2]").is_err());
    }

    #[tokio::test]
    async fn test_stream_reads_until_eof() {
        let data = "{\"type\":\"a\"}\n\ngarbage\n{\"mark\":\"m\"}\n{\"type\":\"b\"}";
        let mut commands = CommandStream::spawn(Cursor::new(data), "test");

        let mut seen = Vec::new();
        while let Some(command) = commands.next().await {
            seen.push(command);
        }

        assert_eq!(seen.len(), 3);
        assert!(matches!(&seen[1], Command::Mark(name) if name == "m"));
        assert_eq!(commands.rejected(), 1);
        assert_eq!(commands.description(), "stream: test");
    }

    #[tokio::test]
    async fn test_closed_feed_has_emitted_every_vital() {
        let pipeline = Pipeline::builder().build();
        let feed = VitalsFeed::attach(&pipeline);

        for value in [1200.0, 2100.0, 5000.0] {
            feed.send(Observation::new("LCP", value, Rating::Good)).await;
        }
        feed.close().await;

        let events = pipeline.queued_events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[2].get("value"), Some(&Value::Float(5000.0)));
    }

    #[tokio::test]
    async fn test_stream_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type":"page.view"}}"#).unwrap();
        writeln!(file, r#"{{"flush":true}}"#).unwrap();

        let reader = tokio::fs::File::open(file.path()).await.unwrap();
        let mut commands = CommandStream::spawn(reader, "file");

        assert!(matches!(commands.next().await, Some(Command::Emit(_))));
        assert!(matches!(commands.next().await, Some(Command::Flush)));
        assert!(commands.next().await.is_none());
    }
}
