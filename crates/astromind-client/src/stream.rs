//! Streaming multi-month forecasts.
//!
//! The backend answers `/interpret-stream` with newline-delimited
//! `data: <json>` frames. [`SseDecoder`] turns raw chunks into
//! [`StreamEvent`]s, and [`ForecastAccumulator`] keeps the ordered months
//! plus the charts from the `start` event.

use futures::{Stream, StreamExt};
use serde::{Deserialize, Deserializer};
use std::collections::VecDeque;
use std::fmt::Display;

use astromind_chart::{Aspect, ChartResult, MonthlyResult};

use crate::api::{ApiError, ReportBackend};
use crate::request::InterpretRequest;

/// Drawn between consecutive months of the accumulated interpretation
pub const MONTH_SEPARATOR: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

const DEFAULT_STREAM_ERROR: &str = "Грешка при генериране на прогноза";
const READ_ERROR: &str = "Грешка при четене на данните";

/// Month labels arrive as strings or bare numbers.
fn label<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

/// One decoded frame of the forecast stream
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Start {
        #[serde(default)]
        natal_chart: Option<ChartResult>,
        #[serde(default)]
        partner_chart: Option<ChartResult>,
        #[serde(default)]
        transit_chart: Option<ChartResult>,
        #[serde(default)]
        natal_aspects: Option<Vec<Aspect>>,
        #[serde(default)]
        partner_natal_aspects: Option<Vec<Aspect>>,
        #[serde(default)]
        total_months: Option<u32>,
    },
    MonthStart {
        #[serde(default, deserialize_with = "label")]
        month: String,
    },
    MonthComplete {
        #[serde(default, deserialize_with = "label")]
        month: String,
        #[serde(default)]
        text: String,
    },
    Complete,
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

/// Incremental `data:` line decoder
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes of a UTF-8 sequence split across chunks
    pending: Vec<u8>,
    /// Text after the last complete line
    buffer: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns the events of every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.pending.extend_from_slice(chunk);
        let mut consumed = 0;
        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(text) => {
                    self.buffer.push_str(text);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_end = consumed + e.valid_up_to();
                    self.buffer
                        .push_str(&String::from_utf8_lossy(&self.pending[consumed..valid_end]));
                    match e.error_len() {
                        Some(len) => {
                            self.buffer.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid_end + len;
                        }
                        // Incomplete trailing sequence: keep it for the next chunk
                        None => {
                            consumed = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.pending.drain(..consumed);

        let mut events = Vec::new();
        while let Some(pos) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=pos).collect();
            if let Some(event) = parse_line(&line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush a final line that was not newline-terminated.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if !self.pending.is_empty() {
            let tail = std::mem::take(&mut self.pending);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line).into_iter().collect()
    }
}

fn parse_line(line: &str) -> Option<StreamEvent> {
    let line = line.trim_end_matches(['\n', '\r']);
    let json = line.strip_prefix("data: ")?;
    if json.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(json) {
        Ok(event) => Some(event),
        Err(e) => {
            log::warn!("Error parsing SSE data: {} ({})", e, json);
            None
        }
    }
}

struct SseState<S> {
    body: S,
    decoder: SseDecoder,
    ready: VecDeque<StreamEvent>,
    finished: bool,
}

/// Decode a byte stream into forecast events, in arrival order.
pub fn decode_sse<S, B, E>(body: S) -> impl Stream<Item = Result<StreamEvent, ApiError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send,
    E: Display + Send,
{
    let state = SseState {
        body,
        decoder: SseDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(event) = st.ready.pop_front() {
                return Some((Ok(event), st));
            }
            if st.finished {
                return None;
            }
            match st.body.next().await {
                Some(Ok(chunk)) => {
                    let events = st.decoder.push(chunk.as_ref());
                    st.ready.extend(events);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    return Some((Err(ApiError::Stream(e.to_string())), st));
                }
                None => {
                    st.finished = true;
                    let events = st.decoder.finish();
                    st.ready.extend(events);
                }
            }
        }
    })
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ForecastState {
    #[default]
    Pending,
    Running,
    Complete,
    Failed(String),
}

/// Ordered per-month results of one forecast run
#[derive(Debug, Clone, Default)]
pub struct ForecastAccumulator {
    pub natal_chart: Option<ChartResult>,
    pub partner_chart: Option<ChartResult>,
    pub transit_chart: Option<ChartResult>,
    pub natal_aspects: Option<Vec<Aspect>>,
    pub partner_natal_aspects: Option<Vec<Aspect>>,
    total_months: Option<u32>,
    months: Vec<MonthlyResult>,
    progress: Option<String>,
    state: ForecastState,
}

impl ForecastAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn months(&self) -> &[MonthlyResult] {
        &self.months
    }

    pub fn total_months(&self) -> Option<u32> {
        self.total_months
    }

    /// Progress line for the UI, cleared once the forecast completes
    pub fn progress(&self) -> Option<&str> {
        self.progress.as_deref()
    }

    pub fn state(&self) -> &ForecastState {
        &self.state
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, ForecastState::Complete | ForecastState::Failed(_))
    }

    /// Apply the next event. Events after a terminal one are ignored.
    pub fn apply(&mut self, event: StreamEvent) {
        if self.is_finished() {
            log::debug!("ignoring event after end of forecast: {:?}", event);
            return;
        }

        match event {
            StreamEvent::Start {
                natal_chart,
                partner_chart,
                transit_chart,
                natal_aspects,
                partner_natal_aspects,
                total_months,
            } => {
                self.natal_chart = natal_chart;
                self.partner_chart = partner_chart;
                self.transit_chart = transit_chart;
                self.natal_aspects = natal_aspects;
                self.partner_natal_aspects = partner_natal_aspects;
                self.total_months = total_months;
                self.months.clear();
                self.state = ForecastState::Running;
                self.progress = Some(match total_months {
                    Some(n) => format!("Започва генериране на прогноза за {} месеца...", n),
                    None => "Започва генериране на прогноза...".to_string(),
                });
            }
            StreamEvent::MonthStart { month } => {
                self.state = ForecastState::Running;
                self.progress = Some(format!(
                    "Генериране на подробен месечен анализ за месец {}",
                    month
                ));
            }
            StreamEvent::MonthComplete { month, text } => {
                self.state = ForecastState::Running;
                self.months.push(MonthlyResult { month, text });
            }
            StreamEvent::Complete => {
                self.progress = None;
                self.state = ForecastState::Complete;
            }
            StreamEvent::Error { message } => {
                let message = message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_STREAM_ERROR.to_string());
                log::error!("forecast stream reported an error: {}", message);
                self.progress = None;
                self.state = ForecastState::Failed(message);
            }
        }
    }

    /// Mark a transport failure; months received so far are kept.
    pub fn fail(&mut self, message: impl Into<String>) {
        if !self.is_finished() {
            self.progress = None;
            self.state = ForecastState::Failed(message.into());
        }
    }

    /// The stream ended. Without an error it counts as complete.
    pub fn end_of_stream(&mut self) {
        if !self.is_finished() {
            log::warn!("forecast stream closed without a complete event");
            self.progress = None;
            self.state = ForecastState::Complete;
        }
    }

    /// Accumulated months as one markdown document.
    pub fn render_interpretation(&self) -> String {
        render_months(&self.months)
    }
}

/// `## 📅 {month}` sections, separated by a rule line after the first.
pub fn render_months(months: &[MonthlyResult]) -> String {
    months
        .iter()
        .enumerate()
        .map(|(idx, m)| {
            let separator = if idx > 0 {
                format!("\n\n{}\n\n", MONTH_SEPARATOR)
            } else {
                String::new()
            };
            format!("{}## 📅 {}\n\n{}", separator, m.month, m.text)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Drive one forecast stream to its end, reporting every applied event.
///
/// Only the initial request can fail; stream errors end up in the
/// accumulator's state with the months received so far.
pub async fn run_forecast<B, F>(
    backend: &B,
    request: &InterpretRequest,
    mut on_update: F,
) -> Result<ForecastAccumulator, ApiError>
where
    B: ReportBackend + ?Sized,
    F: FnMut(&ForecastAccumulator),
{
    let mut events = backend.interpret_stream(request).await?;
    let mut forecast = ForecastAccumulator::new();

    while let Some(event) = events.next().await {
        match event {
            Ok(event) => forecast.apply(event),
            Err(e) => {
                log::error!("Stream reading error: {}", e);
                forecast.fail(READ_ERROR);
            }
        }
        on_update(&forecast);
        if forecast.is_finished() {
            break;
        }
    }

    if !forecast.is_finished() {
        forecast.end_of_stream();
        on_update(&forecast);
    }
    Ok(forecast)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(month: &str, text: &str) -> MonthlyResult {
        MonthlyResult {
            month: month.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_decoder_keeps_partial_lines() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: {\"type\": \"month_st").is_empty());
        let events = decoder.push(b"art\", \"month\": \"2025-01\"}\n\ndata: {\"type\":\"complete\"}\n");
        assert_eq!(
            events,
            vec![
                StreamEvent::MonthStart {
                    month: "2025-01".to_string()
                },
                StreamEvent::Complete
            ]
        );
    }

    #[test]
    fn test_decoder_handles_split_utf8() {
        let frame = "data: {\"type\":\"month_complete\",\"month\":\"Януари\",\"text\":\"Текст\"}\n";
        let bytes = frame.as_bytes();
        // Split inside the two-byte "Я"
        let split = frame.find('Я').unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&bytes[..split]).is_empty());
        let events = decoder.push(&bytes[split..]);
        assert_eq!(
            events,
            vec![StreamEvent::MonthComplete {
                month: "Януари".to_string(),
                text: "Текст".to_string()
            }]
        );
    }

    #[test]
    fn test_decoder_keeps_split_char_after_invalid_byte() {
        let mut decoder = SseDecoder::new();
        let mut first = b"data: {\"type\":\"month_start\",\"month\":\"".to_vec();
        first.push(0xFF);
        first.extend_from_slice(&"Ж".as_bytes()[..1]);
        assert!(decoder.push(&first).is_empty());

        let mut second = "Ж".as_bytes()[1..].to_vec();
        second.extend_from_slice(b"\"}\n");
        assert_eq!(
            decoder.push(&second),
            vec![StreamEvent::MonthStart {
                month: "\u{FFFD}Ж".to_string()
            }]
        );
    }

    #[test]
    fn test_decoder_skips_noise_and_bad_json() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b": keepalive\nevent: x\ndata: \ndata: {not json}\ndata: {\"type\":\"bogus\"}\r\n");
        assert!(events.is_empty());
        let events = decoder.push(b"data: {\"type\":\"error\",\"message\":\"boom\"}");
        assert!(events.is_empty());
        assert_eq!(
            decoder.finish(),
            vec![StreamEvent::Error {
                message: Some("boom".to_string())
            }]
        );
    }

    #[test]
    fn test_numeric_month_label() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"type":"month_complete","month":3,"text":"t"}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::MonthComplete {
                month: "3".to_string(),
                text: "t".to_string()
            }
        );
    }

    #[test]
    fn test_render_months() {
        assert_eq!(render_months(&[]), "");
        assert_eq!(render_months(&[month("Януари", "А")]), "## 📅 Януари\n\nА");
        let rendered = render_months(&[month("Януари", "А"), month("Февруари", "Б")]);
        assert_eq!(
            rendered,
            format!(
                "## 📅 Януари\n\nА\n\n\n\n{}\n\n## 📅 Февруари\n\nБ",
                MONTH_SEPARATOR
            )
        );
    }

    #[test]
    fn test_accumulator_lifecycle() {
        let mut forecast = ForecastAccumulator::new();
        forecast.apply(StreamEvent::Start {
            natal_chart: Some(ChartResult::default()),
            partner_chart: None,
            transit_chart: None,
            natal_aspects: Some(vec![]),
            partner_natal_aspects: None,
            total_months: Some(2),
        });
        assert_eq!(forecast.state(), &ForecastState::Running);
        assert_eq!(
            forecast.progress(),
            Some("Започва генериране на прогноза за 2 месеца...")
        );
        assert!(forecast.natal_chart.is_some());

        forecast.apply(StreamEvent::MonthComplete {
            month: "Януари".to_string(),
            text: "А".to_string(),
        });
        forecast.apply(StreamEvent::Error { message: None });
        assert_eq!(
            forecast.state(),
            &ForecastState::Failed("Грешка при генериране на прогноза".to_string())
        );

        // Terminal: later months are dropped
        forecast.apply(StreamEvent::MonthComplete {
            month: "Февруари".to_string(),
            text: "Б".to_string(),
        });
        assert_eq!(forecast.months().len(), 1);
    }
}
