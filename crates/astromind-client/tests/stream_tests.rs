mod common;

use futures::StreamExt;

use astromind_client::{
    decode_sse, run_forecast, ApiError, ForecastState, InterpretRequest, StreamEvent,
};
use common::{chart, FakeBackend};

fn month(month: &str, text: &str) -> Result<StreamEvent, ApiError> {
    Ok(StreamEvent::MonthComplete {
        month: month.to_string(),
        text: text.to_string(),
    })
}

fn start(total: u32) -> Result<StreamEvent, ApiError> {
    Ok(StreamEvent::Start {
        natal_chart: Some(chart()),
        partner_chart: None,
        transit_chart: None,
        natal_aspects: Some(Vec::new()),
        partner_natal_aspects: None,
        total_months: Some(total),
    })
}

fn request() -> InterpretRequest {
    InterpretRequest::new("1990-05-17", "14:30", 42.6977, 23.3219)
}

#[tokio::test]
async fn test_months_accumulate_in_arrival_order() {
    let backend = FakeBackend::with_events(vec![
        start(3),
        Ok(StreamEvent::MonthStart {
            month: "Януари".to_string(),
        }),
        month("Януари", "a"),
        month("Февруари", "b"),
        month("Март", "c"),
        Ok(StreamEvent::Complete),
        // Anything after the terminal event is ignored
        month("Април", "d"),
    ]);

    let mut seen = Vec::new();
    let forecast = run_forecast(&backend, &request(), |f| seen.push(f.months().len()))
        .await
        .unwrap();

    let labels: Vec<&str> = forecast.months().iter().map(|m| m.month.as_str()).collect();
    assert_eq!(labels, ["Януари", "Февруари", "Март"]);
    assert_eq!(*forecast.state(), ForecastState::Complete);
    assert_eq!(forecast.total_months(), Some(3));
    assert_eq!(forecast.natal_chart, Some(chart()));
    assert_eq!(forecast.progress(), None);
    assert_eq!(seen, [0, 0, 1, 2, 3, 3]);

    let text = forecast.render_interpretation();
    let jan = text.find("## 📅 Януари").unwrap();
    let feb = text.find("## 📅 Февруари").unwrap();
    let mar = text.find("## 📅 Март").unwrap();
    assert!(jan < feb && feb < mar);
}

#[tokio::test]
async fn test_error_event_keeps_received_months() {
    let backend = FakeBackend::with_events(vec![
        start(2),
        month("Януари", "a"),
        Ok(StreamEvent::Error { message: None }),
    ]);

    let forecast = run_forecast(&backend, &request(), |_| {}).await.unwrap();

    assert_eq!(
        *forecast.state(),
        ForecastState::Failed("Грешка при генериране на прогноза".to_string())
    );
    assert_eq!(forecast.months().len(), 1);
}

#[tokio::test]
async fn test_transport_error_mid_stream() {
    let backend = FakeBackend::with_events(vec![
        start(2),
        month("Януари", "a"),
        Err(ApiError::Stream("connection reset".to_string())),
        month("Февруари", "b"),
    ]);

    let forecast = run_forecast(&backend, &request(), |_| {}).await.unwrap();

    assert_eq!(
        *forecast.state(),
        ForecastState::Failed("Грешка при четене на данните".to_string())
    );
    assert_eq!(forecast.months().len(), 1);
}

#[tokio::test]
async fn test_stream_without_complete_event_finishes() {
    let backend = FakeBackend::with_events(vec![start(1), month("Януари", "a")]);

    let mut updates = 0;
    let forecast = run_forecast(&backend, &request(), |_| updates += 1).await.unwrap();

    assert_eq!(*forecast.state(), ForecastState::Complete);
    assert_eq!(updates, 3);
}

#[tokio::test]
async fn test_failed_request_is_an_error() {
    let backend = FakeBackend::default();
    *backend.stream_result.lock().unwrap() = Err(ApiError::Timeout);

    let err = run_forecast(&backend, &request(), |_| {}).await.unwrap_err();
    assert_eq!(err, ApiError::Timeout);
}

#[tokio::test]
async fn test_decode_sse_across_chunks() {
    let chunks: Vec<Result<Vec<u8>, String>> = vec![
        Ok(b"data: {\"type\": \"start\", \"total_months\": 2}\n\nda".to_vec()),
        Ok("ta: {\"type\": \"month_complete\", \"month\": \"Януари\", \"text\": \"x\"}\n".as_bytes().to_vec()),
        Ok(b": keep-alive\n\ndata: not json\n".to_vec()),
        Ok(b"data: {\"type\": \"complete\"}".to_vec()),
    ];

    let events: Vec<_> = decode_sse(futures::stream::iter(chunks)).collect().await;
    let events: Vec<StreamEvent> = events.into_iter().map(Result::unwrap).collect();

    assert_eq!(events.len(), 3);
    assert!(matches!(
        events[0],
        StreamEvent::Start {
            total_months: Some(2),
            ..
        }
    ));
    assert_eq!(
        events[1],
        StreamEvent::MonthComplete {
            month: "Януари".to_string(),
            text: "x".to_string(),
        }
    );
    assert_eq!(events[2], StreamEvent::Complete);
}

#[tokio::test]
async fn test_decode_sse_surfaces_read_error() {
    let chunks: Vec<Result<Vec<u8>, String>> = vec![
        Ok(b"data: {\"type\": \"complete\"}\n".to_vec()),
        Err("socket closed".to_string()),
        Ok(b"data: {\"type\": \"complete\"}\n".to_vec()),
    ];

    let events: Vec<_> = decode_sse(futures::stream::iter(chunks)).collect().await;

    assert_eq!(events.len(), 2);
    assert_eq!(events[0], Ok(StreamEvent::Complete));
    assert_eq!(events[1], Err(ApiError::Stream("socket closed".to_string())));
}
