//! Integration tests for the `/research/stream` server-sent-events endpoint.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use molar_core::MolarConfig;
use molar_core::engines::MockResearchEngine;
use molar_core::gateway::{AppState, router};
use molar_core::research::{ProgressEvent, RawSource, StageId, StageStatus, parse_sources};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const TOKEN: &str = "stream-secret";

fn app(engine: Arc<MockResearchEngine>) -> axum::Router {
    let mut config = MolarConfig::default();
    config.auth.token = TOKEN.to_string();
    let state = AppState::new(&config, engine).with_stage_pacing(Duration::ZERO);
    router(state.shared())
}

fn stream_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/research/stream")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {TOKEN}"))
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Parse every `data:` line of an SSE body into an event.
fn parse_events(body: &str) -> Vec<ProgressEvent> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim_start()).unwrap())
        .collect()
}

async fn run_stream(engine: Arc<MockResearchEngine>, body: &str) -> Vec<ProgressEvent> {
    let resp = app(engine).oneshot(stream_request(body)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), 10_000_000)
        .await
        .unwrap();
    parse_events(&String::from_utf8(bytes.to_vec()).unwrap())
}

#[tokio::test]
async fn test_stream_headers() {
    let engine = Arc::new(MockResearchEngine::new());
    let resp = app(engine)
        .oneshot(stream_request(r#"{"topic": "caries"}"#))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let headers = resp.headers();
    assert!(
        headers["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );
    assert_eq!(headers["cache-control"], "no-cache");
    assert_eq!(headers["connection"], "keep-alive");
    assert_eq!(headers["x-accel-buffering"], "no");
}

#[tokio::test]
async fn test_successful_stream_order() {
    let engine = Arc::new(
        MockResearchEngine::new().with_sources(vec![
            RawSource::new("NHS", "https://www.nhs.uk/caries", "Decay basics."),
            RawSource::new("ADA", "https://www.ada.org/caries", "Prevention."),
        ]),
    );
    let events = run_stream(engine.clone(), r#"{"topic": "caries"}"#).await;

    match &events[0] {
        ProgressEvent::Stages { stages } => {
            assert_eq!(stages.len(), 6);
            assert_eq!(stages[0].status, StageStatus::Completed);
            assert_eq!(stages[1].status, StageStatus::Active);
        }
        other => panic!("expected stages snapshot, got {other:?}"),
    }

    let n = events.len();
    assert!(matches!(events[n - 1], ProgressEvent::Complete));
    let document = match &events[n - 2] {
        ProgressEvent::Content { content } => content.clone(),
        other => panic!("expected content, got {other:?}"),
    };
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::Content { .. }))
            .count(),
        1
    );

    let sources = parse_sources(&document);
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].url, "https://www.nhs.uk/caries");
    assert!(document.starts_with("---\ntitle: \"Draft: caries\""));

    // No stage completes before it was active, and none regresses.
    let mut seen: HashMap<StageId, StageStatus> = HashMap::new();
    seen.insert(StageId::Init, StageStatus::Completed);
    seen.insert(StageId::Search, StageStatus::Active);
    for event in &events[1..n - 2] {
        let ProgressEvent::StageUpdate { stage_id, update } = event else {
            panic!("unexpected event mid-stream: {event:?}");
        };
        let previous = seen.get(stage_id).copied();
        match update.status {
            StageStatus::Active => assert!(
                previous.is_none() || previous == Some(StageStatus::Active),
                "{stage_id:?} re-activated after {previous:?}"
            ),
            StageStatus::Completed => assert_eq!(
                previous,
                Some(StageStatus::Active),
                "{stage_id:?} completed without being active"
            ),
            other => panic!("unexpected status {other:?}"),
        }
        seen.insert(*stage_id, update.status);
    }
    for id in StageId::ALL {
        assert_eq!(seen.get(&id), Some(&StageStatus::Completed), "{id:?}");
    }
    assert_eq!(engine.research_calls(), 1);
    assert_eq!(engine.write_calls(), 1);
}

#[tokio::test]
async fn test_search_completion_reports_capped_count() {
    let sources: Vec<RawSource> = (0..9)
        .map(|i| RawSource::new(format!("S{i}"), format!("https://s{i}.org"), "x"))
        .collect();
    let engine = Arc::new(MockResearchEngine::new().with_sources(sources));
    let events = run_stream(engine, r#"{"topic": "caries", "sources_count": 5}"#).await;
    let message = events.iter().find_map(|e| match e {
        ProgressEvent::StageUpdate { stage_id, update }
            if *stage_id == StageId::Search && update.status == StageStatus::Completed =>
        {
            update.message.clone()
        }
        _ => None,
    });
    assert_eq!(message.as_deref(), Some("Found 5 relevant sources"));
}

#[tokio::test]
async fn test_failed_stream_ends_with_error_event() {
    let engine = Arc::new(MockResearchEngine::new().failing_write("provider timeout"));
    let events = run_stream(engine, r#"{"topic": "caries"}"#).await;

    let last = events.last().unwrap();
    match last {
        ProgressEvent::Error { error } => {
            assert!(error.contains("provider timeout"));
            assert!(!error.starts_with("Research failed"));
        }
        other => panic!("expected error event, got {other:?}"),
    }
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, ProgressEvent::Content { .. }))
    );
    assert!(matches!(
        &events[events.len() - 2],
        ProgressEvent::StageUpdate { stage_id: StageId::Generate, update }
            if update.status == StageStatus::Error
    ));
}

#[tokio::test]
async fn test_multiline_snippets_survive_document() {
    let engine = Arc::new(MockResearchEngine::new().with_sources(vec![
        RawSource::new("NHS", "https://nhs.uk/a", "Line one.\nLine two of the search content."),
        RawSource::new("ADA", "https://www.ada.org/b", "Single line."),
    ]));
    let events = run_stream(engine, r#"{"topic": "caries"}"#).await;
    let document = events
        .iter()
        .find_map(|e| match e {
            ProgressEvent::Content { content } => Some(content.clone()),
            _ => None,
        })
        .unwrap();
    assert!(document.contains("1. [NHS](https://nhs.uk/a)\n   Line one.\n   Line two of the search content.\n"));
    let sources = parse_sources(&document);
    assert_eq!(sources.len(), 2);
    assert_eq!(sources[0].snippet, "Line one.\nLine two of the search content.");
    assert_eq!(sources[1].snippet, "Single line.");
}

#[tokio::test]
async fn test_stream_wire_format() {
    let engine = Arc::new(MockResearchEngine::new());
    let resp = app(engine)
        .oneshot(stream_request(r#"{"topic": "caries"}"#))
        .await
        .unwrap();
    let bytes = axum::body::to_bytes(resp.into_body(), 10_000_000)
        .await
        .unwrap();
    let body = String::from_utf8(bytes.to_vec()).unwrap();
    let payloads: Vec<serde_json::Value> = body
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim_start()).unwrap())
        .collect();

    assert_eq!(payloads[0]["type"], "stages");
    assert_eq!(payloads[0]["stages"][0]["id"], "init");
    assert_eq!(payloads[1]["type"], "stage_update");
    assert_eq!(payloads[1]["stageId"], "search");
    assert_eq!(payloads[1]["update"]["status"], "active");
    assert_eq!(payloads.last().unwrap(), &serde_json::json!({"type": "complete"}));
}

#[tokio::test]
async fn test_disconnect_abandons_run() {
    let engine = Arc::new(MockResearchEngine::new().with_delay(Duration::from_millis(200)));
    let resp = app(engine.clone())
        .oneshot(stream_request(r#"{"topic": "caries"}"#))
        .await
        .unwrap();
    drop(resp);

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(engine.research_calls() <= 1);
    assert_eq!(engine.write_calls(), 0);
}
