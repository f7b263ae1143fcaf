//! HTTP transport integration tests
//!
//! Exercises `HttpTransport` against a `wiremock` mock server.
//!
//! # wiremock body helpers
//!
//! Use `set_body_raw(bytes, mime)` for SSE responses so that the
//! `Content-Type` is `text/event-stream` exactly.

use futures::StreamExt;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use coachline::error::CoachlineError;
use coachline::transport::{ChatTransport, SendRequest, StreamFrame};

mod common;
use common::{conversation_json, conversation_path, ids, make_transport, message_json};

#[tokio::test]
async fn test_fetch_conversation_parses_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(conversation_path("conv1")))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(conversation_json(
            "conv1",
            vec![message_json("m1", "assistant", "Welcome!", "2026-03-01T08:01:00Z")],
        )))
        .expect(1)
        .mount(&server)
        .await;

    let transport = make_transport(&server.uri(), true);
    let record = transport.fetch_conversation(&ids("conv1")).await.unwrap();

    assert_eq!(record.conversation_id, "conv1");
    assert_eq!(record.title, "Spring marathon");
    assert_eq!(record.mode.as_deref(), Some("build"));
    assert_eq!(record.messages.len(), 1);
    assert_eq!(record.messages[0].content, "Welcome!");
}

#[tokio::test]
async fn test_fetch_missing_conversation_maps_to_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let transport = make_transport(&server.uri(), true);
    let err = transport.fetch_conversation(&ids("gone")).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<CoachlineError>(),
        Some(CoachlineError::ConversationNotFound(id)) if id == "gone"
    ));
}

#[tokio::test]
async fn test_server_error_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let transport = make_transport(&server.uri(), false);
    let err = transport
        .send_message(&ids("conv1"), &SendRequest::text("Hi"))
        .await
        .unwrap_err();
    let message = err.to_string();
    assert!(message.contains("503"), "unexpected error: {}", message);
    assert!(message.contains("overloaded"));
}

#[tokio::test]
async fn test_send_message_posts_request_and_returns_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{}/messages", conversation_path("conv1"))))
        .and(body_json(json!({"text": "Hill repeats?", "mode": "build"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": message_json("a1", "assistant", "Yes, 6x90s.", "2026-03-01T08:02:00Z")
        })))
        .expect(1)
        .mount(&server)
        .await;

    let transport = make_transport(&server.uri(), false);
    let reply = transport
        .send_message(
            &ids("conv1"),
            &SendRequest::text("Hill repeats?").with_mode("build"),
        )
        .await
        .unwrap();
    assert_eq!(reply.id, "a1");
    assert_eq!(reply.content, "Yes, 6x90s.");
}

#[tokio::test]
async fn test_stream_message_decodes_sse_frames() {
    let server = MockServer::start().await;
    let complete = json!({
        "type": "complete",
        "message": message_json("a1", "assistant", "Hi there!", "2026-03-01T08:02:00Z"),
    });
    let sse = format!(
        "event: ping\ndata: [PING]\n\n\
         data: {{\"type\":\"status\",\"content\":\"Analyzing your workout...\"}}\n\n\
         data: {{\"type\":\"chunk\",\"content\":\"H\"}}\n\n\
         data: {{\"type\":\"chunk\",\"content\":\"i\"}}\n\n\
         data: {}\n\n\
         data: [DONE]\n\n",
        complete
    );
    Mock::given(method("POST"))
        .and(path(format!("{}/messages/stream", conversation_path("conv1"))))
        .and(header("accept", "text/event-stream"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse.into_bytes(), "text/event-stream"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let transport = make_transport(&server.uri(), true);
    assert!(transport.supports_streaming());
    let frames: Vec<StreamFrame> = transport
        .stream_message(&ids("conv1"), &SendRequest::text("Hello"))
        .await
        .unwrap()
        .map(|frame| frame.unwrap())
        .collect()
        .await;

    assert_eq!(frames.len(), 4);
    assert_eq!(
        frames[0],
        StreamFrame::Status("Analyzing your workout...".to_string())
    );
    assert_eq!(frames[1], StreamFrame::Delta("H".to_string()));
    assert_eq!(frames[2], StreamFrame::Delta("i".to_string()));
    assert!(matches!(&frames[3], StreamFrame::Done(m) if m.content == "Hi there!"));
}

#[tokio::test]
async fn test_stream_error_frame_surfaces_as_error() {
    let server = MockServer::start().await;
    let sse = "data: {\"type\":\"chunk\",\"content\":\"par\"}\n\n\
               data: {\"type\":\"error\",\"message\":\"model unavailable\"}\n\n";
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(sse.as_bytes().to_vec(), "text/event-stream"),
        )
        .mount(&server)
        .await;

    let transport = make_transport(&server.uri(), true);
    let mut stream = transport
        .stream_message(&ids("conv1"), &SendRequest::text("Hello"))
        .await
        .unwrap();

    assert!(matches!(stream.next().await, Some(Ok(StreamFrame::Delta(_)))));
    let err = stream.next().await.unwrap().unwrap_err();
    assert!(err.to_string().contains("model unavailable"));
}

#[tokio::test]
async fn test_stream_rejects_non_sse_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let transport = make_transport(&server.uri(), true);
    assert!(transport
        .stream_message(&ids("conv1"), &SendRequest::text("Hello"))
        .await
        .is_err());
}

#[tokio::test]
async fn test_streaming_disabled_reports_not_supported() {
    let server = MockServer::start().await;
    let transport = make_transport(&server.uri(), false);
    assert!(!transport.supports_streaming());

    let err = match transport
        .stream_message(&ids("conv1"), &SendRequest::text("Hello"))
        .await
    {
        Ok(_) => panic!("streaming should be disabled"),
        Err(e) => e,
    };
    assert!(matches!(
        err.downcast_ref::<CoachlineError>(),
        Some(CoachlineError::StreamingNotSupported)
    ));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_mutations_use_patch_and_delete() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(conversation_path("conv1")))
        .and(body_json(json!({"title": "Race week"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path(conversation_path("conv1")))
        .and(body_json(json!({"mode": "taper"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(conversation_path("conv1")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let transport = make_transport(&server.uri(), true);
    transport.update_title(&ids("conv1"), "Race week").await.unwrap();
    transport.update_mode(&ids("conv1"), "taper").await.unwrap();
    transport.delete_conversation(&ids("conv1")).await.unwrap();
}
