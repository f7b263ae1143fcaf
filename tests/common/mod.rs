use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;
use url::Url;

use coachline::transport::HttpTransport;
use coachline::ConversationIds;

pub const USER: &str = "athlete-1";
pub const COACH: &str = "coach-1";

#[allow(dead_code)]
pub fn ids(conversation_id: &str) -> ConversationIds {
    ConversationIds::new(USER, COACH, conversation_id)
}

#[allow(dead_code)]
pub fn conversation_path(conversation_id: &str) -> String {
    format!(
        "/api/users/{}/coaches/{}/conversations/{}",
        USER, COACH, conversation_id
    )
}

/// Construct an `HttpTransport` pointing at the given wiremock base URL.
#[allow(dead_code)]
pub fn make_transport(server_uri: &str, streaming: bool) -> HttpTransport {
    HttpTransport::new(
        Url::parse(&format!("{}/api", server_uri)).expect("valid url"),
        Some("test-token".to_string()),
        Duration::from_secs(5),
        streaming,
    )
    .expect("transport")
}

#[allow(dead_code)]
pub fn message_json(id: &str, role: &str, content: &str, timestamp: &str) -> Value {
    json!({
        "id": id,
        "role": role,
        "content": content,
        "timestamp": timestamp,
    })
}

#[allow(dead_code)]
pub fn conversation_json(conversation_id: &str, messages: Vec<Value>) -> Value {
    json!({
        "conversationId": conversation_id,
        "title": "Spring marathon",
        "mode": "build",
        "messages": messages,
        "createdAt": "2026-03-01T08:00:00Z",
        "updatedAt": "2026-03-01T08:05:00Z",
    })
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("coachline.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Config file pointing at `server_uri` with test identities
#[allow(dead_code)]
pub fn config_for_server(server_uri: &str, streaming: bool) -> (TempDir, PathBuf) {
    temp_config_file(&format!(
        "api:\n  base_url: {}/api\n  user_id: {}\n  coach_id: {}\nstreaming:\n  enabled: {}\npolling:\n  interval_seconds: 1\n  timeout_seconds: 3\n",
        server_uri, USER, COACH, streaming
    ))
}
