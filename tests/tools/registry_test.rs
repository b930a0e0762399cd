//! Tests for `src/tools/registry.rs` dispatch with the Discord tools.

use std::sync::Arc;

use serde_json::json;

use discord_tools::credentials::CredentialError;
use discord_tools::tools::discord::{READ_HISTORY_TOOL, SEND_MESSAGE_TOOL};
use discord_tools::tools::registry::ToolRegistry;
use discord_tools::tools::{register_discord_tools, ToolError};

use crate::support::{
    assert_no_connection, bind, build_tool, captured, json_store, serve_once, settings,
};

fn registry_for(api_base: &str, store: serde_json::Value) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let registered = register_discord_tools(&mut registry, settings(api_base), Some(json_store(store)));
    assert!(registered.is_ok());
    registry
}

#[test]
fn registers_both_tool_names() {
    assert!(ToolRegistry::new().is_empty());
    let registry = registry_for("http://127.0.0.1:9", json!({}));

    assert!(!registry.is_empty());
    assert_eq!(registry.len(), 2);
    assert!(registry.contains(SEND_MESSAGE_TOOL));
    assert!(registry.contains(READ_HISTORY_TOOL));

    let names: Vec<&str> = registry
        .definitions()
        .iter()
        .map(|def| def.name.as_str())
        .collect();
    assert_eq!(names, vec![SEND_MESSAGE_TOOL, READ_HISTORY_TOOL]);
}

#[test]
fn definitions_declare_required_arguments() {
    let registry = registry_for("http://127.0.0.1:9", json!({}));
    let defs = registry.definitions();

    assert_eq!(defs[0].input_schema["required"], json!(["channel_id", "content"]));
    assert_eq!(defs[1].input_schema["required"], json!(["channel_id"]));
    assert_eq!(defs[1].input_schema["properties"]["limit"]["maximum"], 100);
    assert_eq!(defs[1].input_schema["properties"]["limit"]["default"], 50);
}

#[test]
fn duplicate_registration_is_rejected() {
    let mut registry = registry_for("http://127.0.0.1:9", json!({}));
    let again = build_tool(settings("http://127.0.0.1:9"), None);

    let result = registry.register(Arc::new(again));

    assert!(matches!(result, Err(ToolError::Duplicate(ref name)) if name == SEND_MESSAGE_TOOL));
    assert_eq!(registry.len(), 2);
}

#[tokio::test]
async fn unknown_tool_is_an_error() {
    let registry = registry_for("http://127.0.0.1:9", json!({}));

    let result = registry.execute("discord_delete_channel", &json!({})).await;

    assert!(
        matches!(result, Err(ToolError::UnknownTool(ref name)) if name == "discord_delete_channel")
    );
}

#[tokio::test]
async fn send_via_registry_round_trip() {
    let (base, server) = serve_once("200 OK", r#"{"id":"12345","content":"Hello"}"#).await;
    let registry = registry_for(&base, json!({ "discord": "test-token" }));

    let result = registry
        .execute(
            SEND_MESSAGE_TOOL,
            &json!({ "channel_id": "98765", "content": "Hello" }),
        )
        .await;

    let result = match result {
        Ok(result) => result,
        Err(err) => panic!("dispatch should succeed: {err}"),
    };
    assert_eq!(result.to_json()["data"]["id"], "12345");

    let request = captured(server).await;
    assert_eq!(request.target, "/channels/98765/messages");
    assert_eq!(request.json_body(), json!({"content": "Hello"}));
}

#[tokio::test]
async fn history_via_registry_accepts_null_limit() {
    let (base, server) = serve_once("200 OK", "[]").await;
    let registry = registry_for(&base, json!({ "discord": "test-token" }));

    let result = registry
        .execute(
            READ_HISTORY_TOOL,
            &json!({ "channel_id": "42", "limit": null }),
        )
        .await;

    assert!(matches!(result, Ok(ref r) if r.is_success()));
    assert_eq!(captured(server).await.target, "/channels/42/messages?limit=50");
}

#[tokio::test]
async fn missing_arguments_are_invalid_input() {
    let (listener, base) = bind().await;
    let registry = registry_for(&base, json!({ "discord": "test-token" }));

    let send = registry
        .execute(SEND_MESSAGE_TOOL, &json!({ "channel_id": "1" }))
        .await;
    assert!(matches!(send, Err(ToolError::InvalidInput(ref msg)) if msg.contains("content")));

    let history = registry.execute(READ_HISTORY_TOOL, &json!({})).await;
    assert!(matches!(history, Err(ToolError::InvalidInput(ref msg)) if msg.contains("channel_id")));

    let bad_limit = registry
        .execute(
            READ_HISTORY_TOOL,
            &json!({ "channel_id": "1", "limit": "lots" }),
        )
        .await;
    assert!(matches!(bad_limit, Err(ToolError::InvalidInput(ref msg)) if msg.contains("limit")));

    assert_no_connection(listener).await;
}

#[tokio::test]
async fn credential_type_error_propagates_through_registry() {
    let registry = registry_for("http://127.0.0.1:9", json!({ "discord": ["not", "a", "string"] }));

    let result = registry
        .execute(READ_HISTORY_TOOL, &json!({ "channel_id": "1" }))
        .await;

    assert!(matches!(
        result,
        Err(ToolError::Credential(CredentialError::WrongType { found: "array", .. }))
    ));
}
