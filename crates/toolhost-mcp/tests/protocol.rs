//! Protocol integration tests: lifecycle, dispatch and error mapping.
//!
//! Stream scenarios run the real connection loop over in-memory duplex pipes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines};
use tokio::task::JoinHandle;

use toolhost::{
    handler_fn, Arguments, Capability, CapabilityRegistry, HandlerError, InputContract, ParamSpec,
};
use toolhost_mcp::protocol::Dispatcher;
use toolhost_mcp::session::{Session, SessionState};
use toolhost_mcp::transport::serve;
use toolhost_mcp::types::McpResult;

// ─────────────────────── helpers ───────────────────────

fn test_registry() -> CapabilityRegistry {
    CapabilityRegistry::from_capabilities(vec![
        Capability::tool(
            "echo",
            InputContract::new().param(ParamSpec::string("text").required()),
            handler_fn(|args: Arguments| async move {
                Ok(json!({ "text": args["text"].clone() }))
            }),
        )
        .with_description("Echo the text back"),
        Capability::tool(
            "slow",
            InputContract::new().param(ParamSpec::integer("ms").required()),
            handler_fn(|args: Arguments| async move {
                let ms = args["ms"].as_u64().unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(json!({ "slept": ms }))
            }),
        ),
        Capability::tool(
            "fail",
            InputContract::new(),
            handler_fn(|_args: Arguments| async move { Err(HandlerError::new("boom")) }),
        ),
        Capability::tool(
            "explode",
            InputContract::new(),
            handler_fn(|_args: Arguments| async move {
                if true {
                    panic!("kaboom");
                }
                Ok(Value::Null)
            }),
        ),
        Capability::resource(
            "memo://greeting",
            InputContract::new(),
            handler_fn(|_args: Arguments| async move { Ok(json!({ "greeting": "hello" })) }),
        ),
    ])
    .unwrap()
}

fn dispatcher_with_timeout(timeout: Duration) -> Dispatcher {
    Dispatcher::new(Arc::new(Session::new(Arc::new(test_registry()), timeout)))
}

fn dispatcher() -> Dispatcher {
    dispatcher_with_timeout(Duration::from_secs(5))
}

fn request(id: i64, method: &str, params: Value) -> Value {
    json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params })
}

fn init_request(id: i64, version: &str) -> Value {
    request(
        id,
        "initialize",
        json!({
            "protocolVersion": version,
            "capabilities": {},
            "clientInfo": { "name": "test-client", "version": "1.0" }
        }),
    )
}

fn call(id: i64, tool: &str, arguments: Value) -> Value {
    request(id, "tools/call", json!({ "name": tool, "arguments": arguments }))
}

async fn send(dispatcher: &Dispatcher, message: Value) -> Value {
    dispatcher
        .handle_message(message)
        .await
        .expect("expected a response")
}

async fn initialized() -> Dispatcher {
    let dispatcher = dispatcher();
    let response = send(&dispatcher, init_request(0, "2025-06-18")).await;
    assert!(response.get("result").is_some(), "{response}");
    dispatcher
}

/// A client on the far side of an in-memory connection.
struct Client {
    writer: Option<DuplexStream>,
    lines: Lines<BufReader<DuplexStream>>,
    server: JoinHandle<McpResult<()>>,
}

impl Client {
    fn start(dispatcher: Dispatcher, max_message_bytes: usize) -> Self {
        let (client_out, server_in) = tokio::io::duplex(64 * 1024);
        let (server_out, client_in) = tokio::io::duplex(64 * 1024);
        let server = tokio::spawn(serve(dispatcher, server_in, server_out, max_message_bytes));
        Self {
            writer: Some(client_out),
            lines: BufReader::new(client_in).lines(),
            server,
        }
    }

    async fn send_raw(&mut self, line: &str) {
        let writer = self.writer.as_mut().expect("writer already closed");
        writer.write_all(line.as_bytes()).await.unwrap();
        writer.write_all(b"\n").await.unwrap();
        writer.flush().await.unwrap();
    }

    async fn send(&mut self, message: Value) {
        self.send_raw(&message.to_string()).await;
    }

    async fn recv(&mut self) -> Value {
        let line = tokio::time::timeout(Duration::from_secs(5), self.lines.next_line())
            .await
            .expect("timed out waiting for a response")
            .unwrap()
            .expect("connection closed");
        serde_json::from_str(&line).unwrap()
    }

    /// Responses keyed by id, for requests that complete in any order.
    async fn recv_many(&mut self, count: usize) -> HashMap<String, Value> {
        let mut out = HashMap::new();
        for _ in 0..count {
            let response = self.recv().await;
            out.insert(response["id"].to_string(), response);
        }
        out
    }

    /// Close our side, collect whatever is still written, and wait for the server.
    async fn finish(mut self) -> (Vec<Value>, McpResult<()>) {
        self.writer = None;
        let mut rest = Vec::new();
        while let Ok(Some(line)) = self.lines.next_line().await {
            rest.push(serde_json::from_str(&line).unwrap());
        }
        let outcome = tokio::time::timeout(Duration::from_secs(5), self.server)
            .await
            .expect("server did not stop")
            .unwrap();
        (rest, outcome)
    }
}

const MAX: usize = 64 * 1024;

// ─────────────────────── lifecycle ───────────────────────

#[tokio::test]
async fn test_initialize_negotiates_requested_version() {
    let dispatcher = dispatcher();
    let response = send(&dispatcher, init_request(1, "2025-03-26")).await;
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["protocolVersion"], "2025-03-26");
    assert_eq!(response["result"]["serverInfo"]["name"], "toolhost-mcp");
    assert!(response["result"]["capabilities"]["tools"].is_object());
    assert_eq!(dispatcher.session().state(), SessionState::Ready);
    assert!(dispatcher.session().registry().is_sealed());
}

#[tokio::test]
async fn test_initialize_falls_back_to_older_supported_version() {
    let dispatcher = dispatcher();
    let response = send(&dispatcher, init_request(1, "2025-01-01")).await;
    assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
}

#[tokio::test]
async fn test_version_mismatch_closes_session() {
    let dispatcher = dispatcher();
    let response = send(&dispatcher, init_request(1, "1999-01-01")).await;
    assert_eq!(response["error"]["code"], -32005);
    assert_eq!(response["error"]["data"]["kind"], "version_mismatch");
    assert_eq!(
        response["error"]["data"]["details"]["requested"],
        "1999-01-01"
    );
    assert_eq!(dispatcher.session().state(), SessionState::Closed);

    let response = send(&dispatcher, request(2, "tools/list", json!({}))).await;
    assert_eq!(response["error"]["code"], -32003);
}

#[tokio::test]
async fn test_requests_before_initialize_are_not_ready() {
    let dispatcher = dispatcher();
    let response = send(&dispatcher, request(1, "tools/list", json!({}))).await;
    assert_eq!(response["id"], 1);
    assert_eq!(response["error"]["code"], -32003);
    assert_eq!(response["error"]["data"]["kind"], "not_ready");

    let response = send(&dispatcher, call(2, "echo", json!({ "text": "hi" }))).await;
    assert_eq!(response["error"]["code"], -32003);
    assert_eq!(dispatcher.session().state(), SessionState::Uninitialized);
}

#[tokio::test]
async fn test_ping_is_allowed_before_initialize() {
    let dispatcher = dispatcher();
    let response = send(&dispatcher, request(1, "ping", json!({}))).await;
    assert_eq!(response["result"], json!({}));
}

#[tokio::test]
async fn test_second_initialize_is_rejected() {
    let dispatcher = initialized().await;
    let response = send(&dispatcher, init_request(5, "2025-06-18")).await;
    assert_eq!(response["id"], 5);
    assert_eq!(response["error"]["code"], -32600);
    assert_eq!(dispatcher.session().state(), SessionState::Ready);
}

#[tokio::test]
async fn test_shutdown_refuses_new_requests() {
    let dispatcher = initialized().await;
    let response = send(&dispatcher, request(1, "shutdown", json!({}))).await;
    assert_eq!(response["result"], json!({}));
    assert_eq!(dispatcher.session().state(), SessionState::ShuttingDown);

    let response = send(&dispatcher, request(2, "tools/list", json!({}))).await;
    assert_eq!(response["error"]["code"], -32004);
    assert_eq!(response["error"]["data"]["kind"], "shutting_down");
}

#[tokio::test]
async fn test_notifications_get_no_response() {
    let dispatcher = dispatcher();
    let early = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    assert!(dispatcher.handle_message(early).await.is_none());

    let dispatcher = initialized().await;
    let ready = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    assert!(dispatcher.handle_message(ready).await.is_none());
    let cancel = json!({
        "jsonrpc": "2.0",
        "method": "notifications/cancelled",
        "params": { "requestId": 4, "reason": "user" }
    });
    assert!(dispatcher.handle_message(cancel).await.is_none());
}

// ─────────────────────── envelope ───────────────────────

#[tokio::test]
async fn test_request_method_without_id_is_malformed() {
    let dispatcher = initialized().await;
    let message = json!({ "jsonrpc": "2.0", "method": "tools/list" });
    let response = send(&dispatcher, message).await;
    assert!(response["id"].is_null());
    assert_eq!(response["error"]["code"], -32600);
}

#[tokio::test]
async fn test_bad_envelopes_are_malformed() {
    let dispatcher = initialized().await;

    let response = send(&dispatcher, json!([1, 2, 3])).await;
    assert!(response["id"].is_null());
    assert_eq!(response["error"]["code"], -32600);

    let response = send(&dispatcher, json!({ "jsonrpc": "1.0", "id": 3, "method": "ping" })).await;
    assert_eq!(response["id"], 3);
    assert_eq!(response["error"]["code"], -32600);

    let response = send(&dispatcher, json!({ "jsonrpc": "2.0", "id": 1.5, "method": "ping" })).await;
    assert!(response["id"].is_null());
    assert_eq!(response["error"]["code"], -32600);

    // Integer ids are signed 64-bit; anything wider is refused, not truncated.
    let response = send(&dispatcher, json!({ "jsonrpc": "2.0", "id": u64::MAX, "method": "ping" })).await;
    assert!(response["id"].is_null());
    assert_eq!(response["error"]["code"], -32600);
    assert!(response["error"]["message"]
        .as_str()
        .unwrap()
        .contains("64-bit"));

    let response = send(&dispatcher, json!({ "jsonrpc": "2.0", "id": 1.0, "method": "ping" })).await;
    assert!(response["id"].is_null());
    assert_eq!(response["error"]["code"], -32600);

    let response = send(&dispatcher, json!({ "jsonrpc": "2.0", "id": i64::MIN, "method": "ping" })).await;
    assert_eq!(response["id"], i64::MIN);

    let response = send(&dispatcher, json!({ "jsonrpc": "2.0", "id": 4, "method": "" })).await;
    assert_eq!(response["error"]["code"], -32600);
}

#[tokio::test]
async fn test_client_responses_are_ignored() {
    let dispatcher = initialized().await;
    let message = json!({ "jsonrpc": "2.0", "id": 9, "result": {} });
    assert!(dispatcher.handle_message(message).await.is_none());
}

#[tokio::test]
async fn test_unknown_method() {
    let dispatcher = initialized().await;
    let response = send(&dispatcher, request(1, "prompts/list", json!({}))).await;
    assert_eq!(response["error"]["code"], -32601);
    assert_eq!(response["error"]["data"]["kind"], "method_not_found");
}

#[tokio::test]
async fn test_string_ids_are_echoed() {
    let dispatcher = initialized().await;
    let message = json!({
        "jsonrpc": "2.0",
        "id": "abc-1",
        "method": "tools/call",
        "params": { "name": "echo", "arguments": { "text": "x" } }
    });
    let response = send(&dispatcher, message).await;
    assert_eq!(response["id"], "abc-1");
}

// ─────────────────────── discovery ───────────────────────

#[tokio::test]
async fn test_discovery_is_idempotent() {
    let dispatcher = initialized().await;
    let first = send(&dispatcher, request(1, "tools/list", json!({}))).await;
    let second = send(&dispatcher, request(2, "tools/list", json!({}))).await;
    assert_eq!(first["result"], second["result"]);

    let tools = first["result"]["tools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["echo", "slow", "fail", "explode"]);
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["text"]));
    assert_eq!(tools[0]["description"], "Echo the text back");
}

#[tokio::test]
async fn test_capabilities_list_covers_both_kinds() {
    let dispatcher = initialized().await;
    let response = send(&dispatcher, request(1, "capabilities/list", json!({}))).await;
    let capabilities = response["result"]["capabilities"].as_array().unwrap();
    assert_eq!(capabilities.len(), 5);
    assert_eq!(capabilities[4]["name"], "memo://greeting");
    assert_eq!(capabilities[4]["kind"], "resource");
    assert_eq!(capabilities[0]["kind"], "tool");
}

#[tokio::test]
async fn test_resources_list_and_read() {
    let dispatcher = initialized().await;
    let response = send(&dispatcher, request(1, "resources/list", json!({}))).await;
    let resources = response["result"]["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0]["uri"], "memo://greeting");

    let response = send(
        &dispatcher,
        request(2, "resources/read", json!({ "uri": "memo://greeting" })),
    )
    .await;
    let content = &response["result"]["contents"][0];
    assert_eq!(content["uri"], "memo://greeting");
    assert_eq!(content["mimeType"], "application/json");
    let payload: Value = serde_json::from_str(content["text"].as_str().unwrap()).unwrap();
    assert_eq!(payload["greeting"], "hello");
}

#[tokio::test]
async fn test_kinds_do_not_cross() {
    let dispatcher = initialized().await;
    let response = send(&dispatcher, call(1, "memo://greeting", json!({}))).await;
    assert_eq!(response["error"]["code"], -32002);

    let response = send(
        &dispatcher,
        request(2, "resources/read", json!({ "uri": "echo" })),
    )
    .await;
    assert_eq!(response["error"]["code"], -32002);
}

// ─────────────────────── invocation ───────────────────────

#[tokio::test]
async fn test_tool_call_returns_structured_and_text_content() {
    let dispatcher = initialized().await;
    let response = send(&dispatcher, call(1, "echo", json!({ "text": "hello" }))).await;
    assert_eq!(response["result"]["structuredContent"], json!({ "text": "hello" }));
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    assert_eq!(serde_json::from_str::<Value>(text).unwrap()["text"], "hello");
}

#[tokio::test]
async fn test_unknown_tool_is_not_found() {
    let dispatcher = initialized().await;
    let response = send(&dispatcher, call(1, "missing", json!({}))).await;
    assert_eq!(response["error"]["code"], -32002);
    assert_eq!(response["error"]["data"]["kind"], "not_found");
}

#[tokio::test]
async fn test_validation_failure_lists_issues() {
    let dispatcher = initialized().await;
    let response = send(&dispatcher, call(1, "echo", json!({}))).await;
    assert_eq!(response["error"]["code"], -32602);
    assert_eq!(response["error"]["data"]["kind"], "validation_error");
    assert_eq!(response["error"]["data"]["details"], json!(["text: required"]));

    let response = send(&dispatcher, call(2, "echo", json!({ "text": 5, "extra": 1 }))).await;
    let details = response["error"]["data"]["details"].as_array().unwrap();
    assert_eq!(details.len(), 2);

    let response = send(&dispatcher, call(3, "echo", json!("text"))).await;
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn test_missing_call_params_are_malformed() {
    let dispatcher = initialized().await;
    let response = send(&dispatcher, json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/call" })).await;
    assert_eq!(response["error"]["code"], -32600);
}

#[tokio::test]
async fn test_handler_error_and_panic_are_isolated() {
    let dispatcher = initialized().await;
    let response = send(&dispatcher, call(1, "fail", json!({}))).await;
    assert_eq!(response["error"]["code"], -32000);
    assert!(response["error"]["message"].as_str().unwrap().contains("boom"));

    let response = send(&dispatcher, call(2, "explode", json!({}))).await;
    assert_eq!(response["error"]["code"], -32000);
    assert!(response["error"]["message"]
        .as_str()
        .unwrap()
        .contains("handler panicked: kaboom"));

    assert!(dispatcher.session().inflight().is_empty());
    let response = send(&dispatcher, call(3, "echo", json!({ "text": "still here" }))).await;
    assert_eq!(response["result"]["structuredContent"]["text"], "still here");
}

#[tokio::test]
async fn test_handler_timeout() {
    let dispatcher = dispatcher_with_timeout(Duration::from_millis(50));
    send(&dispatcher, init_request(0, "2025-06-18")).await;
    let response = send(&dispatcher, call(1, "slow", json!({ "ms": 2000 }))).await;
    assert_eq!(response["error"]["code"], -32000);
    assert!(response["error"]["message"]
        .as_str()
        .unwrap()
        .contains("timed out after 50ms"));
}

// ─────────────────────── stream transport ───────────────────────

#[tokio::test]
async fn test_stream_echo_ids_match() {
    let mut client = Client::start(dispatcher(), MAX);
    client.send(init_request(0, "2025-06-18")).await;
    assert_eq!(client.recv().await["id"], 0);

    for id in 1..=3 {
        client.send(call(id, "echo", json!({ "text": format!("msg {id}") }))).await;
    }
    let responses = client.recv_many(3).await;
    for id in 1..=3 {
        let response = &responses[&id.to_string()];
        assert_eq!(
            response["result"]["structuredContent"]["text"],
            format!("msg {id}")
        );
    }

    let (rest, outcome) = client.finish().await;
    assert!(rest.is_empty());
    assert!(outcome.is_ok());
}

#[tokio::test]
async fn test_stream_slow_handler_does_not_block_discovery() {
    let mut client = Client::start(dispatcher(), MAX);
    client.send(init_request(0, "2025-06-18")).await;
    client.recv().await;

    client.send(call(10, "slow", json!({ "ms": 300 }))).await;
    client.send(request(11, "tools/list", json!({}))).await;
    client.send(call(12, "slow", json!({ "ms": 300 }))).await;

    let first = client.recv().await;
    assert_eq!(first["id"], 11);
    assert!(first["result"]["tools"].is_array());

    let rest = client.recv_many(2).await;
    for id in ["10", "12"] {
        assert_eq!(rest[id]["result"]["structuredContent"]["slept"], 300);
    }
}

#[tokio::test]
async fn test_stream_duplicate_in_flight_id_is_rejected() {
    let mut client = Client::start(dispatcher(), MAX);
    client.send(init_request(0, "2025-06-18")).await;
    client.recv().await;

    client.send(call(7, "slow", json!({ "ms": 300 }))).await;
    client.send(call(7, "echo", json!({ "text": "dup" }))).await;

    let rejection = client.recv().await;
    assert!(rejection["id"].is_null());
    assert_eq!(rejection["error"]["code"], -32600);

    let original = client.recv().await;
    assert_eq!(original["id"], 7);
    assert_eq!(original["result"]["structuredContent"]["slept"], 300);

    // The id is free again as soon as the response has been read.
    client.send(call(7, "echo", json!({ "text": "again" }))).await;
    let reused = client.recv().await;
    assert_eq!(reused["result"]["structuredContent"]["text"], "again");
}

#[tokio::test]
async fn test_stream_shutdown_drains_in_flight_requests() {
    let dispatcher = dispatcher();
    let session = Arc::clone(dispatcher.session());
    let mut client = Client::start(dispatcher, MAX);
    client.send(init_request(0, "2025-06-18")).await;
    client.recv().await;

    client.send(call(20, "slow", json!({ "ms": 200 }))).await;
    client.send(request(21, "shutdown", json!({}))).await;

    let ack = client.recv().await;
    assert_eq!(ack["id"], 21);
    assert_eq!(ack["result"], json!({}));

    let drained = client.recv().await;
    assert_eq!(drained["id"], 20);
    assert_eq!(drained["result"]["structuredContent"]["slept"], 200);

    let (rest, outcome) = client.finish().await;
    assert!(rest.is_empty());
    assert!(outcome.is_ok());
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_stream_requests_after_shutdown_are_refused_while_draining() {
    let dispatcher = dispatcher();
    let session = Arc::clone(dispatcher.session());
    let mut client = Client::start(dispatcher, MAX);
    client.send(init_request(0, "2025-06-18")).await;
    client.recv().await;

    client.send(call(20, "slow", json!({ "ms": 400 }))).await;
    client.send(request(21, "shutdown", json!({}))).await;
    let ack = client.recv().await;
    assert_eq!(ack["id"], 21);
    assert_eq!(session.state(), SessionState::ShuttingDown);

    client.send(request(22, "ping", json!({}))).await;
    let refused = client.recv().await;
    assert_eq!(refused["id"], 22);
    assert_eq!(refused["error"]["code"], -32004);

    let drained = client.recv().await;
    assert_eq!(drained["id"], 20);
    assert_eq!(drained["result"]["structuredContent"]["slept"], 400);

    let (rest, outcome) = client.finish().await;
    assert!(rest.is_empty());
    assert!(outcome.is_ok());
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_stream_eof_closes_session_after_pending_work() {
    let dispatcher = dispatcher();
    let session = Arc::clone(dispatcher.session());
    let mut client = Client::start(dispatcher, MAX);
    client.send(init_request(0, "2025-06-18")).await;
    client.recv().await;

    client.send(call(1, "slow", json!({ "ms": 100 }))).await;
    let (rest, outcome) = client.finish().await;
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0]["id"], 1);
    assert!(outcome.is_ok());
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_stream_parse_error_keeps_session_alive() {
    let mut client = Client::start(dispatcher(), MAX);
    client.send_raw("{not json").await;
    let response = client.recv().await;
    assert!(response["id"].is_null());
    assert_eq!(response["error"]["code"], -32700);

    client.send_raw("").await;
    client.send(request(1, "ping", json!({}))).await;
    assert_eq!(client.recv().await["result"], json!({}));
}

#[tokio::test]
async fn test_stream_version_mismatch_ends_connection() {
    let dispatcher = dispatcher();
    let session = Arc::clone(dispatcher.session());
    let mut client = Client::start(dispatcher, MAX);
    client.send(init_request(0, "not-a-version")).await;
    let response = client.recv().await;
    assert_eq!(response["error"]["code"], -32005);

    let (rest, outcome) = client.finish().await;
    assert!(rest.is_empty());
    assert!(outcome.is_ok());
    assert_eq!(session.state(), SessionState::Closed);
}

#[tokio::test]
async fn test_stream_oversize_frame_is_a_transport_fault() {
    let dispatcher = dispatcher();
    let session = Arc::clone(dispatcher.session());
    let mut client = Client::start(dispatcher, 64);
    client.send_raw(&"x".repeat(200)).await;

    let (_, outcome) = client.finish().await;
    assert!(outcome.is_err());
    assert_eq!(session.state(), SessionState::Closed);
}
