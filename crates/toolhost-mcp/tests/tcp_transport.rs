//! TCP transport: each accepted connection gets its own session.

use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use toolhost_mcp::config::ServerConfig;
use toolhost_mcp::server::ServerContext;
use toolhost_mcp::transport::TcpTransport;

struct Conn {
    reader: tokio::io::Lines<BufReader<tokio::net::tcp::OwnedReadHalf>>,
    writer: tokio::net::tcp::OwnedWriteHalf,
}

impl Conn {
    async fn connect(addr: std::net::SocketAddr) -> Self {
        let (read, writer) = TcpStream::connect(addr).await.unwrap().into_split();
        Self {
            reader: BufReader::new(read).lines(),
            writer,
        }
    }

    async fn roundtrip(&mut self, message: Value) -> Value {
        self.writer
            .write_all(format!("{message}\n").as_bytes())
            .await
            .unwrap();
        let line = tokio::time::timeout(Duration::from_secs(5), self.reader.next_line())
            .await
            .expect("timed out")
            .unwrap()
            .expect("connection closed");
        serde_json::from_str(&line).unwrap()
    }
}

#[tokio::test]
async fn test_connections_have_independent_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ServerConfig::default();
    config.files.base_path = dir.path().join("data");
    let context = ServerContext::from_config(config).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move { TcpTransport::new(context).serve_listener(listener).await });

    let mut first = Conn::connect(addr).await;
    let mut second = Conn::connect(addr).await;

    let init = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "initialize",
        "params": {
            "protocolVersion": "2025-06-18",
            "clientInfo": { "name": "tcp-test", "version": "1.0" }
        }
    });
    let response = first.roundtrip(init).await;
    assert_eq!(response["result"]["protocolVersion"], "2025-06-18");

    let list = json!({ "jsonrpc": "2.0", "id": 2, "method": "tools/list" });
    let response = first.roundtrip(list.clone()).await;
    assert!(response["result"]["tools"].as_array().unwrap().len() >= 8);

    let response = second.roundtrip(list).await;
    assert_eq!(response["error"]["code"], -32003);

    server.abort();
}
