//! Chat relay against a fake daemon

use std::{sync::Arc, sync::Mutex, time::Duration};

use async_trait::async_trait;
use futures::{channel::mpsc, StreamExt};
use llamadeck_relay::{
    upstream::UpstreamChatRequest, ByteStream, ChatMessage, ChatRelay, ChatRequest, ChatUpstream,
    DaemonConfig, OllamaClient, RelayError,
};
use mockito::Matcher;
use serde_json::json;
use tokio_util::sync::CancellationToken;

fn hello_request() -> ChatRequest {
    ChatRequest::new("llama3", vec![ChatMessage::new("user", "Say hello")])
}

async fn collect_text(relay: &ChatRelay, request: ChatRequest) -> Vec<String> {
    relay
        .relay_chat(request, CancellationToken::new())
        .await
        .unwrap()
        .map(|delta| delta.unwrap())
        .collect()
        .await
}

#[tokio::test]
async fn test_end_to_end_deltas_from_ndjson() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/chat")
        .match_body(Matcher::PartialJson(json!({
            "model": "llama3",
            "stream": true,
            "options": { "top_k": 40 },
            "messages": [{ "role": "user", "content": "Say hello" }],
        })))
        .with_status(200)
        .with_header("content-type", "application/x-ndjson")
        .with_body(
            "{\"message\":{\"role\":\"assistant\",\"content\":\"He\"},\"done\":false}\n\
             {\"message\":{\"role\":\"assistant\",\"content\":\"llo\"},\"done\":false}\n\
             {\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        )
        .create_async()
        .await;

    let client = OllamaClient::new(DaemonConfig::with_base_url(server.url())).unwrap();
    let relay = ChatRelay::new(Arc::new(client));

    let deltas = collect_text(&relay, hello_request()).await;
    assert_eq!(deltas, vec!["He", "llo"]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_error_status_is_upstream_unavailable() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/api/chat")
        .with_status(500)
        .with_body("model runner crashed")
        .create_async()
        .await;

    let client = OllamaClient::new(DaemonConfig::with_base_url(server.url())).unwrap();
    let relay = ChatRelay::new(Arc::new(client));

    match relay
        .relay_chat(hello_request(), CancellationToken::new())
        .await
    {
        Err(RelayError::UpstreamUnavailable(message)) => {
            assert!(message.contains("500"), "{}", message)
        }
        Err(other) => panic!("unexpected error: {:?}", other),
        Ok(_) => panic!("expected an error"),
    }
}

#[tokio::test]
async fn test_connection_refused_is_upstream_unavailable() {
    let client = OllamaClient::new(DaemonConfig::with_base_url("http://127.0.0.1:1")).unwrap();
    let relay = ChatRelay::new(Arc::new(client));

    let result = relay
        .relay_chat(hello_request(), CancellationToken::new())
        .await;
    assert!(matches!(result, Err(RelayError::UpstreamUnavailable(_))));
}

#[tokio::test]
async fn test_missing_model_is_rejected() {
    let client = OllamaClient::new(DaemonConfig::with_base_url("http://127.0.0.1:1")).unwrap();
    let relay = ChatRelay::new(Arc::new(client));

    let request = ChatRequest::new(" ", vec![ChatMessage::new("user", "hi")]);
    let result = relay.relay_chat(request, CancellationToken::new()).await;
    assert!(matches!(result, Err(RelayError::InvalidRequest(_))));
}

/// Upstream fed by hand through a channel so the test decides when bytes arrive
struct ChannelUpstream {
    receiver: Mutex<Option<mpsc::UnboundedReceiver<llamadeck_relay::Result<Vec<u8>>>>>,
}

#[async_trait]
impl ChatUpstream for ChannelUpstream {
    async fn open_chat(&self, _request: &UpstreamChatRequest) -> llamadeck_relay::Result<ByteStream> {
        let receiver = self
            .receiver
            .lock()
            .unwrap()
            .take()
            .expect("chat opened twice");
        Ok(receiver.boxed())
    }
}

#[tokio::test]
async fn test_cancel_mid_stream_stops_without_error() {
    let (sender, receiver) = mpsc::unbounded();
    let upstream = ChannelUpstream {
        receiver: Mutex::new(Some(receiver)),
    };
    let relay = ChatRelay::new(Arc::new(upstream));
    let cancel = CancellationToken::new();

    let mut stream = relay
        .relay_chat(hello_request(), cancel.clone())
        .await
        .unwrap();

    // Record split across two chunks
    sender
        .unbounded_send(Ok(b"{\"message\":{\"content\":\"Hel".to_vec()))
        .unwrap();
    sender.unbounded_send(Ok(b"lo\"}}\n".to_vec())).unwrap();
    assert_eq!(stream.next().await.unwrap().unwrap(), "Hello");

    // Upstream stalls; cancellation must still end the stream
    cancel.cancel();
    let next = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("cancelled stream must not hang");
    assert!(next.is_none());

    // Late bytes are never delivered
    let _ = sender.unbounded_send(Ok(b"{\"message\":{\"content\":\"late\"}}\n".to_vec()));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn test_mid_flight_error_is_final_item() {
    let (sender, receiver) = mpsc::unbounded();
    let upstream = ChannelUpstream {
        receiver: Mutex::new(Some(receiver)),
    };
    let relay = ChatRelay::new(Arc::new(upstream));

    let stream = relay
        .relay_chat(hello_request(), CancellationToken::new())
        .await
        .unwrap();

    sender
        .unbounded_send(Ok(b"{\"message\":{\"content\":\"par\"}}\n".to_vec()))
        .unwrap();
    sender
        .unbounded_send(Err(RelayError::UpstreamStream("connection reset".to_string())))
        .unwrap();
    drop(sender);

    let items: Vec<_> = stream.collect().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_ref().unwrap(), "par");
    assert!(matches!(items[1], Err(RelayError::UpstreamStream(_))));
}

#[tokio::test]
async fn test_list_and_show_models_pass_through() {
    let mut server = mockito::Server::new_async().await;
    let _tags = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"models":[{"name":"llama3:latest","size":4661224676}]}"#)
        .create_async()
        .await;
    let _show = server
        .mock("POST", "/api/show")
        .match_body(Matcher::Json(json!({ "name": "llama3" })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"details":{"family":"llama","parameter_size":"8.0B"}}"#)
        .create_async()
        .await;
    let _missing = server
        .mock("POST", "/api/show")
        .match_body(Matcher::Json(json!({ "name": "ghost" })))
        .with_status(404)
        .with_body(r#"{"error":"model 'ghost' not found"}"#)
        .create_async()
        .await;

    let client = OllamaClient::new(DaemonConfig::with_base_url(server.url())).unwrap();

    let tags = client.list_models().await.unwrap();
    assert_eq!(tags["models"][0]["name"], "llama3:latest");

    let info = client.show_model("llama3").await.unwrap();
    assert_eq!(info["details"]["family"], "llama");

    assert!(matches!(
        client.show_model("ghost").await,
        Err(RelayError::ModelNotFound(_))
    ));
}

#[tokio::test]
async fn test_health_check_reports_reachability() {
    let mut server = mockito::Server::new_async().await;
    let _root = server
        .mock("GET", "/")
        .with_status(200)
        .with_body("Ollama is running")
        .create_async()
        .await;

    let client = OllamaClient::new(DaemonConfig::with_base_url(server.url())).unwrap();
    assert!(client.health_check().await);

    let unreachable = OllamaClient::new(DaemonConfig::with_base_url("http://127.0.0.1:1")).unwrap();
    assert!(!unreachable.health_check().await);
}
