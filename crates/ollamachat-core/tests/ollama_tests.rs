use std::time::Duration;

use ollamachat_core::*;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

// ========================================================================
// A one-shot HTTP/1.1 responder standing in for an Ollama server
// ========================================================================

struct Captured {
    request_line: String,
    body: Value,
}

enum Reply {
    Respond {
        status: &'static str,
        parts: Vec<&'static str>,
        hold_open: bool,
    },
    Hang,
}

async fn serve_once(reply: Reply) -> (String, JoinHandle<Captured>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let captured = read_request(&mut socket).await;
        match reply {
            Reply::Hang => tokio::time::sleep(Duration::from_secs(30)).await,
            Reply::Respond {
                status,
                parts,
                hold_open,
            } => {
                let head = format!(
                    "HTTP/1.1 {status}\r\nContent-Type: application/x-ndjson\r\nConnection: close\r\n\r\n"
                );
                let _ = socket.write_all(head.as_bytes()).await;
                for part in parts {
                    let _ = socket.write_all(part.as_bytes()).await;
                    let _ = socket.flush().await;
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                if hold_open {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
            }
        }
        captured
    });
    (format!("http://{addr}"), handle)
}

async fn read_request(socket: &mut TcpStream) -> Captured {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..pos]).to_string();
        let content_length = head
            .lines()
            .filter_map(|line| line.split_once(':'))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let body_start = pos + 4;
        if buf.len() >= body_start + content_length {
            let body = &buf[body_start..body_start + content_length];
            return Captured {
                request_line: head.lines().next().unwrap_or_default().to_string(),
                body: serde_json::from_slice(body).unwrap_or(Value::Null),
            };
        }
    }
    Captured {
        request_line: String::new(),
        body: Value::Null,
    }
}

fn client(base_url: &str) -> OllamaClient {
    OllamaClient::new(base_url, Duration::from_secs(5)).unwrap()
}

async fn query(
    client: &OllamaClient,
    cancel: CancellationToken,
) -> (
    std::result::Result<StreamEnd, ProviderError>,
    Vec<StreamChunk>,
) {
    let mut chunks = Vec::new();
    let mut on_chunk = |chunk: StreamChunk| chunks.push(chunk);
    let result = client
        .stream_query(
            cancel,
            "llama3.2:latest",
            "You are a helpful assistant.\n\nuser: Hello\nassistant:",
            QueryOptions::default(),
            &mut on_chunk,
        )
        .await;
    (result, chunks)
}

// ========================================================================
// Streaming
// ========================================================================

#[tokio::test]
async fn test_streams_frames_split_across_packets() {
    let (url, server) = serve_once(Reply::Respond {
        status: "200 OK",
        parts: vec![
            "{\"response\":\"Hi\",\"done\":false}\n{\"resp",
            "onse\":\" there\",\"done\":false}\n",
            "{\"response\":\"\",\"done\":true}\n",
        ],
        hold_open: false,
    })
    .await;

    let (result, chunks) = query(&client(&url), CancellationToken::new()).await;
    assert_eq!(result.unwrap(), StreamEnd::Completed);
    assert_eq!(
        chunks,
        vec![
            StreamChunk {
                text: "Hi".to_string(),
                is_new_turn: true
            },
            StreamChunk {
                text: " there".to_string(),
                is_new_turn: false
            },
        ]
    );

    let captured = server.await.unwrap();
    assert_eq!(captured.request_line, "POST /api/generate HTTP/1.1");
    assert_eq!(captured.body["model"], "llama3.2:latest");
    assert_eq!(captured.body["stream"], true);
    assert_eq!(captured.body["options"]["temperature"], 0.7);
    assert_eq!(captured.body["options"]["num_predict"], 2048);
    assert!(captured.body["prompt"]
        .as_str()
        .unwrap()
        .ends_with("user: Hello\nassistant:"));
}

#[tokio::test]
async fn test_trailing_slash_in_base_url() {
    let (url, server) = serve_once(Reply::Respond {
        status: "200 OK",
        parts: vec!["{\"response\":\"ok\",\"done\":true}\n"],
        hold_open: false,
    })
    .await;

    let (result, _) = query(&client(&format!("{url}/")), CancellationToken::new()).await;
    assert_eq!(result.unwrap(), StreamEnd::Completed);
    assert_eq!(
        server.await.unwrap().request_line,
        "POST /api/generate HTTP/1.1"
    );
}

#[tokio::test]
async fn test_error_frame_is_remote_error() {
    let (url, _server) = serve_once(Reply::Respond {
        status: "200 OK",
        parts: vec![
            "{\"response\":\"Hi\",\"done\":false}\n",
            "{\"error\":\"out of memory\"}\n",
        ],
        hold_open: false,
    })
    .await;

    let (result, chunks) = query(&client(&url), CancellationToken::new()).await;
    match result {
        Err(ProviderError::Remote(message)) => assert_eq!(message, "out of memory"),
        other => panic!("expected remote error, got {other:?}"),
    }
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "Hi");
}

#[tokio::test]
async fn test_eof_before_done_is_protocol_error() {
    let (url, _server) = serve_once(Reply::Respond {
        status: "200 OK",
        parts: vec!["{\"response\":\"Hi\",\"done\":false}\n"],
        hold_open: false,
    })
    .await;

    let (result, chunks) = query(&client(&url), CancellationToken::new()).await;
    assert!(matches!(result, Err(ProviderError::Protocol(_))));
    assert_eq!(chunks.len(), 1);
}

#[tokio::test]
async fn test_unterminated_final_frame_accepted() {
    let (url, _server) = serve_once(Reply::Respond {
        status: "200 OK",
        parts: vec!["{\"response\":\"A\",\"done\":false}\n{\"response\":\"B\",\"done\":true}"],
        hold_open: false,
    })
    .await;

    let (result, chunks) = query(&client(&url), CancellationToken::new()).await;
    assert_eq!(result.unwrap(), StreamEnd::Completed);
    let text: String = chunks.iter().map(|c| c.text.as_str()).collect();
    assert_eq!(text, "AB");
}

#[tokio::test]
async fn test_malformed_frame_is_protocol_error() {
    let (url, _server) = serve_once(Reply::Respond {
        status: "200 OK",
        parts: vec!["this is not json\n"],
        hold_open: false,
    })
    .await;

    let (result, chunks) = query(&client(&url), CancellationToken::new()).await;
    assert!(matches!(result, Err(ProviderError::Protocol(_))));
    assert!(chunks.is_empty());
}

// ========================================================================
// Failures
// ========================================================================

#[tokio::test]
async fn test_non_success_status_is_rejected() {
    let (url, _server) = serve_once(Reply::Respond {
        status: "404 Not Found",
        parts: vec!["{\"error\":\"model 'nope' not found\"}"],
        hold_open: false,
    })
    .await;

    let (result, chunks) = query(&client(&url), CancellationToken::new()).await;
    match result {
        Err(ProviderError::Rejected { status, body }) => {
            assert_eq!(status, 404);
            assert!(body.contains("not found"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(chunks.is_empty());
}

#[tokio::test]
async fn test_connection_refused_is_unreachable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (result, _) = query(&client(&format!("http://{addr}")), CancellationToken::new()).await;
    assert!(matches!(result, Err(ProviderError::Unreachable(_))));
}

#[tokio::test]
async fn test_request_timeout() {
    let (url, server) = serve_once(Reply::Hang).await;
    let client = OllamaClient::new(&url, Duration::from_millis(200)).unwrap();

    let (result, _) = query(&client, CancellationToken::new()).await;
    assert!(matches!(result, Err(ProviderError::Timeout)));
    server.abort();
}

// ========================================================================
// Cancellation
// ========================================================================

#[tokio::test]
async fn test_cancel_mid_stream_stops_delivery() {
    let (url, server) = serve_once(Reply::Respond {
        status: "200 OK",
        parts: vec!["{\"response\":\"partial\",\"done\":false}\n"],
        hold_open: true,
    })
    .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    let mut chunks = Vec::new();
    let mut on_chunk = |chunk: StreamChunk| {
        chunks.push(chunk);
        trigger.cancel();
    };
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        client(&url).stream_query(
            cancel,
            "llama3.2:latest",
            "prompt",
            QueryOptions::default(),
            &mut on_chunk,
        ),
    )
    .await
    .expect("cancellation should end the stream promptly");

    assert_eq!(result.unwrap(), StreamEnd::Cancelled);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "partial");
    server.abort();
}

#[tokio::test]
async fn test_cancel_before_send() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let (result, chunks) = query(&client("http://127.0.0.1:9"), cancel).await;
    assert_eq!(result.unwrap(), StreamEnd::Cancelled);
    assert!(chunks.is_empty());
}

// ========================================================================
// Models
// ========================================================================

#[tokio::test]
async fn test_list_models() {
    let (url, server) = serve_once(Reply::Respond {
        status: "200 OK",
        parts: vec![r#"{"models":[{"name":"llama3.2:latest","size":2019393189},{"name":"mistral:7b"}]}"#],
        hold_open: false,
    })
    .await;

    let models = client(&url).list_models().await.unwrap();
    assert_eq!(
        models,
        vec![
            ModelInfo {
                name: "llama3.2:latest".to_string(),
                description: Some("Ollama model: llama3.2:latest".to_string()),
            },
            ModelInfo {
                name: "mistral:7b".to_string(),
                description: Some("Ollama model: mistral:7b".to_string()),
            },
        ]
    );
    assert_eq!(
        server.await.unwrap().request_line,
        "GET /api/tags HTTP/1.1"
    );
}

#[tokio::test]
async fn test_health_check() {
    let (url, _server) = serve_once(Reply::Respond {
        status: "200 OK",
        parts: vec![r#"{"models":[]}"#],
        hold_open: false,
    })
    .await;
    client(&url).check_health().await.unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    assert!(client(&format!("http://{addr}")).check_health().await.is_err());
}
