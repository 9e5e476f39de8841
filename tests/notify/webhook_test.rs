//! Webhook sink against a throwaway local HTTP listener.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use watchdog::error::NotifyError;
use watchdog::notify::webhook::WebhookNotifier;
use watchdog::notify::Notifier;

/// Accept one request, answer with `status_line`, and hand back the body.
async fn one_shot_server(status_line: &'static str) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let url = format!("http://{}/hook", listener.local_addr().expect("addr"));

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.expect("accept");
        let mut request = Vec::new();
        let mut buf = [0_u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.expect("read");
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if let Some(body) = complete_body(&request) {
                let response = format!("HTTP/1.1 {status_line}\r\ncontent-length: 0\r\n\r\n");
                socket
                    .write_all(response.as_bytes())
                    .await
                    .expect("write");
                return body;
            }
        }
        String::new()
    });

    (url, handle)
}

/// Body of `request` once headers and `content-length` bytes have arrived.
fn complete_body(request: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(request);
    let (head, body) = text.split_once("\r\n\r\n")?;
    let length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    (body.len() >= length).then(|| body.to_owned())
}

#[tokio::test]
async fn posts_json_text() {
    let (url, server) = one_shot_server("204 No Content").await;
    let notifier = WebhookNotifier::new(url).expect("client");

    notifier
        .publish("(nginx.service): service is down")
        .await
        .expect("publish");

    let body = server.await.expect("server task");
    let payload: serde_json::Value = serde_json::from_str(&body).expect("json body");
    assert_eq!(
        payload,
        serde_json::json!({ "text": "(nginx.service): service is down" })
    );
}

#[tokio::test]
async fn non_success_status_is_rejected() {
    let (url, server) = one_shot_server("500 Internal Server Error").await;
    let notifier = WebhookNotifier::new(url).expect("client");

    let result = notifier.publish("hello").await;

    assert!(matches!(result, Err(NotifyError::Rejected(_))));
    let _ = server.await;
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_error() {
    // Bind then drop to get a port nothing listens on.
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let notifier = WebhookNotifier::new(format!("http://{addr}/hook")).expect("client");
    let result = notifier.publish("hello").await;

    assert!(matches!(result, Err(NotifyError::Transport(_))));
}
