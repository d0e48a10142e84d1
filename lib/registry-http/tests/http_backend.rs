//! HttpBackend against a canned HTTP responder

use registry_api::{AllowListQuery, NewAllowListEntry};
use registry_core::{
    AllowListStore, PeerRegistry, RegistryBackend, RegistryError, StatusSource,
};
use registry_http::HttpBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Serve one canned response per connection, in order, and hand back the raw
/// requests that were received.
async fn serve(responses: Vec<(u16, &'static str)>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for (status, body) in responses {
            let (mut stream, _) = listener.accept().await.unwrap();
            seen.push(read_request(&mut stream).await);

            let response = format!(
                "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                reason(status),
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        }
        seen
    });

    (base_url, handle)
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        404 => "Not Found",
        409 => "Conflict",
        422 => "Unprocessable Entity",
        _ => "Error",
    }
}

async fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);

        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
        let content_length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|v| v.trim().parse::<usize>().ok());

        match content_length {
            Some(len) if buf.len() >= end + 4 + len => break,
            Some(_) => continue,
            None if head.contains("transfer-encoding: chunked") => {
                if buf.ends_with(b"0\r\n\r\n") {
                    break;
                }
            }
            None => break,
        }
    }

    String::from_utf8_lossy(&buf).into_owned()
}

fn backend(base_url: &str) -> Arc<HttpBackend> {
    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    Arc::new(HttpBackend::with_client(base_url, client))
}

#[tokio::test]
async fn test_list_allow_list_with_filters() {
    let (url, server) = serve(vec![(200, r#"{"data":[{"id":3,"ip_addr":"192.168.1.5"}]}"#)]).await;

    let query = AllowListQuery {
        ip_addr: Some("192.168".to_string()),
        id: None,
    };
    let entries = backend(&url).list_allow_list(&query).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, 3);

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("GET /whitelist?ip_addr=192.168 HTTP/1.1"));
}

#[tokio::test]
async fn test_create_sends_json_array() {
    let (url, server) = serve(vec![(200, r#"{"items":[{"id":9,"ip_addr":"10.0.0.9"}]}"#)]).await;

    let created = backend(&url)
        .create_allow_list(&[NewAllowListEntry::new("10.0.0.9")])
        .await
        .unwrap();
    assert_eq!(created[0].id, Some(9));

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("POST /whitelist HTTP/1.1"));
    assert!(requests[0].contains(r#"[{"ip_addr":"10.0.0.9"}]"#));
}

#[tokio::test]
async fn test_import_is_multipart_file_field() {
    let (url, server) = serve(vec![(
        200,
        r#"{"items":[{"id":1,"ip_addr":"10.0.0.1"},{"id":null,"ip_addr":"10.0.0.1"}]}"#,
    )])
    .await;

    let created = backend(&url)
        .import_allow_list("ips.csv", b"10.0.0.1\n10.0.0.1\n".to_vec())
        .await
        .unwrap();
    assert_eq!(created.len(), 2);

    let requests = server.await.unwrap();
    let request = &requests[0];
    assert!(request.starts_with("POST /whitelist_file HTTP/1.1"));
    assert!(request.to_lowercase().contains("content-type: multipart/form-data"));
    assert!(request.contains(r#"name="file"; filename="ips.csv""#));
}

#[tokio::test]
async fn test_delete_missing_entry_is_not_found() {
    let (url, server) = serve(vec![(404, r#"{"detail":"Record 7 not found"}"#)]).await;

    let err = backend(&url).delete_allow_list(7).await.unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(ref body) if body.contains("Record 7")));

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("DELETE /whitelist/7 HTTP/1.1"));
}

#[tokio::test]
async fn test_delete_checks_status_body() {
    let (url, server) = serve(vec![
        (200, r#"{"status":"success"}"#),
        (200, r#"{"status":"error"}"#),
    ])
    .await;
    let backend = backend(&url);

    backend.delete_allow_list(4).await.unwrap();
    let err = backend.delete_allow_list(5).await.unwrap_err();
    assert!(matches!(err, RegistryError::Rejected { status: 200, .. }));

    let requests = server.await.unwrap();
    assert!(requests[1].starts_with("DELETE /whitelist/5 HTTP/1.1"));
}

#[tokio::test]
async fn test_peer_endpoints_encode_query() {
    let (url, server) = serve(vec![
        (200, r#"{"status":"ok"}"#),
        (200, r#"{"status":"ok"}"#),
    ])
    .await;
    let backend = backend(&url);

    backend.set_not_removable("client 1").await.unwrap();
    backend.remove_peer("ab+c/d=").await.unwrap();

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("PUT /wireguard_config_not_removed_flg?config_name=client+1 "));
    assert!(requests[1].starts_with("DELETE /wireguard_config_remove?pub_key=ab%2Bc%2Fd%3D "));
}

#[tokio::test]
async fn test_blank_status() {
    let (url, server) = serve(vec![(
        200,
        r#"{"clients":[{"name":"client_x","pub_key":"fob=","allowed_ips":"10.9.0.2/32","latest_handshake":0,"rx":0,"tx":0,"last_seen":"never","is_online":false,"latest_handshake_dt":""}]}"#,
    )])
    .await;

    let peers = backend(&url).peer_status(StatusSource::Blank).await.unwrap();
    assert_eq!(peers[0].name, "client_x");
    assert!(!peers[0].used);

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("GET /wireguard_user_status_blank HTTP/1.1"));
}

#[tokio::test]
async fn test_unprocessable_is_validation() {
    let (url, server) = serve(vec![(422, r#"{"detail":"bad ip"}"#)]).await;
    let err = backend(&url)
        .create_allow_list(&[NewAllowListEntry::new("x")])
        .await
        .unwrap_err();
    assert!(matches!(err, RegistryError::Validation(_)));
    server.await.unwrap();
}

#[tokio::test]
async fn test_undecodable_body_is_unavailable() {
    let (url, server) = serve(vec![(200, "<html>maintenance</html>")]).await;
    let err = backend(&url).peer_status(StatusSource::Live).await.unwrap_err();
    assert!(matches!(err, RegistryError::Unavailable(_)));
    server.await.unwrap();
}

#[tokio::test]
async fn test_unreachable_backend_is_unavailable() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let store = AllowListStore::new(backend(&url));
    assert!(matches!(store.list().await, Err(RegistryError::Unavailable(_))));
}

#[tokio::test]
async fn test_registry_refreshes_after_protect() {
    let (url, server) = serve(vec![
        (200, r#"{"clients":[{"name":"client_1","pub_key":"abc","used":false}]}"#),
        (200, r#"{"status":"ok"}"#),
        (200, r#"{"clients":[{"name":"client_1","pub_key":"abc","used":true}]}"#),
    ])
    .await;

    let registry = PeerRegistry::new(backend(&url));
    registry.refresh().await.unwrap();
    registry.set_protected("client_1").await.unwrap();
    assert!(registry.get("abc").await.unwrap().used);

    let requests = server.await.unwrap();
    assert_eq!(requests.len(), 3);
    assert!(requests[2].starts_with("GET /wireguard_user_status HTTP/1.1"));
}
