// tests/compression.rs
// =============================================================================
// Compression detection through the real page fetcher and HEAD probes,
// against a throwaway HTTP/1.1 server on 127.0.0.1. The server only gzips
// when the request asks for it, the way real servers behave.
// =============================================================================

use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use seo_audit::capability::Capabilities;
use seo_audit::findings::FindingKey;
use seo_audit::{AuditOptions, Auditor, Report};

/// (method, path, Accept-Encoding) of every request the server saw.
type RequestLog = Arc<Mutex<Vec<(String, String, Option<String>)>>>;

fn page_html() -> String {
    let text = "Compression keeps pages small on slow connections. ".repeat(40);
    format!(
        r#"<html lang="en"><head><title>Compressed page</title></head>
        <body><h1>Hello</h1><p>{}</p><img src="/logo.png" alt="logo"></body></html>"#,
        text
    )
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

async fn serve(gzip_when_asked: bool) -> (SocketAddr, RequestLog) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let log: RequestLog = Arc::new(Mutex::new(Vec::new()));

    let requests = log.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let requests = requests.clone();
            tokio::spawn(handle(stream, gzip_when_asked, requests));
        }
    });

    (addr, log)
}

async fn handle(mut stream: TcpStream, gzip_when_asked: bool, log: RequestLog) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    let head = String::from_utf8_lossy(&buf).into_owned();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap_or_default().split_whitespace();
    let method = request_line.next().unwrap_or_default().to_string();
    let path = request_line.next().unwrap_or_default().to_string();
    let accept_encoding = lines.find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("accept-encoding")
            .then(|| value.trim().to_string())
    });
    let wants_gzip = accept_encoding.as_deref().is_some_and(|v| v.contains("gzip"));
    log.lock().unwrap().push((method.clone(), path.clone(), accept_encoding));

    let (content_type, plain) = if path == "/" {
        ("text/html; charset=utf-8", page_html().into_bytes())
    } else {
        ("image/png", vec![0x89, b'P', b'N', b'G', 0, 0, 0, 0])
    };
    let compress = gzip_when_asked && wants_gzip;
    let body = if compress { gzip(&plain) } else { plain };

    let mut response = format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nCache-Control: max-age=60\r\n",
        content_type,
        body.len()
    );
    if compress {
        response.push_str("Content-Encoding: gzip\r\n");
    }
    response.push_str("Connection: close\r\n\r\n");

    let mut bytes = response.into_bytes();
    if method != "HEAD" {
        bytes.extend_from_slice(&body);
    }
    let _ = stream.write_all(&bytes).await;
    let _ = stream.shutdown().await;
}

async fn audit(addr: SocketAddr) -> Report {
    Auditor::new(AuditOptions::new(), Capabilities::none())
        .unwrap()
        .with_checks(Vec::new())
        .run(&format!("http://{}/", addr))
        .await
        .unwrap()
}

#[tokio::test]
async fn test_gzip_server_is_not_flagged() {
    let (addr, log) = serve(true).await;
    let report = audit(addr).await;

    assert_eq!(report.snapshot.header("content-encoding"), Some("gzip"));
    assert!(!report.findings.contains(FindingKey::CompressionMissing));

    // The body was decoded before parsing
    assert_eq!(report.snapshot.page.title.as_deref(), Some("Compressed page"));
    let performance = &report.snapshot.performance;
    assert!(performance.transfer_bytes < performance.page_bytes);

    // The HEAD probe asked for compression too and saw the header
    let logo = &report.snapshot.resources[0].result;
    assert!(logo.url.ends_with("/logo.png"));
    assert_eq!(logo.content_encoding.as_deref(), Some("gzip"));

    let requests = log.lock().unwrap();
    assert!(requests.iter().any(|(method, _, _)| method == "HEAD"));
    assert!(requests
        .iter()
        .all(|(_, _, accept)| accept.as_deref().is_some_and(|v| v.contains("gzip"))));
}

#[tokio::test]
async fn test_uncompressed_server_is_flagged() {
    let (addr, _log) = serve(false).await;
    let report = audit(addr).await;

    assert_eq!(report.snapshot.header("content-encoding"), None);
    assert!(report.findings.contains(FindingKey::CompressionMissing));
    assert_eq!(report.snapshot.page.title.as_deref(), Some("Compressed page"));
    let performance = &report.snapshot.performance;
    assert_eq!(performance.transfer_bytes, performance.page_bytes);
}
