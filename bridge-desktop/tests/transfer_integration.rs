//! Exercises `ReqwestFileTransfer` against a minimal local HTTP server that
//! honours `Range: bytes=N-` requests.

use bridge_desktop::ReqwestFileTransfer;
use bridge_traits::transfer::{FileTransfer, TransferProgress, TransferRequest};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const BODY: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Serves `BODY` to every connection, recording the range offsets requested.
async fn spawn_server() -> (String, Arc<Mutex<Vec<u64>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let offsets = Arc::new(Mutex::new(Vec::new()));
    let seen = offsets.clone();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let seen = seen.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = socket.read(&mut chunk).await.unwrap();
                    if n == 0 {
                        return;
                    }
                    buf.extend_from_slice(&chunk[..n]);
                }

                let head = String::from_utf8_lossy(&buf).to_ascii_lowercase();
                let offset = head
                    .lines()
                    .find_map(|l| l.strip_prefix("range: bytes="))
                    .and_then(|r| r.trim().trim_end_matches('-').parse::<u64>().ok())
                    .unwrap_or(0);
                seen.lock().unwrap().push(offset);

                let response = if offset == 0 {
                    let mut r = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        BODY.len()
                    )
                    .into_bytes();
                    r.extend_from_slice(BODY);
                    r
                } else if offset as usize >= BODY.len() {
                    format!(
                        "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                        BODY.len()
                    )
                    .into_bytes()
                } else {
                    let rest = &BODY[offset as usize..];
                    let mut r = format!(
                        "HTTP/1.1 206 Partial Content\r\nContent-Range: bytes {}-{}/{}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        offset,
                        BODY.len() - 1,
                        BODY.len(),
                        rest.len()
                    )
                    .into_bytes();
                    r.extend_from_slice(rest);
                    r
                };

                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    (format!("http://{}/audio.mp3", addr), offsets)
}

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("tilawa-transfer-{}-{}", name, std::process::id()))
}

fn recorder() -> (
    Arc<Mutex<Vec<TransferProgress>>>,
    bridge_traits::transfer::ProgressCallback,
) {
    let ticks = Arc::new(Mutex::new(Vec::new()));
    let sink = ticks.clone();
    (ticks, Arc::new(move |p| sink.lock().unwrap().push(p)))
}

#[tokio::test]
async fn downloads_whole_file_and_reports_progress() {
    let (url, offsets) = spawn_server().await;
    let dir = scratch("full");
    let dest = dir.join("chapter_1_recitor_7.mp3");
    let (ticks, on_progress) = recorder();

    let outcome = ReqwestFileTransfer::new()
        .download(TransferRequest::new(url, &dest), on_progress)
        .await
        .unwrap();

    assert_eq!(outcome.path, dest);
    assert_eq!(outcome.bytes_written, BODY.len() as u64);
    assert_eq!(outcome.resumed_from, 0);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), BODY);
    assert!(!ReqwestFileTransfer::partial_path(&dest).exists());
    assert_eq!(*offsets.lock().unwrap(), vec![0]);

    let ticks = ticks.lock().unwrap();
    let last = ticks.last().unwrap();
    assert_eq!(last.bytes_written, BODY.len() as u64);
    assert_eq!(last.total_bytes, Some(BODY.len() as u64));

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn resumes_from_existing_partial_file() {
    let (url, offsets) = spawn_server().await;
    let dir = scratch("resume");
    let dest = dir.join("chapter_2_recitor_7.mp3");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(ReqwestFileTransfer::partial_path(&dest), &BODY[..10])
        .await
        .unwrap();
    let (ticks, on_progress) = recorder();

    let outcome = ReqwestFileTransfer::new()
        .download(TransferRequest::new(url, &dest), on_progress)
        .await
        .unwrap();

    assert_eq!(outcome.resumed_from, 10);
    assert_eq!(outcome.bytes_written, BODY.len() as u64);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), BODY);
    assert_eq!(*offsets.lock().unwrap(), vec![10]);
    assert_eq!(
        ticks.lock().unwrap().first().map(|p| p.bytes_written),
        Some(10)
    );

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn fresh_request_ignores_partial_file() {
    let (url, offsets) = spawn_server().await;
    let dir = scratch("fresh");
    let dest = dir.join("verse_1_1.mp3");
    tokio::fs::create_dir_all(&dir).await.unwrap();
    tokio::fs::write(ReqwestFileTransfer::partial_path(&dest), b"garbage")
        .await
        .unwrap();
    let (_ticks, on_progress) = recorder();

    let outcome = ReqwestFileTransfer::new()
        .download(TransferRequest::new(url, &dest).fresh(), on_progress)
        .await
        .unwrap();

    assert_eq!(outcome.resumed_from, 0);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), BODY);
    assert_eq!(*offsets.lock().unwrap(), vec![0]);

    let _ = tokio::fs::remove_dir_all(&dir).await;
}

#[tokio::test]
async fn unreachable_server_is_an_error() {
    let dir = scratch("unreachable");
    let dest = dir.join("chapter_3_recitor_1.mp3");
    let (_ticks, on_progress) = recorder();

    let result = ReqwestFileTransfer::new()
        .download(
            TransferRequest::new("http://127.0.0.1:9/audio.mp3", &dest),
            on_progress,
        )
        .await;

    assert!(result.is_err());
    assert!(!dest.exists());

    let _ = tokio::fs::remove_dir_all(&dir).await;
}
