//! Tests for `DebugChannel`.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use super::DebugChannel;

#[tokio::test]
async fn inner_write_reaches_outer() {
  let ch = DebugChannel::new(1024);
  ch.inner().write(b"prompt> ").await.unwrap();
  let mut buf = [0u8; 32];
  let n = ch.outer().read(&mut buf).await.unwrap();
  assert_eq!(&buf[..n], b"prompt> ");
  assert_eq!(ch.error_count().await, 0);
}

#[tokio::test]
async fn outer_line_reaches_inner() {
  let ch = DebugChannel::new(1024);
  ch.outer().write(b"yes\r\n").await.unwrap();
  assert_eq!(ch.inner().read_line().await.unwrap(), "yes");
}

#[tokio::test]
async fn writes_larger_than_pipe_are_chunked() {
  let ch = std::sync::Arc::new(DebugChannel::new(16));
  let payload: Vec<u8> = (0..200u8).collect();
  let reader = {
    let ch = ch.clone();
    tokio::spawn(async move {
      let mut got = Vec::new();
      let mut buf = [0u8; 8];
      while got.len() < 200 {
        let n = ch.outer().read(&mut buf).await.unwrap();
        assert!(n > 0);
        got.extend_from_slice(&buf[..n]);
      }
      got
    })
  };
  ch.inner().write(&payload).await.unwrap();
  assert_eq!(reader.await.unwrap(), payload);
}

#[tokio::test]
async fn close_gives_eof_to_readers() {
  let ch = DebugChannel::default();
  ch.close().await;
  let mut buf = [0u8; 4];
  assert_eq!(ch.outer().read(&mut buf).await.unwrap(), 0);
  assert_eq!(ch.inner().read(&mut buf).await.unwrap(), 0);
  assert!(ch.inner().read_line().await.is_err());
  ch.close().await;
}

#[tokio::test]
async fn write_after_close_is_an_error() {
  let ch = DebugChannel::new(64);
  ch.close().await;
  assert!(ch.outer().write(b"x").await.is_err());
}

#[tokio::test]
async fn close_releases_a_write_blocked_on_an_unread_side() {
  let ch = Arc::new(DebugChannel::new(16));
  let writer = {
    let ch = ch.clone();
    tokio::spawn(async move { ch.inner().write(&[b'x'; 100]).await })
  };
  tokio::time::sleep(Duration::from_millis(50)).await;
  assert!(!writer.is_finished());

  tokio::time::timeout(Duration::from_secs(2), ch.close())
    .await
    .expect("close does not wait on the blocked relay");
  let err = tokio::time::timeout(Duration::from_secs(2), writer)
    .await
    .expect("write released")
    .unwrap()
    .unwrap_err();
  assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
}

#[tokio::test]
async fn dropping_a_blocked_write_frees_the_channel() {
  let ch = DebugChannel::new(16);
  let blocked = tokio::time::timeout(Duration::from_millis(50), ch.inner().write(&[b'x'; 100])).await;
  assert!(blocked.is_err());
  ch.outer().write(b"ok\n").await.unwrap();
  assert_eq!(ch.inner().read_line().await.unwrap(), "ok");
}
