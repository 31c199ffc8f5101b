//! In-memory stand-ins for a WebSocket connection, used by the hub's unit
//! tests to drive sessions without a network.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Sink, Stream};
use tokio::sync::mpsc;

use super::session::ClientSession;
use super::HubConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkMode {
    Accept,
    Fail,
    /// Writes never complete; closing still does.
    Stall,
    /// Writes, flushes and closes all never complete.
    Hang,
}

#[derive(Default)]
struct SinkLog {
    frames: Vec<Message>,
    closes: usize,
    released: bool,
}

pub struct MockSink {
    log: Arc<Mutex<SinkLog>>,
    mode: Arc<Mutex<SinkMode>>,
}

impl Sink<Message> for MockSink {
    type Error = axum::Error;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        match *self.mode.lock().unwrap() {
            SinkMode::Accept => Poll::Ready(Ok(())),
            SinkMode::Fail => Poll::Ready(Err(axum::Error::new(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "broken pipe",
            )))),
            SinkMode::Stall | SinkMode::Hang => Poll::Pending,
        }
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        self.log.lock().unwrap().frames.push(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if *self.mode.lock().unwrap() == SinkMode::Hang {
            return Poll::Pending;
        }
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        if *self.mode.lock().unwrap() == SinkMode::Hang {
            return Poll::Pending;
        }
        self.log.lock().unwrap().closes += 1;
        Poll::Ready(Ok(()))
    }
}

impl Drop for MockSink {
    fn drop(&mut self) {
        if let Ok(mut log) = self.log.lock() {
            log.released = true;
        }
    }
}

pub struct MockStream {
    rx: mpsc::UnboundedReceiver<Result<Message, axum::Error>>,
}

impl Stream for MockStream {
    type Item = Result<Message, axum::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

/// The test's side of a mock connection.
pub struct MockConn {
    inbound: Option<mpsc::UnboundedSender<Result<Message, axum::Error>>>,
    log: Arc<Mutex<SinkLog>>,
    mode: Arc<Mutex<SinkMode>>,
}

impl MockConn {
    pub fn set_mode(&self, mode: SinkMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Text frames the session has written, in write order.
    pub fn texts(&self) -> Vec<String> {
        self.log
            .lock()
            .unwrap()
            .frames
            .iter()
            .filter_map(|m| match m {
                Message::Text(t) => Some(t.as_str().to_string()),
                _ => None,
            })
            .collect()
    }

    pub fn close_frames(&self) -> usize {
        self.log
            .lock()
            .unwrap()
            .frames
            .iter()
            .filter(|m| matches!(m, Message::Close(_)))
            .count()
    }

    pub fn closes(&self) -> usize {
        self.log.lock().unwrap().closes
    }

    /// Whether the session has dropped its write half, closing the socket.
    pub fn released(&self) -> bool {
        self.log.lock().unwrap().released
    }

    pub fn client_send(&self, msg: Message) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Ok(msg));
        }
    }

    pub fn fail_read(&self) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Err(axum::Error::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset",
            ))));
        }
    }

    /// Simulate the peer vanishing: the read half sees end of stream.
    pub fn disconnect(&mut self) {
        self.inbound.take();
    }
}

pub fn mock_session(
    user_id: impl Into<String>,
    capacity: usize,
) -> (ClientSession<MockSink, MockStream>, MockConn) {
    let (tx, rx) = mpsc::unbounded_channel();
    let log = Arc::new(Mutex::new(SinkLog::default()));
    let mode = Arc::new(Mutex::new(SinkMode::Accept));
    let sink = MockSink {
        log: log.clone(),
        mode: mode.clone(),
    };
    let session = ClientSession::new(user_id, sink, MockStream { rx }, capacity);
    let conn = MockConn {
        inbound: Some(tx),
        log,
        mode,
    };
    (session, conn)
}

/// Short timeouts so failure paths resolve quickly under test.
pub fn test_config() -> HubConfig {
    HubConfig {
        queue_capacity: 8,
        write_timeout: Duration::from_millis(100),
        shutdown_timeout: Duration::from_secs(2),
        ping_interval: Duration::from_secs(30),
        pong_wait: Duration::from_secs(30),
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(what: &str, check: F)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for: {what}");
}
