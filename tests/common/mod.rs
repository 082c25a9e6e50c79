//! Shared utilities for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use assessment_guard::config::BackendConfig;
use assessment_guard::notify::{AnalysisNotice, ChannelError, NotificationChannel, ProgressUpdate};
use assessment_guard::resilience::{HealthProbe, ProbeError, ProbeOutcome};

/// Start a programmable mock backend on an ephemeral port.
///
/// Every connection gets one response built from `f()`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;

                        let (status, body) = f().await;
                        let status_text = match status {
                            200 => "200 OK",
                            404 => "404 Not Found",
                            500 => "500 Internal Server Error",
                            503 => "503 Service Unavailable",
                            _ => "200 OK",
                        };

                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text,
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        // Drain what the client still sends so close does not reset the connection.
                        let mut rest = Vec::new();
                        let _ = tokio::time::timeout(Duration::from_millis(200), socket.read_to_end(&mut rest)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    addr
}

/// A mock backend that always answers with `status` and `body`.
pub async fn start_fixed_backend(status: u16, body: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (status, body.to_string()) }).await
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Backend config pointing at a local mock.
pub fn backend_config(addr: SocketAddr) -> BackendConfig {
    BackendConfig {
        base_url: format!("http://{}/api", addr),
        probe_timeout_secs: Some(5),
        ..BackendConfig::default()
    }
}

/// Probe that replays scripted outcomes, repeating the last one, and counts calls.
pub struct ScriptedProbe {
    script: Mutex<VecDeque<Result<ProbeOutcome, ProbeError>>>,
    last: Mutex<Result<ProbeOutcome, ProbeError>>,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub fn new(script: Vec<Result<ProbeOutcome, ProbeError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(Ok(ProbeOutcome::Healthy)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn always(outcome: ProbeOutcome) -> Arc<Self> {
        Self::new(vec![Ok(outcome)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthProbe for ScriptedProbe {
    async fn probe(&self) -> Result<ProbeOutcome, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => {
                *self.last.lock().unwrap() = result.clone();
                result
            }
            None => self.last.lock().unwrap().clone(),
        }
    }
}

/// Channel that records everything it is asked to send.
#[derive(Default)]
pub struct RecordingChannel {
    updates: Mutex<Vec<ProgressUpdate>>,
    notices: Mutex<Vec<AnalysisNotice>>,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn updates(&self) -> Vec<ProgressUpdate> {
        self.updates.lock().unwrap().clone()
    }

    pub fn notices(&self) -> Vec<AnalysisNotice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    async fn send_progress_update(&self, update: ProgressUpdate) -> Result<(), ChannelError> {
        self.updates.lock().unwrap().push(update);
        Ok(())
    }

    async fn send_analysis_notification(&self, notice: AnalysisNotice) -> Result<(), ChannelError> {
        self.notices.lock().unwrap().push(notice);
        Ok(())
    }
}

/// Channel whose transport is always down; counts every attempt.
#[derive(Default)]
pub struct FailingChannel {
    attempts: AtomicUsize,
}

impl FailingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationChannel for FailingChannel {
    async fn send_progress_update(&self, _update: ProgressUpdate) -> Result<(), ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ChannelError::Transport("down".into()))
    }

    async fn send_analysis_notification(&self, _notice: AnalysisNotice) -> Result<(), ChannelError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(ChannelError::Transport("down".into()))
    }
}

/// Let spawned tasks run without moving the paused clock.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
