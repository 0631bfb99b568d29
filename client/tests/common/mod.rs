//! Scripted in-process controller for session tests.
//!
//! Implements `ControllerChannel`/`ControllerConnector` without a network:
//! register pops scripted session tokens, ping pops scripted responses
//! (defaulting to healthy), and the command stream is a channel pair the
//! test drives directly.

use async_trait::async_trait;
use elchi_core::transport::{CommandStream, ControllerChannel, ControllerConnector};
use elchi_core::Result;
use elchi_proto::{
    Command, CommandResponse, PingRequest, PingResponse, RegisterRequest, RegisterResponse,
    UnregisterRequest, UnregisterResponse,
};
use futures::StreamExt;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify};
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

pub struct FakeController {
    tokens: Mutex<VecDeque<String>>,
    pub registers: AtomicUsize,
    pub unregisters: AtomicUsize,
    ping_script: Mutex<VecDeque<PingResponse>>,
    inbound: Mutex<Option<mpsc::Sender<Result<Command>>>>,
    sent: Mutex<Vec<CommandResponse>>,
    frame_notify: Notify,
}

impl FakeController {
    pub fn new(tokens: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            tokens: Mutex::new(tokens.iter().map(|t| t.to_string()).collect()),
            registers: AtomicUsize::new(0),
            unregisters: AtomicUsize::new(0),
            ping_script: Mutex::new(VecDeque::new()),
            inbound: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            frame_notify: Notify::new(),
        })
    }

    /// Queue a scripted ping response; once drained, pings are healthy.
    pub async fn script_ping(&self, response: PingResponse) {
        self.ping_script.lock().await.push_back(response);
    }

    /// The canned "client is not registered" answer.
    pub fn not_registered() -> PingResponse {
        PingResponse {
            success: false,
            registered: false,
            error: "client is not registered".into(),
        }
    }

    /// Push a command down the active stream.
    pub async fn send_command(&self, command: Command) {
        let sender = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(sender) = self.inbound.lock().await.clone() {
                    return sender;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("no command stream opened");
        sender.send(Ok(command)).await.expect("stream receiver gone");
    }

    /// Block until the client has sent `n` frames, returning them all.
    pub async fn wait_for_frames(&self, n: usize) -> Vec<CommandResponse> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                {
                    let sent = self.sent.lock().await;
                    if sent.len() >= n {
                        return sent.clone();
                    }
                }
                let _ = tokio::time::timeout(
                    Duration::from_millis(50),
                    self.frame_notify.notified(),
                )
                .await;
            }
        })
        .await
        .expect("timed out waiting for frames")
    }

    /// Block until the client registered `n` times.
    pub async fn wait_for_registers(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.registers.load(Ordering::SeqCst) < n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for registers");
    }
}

pub struct FakeChannel {
    controller: Arc<FakeController>,
    closed: CancellationToken,
}

#[async_trait]
impl ControllerChannel for FakeChannel {
    async fn register(&self, _request: RegisterRequest) -> Result<RegisterResponse> {
        self.controller.registers.fetch_add(1, Ordering::SeqCst);
        let token = self.controller.tokens.lock().await.pop_front();
        Ok(match token {
            Some(session_token) => RegisterResponse {
                success: true,
                session_token,
                error: String::new(),
            },
            None => RegisterResponse {
                success: false,
                session_token: String::new(),
                error: "registration rejected".into(),
            },
        })
    }

    async fn unregister(&self, _request: UnregisterRequest) -> Result<UnregisterResponse> {
        self.controller.unregisters.fetch_add(1, Ordering::SeqCst);
        Ok(UnregisterResponse {
            success: true,
            error: String::new(),
        })
    }

    async fn ping(&self, _request: PingRequest) -> Result<PingResponse> {
        let scripted = self.controller.ping_script.lock().await.pop_front();
        Ok(scripted.unwrap_or(PingResponse {
            success: true,
            registered: true,
            error: String::new(),
        }))
    }

    async fn open_command_stream(
        &self,
        mut outbound: mpsc::Receiver<CommandResponse>,
    ) -> Result<CommandStream> {
        let (command_tx, command_rx) = mpsc::channel(16);
        *self.controller.inbound.lock().await = Some(command_tx);

        let controller = self.controller.clone();
        tokio::spawn(async move {
            while let Some(frame) = outbound.recv().await {
                controller.sent.lock().await.push(frame);
                controller.frame_notify.notify_waiters();
            }
        });

        let stream = ReceiverStream::new(command_rx)
            .take_until(self.closed.clone().cancelled_owned());
        Ok(Box::pin(stream))
    }

    async fn close(&self) {
        self.closed.cancel();
        *self.controller.inbound.lock().await = None;
    }
}

pub struct FakeConnector {
    controller: Arc<FakeController>,
}

impl FakeConnector {
    pub fn new(controller: Arc<FakeController>) -> Arc<Self> {
        Arc::new(Self { controller })
    }
}

#[async_trait]
impl ControllerConnector for FakeConnector {
    async fn connect(&self) -> Result<Arc<dyn ControllerChannel>> {
        Ok(Arc::new(FakeChannel {
            controller: self.controller.clone(),
            closed: CancellationToken::new(),
        }))
    }
}
