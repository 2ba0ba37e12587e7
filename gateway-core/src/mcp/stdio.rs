//! Stdio MCP upstream: a long-lived child process speaking line-delimited
//! JSON-RPC over stdin/stdout. One background task reads response lines and
//! correlates them to pending calls by `id`; a crashed child is respawned
//! according to its [`RestartPolicy`].

use crate::error::McpError;
use crate::mcp::jsonrpc::{JsonRpcRequest, JsonRpcResponse};
use crate::mcp::{McpUpstreamClient, RestartPolicy};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::time::Duration;

#[derive(Debug, Clone)]
pub struct StdioConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Overlaid on top of the parent process's environment, not a
    /// replacement for it — the child always inherits `PATH` and friends.
    pub env: HashMap<String, String>,
    pub restart_policy: RestartPolicy,
    pub call_timeout: Duration,
}

type PendingMap = Arc<Mutex<HashMap<String, oneshot::Sender<JsonRpcResponse>>>>;

struct Session {
    child: Child,
    stdin: tokio::process::ChildStdin,
}

pub struct StdioUpstream {
    config: StdioConfig,
    pending: PendingMap,
    session: Mutex<Session>,
}

impl StdioUpstream {
    pub async fn spawn(config: StdioConfig) -> Result<Self, McpError> {
        let pending = Arc::new(Mutex::new(HashMap::new()));
        let session = spawn_session(&config, pending.clone()).await?;
        Ok(Self {
            config,
            pending,
            session: Mutex::new(session),
        })
    }

    async fn restart_if_needed(&self, clean_exit: bool) {
        if !self.config.restart_policy.should_restart(clean_exit) {
            return;
        }
        if let Ok(new_session) = spawn_session(&self.config, self.pending.clone()).await {
            *self.session.lock().await = new_session;
        }
    }

    /// Graceful shutdown: send a JSON-RPC `exit` notification, wait briefly
    /// for the child to leave on its own, then SIGKILL it.
    pub async fn close(&self) {
        let mut session = self.session.lock().await;
        let notification = JsonRpcRequest::new(serde_json::Value::Null, "exit", None);
        if let Ok(mut line) = serde_json::to_vec(&notification) {
            line.push(b'\n');
            let _ = session.stdin.write_all(&line).await;
            let _ = session.stdin.flush().await;
        }
        match tokio::time::timeout(Duration::from_secs(2), session.child.wait()).await {
            Ok(_) => {}
            Err(_) => {
                let _ = session.child.start_kill();
            }
        }
    }
}

async fn spawn_session(config: &StdioConfig, pending: PendingMap) -> Result<Session, McpError> {
    let mut command = Command::new(&config.command);
    command
        .args(&config.args)
        .envs(std::env::vars())
        .envs(config.env.clone())
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::null())
        .kill_on_drop(true);

    let mut child = command.spawn().map_err(|source| McpError::Spawn {
        name: config.name.clone(),
        source,
    })?;

    let stdin = child.stdin.take().ok_or_else(|| {
        McpError::Framing(format!("upstream '{}' has no stdin handle", config.name))
    })?;
    let stdout = child.stdout.take().ok_or_else(|| {
        McpError::Framing(format!("upstream '{}' has no stdout handle", config.name))
    })?;

    let upstream_name = config.name.clone();
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<JsonRpcResponse>(&line) {
                        Ok(response) => {
                            let key = response.id.to_string();
                            if let Some(sender) = pending.lock().await.remove(&key) {
                                let _ = sender.send(response);
                            }
                        }
                        Err(error) => {
                            tracing::warn!(upstream = %upstream_name, %error, "malformed mcp response line");
                        }
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    tracing::warn!(upstream = %upstream_name, %error, "mcp stdout read error");
                    break;
                }
            }
        }
    });

    Ok(Session { child, stdin })
}

#[async_trait]
impl McpUpstreamClient for StdioUpstream {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn close(&self) {
        StdioUpstream::close(self).await;
    }

    async fn call(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse, McpError> {
        let key = request.id.to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(key.clone(), tx);

        let mut line = serde_json::to_vec(&request)?;
        line.push(b'\n');

        {
            let mut session = self.session.lock().await;
            if let Ok(Some(status)) = session.child.try_wait() {
                self.pending.lock().await.remove(&key);
                self.restart_if_needed(status.success()).await;
                return Err(McpError::Unavailable(self.config.name.clone()));
            }
            session.stdin.write_all(&line).await?;
            session.stdin.flush().await?;
        }

        match tokio::time::timeout(self.config.call_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(McpError::Unavailable(self.config.name.clone())),
            Err(_) => {
                self.pending.lock().await.remove(&key);
                Err(McpError::Timeout(request.id))
            }
        }
    }
}
