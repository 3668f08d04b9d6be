use anyhow::Context;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

use super::Usage;
use crate::config::{Config, PollConfig};

const PROMPT_PRICE_PER_M: f64 = 0.15;
const COMPLETION_PRICE_PER_M: f64 = 0.60;
pub const UNSUPPORTED_CONTENT: &str = "Oops! I am unable to process the content of this message.";

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("run was cancelled by the user")]
    Cancelled { thread_id: String },
    #[error("run {run_id} still {status} after {attempts} polls ({elapsed:?})")]
    TimedOut {
        thread_id: String,
        run_id: String,
        status: String,
        attempts: usize,
        elapsed: Duration,
    },
    #[error(transparent)]
    Remote(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Run {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub usage: Option<Usage>,
}

impl Run {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "completed" | "failed" | "expired" | "cancelled")
    }

    /// Still making progress on the remote side.
    pub fn is_pending(&self) -> bool {
        matches!(self.status.as_str(), "queued" | "in_progress" | "cancelling")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThreadMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text { text: TextContent },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextContent {
    pub value: String,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Annotation {
    /// The literal span in `value` the annotation covers, e.g. `【4:0†source】`.
    #[serde(default)]
    pub text: String,
}

/// Reply text with every citation annotation removed. When a message has
/// several blocks the last one wins.
pub fn extract_reply(message: &ThreadMessage) -> String {
    let mut reply = String::new();
    for block in &message.content {
        reply = match block {
            ContentBlock::Text { text } => text
                .annotations
                .iter()
                .filter(|a| !a.text.is_empty())
                .fold(text.value.clone(), |acc, a| acc.replace(&a.text, "")),
            ContentBlock::Unsupported => UNSUPPORTED_CONTENT.to_string(),
        };
    }
    reply
}

/// Estimated USD cost of a completed run.
pub fn estimate_cost(usage: &Usage) -> f64 {
    PROMPT_PRICE_PER_M * usage.prompt_tokens as f64 / 1_000_000.0
        + COMPLETION_PRICE_PER_M * usage.completion_tokens as f64 / 1_000_000.0
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: usize,
    pub timeout: Duration,
}

impl From<&PollConfig> for PollPolicy {
    fn from(config: &PollConfig) -> Self {
        Self {
            interval: config.interval(),
            max_attempts: config.max_attempts.max(1),
            timeout: config.timeout(),
        }
    }
}

/// Receiving side of a cancellation flag. A dropped sender never cancels.
#[derive(Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    pub fn new() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self(rx))
    }

    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    pub async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    /// Reply text, or the run status when the run did not complete.
    pub text: String,
    pub status: String,
    pub cost_usd: f64,
    /// Pass back in to continue the conversation.
    pub thread_id: String,
}

/// Remote operations the runner needs.
#[allow(async_fn_in_trait)]
pub trait AssistantApi {
    async fn create_thread(&self) -> anyhow::Result<String>;
    async fn add_message(&self, thread_id: &str, prompt: &str) -> anyhow::Result<()>;
    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> anyhow::Result<Run>;
    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> anyhow::Result<Run>;
    async fn latest_message(&self, thread_id: &str) -> anyhow::Result<ThreadMessage>;
    /// Stop a run so the thread accepts new messages again.
    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> anyhow::Result<()>;
}

async fn abandon_run<A: AssistantApi>(api: &A, thread_id: &str, run_id: &str) {
    match api.cancel_run(thread_id, run_id).await {
        Ok(()) => tracing::info!("Cancelled run {} on thread {}", run_id, thread_id),
        Err(e) => tracing::warn!("Failed to cancel run {} on thread {}: {}", run_id, thread_id, e),
    }
}

/// Send `prompt` to the assistant and wait for its reply.
///
/// Polling stops at a terminal status, at a status that is neither terminal
/// nor pending (e.g. `requires_action`), when `policy` runs out, or when
/// `cancel` fires. A run given up on is cancelled remotely before the error
/// is returned, and the error keeps the thread id. Only a completed run is
/// charged and read back.
pub async fn run_assistant<A: AssistantApi>(
    api: &A,
    assistant_id: &str,
    prompt: &str,
    thread_id: Option<String>,
    policy: PollPolicy,
    cancel: &mut CancelSignal,
) -> Result<AssistantReply, AssistantError> {
    let thread_id = match thread_id {
        Some(id) => id,
        None => {
            let id = api.create_thread().await?;
            tracing::info!("Created assistant thread {}", id);
            id
        }
    };

    api.add_message(&thread_id, prompt).await?;
    let started = api.create_run(&thread_id, assistant_id).await?;
    tracing::debug!("Started run {} on thread {}", started.id, thread_id);

    let clock = Instant::now();
    let mut run = api.retrieve_run(&thread_id, &started.id).await?;
    let mut attempts = 1;

    while run.is_pending() {
        if attempts >= policy.max_attempts || clock.elapsed() >= policy.timeout {
            let elapsed = clock.elapsed();
            abandon_run(api, &thread_id, &run.id).await;
            return Err(AssistantError::TimedOut {
                thread_id,
                run_id: run.id,
                status: run.status,
                attempts,
                elapsed,
            });
        }
        let cancelled = cancel.is_cancelled()
            || tokio::select! {
                _ = tokio::time::sleep(policy.interval) => false,
                _ = cancel.cancelled() => true,
            };
        if cancelled {
            abandon_run(api, &thread_id, &run.id).await;
            return Err(AssistantError::Cancelled { thread_id });
        }
        run = api.retrieve_run(&thread_id, &run.id).await?;
        attempts += 1;
    }
    tracing::debug!("Run {} finished as {} after {} polls", run.id, run.status, attempts);

    if run.status != "completed" {
        if !run.is_terminal() {
            tracing::warn!("Run {} stopped in unsupported state {}", run.id, run.status);
        }
        return Ok(AssistantReply {
            text: run.status.clone(),
            status: run.status,
            cost_usd: 0.0,
            thread_id,
        });
    }

    let cost_usd = run.usage.as_ref().map(estimate_cost).unwrap_or(0.0);
    let message = api.latest_message(&thread_id).await?;

    Ok(AssistantReply {
        text: extract_reply(&message),
        status: run.status,
        cost_usd,
        thread_id,
    })
}

/// OpenAI Assistants v2 over HTTP.
pub struct OpenAiAssistants {
    client: Client,
    base_url: String,
    api_key: String,
    model: Option<String>,
}

#[derive(Deserialize)]
struct Created {
    id: String,
}

#[derive(Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Serialize)]
struct NewMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct NewRun<'a> {
    assistant_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

impl OpenAiAssistants {
    pub fn new(base_url: &str, api_key: String, model: Option<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(&config.base_url, config.require_api_key()?, Some(config.chat_model.clone())))
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("OpenAI-Beta", "assistants=v2")
    }

    async fn send<T: DeserializeOwned>(&self, builder: reqwest::RequestBuilder, what: &str) -> anyhow::Result<T> {
        let resp = builder.send().await.with_context(|| format!("{} request failed", what))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let err_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("{} failed ({}): {}", what, status, err_text);
        }
        resp.json().await.with_context(|| format!("Malformed {} response", what))
    }
}

impl AssistantApi for OpenAiAssistants {
    async fn create_thread(&self) -> anyhow::Result<String> {
        let builder = self.request(reqwest::Method::POST, "threads").json(&serde_json::json!({}));
        let created: Created = self.send(builder, "Create thread").await?;
        Ok(created.id)
    }

    async fn add_message(&self, thread_id: &str, prompt: &str) -> anyhow::Result<()> {
        let builder = self
            .request(reqwest::Method::POST, &format!("threads/{}/messages", thread_id))
            .json(&NewMessage { role: "user", content: prompt });
        let _: Created = self.send(builder, "Create message").await?;
        Ok(())
    }

    async fn create_run(&self, thread_id: &str, assistant_id: &str) -> anyhow::Result<Run> {
        let builder = self
            .request(reqwest::Method::POST, &format!("threads/{}/runs", thread_id))
            .json(&NewRun { assistant_id, model: self.model.as_deref() });
        self.send(builder, "Create run").await
    }

    async fn retrieve_run(&self, thread_id: &str, run_id: &str) -> anyhow::Result<Run> {
        let builder = self.request(reqwest::Method::GET, &format!("threads/{}/runs/{}", thread_id, run_id));
        self.send(builder, "Retrieve run").await
    }

    async fn latest_message(&self, thread_id: &str) -> anyhow::Result<ThreadMessage> {
        let builder = self
            .request(reqwest::Method::GET, &format!("threads/{}/messages", thread_id))
            .query(&[("limit", "1"), ("order", "desc")]);
        let list: MessageList = self.send(builder, "List messages").await?;
        list.data
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Thread {} has no messages", thread_id))
    }

    async fn cancel_run(&self, thread_id: &str, run_id: &str) -> anyhow::Result<()> {
        let builder = self.request(
            reqwest::Method::POST,
            &format!("threads/{}/runs/{}/cancel", thread_id, run_id),
        );
        let _: Run = self.send(builder, "Cancel run").await?;
        Ok(())
    }
}
