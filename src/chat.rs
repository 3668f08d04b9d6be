use anyhow::Result;
use console::style;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Input;
use futures::StreamExt;
use std::io::Write;
use std::path::Path;
use termimad::MadSkin;

use crate::config::Config;
use crate::llm::assistant::{run_assistant, AssistantError, CancelSignal, OpenAiAssistants, PollPolicy};
use crate::llm::{LlmClient, StreamEvent, Usage};
use crate::rag::embeddings::{Embedder, OpenAiEmbedder};
use crate::rag::ReferenceIndex;
use crate::{ops, pdf};

const EXIT_WORDS: [&str; 3] = ["exit", "quit", "/q"];

/// Next question, or `None` when the user is done.
fn read_prompt(label: &str) -> Result<Option<String>> {
    let input = match Input::<String>::with_theme(&ColorfulTheme::default())
        .with_prompt(label)
        .allow_empty(true)
        .interact_text()
    {
        Ok(input) => input,
        Err(dialoguer::Error::IO(e)) if e.kind() == std::io::ErrorKind::Interrupted => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let input = input.trim();
    if input.is_empty() || EXIT_WORDS.contains(&input) {
        return Ok(None);
    }
    Ok(Some(input.to_string()))
}

fn print_error(err: &dyn std::fmt::Display) {
    eprintln!("{} {}", style("Error:").red().bold(), err);
}

/// Chat with a pre-built hosted assistant, carrying the thread across turns.
pub async fn assistant_loop(config: &Config, assistant_id: &str, thread_id: Option<String>) -> Result<()> {
    let api = OpenAiAssistants::from_config(config)?;
    let policy = PollPolicy::from(&config.poll);
    let skin = MadSkin::default();
    let mut thread_id = thread_id;

    println!(
        "{} {} {}",
        style("Assistant").cyan().bold(),
        style(assistant_id).dim(),
        style("(empty line or 'exit' to leave, Ctrl-C cancels a pending reply)").dim()
    );

    while let Some(prompt) = read_prompt("You")? {
        let (tx, mut cancel) = CancelSignal::new();
        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                let _ = tx.send(true);
            }
        });

        let result = run_assistant(&api, assistant_id, &prompt, thread_id.clone(), policy, &mut cancel).await;
        ctrl_c.abort();

        match result {
            Ok(reply) => {
                thread_id = Some(reply.thread_id.clone());
                if reply.status == "completed" {
                    skin.print_text(&reply.text);
                } else {
                    println!("{} run ended as {}", style("!").yellow().bold(), style(&reply.text).yellow());
                }
                println!("{}", style(format!("cost ${:.6} | thread {}", reply.cost_usd, reply.thread_id)).dim());
            }
            Err(AssistantError::Cancelled { thread_id: id }) => {
                thread_id = Some(id);
                println!("{}", style("Cancelled.").yellow());
            }
            Err(AssistantError::TimedOut { thread_id: id, run_id, status, attempts, elapsed }) => {
                tracing::warn!("Run {} abandoned as {} after {} polls ({:?})", run_id, status, attempts, elapsed);
                thread_id = Some(id);
                print_error(&format!("no reply after {:?}, run {} was cancelled", elapsed, run_id));
            }
            Err(e) => {
                tracing::error!("Assistant run failed: {}", e);
                print_error(&e);
            }
        }
    }

    if let Some(id) = thread_id {
        println!("{}", style(format!("Resume with --thread {}", id)).dim());
    }
    Ok(())
}

/// Index one reference PDF, then answer questions against it.
pub async fn document_loop(config: &Config, doc: &Path, top_k: usize) -> Result<()> {
    let bytes = ops::read_pdf(doc)?;
    let text = pdf::extract_full_text(&bytes)?;

    let embedder = OpenAiEmbedder::from_config(config)?;
    println!(
        "{} {} with {}...",
        style("Indexing").cyan().bold(),
        doc.display(),
        embedder.model_name()
    );
    let index = ReferenceIndex::build(embedder, &text, &config.retrieval).await?;
    if index.is_empty() {
        println!("{} {} has no extractable text", style("Nothing to do:").yellow().bold(), doc.display());
        return Ok(());
    }
    println!("{} {} chunks", style("Indexed").green().bold(), index.len());

    let llm = LlmClient::from_config(config);
    while let Some(question) = read_prompt("Question")? {
        match stream_answer(&index, &llm, &question, top_k).await {
            Ok(Some(usage)) => println!(
                "{}",
                style(format!("{} prompt + {} completion tokens", usage.prompt_tokens, usage.completion_tokens)).dim()
            ),
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Document question failed: {}", e);
                print_error(&e);
            }
        }
    }
    Ok(())
}

async fn stream_answer<E: Embedder>(
    index: &ReferenceIndex<E>,
    llm: &LlmClient,
    question: &str,
    top_k: usize,
) -> Result<Option<Usage>> {
    let messages = index.grounded_messages(question, top_k).await?;
    let mut stream = llm.chat_stream(&messages).await?;
    let mut stdout = std::io::stdout();
    let mut usage = None;

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Content(text) => {
                print!("{}", text);
                stdout.flush()?;
            }
            StreamEvent::Usage(u) => usage = Some(u),
        }
    }
    println!();
    Ok(usage)
}
