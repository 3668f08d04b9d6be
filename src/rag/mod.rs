pub mod embeddings;
pub mod store;

use anyhow::Result;
use text_splitter::{ChunkConfig, TextSplitter};

use crate::config::RetrievalConfig;
use crate::llm::ChatMessage;
use embeddings::Embedder;
use store::{Chunk, FlatL2Store, VectorStore};

const SYSTEM_PROMPT: &str = "You answer questions about a construction specification. \
Use only the excerpts below. If they do not contain the answer, say so.";

/// Split `text` into overlapping chunks, preferring paragraph boundaries.
pub fn chunk_text(text: &str, config: &RetrievalConfig) -> Result<Vec<String>> {
    let splitter = TextSplitter::new(ChunkConfig::new(config.chunk_size).with_overlap(config.chunk_overlap)?);
    Ok(splitter
        .chunks(text)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect())
}

/// In-memory index over one uploaded reference document.
pub struct ReferenceIndex<E: Embedder> {
    embedder: E,
    store: Box<dyn VectorStore>,
}

impl<E: Embedder> ReferenceIndex<E> {
    pub fn new(embedder: E) -> Self {
        Self { embedder, store: Box::new(FlatL2Store::new()) }
    }

    /// Chunk and embed `text`. One embedding call per chunk, in order.
    pub async fn build(embedder: E, text: &str, config: &RetrievalConfig) -> Result<Self> {
        let chunks = chunk_text(text, config)?;
        let mut index = Self::new(embedder);
        tracing::info!(
            "Indexing {} chunks with {} into {}",
            chunks.len(),
            index.embedder.model_name(),
            index.store.store_type()
        );

        for chunk in chunks {
            index.add_chunk(chunk).await?;
        }
        Ok(index)
    }

    pub async fn add_chunk(&mut self, text: String) -> Result<()> {
        let embedding = self.embedder.embed(&text).await?;
        let index = self.store.count();
        tracing::debug!("Embedded chunk {} ({} chars)", index, text.len());
        self.store.add(Chunk { index, text, embedding })
    }

    pub fn len(&self) -> usize {
        self.store.count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<Chunk>> {
        let query_embedding = self.embedder.embed(query).await?;
        let hits = self.store.search(&query_embedding, top_k)?;
        if let Some((_, best)) = hits.first() {
            tracing::debug!("Retrieved {} chunks, nearest at distance {:.4}", hits.len(), best);
        }
        Ok(hits.into_iter().map(|(chunk, _)| chunk).collect())
    }

    /// Single-turn prompt grounded on the `top_k` nearest chunks.
    pub async fn grounded_messages(&self, question: &str, top_k: usize) -> Result<Vec<ChatMessage>> {
        let chunks = self.search(question, top_k).await?;
        Ok(build_messages(question, &chunks))
    }
}

/// System message carrying the retrieved excerpts, then the question.
pub fn build_messages(question: &str, chunks: &[Chunk]) -> Vec<ChatMessage> {
    let mut context = String::from(SYSTEM_PROMPT);
    for chunk in chunks {
        context.push_str(&format!("\n\n--- Excerpt {} ---\n{}", chunk.index + 1, chunk.text));
    }
    vec![ChatMessage::system(context), ChatMessage::user(question)]
}
