use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Chunk {
    /// Position of the chunk in the source document.
    pub index: usize,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// Trait for vector storage backends
pub trait VectorStore: Send + Sync {
    /// Add a chunk to the store
    fn add(&mut self, chunk: Chunk) -> Result<()>;

    /// Nearest chunks to `query_embedding`, closest first, with their distance.
    fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<(Chunk, f32)>>;

    fn count(&self) -> usize;

    /// Get store type description (e.g. "Flat L2")
    fn store_type(&self) -> String;
}

/// Brute-force exact search over every stored vector.
#[derive(Default)]
pub struct FlatL2Store {
    chunks: Vec<Chunk>,
    dimensions: Option<usize>,
}

impl FlatL2Store {
    pub fn new() -> Self {
        Self::default()
    }
}

impl VectorStore for FlatL2Store {
    fn add(&mut self, chunk: Chunk) -> Result<()> {
        match self.dimensions {
            Some(dim) if dim != chunk.embedding.len() => {
                anyhow::bail!(
                    "Embedding for chunk {} has {} dimensions, index holds {}",
                    chunk.index,
                    chunk.embedding.len(),
                    dim
                );
            }
            Some(_) => {}
            None => self.dimensions = Some(chunk.embedding.len()),
        }
        self.chunks.push(chunk);
        Ok(())
    }

    fn search(&self, query_embedding: &[f32], top_k: usize) -> Result<Vec<(Chunk, f32)>> {
        if let Some(dim) = self.dimensions {
            anyhow::ensure!(
                dim == query_embedding.len(),
                "Query has {} dimensions, index holds {}",
                query_embedding.len(),
                dim
            );
        }

        let mut scores: Vec<(Chunk, f32)> = self
            .chunks
            .iter()
            .map(|c| (c.clone(), euclidean_distance(query_embedding, &c.embedding)))
            .collect();

        scores.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.index.cmp(&b.0.index)));
        scores.truncate(top_k);
        Ok(scores)
    }

    fn count(&self) -> usize {
        self.chunks.len()
    }

    fn store_type(&self) -> String {
        "Flat L2 (Exact)".to_string()
    }
}

fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, embedding: Vec<f32>) -> Chunk {
        Chunk { index, text: format!("chunk {}", index), embedding }
    }

    #[test]
    fn nearest_first() {
        let mut store = FlatL2Store::new();
        store.add(chunk(0, vec![0.0, 0.0])).unwrap();
        store.add(chunk(1, vec![3.0, 4.0])).unwrap();
        store.add(chunk(2, vec![1.0, 1.0])).unwrap();

        let hits = store.search(&[3.0, 3.0], 3).unwrap();
        let order: Vec<usize> = hits.iter().map(|(c, _)| c.index).collect();
        assert_eq!(order, vec![1, 2, 0]);
        assert!((hits[0].1 - 1.0).abs() < 1e-6);
    }

    #[test]
    fn top_k_larger_than_store() {
        let mut store = FlatL2Store::new();
        store.add(chunk(0, vec![1.0])).unwrap();
        assert_eq!(store.search(&[0.0], 5).unwrap().len(), 1);
    }

    #[test]
    fn rejects_mixed_dimensions() {
        let mut store = FlatL2Store::new();
        store.add(chunk(0, vec![1.0, 2.0])).unwrap();
        assert!(store.add(chunk(1, vec![1.0])).is_err());
        assert!(store.search(&[1.0, 2.0, 3.0], 1).is_err());
        assert_eq!(store.count(), 1);
    }
}
