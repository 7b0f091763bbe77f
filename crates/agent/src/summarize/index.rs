use super::splitter::Chunk;

/// Brute-force cosine similarity over a handful of chunk embeddings.
#[derive(Debug, Default)]
pub struct VectorIndex {
    entries: Vec<(Vec<f32>, Chunk)>,
}

impl VectorIndex {
    /// Pairs chunks with their embeddings; extra items on either side are ignored.
    pub fn new(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Self {
        Self {
            entries: embeddings.into_iter().zip(chunks).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `k` chunks most similar to `query`, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<&Chunk> {
        let mut scored: Vec<(f32, &Chunk)> = self
            .entries
            .iter()
            .map(|(vector, chunk)| (cosine(query, vector), chunk))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().take(k).map(|(_, chunk)| chunk).collect()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0f32, 0f32, 0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}
