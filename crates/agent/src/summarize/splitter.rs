use log::warn;

use crate::extract::Section;

/// A piece of a document small enough to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub page: Option<String>,
    pub text: String,
}

/// Splits on a separator and greedily regroups the pieces into chunks of at
/// most `chunk_size` characters. A single piece longer than that is kept whole.
#[derive(Debug, Clone)]
pub struct CharacterTextSplitter {
    pub separator: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for CharacterTextSplitter {
    fn default() -> Self {
        Self {
            separator: "\n".to_string(),
            chunk_size: 1000,
            chunk_overlap: 0,
        }
    }
}

impl CharacterTextSplitter {
    pub fn split_text(&self, text: &str) -> Vec<String> {
        let sep_len = self.separator.chars().count();
        let pieces: Vec<&str> = text
            .split(self.separator.as_str())
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut total = 0usize;
        for piece in pieces {
            let len = piece.chars().count();
            let joined = if current.is_empty() { len } else { total + sep_len + len };
            if joined > self.chunk_size && !current.is_empty() {
                if total > self.chunk_size {
                    warn!(
                        "created a chunk of {} characters, longer than the limit of {}",
                        total, self.chunk_size
                    );
                }
                chunks.push(current.join(&self.separator));
                // Keep a tail of the previous chunk as overlap.
                while !current.is_empty()
                    && (total > self.chunk_overlap
                        || (total + sep_len + len > self.chunk_size && total > 0))
                {
                    let dropped = current.remove(0).chars().count();
                    let joint = if current.is_empty() { 0 } else { sep_len };
                    total = total.saturating_sub(dropped + joint);
                }
            }
            total = if current.is_empty() { len } else { total + sep_len + len };
            current.push(piece);
        }
        if !current.is_empty() {
            chunks.push(current.join(&self.separator));
        }
        chunks
    }

    pub fn split_sections(&self, sections: &[Section]) -> Vec<Chunk> {
        sections
            .iter()
            .flat_map(|section| {
                self.split_text(&section.text).into_iter().map(|text| Chunk {
                    page: section.page.clone(),
                    text,
                })
            })
            .collect()
    }
}
