/// A window of page text, in char offsets.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub content: String,
    pub start_pos: usize,
    pub end_pos: usize,
}

/// Splits text into fixed-size character windows overlapping by `overlap` chars.
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
        }
    }

    /// Whitespace-only windows are dropped; content is trimmed.
    pub fn chunk(&self, text: &str) -> Vec<Chunk> {
        let chars: Vec<char> = text.chars().collect();
        let total_len = chars.len();
        let step = self.chunk_size - self.overlap;

        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total_len {
            let end = (start + self.chunk_size).min(total_len);
            let content: String = chars[start..end].iter().collect();
            let content = content.trim();

            if !content.is_empty() {
                chunks.push(Chunk {
                    content: content.to_string(),
                    start_pos: start,
                    end_pos: end,
                });
            }

            if end >= total_len {
                break;
            }
            start += step;
        }

        chunks
    }
}
