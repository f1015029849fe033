//! Text chunking.
//!
//! Chunks are the unit of embedding and lexical matching. The chunker
//! accumulates whole lines until the buffer would exceed the soft cap,
//! then flushes; a single over-long line still becomes one chunk rather
//! than being split mid-line.

use kasten_core::defaults;

/// Line-accumulating chunker with a soft character cap.
#[derive(Debug, Clone)]
pub struct LineChunker {
    max_chars: usize,
}

impl Default for LineChunker {
    fn default() -> Self {
        Self {
            max_chars: defaults::CHUNK_SOFT_CAP,
        }
    }
}

impl LineChunker {
    /// Create a chunker with the default soft cap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a chunker with a custom soft cap.
    pub fn with_max_chars(max_chars: usize) -> Self {
        Self {
            max_chars: max_chars.max(1),
        }
    }

    /// Split text into chunks. Empty input yields no chunks; blank-only
    /// chunks are dropped.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let mut chunks = Vec::new();
        let mut buf: Vec<&str> = Vec::new();
        let mut buf_chars = 0usize;

        for line in text.lines() {
            let line_chars = line.chars().count();
            if buf_chars + line_chars > self.max_chars && !buf.is_empty() {
                chunks.push(buf.join("\n"));
                buf.clear();
                buf_chars = 0;
            }
            buf.push(line);
            buf_chars += line_chars;
        }

        if !buf.is_empty() {
            chunks.push(buf.join("\n"));
        }

        chunks
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input() {
        assert!(LineChunker::new().chunk("").is_empty());
        assert!(LineChunker::new().chunk("\n\n\n").is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = LineChunker::new().chunk("第一行\n第二行");
        assert_eq!(chunks, vec!["第一行\n第二行".to_string()]);
    }

    #[test]
    fn test_soft_cap_flushes_on_line_boundary() {
        let chunker = LineChunker::with_max_chars(10);
        let chunks = chunker.chunk("aaaaa\nbbbbb\nccccc");
        // First two lines fill the cap exactly; the third starts a new chunk.
        assert_eq!(chunks, vec!["aaaaa\nbbbbb".to_string(), "ccccc".to_string()]);
    }

    #[test]
    fn test_overlong_line_stays_whole() {
        let chunker = LineChunker::with_max_chars(5);
        let chunks = chunker.chunk("abcdefghij");
        assert_eq!(chunks, vec!["abcdefghij".to_string()]);
    }

    #[test]
    fn test_cap_counts_chars_not_bytes() {
        // 4 CJK chars are 12 bytes; a byte-based cap of 10 would split them.
        let chunker = LineChunker::with_max_chars(10);
        let chunks = chunker.chunk("一二三四\n五六七八");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_default_cap() {
        let long_line: String = "x".repeat(400);
        let text = format!("{}\n{}\n{}", long_line, long_line, long_line);
        let chunks = LineChunker::new().chunk(&text);
        // 400 + 400 > 700, so the third line pairs with neither of the first two.
        assert_eq!(chunks.len(), 3);
    }
}
