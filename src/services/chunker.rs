//! Text chunking with overlap for embedding.

use crate::error::ChunkError;
use crate::models::Chunk;

/// Split separators in priority order: paragraph break, line break,
/// sentence end, whitespace. Character-level splitting is the fallback
/// when no separator yields pieces that fit.
const SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " "];

/// Splits text into overlapping chunks along natural boundaries.
///
/// Sizes are measured in characters, not bytes. Consecutive chunks repeat
/// the trailing `overlap` characters of the previous chunk, clamped so a
/// chunk never exceeds `max_size` because of its carry-over and never
/// repeats more than the previous chunk contributed itself.
#[derive(Debug, Clone)]
pub struct TextChunker {
    max_size: usize,
    overlap: usize,
}

impl TextChunker {
    pub fn new(max_size: usize, overlap: usize) -> Result<Self, ChunkError> {
        if max_size == 0 {
            return Err(ChunkError::ZeroChunkSize);
        }
        if overlap >= max_size {
            return Err(ChunkError::OverlapTooLarge { overlap, max_size });
        }
        Ok(Self { max_size, overlap })
    }

    /// Split `text` into ordered chunks of at most `max_size` characters.
    ///
    /// Empty input yields no chunks; input that already fits yields exactly
    /// one. Otherwise the text is split on the first separator whose pieces
    /// all fit, and the pieces are packed greedily into chunks with the
    /// configured overlap carried between consecutive chunks.
    pub fn split(&self, text: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }

        if char_len(text) <= self.max_size {
            return vec![Chunk {
                text: text.to_string(),
                position: 0,
            }];
        }

        let pieces = self.split_pieces(text);
        self.pack(pieces)
    }

    /// Find the first separator that breaks `text` into pieces which all
    /// fit `max_size`. Separators stay attached to the preceding piece so
    /// that concatenating pieces reproduces the input exactly. The
    /// character-level fallback always succeeds.
    fn split_pieces(&self, text: &str) -> Vec<String> {
        for sep in SEPARATORS {
            let pieces: Vec<String> = text.split_inclusive(sep).map(str::to_string).collect();
            if pieces.iter().all(|p| char_len(p) <= self.max_size) {
                return pieces;
            }
        }

        // No separator worked: cut at character boundaries, leaving room
        // for the overlap carry so packed chunks still fit max_size.
        let step = self.max_size - self.overlap;
        let chars: Vec<char> = text.chars().collect();
        chars
            .chunks(step)
            .map(|piece| piece.iter().collect())
            .collect()
    }

    /// Pack pieces into chunks of at most `max_size` characters, repeating
    /// up to `overlap` trailing characters of each sealed chunk at the head
    /// of the next.
    fn pack(&self, pieces: Vec<String>) -> Vec<Chunk> {
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut current = String::new();
        let mut current_len = 0usize;
        // Characters contributed by pieces, excluding the overlap carry.
        let mut fresh_len = 0usize;

        for piece in pieces {
            let piece_len = char_len(&piece);

            if current_len > 0 && current_len + piece_len > self.max_size {
                let carry_len = self
                    .overlap
                    .min(fresh_len)
                    .min(self.max_size.saturating_sub(piece_len));
                let carry = tail_chars(&current, carry_len);

                chunks.push(Chunk {
                    text: std::mem::take(&mut current),
                    position: chunks.len(),
                });

                current.push_str(&carry);
                current_len = carry_len;
                fresh_len = 0;
            }

            current.push_str(&piece);
            current_len += piece_len;
            fresh_len += piece_len;
        }

        // A trailing pure-carry chunk would only duplicate the previous one.
        if fresh_len > 0 {
            chunks.push(Chunk {
                text: current,
                position: chunks.len(),
            });
        }

        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn tail_chars(s: &str, n: usize) -> String {
    let len = char_len(s);
    s.chars().skip(len.saturating_sub(n)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(chunks: &[Chunk]) -> Vec<&str> {
        chunks.iter().map(|c| c.text.as_str()).collect()
    }

    /// Strip each chunk's overlap prefix and concatenate; must recover the
    /// original text when no carry was clamped.
    fn reconstruct(chunks: &[Chunk], overlap: usize) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(&chunk.text);
            } else {
                out.extend(chunk.text.chars().skip(overlap));
            }
        }
        out
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            TextChunker::new(0, 0),
            Err(ChunkError::ZeroChunkSize)
        ));
        assert!(matches!(
            TextChunker::new(100, 100),
            Err(ChunkError::OverlapTooLarge { .. })
        ));
        assert!(matches!(
            TextChunker::new(100, 150),
            Err(ChunkError::OverlapTooLarge { .. })
        ));
    }

    #[test]
    fn test_empty_input() {
        let chunker = TextChunker::new(100, 20).unwrap();
        assert!(chunker.split("").is_empty());
    }

    #[test]
    fn test_short_input_single_chunk() {
        let chunker = TextChunker::new(100, 20).unwrap();
        let chunks = chunker.split("Hello, world!");
        assert_eq!(texts(&chunks), vec!["Hello, world!"]);
        assert_eq!(chunks[0].position, 0);
    }

    #[test]
    fn test_paragraph_scenario() {
        // 2500 characters with two paragraph breaks: three chunks, each
        // within the limit, consecutive chunks sharing a 20-char overlap.
        let p1 = "a".repeat(831);
        let p2 = "b".repeat(831);
        let p3 = "c".repeat(834);
        let text = format!("{p1}\n\n{p2}\n\n{p3}");
        assert_eq!(text.chars().count(), 2500);

        let chunker = TextChunker::new(1000, 20).unwrap();
        let chunks = chunker.split(&text);

        assert_eq!(chunks.len(), 3);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 1000);
        }
        for pair in chunks.windows(2) {
            let prev_tail = tail_chars(&pair[0].text, 20);
            let next_head: String = pair[1].text.chars().take(20).collect();
            assert_eq!(prev_tail, next_head);
        }
        assert_eq!(reconstruct(&chunks, 20), text);
    }

    #[test]
    fn test_positions_are_sequential() {
        let chunker = TextChunker::new(50, 10).unwrap();
        let text = "word ".repeat(100);
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.position, i);
        }
    }

    #[test]
    fn test_line_break_splitting() {
        let chunker = TextChunker::new(30, 5).unwrap();
        let text = "first line here\nsecond line here\nthird line here";
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 30);
        }
        assert_eq!(reconstruct(&chunks, 5), text);
    }

    #[test]
    fn test_sentence_splitting() {
        let chunker = TextChunker::new(40, 8).unwrap();
        let text = "One sentence goes here. Another one follows. And a third one.";
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 40);
        }
        assert_eq!(reconstruct(&chunks, 8), text);
    }

    #[test]
    fn test_character_fallback() {
        // A single 250-char token has no separators; the fallback cuts at
        // character boundaries and still carries the overlap.
        let chunker = TextChunker::new(100, 20).unwrap();
        let text = "x".repeat(250);
        let chunks = chunker.split(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 100);
        }
        assert_eq!(reconstruct(&chunks, 20), text);
    }

    #[test]
    fn test_overlap_clamped_for_large_pieces() {
        // Pieces close to max_size leave no room for a full carry; the
        // chunker shrinks the overlap instead of exceeding the bound.
        let p1 = "a".repeat(95);
        let p2 = "b".repeat(98);
        let text = format!("{p1}\n\n{p2}");
        let chunker = TextChunker::new(100, 20).unwrap();
        let chunks = chunker.split(&text);

        assert_eq!(chunks.len(), 2);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 100);
        }
        // Carry shrank to 100 - 98 = 2 characters.
        assert_eq!(chunks[1].text.chars().count(), 100);
        assert_eq!(chunks[1].text, format!("\n\n{p2}"));
    }

    #[test]
    fn test_multibyte_input() {
        let chunker = TextChunker::new(50, 10).unwrap();
        let text = "한국어 문장 하나. ".repeat(20);
        let chunks = chunker.split(&text);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.chars().count() <= 50);
        }
    }

    #[test]
    fn test_zero_overlap() {
        let chunker = TextChunker::new(10, 0).unwrap();
        let text = "abcde fghij klmno pqrst";
        let chunks = chunker.split(&text);
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);
    }
}
