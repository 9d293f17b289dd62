use crate::error::IngestError;
use crate::extractor::{LopdfExtractor, PageText, PdfExtractor};
use crate::models::{IngestionOptions, PdfChunk};
use sha2::{Digest, Sha256};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingConfig {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl TryFrom<&IngestionOptions> for ChunkingConfig {
    type Error = IngestError;

    fn try_from(value: &IngestionOptions) -> Result<Self, Self::Error> {
        if value.chunk_max_chars == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk_max_chars must be greater than zero".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&value.chunk_overlap_ratio) {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk_overlap_ratio {} must be in [0, 1)",
                value.chunk_overlap_ratio
            )));
        }

        Ok(Self {
            max_chars: value.chunk_max_chars,
            overlap_chars: value.overlap_chars().min(value.chunk_max_chars - 1),
        })
    }
}

/// Strips control characters and collapses every whitespace run into one space.
pub fn normalize_text(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Cuts normalized text into passages of at most `max_chars` characters.
///
/// Cuts land on a sentence end or a word gap in the upper half of the window when
/// one exists. Each passage after the first starts roughly `overlap_chars` before
/// the previous cut, widened back to the start of the word it lands in. Every
/// passage starts strictly after the one before it.
pub fn split_passages(normalized: &str, config: ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = normalized.chars().collect();
    let mut passages = Vec::new();
    let mut start = skip_whitespace(&chars, 0);
    let mut previous_end = 0;

    while start < chars.len() {
        let hard_end = (start + config.max_chars).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            soft_break(&chars, start, hard_end, previous_end + 1)
        };

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            passages.push(piece.to_string());
        }

        if end == chars.len() {
            break;
        }

        start = skip_whitespace(&chars, overlap_start(&chars, start, end, config.overlap_chars));
        previous_end = end;
    }

    passages
}

fn skip_whitespace(chars: &[char], from: usize) -> usize {
    (from..chars.len())
        .find(|&index| !chars[index].is_whitespace())
        .unwrap_or(chars.len())
}

// Prefers a cut past `min_end` so passages keep advancing, then any gap in the
// upper half, then the hard end. `chars[start]` is never whitespace, so the
// result is always above `start`.
fn soft_break(chars: &[char], start: usize, hard_end: usize, min_end: usize) -> usize {
    if chars[hard_end].is_whitespace() {
        return hard_end;
    }

    let floor = start + (hard_end - start) / 2;
    let advancing = floor.max(min_end).min(hard_end);
    word_gap(chars, advancing, hard_end)
        .or_else(|| word_gap(chars, floor, hard_end))
        .unwrap_or(hard_end)
}

fn word_gap(chars: &[char], from: usize, to: usize) -> Option<usize> {
    let is_sentence_end = |index: usize| {
        matches!(chars[index], '.' | '!' | '?')
            && chars.get(index + 1).map_or(true, |next| next.is_whitespace())
    };

    (from..to)
        .rev()
        .find(|&index| is_sentence_end(index))
        .map(|index| index + 1)
        .or_else(|| (from..to).rev().find(|&index| chars[index].is_whitespace()))
}

fn overlap_start(chars: &[char], start: usize, end: usize, overlap: usize) -> usize {
    let candidate = end.saturating_sub(overlap);
    if overlap == 0 || candidate <= start {
        return end;
    }

    let is_word_start = |index: usize| chars[index - 1].is_whitespace();
    if is_word_start(candidate) {
        return candidate;
    }
    if let Some(index) = (start + 1..candidate).rev().find(|&index| is_word_start(index)) {
        return index;
    }
    if let Some(index) = (candidate + 1..end).find(|&index| is_word_start(index)) {
        return index;
    }

    // one word spans the whole passage; overlap only when the cut already split it
    let severed = end < chars.len() && !chars[end - 1].is_whitespace() && !chars[end].is_whitespace();
    if severed {
        candidate
    } else {
        end
    }
}

/// Builds the chunk sequence for one document from its pages, in page order.
pub fn build_chunks(document_name: &str, pages: &[PageText], config: ChunkingConfig) -> Vec<PdfChunk> {
    let mut chunks = Vec::new();
    let mut ordinal = 0u64;

    for page in pages {
        let normalized = normalize_text(&page.text);
        for passage in split_passages(&normalized, config) {
            chunks.push(PdfChunk {
                chunk_id: make_chunk_id(document_name, page.number, ordinal, &passage),
                document_name: document_name.to_string(),
                page: page.number,
                ordinal,
                text: passage,
            });
            ordinal = ordinal.saturating_add(1);
        }
    }

    chunks
}

fn make_chunk_id(document_name: &str, page: u32, ordinal: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_name.as_bytes());
    hasher.update(page.to_le_bytes());
    hasher.update(ordinal.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Turns PDF bytes into page-addressed, overlapping chunks.
#[derive(Clone)]
pub struct PdfChunker {
    extractor: Arc<dyn PdfExtractor>,
    config: ChunkingConfig,
}

impl PdfChunker {
    pub fn new(options: &IngestionOptions) -> Result<Self, IngestError> {
        Self::with_extractor(Arc::new(LopdfExtractor), options)
    }

    pub fn with_extractor(
        extractor: Arc<dyn PdfExtractor>,
        options: &IngestionOptions,
    ) -> Result<Self, IngestError> {
        Ok(Self {
            extractor,
            config: ChunkingConfig::try_from(options)?,
        })
    }

    pub fn config(&self) -> ChunkingConfig {
        self.config
    }

    pub fn process(&self, document_bytes: &[u8], document_name: &str) -> Result<Vec<PdfChunk>, IngestError> {
        let pages = self.extractor.extract_pages(document_bytes, document_name)?;
        let chunks = build_chunks(document_name, &pages, self.config);

        if chunks.is_empty() {
            return Err(IngestError::NoExtractableText(document_name.to_string()));
        }

        Ok(chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::FormFeedTextExtractor;

    fn config(max_chars: usize, overlap_chars: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chars,
            overlap_chars,
        }
    }

    #[test]
    fn whitespace_and_control_chars_are_normalized() {
        let input = "A  \t  lot\nof\u{0007}   spacing\u{00a0}here";
        assert_eq!(normalize_text(input), "A lot of spacing here");
    }

    #[test]
    fn passages_overlap_on_word_boundaries() {
        let passages = split_passages(
            "alpha beta gamma delta epsilon zeta eta theta",
            config(20, 5),
        );

        assert_eq!(
            passages,
            vec![
                "alpha beta gamma",
                "gamma delta epsilon",
                "epsilon zeta eta",
                "zeta eta theta"
            ]
        );
    }

    #[test]
    fn single_character_windows_still_advance() {
        assert_eq!(split_passages("ab cd", config(1, 0)), vec!["a", "b", "c", "d"]);
        assert_eq!(split_passages("  ab  ", config(1, 0)), vec!["a", "b"]);
    }

    #[test]
    fn unbroken_words_are_hard_cut() {
        let passages = split_passages("abcdefghij", config(4, 1));
        assert_eq!(passages, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn cuts_prefer_sentence_ends() {
        let passages = split_passages("Check fuel. Check oil pressure now", config(16, 0));
        assert_eq!(passages[0], "Check fuel.");
        assert!(passages.iter().all(|passage| passage.chars().count() <= 16));
    }

    #[test]
    fn overlap_ratio_must_be_below_one() {
        let options = IngestionOptions {
            chunk_max_chars: 100,
            chunk_overlap_ratio: 1.0,
        };
        assert!(matches!(
            ChunkingConfig::try_from(&options),
            Err(IngestError::InvalidChunkConfig(_))
        ));

        let options = IngestionOptions {
            chunk_max_chars: 0,
            chunk_overlap_ratio: 0.1,
        };
        assert!(ChunkingConfig::try_from(&options).is_err());
    }

    #[test]
    fn chunks_carry_pages_and_stable_ordinals() -> Result<(), IngestError> {
        let chunker = PdfChunker::with_extractor(
            Arc::new(FormFeedTextExtractor),
            &IngestionOptions {
                chunk_max_chars: 24,
                chunk_overlap_ratio: 0.0,
            },
        )?;
        let bytes = "Taxi with caution near runway 27\u{000C}\u{000C}Hold short of the runway".as_bytes();

        let first = chunker.process(bytes, "ops.pdf")?;
        let second = chunker.process(bytes, "ops.pdf")?;

        assert_eq!(first, second);
        assert!(first.len() >= 2);
        assert_eq!(first[0].page, 1);
        assert_eq!(first.last().map(|chunk| chunk.page), Some(3));
        for (index, chunk) in first.iter().enumerate() {
            assert_eq!(chunk.ordinal, index as u64);
            assert_eq!(chunk.document_name, "ops.pdf");
            assert!(!chunk.text.trim().is_empty());
            assert!(chunk.text.chars().count() <= 24);
        }
        Ok(())
    }

    #[test]
    fn chunk_ids_change_with_text() {
        let pages = |text: &str| {
            vec![PageText {
                number: 1,
                text: text.to_string(),
            }]
        };
        let original = build_chunks("a.pdf", &pages("Flaps up"), config(100, 0));
        let edited = build_chunks("a.pdf", &pages("Flaps down"), config(100, 0));

        assert_ne!(original[0].chunk_id, edited[0].chunk_id);
    }

    proptest::proptest! {
        #[test]
        fn passages_are_bounded_and_never_start_mid_word(
            words in proptest::collection::vec("[a-z]{1,6}", 0..40),
            max_chars in 1usize..32,
            overlap_seed in 0usize..32,
        ) {
            let text = words.join(" ");
            let overlap_chars = overlap_seed % max_chars;
            let passages = split_passages(&text, config(max_chars, overlap_chars));

            let longest_word = words.iter().map(String::len).max().unwrap_or(0);
            for passage in &passages {
                proptest::prop_assert!(!passage.is_empty());
                proptest::prop_assert!(passage.chars().count() <= max_chars);
                if longest_word <= max_chars / 2 {
                    let first_word = passage.split(' ').next().unwrap_or_default();
                    proptest::prop_assert!(words.iter().any(|word| word == first_word));
                }
            }
            proptest::prop_assert_eq!(passages.is_empty(), words.is_empty());
        }
    }

    #[test]
    fn control_only_pages_produce_no_chunks() {
        let chunker = PdfChunker::with_extractor(
            Arc::new(FormFeedTextExtractor),
            &IngestionOptions::default(),
        )
        .expect("default options are valid");

        let result = chunker.process("\u{0001}\u{0002}".as_bytes(), "blank.pdf");
        assert!(matches!(result, Err(IngestError::NoExtractableText(_))));
    }
}
