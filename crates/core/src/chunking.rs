/// Budgets for the sentence-greedy chunker. Token costs are estimated as
/// `ceil(chars / 4)`; the overlap budget is spent as trailing words of the
/// previous chunk.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub max_tokens: usize,
    pub overlap_tokens: usize,
    pub min_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: 500,
            overlap_tokens: 50,
            min_chars: 50,
        }
    }
}

/// Rough token cost of a text, good enough for budgeting embedding input.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Split text after sentence-ending punctuation followed by whitespace. The
/// separating whitespace is consumed; sentences keep their punctuation.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|next| next.is_whitespace()) {
            while chars.peek().is_some_and(|next| next.is_whitespace()) {
                chars.next();
            }
            sentences.push(std::mem::take(&mut current));
        }
    }

    if !current.trim().is_empty() {
        sentences.push(current);
    }

    sentences
}

/// Greedily pack sentences into chunks under the token budget, seeding each
/// new chunk with the trailing words of the one just closed. Chunk
/// boundaries never split a sentence; a single sentence that alone exceeds
/// the budget still forms its own chunk. Chunks below the minimum length are
/// discarded as noise.
pub fn chunk_text(text: &str, config: ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;

    for sentence in split_sentences(text) {
        let sentence_tokens = estimate_tokens(&sentence);

        if current_tokens + sentence_tokens > config.max_tokens && !current.is_empty() {
            let closed = current.trim().to_string();
            let overlap = trailing_words(&closed, config.overlap_tokens.div_ceil(2));
            current = if overlap.is_empty() {
                sentence
            } else {
                format!("{overlap} {sentence}")
            };
            current_tokens = estimate_tokens(&current);
            chunks.push(closed);
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(&sentence);
            current_tokens += sentence_tokens;
        }
    }

    let last = current.trim();
    if !last.is_empty() {
        chunks.push(last.to_string());
    }

    chunks
        .into_iter()
        .filter(|chunk| chunk.chars().count() > config.min_chars)
        .collect()
}

fn trailing_words(chunk: &str, count: usize) -> String {
    let words: Vec<&str> = chunk.split_whitespace().collect();
    let start = words.len().saturating_sub(count);
    words[start..].join(" ")
}
