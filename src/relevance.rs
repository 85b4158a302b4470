//! BM25 relevance between a gallery's tags and a chat message.

use std::collections::{HashMap, HashSet};

const CORPUS_SIZE: f64 = 2.0;

/// Scores how relevant a tag list is to a message, in `[0, 1]`.
///
/// The tags form the query and the message the only document; IDF is taken
/// over that two-document corpus and the raw score is normalized by the
/// largest score the query could reach.
#[derive(Debug, Clone, Copy)]
pub struct RelevanceBM25 {
    k1: f64,
    b: f64,
}

impl Default for RelevanceBM25 {
    fn default() -> Self {
        Self::new(1.5, 0.75)
    }
}

impl RelevanceBM25 {
    pub fn new(k1: f64, b: f64) -> Self {
        Self { k1, b }
    }

    pub fn calc<S: AsRef<str>>(&self, tags: &[S], message: &str) -> f64 {
        if tags.is_empty() || message.is_empty() {
            return 0.0;
        }

        let joined = tags.iter().map(AsRef::as_ref).collect::<Vec<_>>().join(" ");
        let query = tokenize(&joined);
        let document = tokenize(message);

        let idf = inverse_document_frequency(&[&query, &document]);
        let raw = self.score(&query, &document, &idf);

        let max_score = query.len() as f64 * (1.0 + self.k1);
        if max_score <= 0.0 {
            return 0.0;
        }

        round6((raw / max_score).clamp(0.0, 1.0))
    }

    fn score(&self, query: &[String], document: &[String], idf: &HashMap<&str, f64>) -> f64 {
        let mut tf: HashMap<&str, usize> = HashMap::new();
        for token in document {
            *tf.entry(token.as_str()).or_default() += 1;
        }
        let doc_len = document.len() as f64;
        // Small-corpus stand-in for the average document length.
        let avgdl = (query.len() + document.len()) as f64 / 2.0;

        query
            .iter()
            .filter_map(|token| {
                let freq = *tf.get(token.as_str())? as f64;
                let weight = idf.get(token.as_str()).copied().unwrap_or(0.0);
                let norm = freq + self.k1 * (1.0 - self.b + self.b * doc_len / avgdl);
                Some(weight * freq * (self.k1 + 1.0) / norm)
            })
            .sum()
    }
}

fn inverse_document_frequency<'a>(docs: &[&'a Vec<String>]) -> HashMap<&'a str, f64> {
    let sets: Vec<HashSet<&str>> = docs
        .iter()
        .map(|doc| doc.iter().map(String::as_str).collect())
        .collect();

    let mut idf = HashMap::new();
    for &doc in docs {
        for token in doc {
            let token = token.as_str();
            if idf.contains_key(token) {
                continue;
            }
            let df = sets.iter().filter(|set| set.contains(token)).count() as f64;
            idf.insert(token, ((CORPUS_SIZE - df + 0.5) / (df + 0.5) + 1.0).ln());
        }
    }
    idf
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

fn is_cjk_char(c: char) -> bool {
    let cp = c as u32;
    // CJK Unified Ideographs
    (0x4E00..=0x9FFF).contains(&cp)
    // CJK Extension A
    || (0x3400..=0x4DBF).contains(&cp)
    // Hiragana, Katakana
    || (0x3040..=0x30FF).contains(&cp)
    // Hangul Syllables
    || (0xAC00..=0xD7AF).contains(&cp)
}

/// Segment mixed CJK and Latin text.
///
/// Latin runs become lowercase words. CJK runs have no word boundaries, so
/// each run yields its characters followed by its adjacent pairs.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut cjk_run: Vec<char> = Vec::new();

    for c in text.chars() {
        if is_cjk_char(c) {
            flush_word(&mut word, &mut tokens);
            cjk_run.push(c);
        } else if c.is_alphanumeric() {
            flush_cjk(&mut cjk_run, &mut tokens);
            word.extend(c.to_lowercase());
        } else {
            flush_word(&mut word, &mut tokens);
            flush_cjk(&mut cjk_run, &mut tokens);
        }
    }
    flush_word(&mut word, &mut tokens);
    flush_cjk(&mut cjk_run, &mut tokens);

    tokens
}

fn flush_word(word: &mut String, tokens: &mut Vec<String>) {
    if !word.is_empty() {
        tokens.push(std::mem::take(word));
    }
}

fn flush_cjk(run: &mut Vec<char>, tokens: &mut Vec<String>) {
    tokens.extend(run.iter().map(|c| c.to_string()));
    tokens.extend(run.windows(2).map(|pair| pair.iter().collect::<String>()));
    run.clear();
}
