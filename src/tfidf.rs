//! Tokenizer and TF-IDF vectorizer used by the text classifiers.

use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::utils::l2_normalize;

const TOKEN_PATTERN: &str = r"[a-z0-9]+";

const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "am", "an", "and", "any", "are", "as", "at", "be",
    "been", "being", "but", "by", "can", "could", "do", "does", "for", "from", "got", "had",
    "has", "have", "having", "he", "her", "him", "his", "i", "if", "im", "in", "into", "is",
    "it", "its", "me", "my", "of", "on", "or", "our", "she", "so", "some", "than", "that",
    "the", "their", "them", "then", "there", "they", "this", "to", "too", "us", "was", "we",
    "were", "what", "when", "which", "while", "who", "with", "you", "your", "not", "very",
];

/// Lowercases, splits on anything non-alphanumeric and drops English stop words.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    pattern: Regex,
    stop_words: HashSet<&'static str>,
}

impl Tokenizer {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(TOKEN_PATTERN)?,
            stop_words: STOP_WORDS.iter().copied().collect(),
        })
    }

    pub fn tokens(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        self.pattern
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|word| !self.stop_words.contains(*word))
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug)]
pub struct TfIdf {
    tokenizer: Tokenizer,
    vocab: HashMap<String, usize>,
    idf: Vec<f32>,
}

pub struct TfIdfBuilder {
    tokenizer: Tokenizer,
    documents: Vec<Vec<String>>,
}

impl TfIdfBuilder {
    pub fn new(tokenizer: Tokenizer) -> Self {
        Self {
            tokenizer,
            documents: Vec::new(),
        }
    }

    pub fn add(&mut self, document: &str) {
        let tokens = self.tokenizer.tokens(document);
        self.documents.push(tokens);
    }

    pub fn build(self) -> TfIdf {
        let mut vocab = HashMap::new();
        let mut doc_count: Vec<usize> = Vec::new();

        // Vocabulary indices follow first appearance so the model is reproducible.
        for doc in &self.documents {
            let mut seen_words = HashSet::new();
            for word in doc {
                let idx = match vocab.get(word) {
                    Some(&idx) => idx,
                    None => {
                        let idx = vocab.len();
                        vocab.insert(word.clone(), idx);
                        doc_count.push(0);
                        idx
                    }
                };
                if seen_words.insert(idx) {
                    doc_count[idx] += 1;
                }
            }
        }

        // Smoothed IDF: never zero, even for a term present in every document.
        let total_docs = self.documents.len() as f32;
        let idf = doc_count
            .into_iter()
            .map(|count| ((1.0 + total_docs) / (1.0 + count as f32)).ln() + 1.0)
            .collect();

        TfIdf {
            tokenizer: self.tokenizer,
            vocab,
            idf,
        }
    }
}

impl TfIdf {
    pub fn vocabulary_len(&self) -> usize {
        self.vocab.len()
    }

    pub fn idf(&self, term: &str) -> Option<f32> {
        let term = term.to_lowercase();
        self.vocab.get(&term).map(|&idx| self.idf[idx])
    }

    /// Number of tokens in `text` the model has a weight for.
    pub fn known_tokens(&self, text: &str) -> usize {
        self.tokenizer
            .tokens(text)
            .iter()
            .filter(|t| self.vocab.contains_key(*t))
            .count()
    }

    /// Dense, L2-normalised TF-IDF vector over the fitted vocabulary. Text
    /// with no known token maps to the zero vector.
    pub fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; self.vocab.len()];
        let tokens = self.tokenizer.tokens(text);
        if tokens.is_empty() {
            return vector;
        }
        for token in &tokens {
            if let Some(&idx) = self.vocab.get(token) {
                vector[idx] += 1.0;
            }
        }
        let len = tokens.len() as f32;
        for (idx, weight) in vector.iter_mut().enumerate() {
            if *weight > 0.0 {
                *weight = (*weight / len) * self.idf[idx];
            }
        }
        l2_normalize(&mut vector);
        vector
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(docs: &[&str]) -> TfIdf {
        let mut builder = TfIdfBuilder::new(Tokenizer::new().unwrap());
        for doc in docs {
            builder.add(doc);
        }
        builder.build()
    }

    #[test]
    fn tokenizer_drops_stop_words_and_punctuation() {
        let tokenizer = Tokenizer::new().unwrap();
        assert_eq!(
            tokenizer.tokens("I have SEVERE chest-pain, and shortness of breath!"),
            vec!["severe", "chest", "pain", "shortness", "breath"]
        );
    }

    #[test]
    fn rarer_terms_get_higher_idf() {
        let m = model(&["chest pain", "back pain", "joint pain arthritis"]);
        let pain = m.idf("pain").unwrap();
        let chest = m.idf("chest").unwrap();
        assert!(chest > pain);
        assert!(pain > 0.0);
        assert_eq!(m.idf("unicorn"), None);
    }

    #[test]
    fn vectors_are_unit_length_or_zero() {
        let m = model(&["chest pain", "skin rash"]);
        let v = m.vectorize("chest pain chest");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);

        let zero = m.vectorize("completely unrelated words");
        assert!(zero.iter().all(|&x| x == 0.0));
        assert_eq!(m.known_tokens("completely unrelated words"), 0);
        assert_eq!(m.known_tokens("rash on my skin"), 2);
    }
}
