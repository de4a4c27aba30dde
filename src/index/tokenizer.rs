use unicode_segmentation::UnicodeSegmentation;

/// Splits product names into lowercase word tokens for the name index.
#[derive(Debug, Clone)]
pub struct NameTokenizer {
    pub max_token_length: usize,
}

impl Default for NameTokenizer {
    fn default() -> Self {
        NameTokenizer {
            max_token_length: 64,
        }
    }
}

impl NameTokenizer {
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let mut tokens: Vec<String> = Vec::new();

        for word in lowered.unicode_words() {
            if word.len() > self.max_token_length {
                continue;
            }
            tokens.push(word.to_string());
        }

        tokens
    }

    /// Tokens with duplicates removed, first occurrence kept.
    pub fn unique_tokens(&self, text: &str) -> Vec<String> {
        let mut tokens = self.tokenize(text);
        let mut seen = std::collections::HashSet::new();
        tokens.retain(|t| seen.insert(t.clone()));
        tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_splits_on_word_boundaries() {
        let tokenizer = NameTokenizer::default();
        assert_eq!(
            tokenizer.tokenize("Pisco Quebranta 4 Gallos 700ml"),
            vec!["pisco", "quebranta", "4", "gallos", "700ml"]
        );
    }

    #[test]
    fn keeps_accented_words_whole() {
        let tokenizer = NameTokenizer::default();
        assert_eq!(tokenizer.tokenize("Añejo  Ron-Cartavio"), vec!["añejo", "ron", "cartavio"]);
    }

    #[test]
    fn unique_tokens_drop_repeats() {
        let tokenizer = NameTokenizer::default();
        assert_eq!(tokenizer.unique_tokens("Ron ron RON blanco"), vec!["ron", "blanco"]);
    }
}
