use crate::config::{NormalizerConfig, Punctuation};
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    // Apostrophes stay inside words so contractions match the stop-word list.
    static ref PUNCT: Regex = Regex::new(r"[\p{P}\p{S}--'\x{2019}]").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// A normalized term and its position in the surviving token stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub term: String,
    pub position: u32,
}

/// Turns raw text into index terms. Index and query text must go through the
/// same instance, otherwise postings and query terms stop lining up.
#[derive(Debug, Clone)]
pub struct Normalizer {
    punctuation: Punctuation,
    stopwords: HashSet<String>,
    stem: bool,
}

impl Default for Normalizer {
    fn default() -> Self { Self::new(&NormalizerConfig::default()) }
}

impl Normalizer {
    pub fn new(cfg: &NormalizerConfig) -> Self {
        let stopwords = match &cfg.stopwords {
            Some(words) => words.iter().map(|w| w.nfkc().collect::<String>().to_lowercase()).collect(),
            None => STOPWORDS.iter().map(|w| w.to_string()).collect(),
        };
        Self { punctuation: cfg.punctuation, stopwords, stem: cfg.stem }
    }

    fn is_stopword(&self, token: &str) -> bool { self.stopwords.contains(token) }

    /// NFKC + lowercase, punctuation handling, whitespace split, stop-word
    /// removal, optional stemming. Positions count surviving tokens only.
    pub fn normalize(&self, text: &str) -> Vec<Token> {
        let folded = text.nfkc().collect::<String>().to_lowercase().replace('\u{2019}', "'");
        let replacement = match self.punctuation {
            Punctuation::Boundary => " ",
            Punctuation::Remove => "",
        };
        let cleaned = PUNCT.replace_all(&folded, replacement);
        let mut tokens = Vec::new();
        for word in cleaned.split_whitespace() {
            let word = word.trim_matches('\'');
            if word.is_empty() || self.is_stopword(word) { continue; }
            let term = if self.stem { STEMMER.stem(word).into_owned() } else { word.to_string() };
            if term.is_empty() { continue; }
            let position = tokens.len() as u32;
            tokens.push(Token { term, position });
        }
        tokens
    }

    /// Terms only, in stream order, duplicates kept.
    pub fn terms(&self, text: &str) -> Vec<String> {
        self.normalize(text).into_iter().map(|t| t.term).collect()
    }

    /// Distinct terms in first-occurrence order, as used for queries.
    pub fn query_terms(&self, text: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.terms(text).into_iter().filter(|t| seen.insert(t.clone())).collect()
    }

    /// Whether `c` separates words in raw text under this configuration.
    pub fn is_boundary(&self, c: char) -> bool {
        if c.is_whitespace() { return true; }
        match self.punctuation {
            Punctuation::Boundary => {
                let mut buf = [0u8; 4];
                PUNCT.is_match(c.encode_utf8(&mut buf))
            }
            Punctuation::Remove => false,
        }
    }
}

/// Tokenize with the default configuration.
pub fn tokenize(text: &str) -> Vec<Token> {
    Normalizer::default().normalize(text)
}
