use documind_core::config::{NormalizerConfig, Punctuation};
use documind_core::tokenizer::{tokenize, Normalizer};

fn words(text: &str) -> Vec<String> {
    tokenize(text).into_iter().map(|t| t.term).collect()
}

#[test]
fn it_case_folds_and_applies_nfkc() {
    let toks = words("ＲＵＳＴ Rust RUST");
    assert_eq!(toks, vec!["rust", "rust", "rust"]);
}

#[test]
fn it_filters_stopwords() {
    let toks = words("The quick brown fox and the lazy dog");
    assert!(!toks.contains(&"the".to_string()));
    assert!(!toks.contains(&"and".to_string()));
    assert_eq!(toks, vec!["quick", "brown", "fox", "lazy", "dog"]);
}

#[test]
fn it_splits_on_punctuation_and_symbols() {
    assert_eq!(words("growth/marketing+sales...done!"), vec!["growth", "marketing", "sales", "done"]);
}

#[test]
fn it_can_be_consumed_repeatedly() {
    let toks = tokenize("alpha beta alpha");
    let freq = toks.iter().filter(|t| t.term == "alpha").count();
    let positions: Vec<u32> = toks.iter().filter(|t| t.term == "alpha").map(|t| t.position).collect();
    assert_eq!(freq, 2);
    assert_eq!(positions, vec![0, 2]);
}

#[test]
fn it_stems_when_configured() {
    let n = Normalizer::new(&NormalizerConfig { stem: true, punctuation: Punctuation::Boundary, stopwords: None });
    let toks = n.terms("Running runs");
    assert_eq!(toks, vec!["run", "run"]);
}

#[test]
fn empty_and_punctuation_only_input() {
    assert!(tokenize("").is_empty());
    assert!(tokenize("...---!!!").is_empty());
}

#[test]
fn it_keeps_contractions_whole() {
    assert!(words("don't it's").is_empty());
    assert!(words("Don\u{2019}t stop").contains(&"stop".to_string()));
    assert_eq!(words("'quoted' rock'n'roll"), vec!["quoted", "rock'n'roll"]);

    let remove = Normalizer::new(&NormalizerConfig { punctuation: Punctuation::Remove, ..Default::default() });
    assert_eq!(remove.terms("they're e-mail"), vec!["email"]);
}
