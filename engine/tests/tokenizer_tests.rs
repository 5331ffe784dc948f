use tern_engine::Tokenizer;

#[test]
fn it_normalizes_and_stems() {
    let tokenizer = Tokenizer::new();
    let terms = tokenizer.tokenize("Running Runners RUN!");
    assert!(terms.contains(&"run".to_string()));
    assert!(!terms.iter().any(|t| t.chars().any(|c| c.is_uppercase())));
}

#[test]
fn it_filters_stopwords() {
    let tokenizer = Tokenizer::new();
    let terms = tokenizer.tokenize("The quick brown fox and the lazy dog");
    assert!(!terms.contains(&"the".to_string()));
    assert!(!terms.contains(&"and".to_string()));
    assert!(terms.contains(&"fox".to_string()));
    assert!(terms.contains(&"dog".to_string()));
}

#[test]
fn it_deletes_non_letter_characters() {
    let tokenizer = Tokenizer::new();
    // Digits and punctuation vanish without splitting the token.
    assert_eq!(tokenizer.tokenize("rust-lang 2024"), vec!["rustlang"]);
    // Non-ASCII letters are stripped too, not transliterated.
    assert_eq!(tokenizer.tokenize("café menu"), vec!["caf", "menu"]);
}

#[test]
fn stopword_check_runs_before_stemming() {
    let tokenizer = Tokenizer::new();
    // "having" is a stopword as written; "have" would survive stemming,
    // so the raw form must be what gets checked.
    assert!(tokenizer.tokenize("having doubts").contains(&"doubt".to_string()));
    assert!(!tokenizer
        .tokenize("having doubts")
        .iter()
        .any(|t| t == "have" || t == "having"));
}
