use skylore_core::tokenizer::tokenize;

#[test]
fn it_drops_symbol_and_digit_runs() {
    assert!(tokenize("  123!!  ").is_empty());
    assert!(tokenize("").is_empty());
    assert!(tokenize("\u{3000}\t\n").is_empty());
}

#[test]
fn it_drops_ascii_words_but_keeps_japanese() {
    let words = tokenize("Orion オリオン座 is 冬の星座");
    assert_eq!(words, vec!["オリオン", "座", "冬", "の", "星座"]);
}

#[test]
fn it_has_no_stopword_list() {
    // particles survive; nothing is discarded for being common
    let words = tokenize("の の が");
    assert_eq!(words, vec!["の", "の", "が"]);
}

#[test]
fn it_folds_width_variants() {
    assert_eq!(tokenize("ｵﾘｵﾝ"), vec!["オリオン"]);
}
