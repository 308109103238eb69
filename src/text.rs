/// Prepare accumulated section text for the corpus.
///
/// Undoes formatter hyphenation, keeps ASCII letters, drops apostrophes so
/// contractions stay one word, turns everything else into spaces, then
/// collapses whitespace and lowercases.
pub fn normalize(text: &str) -> String {
    let joined = text.replace("- ", "");
    let mapped: String = joined
        .chars()
        .filter(|&c| c != '\'')
        .map(|c| if c.is_ascii_alphabetic() { c } else { ' ' })
        .collect();
    mapped
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Split `text` into lowercase terms of at least two word characters.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| w.chars().count() >= 2)
        .map(str::to_lowercase)
        .collect()
}
