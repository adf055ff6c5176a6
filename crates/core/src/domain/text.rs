/// Lowercased word tokens of a user message. Punctuation separates tokens; apostrophes stay
/// so "don't" remains one word.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut sanitized = String::with_capacity(lowered.len());
    for character in lowered.chars() {
        if character.is_alphanumeric() || character == '\'' {
            sanitized.push(character);
        } else {
            sanitized.push(' ');
        }
    }
    sanitized.split_whitespace().map(|token| token.to_string()).collect()
}
