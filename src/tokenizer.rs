//! Code-aware subword tokenizer shared by the BM25 index and the searcher layer.
//!
//! Both index-time and query-time tokenization MUST go through [`tokenize`] —
//! divergence between the two silently breaks recall (see crate-level docs).
//! This module is pure: no I/O, no locking, no fallible paths. Given the same
//! input it always produces the same output.

/// Minimum surviving token length after camel/snake splitting.
const MIN_TOKEN_LEN: usize = 2;

/// Programming keywords and generic noise words dropped from every token stream.
///
/// Kept small and deliberately generic (not per-language) since the tokenizer
/// runs over many languages indiscriminately.
const STOP_WORDS: &[&str] = &[
    "var", "let", "const", "func", "function", "def", "class", "return", "if", "else", "for",
    "while", "data", "result", "value", "item", "key", "err", "ctx", "tmp",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// The default stop-word list, owned, for config defaults and callers who
/// want to extend it.
pub fn default_stop_words() -> Vec<String> {
    STOP_WORDS.iter().map(|s| s.to_string()).collect()
}

/// Split an identifier into camelCase/acronym-aware subwords.
///
/// A boundary is emitted before an uppercase letter iff either the previous
/// rune is lowercase or the next rune is lowercase. This keeps runs of
/// consecutive uppercase letters (acronyms) together: `parseHTTPRequest`
/// becomes `["parse", "HTTP", "Request"]`, not `["parse", "H", "T", "T", "P",
/// "Request"]`.
///
/// Returns the original (non-lowercased) casing; callers lowercase afterward.
pub fn split_camel(word: &str) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && !current.is_empty() {
            let prev_lower = chars[i - 1].is_lowercase();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev_lower || next_lower {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Split a maximal `[A-Za-z0-9_]` run into subwords: snake_case first, then
/// camelCase within each snake-segment.
fn split_run(run: &str) -> impl Iterator<Item = String> + '_ {
    run.split('_')
        .filter(|s| !s.is_empty())
        .flat_map(split_camel)
}

/// Tokenize source text into lowercased subword tokens, minimum length 2,
/// with stop words removed.
///
/// Deterministic and side-effect free. Used identically at index time (over
/// chunk content) and query time (over the user's query string) so that the
/// two sides of the inverted index agree on vocabulary.
///
/// ```
/// use hybridex::tokenizer::tokenize;
///
/// assert_eq!(
///     tokenize("parseHTTPRequest"),
///     vec!["parse", "http", "request"]
/// );
/// assert_eq!(tokenize("get_user_by_id"), vec!["user", "by", "id"]);
/// ```
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut run = String::new();

    let mut flush = |run: &mut String, tokens: &mut Vec<String>| {
        if run.is_empty() {
            return;
        }
        for piece in split_run(run) {
            let lowered = piece.to_lowercase();
            if lowered.len() >= MIN_TOKEN_LEN && !is_stop_word(&lowered) {
                tokens.push(lowered);
            }
        }
        run.clear();
    };

    for c in text.chars() {
        if c.is_ascii_alphanumeric() || c == '_' {
            run.push(c);
        } else {
            flush(&mut run, &mut tokens);
        }
    }
    flush(&mut run, &mut tokens);

    tokens
}

/// Join tokens with spaces — the stream an FTS engine indexes or matches against.
pub fn tokenize_joined(text: &str) -> String {
    tokenize(text).join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_camel_examples() {
        assert_eq!(
            split_camel("parseHTTPRequest"),
            vec!["parse", "HTTP", "Request"]
        );
        assert_eq!(split_camel("HTTPHandler"), vec!["HTTP", "Handler"]);
        assert_eq!(
            split_camel("getUserById"),
            vec!["get", "User", "By", "Id"]
        );
        assert_eq!(split_camel(""), Vec::<String>::new());
    }

    #[test]
    fn tokenize_is_deterministic() {
        let text = "fn parseHTTPRequest(ctx: &Context) -> Result<Value, Error>";
        assert_eq!(tokenize(text), tokenize(text));
    }

    #[test]
    fn tokenize_lowercases_and_enforces_min_length() {
        for tok in tokenize("parseHTTPRequest a ab XMLParser2") {
            assert_eq!(tok, tok.to_lowercase());
            assert!(tok.len() >= MIN_TOKEN_LEN);
        }
    }

    #[test]
    fn tokenize_drops_stop_words() {
        let tokens = tokenize("func getUserById(ctx) { var result = data }");
        assert!(!tokens.contains(&"func".to_string()));
        assert!(!tokens.contains(&"var".to_string()));
        assert!(!tokens.contains(&"ctx".to_string()));
        assert!(!tokens.contains(&"data".to_string()));
        assert!(!tokens.contains(&"result".to_string()));
        assert!(tokens.contains(&"get".to_string()));
        assert!(tokens.contains(&"user".to_string()));
        assert!(tokens.contains(&"by".to_string()));
        assert!(tokens.contains(&"id".to_string()));
    }

    #[test]
    fn tokenize_snake_and_camel_agree() {
        assert_eq!(tokenize("getUserById"), tokenize("get_user_by_id"));
    }

    #[test]
    fn tokenize_empty_or_whitespace() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("   \t\n").is_empty());
    }
}
