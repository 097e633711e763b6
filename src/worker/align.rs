/// Text cut to fit a chunk's duration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alignment {
    pub text: String,
    pub budget: usize,
    pub truncated: bool,
}

/// `floor(duration × words_per_second)`
pub fn word_budget(duration_ms: u64, words_per_second: f64) -> usize {
    let words = duration_ms as f64 * words_per_second / 1000.0;
    if words.is_finite() && words > 0.0 {
        words.floor() as usize
    } else {
        0
    }
}

/// Keep the first `budget` words of `body`.
///
/// Empty text stays empty. Non-empty text with a zero budget becomes the
/// placeholder.
pub fn align_text(body: &str, duration_ms: u64, words_per_second: f64, placeholder: &str) -> Alignment {
    let budget = word_budget(duration_ms, words_per_second);
    let words: Vec<&str> = body.split_whitespace().collect();

    if words.is_empty() {
        return Alignment {
            text: String::new(),
            budget,
            truncated: false,
        };
    }
    if budget == 0 {
        return Alignment {
            text: placeholder.to_string(),
            budget,
            truncated: true,
        };
    }

    let truncated = words.len() > budget;
    Alignment {
        text: words[..words.len().min(budget)].join(" "),
        budget,
        truncated,
    }
}
