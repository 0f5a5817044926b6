//! Adapter Response Normalization
//!
//! Strips ELM327-style artifacts (prompt, search/bus-init chatter, line
//! breaks) and detects failure sentinels before any decoding happens.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Adapter chatter removed from every response
pub const DEFAULT_NOISE_TOKENS: &[&str] = &[
    "SEARCHING...",
    "SEARCHING",
    "BUS INIT: ...OK",
    "BUS INIT: ...",
    "BUS INIT:",
    "BUS INIT",
    ">",
];

/// Adapter strings that mean "no vehicle data in this response"
pub const DEFAULT_SENTINELS: &[&str] = &[
    "NO DATA",
    "ERROR",
    "?",
    "UNABLE TO CONNECT",
    "STOPPED",
    "CAN ERROR",
    "BUS BUSY",
    "BUFFER FULL",
    "LV RESET",
];

/// Extra vocabulary appended to the built-in noise and sentinel lists
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub extra_noise_tokens: Vec<String>,
    pub extra_sentinels: Vec<String>,
}

/// Outcome of normalizing a raw response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    /// Uppercased content. Pure hex has all whitespace removed; anything
    /// else keeps single spaces between words.
    Clean(String),
    /// Adapter failure sentinel, cleaned text kept verbatim
    Sentinel(String),
}

impl Normalized {
    pub fn as_str(&self) -> &str {
        match self {
            Normalized::Clean(text) | Normalized::Sentinel(text) => text,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, Normalized::Sentinel(_))
    }
}

/// Response normalizer with a fixed noise/sentinel vocabulary
#[derive(Debug, Clone)]
pub struct Normalizer {
    /// Longest first, so `SEARCHING...` wins over `SEARCHING`
    noise_tokens: Vec<String>,
    sentinels: Vec<String>,
}

impl Normalizer {
    pub fn new(config: &NormalizerConfig) -> Self {
        let mut noise_tokens = merge(DEFAULT_NOISE_TOKENS, &config.extra_noise_tokens);
        noise_tokens.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        Self {
            noise_tokens,
            sentinels: merge(DEFAULT_SENTINELS, &config.extra_sentinels),
        }
    }

    /// Normalize a raw adapter response. Pure; normalizing the text of a
    /// previous result yields the same result.
    pub fn normalize(&self, raw: &str) -> Normalized {
        let mut text = collapse_whitespace(&raw.to_uppercase());
        loop {
            let stripped = self.strip_noise(&text);
            if stripped == text {
                break;
            }
            text = stripped;
        }

        if self.sentinels.iter().any(|s| text.contains(s.as_str())) {
            return Normalized::Sentinel(text);
        }

        let is_hex = text
            .split(' ')
            .all(|word| word.chars().all(|c| c.is_ascii_hexdigit()));
        if is_hex {
            Normalized::Clean(text.replace(' ', ""))
        } else {
            Normalized::Clean(text)
        }
    }

    fn strip_noise(&self, text: &str) -> String {
        let mut out = text.to_string();
        for token in &self.noise_tokens {
            if out.contains(token.as_str()) {
                out = out.replace(token.as_str(), " ");
            }
        }
        strip_frame_labels(&collapse_whitespace(&out))
    }
}

/// Drop ISO-TP multi-frame framing: the `0:`, `1:`, ... line labels and
/// the 3-digit byte-count line that precedes the first frame.
fn strip_frame_labels(text: &str) -> String {
    let words: Vec<&str> = text.split(' ').collect();
    if !words.iter().any(|word| is_frame_label(word)) {
        return text.to_string();
    }

    words
        .iter()
        .enumerate()
        .filter(|&(idx, word)| {
            let length_line = word.len() == 3
                && word.chars().all(|c| c.is_ascii_hexdigit())
                && words.get(idx + 1) == Some(&"0:");
            !is_frame_label(word) && !length_line
        })
        .map(|(_, word)| *word)
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_frame_label(word: &str) -> bool {
    matches!(word.as_bytes(), [digit, b':'] if digit.is_ascii_hexdigit())
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default())
    }
}

static DEFAULT_NORMALIZER: LazyLock<Normalizer> = LazyLock::new(Normalizer::default);

/// Normalize with the built-in vocabulary
pub fn normalize(raw: &str) -> Normalized {
    DEFAULT_NORMALIZER.normalize(raw)
}

fn merge(defaults: &[&str], extra: &[String]) -> Vec<String> {
    let mut merged: Vec<String> = defaults.iter().map(|s| s.to_string()).collect();
    for token in extra {
        let token = token.trim().to_uppercase();
        if !token.is_empty() && !merged.contains(&token) {
            merged.push(token);
        }
    }
    merged
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_strips_prompt_and_line_endings() {
        assert_eq!(
            normalize("41 0C 1A F8\r\n\r\n>"),
            Normalized::Clean("410C1AF8".to_string())
        );
    }

    #[test]
    fn test_strips_searching() {
        assert_eq!(
            normalize("SEARCHING...43 01 01 33>"),
            Normalized::Clean("43010133".to_string())
        );
        assert_eq!(
            normalize("searching...\r41 0d 32\r"),
            Normalized::Clean("410D32".to_string())
        );
    }

    #[test]
    fn test_strips_bus_init() {
        assert_eq!(
            normalize("BUS INIT: ...OK\r41 05 7B\r\r>"),
            Normalized::Clean("41057B".to_string())
        );
        assert_eq!(
            normalize("BUS INIT: ...ERROR"),
            Normalized::Sentinel("ERROR".to_string())
        );
    }

    #[test]
    fn test_sentinels() {
        for (raw, expected) in [
            ("NO DATA", "NO DATA"),
            ("NO DATA\r\n\r\n>", "NO DATA"),
            ("?", "?"),
            ("SEARCHING...\rUNABLE TO CONNECT\r>", "UNABLE TO CONNECT"),
            ("STOPPED", "STOPPED"),
            ("CAN ERROR", "CAN ERROR"),
            ("41 0C 1A F8\rNO DATA", "41 0C 1A F8 NO DATA"),
        ] {
            assert_eq!(normalize(raw), Normalized::Sentinel(expected.to_string()), "{raw:?}");
        }
    }

    #[test]
    fn test_text_keeps_word_spacing() {
        assert_eq!(normalize("  ok \r"), Normalized::Clean("OK".to_string()));
        assert_eq!(
            normalize("ELM327  v1.5\r\r>"),
            Normalized::Clean("ELM327 V1.5".to_string())
        );
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize(""), Normalized::Clean(String::new()));
        assert_eq!(normalize(" \r\n>"), Normalized::Clean(String::new()));
    }

    #[test]
    fn test_extra_vocabulary() {
        let normalizer = Normalizer::new(&NormalizerConfig {
            extra_noise_tokens: vec!["  wait ".to_string()],
            extra_sentinels: vec!["act alert".to_string()],
        });
        assert_eq!(
            normalizer.normalize("WAIT 41 0D 32"),
            Normalized::Clean("410D32".to_string())
        );
        assert!(normalizer.normalize("ACT ALERT").is_sentinel());
        // built-ins still apply
        assert!(normalizer.normalize("NO DATA").is_sentinel());
    }

    #[test]
    fn test_strips_multi_frame_labels() {
        assert_eq!(
            normalize("00A\r0: 43 04 01 23 40 45\r1: 80 67 C0 89 00 00 00\r\r>"),
            Normalized::Clean("4304012340458067C089000000".to_string())
        );
        assert_eq!(
            normalize("014\r0: 49 02 01 31 47 31\r1: 4A 43 35 34 34 34 52\r2: 37 32 35 32 33 36 37\r>"),
            Normalized::Clean("4902013147314A43353434345237323532333637".to_string())
        );
    }

    #[test]
    fn test_length_line_kept_without_frames() {
        // a 3-digit word only counts as a byte count when frames follow
        assert_eq!(normalize("7E8 03 41 0D 32"), Normalized::Clean("7E803410D32".to_string()));
    }

    #[test]
    fn test_token_split_by_whitespace_is_still_stripped() {
        let first = normalize("BUS   INIT 41 0D 32");
        assert_eq!(first, Normalized::Clean("410D32".to_string()));
    }

    proptest! {
        #[test]
        fn prop_idempotent(raw in "[ -~\r\n\t]{0,60}") {
            let once = normalize(&raw);
            let twice = normalize(once.as_str());
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_sentinel_always_wins(
            prefix in "[0-9A-F ]{0,12}",
            sentinel in prop::sample::select(vec!["NO DATA", "ERROR", "?"]),
            suffix in "[0-9A-F >\r]{0,12}",
        ) {
            let raw = format!("{prefix}{sentinel}{suffix}");
            prop_assert!(normalize(&raw).is_sentinel());
        }

        #[test]
        fn prop_hex_output_has_no_whitespace(bytes in proptest::collection::vec(any::<u8>(), 1..12)) {
            let raw = bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" ");
            let normalized = normalize(&format!("{raw}\r\r>"));
            prop_assert_eq!(normalized, Normalized::Clean(hex::encode_upper(&bytes)));
        }
    }
}
