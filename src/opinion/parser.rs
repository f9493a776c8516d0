//! Layered extraction of opinion scores, with failure accounting.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use rand::{RngExt, SeedableRng};
use rand_chacha::ChaCha8Rng;
use regex::Regex;

/// Characters of a raw response kept in the failure log.
const MAX_LOGGED_RESPONSE: usize = 200;

/// Extracts a clamped opinion score from arbitrary model output.
///
/// Strategies run in order against the emphasis-stripped response; the
/// first hit wins and is clamped to [-1.0, 1.0]. When none hit, the
/// result is the caller's fallback value plus bounded uniform noise, so
/// repeated failures drift an opinion by at most 0.1 per conversation
/// and never push it out of range. Attempt and failure counts accumulate
/// on the parser instance; failures are additionally appended to an
/// observability log when one is configured.
pub struct OpinionParser {
    /// `OPINION:` marker followed by a signed decimal.
    labeled: Regex,
    /// Any signed decimal after the marker on the same line.
    after_marker: Regex,
    /// Case-insensitive "opinion" with a decimal in a short window after it.
    near_word: Regex,
    attempts: AtomicU64,
    failures: AtomicU64,
    failure_log: Option<PathBuf>,
    noise: Mutex<ChaCha8Rng>,
}

impl OpinionParser {
    /// Creates a parser with no failure log and entropy-seeded noise.
    pub fn new() -> Self {
        Self {
            labeled: Regex::new(r"OPINION:\s*([-+]?\d*\.?\d+)")
                .expect("Invalid labeled opinion regex"),
            after_marker: Regex::new(r"OPINION[^\n]*?([-+]?\d*\.?\d+)")
                .expect("Invalid after-marker opinion regex"),
            near_word: Regex::new(r"(?i)opinion.{0,30}?([-+]?\d*\.?\d+)")
                .expect("Invalid near-word opinion regex"),
            attempts: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            failure_log: None,
            noise: Mutex::new(ChaCha8Rng::from_rng(&mut rand::rng())),
        }
    }

    /// Appends failure records to the given file.
    pub fn with_failure_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.failure_log = Some(path.into());
        self
    }

    /// Seeds the fallback noise for reproducible failure-path outcomes.
    pub fn with_seed(self, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_rng(&mut rand::rng()),
        };
        Self {
            noise: Mutex::new(rng),
            ..self
        }
    }

    /// Extracts an opinion score from `response`, always in [-1.0, 1.0].
    pub fn extract(&self, response: &str, fallback: f64) -> f64 {
        self.attempts.fetch_add(1, Ordering::Relaxed);

        // Strip emphasis markers so "**OPINION:** **-0.72**" still matches.
        let plain = response.replace('*', "").replace('_', "");
        for strategy in [&self.labeled, &self.after_marker, &self.near_word] {
            if let Some(value) = capture_float(strategy, &plain) {
                return value.clamp(-1.0, 1.0);
            }
        }

        self.record_failure(response, fallback)
    }

    /// Total extraction attempts so far.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Total extraction failures so far.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Failures as a percentage of attempts; 0.0 before the first attempt.
    pub fn failure_rate(&self) -> f64 {
        let attempts = self.attempts();
        if attempts == 0 {
            return 0.0;
        }
        100.0 * self.failures() as f64 / attempts as f64
    }

    fn record_failure(&self, response: &str, fallback: f64) -> f64 {
        let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
        let attempts = self.attempts.load(Ordering::Relaxed);
        let rate = 100.0 * failures as f64 / attempts as f64;

        tracing::warn!(
            failures,
            attempts,
            fallback,
            "no opinion token found; applying bounded-noise fallback"
        );

        if let Some(path) = &self.failure_log {
            let line = format!(
                "Failure {failures}/{attempts} ({rate:.1}%) | fallback={fallback:.2} | response={}\n",
                flatten_truncate(response, MAX_LOGGED_RESPONSE)
            );
            if let Err(err) = append_line(path, &line) {
                tracing::warn!(
                    error = %err,
                    path = %path.display(),
                    "failed to append parse-failure log"
                );
            }
        }

        let noise = {
            let mut rng = self.noise.lock().unwrap_or_else(PoisonError::into_inner);
            rng.random_range(-0.1..=0.1)
        };
        (fallback + noise).clamp(-1.0, 1.0)
    }
}

impl Default for OpinionParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the labeled opinion trailer from display text.
///
/// Everything from an `OPINION:` marker to the end of its line goes away,
/// along with the newline in front of it, so stored conversations show
/// only what the agents "said".
pub fn strip_opinion_line(text: &str) -> String {
    let re = Regex::new(r"\n?OPINION:.*").expect("Invalid opinion trailer regex");
    re.replace_all(text, "").trim().to_string()
}

/// Recovers the last numeric opinion embedded in free text.
///
/// Stance labels carry their score in clauses like
/// `"(opinion score: 0.35)"` or `"Opinion score -0.40"`; the last decimal
/// in the text wins when it lies within [-1.0, 1.0]. Anything else reads
/// as neutral 0.0.
pub fn embedded_score(text: &str) -> f64 {
    let re = Regex::new(r"[-+]?\d*\.?\d+").expect("Invalid embedded score regex");
    let Some(last) = re.find_iter(text).last() else {
        return 0.0;
    };
    match last.as_str().parse::<f64>() {
        Ok(value) if (-1.0..=1.0).contains(&value) => value,
        _ => 0.0,
    }
}

fn capture_float(strategy: &Regex, text: &str) -> Option<f64> {
    strategy
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

fn flatten_truncate(text: &str, max_chars: usize) -> String {
    text.replace(['\n', '\r'], " ")
        .chars()
        .take(max_chars)
        .collect()
}

fn append_line(path: &PathBuf, line: &str) -> std::io::Result<()> {
    use std::io::Write;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    file.write_all(line.as_bytes())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn seeded_parser() -> OpinionParser {
        OpinionParser::new().with_seed(Some(42))
    }

    #[test]
    fn test_extract_labeled_line() {
        let parser = seeded_parser();
        let value = parser.extract("I hold my position.\nOPINION: 0.35", 0.0);
        assert_eq!(value, 0.35);
        assert_eq!(parser.attempts(), 1);
        assert_eq!(parser.failures(), 0);
    }

    #[test]
    fn test_extract_emphasized_markup() {
        let parser = seeded_parser();
        assert_eq!(parser.extract("**OPINION:** **-0.72**", 0.0), -0.72);
        assert_eq!(parser.extract("_OPINION: 0.15_", 0.0), 0.15);
    }

    #[test]
    fn test_extract_clamps_out_of_range() {
        let parser = seeded_parser();
        assert_eq!(parser.extract("OPINION: 1.8", 0.0), 1.0);
        assert_eq!(parser.extract("OPINION: -3", 0.0), -1.0);
    }

    #[test]
    fn test_extract_loose_marker_same_line() {
        let parser = seeded_parser();
        assert_eq!(parser.extract("OPINION = 0.42 after reflection", 0.0), 0.42);
    }

    #[test]
    fn test_extract_word_window() {
        let parser = seeded_parser();
        assert_eq!(
            parser.extract("Fair points. My opinion is now 0.25 overall.", 0.0),
            0.25
        );
    }

    #[test]
    fn test_extract_prefers_labeled_over_earlier_numbers() {
        let parser = seeded_parser();
        let value = parser.extract("I cited 3 studies and 0.9 confidence.\nOPINION: -0.2", 0.0);
        assert_eq!(value, -0.2);
    }

    #[test]
    fn test_extract_failure_returns_bounded_noise() {
        let parser = seeded_parser();
        let value = parser.extract("no numeric token anywhere in this reply", 0.5);

        assert!((0.4..=0.6).contains(&value));
        assert_eq!(parser.attempts(), 1);
        assert_eq!(parser.failures(), 1);
    }

    #[test]
    fn test_extract_failure_noise_stays_clamped() {
        let parser = seeded_parser();
        for _ in 0..20 {
            let value = parser.extract("still nothing parseable", 1.0);
            assert!((0.9..=1.0).contains(&value));
        }
    }

    #[test]
    fn test_counters_and_rate_accumulate() {
        let parser = seeded_parser();
        parser.extract("OPINION: 0.1", 0.0);
        parser.extract("OPINION: 0.2", 0.0);
        parser.extract("garbage", 0.0);

        assert_eq!(parser.attempts(), 3);
        assert_eq!(parser.failures(), 1);
        assert!((parser.failure_rate() - 33.3).abs() < 0.1);
    }

    #[test]
    fn test_failure_log_format() {
        let dir = TempDir::new().expect("failed to create temp dir");
        let log_path = dir.path().join("parse_failures.log");
        let parser = OpinionParser::new()
            .with_seed(Some(7))
            .with_failure_log(&log_path);

        parser.extract("first line\nsecond line with no score", 0.0);

        let contents = std::fs::read_to_string(&log_path).expect("failure log should exist");
        assert!(contents.starts_with("Failure 1/1 (100.0%) | fallback=0.00 | response="));
        // Newlines are flattened so each failure stays on one log line.
        assert!(contents.contains("first line second line with no score"));
        assert_eq!(contents.lines().count(), 1);
    }

    #[test]
    fn test_failure_log_truncates_long_responses() {
        let dir = TempDir::new().expect("failed to create temp dir");
        let log_path = dir.path().join("parse_failures.log");
        let parser = OpinionParser::new()
            .with_seed(Some(7))
            .with_failure_log(&log_path);

        parser.extract(&"x".repeat(500), 0.0);

        let contents = std::fs::read_to_string(&log_path).expect("failure log should exist");
        let logged = contents
            .trim_end()
            .rsplit("response=")
            .next()
            .expect("log line should carry a response field");
        assert_eq!(logged.chars().count(), MAX_LOGGED_RESPONSE);
    }

    #[test]
    fn test_seeded_failure_path_is_reproducible() {
        let first = OpinionParser::new()
            .with_seed(Some(99))
            .extract("nothing", 0.0);
        let second = OpinionParser::new()
            .with_seed(Some(99))
            .extract("nothing", 0.0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_strip_opinion_line_removes_trailer() {
        assert_eq!(
            strip_opinion_line("Costs balloon in every pilot.\nOPINION: -0.55"),
            "Costs balloon in every pilot."
        );
        assert_eq!(strip_opinion_line("Inline OPINION: 0.4"), "Inline");
    }

    #[test]
    fn test_strip_opinion_line_keeps_following_text() {
        assert_eq!(
            strip_opinion_line("First point.\nOPINION: 0.3\nAfterthought."),
            "First point.\nAfterthought."
        );
    }

    #[test]
    fn test_strip_opinion_line_without_trailer_is_identity() {
        assert_eq!(strip_opinion_line("  just an argument  "), "just an argument");
    }

    #[test]
    fn test_embedded_score_from_stance_labels() {
        assert_eq!(
            embedded_score("Somewhat in favor of the position on T (opinion score: 0.35)"),
            0.35
        );
        assert_eq!(embedded_score("Opinion score -0.40"), -0.40);
    }

    #[test]
    fn test_embedded_score_last_number_wins() {
        assert_eq!(embedded_score("moved from 0.1 to 0.3"), 0.3);
    }

    #[test]
    fn test_embedded_score_defaults_to_neutral() {
        assert_eq!(embedded_score("no stated opinion yet"), 0.0);
        assert_eq!(embedded_score(""), 0.0);
        // An out-of-range trailing number reads as neutral, not clamped.
        assert_eq!(embedded_score("scored it 8.5"), 0.0);
    }
}
