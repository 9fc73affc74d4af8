//! Speech duration estimate from lexical features.
//!
//! This is a heuristic, not acoustic timing: syllables are approximated by
//! vowel runs and punctuation adds a pause. Onsets are monotonic
//! non-decreasing and the estimate is later rescaled to the real audio
//! duration, so only the relative spacing of words matters.

use crate::defaults::WORDS_PER_MINUTE;

/// Pause after a word ending in `.`, `,`, `!` or `?`.
const TERMINAL_PAUSE_SECS: f64 = 0.25;
/// Pause after a word ending in `:` or `;`.
const CLAUSE_PAUSE_SECS: f64 = 0.15;
/// Syllables spoken per "word" at the nominal rate.
const SYLLABLES_PER_WORD: f64 = 3.0;
const MAX_SYLLABLES: u32 = 5;

/// Estimated timeline for a piece of speakable text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpeechEstimate {
    pub total_seconds: f64,
    /// Onset of each word, seconds from the start.
    pub onsets: Vec<f64>,
    /// Duration of each word including its punctuation pause.
    pub durations: Vec<f64>,
}

impl SpeechEstimate {
    /// Onset of word `index`, clamped to the last word; 0 for empty text.
    pub fn onset(&self, index: usize) -> f64 {
        self.onsets
            .get(index.min(self.onsets.len().saturating_sub(1)))
            .copied()
            .unwrap_or(0.0)
    }

    /// Onset of word `index` as a fraction of the total, in [0, 1].
    pub fn normalized_onset(&self, index: usize) -> f64 {
        if self.total_seconds > 0.0 {
            (self.onset(index) / self.total_seconds).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// Estimate per-word onsets for `text` spoken at `words_per_minute`.
///
/// A non-positive or non-finite rate falls back to the default rate.
pub fn estimate(text: &str, words_per_minute: f64) -> SpeechEstimate {
    let wpm = if words_per_minute.is_finite() && words_per_minute > 0.0 {
        words_per_minute
    } else {
        WORDS_PER_MINUTE
    };

    let mut estimate = SpeechEstimate::default();
    for word in text.split_whitespace() {
        let duration = word_duration(word, wpm);
        estimate.onsets.push(estimate.total_seconds);
        estimate.durations.push(duration);
        estimate.total_seconds += duration;
    }
    estimate
}

/// Seconds needed to speak `word`, including any punctuation pause.
pub fn word_duration(word: &str, words_per_minute: f64) -> f64 {
    let words_per_second = words_per_minute / 60.0;
    let spoken = f64::from(syllables(word)) / SYLLABLES_PER_WORD / words_per_second;
    spoken + punctuation_pause(word)
}

/// Approximate syllable count: runs of vowel letters, clamped to 1..=5.
pub fn syllables(word: &str) -> u32 {
    let mut runs = 0;
    let mut in_vowel = false;
    for ch in word.chars() {
        let vowel = matches!(ch.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
        if vowel && !in_vowel {
            runs += 1;
        }
        in_vowel = vowel;
    }
    runs.clamp(1, MAX_SYLLABLES)
}

fn punctuation_pause(word: &str) -> f64 {
    // Closing quotes and brackets don't hide the punctuation before them.
    let trimmed = word.trim_end_matches(['"', '\'', ')', ']', '\u{201D}', '\u{2019}']);
    let Some(last) = trimmed.chars().last() else {
        return 0.0;
    };

    let mut pause = 0.0;
    if matches!(last, '.' | ',' | '!' | '?') {
        pause += TERMINAL_PAUSE_SECS;
    }
    if matches!(last, ':' | ';') {
        pause += CLAUSE_PAUSE_SECS;
    }
    pause
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn test_syllables_count_vowel_runs() {
        assert_eq!(syllables("hello"), 2);
        assert_eq!(syllables("beautiful"), 3); // eau, i, u
        assert_eq!(syllables("rhythm"), 1); // y
        assert_eq!(syllables("psst"), 1);
        assert_eq!(syllables("Onomatopoeia"), 5);
    }

    #[test]
    fn test_word_duration_at_180_wpm() {
        // 1 syllable: (1/3) / 3 words per second
        assert!((word_duration("cat", 180.0) - 1.0 / 9.0).abs() < EPS);
        assert!((word_duration("cat.", 180.0) - (1.0 / 9.0 + 0.25)).abs() < EPS);
        assert!((word_duration("cat;", 180.0) - (1.0 / 9.0 + 0.15)).abs() < EPS);
        assert!((word_duration("cat!\"", 180.0) - (1.0 / 9.0 + 0.25)).abs() < EPS);
    }

    #[test]
    fn test_onsets_are_cumulative_and_monotonic() {
        let e = estimate("Hello there! How are you doing today?", 180.0);

        assert_eq!(e.onsets.len(), 7);
        assert_eq!(e.onsets[0], 0.0);
        for pair in e.onsets.windows(2) {
            assert!(pair[1] >= pair[0]);
        }
        for i in 1..e.onsets.len() {
            assert!((e.onsets[i] - (e.onsets[i - 1] + e.durations[i - 1])).abs() < EPS);
        }
    }

    #[test]
    fn test_total_is_last_onset_plus_last_duration() {
        let e = estimate("one two three, four: five.", 150.0);
        let last = e.onsets.len() - 1;
        assert!((e.total_seconds - (e.onsets[last] + e.durations[last])).abs() < EPS);
    }

    #[test]
    fn test_empty_text_has_zero_total() {
        let e = estimate("   ", 180.0);
        assert_eq!(e.total_seconds, 0.0);
        assert!(e.onsets.is_empty());
        assert_eq!(e.onset(3), 0.0);
        assert_eq!(e.normalized_onset(0), 0.0);
    }

    #[test]
    fn test_invalid_rate_falls_back_to_default() {
        assert_eq!(estimate("hello world", 0.0), estimate("hello world", 180.0));
        assert_eq!(
            estimate("hello world", f64::NAN),
            estimate("hello world", 180.0)
        );
    }

    #[test]
    fn test_normalized_onset_clamps_index() {
        let e = estimate("a b c d", 180.0);
        assert!((e.normalized_onset(2) - 0.5).abs() < EPS);
        assert_eq!(e.normalized_onset(99), e.normalized_onset(3));
    }
}
