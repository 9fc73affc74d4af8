//! Speakable text: what the speech synthesizer should read aloud.
//!
//! Directive blocks, `<command>...</command>` sections and markup tags are
//! removed. Each remaining word remembers the character offset it started at
//! in the origin text, which is how directives are placed between words.

/// A word of speakable text and where it started in the origin text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpokenWord {
    pub text: String,
    pub source_offset: usize,
}

/// Text with directives and markup removed, plus its word table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpeakableText {
    /// Words joined by single spaces.
    pub text: String,
    pub words: Vec<SpokenWord>,
}

impl SpeakableText {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Index of the last word that started before `source_offset`.
    ///
    /// Offsets before the first word map to word 0.
    pub fn word_index_at(&self, source_offset: usize) -> usize {
        self.words
            .iter()
            .take_while(|w| w.source_offset < source_offset)
            .count()
            .saturating_sub(1)
    }
}

const COMMAND_OPEN: &str = "<command>";
const COMMAND_CLOSE: &str = "</command>";

/// Strip directives and markup from `full`, keeping a word table.
pub fn speakable(full: &str) -> SpeakableText {
    let chars: Vec<char> = full.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    let mut current_start = 0;
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];

        if let Some(skip_to) = skipped_span_end(&chars, i) {
            flush(&mut words, &mut current, current_start);
            i = skip_to;
            continue;
        }

        if ch.is_whitespace() {
            flush(&mut words, &mut current, current_start);
        } else {
            if current.is_empty() {
                current_start = i;
            }
            current.push(ch);
        }
        i += 1;
    }
    flush(&mut words, &mut current, current_start);

    let text = words
        .iter()
        .map(|w: &SpokenWord| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    SpeakableText { text, words }
}

fn flush(words: &mut Vec<SpokenWord>, current: &mut String, start: usize) {
    if !current.is_empty() {
        words.push(SpokenWord {
            text: std::mem::take(current),
            source_offset: start,
        });
    }
}

/// If a non-spoken span starts at `i`, return the index just past it.
fn skipped_span_end(chars: &[char], i: usize) -> Option<usize> {
    match chars[i] {
        '<' if starts_with_ignore_case(&chars[i..], COMMAND_OPEN) => {
            let body = i + COMMAND_OPEN.len();
            match find_ignore_case(chars, body, COMMAND_CLOSE) {
                Some(close) => Some(close + COMMAND_CLOSE.len()),
                None => Some(body),
            }
        }
        '<' if chars
            .get(i + 1)
            .is_some_and(|c| c.is_ascii_alphabetic() || matches!(c, '/' | '!')) =>
        {
            find_char(chars, i + 1, '>').map(|close| close + 1)
        }
        '{' => find_char(chars, i + 1, '}').map(|close| close + 1),
        _ => None,
    }
}

fn find_char(chars: &[char], from: usize, target: char) -> Option<usize> {
    chars[from.min(chars.len())..]
        .iter()
        .position(|c| *c == target)
        .map(|pos| from + pos)
}

fn starts_with_ignore_case(chars: &[char], needle: &str) -> bool {
    let mut it = chars.iter();
    needle
        .chars()
        .all(|n| it.next().is_some_and(|c| c.eq_ignore_ascii_case(&n)))
}

fn find_ignore_case(chars: &[char], from: usize, needle: &str) -> Option<usize> {
    (from..chars.len()).find(|&pos| starts_with_ignore_case(&chars[pos..], needle))
}
