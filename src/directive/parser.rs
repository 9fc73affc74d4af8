//! Directive block extraction.
//!
//! Blocks are non-nesting `{...}` spans. Inside a block, pairs are separated
//! by `;` and keys are case-insensitive. Malformed numbers never abort a
//! block: the field is left empty and downstream stages ignore it.

use crate::config::RandomConfig;
use crate::directive::{Command, Directive, DirectiveKind};
use crate::error::HapticError;
use rand::Rng;
use tracing::debug;

/// Token that makes `values` generate a procedural series.
const RANDOM_VALUES: &str = "random";

/// A `{...}` block located in the origin text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan<'a> {
    /// Character offset of the opening brace.
    pub char_offset: usize,
    /// Text between the braces.
    pub content: &'a str,
}

/// Find every non-empty `{...}` block, leftmost first.
///
/// A second `{` before the closing brace is part of the content; an
/// unterminated `{` produces no block.
pub fn block_spans(text: &str) -> Vec<BlockSpan<'_>> {
    let mut spans = Vec::new();
    let mut open: Option<(usize, usize)> = None;

    for (char_pos, (byte_pos, ch)) in text.char_indices().enumerate() {
        match ch {
            '{' if open.is_none() => open = Some((char_pos, byte_pos + 1)),
            '}' => {
                if let Some((char_offset, start)) = open.take()
                    && byte_pos > start
                {
                    spans.push(BlockSpan {
                        char_offset,
                        content: &text[start..byte_pos],
                    });
                }
            }
            _ => {}
        }
    }

    spans
}

/// Parses directive blocks, generating `values:random` series from its ranges.
#[derive(Debug, Clone, Default)]
pub struct DirectiveParser {
    random: RandomConfig,
}

impl DirectiveParser {
    pub fn new(random: RandomConfig) -> Self {
        Self { random }
    }

    /// Extract every directive in `text` in source order.
    pub fn extract(&self, text: &str) -> Vec<Directive> {
        self.extract_with_rng(text, &mut rand::thread_rng())
    }

    /// Like [`extract`](Self::extract) with a caller-supplied random source.
    pub fn extract_with_rng<R: Rng>(&self, text: &str, rng: &mut R) -> Vec<Directive> {
        block_spans(text)
            .into_iter()
            .map(|span| Directive {
                command: self.parse_block(span.content, rng),
                source_offset: span.char_offset,
            })
            .collect()
    }

    /// Parse the content of a single block (without braces).
    pub fn parse_block<R: Rng>(&self, content: &str, rng: &mut R) -> Command {
        let pairs: Vec<&str> = content
            .split(';')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();

        let raw_key = pairs
            .first()
            .map(|p| split_pair(p).0.to_lowercase())
            .filter(|k| !k.is_empty());
        let first_kind = raw_key
            .as_deref()
            .and_then(DirectiveKind::from_keyword)
            .unwrap_or(DirectiveKind::Unknown);

        let mut value = None;
        let mut duration = None;
        let mut actuator_index = None;
        let mut pattern_name: Option<String> = None;
        let mut intensity_series = Vec::new();
        let mut random_duration = None;

        for pair in &pairs {
            let (key, raw_value) = split_pair(pair);
            if key.is_empty() {
                continue;
            }

            match key.to_lowercase().as_str() {
                field @ ("vibrate" | "oscillate" | "linear" | "rotate" | "scalar") => {
                    value = numeric_field(field, raw_value);
                }
                "stop" => {}
                "duration" => duration = numeric_field("duration", raw_value),
                "index" => actuator_index = raw_value.and_then(parse_index),
                "pattern" => pattern_name = Some(raw_value.unwrap_or("").to_lowercase()),
                "values" => {
                    let raw = raw_value.unwrap_or("");
                    if raw.eq_ignore_ascii_case(RANDOM_VALUES) {
                        let (series, secs) = self.random_series(rng);
                        intensity_series = series;
                        random_duration = Some(secs);
                    } else {
                        intensity_series = parse_series(raw);
                    }
                }
                other => debug!("Ignoring directive key [{}]", other),
            }
        }

        let duration = duration.or(random_duration);
        if random_duration.is_some() {
            debug!(
                "{{pattern:custom; values:{}; duration:{}}}",
                intensity_series
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(","),
                duration.unwrap_or_default()
            );
        }

        // `stop` wins over everything; a pattern designation wins over a
        // scalar value, and rescues blocks whose first key is not a command.
        let kind = match (first_kind, &pattern_name) {
            (DirectiveKind::Stop, _) => DirectiveKind::Stop,
            (_, Some(_)) => DirectiveKind::Pattern,
            (kind, None) => kind,
        };
        if kind == DirectiveKind::Pattern {
            value = None;
        }

        Command {
            kind,
            raw_key,
            value,
            duration,
            actuator_index,
            pattern_name: if kind == DirectiveKind::Pattern {
                pattern_name
            } else {
                None
            },
            intensity_series,
        }
    }

    /// Draw a procedural series and duration from the configured ranges.
    fn random_series<R: Rng>(&self, rng: &mut R) -> (Vec<f64>, f64) {
        let (min_count, max_count) = self.random.value_count_range();
        let (min_secs, max_secs) = self.random.duration_range();
        let (min_level, max_level) = self.random.intensity_range();

        let count = rng.gen_range(min_count..=max_count);
        let series = (0..count)
            .map(|_| round_hundredths(rng.gen_range(min_level..=max_level)))
            .collect();
        let secs = rng.gen_range(min_secs..=max_secs);

        (series, f64::from(secs))
    }
}

/// Extract directives with the default random ranges.
pub fn extract_directives(text: &str) -> Vec<Directive> {
    DirectiveParser::default().extract(text)
}

/// Numeric field value. An unparseable value is logged and treated as absent.
fn numeric_field(field: &str, raw: Option<&str>) -> Option<f64> {
    let raw = raw?;
    let parsed = parse_float_prefix(raw);
    if parsed.is_none() {
        let error = HapticError::DirectiveParse {
            field: field.to_string(),
            message: format!("{raw:?} is not a number"),
        };
        debug!("{}", error);
    }
    parsed
}

fn split_pair(pair: &str) -> (&str, Option<&str>) {
    let mut parts = pair.split(':');
    let key = parts.next().unwrap_or("").trim();
    let value = parts.next().map(str::trim);
    (key, value)
}

fn parse_series(raw: &str) -> Vec<f64> {
    raw.split(',').filter_map(parse_float_prefix).collect()
}

fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parse the longest numeric prefix of `raw` (`"0.5s"` → `0.5`).
///
/// Returns `None` when there is no finite number at the start.
pub fn parse_float_prefix(raw: &str) -> Option<f64> {
    let s = raw.trim_start();
    let starts_numeric = s
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.'));
    if !starts_numeric {
        return None;
    }

    let end = s
        .char_indices()
        .find(|(_, c)| !(c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')))
        .map(|(i, _)| i)
        .unwrap_or(s.len());

    (1..=end)
        .rev()
        .find_map(|len| s[..len].parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Parse a non-negative integer prefix (`"2abc"` → `2`).
fn parse_index(raw: &str) -> Option<u32> {
    let s = raw.trim_start();
    let s = s.strip_prefix('+').unwrap_or(s);
    let digits: &str = &s[..s
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(s.len())];
    digits.parse().ok()
}
