//! Text helpers: currency formatting, humanized durations, and the
//! natural ordering used for candidate lists and leaderboard ties.

use crate::config::CurrencyConfig;
use std::cmp::Ordering;
use std::time::Duration;

/// Format a count with thousands separators: `1234567` → `1,234,567`.
#[must_use]
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Singular or plural currency name for a count.
#[must_use]
pub fn plural_currency(n: u64, currency: &CurrencyConfig) -> &str {
    if n == 1 { &currency.one } else { &currency.other }
}

/// `1 melon bread`, `5 melon breads`, `1,000 melon breads`.
#[must_use]
pub fn format_currency(n: u64, currency: &CurrencyConfig) -> String {
    format!("{} {}", format_count(n), plural_currency(n, currency))
}

/// `1st melon bread`, `22nd melon bread`, `113th melon bread`. Renders
/// the total carried by
/// [`Notice::Milestone`](crate::gateway::Notice::Milestone).
#[must_use]
pub fn format_ordinal_currency(n: u64, currency: &CurrencyConfig) -> String {
    format!("{}{} {}", format_count(n), ordinal_suffix(n), currency.one)
}

/// English ordinal suffix: `st`, `nd`, `rd`, or `th`.
#[must_use]
pub fn ordinal_suffix(n: u64) -> &'static str {
    // 11th, 12th, 13th are exceptions to the last-digit rule.
    if (11..=13).contains(&(n % 100)) {
        return "th";
    }
    match n % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

/// Humanize a duration using its two largest units, rounded:
/// `6 days, 23 hours`, `45 seconds`. Renders the waits carried by
/// [`Notice::PairSucceeded`](crate::gateway::Notice::PairSucceeded) and
/// [`RejectReason::AlreadyPairedThisCycle`](crate::gateway::RejectReason::AlreadyPairedThisCycle).
#[must_use]
pub fn human_duration(duration: Duration) -> String {
    const UNITS: [(&str, u64); 4] = [
        ("day", 86_400),
        ("hour", 3_600),
        ("minute", 60),
        ("second", 1),
    ];

    let total_secs = duration.as_millis().div_ceil(1000) as u64;
    if total_secs == 0 {
        return "0 seconds".to_owned();
    }

    let first = UNITS
        .iter()
        .position(|&(_, secs)| total_secs >= secs)
        .unwrap_or(UNITS.len() - 1);

    let (name, secs) = UNITS[first];
    let count = total_secs / secs;
    let mut out = format_unit(count, name);

    if let Some(&(next_name, next_secs)) = UNITS.get(first + 1) {
        // Round the remainder to the second unit.
        let remainder = total_secs % secs;
        let next_count = (remainder + next_secs / 2) / next_secs;
        if next_count > 0 {
            out.push_str(", ");
            out.push_str(&format_unit(next_count, next_name));
        }
    }

    out
}

fn format_unit(count: u64, name: &str) -> String {
    if count == 1 {
        format!("1 {name}")
    } else {
        format!("{count} {name}s")
    }
}

/// Compare display names the way a member list is sorted: case-insensitive,
/// punctuation-insensitive, with digit runs compared numerically so
/// `player2` sorts before `player10`.
#[must_use]
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    sort_key(a).cmp(&sort_key(b))
}

/// Ordering key for [`natural_cmp`]. Precompute when sorting many names.
#[must_use]
pub fn sort_key(name: &str) -> NaturalKey {
    let mut parts = Vec::new();
    let mut text = String::new();
    let mut digits = String::new();

    let flush_text = |text: &mut String, parts: &mut Vec<KeyPart>| {
        if !text.is_empty() {
            parts.push(KeyPart::Text(std::mem::take(text)));
        }
    };
    let flush_digits = |digits: &mut String, parts: &mut Vec<KeyPart>| {
        if !digits.is_empty() {
            // Display names never approach u128::MAX digits of value; treat
            // an overflowing run as its saturated value.
            let value = digits.parse::<u128>().unwrap_or(u128::MAX);
            digits.clear();
            parts.push(KeyPart::Number(value));
        }
    };

    for c in name.chars() {
        if c.is_ascii_digit() {
            flush_text(&mut text, &mut parts);
            digits.push(c);
        } else if c.is_alphanumeric() || c.is_whitespace() {
            flush_digits(&mut digits, &mut parts);
            text.extend(c.to_lowercase());
        }
        // Punctuation and symbols are ignored entirely.
    }
    flush_text(&mut text, &mut parts);
    flush_digits(&mut digits, &mut parts);

    NaturalKey(parts)
}

/// Precomputed natural ordering key for one display name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NaturalKey(Vec<KeyPart>);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum KeyPart {
    Number(u128),
    Text(String),
}
