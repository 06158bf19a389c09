//! Leaderboard report built from the ledger's reporting interface.
//!
//! Pure functions over `(id, points)` rows so the offline binary and tests
//! share them; display names come from an injected resolver since only the
//! platform glue can map ids to names.

use crate::config::CurrencyConfig;
use crate::text::{format_count, format_currency, sort_key};

/// One ranked leaderboard row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// Competition rank: tied points share a rank, the next distinct
    /// score resumes at its list position.
    pub rank: usize,
    /// Resolved display name.
    pub name: String,
    /// Point balance.
    pub points: u64,
}

/// Rank all accounts: points descending, ties broken by natural name
/// order. `resolve_name` returns `None` for members the platform no
/// longer knows.
#[must_use]
pub fn standings(
    accounts: &[(String, u64)],
    resolve_name: impl Fn(&str) -> Option<String>,
) -> Vec<LeaderboardEntry> {
    let mut rows: Vec<(String, u64)> = accounts
        .iter()
        .map(|(id, points)| {
            let name =
                resolve_name(id).unwrap_or_else(|| format!("Member left the community (#{id})"));
            (name, *points)
        })
        .collect();

    rows.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| sort_key(&a.0).cmp(&sort_key(&b.0))));

    let mut entries: Vec<LeaderboardEntry> = Vec::with_capacity(rows.len());
    let mut rank = 0;
    for (i, (name, points)) in rows.into_iter().enumerate() {
        if i == 0 || points != entries[i - 1].points {
            rank = i + 1;
        }
        entries.push(LeaderboardEntry { rank, name, points });
    }
    entries
}

/// Render the standings as a markdown table with a total header.
#[must_use]
pub fn render_markdown(entries: &[LeaderboardEntry], currency: &CurrencyConfig) -> String {
    let total: u64 = entries.iter().map(|entry| entry.points).sum();

    let mut out = format!(
        "## {} were baked by {} members\n\n",
        format_currency(total, currency),
        format_count(entries.len() as u64),
    );
    out.push_str(&format!(
        " | {:>5} | {:<56} | {:>18} | \n",
        "#",
        "Member Name",
        format!("{} Baked", currency.other),
    ));
    out.push_str(
        " | ----: | -------------------------------------------------------- | -----------------: | \n",
    );

    for entry in entries {
        out.push_str(&format!(
            " | {:>5} | {:<56} | {:>18} | \n",
            format_count(entry.rank as u64),
            entry.name,
            format!("**{}**", format_count(entry.points)),
        ));
    }

    out
}
