//! Gmail search filter rendering.

use chrono::{DateTime, Duration, Utc};

/// Default inclusion keywords, OR-grouped.
pub const DEFAULT_INCLUDE_TERMS: &[&str] = &[
    "Application",
    "application",
    "meeting",
    "LinkedIn",
    "Team",
    "Zoom",
    "video",
    "Data",
];

/// Default exclusion keywords, each rendered with a `-` prefix.
pub const DEFAULT_EXCLUDE_TERMS: &[&str] = &[
    "Bank",
    "discount",
    "sale",
    "sales",
    "buy",
    "buying",
    "purchase",
    "purchasing",
    "free",
    "offer",
    "offers",
    "coupon",
    "coupons",
    "deal",
    "deals",
];

/// Default look-back window: 24 hours.
pub const DEFAULT_WINDOW_MINUTES: i64 = 1440;

/// A mailbox search filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub include_any: Vec<String>,
    pub exclude: Vec<String>,
    /// Unix seconds, rendered as `after:<ts>`.
    pub after: Option<i64>,
    /// Unix seconds, rendered as `before:<ts>`.
    pub before: Option<i64>,
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_any<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_any = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn exclude<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude = terms.into_iter().map(Into::into).collect();
        self
    }

    pub fn after(mut self, ts: i64) -> Self {
        self.after = Some(ts);
        self
    }

    pub fn before(mut self, ts: i64) -> Self {
        self.before = Some(ts);
        self
    }

    /// Restrict to messages received within `minutes` before `now`.
    pub fn within_last(self, minutes: i64, now: DateTime<Utc>) -> Self {
        let start = now - Duration::minutes(minutes);
        self.after(start.timestamp())
    }

    /// The filter used when nothing is configured.
    pub fn default_filter(now: DateTime<Utc>) -> Self {
        Self::new()
            .include_any(DEFAULT_INCLUDE_TERMS.iter().copied())
            .exclude(DEFAULT_EXCLUDE_TERMS.iter().copied())
            .within_last(DEFAULT_WINDOW_MINUTES, now)
    }

    /// Render to Gmail `q` syntax.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        let include: Vec<&str> = non_empty(&self.include_any).collect();
        match include.len() {
            0 => {}
            1 => parts.push(include[0].to_string()),
            _ => parts.push(format!("({})", include.join(" OR "))),
        }

        parts.extend(non_empty(&self.exclude).map(|t| format!("-{t}")));

        if let Some(ts) = self.after {
            parts.push(format!("after:{ts}"));
        }
        if let Some(ts) = self.before {
            parts.push(format!("before:{ts}"));
        }

        parts.join(" ")
    }
}

fn non_empty(terms: &[String]) -> impl Iterator<Item = &str> {
    terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn renders_include_exclude_and_bounds() {
        let q = SearchQuery::new()
            .include_any(["meeting", "Zoom"])
            .exclude(["sale", "coupon"])
            .after(1_700_000_000)
            .before(1_700_086_400);
        assert_eq!(
            q.render(),
            "(meeting OR Zoom) -sale -coupon after:1700000000 before:1700086400"
        );
    }

    #[test]
    fn single_include_term_has_no_group() {
        let q = SearchQuery::new().include_any(["invoice"]);
        assert_eq!(q.render(), "invoice");
    }

    #[test]
    fn empty_query_renders_empty() {
        assert_eq!(SearchQuery::new().render(), "");
    }

    #[test]
    fn blank_terms_are_ignored() {
        let q = SearchQuery::new().include_any(["", "  "]).exclude(["", "spam"]);
        assert_eq!(q.render(), "-spam");
    }

    #[test]
    fn within_last_computes_after_bound() {
        let now = Utc.with_ymd_and_hms(2025, 7, 10, 12, 0, 0).unwrap();
        let q = SearchQuery::new().within_last(60, now);
        assert_eq!(q.after, Some(now.timestamp() - 3600));
    }

    #[test]
    fn default_filter_matches_original_terms() {
        let now = Utc.with_ymd_and_hms(2025, 7, 10, 12, 0, 0).unwrap();
        let rendered = SearchQuery::default_filter(now).render();
        assert!(rendered.starts_with(
            "(Application OR application OR meeting OR LinkedIn OR Team OR Zoom OR video OR Data)"
        ));
        assert!(rendered.contains(" -Bank -discount -sale -sales "));
        assert!(rendered.ends_with(&format!("after:{}", now.timestamp() - 86_400)));
    }
}
