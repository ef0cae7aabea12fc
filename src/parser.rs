use std::fmt;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::warn;

static TRADE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(.*?) (bought|sold) \$([\d,]+) of (.*?) on (\d{4}-\d{2}-\d{2})\. (He|She) filed the trade after (\d+) days\.",
    )
    .unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Bought,
    Sold,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Bought => "bought",
            Action::Sold => "sold",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One disclosure, as stated in a trade page's preview description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeRecord {
    pub name: String,
    pub action: Action,
    pub amount: i64,
    pub company: String,
    pub date: NaiveDate,
    pub filing_delay_days: u32,
}

/// Parse a description of the form
/// `"<Name> bought $1,000 of <Company> on 2024-03-01. She filed the trade after 37 days."`.
///
/// Returns `None` (and logs) when any part of the sentence deviates from that shape.
pub fn parse_description(description: &str) -> Option<TradeRecord> {
    let record = TRADE_RE.captures(description).and_then(|c| {
        let action = match &c[2] {
            "bought" => Action::Bought,
            _ => Action::Sold,
        };
        // group 6 is the pronoun; it only anchors the sentence
        Some(TradeRecord {
            name: c[1].to_string(),
            action,
            amount: c[3].replace(',', "").parse().ok()?,
            company: c[4].to_string(),
            date: NaiveDate::parse_from_str(&c[5], "%Y-%m-%d").ok()?,
            filing_delay_days: c[7].parse().ok()?,
        })
    });

    if record.is_none() {
        warn!("No match: {:?}", description);
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn jane_doe_bought() {
        let r = parse_description(
            "Jane Doe bought $1,000 of Acme Corp on 2024-03-01. She filed the trade after 37 days.",
        )
        .unwrap();
        assert_eq!(
            r,
            TradeRecord {
                name: "Jane Doe".into(),
                action: Action::Bought,
                amount: 1000,
                company: "Acme Corp".into(),
                date: ymd(2024, 3, 1),
                filing_delay_days: 37,
            }
        );
    }

    #[test]
    fn sold_with_he_and_large_amount() {
        let r = parse_description(
            "John Q. Public sold $12,345 of Alphabet Inc. - Class A on 2023-11-30. He filed the trade after 4 days.",
        )
        .unwrap();
        assert_eq!(r.name, "John Q. Public");
        assert_eq!(r.action, Action::Sold);
        assert_eq!(r.amount, 12345);
        assert_eq!(r.company, "Alphabet Inc. - Class A");
        assert_eq!(r.date, ymd(2023, 11, 30));
        assert_eq!(r.filing_delay_days, 4);
    }

    #[test]
    fn amount_commas_stripped() {
        let r = parse_description(
            "A B bought $1,000,001 of C on 2022-01-02. He filed the trade after 0 days.",
        )
        .unwrap();
        assert_eq!(r.amount, 1_000_001);
        assert_eq!(r.filing_delay_days, 0);
    }

    #[test]
    fn trailing_text_is_ignored() {
        let r = parse_description(
            "Jane Doe sold $15,001 of Tesla Inc on 2024-05-10. She filed the trade after 12 days. See more on Capitol Trades.",
        );
        assert!(r.is_some());
    }

    #[test]
    fn non_matching_sentences() {
        for s in [
            "",
            "Capitol Trades: track congressional stock trades",
            "Jane Doe exchanged $1,000 of Acme Corp on 2024-03-01. She filed the trade after 37 days.",
            "Jane Doe bought 1,000 of Acme Corp on 2024-03-01. She filed the trade after 37 days.",
            "Jane Doe bought $1,000 of Acme Corp on 03/01/2024. She filed the trade after 37 days.",
            "Jane Doe bought $1,000 of Acme Corp on 2024-03-01. They filed the trade after 37 days.",
            "Jane Doe bought $1,000 of Acme Corp on 2024-03-01. She filed the trade after some days.",
            "Jane Doe bought $1,000 of Acme Corp on 2024-03-01 She filed the trade after 37 days.",
        ] {
            assert!(parse_description(s).is_none(), "{s:?} should not parse");
        }
    }

    #[test]
    fn impossible_calendar_date() {
        assert!(parse_description(
            "Jane Doe bought $1,000 of Acme Corp on 2024-02-30. She filed the trade after 37 days."
        )
        .is_none());
    }

    #[test]
    fn action_renders_lowercase() {
        assert_eq!(Action::Bought.to_string(), "bought");
        assert_eq!(Action::Sold.as_str(), "sold");
    }
}
