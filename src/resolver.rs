//! Keyword lookup over a single year's line items.
//!
//! Matching is a case-insensitive substring test of each keyword against each label, walking the
//! items in extraction order. Nothing here ever fails: an empty statement, an unmatched keyword
//! set, or an unparsable amount all resolve to `0.0`.

use crate::schema::{Amount, LineItem};
use serde::{Deserialize, Serialize};

/// Which of several same-labelled matches to take, counted in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PositionalRule {
    First,
    Second,
}

impl PositionalRule {
    pub fn index(self) -> usize {
        match self {
            PositionalRule::First => 0,
            PositionalRule::Second => 1,
        }
    }
}

/// Coerces an extracted amount into a finite number.
///
/// Strings are trimmed and stripped of thousands separators. Accounting-style negatives such as
/// `(1,234)` are accepted. Anything that does not parse, or parses to NaN/infinity, becomes `0.0`.
pub fn coerce_amount(amount: &Amount) -> f64 {
    let value = match amount {
        Amount::Number(n) => *n,
        Amount::Text(text) => parse_amount_text(text),
        Amount::Empty => 0.0,
    };
    finite_or_zero(value)
}

fn parse_amount_text(text: &str) -> f64 {
    let trimmed = text.trim();
    let (negative, body) = match trimmed
        .strip_prefix('(')
        .and_then(|inner| inner.strip_suffix(')'))
    {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };

    let cleaned: String = body.chars().filter(|c| *c != ',').collect();
    match cleaned.trim().parse::<f64>() {
        Ok(v) if negative => -v,
        Ok(v) => v,
        Err(_) => 0.0,
    }
}

pub(crate) fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

fn label_matches<S: AsRef<str>>(label: &str, keywords: &[S]) -> bool {
    let label = label.to_lowercase();
    keywords
        .iter()
        .any(|k| label.contains(&k.as_ref().to_lowercase()))
}

fn matches<'a, S: AsRef<str>>(
    items: &'a [LineItem],
    keywords: &'a [S],
) -> impl Iterator<Item = &'a LineItem> + 'a {
    items
        .iter()
        .filter(move |item| label_matches(&item.label, keywords))
}

/// Returns the value of the first item whose label contains any keyword, or `0.0`.
pub fn resolve<S: AsRef<str>>(items: &[LineItem], keywords: &[S]) -> f64 {
    matches(items, keywords)
        .next()
        .map(|item| coerce_amount(&item.value))
        .unwrap_or(0.0)
}

/// Returns the value of the n-th matching item (per `position`), or `0.0` when there are fewer
/// matches than that.
///
/// Used where a label legitimately recurs, e.g. borrowings listed once under non-current and once
/// under current liabilities with identical text.
pub fn resolve_positional<S: AsRef<str>>(
    items: &[LineItem],
    keywords: &[S],
    position: PositionalRule,
) -> f64 {
    matches(items, keywords)
        .nth(position.index())
        .map(|item| coerce_amount(&item.value))
        .unwrap_or(0.0)
}

/// Dispatches to [`resolve`] or [`resolve_positional`].
pub fn resolve_with<S: AsRef<str>>(
    items: &[LineItem],
    keywords: &[S],
    position: Option<PositionalRule>,
) -> f64 {
    match position {
        Some(p) => resolve_positional(items, keywords, p),
        None => resolve(items, keywords),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(label: &str, value: f64) -> LineItem {
        LineItem::new(label, value)
    }

    #[test]
    fn test_resolve_empty_items_is_zero() {
        let items: Vec<LineItem> = vec![];
        assert_eq!(resolve(&items, &["revenue"]), 0.0);
    }

    #[test]
    fn test_resolve_no_match_is_zero() {
        let items = vec![item("Revenue", 1000.0)];
        assert_eq!(resolve(&items, &["depreciation"]), 0.0);
    }

    #[test]
    fn test_resolve_is_case_insensitive_and_takes_first_match() {
        let items = vec![
            item("Total TURNOVER for the year", 500.0),
            item("Sales returns", -20.0),
        ];
        assert_eq!(resolve(&items, &["turnover", "sales"]), 500.0);
    }

    #[test]
    fn test_resolve_scans_in_document_order_not_keyword_order() {
        let items = vec![item("Net sales", 300.0), item("Revenue", 900.0)];
        assert_eq!(resolve(&items, &["revenue", "sales"]), 300.0);
    }

    #[test]
    fn test_string_amounts_are_coerced() {
        let items = vec![
            LineItem::with_amount("Revenue", Amount::Text(" 1,234,567.5 ".to_string())),
            LineItem::with_amount("Cost of sales", Amount::Text("(400)".to_string())),
            LineItem::with_amount("Other income", Amount::Text("n/a".to_string())),
        ];
        assert_eq!(resolve(&items, &["revenue"]), 1_234_567.5);
        assert_eq!(resolve(&items, &["cost of sales"]), -400.0);
        assert_eq!(resolve(&items, &["other income"]), 0.0);
    }

    #[test]
    fn test_non_finite_amounts_coerce_to_zero() {
        assert_eq!(coerce_amount(&Amount::Text("NaN".to_string())), 0.0);
        assert_eq!(coerce_amount(&Amount::Text("inf".to_string())), 0.0);
        assert_eq!(coerce_amount(&Amount::Number(f64::INFINITY)), 0.0);
        assert_eq!(coerce_amount(&Amount::Empty), 0.0);
    }

    #[test]
    fn test_resolve_positional_picks_by_document_order() {
        let items = vec![
            item("Non-current liabilities", 0.0),
            item("Borrowings", 750.0),
            item("Current liabilities", 0.0),
            item("Borrowings", 120.0),
        ];
        assert_eq!(
            resolve_positional(&items, &["borrowings"], PositionalRule::First),
            750.0
        );
        assert_eq!(
            resolve_positional(&items, &["borrowings"], PositionalRule::Second),
            120.0
        );
    }

    #[test]
    fn test_resolve_positional_second_with_single_match_is_zero() {
        let items = vec![item("Borrowings", 750.0)];
        assert_eq!(
            resolve_positional(&items, &["borrowings"], PositionalRule::Second),
            0.0
        );
    }

    #[test]
    fn test_resolve_with_dispatches_on_rule() {
        let items = vec![item("Lease liabilities", 10.0), item("Lease liabilities", 4.0)];
        assert_eq!(resolve_with(&items, &["lease"], None), 10.0);
        assert_eq!(
            resolve_with(&items, &["lease"], Some(PositionalRule::Second)),
            4.0
        );
    }
}
