//! Curated statement layouts.
//!
//! A template has a fixed shape: every row is emitted for every year whether or not extraction
//! found a matching line (unmatched rows show `0`), and extracted lines no row asks for are left to
//! the raw view.

use crate::calculator::{DerivedRow, YearMap};
use crate::resolver::PositionalRule;
use crate::rules::MetricRule;
use crate::schema::{FinancialStatements, StatementSection, StatementsByYear};
use crate::utils::{display_label, normalize_years};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateRow {
    /// Row label. Anything after `#` disambiguates repeated labels and is not displayed.
    pub label: String,
    #[serde(default)]
    pub keywords: Option<Vec<String>>,
    #[serde(default)]
    pub is_header: bool,
    #[serde(default)]
    pub positional_rule: Option<PositionalRule>,
}

impl TemplateRow {
    pub fn header(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            keywords: None,
            is_header: true,
            positional_rule: None,
        }
    }

    pub fn item(label: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            label: label.into(),
            keywords: Some(keywords.iter().map(|k| k.to_string()).collect()),
            is_header: false,
            positional_rule: None,
        }
    }

    pub fn positional(mut self, rule: PositionalRule) -> Self {
        self.positional_rule = Some(rule);
        self
    }

    pub fn display_label(&self) -> &str {
        display_label(&self.label)
    }

    /// The lookup this row performs, keyed by its row id. Headers have none.
    pub fn rule(&self, section: StatementSection) -> Option<MetricRule<String>> {
        if self.is_header {
            return None;
        }
        let keywords = self.keywords.clone().unwrap_or_default();
        Some(MetricRule {
            metric: self.label.clone(),
            keywords,
            section,
            position: self.positional_rule,
        })
    }
}

enum TemplateLine {
    Header(String),
    Item(MetricRule<String>),
}

pub struct StatementTemplateEngine {
    section: StatementSection,
    rows: Vec<TemplateRow>,
    lines: Vec<TemplateLine>,
}

impl StatementTemplateEngine {
    pub fn new(section: StatementSection, rows: Vec<TemplateRow>) -> Self {
        let lines = rows
            .iter()
            .map(|row| match row.rule(section) {
                Some(rule) => TemplateLine::Item(rule),
                None => TemplateLine::Header(row.label.clone()),
            })
            .collect();
        Self {
            section,
            rows,
            lines,
        }
    }

    pub fn balance_sheet() -> Self {
        Self::new(StatementSection::BalanceSheet, balance_sheet_template())
    }

    pub fn cash_flow() -> Self {
        Self::new(StatementSection::CashFlow, cash_flow_template())
    }

    pub fn section(&self) -> StatementSection {
        self.section
    }

    pub fn rows(&self) -> &[TemplateRow] {
        &self.rows
    }

    /// Maps every template row onto every year. Row ids keep the full template label so repeated
    /// display labels stay addressable.
    pub fn apply(&self, years: &[i32], statements: &StatementsByYear) -> Vec<DerivedRow> {
        let years = normalize_years(years);
        let empty = FinancialStatements::default();

        self.lines
            .iter()
            .map(|line| match line {
                TemplateLine::Header(label) => {
                    DerivedRow::header(display_label(label)).with_id(label.clone())
                }
                TemplateLine::Item(rule) => {
                    let values: YearMap = years
                        .iter()
                        .map(|year| {
                            let statement = statements.get(year).unwrap_or(&empty);
                            (*year, rule.evaluate(statement))
                        })
                        .collect();
                    DerivedRow::amount(display_label(&rule.metric), &values)
                        .with_id(rule.metric.clone())
                }
            })
            .collect()
    }
}

pub fn balance_sheet_template() -> Vec<TemplateRow> {
    use PositionalRule::{First, Second};

    vec![
        TemplateRow::header("Non-current assets"),
        TemplateRow::item(
            "Property and equipment",
            &["property and equipment", "property, plant", "plant and equipment"],
        ),
        TemplateRow::item("Right-of-use assets", &["right-of-use", "right of use"]),
        TemplateRow::item("Intangible assets", &["intangible"]),
        TemplateRow::item("Investment property", &["investment propert"]),
        TemplateRow::header("Current assets"),
        TemplateRow::item("Inventories", &["inventor"]),
        TemplateRow::item("Trade and other receivables", &["receivable"]),
        TemplateRow::item("Due from related parties", &["due from related"]),
        TemplateRow::item("Prepayments", &["prepayment"]),
        TemplateRow::item(
            "Cash and cash equivalents",
            &["cash and cash equivalents", "cash and bank", "cash at bank"],
        ),
        TemplateRow::item("Total assets", &["total assets"]),
        TemplateRow::header("Equity"),
        TemplateRow::item("Share capital", &["share capital"]),
        TemplateRow::item("Statutory reserve", &["statutory reserve", "legal reserve"]),
        TemplateRow::item("Retained earnings", &["retained earnings", "accumulated losses"]),
        TemplateRow::item("Total equity", &["total equity"]),
        TemplateRow::header("Non-current liabilities"),
        TemplateRow::item("Borrowings#non-current", &["borrowings", "bank loan", "term loan"])
            .positional(First),
        TemplateRow::item("Lease liabilities#non-current", &["lease liabilit"]).positional(First),
        TemplateRow::item(
            "Employees' end of service benefits",
            &["end of service", "employee benefit"],
        ),
        TemplateRow::header("Current liabilities"),
        TemplateRow::item("Trade and other payables", &["payable"]),
        TemplateRow::item("Due to related parties", &["due to related"]),
        TemplateRow::item("Borrowings#current", &["borrowings", "bank loan", "term loan"])
            .positional(Second),
        TemplateRow::item("Lease liabilities#current", &["lease liabilit"]).positional(Second),
        TemplateRow::item("Total liabilities", &["total liabilities"]),
        TemplateRow::item(
            "Total equity and liabilities",
            &["total equity and liabilities", "total liabilities and equity"],
        ),
    ]
}

pub fn cash_flow_template() -> Vec<TemplateRow> {
    vec![
        TemplateRow::header("Cash flows from operating activities"),
        TemplateRow::item(
            "Profit for the year",
            &["profit for the year", "profit before tax", "net profit"],
        ),
        TemplateRow::item("Depreciation#cf", &["depreciation"]),
        TemplateRow::item("Amortisation", &["amortisation", "amortization"]),
        TemplateRow::item("Finance costs", &["finance cost"]),
        TemplateRow::item("Provision for end of service benefits", &["end of service"]),
        TemplateRow::item("Changes in inventories", &["inventor"]),
        TemplateRow::item("Changes in trade and other receivables", &["receivable"]),
        TemplateRow::item("Changes in trade and other payables", &["payable"]),
        TemplateRow::item(
            "Net cash from operating activities",
            &[
                "net cash from operating",
                "net cash generated from operating",
                "net cash used in operating",
            ],
        ),
        TemplateRow::header("Cash flows from investing activities"),
        TemplateRow::item(
            "Purchase of property and equipment",
            &["purchase of property", "acquisition of property", "additions to property"],
        ),
        TemplateRow::item("Purchase of intangible assets", &["purchase of intangible"]),
        TemplateRow::item(
            "Net cash used in investing activities",
            &[
                "net cash used in investing",
                "net cash from investing",
                "net cash generated from investing",
            ],
        ),
        TemplateRow::header("Cash flows from financing activities"),
        TemplateRow::item(
            "Proceeds from borrowings",
            &["proceeds from borrowing", "proceeds from bank"],
        ),
        TemplateRow::item(
            "Repayment of borrowings",
            &["repayment of borrowing", "repayment of bank"],
        ),
        TemplateRow::item(
            "Payment of lease liabilities",
            &["payment of lease", "lease payment", "principal elements of lease"],
        ),
        TemplateRow::item("Dividends paid", &["dividend"]),
        TemplateRow::item(
            "Net cash used in financing activities",
            &[
                "net cash used in financing",
                "net cash from financing",
                "net cash generated from financing",
            ],
        ),
        TemplateRow::item(
            "Net change in cash and cash equivalents",
            &["net increase", "net decrease", "net change in cash"],
        ),
        TemplateRow::item(
            "Cash and cash equivalents at beginning of year",
            &["beginning of", "start of"],
        ),
        TemplateRow::item(
            "Cash and cash equivalents at end of year",
            &["end of the year", "end of year", "end of period"],
        ),
    ]
}
