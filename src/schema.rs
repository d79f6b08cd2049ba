use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// The three statements every extraction is expected to yield.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum StatementSection {
    ProfitAndLoss,
    BalanceSheet,
    CashFlow,
}

impl StatementSection {
    pub const ALL: [StatementSection; 3] = [
        StatementSection::ProfitAndLoss,
        StatementSection::BalanceSheet,
        StatementSection::CashFlow,
    ];

    /// Short code used in adjustment keys and in the raw view field names.
    pub fn code(self) -> &'static str {
        match self {
            StatementSection::ProfitAndLoss => "pl",
            StatementSection::BalanceSheet => "bs",
            StatementSection::CashFlow => "cf",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            StatementSection::ProfitAndLoss => "Profit & Loss",
            StatementSection::BalanceSheet => "Balance Sheet",
            StatementSection::CashFlow => "Cash Flows",
        }
    }
}

/// An extracted amount before coercion.
///
/// Extraction output is not always numeric: amounts can arrive as `"1,234"` or `"(500)"`, or be
/// missing entirely. Coercion happens at lookup time, see [`crate::resolver::coerce_amount`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Amount {
    Number(f64),
    Text(String),
    Empty,
}

impl Default for Amount {
    fn default() -> Self {
        Amount::Empty
    }
}

impl From<f64> for Amount {
    fn from(value: f64) -> Self {
        Amount::Number(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LineItem {
    #[serde(rename = "line_item")]
    #[schemars(description = "The row label exactly as printed in the statement.")]
    pub label: String,

    #[serde(
        default,
        deserialize_with = "empty_string_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    #[schemars(description = "The note number referenced by this row, if any.")]
    pub note_ref: Option<String>,

    #[serde(default)]
    #[schemars(description = "The amount for the year. Headers carry 0.")]
    pub value: Amount,

    #[serde(default)]
    #[schemars(description = "True for section headings that carry no amount.")]
    pub is_header: bool,
}

impl LineItem {
    pub fn new(label: impl Into<String>, value: f64) -> Self {
        Self::with_amount(label, Amount::Number(value))
    }

    pub fn with_amount(label: impl Into<String>, value: Amount) -> Self {
        Self {
            label: label.into(),
            note_ref: None,
            value,
            is_header: false,
        }
    }

    pub fn header(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            note_ref: None,
            value: Amount::Number(0.0),
            is_header: true,
        }
    }

    pub fn with_note(mut self, note_ref: impl Into<String>) -> Self {
        self.note_ref = Some(note_ref.into());
        self
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.trim().is_empty()))
}

/// One year's extracted statements, in extraction order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinancialStatements {
    #[serde(rename = "statement_of_profit_or_loss", default)]
    pub profit_and_loss: Vec<LineItem>,

    #[serde(rename = "statement_of_financial_position", default)]
    pub balance_sheet: Vec<LineItem>,

    #[serde(rename = "statement_of_cash_flows", default)]
    pub cash_flow: Vec<LineItem>,

    #[serde(default)]
    #[schemars(description = "Markdown content of each note, keyed by note reference.")]
    pub notes: BTreeMap<String, String>,
}

impl FinancialStatements {
    pub fn section(&self, section: StatementSection) -> &[LineItem] {
        match section {
            StatementSection::ProfitAndLoss => &self.profit_and_loss,
            StatementSection::BalanceSheet => &self.balance_sheet,
            StatementSection::CashFlow => &self.cash_flow,
        }
    }

    pub fn section_mut(&mut self, section: StatementSection) -> &mut Vec<LineItem> {
        match section {
            StatementSection::ProfitAndLoss => &mut self.profit_and_loss,
            StatementSection::BalanceSheet => &mut self.balance_sheet,
            StatementSection::CashFlow => &mut self.cash_flow,
        }
    }

    pub fn is_empty(&self) -> bool {
        StatementSection::ALL
            .iter()
            .all(|s| self.section(*s).is_empty())
    }
}

pub type StatementsByYear = BTreeMap<i32, FinancialStatements>;

/// A rendered cell. Serializes as a bare number, a percent string such as `"20.0%"`, or `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Percent(String),
    Blank,
}

impl CellValue {
    pub fn percent(value: f64) -> Self {
        CellValue::Percent(format!("{:.1}%", value))
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) => Some(*v),
            _ => None,
        }
    }
}

/// A row of the untemplated side-by-side view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawRow {
    pub label: String,
    pub id: String,
    pub is_header: bool,
    pub values_by_year: BTreeMap<i32, CellValue>,
}

/// A row of a derived or templated view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CalculatedRow {
    pub label: String,
    pub id: String,
    pub is_header: bool,
    pub format_as_percent: bool,
    pub values_by_year: BTreeMap<i32, CellValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawViews {
    pub pl: Vec<RawRow>,
    pub bs: Vec<RawRow>,
    pub cf: Vec<RawRow>,
}

impl RawViews {
    pub fn section(&self, section: StatementSection) -> &[RawRow] {
        match section {
            StatementSection::ProfitAndLoss => &self.pl,
            StatementSection::BalanceSheet => &self.bs,
            StatementSection::CashFlow => &self.cf,
        }
    }
}

pub type TrialBalanceRow = BTreeMap<String, serde_json::Value>;

/// The multi-year model handed back to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConsolidatedModel {
    pub years: Vec<i32>,
    pub calculated_income_statement: Vec<CalculatedRow>,
    pub calculated_balance_sheet: Vec<CalculatedRow>,
    pub calculated_cash_flow: Vec<CalculatedRow>,
    pub raw_views: RawViews,

    /// Trial-balance records, passed through for display only.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub trial_balance: BTreeMap<i32, Vec<TrialBalanceRow>>,

    /// Note text keyed by year and note reference.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub notes: BTreeMap<i32, BTreeMap<String, String>>,
}

impl ConsolidatedModel {
    pub fn income_row(&self, label: &str) -> Option<&CalculatedRow> {
        self.calculated_income_statement
            .iter()
            .find(|r| r.label == label)
    }

    pub fn generate_json_schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ConsolidatedModel)
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        let schema = Self::generate_json_schema();
        serde_json::to_string_pretty(&schema)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
