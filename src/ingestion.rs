use crate::error::Result;
use crate::schema::{FinancialStatements, StatementsByYear, TrialBalanceRow};
use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// The per-year document produced by the extraction step.
///
/// `trial_balance` holds spreadsheet records verbatim; nothing in the model reads them beyond
/// passing them through. A `financial_statements` value that cannot be read as statements (for
/// example `{"error": "..."}` after a failed extraction) decodes as an empty year.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionDocument {
    #[serde(default)]
    pub trial_balance: Vec<TrialBalanceRow>,

    #[serde(default, deserialize_with = "lenient_statements")]
    pub financial_statements: FinancialStatements,
}

fn lenient_statements<'de, D>(deserializer: D) -> std::result::Result<FinancialStatements, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    match serde_json::from_value::<FinancialStatements>(raw) {
        Ok(statements) => Ok(statements),
        Err(e) => {
            warn!("Unreadable financial statements, treating year as empty: {}", e);
            Ok(FinancialStatements::default())
        }
    }
}

impl ExtractionDocument {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// JSON schema of the statements payload, for the extraction step to target.
    pub fn response_schema() -> serde_json::Result<serde_json::Value> {
        let root = schemars::schema_for!(FinancialStatements);
        serde_json::to_value(root)
    }
}

/// Per-year inputs split into what the model computes over and what it only passes through.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearlyInputs {
    pub statements: StatementsByYear,
    pub trial_balance: BTreeMap<i32, Vec<TrialBalanceRow>>,
}

pub fn split_documents(documents: &BTreeMap<i32, ExtractionDocument>) -> YearlyInputs {
    let mut inputs = YearlyInputs::default();

    for (year, document) in documents {
        inputs
            .statements
            .insert(*year, document.financial_statements.clone());
        if !document.trial_balance.is_empty() {
            inputs
                .trial_balance
                .insert(*year, document.trial_balance.clone());
        }
    }

    inputs
}
