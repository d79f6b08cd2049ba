//! Declarative keyword rules.
//!
//! Each rule names what it resolves, the keywords that identify it, the statement it is read
//! from, and optionally which occurrence to take. The waterfall keys its rules by [`Metric`]; the
//! template engine keys them by row id. Both evaluate them the same way.
//!
//! Waterfall rules for the same metric are tried in table order and the first non-zero result
//! wins, which is how the depreciation fallback from the profit-and-loss statement to the cash
//! flow statement is expressed.

use crate::resolver::{resolve_with, PositionalRule};
use crate::schema::{FinancialStatements, StatementSection};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Revenue,
    CostOfSales,
    OtherIncome,
    GeneralAndAdministrative,
    Depreciation,
    Amortization,
    InterestExpense,
}

/// `(metric, keywords, section, position)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricRule<K = Metric> {
    pub metric: K,
    pub keywords: Vec<String>,
    pub section: StatementSection,
    #[serde(default)]
    pub position: Option<PositionalRule>,
}

impl<K> MetricRule<K> {
    pub fn new(metric: K, section: StatementSection, keywords: &[&str]) -> Self {
        Self {
            metric,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            section,
            position: None,
        }
    }

    pub fn positional(mut self, position: PositionalRule) -> Self {
        self.position = Some(position);
        self
    }

    pub fn evaluate(&self, statements: &FinancialStatements) -> f64 {
        resolve_with(
            statements.section(self.section),
            self.keywords.as_slice(),
            self.position,
        )
    }
}

pub fn waterfall_rules() -> Vec<MetricRule> {
    use StatementSection::{CashFlow, ProfitAndLoss};

    vec![
        MetricRule::new(Metric::Revenue, ProfitAndLoss, &["revenue", "turnover", "sales"]),
        MetricRule::new(
            Metric::CostOfSales,
            ProfitAndLoss,
            &["cost of sales", "cost of revenue", "cost of goods"],
        ),
        MetricRule::new(Metric::OtherIncome, ProfitAndLoss, &["other income"]),
        MetricRule::new(
            Metric::GeneralAndAdministrative,
            ProfitAndLoss,
            &["general", "administrative", "operating exp"],
        ),
        MetricRule::new(Metric::Depreciation, ProfitAndLoss, &["depreciation"]),
        MetricRule::new(Metric::Depreciation, CashFlow, &["depreciation"]),
        MetricRule::new(Metric::Amortization, CashFlow, &["amortisation", "amortization"]),
        MetricRule::new(
            Metric::InterestExpense,
            ProfitAndLoss,
            &["finance cost", "interest exp"],
        ),
    ]
}

/// Resolves a metric against one year's statements using a rule table.
pub fn resolve_metric(rules: &[MetricRule], metric: Metric, statements: &FinancialStatements) -> f64 {
    rules
        .iter()
        .filter(|rule| rule.metric == metric)
        .map(|rule| rule.evaluate(statements))
        .find(|value| *value != 0.0)
        .unwrap_or(0.0)
}
