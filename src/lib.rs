//! # Financial Model Builder
//!
//! Consolidates per-year extracted financial statements into a multi-year model: a fixed
//! income-statement waterfall, templated balance-sheet and cash-flow views, and raw side-by-side
//! views of every extracted line, with user adjustments overlaid.
//!
//! ## Core Concepts
//!
//! - **Line items**: Labelled amounts extracted from one year's statements, in document order
//! - **Keyword resolution**: Rows are located by case-insensitive substring match on their label
//! - **Adjustments**: Keyed overrides. Raw keys (`pl_Revenue_2023`) replace inputs before anything
//!   is computed; derived keys (`CALCULATED_Net Income_2023`) replace finished outputs only
//! - **Waterfall**: Revenue down to Net Income, computed one step at a time across all years
//!
//! ## Example
//!
//! ```rust,ignore
//! use financial_model_builder::*;
//!
//! let mut statements = StatementsByYear::new();
//! statements.insert(
//!     2023,
//!     FinancialStatements {
//!         profit_and_loss: vec![
//!             LineItem::new("Revenue", 1200.0),
//!             LineItem::new("Cost of goods sold", -500.0),
//!         ],
//!         ..Default::default()
//!     },
//! );
//!
//! let mut adjustments = AdjustmentStore::new();
//! adjustments.insert("CALCULATED_Net Income_2023", Adjustment::value(999.0));
//!
//! let model = build_consolidated_model(&[2023], &statements, &adjustments).unwrap();
//! println!("{}", model.to_json().unwrap());
//! ```

pub mod calculator;
pub mod config;
pub mod consolidator;
pub mod error;
pub mod export;
pub mod ingestion;
pub mod overrides;
pub mod project;
pub mod repository;
pub mod resolver;
pub mod rules;
pub mod schema;
pub mod templates;
pub mod utils;

pub use calculator::{DerivedMetricsCalculator, DerivedRow, WaterfallMetrics, TAX_RATE};
pub use config::StoreConfig;
pub use consolidator::RawConsolidator;
pub use error::{ModelError, Result};
pub use export::{to_csv, to_markdown};
pub use ingestion::*;
pub use overrides::*;
pub use project::{Project, ProjectRegistry};
pub use repository::{
    consolidate_project, initialize_project, update_adjustment, FinancialRepository,
    InMemoryRepository, JsonFileRepository,
};
pub use resolver::{coerce_amount, resolve, resolve_positional, PositionalRule};
pub use rules::{waterfall_rules, Metric, MetricRule};
pub use schema::*;
pub use templates::{StatementTemplateEngine, TemplateRow};
pub use utils::*;

use log::{debug, info};
use resolver::finite_or_zero;
use std::collections::{BTreeMap, HashSet};

/// Runs the whole consolidation for one set of adjustments.
pub struct ModelBuilder<'a> {
    adjustments: &'a AdjustmentStore,
    balance_sheet: StatementTemplateEngine,
    cash_flow: StatementTemplateEngine,
    calculator: DerivedMetricsCalculator,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(adjustments: &'a AdjustmentStore) -> Self {
        Self {
            adjustments,
            balance_sheet: StatementTemplateEngine::balance_sheet(),
            cash_flow: StatementTemplateEngine::cash_flow(),
            calculator: DerivedMetricsCalculator::new(),
        }
    }

    pub fn with_templates(
        mut self,
        balance_sheet: StatementTemplateEngine,
        cash_flow: StatementTemplateEngine,
    ) -> Self {
        self.balance_sheet = balance_sheet;
        self.cash_flow = cash_flow;
        self
    }

    pub fn build(&self, years: &[i32], statements: &StatementsByYear) -> Result<ConsolidatedModel> {
        let years = normalize_years(years);
        if years.is_empty() {
            return Err(ModelError::NoYears);
        }
        self.adjustments.validate()?;

        info!(
            "Consolidating {} years ({:?}) with {} adjustments",
            years.len(),
            years,
            self.adjustments.len()
        );

        let ignored: Vec<i32> = statements
            .keys()
            .filter(|y| !years.contains(y))
            .copied()
            .collect();
        if !ignored.is_empty() {
            debug!("Ignoring statements for years outside the model: {:?}", ignored);
        }

        let adjusted = self.adjustments.apply_to_statements(statements);

        let metrics = self.calculator.compute(&years, &adjusted);
        let calculated_income_statement = self.finalize(metrics.rows(), &years);
        let calculated_balance_sheet =
            self.finalize(self.balance_sheet.apply(&years, &adjusted), &years);
        let calculated_cash_flow = self.finalize(self.cash_flow.apply(&years, &adjusted), &years);

        ensure_unique_ids(&[
            calculated_income_statement.as_slice(),
            calculated_balance_sheet.as_slice(),
            calculated_cash_flow.as_slice(),
        ])?;

        // Raw views overlay each cell themselves, so they read the unadjusted input.
        let raw_views = RawConsolidator::new(self.adjustments).consolidate_all(&years, statements);

        let notes: BTreeMap<i32, BTreeMap<String, String>> = years
            .iter()
            .filter_map(|y| statements.get(y).map(|s| (*y, s)))
            .filter(|(_, s)| !s.notes.is_empty())
            .map(|(y, s)| (y, s.notes.clone()))
            .collect();

        debug!(
            "Built {} income, {} balance sheet and {} cash flow rows",
            calculated_income_statement.len(),
            calculated_balance_sheet.len(),
            calculated_cash_flow.len()
        );

        Ok(ConsolidatedModel {
            years,
            calculated_income_statement,
            calculated_balance_sheet,
            calculated_cash_flow,
            raw_views,
            trial_balance: BTreeMap::new(),
            notes,
        })
    }

    /// Builds from extraction documents, carrying their trial balances through untouched.
    pub fn build_from_documents(
        &self,
        years: &[i32],
        documents: &BTreeMap<i32, ExtractionDocument>,
    ) -> Result<ConsolidatedModel> {
        let inputs = split_documents(documents);
        let mut model = self.build(years, &inputs.statements)?;
        model.trial_balance = inputs
            .trial_balance
            .into_iter()
            .filter(|(year, _)| model.years.contains(year))
            .collect();
        Ok(model)
    }

    /// Second overlay pass. Derived overrides replace the rendered cell and nothing else.
    fn finalize(&self, rows: Vec<DerivedRow>, years: &[i32]) -> Vec<CalculatedRow> {
        rows.into_iter()
            .map(|row| {
                let values_by_year = years
                    .iter()
                    .map(|&year| {
                        if row.is_header {
                            return (year, CellValue::Blank);
                        }
                        let computed = row.values.get(&year).copied().unwrap_or(0.0);
                        let key = AdjustmentKey::calculated(&row.id, year);
                        let value = finite_or_zero(self.adjustments.apply(computed, &key));
                        let cell = if row.format_as_percent {
                            CellValue::percent(value)
                        } else {
                            CellValue::Number(value)
                        };
                        (year, cell)
                    })
                    .collect();

                CalculatedRow {
                    label: row.label,
                    id: row.id,
                    is_header: row.is_header,
                    format_as_percent: row.format_as_percent,
                    values_by_year,
                }
            })
            .collect()
    }
}

/// Derived override keys are built from row ids, so no two overridable rows may share one.
fn ensure_unique_ids(views: &[&[CalculatedRow]]) -> Result<()> {
    let mut seen = HashSet::new();
    let rows = views
        .iter()
        .flat_map(|rows| rows.iter())
        .filter(|row| !row.is_header);
    for row in rows {
        if !seen.insert(row.id.as_str()) {
            return Err(ModelError::DuplicateRowId(row.id.clone()));
        }
    }
    Ok(())
}

pub fn build_consolidated_model(
    years: &[i32],
    statements: &StatementsByYear,
    adjustments: &AdjustmentStore,
) -> Result<ConsolidatedModel> {
    ModelBuilder::new(adjustments).build(years, statements)
}
