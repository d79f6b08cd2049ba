use crate::overrides::{AdjustmentKey, AdjustmentStore};
use crate::resolver::{coerce_amount, finite_or_zero};
use crate::schema::{CellValue, RawRow, RawViews, StatementSection, StatementsByYear};
use crate::utils::normalize_years;
use log::debug;
use std::collections::{BTreeMap, HashSet};

/// Builds the untemplated, side-by-side view of a statement across years.
pub struct RawConsolidator<'a> {
    adjustments: &'a AdjustmentStore,
}

impl<'a> RawConsolidator<'a> {
    pub fn new(adjustments: &'a AdjustmentStore) -> Self {
        Self { adjustments }
    }

    /// One row per distinct label, in first-occurrence order across ascending years.
    ///
    /// Cells are overlaid before filtering, so an override can keep a row that would otherwise be
    /// dropped for being zero in every year. A label reported as a true zero balance in every year
    /// is indistinguishable from one never reported, and is dropped too.
    pub fn consolidate(
        &self,
        section: StatementSection,
        years: &[i32],
        statements: &StatementsByYear,
    ) -> Vec<RawRow> {
        let years = normalize_years(years);

        let mut seen: HashSet<&str> = HashSet::new();
        let mut labels: Vec<(&str, bool)> = Vec::new();
        for year in &years {
            let Some(statement) = statements.get(year) else {
                continue;
            };
            for item in statement.section(section) {
                if seen.insert(item.label.as_str()) {
                    labels.push((item.label.as_str(), item.is_header));
                }
            }
        }

        let mut rows = Vec::new();
        let mut dropped = 0usize;

        for (label, is_header) in labels {
            let values: BTreeMap<i32, f64> = years
                .iter()
                .map(|&year| {
                    let extracted = statements
                        .get(&year)
                        .and_then(|s| s.section(section).iter().find(|i| i.label == label))
                        .map(|i| coerce_amount(&i.value))
                        .unwrap_or(0.0);
                    let key = AdjustmentKey::raw(section, label, year);
                    (year, finite_or_zero(self.adjustments.apply(extracted, &key)))
                })
                .collect();

            if values.values().all(|v| *v == 0.0) {
                dropped += 1;
                continue;
            }

            rows.push(RawRow {
                label: label.to_string(),
                id: format!("{}_{}", section.code(), label),
                is_header,
                values_by_year: values
                    .into_iter()
                    .map(|(year, v)| (year, CellValue::Number(v)))
                    .collect(),
            });
        }

        debug!(
            "Raw {} view: {} rows kept, {} all-zero rows dropped",
            section.code(),
            rows.len(),
            dropped
        );

        rows
    }

    pub fn consolidate_all(&self, years: &[i32], statements: &StatementsByYear) -> RawViews {
        RawViews {
            pl: self.consolidate(StatementSection::ProfitAndLoss, years, statements),
            bs: self.consolidate(StatementSection::BalanceSheet, years, statements),
            cf: self.consolidate(StatementSection::CashFlow, years, statements),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overrides::Adjustment;
    use crate::schema::{FinancialStatements, LineItem};

    fn statements() -> StatementsByYear {
        let mut statements = StatementsByYear::new();
        statements.insert(
            2023,
            FinancialStatements {
                profit_and_loss: vec![
                    LineItem::new("Revenue", 1200.0),
                    LineItem::new("Government grants", 0.0),
                    LineItem::new("Impairment loss", 0.0),
                ],
                ..Default::default()
            },
        );
        statements.insert(
            2021,
            FinancialStatements {
                profit_and_loss: vec![
                    LineItem::header("Income"),
                    LineItem::new("Revenue", 900.0),
                    LineItem::new("Government grants", 0.0),
                ],
                ..Default::default()
            },
        );
        statements.insert(
            2022,
            FinancialStatements {
                profit_and_loss: vec![
                    LineItem::new("Revenue", 1000.0),
                    LineItem::new("Gain on disposal", 35.0),
                ],
                ..Default::default()
            },
        );
        statements
    }

    #[test]
    fn test_labels_in_first_occurrence_order() {
        let store = AdjustmentStore::new();
        let rows = RawConsolidator::new(&store).consolidate(
            StatementSection::ProfitAndLoss,
            &[2023, 2021, 2022],
            &statements(),
        );

        let labels: Vec<&str> = rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Revenue", "Gain on disposal"]);
        assert_eq!(rows[0].id, "pl_Revenue");
    }

    #[test]
    fn test_label_in_one_year_is_kept_with_zero_fill() {
        let store = AdjustmentStore::new();
        let rows = RawConsolidator::new(&store).consolidate(
            StatementSection::ProfitAndLoss,
            &[2021, 2022, 2023],
            &statements(),
        );

        let gain = rows.iter().find(|r| r.label == "Gain on disposal").unwrap();
        assert_eq!(gain.values_by_year[&2021], CellValue::Number(0.0));
        assert_eq!(gain.values_by_year[&2022], CellValue::Number(35.0));
        assert_eq!(gain.values_by_year[&2023], CellValue::Number(0.0));
    }

    #[test]
    fn test_all_zero_rows_are_dropped() {
        let store = AdjustmentStore::new();
        let rows = RawConsolidator::new(&store).consolidate(
            StatementSection::ProfitAndLoss,
            &[2021, 2022, 2023],
            &statements(),
        );
        assert!(rows.iter().all(|r| r.label != "Government grants"));
        assert!(rows.iter().all(|r| r.label != "Income"));
    }

    #[test]
    fn test_override_rescues_all_zero_row() {
        let mut store = AdjustmentStore::new();
        store.insert("pl_Government grants_2022", Adjustment::value(50.0));

        let rows = RawConsolidator::new(&store).consolidate(
            StatementSection::ProfitAndLoss,
            &[2021, 2022, 2023],
            &statements(),
        );

        let grants = rows.iter().find(|r| r.label == "Government grants").unwrap();
        assert_eq!(grants.values_by_year[&2022], CellValue::Number(50.0));
        assert_eq!(grants.values_by_year[&2023], CellValue::Number(0.0));
    }

    #[test]
    fn test_override_replaces_extracted_cell() {
        let mut store = AdjustmentStore::new();
        store.insert("pl_Revenue_2021", Adjustment::value(950.0));

        let views = RawConsolidator::new(&store).consolidate_all(&[2021, 2022, 2023], &statements());
        assert_eq!(views.pl[0].values_by_year[&2021], CellValue::Number(950.0));
        assert!(views.bs.is_empty());
        assert!(views.cf.is_empty());
    }
}
