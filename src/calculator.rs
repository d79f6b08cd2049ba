use crate::resolver::finite_or_zero;
use crate::rules::{resolve_metric, waterfall_rules, Metric, MetricRule};
use crate::schema::{FinancialStatements, StatementsByYear};
use crate::utils::normalize_years;
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;

pub type YearMap = BTreeMap<i32, f64>;

/// Flat statutory rate applied to EBIT.
pub const TAX_RATE: f64 = 0.09;

/// A computed row before the derived-row overlay is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRow {
    pub label: String,
    pub id: String,
    pub is_header: bool,
    pub format_as_percent: bool,
    pub values: YearMap,
}

impl DerivedRow {
    pub fn header(label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            id: label.clone(),
            label,
            is_header: true,
            format_as_percent: false,
            values: YearMap::new(),
        }
    }

    pub fn amount(label: impl Into<String>, values: &YearMap) -> Self {
        let label = label.into();
        Self {
            id: label.clone(),
            label,
            is_header: false,
            format_as_percent: false,
            values: values.clone(),
        }
    }

    pub fn percent(label: impl Into<String>, values: &YearMap) -> Self {
        Self {
            format_as_percent: true,
            ..Self::amount(label, values)
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// Per-year results of every waterfall step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WaterfallMetrics {
    pub years: Vec<i32>,
    pub revenue: YearMap,
    pub revenue_growth: YearMap,
    pub cost_of_sales: YearMap,
    pub gross_profit: YearMap,
    pub cost_of_sales_pct: YearMap,
    pub gross_margin_pct: YearMap,
    pub other_income: YearMap,
    pub general_and_administrative: YearMap,
    pub ebitda: YearMap,
    pub ebitda_margin_pct: YearMap,
    pub depreciation: YearMap,
    pub amortization: YearMap,
    pub ebit: YearMap,
    pub ebit_margin_pct: YearMap,
    pub interest_expense: YearMap,
    pub ebt: YearMap,
    pub ebt_margin_pct: YearMap,
    pub tax: YearMap,
    pub net_income: YearMap,
    pub net_income_margin_pct: YearMap,
}

fn at(map: &YearMap, year: i32) -> f64 {
    map.get(&year).copied().unwrap_or(0.0)
}

fn put(map: &mut YearMap, year: i32, value: f64) {
    map.insert(year, finite_or_zero(value));
}

/// Denominator for margin percentages. A zero-revenue year divides by 1 instead, which keeps the
/// output finite but reports the raw amount as the "percentage" for that year.
fn revenue_or_one(revenue: f64) -> f64 {
    if revenue == 0.0 {
        1.0
    } else {
        revenue
    }
}

fn margin(value: f64, revenue: f64) -> f64 {
    value / revenue_or_one(revenue) * 100.0
}

/// Computes the income-statement waterfall.
///
/// Every step runs across all years before the next step starts, and each step only reads maps
/// produced by earlier steps.
pub struct DerivedMetricsCalculator {
    rules: Vec<MetricRule>,
}

impl Default for DerivedMetricsCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl DerivedMetricsCalculator {
    pub fn new() -> Self {
        Self::with_rules(waterfall_rules())
    }

    pub fn with_rules(rules: Vec<MetricRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[MetricRule] {
        &self.rules
    }

    pub fn compute(&self, years: &[i32], statements: &StatementsByYear) -> WaterfallMetrics {
        let years = normalize_years(years);
        let empty = FinancialStatements::default();
        let statement = |year: i32| statements.get(&year).unwrap_or(&empty);

        let mut m = WaterfallMetrics {
            years: years.clone(),
            ..Default::default()
        };

        // 1. revenue
        for &y in &years {
            put(
                &mut m.revenue,
                y,
                resolve_metric(&self.rules, Metric::Revenue, statement(y)),
            );
        }

        // 2. revenue growth against the preceding year in the sequence
        let mut previous: Option<f64> = None;
        for &y in &years {
            let revenue = at(&m.revenue, y);
            let growth = match previous {
                Some(prev) if prev != 0.0 => (revenue - prev) / prev * 100.0,
                _ => 0.0,
            };
            put(&mut m.revenue_growth, y, growth);
            previous = Some(revenue);
        }

        // 3. cost of sales, reported negative
        for &y in &years {
            put(
                &mut m.cost_of_sales,
                y,
                resolve_metric(&self.rules, Metric::CostOfSales, statement(y)),
            );
        }

        // 4. gross profit
        for &y in &years {
            put(
                &mut m.gross_profit,
                y,
                at(&m.revenue, y) + at(&m.cost_of_sales, y),
            );
        }

        // 5. cost and gross margin percentages
        for &y in &years {
            let revenue = at(&m.revenue, y);
            put(
                &mut m.cost_of_sales_pct,
                y,
                margin(at(&m.cost_of_sales, y), revenue).abs(),
            );
            put(
                &mut m.gross_margin_pct,
                y,
                margin(at(&m.gross_profit, y), revenue).abs(),
            );
        }

        // 6-7. other income, general & administrative
        for &y in &years {
            put(
                &mut m.other_income,
                y,
                resolve_metric(&self.rules, Metric::OtherIncome, statement(y)),
            );
        }
        for &y in &years {
            put(
                &mut m.general_and_administrative,
                y,
                resolve_metric(&self.rules, Metric::GeneralAndAdministrative, statement(y)),
            );
        }

        // 8. EBITDA
        for &y in &years {
            let ebitda =
                at(&m.gross_profit, y) + at(&m.other_income, y) + at(&m.general_and_administrative, y);
            put(&mut m.ebitda, y, ebitda);
            put(&mut m.ebitda_margin_pct, y, margin(ebitda, at(&m.revenue, y)));
        }

        // 9. depreciation (P&L, then cash flow) and amortization (cash flow)
        for &y in &years {
            put(
                &mut m.depreciation,
                y,
                resolve_metric(&self.rules, Metric::Depreciation, statement(y)),
            );
        }
        for &y in &years {
            put(
                &mut m.amortization,
                y,
                resolve_metric(&self.rules, Metric::Amortization, statement(y)),
            );
        }

        // 10. EBIT
        for &y in &years {
            let ebit = at(&m.ebitda, y) - at(&m.depreciation, y) - at(&m.amortization, y);
            put(&mut m.ebit, y, ebit);
            put(&mut m.ebit_margin_pct, y, margin(ebit, at(&m.revenue, y)));
        }

        // 11. interest and EBT
        for &y in &years {
            put(
                &mut m.interest_expense,
                y,
                resolve_metric(&self.rules, Metric::InterestExpense, statement(y)),
            );
        }
        for &y in &years {
            let ebt = at(&m.ebit, y) - at(&m.interest_expense, y);
            put(&mut m.ebt, y, ebt);
            put(&mut m.ebt_margin_pct, y, margin(ebt, at(&m.revenue, y)));
        }

        // 12. tax on EBIT
        for &y in &years {
            put(&mut m.tax, y, at(&m.ebit, y) * TAX_RATE);
        }

        // 13. net income
        for &y in &years {
            let net_income = at(&m.ebt, y) - at(&m.tax, y);
            put(&mut m.net_income, y, net_income);
            put(
                &mut m.net_income_margin_pct,
                y,
                margin(net_income, at(&m.revenue, y)),
            );
        }

        debug!("Computed waterfall for {} years", years.len());
        m
    }
}

impl WaterfallMetrics {
    /// The income statement rows in display order.
    pub fn rows(&self) -> Vec<DerivedRow> {
        vec![
            DerivedRow::header("Revenue & Gross Profit"),
            DerivedRow::amount("Revenue", &self.revenue),
            DerivedRow::percent("Revenue Growth %", &self.revenue_growth),
            DerivedRow::amount("Cost of Sales", &self.cost_of_sales),
            DerivedRow::percent("Cost of Sales %", &self.cost_of_sales_pct),
            DerivedRow::amount("Gross Profit", &self.gross_profit),
            DerivedRow::percent("Gross Margin %", &self.gross_margin_pct),
            DerivedRow::header("Operating Performance"),
            DerivedRow::amount("Other Income", &self.other_income),
            DerivedRow::amount(
                "General & Administrative Expenses",
                &self.general_and_administrative,
            ),
            DerivedRow::amount("EBITDA", &self.ebitda),
            DerivedRow::percent("EBITDA Margin %", &self.ebitda_margin_pct),
            DerivedRow::amount("Depreciation", &self.depreciation),
            DerivedRow::amount("Amortization", &self.amortization),
            DerivedRow::amount("EBIT", &self.ebit),
            DerivedRow::percent("EBIT Margin %", &self.ebit_margin_pct),
            DerivedRow::header("Net Profit"),
            DerivedRow::amount("Interest Expense", &self.interest_expense),
            DerivedRow::amount("EBT", &self.ebt),
            DerivedRow::percent("EBT Margin %", &self.ebt_margin_pct),
            DerivedRow::amount("Tax", &self.tax),
            DerivedRow::amount("Net Income", &self.net_income),
            DerivedRow::percent("Net Income Margin %", &self.net_income_margin_pct),
        ]
    }
}
