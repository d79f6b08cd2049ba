use financial_model_builder::*;
use std::collections::BTreeMap;

fn trading_company() -> StatementsByYear {
    let mut statements = StatementsByYear::new();

    // year, revenue, cost of sales, other income, G&A, finance costs, depreciation, cash
    let figures = [
        (2022, 1000.0, -400.0, 50.0, -200.0, 30.0, 20.0, 250.0),
        (2023, 1200.0, -500.0, 60.0, -240.0, 40.0, 25.0, 300.0),
    ];

    for (year, revenue, cost, other, admin, finance, depreciation, cash) in figures {
        statements.insert(
            year,
            FinancialStatements {
                profit_and_loss: vec![
                    LineItem::new("Revenue", revenue).with_note("16"),
                    LineItem::new("Cost of sales", cost),
                    LineItem::new("Other income", other),
                    LineItem::new("General and administrative expenses", admin),
                    LineItem::new("Finance costs", finance),
                    LineItem::new("Profit for the year", 0.0),
                ],
                balance_sheet: vec![
                    LineItem::header("Non-current liabilities"),
                    LineItem::new("Borrowings", 300.0),
                    LineItem::header("Current liabilities"),
                    LineItem::new("Borrowings", 100.0),
                    LineItem::new("Trade and other payables", 80.0),
                    LineItem::new("Cash and cash equivalents", cash),
                ],
                cash_flow: vec![
                    LineItem::new("Depreciation", depreciation),
                    LineItem::new("Amortisation of intangible assets", 5.0),
                ],
                notes: BTreeMap::new(),
            },
        );
    }

    statements
}

fn cell(rows: &[CalculatedRow], id: &str, year: i32) -> CellValue {
    rows.iter()
        .find(|r| r.id == id)
        .and_then(|r| r.values_by_year.get(&year))
        .cloned()
        .unwrap_or_else(|| panic!("no cell for {} in {}", id, year))
}

fn number(rows: &[CalculatedRow], id: &str, year: i32) -> f64 {
    cell(rows, id, year).as_number().unwrap()
}

#[test]
fn test_trading_company_waterfall() {
    let model =
        build_consolidated_model(&[2022, 2023], &trading_company(), &AdjustmentStore::new())
            .unwrap();
    let income = &model.calculated_income_statement;

    assert_eq!(model.years, vec![2022, 2023]);
    assert_eq!(number(income, "Revenue", 2022), 1000.0);
    assert_eq!(number(income, "Revenue", 2023), 1200.0);
    assert_eq!(number(income, "Gross Profit", 2022), 600.0);
    assert_eq!(number(income, "Gross Profit", 2023), 700.0);

    assert_eq!(cell(income, "Revenue Growth %", 2022), CellValue::percent(0.0));
    assert_eq!(cell(income, "Revenue Growth %", 2023), CellValue::percent(20.0));
    assert_eq!(
        cell(income, "Gross Margin %", 2022),
        CellValue::Percent("60.0%".to_string())
    );

    // 2023: EBITDA 700 + 60 - 240 = 520, EBIT 520 - 25 - 5 = 490, EBT 490 - 40 = 450
    assert!((number(income, "EBITDA", 2023) - 520.0).abs() < 1e-9);
    assert!((number(income, "Depreciation", 2023) - 25.0).abs() < 1e-9);
    assert!((number(income, "EBIT", 2023) - 490.0).abs() < 1e-9);
    assert!((number(income, "EBT", 2023) - 450.0).abs() < 1e-9);
    assert!((number(income, "Tax", 2023) - 490.0 * TAX_RATE).abs() < 1e-9);
    assert!((number(income, "Net Income", 2023) - (450.0 - 490.0 * TAX_RATE)).abs() < 1e-9);

    let labels: Vec<&str> = income.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels.first(), Some(&"Revenue & Gross Profit"));
    assert_eq!(labels.last(), Some(&"Net Income Margin %"));
    assert_eq!(income.iter().filter(|r| r.is_header).count(), 3);
}

#[test]
fn test_net_income_override_does_not_propagate() {
    let statements = trading_company();
    let baseline =
        build_consolidated_model(&[2022, 2023], &statements, &AdjustmentStore::new()).unwrap();

    let mut adjustments = AdjustmentStore::new();
    adjustments.insert(
        AdjustmentKey::calculated("Net Income", 2023),
        Adjustment::value(999.0),
    );
    let model = build_consolidated_model(&[2022, 2023], &statements, &adjustments).unwrap();

    let income = &model.calculated_income_statement;
    let before = &baseline.calculated_income_statement;
    assert_eq!(number(income, "Net Income", 2023), 999.0);
    assert_eq!(number(income, "Net Income", 2022), number(before, "Net Income", 2022));
    assert_eq!(number(income, "EBT", 2023), number(before, "EBT", 2023));
    assert_eq!(number(income, "Tax", 2023), number(before, "Tax", 2023));
    assert_eq!(
        cell(income, "Net Income Margin %", 2023),
        cell(before, "Net Income Margin %", 2023)
    );
}

#[test]
fn test_depreciation_override_stays_in_income_statement() {
    let statements = trading_company();
    let mut adjustments = AdjustmentStore::new();
    adjustments.insert(
        AdjustmentKey::calculated("Depreciation", 2023),
        Adjustment::value(77.0),
    );

    let model = build_consolidated_model(&[2022, 2023], &statements, &adjustments).unwrap();
    let income = &model.calculated_income_statement;
    let cf = &model.calculated_cash_flow;

    assert_eq!(number(income, "Depreciation", 2023), 77.0);
    assert!((number(income, "EBIT", 2023) - 490.0).abs() < 1e-9);
    assert_eq!(number(cf, "Depreciation#cf", 2023), 25.0);
    assert_eq!(number(cf, "Depreciation#cf", 2022), 20.0);
    assert!(cf.iter().all(|r| r.id != "Depreciation"));
}

#[test]
fn test_calculated_row_ids_are_distinct() {
    let model =
        build_consolidated_model(&[2022, 2023], &trading_company(), &AdjustmentStore::new())
            .unwrap();

    let mut seen = std::collections::HashSet::new();
    for row in model
        .calculated_income_statement
        .iter()
        .chain(&model.calculated_balance_sheet)
        .chain(&model.calculated_cash_flow)
        .filter(|r| !r.is_header)
    {
        assert!(seen.insert(row.id.as_str()), "row id {} is shared", row.id);
    }
}

#[test]
fn test_repeated_borrowings_resolve_by_position() {
    let statements = trading_company();
    let mut adjustments = AdjustmentStore::new();
    adjustments.insert(
        AdjustmentKey::calculated("Borrowings#current", 2023),
        Adjustment::value(150.0),
    );

    let model = build_consolidated_model(&[2022, 2023], &statements, &adjustments).unwrap();
    let bs = &model.calculated_balance_sheet;

    assert_eq!(number(bs, "Borrowings#non-current", 2022), 300.0);
    assert_eq!(number(bs, "Borrowings#current", 2022), 100.0);
    assert_eq!(number(bs, "Borrowings#non-current", 2023), 300.0);
    assert_eq!(number(bs, "Borrowings#current", 2023), 150.0);

    let displayed: Vec<&str> = bs
        .iter()
        .filter(|r| r.id.starts_with("Borrowings"))
        .map(|r| r.label.as_str())
        .collect();
    assert_eq!(displayed, vec!["Borrowings", "Borrowings"]);

    // Template rows with nothing extracted still appear, as zero.
    assert_eq!(number(bs, "Inventories", 2023), 0.0);
}

#[test]
fn test_raw_views_side_by_side() {
    let mut statements = trading_company();
    if let Some(fs) = statements.get_mut(&2023) {
        fs.profit_and_loss
            .push(LineItem::new("Gain on disposal of equipment", 12.0));
    }

    let mut adjustments = AdjustmentStore::new();
    adjustments.insert(
        AdjustmentKey::raw(StatementSection::BalanceSheet, "Cash and cash equivalents", 2022),
        Adjustment::value(275.0),
    );

    let model = build_consolidated_model(&[2022, 2023], &statements, &adjustments).unwrap();

    let pl = &model.raw_views.pl;
    assert_eq!(pl[0].id, "pl_Revenue");
    assert!(pl.iter().all(|r| r.label != "Profit for the year"));
    let gain = pl
        .iter()
        .find(|r| r.label == "Gain on disposal of equipment")
        .unwrap();
    assert_eq!(gain.values_by_year[&2022], CellValue::Number(0.0));
    assert_eq!(gain.values_by_year[&2023], CellValue::Number(12.0));

    let bs = &model.raw_views.bs;
    assert_eq!(bs.iter().filter(|r| r.label == "Borrowings").count(), 1);
    assert!(bs.iter().all(|r| !r.is_header));
    let cash = bs
        .iter()
        .find(|r| r.id == "bs_Cash and cash equivalents")
        .unwrap();
    assert_eq!(cash.values_by_year[&2022], CellValue::Number(275.0));

    // The raw override feeds the template too.
    assert_eq!(
        number(&model.calculated_balance_sheet, "Cash and cash equivalents", 2022),
        275.0
    );
}

#[test]
fn test_consolidation_is_deterministic() {
    let statements = trading_company();
    let mut adjustments = AdjustmentStore::new();
    adjustments.insert("pl_Revenue_2022", Adjustment::value(1100.0));
    adjustments.set_comment("CALCULATED_EBIT_2023", Some("reviewed".to_string()));

    let first = build_consolidated_model(&[2023, 2022], &statements, &adjustments)
        .unwrap()
        .to_json()
        .unwrap();
    let second = build_consolidated_model(&[2022, 2023, 2023], &statements, &adjustments)
        .unwrap()
        .to_json()
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_file_backed_project_flow() -> anyhow::Result<()> {
    let temp = tempfile::tempdir()?;
    let mut repo = JsonFileRepository::from_config(&StoreConfig::new(temp.path()));

    let (company_id, project) = initialize_project(&mut repo, "Gulf Trading LLC", &[2023])?;
    assert_eq!(project.years, vec![2023]);

    let document = ExtractionDocument::from_json_str(
        r#"{
            "trial_balance": [{"Account": "Sales", "Credit": "1,200"}],
            "financial_statements": {
                "statement_of_profit_or_loss": [
                    {"line_item": "Revenue", "note_ref": "16", "value": "1,200", "is_header": false},
                    {"line_item": "Cost of sales", "note_ref": "", "value": "(500)", "is_header": false}
                ],
                "statement_of_financial_position": [],
                "statement_of_cash_flows": [],
                "notes": {"16": "Revenue is recognised at a point in time."}
            }
        }"#,
    )?;
    repo.save_extraction(&company_id, 2023, &document)?;

    update_adjustment(
        &mut repo,
        &company_id,
        "CALCULATED_Net Income_2023",
        AdjustmentUpdate::value(Some(650.0)).with_comment(Some("per audited accounts".to_string())),
    )?;

    let model = consolidate_project(&repo, &company_id)?;
    let income = &model.calculated_income_statement;
    assert_eq!(number(income, "Revenue", 2023), 1200.0);
    assert_eq!(number(income, "Cost of Sales", 2023), -500.0);
    assert_eq!(number(income, "Gross Profit", 2023), 700.0);
    assert_eq!(number(income, "Net Income", 2023), 650.0);

    assert_eq!(model.trial_balance[&2023].len(), 1);
    assert!(model.notes[&2023]["16"].contains("point in time"));

    assert!(matches!(
        update_adjustment(
            &mut repo,
            &company_id,
            "pl_Revenue_2023",
            AdjustmentUpdate::value(Some(f64::NAN)),
        ),
        Err(ModelError::InvalidAdjustment { .. })
    ));

    Ok(())
}

#[test]
fn test_exports() {
    let model =
        build_consolidated_model(&[2022, 2023], &trading_company(), &AdjustmentStore::new())
            .unwrap();

    let csv = to_csv(&model).unwrap();
    assert!(csv.starts_with("Section,Line Item,2022,2023"));
    assert!(csv.contains("Income Statement,Gross Margin %,60.0%,58.3%"));
    assert!(csv.contains("Raw Balance Sheet,Borrowings,300,300"));

    let temp = tempfile::tempdir().unwrap();
    let path = temp.path().join("model.csv");
    std::fs::write(&path, &csv).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), csv);

    let markdown = to_markdown(&model);
    assert!(markdown.contains("| **Operating Performance** |"));
    assert!(markdown.contains("## Raw Cash Flows"));
}

#[test]
fn test_schema_generation() {
    let schema_json = ConsolidatedModel::schema_as_json().unwrap();
    assert!(schema_json.contains("calculated_balance_sheet"));
    assert!(schema_json.contains("raw_views"));

    let response = ExtractionDocument::response_schema().unwrap();
    assert!(response.to_string().contains("statement_of_cash_flows"));
}
