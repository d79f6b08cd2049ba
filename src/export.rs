use crate::error::{ModelError, Result};
use crate::schema::{CalculatedRow, CellValue, ConsolidatedModel, RawRow, StatementSection};
use std::collections::BTreeMap;

/// Read access shared by raw and calculated rows for rendering.
pub trait TableRow {
    fn label(&self) -> &str;
    fn is_header(&self) -> bool;
    fn cells(&self) -> &BTreeMap<i32, CellValue>;
}

impl TableRow for RawRow {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_header(&self) -> bool {
        self.is_header
    }

    fn cells(&self) -> &BTreeMap<i32, CellValue> {
        &self.values_by_year
    }
}

impl TableRow for CalculatedRow {
    fn label(&self) -> &str {
        &self.label
    }

    fn is_header(&self) -> bool {
        self.is_header
    }

    fn cells(&self) -> &BTreeMap<i32, CellValue> {
        &self.values_by_year
    }
}

fn render_cell(cell: Option<&CellValue>) -> String {
    match cell {
        Some(CellValue::Number(v)) => format!("{}", v),
        Some(CellValue::Percent(p)) => p.clone(),
        Some(CellValue::Blank) | None => String::new(),
    }
}

fn sections(model: &ConsolidatedModel) -> Vec<(String, Vec<&dyn TableRow>)> {
    fn rows<T: TableRow>(rows: &[T]) -> Vec<&dyn TableRow> {
        rows.iter().map(|r| r as &dyn TableRow).collect()
    }

    let mut out = vec![
        (
            "Income Statement".to_string(),
            rows(&model.calculated_income_statement),
        ),
        (
            "Balance Sheet".to_string(),
            rows(&model.calculated_balance_sheet),
        ),
        ("Cash Flow".to_string(), rows(&model.calculated_cash_flow)),
    ];

    for section in StatementSection::ALL {
        out.push((
            format!("Raw {}", section.display_name()),
            rows(model.raw_views.section(section)),
        ));
    }

    out
}

/// Renders every view as consecutive CSV blocks separated by an empty record.
pub fn to_csv(model: &ConsolidatedModel) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    for (i, (title, rows)) in sections(model).into_iter().enumerate() {
        if i > 0 {
            writer.write_record([""])?;
        }

        let mut header = vec!["Section".to_string(), "Line Item".to_string()];
        header.extend(model.years.iter().map(|y| y.to_string()));
        writer.write_record(&header)?;

        for row in rows {
            let mut record = vec![title.clone(), row.label().to_string()];
            record.extend(
                model
                    .years
                    .iter()
                    .map(|y| render_cell(row.cells().get(y))),
            );
            writer.write_record(&record)?;
        }
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ModelError::IoError(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| {
        ModelError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

/// Renders every view as a Markdown table, with header rows in bold.
pub fn to_markdown(model: &ConsolidatedModel) -> String {
    let mut output = String::new();
    output.push_str("# Consolidated Financial Model\n\n");

    for (title, rows) in sections(model) {
        output.push_str(&format!("## {}\n\n", title));

        if rows.is_empty() {
            output.push_str("_No data._\n\n");
            continue;
        }

        output.push_str("| Line Item |");
        for year in &model.years {
            output.push_str(&format!(" {} |", year));
        }
        output.push('\n');

        output.push_str("| :--- |");
        for _ in &model.years {
            output.push_str(" ---: |");
        }
        output.push('\n');

        for row in rows {
            let label = row.label().replace('|', "\\|");
            if row.is_header() {
                output.push_str(&format!("| **{}** |", label));
            } else {
                output.push_str(&format!("| {} |", label));
            }
            for year in &model.years {
                output.push_str(&format!(" {} |", render_cell(row.cells().get(year))));
            }
            output.push('\n');
        }
        output.push('\n');
    }

    output
}
