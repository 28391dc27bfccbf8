use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use sofa_cli::run::GoldRunResult;
use sofa_model::{DropReason, OrganSystem, RunSummary, SeverityCategory};
use sofa_validate::{IssueSeverity, ValidationReport};

pub fn print_run_summary(result: &GoldRunResult) {
    let summary = &result.summary;
    println!("Output: {}", result.output.display());
    if let Some(path) = &result.summary_json {
        println!("Run summary: {}", path.display());
    }
    if let Some(path) = &result.validation_json {
        println!("Validation report: {}", path.display());
    }
    if result.skipped_measurements > 0 {
        println!(
            "Skipped {} measurement rows with unknown concepts",
            result.skipped_measurements
        );
    }
    println!("{}", run_table(summary));
    println!("{}", system_table(summary));
    println!("{}", severity_table(summary));
    print_issue_table(&result.validation);
}

fn run_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Run"), header_cell("Count")]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    let rows: [(&str, usize); 10] = [
        ("Stays seen", summary.stays_seen),
        ("Stays processed", summary.stays_processed),
        ("Stays with invalid times", summary.stays_invalid),
        ("Stays too short", summary.stays_too_short),
        ("Stays too long", summary.stays_too_long),
        ("Windows generated", summary.windows_generated),
        ("Windows scored", summary.windows_scored),
        ("Windows written", summary.windows_written),
        ("High-risk windows (SOFA >= 10)", summary.high_risk_count),
        ("SpO2/FiO2 surrogate used", summary.surrogate_count),
    ];
    for (label, count) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(count)]);
    }
    for reason in [
        DropReason::TooManyMissing,
        DropReason::MissingRespiratory,
        DropReason::InsufficientData,
    ] {
        table.add_row(vec![
            Cell::new(format!("Dropped: {reason}")),
            count_cell(summary.dropped(reason), Color::Yellow),
        ]);
    }
    table.add_row(vec![
        Cell::new("Failed windows"),
        count_cell(summary.windows_failed, Color::Red),
    ]);
    table.add_row(vec![
        Cell::new("Drop rate"),
        Cell::new(format!("{:.1}%", summary.drop_rate_pct())),
    ]);
    table.add_row(vec![
        Cell::new("Total SOFA (avg / min / max)"),
        total_cell(summary),
    ]);
    table.add_row(vec![
        Cell::new("Elapsed").add_attribute(Attribute::Bold),
        Cell::new(format!(
            "{} ms ({:.1} windows/s)",
            summary.elapsed_ms,
            summary.processing_rate()
        ))
        .add_attribute(Attribute::Bold),
    ]);
    table
}

fn total_cell(summary: &RunSummary) -> Cell {
    match (summary.average_total(), summary.min_total, summary.max_total) {
        (Some(average), Some(min), Some(max)) => {
            Cell::new(format!("{average:.2} / {min} / {max}"))
        }
        _ => dim_cell("-"),
    }
}

fn system_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Organ system"),
        header_cell("Windows"),
        header_cell("Available"),
        header_cell("LOCF"),
        header_cell("Median"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 1..5 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for system in OrganSystem::ALL {
        let (locf, median) = summary
            .imputation_counts
            .iter()
            .filter(|(parameter, _)| parameter.system() == system)
            .fold((0, 0), |(locf, median), (_, counts)| {
                (locf + counts.locf, median + counts.population_median)
            });
        table.add_row(vec![
            Cell::new(system.label()),
            Cell::new(summary.system_availability.get(&system).copied().unwrap_or(0)),
            Cell::new(format!("{:.1}%", summary.availability_pct(system))),
            count_cell(locf, Color::Cyan),
            count_cell(median, Color::Cyan),
        ]);
    }
    table
}

fn severity_table(summary: &RunSummary) -> Table {
    let mut table = Table::new();
    table.set_header(vec![header_cell("Severity / cohort"), header_cell("Windows")]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for severity in SeverityCategory::ALL {
        let count = summary
            .severity_distribution
            .get(&severity)
            .copied()
            .unwrap_or(0);
        table.add_row(vec![severity_label_cell(severity), Cell::new(count)]);
    }
    for (label, count) in &summary.cohort_windows {
        table.add_row(vec![
            Cell::new(format!("Cohort {label}")).fg(Color::Cyan),
            Cell::new(count),
        ]);
    }
    table
}

fn print_issue_table(report: &ValidationReport) {
    if report.issues.is_empty() {
        return;
    }
    let mut issues: Vec<_> = report.issues.iter().collect();
    issues.sort_by(|a, b| a.severity.cmp(&b.severity).then_with(|| a.code.cmp(&b.code)));
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Severity"),
        header_cell("Code"),
        header_cell("Count"),
        header_cell("Message"),
        header_cell("Example"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Center);
    align_column(&mut table, 2, CellAlignment::Right);
    for issue in issues {
        table.add_row(vec![
            severity_cell(issue.severity),
            Cell::new(&issue.code),
            Cell::new(issue.count),
            Cell::new(&issue.message),
            match issue.example {
                Some(key) => Cell::new(key),
                None => dim_cell("-"),
            },
        ]);
    }
    println!();
    println!("Validation ({} records):", report.records_checked);
    println!("{table}");
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100);
}

pub fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value.to_string()).add_attribute(Attribute::Dim)
}

fn severity_label_cell(severity: SeverityCategory) -> Cell {
    let cell = Cell::new(severity.as_str());
    match severity {
        SeverityCategory::Severe | SeverityCategory::Critical => {
            cell.fg(Color::Red).add_attribute(Attribute::Bold)
        }
        SeverityCategory::Moderate => cell.fg(Color::Yellow),
        SeverityCategory::Unknown => cell.add_attribute(Attribute::Dim),
        SeverityCategory::Normal | SeverityCategory::Mild => cell,
    }
}

fn severity_cell(severity: IssueSeverity) -> Cell {
    let cell = Cell::new(severity.as_str().to_uppercase()).add_attribute(Attribute::Bold);
    match severity {
        IssueSeverity::Error => cell.fg(Color::Red),
        IssueSeverity::Warning => cell.fg(Color::Yellow),
        IssueSeverity::Info => cell.fg(Color::Blue),
    }
}
