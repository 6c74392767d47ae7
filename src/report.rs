use crate::analyzer::{
    FirstOrderGroup, GroupKey, MergedOption, OrderRangeGroup, RankRangeGroup, Reconciliation,
};
use crate::input::ValueCount;
use crate::models::AdmissionRecord;
use anyhow::Result;
use csv::Writer;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The report files one subcommand writes, and so may replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportSet {
    Extract,
    Compare,
    Summary,
}

impl ReportSet {
    pub fn files(self) -> Vec<String> {
        match self {
            ReportSet::Extract => ["admissions.csv", "admissions.json", "rank_ranges.csv"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ReportSet::Compare => ["merged.csv", "order_ranges.csv", "validation.txt"]
                .iter()
                .map(|s| s.to_string())
                .chain(
                    GroupKey::ALL
                        .iter()
                        .map(|key| format!("first_order_{}.csv", key.file_stem())),
                )
                .collect(),
            ReportSet::Summary => vec!["value_counts.csv".to_string()],
        }
    }
}

fn optional_number(value: Option<u32>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn write_admissions_csv(records: &[AdmissionRecord], output_dir: &str) -> Result<PathBuf> {
    let csv_path = Path::new(output_dir).join("admissions.csv");
    let mut writer = Writer::from_path(&csv_path)?;

    writer.write_record([
        "College Code",
        "College Name",
        "Course Code",
        "Course Name",
        "Rank",
        "Roll Number",
        "Percentile",
        "Candidate Name",
        "Location",
        "Category",
        "Sex",
        "MIN",
        "PH",
        "Admission Details",
    ])?;

    for record in records {
        let rank = record.rank.to_string();
        let percentile = record.percentile.to_string();
        writer.write_record([
            record.institution_code.as_str(),
            record.institution_name.as_str(),
            record.program_code.as_str(),
            record.program_name.as_str(),
            rank.as_str(),
            record.identifier_number.as_str(),
            percentile.as_str(),
            record.candidate_name.as_str(),
            record.location_code.as_str(),
            record.category.code(),
            record.sex.code(),
            record.minority.code(),
            record.disability.code(),
            record.admission_detail.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(csv_path)
}

pub fn write_admissions_json(records: &[AdmissionRecord], output_dir: &str) -> Result<PathBuf> {
    let json_path = Path::new(output_dir).join("admissions.json");
    fs::write(&json_path, serde_json::to_string_pretty(records)?)?;
    Ok(json_path)
}

pub fn write_rank_ranges_csv(groups: &[RankRangeGroup], output_dir: &str) -> Result<PathBuf> {
    let csv_path = Path::new(output_dir).join("rank_ranges.csv");
    let mut writer = Writer::from_path(&csv_path)?;

    writer.write_record(["College Code", "Course Code", "Category", "Records", "Ranks"])?;
    for group in groups {
        let records = group.records.to_string();
        writer.write_record([
            group.institution_code.as_str(),
            group.program_code.as_str(),
            group.category.code(),
            records.as_str(),
            group.ranks.as_str(),
        ])?;
    }

    writer.flush()?;
    Ok(csv_path)
}

pub fn write_merged_csv(merged: &[MergedOption], output_dir: &str) -> Result<PathBuf> {
    let csv_path = Path::new(output_dir).join("merged.csv");
    let mut writer = Writer::from_path(&csv_path)?;

    // Every master row carries the same extra columns
    let extra_columns: Vec<String> = merged
        .iter()
        .find_map(|row| row.master.as_ref())
        .map(|master| master.extra.keys().cloned().collect())
        .unwrap_or_default();

    let mut headers: Vec<String> = [
        "Main Code",
        "Order",
        "COLL",
        "College Name",
        "Place",
        "District",
        "CRS",
        "Fee Type",
        "Course Name",
        "Course Type",
        "Type",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    headers.extend(extra_columns.iter().cloned());
    writer.write_record(&headers)?;

    for row in merged {
        let master = row.master.as_ref();
        let master_field = |field: Option<&String>| field.cloned().unwrap_or_default();

        let mut cells = vec![
            row.main_code.clone(),
            optional_number(row.option.order),
            row.option.college_code.clone(),
            row.option.college_name.clone(),
            row.option.place.clone(),
            row.option.district.clone(),
            row.option.course_code.clone(),
            row.option.fee_type.clone(),
            master_field(master.and_then(|m| m.course_name.as_ref())),
            master_field(master.and_then(|m| m.course_type.as_ref())),
            master_field(master.and_then(|m| m.seat_type.as_ref())),
        ];
        for column in &extra_columns {
            cells.push(master_field(master.and_then(|m| m.extra.get(column))));
        }
        writer.write_record(&cells)?;
    }

    writer.flush()?;
    Ok(csv_path)
}

pub fn write_order_ranges_csv(groups: &[OrderRangeGroup], output_dir: &str) -> Result<PathBuf> {
    let csv_path = Path::new(output_dir).join("order_ranges.csv");
    let mut writer = Writer::from_path(&csv_path)?;

    writer.write_record([
        "Course Name",
        "Course Type",
        "Type",
        "Options Filled",
        "Student Order Ranges",
        "Student Order From",
        "Student Order To",
    ])?;
    for group in groups {
        writer.write_record(&[
            group.course_name.clone(),
            group.course_type.clone(),
            group.seat_type.clone(),
            group.options_filled.to_string(),
            group.order_ranges.clone(),
            optional_number(group.order_from),
            optional_number(group.order_to),
        ])?;
    }

    writer.flush()?;
    Ok(csv_path)
}

pub fn write_first_orders_csv(
    key: GroupKey,
    groups: &[FirstOrderGroup],
    output_dir: &str,
) -> Result<PathBuf> {
    let csv_path = Path::new(output_dir).join(format!("first_order_{}.csv", key.file_stem()));
    let mut writer = Writer::from_path(&csv_path)?;

    writer.write_record([key.label(), "Options Filled", "First Student Order"])?;
    for group in groups {
        writer.write_record(&[
            group.value.clone(),
            group.options_filled.to_string(),
            optional_number(group.first_order),
        ])?;
    }

    writer.flush()?;
    Ok(csv_path)
}

pub fn write_validation_report(
    reconciliation: &Reconciliation,
    output_dir: &str,
) -> Result<PathBuf> {
    let mut content = String::new();
    content.push_str("Validation Checks\n");
    content.push_str("=================\n\n");

    content.push_str("Missing data in merged options:\n");
    for (column, missing) in &reconciliation.missing_values {
        content.push_str(&format!("   {:<14} {}\n", column, missing));
    }
    content.push('\n');

    if reconciliation.duplicates.is_empty() {
        content.push_str("No duplicate entries found.\n\n");
    } else {
        content.push_str("Duplicate entries:\n");
        for row in &reconciliation.duplicates {
            content.push_str(&format!(
                "   - {} (order {})\n",
                row.main_code,
                optional_number(row.option.order)
            ));
        }
        content.push('\n');
    }

    if reconciliation.missing_in_master.is_empty() {
        content.push_str("No rows are missing in the master file.\n\n");
    } else {
        content.push_str("Options missing in the master file:\n");
        for option in &reconciliation.missing_in_master {
            content.push_str(&format!(
                "   - {} {} (order {})\n",
                option.main_code(),
                option.college_name,
                optional_number(option.order)
            ));
        }
        content.push('\n');
    }

    if reconciliation.missing_in_upload.is_empty() {
        content.push_str("No rows are missing in the uploaded file.\n");
    } else {
        content.push_str("Master rows missing in the uploaded file:\n");
        for entry in &reconciliation.missing_in_upload {
            content.push_str(&format!(
                "   - {} {}\n",
                entry.main_code(),
                entry.course_name.as_deref().unwrap_or_default()
            ));
        }
    }

    let path = Path::new(output_dir).join("validation.txt");
    fs::write(&path, content)?;
    Ok(path)
}

/// One column per selected table column, then count and percentage, closed
/// by a total row.
pub fn write_value_counts_csv(
    columns: &[&str],
    counts: &[ValueCount],
    output_dir: &str,
) -> Result<PathBuf> {
    let csv_path = Path::new(output_dir).join("value_counts.csv");
    let mut writer = Writer::from_path(&csv_path)?;

    let mut headers: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    headers.push("Count".to_string());
    headers.push("Percentage".to_string());
    writer.write_record(&headers)?;

    for row in counts {
        let mut cells = row.values.clone();
        cells.push(row.count.to_string());
        cells.push(format!("{}%", row.percentage));
        writer.write_record(&cells)?;
    }

    if !counts.is_empty() {
        let total: usize = counts.iter().map(|row| row.count).sum();
        let mut cells = vec![String::new(); columns.len()];
        if let Some(first) = cells.first_mut() {
            *first = "Total".to_string();
        }
        cells.push(total.to_string());
        cells.push("100%".to_string());
        writer.write_record(&cells)?;
    }

    writer.flush()?;
    Ok(csv_path)
}

/// Remove the files `set` is about to rewrite, left over from a previous run.
pub fn clean_output_directory(output_dir: &str, set: ReportSet) -> Result<()> {
    let output_path = Path::new(output_dir);
    if !output_path.exists() {
        return Ok(());
    }

    let mut removed = 0;
    for item in set.files() {
        let item_path = output_path.join(&item);
        if item_path.is_file() {
            fs::remove_file(&item_path)?;
            debug!(file = %item, "removed previous report");
            removed += 1;
        }
    }

    if removed > 0 {
        info!(removed, dir = output_dir, "cleaned output directory");
    }
    Ok(())
}
