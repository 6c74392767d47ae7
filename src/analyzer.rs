use crate::models::{AdmissionRecord, Category, MasterEntry, OptionEntry};
use crate::ranges;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedOption {
    pub option: OptionEntry,
    pub main_code: String, // college code + course code
    pub master: Option<MasterEntry>,
}

impl MergedOption {
    fn course_name(&self) -> Option<&str> {
        self.master.as_ref().and_then(|m| m.course_name.as_deref())
    }

    fn course_type(&self) -> Option<&str> {
        self.master.as_ref().and_then(|m| m.course_type.as_deref())
    }

    fn seat_type(&self) -> Option<&str> {
        self.master.as_ref().and_then(|m| m.seat_type.as_deref())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub merged: Vec<MergedOption>,
    pub missing_in_master: Vec<OptionEntry>,
    pub missing_in_upload: Vec<MasterEntry>,
    pub duplicates: Vec<MergedOption>,
    pub missing_values: Vec<(String, usize)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRangeGroup {
    pub course_name: String,
    pub course_type: String,
    pub seat_type: String,
    pub options_filled: usize,
    pub order_ranges: String,
    pub order_from: Option<u32>,
    pub order_to: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    CourseCode,
    FeeType,
    CourseType,
    CollegeCode,
}

impl GroupKey {
    pub const ALL: [GroupKey; 4] = [
        GroupKey::CourseCode,
        GroupKey::FeeType,
        GroupKey::CourseType,
        GroupKey::CollegeCode,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GroupKey::CourseCode => "Course",
            GroupKey::FeeType => "Fee Type",
            GroupKey::CourseType => "Course Type",
            GroupKey::CollegeCode => "College",
        }
    }

    pub fn file_stem(self) -> &'static str {
        match self {
            GroupKey::CourseCode => "course",
            GroupKey::FeeType => "fee_type",
            GroupKey::CourseType => "course_type",
            GroupKey::CollegeCode => "college",
        }
    }

    fn value(self, row: &MergedOption) -> Option<&str> {
        let value = match self {
            GroupKey::CourseCode => Some(row.option.course_code.as_str()),
            GroupKey::FeeType => Some(row.option.fee_type.as_str()),
            GroupKey::CourseType => row.course_type(),
            GroupKey::CollegeCode => Some(row.option.college_code.as_str()),
        };
        value.map(str::trim).filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirstOrderGroup {
    pub value: String,
    pub options_filled: usize,
    pub first_order: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankRangeGroup {
    pub institution_code: String,
    pub program_code: String,
    pub category: Category,
    pub records: usize,
    pub ranks: String,
}

/// Joins an uploaded option list against the master sheet.
pub struct ChoiceAnalyzer<'a> {
    master: &'a [MasterEntry],
}

impl<'a> ChoiceAnalyzer<'a> {
    pub fn new(master: &'a [MasterEntry]) -> Self {
        Self { master }
    }

    pub fn reconcile(&self, options: &[OptionEntry]) -> Reconciliation {
        let mut master_by_code: HashMap<String, Vec<&MasterEntry>> = HashMap::new();
        for entry in self.master {
            master_by_code
                .entry(entry.main_code())
                .or_default()
                .push(entry);
        }

        // Step 1: left join, one merged row per matching master row
        let mut merged = Vec::new();
        let mut missing_in_master = Vec::new();
        for option in options {
            let main_code = option.main_code();
            match master_by_code.get(&main_code) {
                Some(matches) => {
                    for entry in matches {
                        merged.push(MergedOption {
                            option: option.clone(),
                            main_code: main_code.clone(),
                            master: Some((*entry).clone()),
                        });
                    }
                }
                None => {
                    missing_in_master.push(option.clone());
                    merged.push(MergedOption {
                        option: option.clone(),
                        main_code,
                        master: None,
                    });
                }
            }
        }

        // Step 2: master rows the upload never mentions
        let uploaded: HashSet<String> = options.iter().map(OptionEntry::main_code).collect();
        let missing_in_upload: Vec<MasterEntry> = self
            .master
            .iter()
            .filter(|entry| !uploaded.contains(&entry.main_code()))
            .cloned()
            .collect();

        // Step 3: every merged row whose main code repeats
        let mut code_counts: HashMap<&str, usize> = HashMap::new();
        for row in &merged {
            *code_counts.entry(row.main_code.as_str()).or_insert(0) += 1;
        }
        let duplicates: Vec<MergedOption> = merged
            .iter()
            .filter(|row| code_counts[row.main_code.as_str()] > 1)
            .cloned()
            .collect();

        let missing_values = missing_value_counts(&merged);

        info!(
            options = options.len(),
            merged = merged.len(),
            missing_in_master = missing_in_master.len(),
            missing_in_upload = missing_in_upload.len(),
            duplicates = duplicates.len(),
            "reconciled option list against master"
        );

        Reconciliation {
            merged,
            missing_in_master,
            missing_in_upload,
            duplicates,
            missing_values,
        }
    }
}

fn missing_value_counts(merged: &[MergedOption]) -> Vec<(String, usize)> {
    let count = |missing: fn(&MergedOption) -> bool| {
        merged.iter().filter(|row| missing(*row)).count()
    };

    vec![
        ("Order".to_string(), count(|row| row.option.order.is_none())),
        ("Master Match".to_string(), count(|row| row.master.is_none())),
        ("Course Name".to_string(), count(|row| row.course_name().is_none())),
        ("Course Type".to_string(), count(|row| row.course_type().is_none())),
        ("Type".to_string(), count(|row| row.seat_type().is_none())),
    ]
}

/// Missing orders sort after every present one.
fn order_cmp(a: Option<u32>, b: Option<u32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn sorted_unique_orders<'r>(rows: impl Iterator<Item = &'r MergedOption>) -> Vec<u32> {
    let mut orders: Vec<u32> = rows.filter_map(|row| row.option.order).collect();
    orders.sort_unstable();
    orders.dedup();
    orders
}

/// Option order ranges per (course name, course type, seat type).
///
/// Rows whose master data lacks any of the three are left out.
pub fn order_ranges(merged: &[MergedOption]) -> Vec<OrderRangeGroup> {
    let mut groups: BTreeMap<(&str, &str, &str), Vec<&MergedOption>> = BTreeMap::new();
    for row in merged {
        if let (Some(name), Some(course_type), Some(seat_type)) =
            (row.course_name(), row.course_type(), row.seat_type())
        {
            groups
                .entry((name, course_type, seat_type))
                .or_default()
                .push(row);
        }
    }

    let mut table: Vec<OrderRangeGroup> = groups
        .into_iter()
        .map(|((name, course_type, seat_type), rows)| {
            let orders = sorted_unique_orders(rows.iter().copied());
            let bounds = ranges::bounds(&orders);
            OrderRangeGroup {
                course_name: name.to_string(),
                course_type: course_type.to_string(),
                seat_type: seat_type.to_string(),
                options_filled: rows.len(),
                order_ranges: ranges::compress(&orders),
                order_from: bounds.map(|(from, _)| from),
                order_to: bounds.map(|(_, to)| to),
            }
        })
        .collect();

    table.sort_by(|a, b| {
        order_cmp(a.order_from, b.order_from).then_with(|| a.course_name.cmp(&b.course_name))
    });
    table
}

/// Option count and earliest order for each value of `key`.
pub fn first_orders(merged: &[MergedOption], key: GroupKey) -> Vec<FirstOrderGroup> {
    let mut groups: BTreeMap<&str, Vec<&MergedOption>> = BTreeMap::new();
    for row in merged {
        if let Some(value) = key.value(row) {
            groups.entry(value).or_default().push(row);
        }
    }

    let mut table: Vec<FirstOrderGroup> = groups
        .into_iter()
        .map(|(value, rows)| FirstOrderGroup {
            value: value.to_string(),
            options_filled: rows.len(),
            first_order: rows.iter().filter_map(|row| row.option.order).min(),
        })
        .collect();

    table.sort_by(|a, b| {
        order_cmp(a.first_order, b.first_order).then_with(|| a.value.cmp(&b.value))
    });
    table
}

/// Allotted rank ranges per institution, program and category.
pub fn rank_ranges(records: &[AdmissionRecord]) -> Vec<RankRangeGroup> {
    let mut groups: BTreeMap<(&str, &str, Category), Vec<u32>> = BTreeMap::new();
    for record in records {
        groups
            .entry((
                record.institution_code.as_str(),
                record.program_code.as_str(),
                record.category,
            ))
            .or_default()
            .push(record.rank);
    }

    groups
        .into_iter()
        .map(|((institution, program, category), mut ranks)| {
            let records = ranks.len();
            ranks.sort_unstable();
            ranks.dedup();
            RankRangeGroup {
                institution_code: institution.to_string(),
                program_code: program.to_string(),
                category,
                records,
                ranks: ranges::compress(&ranks),
            }
        })
        .collect()
}
