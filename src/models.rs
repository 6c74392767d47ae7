use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output_directory: Option<String>,
    // Reference sheet used by `compare` when no --master is given
    pub master_file: Option<String>,
    pub master_sheet: Option<String>,
    pub layout: LayoutConfig,
}

/// Textual conventions of the allotment list the line parser recognises.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub institution_marker: String,
    pub program_marker: String,
    pub header_delimiter: String,
    pub identifier_prefix: String,
    pub identifier_length: usize,
    pub location_code: String,
    pub admission_prefixes: Vec<String>,
    pub admission_suffixes: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_directory: Some("output".to_string()),
            master_file: None,
            master_sheet: None,
            layout: LayoutConfig::default(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            institution_marker: "COLL ::".to_string(),
            program_marker: "CRS ::".to_string(),
            header_delimiter: " - ".to_string(),
            identifier_prefix: "24".to_string(),
            identifier_length: 11,
            location_code: "OU".to_string(),
            admission_prefixes: vec!["NS-".to_string(), "S-".to_string()],
            admission_suffixes: vec![
                "-P1".to_string(),
                "-P2".to_string(),
                "-P3".to_string(),
                "-P4".to_string(),
            ],
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    pub fn output_dir(&self) -> &str {
        self.output_directory.as_deref().unwrap_or("output")
    }
}

/// Reservation category printed after the location code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "BCA")]
    Bca,
    #[serde(rename = "BCB")]
    Bcb,
    #[serde(rename = "BCC")]
    Bcc,
    #[serde(rename = "BCD")]
    Bcd,
    #[serde(rename = "BCE")]
    Bce,
    #[serde(rename = "SC")]
    Sc,
    #[serde(rename = "ST")]
    St,
    #[serde(rename = "OC")]
    Oc,
}

impl Category {
    /// Match order used when scanning a line: longer codes first.
    pub const PRIORITY: [Category; 8] = [
        Category::Bca,
        Category::Bcb,
        Category::Bcc,
        Category::Bcd,
        Category::Bce,
        Category::Sc,
        Category::St,
        Category::Oc,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Category::Bca => "BCA",
            Category::Bcb => "BCB",
            Category::Bcc => "BCC",
            Category::Bcd => "BCD",
            Category::Bce => "BCE",
            Category::Sc => "SC",
            Category::St => "ST",
            Category::Oc => "OC",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[default]
    #[serde(rename = "")]
    Unspecified,
}

impl Sex {
    pub fn from_code(code: &str) -> Self {
        match code {
            "M" => Sex::Male,
            "F" => Sex::Female,
            _ => Sex::Unspecified,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
            Sex::Unspecified => "",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MinorityStatus {
    #[serde(rename = "MSM")]
    Msm,
    #[default]
    #[serde(rename = "")]
    None,
}

impl MinorityStatus {
    pub const MARKER: &'static str = "MSM";

    pub fn code(self) -> &'static str {
        match self {
            MinorityStatus::Msm => Self::MARKER,
            MinorityStatus::None => "",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisabilityStatus {
    #[serde(rename = "PHO")]
    Pho,
    #[default]
    #[serde(rename = "")]
    None,
}

impl DisabilityStatus {
    pub const MARKER: &'static str = "PHO";

    pub fn code(self) -> &'static str {
        match self {
            DisabilityStatus::Pho => Self::MARKER,
            DisabilityStatus::None => "",
        }
    }
}

/// One allotted candidate recovered from a list line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRecord {
    pub institution_code: String,
    pub institution_name: String,
    pub program_code: String,
    pub program_name: String,
    pub rank: u32,
    pub identifier_number: String,
    pub percentile: Decimal,
    pub candidate_name: String,
    pub location_code: String,
    pub category: Category,
    pub sex: Sex,
    pub minority: MinorityStatus,
    pub disability: DisabilityStatus,
    pub admission_detail: String,
}

/// A row of the applicant's option list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub order: Option<u32>,
    pub college_code: String,
    pub college_name: String,
    pub place: String,
    pub district: String,
    pub course_code: String,
    pub fee_type: String,
}

impl OptionEntry {
    pub fn main_code(&self) -> String {
        main_code(&self.college_code, &self.course_code)
    }
}

/// A row of the reference master sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterEntry {
    pub college_code: String,
    pub course_code: String,
    pub course_name: Option<String>,
    pub course_type: Option<String>,
    pub seat_type: Option<String>,
    pub extra: BTreeMap<String, String>,
}

impl MasterEntry {
    pub fn main_code(&self) -> String {
        main_code(&self.college_code, &self.course_code)
    }
}

/// Join key of an option: college code and course code.
pub fn main_code(college_code: &str, course_code: &str) -> String {
    format!("{}_{}", college_code.trim(), course_code.trim())
}
