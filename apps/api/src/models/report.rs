use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::content::{ImageSpec, TableSpec};

/// Request body for report generation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    pub subject_name: String,
    pub title: String,
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Date printed on the cover and used in the file name. Defaults to today.
    #[serde(default)]
    pub date: Option<NaiveDate>,
    pub sections: Vec<SectionRequest>,
}

/// One top-level report chapter, in the order it is composed.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionRequest {
    pub title: String,
    #[serde(default)]
    pub toc_label: Option<String>,
    /// Prompt for the text generation service.
    #[serde(default)]
    pub prompt: Option<String>,
    /// Pre-resolved text. When present no generation call is made.
    #[serde(default)]
    pub text: Option<String>,
    /// Opaque domain data handed to the generator with the prompt.
    #[serde(default)]
    pub context: Value,
    #[serde(default)]
    pub image: Option<ImageSpec>,
    #[serde(default)]
    pub tables: Vec<TableSpec>,
}

/// Result record returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportOutcome {
    Success {
        #[serde(rename = "fileName")]
        file_name: String,
    },
    Failure {
        error: String,
    },
}
