use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceListEntry {
    pub filename: String,
    pub path: String,
    pub format: String,
    pub issue: Option<String>,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceListInventoryManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub source_directory: String,
    pub document_count: usize,
    pub documents: Vec<PriceListEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolVersions {
    pub pdftotext: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractPaths {
    pub cache_root: String,
    pub manifest_dir: String,
    pub inventory_manifest_path: String,
    pub db_path: String,
    pub records_dir: String,
    pub calibration_path: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractCounts {
    pub document_count: usize,
    pub processed_document_count: usize,
    pub empty_document_count: usize,
    pub page_count: usize,
    pub line_count: usize,
    pub records_extracted: usize,
    pub records_total: i64,
    pub discounts_attached: usize,
    pub inferred_name_count: usize,
    pub missing_name_count: usize,
    pub unmatched_item_line_count: usize,
    pub orphan_discount_count: usize,
    #[serde(default)]
    pub caption_line_count: usize,
}

/// An item-number-shaped line that failed full grammar validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmatchedItemLine {
    pub page: usize,
    pub text: String,
    pub reason: String,
}

/// A discount line that had no open record to attach to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrphanDiscount {
    pub page: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub doc_id: String,
    pub filename: String,
    pub status: String,
    pub page_count: usize,
    pub line_count: usize,
    pub record_count: usize,
    pub inferred_name_count: usize,
    pub records_json_path: Option<String>,
    pub records_csv_path: Option<String>,
    /// Normalised running captions skipped as page furniture.
    #[serde(default)]
    pub repeated_captions: Vec<String>,
    #[serde(default)]
    pub caption_line_count: usize,
    pub unmatched_item_lines: Vec<UnmatchedItemLine>,
    pub orphan_discounts: Vec<OrphanDiscount>,
    pub line_preview: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub db_schema_version: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub tool_versions: ToolVersions,
    pub paths: ExtractPaths,
    pub calibration: serde_json::Value,
    pub counts: ExtractCounts,
    pub documents: Vec<DocumentSummary>,
    pub warnings: Vec<String>,
    pub notes: Vec<String>,
}
