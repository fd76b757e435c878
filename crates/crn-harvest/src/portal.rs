//! Page layout of the civil remedy notice search portal.

use serde::{Deserialize, Serialize};

/// Default search page of the Florida DFS civil remedy portal.
pub const DEFAULT_PORTAL_URL: &str = "https://apps.fldfs.com/CivilRemedy/SearchFiling.aspx";

/// File name the portal gives every export.
pub const RAW_EXPORT_FILE: &str = "FilingSearch.csv";

/// Selectors and texts the exporter relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalLayout {
    pub start_date_field: String,
    pub end_date_field: String,
    pub search_button: String,
    pub export_link: String,
    pub edit_search_button: String,
    /// Notice shown instead of a download when the result set is too big.
    pub too_large_text: String,
    pub raw_export_file: String,
}

impl Default for PortalLayout {
    fn default() -> Self {
        Self {
            start_date_field: "#ctl00_phPageContent_txtSubmissionStartDate".to_string(),
            end_date_field: "#ctl00_phPageContent_txtSubmissionEndDate".to_string(),
            search_button: "#ctl00_phPageContent_btnSearch".to_string(),
            export_link: "#ctl00_phPageContent_lnkExportResultsTop".to_string(),
            edit_search_button: "#ctl00_phPageContent_btnEditSearchTop".to_string(),
            too_large_text: "too large to export".to_string(),
            raw_export_file: RAW_EXPORT_FILE.to_string(),
        }
    }
}

impl PortalLayout {
    /// Prefix shared by the raw export and any browser-renamed duplicates
    /// (`FilingSearch (1).csv`).
    pub fn raw_export_prefix(&self) -> &str {
        self.raw_export_file
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(&self.raw_export_file)
    }
}
