//! Core types shared across the Clausewise client.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::AnalysisError;

/// The fixed category selector that drives which backend query runs and
/// which storage slot a result lands in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnalysisKind {
    #[default]
    #[serde(rename = "Contract Review")]
    ContractReview,
    #[serde(rename = "Risk Assessment")]
    RiskAssessment,
    #[serde(rename = "Legal Research")]
    LegalResearch,
    #[serde(rename = "Compliance Check")]
    ComplianceCheck,
    #[serde(rename = "Custom Query")]
    CustomQuery,
}

impl AnalysisKind {
    /// Every kind, in menu order.
    pub const ALL: [AnalysisKind; 5] = [
        AnalysisKind::ContractReview,
        AnalysisKind::RiskAssessment,
        AnalysisKind::LegalResearch,
        AnalysisKind::ComplianceCheck,
        AnalysisKind::CustomQuery,
    ];

    /// The label sent as the `analysis_type` form field.
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisKind::ContractReview => "Contract Review",
            AnalysisKind::RiskAssessment => "Risk Assessment",
            AnalysisKind::LegalResearch => "Legal Research",
            AnalysisKind::ComplianceCheck => "Compliance Check",
            AnalysisKind::CustomQuery => "Custom Query",
        }
    }

    /// Lowercase, dash-separated form used in storage keys and on the CLI.
    pub fn slug(&self) -> &'static str {
        match self {
            AnalysisKind::ContractReview => "contract-review",
            AnalysisKind::RiskAssessment => "risk-assessment",
            AnalysisKind::LegalResearch => "legal-research",
            AnalysisKind::ComplianceCheck => "compliance-check",
            AnalysisKind::CustomQuery => "custom-query",
        }
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, AnalysisKind::CustomQuery)
    }
}

impl std::fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AnalysisKind {
    type Err = String;

    /// Accepts either the label ("Risk Assessment") or the slug
    /// ("risk-assessment"), case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        AnalysisKind::ALL
            .into_iter()
            .find(|k| k.label().eq_ignore_ascii_case(wanted) || k.slug().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = AnalysisKind::ALL.iter().map(|k| k.slug()).collect();
                format!("unknown analysis kind '{s}' (expected one of: {})", known.join(", "))
            })
    }
}

/// The API credential for the analysis backend.
///
/// Never empty: construction returns `None` for blank input. `Debug` does not
/// print the key.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    openai_api_key: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Option<Self> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            None
        } else {
            Some(Self {
                openai_api_key: api_key,
            })
        }
    }

    pub fn api_key(&self) -> &str {
        &self.openai_api_key
    }

    /// Whether a deserialized value still satisfies the non-empty invariant.
    pub(crate) fn is_valid(&self) -> bool {
        !self.openai_api_key.trim().is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("openai_api_key", &"<redacted>")
            .finish()
    }
}

/// What to analyze: a kind plus, for `Custom Query`, the question text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisRequest {
    kind: AnalysisKind,
    custom_query: Option<String>,
}

impl AnalysisRequest {
    /// Build a request from the current selection.
    ///
    /// The query text is kept (trimmed) only for `Custom Query`; other kinds
    /// ignore it.
    pub fn new(kind: AnalysisKind, custom_query: Option<&str>) -> Self {
        let custom_query = if kind.is_custom() {
            custom_query.map(|q| q.trim().to_string())
        } else {
            None
        };
        Self { kind, custom_query }
    }

    pub fn kind(&self) -> AnalysisKind {
        self.kind
    }

    pub fn custom_query(&self) -> Option<&str> {
        self.custom_query.as_deref()
    }

    /// A `Custom Query` request must carry non-blank text.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.kind.is_custom() && self.custom_query().is_none_or(|q| q.is_empty()) {
            return Err(AnalysisError::configuration(
                "Custom Query requires a non-empty query",
            ));
        }
        Ok(())
    }
}

/// The normalized result the display layer consumes.
///
/// Persistence treats this as an opaque JSON blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Free-text analysis, markdown.
    pub analysis: String,
    /// Markdown.
    pub key_points: String,
    /// Markdown.
    pub recommendations: String,
    pub risk_score: f64,
}

impl AnalysisResult {
    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.risk_score)
    }

    /// The markdown body shown under the given tab.
    pub fn section(&self, tab: DisplayTab) -> &str {
        match tab {
            DisplayTab::Analysis => &self.analysis,
            DisplayTab::KeyPoints => &self.key_points,
            DisplayTab::Recommendations => &self.recommendations,
        }
    }
}

/// Display band for a risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// `<= 3.3` is low, `<= 6.6` is medium, anything above is high.
    pub fn from_score(score: f64) -> Self {
        if score <= 3.3 {
            RiskLevel::Low
        } else if score <= 6.6 {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

/// The detail tabs of the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayTab {
    #[default]
    Analysis,
    KeyPoints,
    Recommendations,
}

impl DisplayTab {
    pub const ALL: [DisplayTab; 3] = [
        DisplayTab::Analysis,
        DisplayTab::KeyPoints,
        DisplayTab::Recommendations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayTab::Analysis => "analysis",
            DisplayTab::KeyPoints => "key-points",
            DisplayTab::Recommendations => "recommendations",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            DisplayTab::Analysis => "Analysis",
            DisplayTab::KeyPoints => "Key Points",
            DisplayTab::Recommendations => "Recommendations",
        }
    }
}

impl std::fmt::Display for DisplayTab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayTab {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "analysis" => Ok(DisplayTab::Analysis),
            "key-points" | "keypoints" | "key_points" => Ok(DisplayTab::KeyPoints),
            "recommendations" => Ok(DisplayTab::Recommendations),
            other => Err(format!("unknown tab '{other}'")),
        }
    }
}

/// An uploaded contract document. The body is opaque to this crate.
#[derive(Clone, PartialEq, Eq)]
pub struct ContractFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ContractFile {
    /// File extensions the backend accepts, lowercase.
    pub const ACCEPTED_EXTENSIONS: [&'static str; 4] = ["pdf", "doc", "docx", "txt"];

    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_for_file_name(&file_name).to_string();
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }

    /// Read a contract from disk.
    pub fn read(path: &Path) -> std::io::Result<Self> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "contract".to_string());
        Ok(Self::new(file_name, bytes))
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Reject documents whose extension the backend does not accept.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        let ext = extension_of(&self.file_name);
        if Self::ACCEPTED_EXTENSIONS.contains(&ext.as_str()) {
            return Ok(());
        }
        Err(AnalysisError::configuration(format!(
            "Unsupported file type for {}: expected one of {}",
            self.file_name,
            Self::ACCEPTED_EXTENSIONS.join(", ")
        )))
    }
}

impl std::fmt::Debug for ContractFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractFile")
            .field("file_name", &self.file_name)
            .field("mime_type", &self.mime_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

fn mime_for_file_name(file_name: &str) -> &'static str {
    match extension_of(file_name).as_str() {
        "pdf" => "application/pdf",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}
