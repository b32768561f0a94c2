use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl Severity {
    /// Critical and warning findings count as errors; info lines do not.
    pub fn is_error(self) -> bool {
        !matches!(self, Severity::Info)
    }

    fn prefix(self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL: ",
            Severity::Warning => "WARNING: ",
            Severity::Info => "",
        }
    }
}

/// The first boot sector invariant that failed, with the value actually found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BootSectorDefect {
    OemId { actual: String },
    EndMarker { actual: u16 },
    BytesPerSector { actual: u16 },
    SectorsPerCluster,
}

impl fmt::Display for BootSectorDefect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootSectorDefect::OemId { actual } => {
                write!(f, "OEM ID is '{}' (expected 'NTFS')", actual)
            }
            BootSectorDefect::EndMarker { actual } => {
                write!(f, "end marker is 0x{:04X} (expected 0xAA55)", actual)
            }
            BootSectorDefect::BytesPerSector { actual } => {
                write!(f, "bytes per sector is {} (expected at least 512)", actual)
            }
            BootSectorDefect::SectorsPerCluster => f.write_str("sectors per cluster is 0"),
        }
    }
}

/// Structured kind of a problem found during analysis. Repair actions are
/// chosen by matching on this, never on finding text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    UnreadableBootSector,
    InvalidBootSector(BootSectorDefect),
    UnreadableMft,
    InvalidMftSignature { signature: u32 },
    UnreadableMftMirror,
    InvalidMftMirror { signature: u32 },
    /// Mirror header is intact; its body is not compared with the MFT.
    /// Carried by the informational "MFT Mirror: OK" finding.
    MftMirrorUnverified,
    CorruptSystemFile { index: u8 },
    SystemFileNotInUse { index: u8 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub issue: Option<IssueKind>,
    pub message: String,
}

impl Finding {
    pub fn critical(issue: IssueKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Critical,
            issue: Some(issue),
            message: message.into(),
        }
    }

    pub fn warning(issue: IssueKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            issue: Some(issue),
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            issue: None,
            message: message.into(),
        }
    }

    /// Informational finding that still carries an issue kind for routing.
    pub fn note(issue: IssueKind, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            issue: Some(issue),
            message: message.into(),
        }
    }

    /// Detail line as shown to users, e.g. `WARNING: MFT Mirror signature invalid`.
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.severity.prefix(), self.message)
    }
}

/// Outcome of one `analyze` or `repair` call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairResult {
    pub success: bool,
    pub message: String,
    pub errors_found: usize,
    pub errors_fixed: usize,
    pub findings: Vec<Finding>,
}

impl RepairResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn push(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    /// Number of critical and warning findings recorded so far.
    pub fn error_findings(&self) -> usize {
        self.findings.iter().filter(|f| f.severity.is_error()).count()
    }

    pub fn issues(&self) -> impl Iterator<Item = &IssueKind> {
        self.findings.iter().filter_map(|f| f.issue.as_ref())
    }

    pub fn details(&self) -> Vec<String> {
        self.findings.iter().map(Finding::detail).collect()
    }

    pub fn has_critical(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Critical)
    }

    pub fn to_json(&self) -> Result<String, crate::MendError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_prefixes() {
        let crit = Finding::critical(IssueKind::UnreadableMft, "Cannot read MFT");
        assert_eq!(crit.detail(), "CRITICAL: Cannot read MFT");

        let warn = Finding::warning(IssueKind::UnreadableMftMirror, "Cannot read MFT Mirror");
        assert_eq!(warn.to_string(), "WARNING: Cannot read MFT Mirror");

        assert_eq!(Finding::info("MFT: OK").detail(), "MFT: OK");
    }

    #[test]
    fn test_error_findings_skip_info() {
        let mut result = RepairResult::new();
        result.push(Finding::info("Boot sector: OK"));
        result.push(Finding::warning(
            IssueKind::SystemFileNotInUse { index: 3 },
            "System file $Volume (record 3) not marked as in use",
        ));
        result.push(Finding::critical(
            IssueKind::InvalidMftSignature { signature: 0 },
            "MFT record signature invalid",
        ));

        assert_eq!(result.error_findings(), 2);
        assert!(result.has_critical());
        assert_eq!(result.issues().count(), 2);
        assert_eq!(result.details()[0], "Boot sector: OK");
    }

    #[test]
    fn test_note_is_tagged_but_not_an_error() {
        let mut result = RepairResult::new();
        result.push(Finding::note(IssueKind::MftMirrorUnverified, "MFT Mirror: OK"));

        assert_eq!(result.error_findings(), 0);
        assert_eq!(result.details(), vec!["MFT Mirror: OK"]);
        assert_eq!(
            result.issues().collect::<Vec<_>>(),
            vec![&IssueKind::MftMirrorUnverified]
        );
    }

    #[test]
    fn test_defect_wording() {
        let defect = BootSectorDefect::EndMarker { actual: 0 };
        assert_eq!(defect.to_string(), "end marker is 0x0000 (expected 0xAA55)");

        let defect = BootSectorDefect::OemId { actual: "MSDOS5.0".into() };
        assert_eq!(defect.to_string(), "OEM ID is 'MSDOS5.0' (expected 'NTFS')");
    }

    #[test]
    fn test_result_serializes_to_json() {
        let mut result = RepairResult::with_message("Volume appears healthy");
        result.success = true;
        result.push(Finding::info("MFT Mirror: OK"));

        let json = result.to_json().unwrap();
        let back: RepairResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, result);
    }
}
