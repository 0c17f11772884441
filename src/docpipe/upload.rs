use std::fmt;
use std::path::{Path, PathBuf};
use reqwest::multipart::{Form, Part};
use tracing::{debug, info};
use crate::errors::ImpactError;

pub const MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// Which upload slot a source document fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Epic,
    Estimation,
    Tdd,
    Stories,
}

impl DocumentKind {
    /// Multipart field name the backend expects.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Epic => "epic_doc",
            Self::Estimation => "estimation_doc",
            Self::Tdd => "tdd_doc",
            Self::Stories => "stories_doc",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Epic => "Epic / requirements",
            Self::Estimation => "Estimation sheet",
            Self::Tdd => "Technical design",
            Self::Stories => "User stories",
        }
    }

    fn accepts(&self, extension: &str) -> bool {
        match self {
            Self::Estimation => matches!(extension, "xlsx" | "xls"),
            _ => extension == "docx",
        }
    }

    fn accepted_extensions(&self) -> &'static str {
        match self {
            Self::Estimation => ".xlsx,.xls",
            _ => ".docx",
        }
    }

    /// Spreadsheets are estimations; Word documents are classified by name
    /// and default to epic.
    pub fn detect(file_name: &str) -> Option<Self> {
        let name = file_name.to_lowercase();
        match extension_of(&name).as_str() {
            "xlsx" | "xls" => Some(Self::Estimation),
            "docx" => {
                if name.contains("epic") || name.contains("requirement") {
                    Some(Self::Epic)
                } else if name.contains("tdd") || name.contains("design") {
                    Some(Self::Tdd)
                } else if name.contains("story") || name.contains("stories") {
                    Some(Self::Stories)
                } else {
                    Some(Self::Epic)
                }
            }
            _ => None,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default()
}

fn mime_for(extension: &str) -> &'static str {
    match extension {
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        _ => "application/octet-stream",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub path: PathBuf,
    pub file_name: String,
    pub kind: DocumentKind,
    pub size: u64,
}

/// Set of source documents for one new job, at most one per kind.
#[derive(Debug, Clone, Default)]
pub struct UploadBatch {
    files: Vec<UploadFile>,
}

impl UploadBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stat and classify every path.
    pub async fn from_paths(paths: &[PathBuf]) -> Result<Self, ImpactError> {
        let mut batch = Self::new();
        for path in paths {
            let size = tokio::fs::metadata(path).await?.len();
            batch.add(path.clone(), size)?;
        }
        Ok(batch)
    }

    /// Add a file, detecting its kind from the name. Replaces any earlier
    /// file of the same kind.
    pub fn add(&mut self, path: PathBuf, size: u64) -> Result<&UploadFile, ImpactError> {
        let file_name = file_name_of(&path)?;
        let kind = DocumentKind::detect(&file_name).ok_or_else(|| {
            ImpactError::Validation(format!("{}: Unsupported file type. Use DOCX or XLSX files.", file_name))
        })?;
        self.insert(path, file_name, kind, size)
    }

    /// Add a file into an explicit slot.
    pub fn add_as(&mut self, path: PathBuf, size: u64, kind: DocumentKind) -> Result<&UploadFile, ImpactError> {
        let file_name = file_name_of(&path)?;
        if !kind.accepts(&extension_of(&file_name)) {
            return Err(ImpactError::Validation(format!(
                "{}: Expected {} file",
                file_name,
                kind.accepted_extensions()
            )));
        }
        self.insert(path, file_name, kind, size)
    }

    fn insert(&mut self, path: PathBuf, file_name: String, kind: DocumentKind, size: u64) -> Result<&UploadFile, ImpactError> {
        if size > MAX_UPLOAD_BYTES {
            return Err(ImpactError::Validation(format!(
                "{}: File size exceeds 10MB limit",
                file_name
            )));
        }
        if let Some(previous) = self.files.iter().position(|f| f.kind == kind) {
            debug!(kind = ?kind, replaced = %self.files[previous].file_name, "Replacing upload slot");
            self.files.remove(previous);
        }
        self.files.push(UploadFile { path, file_name, kind, size });
        let last = self.files.len() - 1;
        Ok(&self.files[last])
    }

    pub fn files(&self) -> &[UploadFile] {
        &self.files
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size).sum()
    }

    /// An estimation spreadsheet is mandatory.
    pub fn validate(&self) -> Result<(), ImpactError> {
        if self.files.is_empty() {
            return Err(ImpactError::Validation("No files selected for upload".to_string()));
        }
        if !self.files.iter().any(|f| f.kind == DocumentKind::Estimation) {
            return Err(ImpactError::Validation(
                "An estimation spreadsheet (.xlsx or .xls) is required".to_string(),
            ));
        }
        Ok(())
    }

    /// Validate and read every file into a multipart form.
    pub async fn into_form(self) -> Result<Form, ImpactError> {
        self.validate()?;
        let mut form = Form::new();
        for file in self.files {
            let data = tokio::fs::read(&file.path).await?;
            info!(file = %file.file_name, field = file.kind.field_name(), bytes = data.len(), "Attaching upload");
            let part = Part::bytes(data)
                .file_name(file.file_name.clone())
                .mime_str(mime_for(&extension_of(&file.file_name)))?;
            form = form.part(file.kind.field_name(), part);
        }
        Ok(form)
    }
}

fn file_name_of(path: &Path) -> Result<String, ImpactError> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| ImpactError::Validation(format!("Not a file path: {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_kind() {
        assert_eq!(DocumentKind::detect("Q3 Estimates.XLSX"), Some(DocumentKind::Estimation));
        assert_eq!(DocumentKind::detect("legacy.xls"), Some(DocumentKind::Estimation));
        assert_eq!(DocumentKind::detect("Epic - SSO.docx"), Some(DocumentKind::Epic));
        assert_eq!(DocumentKind::detect("requirements.docx"), Some(DocumentKind::Epic));
        assert_eq!(DocumentKind::detect("payments_tdd.docx"), Some(DocumentKind::Tdd));
        assert_eq!(DocumentKind::detect("System Design.docx"), Some(DocumentKind::Tdd));
        assert_eq!(DocumentKind::detect("user_stories.docx"), Some(DocumentKind::Stories));
        assert_eq!(DocumentKind::detect("notes.docx"), Some(DocumentKind::Epic));
        assert_eq!(DocumentKind::detect("notes.pdf"), None);
        assert_eq!(DocumentKind::detect("README"), None);
    }

    #[test]
    fn test_add_rejects_oversized_file() {
        let mut batch = UploadBatch::new();
        let err = batch.add(PathBuf::from("big.xlsx"), MAX_UPLOAD_BYTES + 1).unwrap_err();
        assert!(err.to_string().contains("10MB"));
        assert!(batch.is_empty());
        assert!(batch.add(PathBuf::from("ok.xlsx"), MAX_UPLOAD_BYTES).is_ok());
    }

    #[test]
    fn test_same_kind_replaces() {
        let mut batch = UploadBatch::new();
        batch.add(PathBuf::from("a.xlsx"), 10).unwrap();
        batch.add(PathBuf::from("epic.docx"), 10).unwrap();
        batch.add(PathBuf::from("b.xls"), 20).unwrap();
        assert_eq!(batch.files().len(), 2);
        assert!(batch.files().iter().any(|f| f.file_name == "b.xls"));
        assert_eq!(batch.total_bytes(), 30);
    }

    #[test]
    fn test_add_as_checks_extension() {
        let mut batch = UploadBatch::new();
        let err = batch.add_as(PathBuf::from("sheet.xlsx"), 1, DocumentKind::Tdd).unwrap_err();
        assert!(err.to_string().contains("Expected .docx file"));
        let file = batch.add_as(PathBuf::from("notes.docx"), 1, DocumentKind::Stories).unwrap();
        assert_eq!(file.kind.field_name(), "stories_doc");
    }

    #[test]
    fn test_validate_requires_estimation() {
        let mut batch = UploadBatch::new();
        assert!(batch.validate().is_err());
        batch.add(PathBuf::from("epic.docx"), 1).unwrap();
        assert!(batch.validate().unwrap_err().to_string().contains("estimation"));
        batch.add(PathBuf::from("est.xlsx"), 1).unwrap();
        assert!(batch.validate().is_ok());
    }

    #[tokio::test]
    async fn test_from_paths_reads_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let sheet = dir.path().join("estimate.xlsx");
        tokio::fs::write(&sheet, vec![0u8; 128]).await.unwrap();

        let batch = UploadBatch::from_paths(&[sheet]).await.unwrap();
        assert_eq!(batch.files()[0].size, 128);
        assert_eq!(batch.files()[0].kind, DocumentKind::Estimation);
        assert!(batch.into_form().await.is_ok());
    }
}
