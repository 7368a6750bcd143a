//! importing files: validation, metadata and previews
use {
    crate::{
        error::Result,
        files::{
            FileBlob,
            preview::{PreviewRegistry, PreviewUrl},
            validate::{IssueCode, ValidationIssue, ValidationResult, ValidationRules, validate_file},
        },
    },
    chrono::{DateTime, Utc},
    image::ImageReader,
    std::io::Cursor,
    tracing::{debug, info, warn},
    uuid::Uuid,
};

/// what we know about an imported file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMetadata {
    /// the file name
    pub name: String,
    /// the size in bytes
    pub size: u64,
    /// the declared mime type
    pub mime: String,
    /// pixel dimensions, for images that could be read
    pub dimensions: Option<(u32, u32)>,
}

/// an imported file
#[derive(Debug)]
pub struct ImportedFile {
    /// a unique id
    pub id: Uuid,
    /// the file itself
    pub file: FileBlob,
    /// extracted metadata
    pub metadata: FileMetadata,
    /// the verdict the file was accepted with (warnings only)
    pub validation: ValidationResult,
    /// when it was imported
    pub imported_at: DateTime<Utc>,
    /// the preview, owned by the item and revoked with it
    preview: Option<PreviewUrl>,
}

impl ImportedFile {
    /// the preview url, for images
    pub fn preview_url(&self) -> Option<&str> {
        self.preview.as_ref().map(PreviewUrl::as_str)
    }
}

/// a file that didn't make it in
#[derive(Debug, Clone)]
pub struct RejectedFile {
    /// the file name
    pub name: String,
    /// why it was rejected
    pub validation: ValidationResult,
}

/// the outcome of an import
#[derive(Debug, Default)]
pub struct ImportReport {
    /// ids of the imported files, in input order
    pub accepted: Vec<Uuid>,
    /// the files that were rejected
    pub rejected: Vec<RejectedFile>,
}

/// owns imported files and their previews
#[derive(Debug)]
pub struct FileImporter {
    /// the rules new files are checked against
    rules: ValidationRules,
    /// where preview urls come from
    previews: PreviewRegistry,
    /// imported files, in import order
    items: Vec<ImportedFile>,
}

/// read the pixel size of an image without decoding all of it
fn image_dimensions(bytes: Vec<u8>) -> image::ImageResult<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(image::ImageError::IoError)?
        .into_dimensions()
}

impl FileImporter {
    /// make an importer
    pub fn new(rules: ValidationRules, previews: PreviewRegistry) -> Self {
        Self {
            rules,
            previews,
            items: Vec::new(),
        }
    }

    /// the imported files
    pub fn items(&self) -> &[ImportedFile] {
        &self.items
    }

    /// get an imported file by id
    pub fn get(&self, id: Uuid) -> Option<&ImportedFile> {
        self.items.iter().find(|i| i.id == id)
    }

    /// the registry previews are created in
    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// validate and import files
    ///
    /// names already imported (or earlier in the same batch) count as duplicates, and the
    /// count and total size limits include what is already there
    pub async fn import(&mut self, files: Vec<FileBlob>) -> Result<ImportReport> {
        let mut report = ImportReport::default();

        for file in files {
            let mut validation = validate_file(&file, &self.rules);
            self.check_against_items(&file, &mut validation);

            if !validation.is_valid {
                debug!(file = %file.name, errors = validation.errors.len(), "rejected file");
                report.rejected.push(RejectedFile {
                    name: file.name.clone(),
                    validation,
                });
                continue;
            }

            let item = self.build_item(file, validation).await?;
            report.accepted.push(item.id);
            self.items.push(item);
        }

        info!(
            accepted = report.accepted.len(),
            rejected = report.rejected.len(),
            "imported files"
        );

        Ok(report)
    }

    /// add the list-level issues that involve already imported files
    fn check_against_items(&self, file: &FileBlob, validation: &mut ValidationResult) {
        let lower = file.name.to_lowercase();
        if self.items.iter().any(|i| i.file.name.to_lowercase() == lower) {
            validation.errors.push(ValidationIssue::new(
                IssueCode::DuplicateFileName,
                format!("{} has already been imported", file.name),
            ));
        }

        if let Some(max) = self.rules.max_files
            && self.items.len() >= max
        {
            validation.errors.push(ValidationIssue::new(
                IssueCode::TooManyFiles,
                format!("at most {} files can be imported", max),
            ));
        }

        let total: u64 = self.items.iter().map(|i| i.file.size).sum();
        if let Some(max) = self.rules.max_total_size
            && total + file.size > max
        {
            validation.errors.push(ValidationIssue::new(
                IssueCode::TotalSizeExceeded,
                format!("importing {} would exceed the total size limit", file.name),
            ));
        }

        validation.is_valid = validation.errors.is_empty();
    }

    /// extract metadata and make a preview
    async fn build_item(&self, file: FileBlob, validation: ValidationResult) -> Result<ImportedFile> {
        let mut dimensions = None;
        let mut preview = None;

        if file.is_image() {
            let bytes = file.read_all().await?;
            let probe = bytes.clone();

            match tokio::task::spawn_blocking(move || image_dimensions(probe)).await? {
                Ok(dims) => dimensions = Some(dims),
                Err(e) => warn!(file = %file.name, error = %e, "couldn't read image dimensions"),
            }

            preview = Some(self.previews.create(bytes));
        }

        Ok(ImportedFile {
            id: Uuid::new_v4(),
            metadata: FileMetadata {
                name: file.name.clone(),
                size: file.size,
                mime: file.mime.clone(),
                dimensions,
            },
            file,
            validation,
            imported_at: Utc::now(),
            preview,
        })
    }

    /// remove a file, revoking its preview
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        before != self.items.len()
    }

    /// remove every file
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
