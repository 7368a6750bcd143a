//! file validation rules
//!
//! everything in here is pure: a file and a rule set go in, a verdict comes out. nothing
//! touches the network or the file system.
use {
    crate::files::{FileBlob, mime_for_extension},
    hashbrown::HashMap,
    serde::Serialize,
    std::{fmt, sync::Arc},
};

/// names windows refuses to create, whatever the extension
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// characters that can't appear in a portable file name
const DANGEROUS_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// the longest file name most file systems accept
const MAX_NAME_LEN: usize = 255;

/// what a validation issue is about
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueCode {
    /// over the size limit
    FileTooLarge,
    /// under the size minimum
    FileTooSmall,
    /// extension or mime type not allowed
    UnsupportedFileType,
    /// the name has unusable characters or is too long
    InvalidFileName,
    /// the name is reserved by the OS
    ReservedFileName,
    /// the custom validator said no
    CustomValidationFailed,
    /// big, but allowed
    LargeFile,
    /// the declared mime type doesn't match the extension
    MimeTypeMismatch,
    /// zero bytes
    EmptyFile,
    /// two files in a list share a name
    DuplicateFileName,
    /// the list is bigger than the total limit
    TotalSizeExceeded,
    /// the list has more files than allowed
    TooManyFiles,
}

impl IssueCode {
    /// the wire name of the code
    pub fn as_str(self) -> &'static str {
        match self {
            IssueCode::FileTooLarge => "FILE_TOO_LARGE",
            IssueCode::FileTooSmall => "FILE_TOO_SMALL",
            IssueCode::UnsupportedFileType => "UNSUPPORTED_FILE_TYPE",
            IssueCode::InvalidFileName => "INVALID_FILE_NAME",
            IssueCode::ReservedFileName => "RESERVED_FILE_NAME",
            IssueCode::CustomValidationFailed => "CUSTOM_VALIDATION_FAILED",
            IssueCode::LargeFile => "LARGE_FILE",
            IssueCode::MimeTypeMismatch => "MIME_TYPE_MISMATCH",
            IssueCode::EmptyFile => "EMPTY_FILE",
            IssueCode::DuplicateFileName => "DUPLICATE_FILE_NAME",
            IssueCode::TotalSizeExceeded => "TOTAL_SIZE_EXCEEDED",
            IssueCode::TooManyFiles => "TOO_MANY_FILES",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// one problem found with a file
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ValidationIssue {
    /// what kind of problem
    pub code: IssueCode,
    /// a human readable description
    pub message: String,
}

impl ValidationIssue {
    /// make an issue
    pub fn new(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// the verdict for one file
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// no errors were found (warnings don't count)
    pub is_valid: bool,
    /// blocking problems
    pub errors: Vec<ValidationIssue>,
    /// non-blocking problems
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// build a result, deriving `is_valid`
    fn from_issues(errors: Vec<ValidationIssue>, warnings: Vec<ValidationIssue>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// whether an error or warning with a code is present
    pub fn has(&self, code: IssueCode) -> bool {
        self.errors.iter().chain(&self.warnings).any(|i| i.code == code)
    }
}

/// the verdict for a list of files
#[derive(Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListValidation {
    /// one result per file, in input order
    pub files: Vec<ValidationResult>,
    /// problems with the list as a whole
    pub errors: Vec<ValidationIssue>,
}

impl ListValidation {
    /// whether every file and the list itself are valid
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.files.iter().all(|f| f.is_valid)
    }
}

/// a caller-provided check, `Err` carries the message
pub type CustomValidator = Arc<dyn Fn(&FileBlob) -> Result<(), String> + Send + Sync>;

/// what a file has to satisfy
#[derive(Clone, Default)]
pub struct ValidationRules {
    /// largest accepted size in bytes (inclusive)
    pub max_size: Option<u64>,
    /// smallest accepted size in bytes (inclusive)
    pub min_size: Option<u64>,
    /// sizes above this get a warning
    pub large_file_warning: Option<u64>,
    /// accepted extensions, without dots; empty accepts everything
    pub allowed_extensions: Vec<String>,
    /// accepted mime types, `image/*` style wildcards allowed; empty accepts everything
    pub allowed_mime_types: Vec<String>,
    /// most files a list may hold
    pub max_files: Option<usize>,
    /// largest accepted total size of a list in bytes
    pub max_total_size: Option<u64>,
    /// check names for unusable characters and reserved names
    pub check_file_names: bool,
    /// an extra check run after the built-in ones
    pub custom: Option<CustomValidator>,
}

impl fmt::Debug for ValidationRules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRules")
            .field("max_size", &self.max_size)
            .field("min_size", &self.min_size)
            .field("large_file_warning", &self.large_file_warning)
            .field("allowed_extensions", &self.allowed_extensions)
            .field("allowed_mime_types", &self.allowed_mime_types)
            .field("max_files", &self.max_files)
            .field("max_total_size", &self.max_total_size)
            .field("check_file_names", &self.check_file_names)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

impl ValidationRules {
    /// attach a custom check
    pub fn with_custom<F>(mut self, check: F) -> Self
    where
        F: Fn(&FileBlob) -> Result<(), String> + Send + Sync + 'static,
    {
        self.custom = Some(Arc::new(check));
        self
    }
}

/// format a byte count for messages
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

/// does a mime type match a pattern (`image/png`, `image/*`, `*/*`)
fn mime_matches(pattern: &str, mime: &str) -> bool {
    let pattern = pattern.trim().to_lowercase();
    let mime = mime.trim().to_lowercase();

    match pattern.strip_suffix("/*") {
        Some("*") => true,
        Some(kind) => mime.split('/').next() == Some(kind),
        None => pattern == mime,
    }
}

/// name problems, if any
fn check_name(name: &str) -> Option<ValidationIssue> {
    if name.trim().is_empty() {
        return Some(ValidationIssue::new(
            IssueCode::InvalidFileName,
            "file name is empty",
        ));
    }

    if name.chars().count() > MAX_NAME_LEN {
        return Some(ValidationIssue::new(
            IssueCode::InvalidFileName,
            format!("file name is longer than {} characters", MAX_NAME_LEN),
        ));
    }

    if let Some(bad) = name
        .chars()
        .find(|c| DANGEROUS_CHARS.contains(c) || c.is_control())
    {
        return Some(ValidationIssue::new(
            IssueCode::InvalidFileName,
            format!("file name contains the invalid character {:?}", bad),
        ));
    }

    let stem = name.split('.').next().unwrap_or(name).trim().to_uppercase();
    if RESERVED_NAMES.contains(&stem.as_str()) {
        return Some(ValidationIssue::new(
            IssueCode::ReservedFileName,
            format!("'{}' is a reserved file name", name),
        ));
    }

    None
}

/// validate a single file
pub fn validate_file(file: &FileBlob, rules: &ValidationRules) -> ValidationResult {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if let Some(max) = rules.max_size
        && file.size > max
    {
        errors.push(ValidationIssue::new(
            IssueCode::FileTooLarge,
            format!(
                "{} is {}, the limit is {}",
                file.name,
                format_size(file.size),
                format_size(max)
            ),
        ));
    }

    if let Some(min) = rules.min_size
        && file.size < min
    {
        errors.push(ValidationIssue::new(
            IssueCode::FileTooSmall,
            format!(
                "{} is {}, the minimum is {}",
                file.name,
                format_size(file.size),
                format_size(min)
            ),
        ));
    }

    let ext = file.extension();

    if !rules.allowed_extensions.is_empty() {
        let allowed = ext.as_deref().is_some_and(|ext| {
            rules
                .allowed_extensions
                .iter()
                .any(|a| a.trim_start_matches('.').eq_ignore_ascii_case(ext))
        });

        if !allowed {
            errors.push(ValidationIssue::new(
                IssueCode::UnsupportedFileType,
                format!(
                    "{} has an unsupported extension (allowed: {})",
                    file.name,
                    rules.allowed_extensions.join(", ")
                ),
            ));
        }
    }

    if !rules.allowed_mime_types.is_empty()
        && !rules.allowed_mime_types.iter().any(|p| mime_matches(p, &file.mime))
        && !errors.iter().any(|e| e.code == IssueCode::UnsupportedFileType)
    {
        errors.push(ValidationIssue::new(
            IssueCode::UnsupportedFileType,
            format!("{} has the unsupported type {}", file.name, file.mime),
        ));
    }

    if rules.check_file_names
        && let Some(issue) = check_name(&file.name)
    {
        errors.push(issue);
    }

    if let Some(check) = &rules.custom
        && let Err(message) = check(file)
    {
        errors.push(ValidationIssue::new(
            IssueCode::CustomValidationFailed,
            message,
        ));
    }

    if file.size == 0 {
        warnings.push(ValidationIssue::new(
            IssueCode::EmptyFile,
            format!("{} is empty", file.name),
        ));
    }

    if let Some(threshold) = rules.large_file_warning
        && file.size > threshold
        && rules.max_size.is_none_or(|max| file.size <= max)
    {
        warnings.push(ValidationIssue::new(
            IssueCode::LargeFile,
            format!("{} is large ({})", file.name, format_size(file.size)),
        ));
    }

    if let Some(expected) = ext.as_deref().and_then(mime_for_extension)
        && !file.mime.is_empty()
        && !mime_matches(expected, &file.mime)
    {
        warnings.push(ValidationIssue::new(
            IssueCode::MimeTypeMismatch,
            format!(
                "{} is declared as {} but its extension suggests {}",
                file.name, file.mime, expected
            ),
        ));
    }

    ValidationResult::from_issues(errors, warnings)
}

/// validate a list of files
///
/// each file is judged on its own; duplicates, the total size and the file count are
/// reported at the list level
pub fn validate_files(files: &[FileBlob], rules: &ValidationRules) -> ListValidation {
    let results = files.iter().map(|f| validate_file(f, rules)).collect();
    let mut errors = Vec::new();

    if let Some(max) = rules.max_files
        && files.len() > max
    {
        errors.push(ValidationIssue::new(
            IssueCode::TooManyFiles,
            format!("{} files selected, at most {} are allowed", files.len(), max),
        ));
    }

    let total: u64 = files.iter().map(|f| f.size).sum();
    if let Some(max) = rules.max_total_size
        && total > max
    {
        errors.push(ValidationIssue::new(
            IssueCode::TotalSizeExceeded,
            format!(
                "the files add up to {}, the limit is {}",
                format_size(total),
                format_size(max)
            ),
        ));
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    for file in files {
        *seen.entry(file.name.to_lowercase()).or_default() += 1;
    }

    let mut reported = Vec::new();
    for file in files {
        let key = file.name.to_lowercase();
        if seen.get(&key).is_some_and(|n| *n > 1) && !reported.contains(&key) {
            errors.push(ValidationIssue::new(
                IssueCode::DuplicateFileName,
                format!("{} was selected more than once", file.name),
            ));
            reported.push(key);
        }
    }

    ListValidation {
        files: results,
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(name: &str, size: usize) -> FileBlob {
        FileBlob::from_bytes(name, None, vec![0u8; size])
    }

    fn limits(max: u64) -> ValidationRules {
        ValidationRules {
            max_size: Some(max),
            check_file_names: true,
            ..ValidationRules::default()
        }
    }

    #[test]
    fn test_size_boundary() {
        let rules = limits(1024);

        let exact = validate_file(&blob("exact.bin", 1024), &rules);
        assert!(exact.is_valid);

        let over = validate_file(&blob("over.bin", 1025), &rules);
        assert!(!over.is_valid);
        assert_eq!(over.errors[0].code, IssueCode::FileTooLarge);
    }

    #[test]
    fn test_extension_wins_over_mime() {
        let rules = ValidationRules {
            allowed_extensions: vec!["png".into(), ".jpg".into()],
            ..ValidationRules::default()
        };

        let sneaky = FileBlob::from_bytes("payload.exe", Some("image/png"), vec![1u8; 4]);
        let result = validate_file(&sneaky, &rules);
        assert!(result.has(IssueCode::UnsupportedFileType));

        assert!(validate_file(&blob("photo.JPG", 4), &rules).is_valid);
        assert!(!validate_file(&blob("no_extension", 4), &rules).is_valid);
    }

    #[test]
    fn test_mime_wildcards() {
        let rules = ValidationRules {
            allowed_mime_types: vec!["image/*".into()],
            ..ValidationRules::default()
        };

        assert!(validate_file(&blob("a.png", 4), &rules).is_valid);
        assert!(validate_file(&blob("a.pdf", 4), &rules).has(IssueCode::UnsupportedFileType));
        assert!(mime_matches("*/*", "text/plain"));
    }

    #[test]
    fn test_names() {
        let rules = limits(u64::MAX);

        assert!(validate_file(&blob("bad<name>.txt", 1), &rules).has(IssueCode::InvalidFileName));
        assert!(validate_file(&blob("con.txt", 1), &rules).has(IssueCode::ReservedFileName));
        assert!(validate_file(&blob("LPT1", 1), &rules).has(IssueCode::ReservedFileName));
        assert!(validate_file(&blob("console.txt", 1), &rules).is_valid);

        let unchecked = ValidationRules::default();
        assert!(validate_file(&blob("con.txt", 1), &unchecked).is_valid);
    }

    #[test]
    fn test_warnings_do_not_invalidate() {
        let rules = ValidationRules {
            large_file_warning: Some(10),
            ..ValidationRules::default()
        };

        let big = validate_file(&blob("big.bin", 20), &rules);
        assert!(big.is_valid);
        assert!(big.has(IssueCode::LargeFile));

        let empty = validate_file(&blob("empty.txt", 0), &rules);
        assert!(empty.is_valid);
        assert!(empty.has(IssueCode::EmptyFile));

        let mismatch = FileBlob::from_bytes("doc.pdf", Some("text/plain"), vec![1u8; 2]);
        let result = validate_file(&mismatch, &rules);
        assert!(result.is_valid);
        assert!(result.has(IssueCode::MimeTypeMismatch));
    }

    #[test]
    fn test_custom_validator() {
        let rules = ValidationRules::default().with_custom(|f| {
            if f.name.starts_with("draft") {
                Err("drafts can't be uploaded".into())
            } else {
                Ok(())
            }
        });

        let result = validate_file(&blob("draft-1.txt", 1), &rules);
        assert_eq!(result.errors[0].code, IssueCode::CustomValidationFailed);
        assert_eq!(result.errors[0].message, "drafts can't be uploaded");
        assert!(validate_file(&blob("final.txt", 1), &rules).is_valid);
    }

    #[test]
    fn test_list_level_checks() {
        let rules = ValidationRules {
            max_files: Some(2),
            max_total_size: Some(100),
            ..ValidationRules::default()
        };

        let files = vec![blob("a.txt", 60), blob("A.TXT", 30), blob("b.txt", 30)];
        let result = validate_files(&files, &rules);

        assert_eq!(result.files.len(), 3);
        assert!(result.files.iter().all(|f| f.is_valid));
        assert!(!result.is_valid());

        let codes: Vec<IssueCode> = result.errors.iter().map(|e| e.code).collect();
        assert_eq!(
            codes,
            vec![
                IssueCode::TooManyFiles,
                IssueCode::TotalSizeExceeded,
                IssueCode::DuplicateFileName
            ]
        );
    }

    #[test]
    fn test_codes_serialize_screaming() {
        let json = serde_json::to_string(&ValidationIssue::new(IssueCode::FileTooLarge, "x")).unwrap();
        assert_eq!(json, r#"{"code":"FILE_TOO_LARGE","message":"x"}"#);
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(12), "12 B");
    }
}
