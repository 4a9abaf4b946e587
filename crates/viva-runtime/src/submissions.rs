//! Submission intake.
//!
//! Text extraction and byte storage are collaborator services reached
//! through [`TextExtractor`] and [`BlobStore`]. Extraction failures never
//! fail intake: they are logged and the submission keeps empty text, to be
//! retried once by [`SubmissionIntake::ensure_text`].

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use viva_core::identity::Caller;
use viva_core::text::truncate_chars;
use viva_store::{NewSubmission, SubmissionRow, VivaStore};

use crate::errors::{Result, VivaError};

/// Converts uploaded bytes into plain text.
pub trait TextExtractor: Send + Sync {
    /// Extract text from `bytes` uploaded as `file_name`.
    fn extract(&self, file_name: &str, bytes: &[u8]) -> Result<String>;
}

/// Stores uploaded bytes by name.
pub trait BlobStore: Send + Sync {
    /// Persist `bytes`, returning a handle.
    fn save(&self, name: &str, bytes: &[u8]) -> Result<String>;

    /// Load bytes by handle.
    fn load(&self, handle: &str) -> Result<Option<Vec<u8>>>;
}

/// Extensions known to need a format-specific extractor.
const BINARY_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "ppt", "pptx", "xls", "xlsx", "odt", "zip", "png", "jpg", "jpeg", "gif",
];

/// Extractor for UTF-8 text formats (`.txt`, `.md`, source code, ...).
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, file_name: &str, bytes: &[u8]) -> Result<String> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if BINARY_EXTENSIONS.contains(&extension.as_str()) {
            return Err(VivaError::Extraction {
                message: format!("unsupported file type: .{extension}"),
            });
        }
        let text = std::str::from_utf8(bytes).map_err(|e| VivaError::Extraction {
            message: format!("{file_name} is not valid UTF-8: {e}"),
        })?;
        Ok(text.trim_start_matches('\u{feff}').replace('\0', ""))
    }
}

/// [`BlobStore`] backed by the viva database (content-addressed, deduplicated
/// by SHA-256).
#[derive(Clone)]
pub struct SqliteBlobStore {
    store: Arc<VivaStore>,
}

impl SqliteBlobStore {
    /// Wrap a store.
    pub fn new(store: Arc<VivaStore>) -> Self {
        Self { store }
    }
}

impl BlobStore for SqliteBlobStore {
    fn save(&self, name: &str, bytes: &[u8]) -> Result<String> {
        Ok(self.store.put_blob(name, bytes)?)
    }

    fn load(&self, handle: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.store.get_blob(handle)?)
    }
}

/// Records submissions and keeps their extracted text current.
pub struct SubmissionIntake {
    store: Arc<VivaStore>,
    blobs: Arc<dyn BlobStore>,
    extractor: Arc<dyn TextExtractor>,
    text_cap: usize,
}

impl SubmissionIntake {
    /// Create an intake. Extracted text is capped at `text_cap` characters.
    pub fn new(
        store: Arc<VivaStore>,
        blobs: Arc<dyn BlobStore>,
        extractor: Arc<dyn TextExtractor>,
        text_cap: usize,
    ) -> Self {
        Self {
            store,
            blobs,
            extractor,
            text_cap,
        }
    }

    /// Intake with the bundled extractor and database blob store.
    pub fn with_defaults(store: Arc<VivaStore>, text_cap: usize) -> Self {
        let blobs = Arc::new(SqliteBlobStore::new(Arc::clone(&store)));
        Self::new(store, blobs, Arc::new(PlainTextExtractor), text_cap)
    }

    /// Store an uploaded file and record it as the caller's submission.
    pub fn submit_file(
        &self,
        caller: &Caller,
        assignment_id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<SubmissionRow> {
        self.require_assignment(assignment_id)?;
        let blob_id = self.blobs.save(file_name, bytes)?;
        let extracted_text = self.extract_capped(file_name, bytes);
        let submission = self.store.create_submission(&NewSubmission {
            assignment_id: assignment_id.to_string(),
            student_id: caller.user_id.clone(),
            file_name: Some(file_name.to_string()),
            blob_id: Some(blob_id),
            extracted_text,
            is_placeholder: false,
        })?;
        info!(
            submission_id = %submission.id,
            file_name,
            chars = submission.extracted_text.chars().count(),
            "file submission recorded"
        );
        Ok(submission)
    }

    /// Record pasted text as the caller's submission.
    pub fn submit_text(&self, caller: &Caller, assignment_id: &str, text: &str) -> Result<SubmissionRow> {
        if text.trim().is_empty() {
            return Err(VivaError::EmptyMessage);
        }
        self.require_assignment(assignment_id)?;
        let submission = self.store.create_submission(&NewSubmission {
            assignment_id: assignment_id.to_string(),
            student_id: caller.user_id.clone(),
            extracted_text: truncate_chars(text, self.text_cap).to_string(),
            ..NewSubmission::default()
        })?;
        info!(submission_id = %submission.id, "text submission recorded");
        Ok(submission)
    }

    /// Re-extract text once for a submission whose blob yielded none.
    pub fn ensure_text(&self, submission_id: &str) -> Result<SubmissionRow> {
        let mut submission = self
            .store
            .get_submission(submission_id)?
            .ok_or_else(|| VivaError::not_found("submission", submission_id))?;
        if !submission.extracted_text.is_empty() {
            return Ok(submission);
        }
        let Some(blob_id) = submission.blob_id.clone() else {
            return Ok(submission);
        };
        let Some(bytes) = self.blobs.load(&blob_id)? else {
            warn!(submission_id, blob_id = %blob_id, "submission blob missing");
            return Ok(submission);
        };
        let file_name = submission.file_name.clone().unwrap_or_default();
        let text = self.extract_capped(&file_name, &bytes);
        if !text.is_empty() {
            let _ = self.store.update_submission_text(submission_id, &text)?;
            info!(submission_id, "submission text re-extracted");
            submission.extracted_text = text;
        }
        Ok(submission)
    }

    /// The student's placeholder submission for a resource-only viva,
    /// created on first use.
    pub fn ensure_placeholder(&self, assignment_id: &str, student_id: &str) -> Result<SubmissionRow> {
        if let Some(existing) = self.store.find_placeholder(assignment_id, student_id)? {
            return Ok(existing);
        }
        self.require_assignment(assignment_id)?;
        let placeholder = self.store.create_submission(&NewSubmission {
            assignment_id: assignment_id.to_string(),
            student_id: student_id.to_string(),
            is_placeholder: true,
            ..NewSubmission::default()
        })?;
        info!(submission_id = %placeholder.id, assignment_id, "placeholder submission created");
        Ok(placeholder)
    }

    fn require_assignment(&self, assignment_id: &str) -> Result<()> {
        self.store
            .get_assignment(assignment_id)?
            .map(|_| ())
            .ok_or_else(|| VivaError::not_found("assignment", assignment_id))
    }

    fn extract_capped(&self, file_name: &str, bytes: &[u8]) -> String {
        match self.extractor.extract(file_name, bytes) {
            Ok(text) => truncate_chars(&text, self.text_cap).to_string(),
            Err(e) => {
                warn!(file_name, error = %e, "text extraction failed, keeping empty text");
                String::new()
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use viva_store::NewAssignment;

    fn setup() -> (Arc<VivaStore>, String) {
        let store = Arc::new(VivaStore::in_memory().unwrap());
        let assignment = store
            .create_assignment(&NewAssignment {
                title: "Essay".into(),
                ..NewAssignment::default()
            })
            .unwrap();
        (store, assignment.id)
    }

    /// Fails the first extraction, then succeeds.
    struct FlakyExtractor {
        calls: AtomicUsize,
    }

    impl TextExtractor for FlakyExtractor {
        fn extract(&self, _file_name: &str, bytes: &[u8]) -> Result<String> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(VivaError::Extraction {
                    message: "transient".into(),
                })
            } else {
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }

    #[test]
    fn plain_text_extractor_reads_utf8() {
        let text = PlainTextExtractor.extract("essay.md", "\u{feff}# Title\nBody".as_bytes()).unwrap();
        assert_eq!(text, "# Title\nBody");
    }

    #[test]
    fn plain_text_extractor_rejects_binary_formats() {
        assert_matches!(
            PlainTextExtractor.extract("essay.PDF", b"%PDF-1.7"),
            Err(VivaError::Extraction { .. })
        );
        assert_matches!(
            PlainTextExtractor.extract("essay.txt", &[0xff, 0xfe, 0x00]),
            Err(VivaError::Extraction { .. })
        );
    }

    #[test]
    fn submit_file_stores_blob_and_caps_text() {
        let (store, assignment_id) = setup();
        let intake = SubmissionIntake::with_defaults(Arc::clone(&store), 10);
        let submission = intake
            .submit_file(&Caller::student("u1"), &assignment_id, "essay.txt", b"0123456789abcdef")
            .unwrap();
        assert_eq!(submission.extracted_text, "0123456789");
        assert_eq!(submission.student_id, "u1");
        let blob_id = submission.blob_id.unwrap();
        assert_eq!(store.get_blob(&blob_id).unwrap().unwrap(), b"0123456789abcdef");
    }

    #[test]
    fn extraction_failure_keeps_empty_text_then_ensure_text_retries() {
        let (store, assignment_id) = setup();
        let blobs = Arc::new(SqliteBlobStore::new(Arc::clone(&store)));
        let intake = SubmissionIntake::new(
            Arc::clone(&store),
            blobs,
            Arc::new(FlakyExtractor {
                calls: AtomicUsize::new(0),
            }),
            1_000,
        );
        let submission = intake
            .submit_file(&Caller::student("u1"), &assignment_id, "essay.txt", b"late text")
            .unwrap();
        assert!(submission.extracted_text.is_empty());

        let refreshed = intake.ensure_text(&submission.id).unwrap();
        assert_eq!(refreshed.extracted_text, "late text");
        assert_eq!(
            store.get_submission(&submission.id).unwrap().unwrap().extracted_text,
            "late text"
        );
    }

    #[test]
    fn submit_text_rejects_blank_and_unknown_assignment() {
        let (store, assignment_id) = setup();
        let intake = SubmissionIntake::with_defaults(store, 1_000);
        assert_matches!(
            intake.submit_text(&Caller::student("u1"), &assignment_id, "   "),
            Err(VivaError::EmptyMessage)
        );
        assert_matches!(
            intake.submit_text(&Caller::student("u1"), "asgn_missing", "text"),
            Err(VivaError::NotFound { kind: "assignment", .. })
        );
    }

    #[test]
    fn placeholder_is_created_once() {
        let (store, assignment_id) = setup();
        let intake = SubmissionIntake::with_defaults(store, 1_000);
        let first = intake.ensure_placeholder(&assignment_id, "u1").unwrap();
        let second = intake.ensure_placeholder(&assignment_id, "u1").unwrap();
        assert!(first.is_placeholder);
        assert_eq!(first.id, second.id);
        assert!(first.extracted_text.is_empty());
    }
}
