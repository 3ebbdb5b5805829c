//! Two-tier structural validation of downloaded documents.
//!
//! Tier 1 checks the `%PDF` magic bytes and costs nothing. Tier 2 parses the
//! whole document and requires at least one page. Tier 1 failing skips tier 2,
//! which keeps HTML error pages and empty bodies away from the parser.

use std::sync::Arc;

use crate::error::{CheckError, ValidationError};

/// Magic bytes every accepted document starts with
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Full structural parser used by tier 2
pub trait DocumentParser: Send + Sync {
    /// Count the pages of `bytes`, or describe why it cannot be parsed
    fn page_count(&self, bytes: &[u8]) -> std::result::Result<usize, String>;
}

/// [`DocumentParser`] backed by `lopdf`
#[derive(Clone, Copy, Debug, Default)]
pub struct LopdfParser;

impl DocumentParser for LopdfParser {
    fn page_count(&self, bytes: &[u8]) -> std::result::Result<usize, String> {
        let document = lopdf::Document::load_mem(bytes).map_err(|e| e.to_string())?;
        Ok(document.get_pages().len())
    }
}

/// Tier 1: length > 3 and the first four bytes are `%PDF`
pub fn has_pdf_header(bytes: &[u8]) -> bool {
    bytes.len() > 3 && bytes.starts_with(PDF_MAGIC)
}

/// Validates payloads, running the parser off the async runtime
#[derive(Clone)]
pub struct Validator {
    parser: Arc<dyn DocumentParser>,
}

impl std::fmt::Debug for Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Validator").finish_non_exhaustive()
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(Arc::new(LopdfParser))
    }
}

impl Validator {
    /// Create a validator around a parser
    pub fn new(parser: Arc<dyn DocumentParser>) -> Self {
        Self { parser }
    }

    /// Run both tiers synchronously
    pub fn validate_blocking(&self, bytes: &[u8]) -> std::result::Result<(), ValidationError> {
        if !has_pdf_header(bytes) {
            return Err(ValidationError::MissingHeader);
        }
        match self.parser.page_count(bytes) {
            Ok(0) => Err(ValidationError::NoPages),
            Ok(_) => Ok(()),
            Err(reason) => Err(ValidationError::Unparseable(reason)),
        }
    }

    /// Run both tiers on the blocking pool
    ///
    /// A panic inside the parser is caught and reported as [`CheckError::Panicked`].
    pub async fn validate(&self, bytes: Arc<[u8]>) -> std::result::Result<(), CheckError> {
        let validator = self.clone();
        match tokio::task::spawn_blocking(move || validator.validate_blocking(&bytes)).await {
            Ok(result) => result.map_err(CheckError::from),
            Err(join_error) => Err(CheckError::Panicked(panic_message(join_error))),
        }
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "parser panicked".to_string()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingParser {
        calls: AtomicUsize,
        pages: usize,
    }

    impl DocumentParser for CountingParser {
        fn page_count(&self, _bytes: &[u8]) -> std::result::Result<usize, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.pages)
        }
    }

    struct PanickingParser;

    impl DocumentParser for PanickingParser {
        fn page_count(&self, _bytes: &[u8]) -> std::result::Result<usize, String> {
            panic!("xref table exploded");
        }
    }

    #[test]
    fn header_check_needs_four_bytes() {
        assert!(!has_pdf_header(b""));
        assert!(!has_pdf_header(b"%PD"));
        assert!(has_pdf_header(b"%PDF"));
        assert!(!has_pdf_header(b"<!DOCTYPE html>"));
    }

    #[test]
    fn bad_header_never_reaches_the_parser() {
        let parser = Arc::new(CountingParser {
            calls: AtomicUsize::new(0),
            pages: 1,
        });
        let validator = Validator::new(parser.clone());

        assert_eq!(
            validator.validate_blocking(b"<html>nope</html>"),
            Err(ValidationError::MissingHeader)
        );
        assert_eq!(parser.calls.load(Ordering::SeqCst), 0);

        assert_eq!(validator.validate_blocking(b"%PDF-1.7"), Ok(()));
        assert_eq!(parser.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn zero_pages_is_invalid() {
        let validator = Validator::new(Arc::new(CountingParser {
            calls: AtomicUsize::new(0),
            pages: 0,
        }));
        assert_eq!(
            validator.validate_blocking(b"%PDF-1.7"),
            Err(ValidationError::NoPages)
        );
    }

    #[test]
    fn lopdf_rejects_truncated_document() {
        let err = Validator::default()
            .validate_blocking(b"%PDF-1.5\n%garbage with no xref")
            .unwrap_err();
        assert!(matches!(err, ValidationError::Unparseable(_)), "{err:?}");
    }

    #[tokio::test]
    async fn async_validate_checks_header_before_parsing() {
        let parser = Arc::new(CountingParser {
            calls: AtomicUsize::new(0),
            pages: 2,
        });
        let validator = Validator::new(parser.clone());

        let err = validator
            .validate(Arc::from(b"<html>nope</html>".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::Invalid(ValidationError::MissingHeader)));
        assert_eq!(parser.calls.load(Ordering::SeqCst), 0);

        validator
            .validate(Arc::from(b"%PDF-1.7".to_vec()))
            .await
            .unwrap();
        assert_eq!(parser.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn parser_panic_becomes_check_error() {
        let validator = Validator::new(Arc::new(PanickingParser));
        let err = validator
            .validate(Arc::from(b"%PDF-1.7".to_vec()))
            .await
            .unwrap_err();
        match err {
            CheckError::Panicked(msg) => assert!(msg.contains("xref table exploded")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
