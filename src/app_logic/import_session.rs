/*
 * The bulk-import workflow behind the import dialog. The user pastes text and
 * tweaks the parse parameters; the session keeps the delimiter in sync with the
 * text until the user picks one explicitly, and keeps a one-line preview of how
 * the first data line will be read. Committing sends everything to the backend as
 * a single import command and resets the session. Imported servers appear in the
 * store with the next sync, not through the session.
 */
use crate::core::import_parser::{self, ImportParams};
use crate::core::{BackendError, BackendOperations, ImportRequest, PreviewRecord};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Nothing to import: the pasted text is empty.")]
    EmptyText,
    #[error("Import failed: {0}")]
    Backend(#[from] BackendError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSession {
    is_open: bool,
    text: String,
    delimiter: String,
    delimiter_overridden: bool,
    skip_columns: usize,
    skip_header: bool,
    default_port: u16,
    initial_default_port: u16,
    preview: Option<PreviewRecord>,
}

impl ImportSession {
    pub fn new(default_port: u16) -> Self {
        ImportSession {
            is_open: false,
            text: String::new(),
            delimiter: import_parser::DEFAULT_DELIMITER.to_string(),
            delimiter_overridden: false,
            skip_columns: 0,
            skip_header: false,
            default_port,
            initial_default_port: default_port,
            preview: None,
        }
    }

    pub fn open(&mut self) {
        self.is_open = true;
    }

    /// Hides the dialog; the entered fields survive until `reset`.
    pub fn close(&mut self) {
        self.is_open = false;
    }

    pub fn is_open(&self) -> bool {
        self.is_open
    }

    /// Back to the defaults the session was created with, closed.
    pub fn reset(&mut self) {
        *self = ImportSession::new(self.initial_default_port);
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
        if !self.delimiter_overridden {
            self.delimiter = import_parser::detect_delimiter(&self.text).to_string();
        }
        self.refresh_preview();
    }

    /// An explicit choice; later text changes no longer re-detect the delimiter.
    pub fn set_delimiter(&mut self, delimiter: impl Into<String>) {
        self.delimiter = delimiter.into();
        self.delimiter_overridden = true;
        self.refresh_preview();
    }

    pub fn clear_delimiter_override(&mut self) {
        self.delimiter_overridden = false;
        self.delimiter = import_parser::detect_delimiter(&self.text).to_string();
        self.refresh_preview();
    }

    pub fn set_skip_columns(&mut self, skip_columns: usize) {
        self.skip_columns = skip_columns;
        self.refresh_preview();
    }

    pub fn set_skip_header(&mut self, skip_header: bool) {
        self.skip_header = skip_header;
        self.refresh_preview();
    }

    pub fn set_default_port(&mut self, default_port: u16) {
        self.default_port = default_port;
        self.refresh_preview();
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn is_delimiter_overridden(&self) -> bool {
        self.delimiter_overridden
    }

    pub fn skip_columns(&self) -> usize {
        self.skip_columns
    }

    pub fn skip_header(&self) -> bool {
        self.skip_header
    }

    pub fn default_port(&self) -> u16 {
        self.default_port
    }

    pub fn preview(&self) -> Option<&PreviewRecord> {
        self.preview.as_ref()
    }

    /// The line the preview is built from: the first non-blank line after the header.
    pub fn preview_line(&self) -> Option<&str> {
        import_parser::first_data_line(&self.text, self.skip_header)
    }

    pub fn params(&self) -> ImportParams {
        ImportParams {
            delimiter: self.delimiter.clone(),
            skip_columns: self.skip_columns,
            default_port: self.default_port,
            skip_header: self.skip_header,
        }
    }

    /// How many records the current text would import.
    pub fn record_count(&self) -> usize {
        import_parser::parse_bulk(&self.text, &self.params()).len()
    }

    pub fn import_request(&self) -> ImportRequest {
        ImportRequest {
            text: self.text.clone(),
            delimiter: self.delimiter.clone(),
            skip_columns: self.skip_columns,
            default_port: self.default_port,
            skip_header: self.skip_header,
        }
    }

    fn refresh_preview(&mut self) {
        self.preview = self.preview_line().and_then(|line| {
            import_parser::parse_line(line, &self.delimiter, self.skip_columns, self.default_port)
        });
    }

    /*
     * Replaces the local preview with the backend's parse of the same line, for
     * backends whose parser is authoritative. A backend failure leaves the local
     * preview in place.
     */
    pub async fn refresh_preview_from_backend(
        &mut self,
        backend: &dyn BackendOperations,
    ) -> Result<(), BackendError> {
        let Some(line) = self.preview_line().map(str::to_string) else {
            self.preview = None;
            return Ok(());
        };
        self.preview = backend
            .parse_preview_line(&line, &self.delimiter, self.skip_columns, self.default_port)
            .await?;
        Ok(())
    }

    /*
     * Sends the whole text as one import command. On success the session resets
     * and closes; on failure it stays as it is so the user can retry.
     */
    pub async fn commit(&mut self, backend: &dyn BackendOperations) -> Result<(), ImportError> {
        if self.text.trim().is_empty() {
            return Err(ImportError::EmptyText);
        }
        let request = self.import_request();
        log::info!(
            "ImportSession: Submitting import of {} line(s) with delimiter '{}'.",
            request.text.trim().lines().count(),
            request.delimiter
        );
        backend.import_bulk(&request).await?;
        self.reset();
        Ok(())
    }
}
