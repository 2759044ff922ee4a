//! Multipart form reading.

use std::collections::HashMap;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;
use bazaar_core::attachment::CandidateFile;
use bazaar_shared::AppError;

use crate::error::ApiError;

/// A multipart body split into text fields and file parts.
///
/// A part counts as a file when it carries a file name; everything else is
/// read as text, whatever content type the client declared for it.
#[derive(Debug, Default)]
pub struct AttachmentForm {
    fields: HashMap<String, String>,
    files: Vec<CandidateFile>,
}

impl AttachmentForm {
    /// Drain a multipart body.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the body is not well-formed multipart or a
    /// text part is not UTF-8.
    pub async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(malformed)? {
            let name = field.name().unwrap_or_default().to_string();
            let content_type = field.content_type().map(str::to_string);
            let Some(file_name) = field.file_name().map(str::to_string) else {
                let text = field.text().await.map_err(malformed)?;
                form.fields.insert(name, text);
                continue;
            };

            let mut file = CandidateFile::new(name, field.bytes().await.map_err(malformed)?)
                .with_file_name(file_name);
            if let Some(content_type) = content_type {
                file = file.with_content_type(content_type);
            }
            form.files.push(file);
        }

        Ok(form)
    }

    /// A text field that must be present and non-blank.
    ///
    /// # Errors
    ///
    /// Returns `Validation` naming the missing field.
    pub fn required(&self, name: &str) -> Result<String, ApiError> {
        self.optional(name)
            .map(str::to_string)
            .ok_or_else(|| ApiError(AppError::Validation(format!("`{name}` is required"))))
    }

    /// A text field, `None` when absent or blank.
    pub fn optional(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// File parts in the order they arrived.
    pub fn files(&self) -> &[CandidateFile] {
        &self.files
    }

    /// Consume the form, keeping only the file parts.
    pub fn into_files(self) -> Vec<CandidateFile> {
        self.files
    }
}

#[allow(clippy::needless_pass_by_value)]
fn malformed(err: MultipartError) -> ApiError {
    ApiError(AppError::Validation(err.body_text()))
}
