//! Intake filter: admits only image files, per field and per record limits.

use bazaar_shared::AttachmentSettings;

use super::error::AttachmentError;
use super::types::{CandidateFile, EntityKind, PendingUpload};

/// Validates inbound files before anything is buffered or uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakeFilter {
    max_file_size: u64,
}

impl Default for IntakeFilter {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_FILE_SIZE)
    }
}

impl IntakeFilter {
    /// Default per-file limit: 10 MiB.
    pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

    /// Create a filter with a per-file size limit in bytes.
    #[must_use]
    pub const fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    /// Build from the application settings section.
    #[must_use]
    pub const fn from_settings(settings: &AttachmentSettings) -> Self {
        Self::new(settings.max_file_size)
    }

    /// Check a batch without consuming it.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::UnsupportedMediaType`] naming the first violation.
    pub fn check(&self, kind: EntityKind, files: &[CandidateFile]) -> Result<(), AttachmentError> {
        Self::check_count(kind, files.len())?;
        for file in files {
            self.inspect(kind, file)?;
        }
        Ok(())
    }

    /// Admit a batch for `kind`.
    ///
    /// The whole batch is checked before any file is handed on; one bad file
    /// rejects all of them. An empty batch is admitted as empty.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::UnsupportedMediaType`] naming the first violation.
    pub fn accept(
        &self,
        kind: EntityKind,
        files: Vec<CandidateFile>,
    ) -> Result<Vec<PendingUpload>, AttachmentError> {
        Self::check_count(kind, files.len())?;

        files
            .into_iter()
            .map(|file| {
                let mime_type = self.inspect(kind, &file)?;
                Ok::<_, AttachmentError>(PendingUpload {
                    field_name: file.field_name,
                    file_name: file.file_name,
                    mime_type,
                    bytes: file.bytes,
                })
            })
            .collect()
    }

    fn check_count(kind: EntityKind, count: usize) -> Result<(), AttachmentError> {
        if count > kind.max_attachments() {
            return Err(AttachmentError::unsupported(format!(
                "field `{}` accepts at most {} file(s), got {count}",
                kind.field_name(),
                kind.max_attachments()
            )));
        }
        Ok(())
    }

    /// Validate one file and return its normalized media type.
    fn inspect(&self, kind: EntityKind, file: &CandidateFile) -> Result<String, AttachmentError> {
        if file.field_name != kind.field_name() {
            return Err(AttachmentError::unsupported(format!(
                "unexpected field `{}`, expected `{}`",
                file.field_name,
                kind.field_name()
            )));
        }

        let mime = media_type(file)?;
        if mime.type_() != mime::IMAGE {
            return Err(AttachmentError::unsupported(format!(
                "`{}` is not an image",
                mime.essence_str()
            )));
        }

        let label = file.file_name.as_deref().unwrap_or(kind.field_name());
        if file.bytes.is_empty() {
            return Err(AttachmentError::unsupported(format!(
                "file `{label}` is empty"
            )));
        }

        let size = u64::try_from(file.bytes.len()).unwrap_or(u64::MAX);
        if size > self.max_file_size {
            return Err(AttachmentError::unsupported(format!(
                "file `{label}` is {size} bytes, limit is {}",
                self.max_file_size
            )));
        }

        Ok(mime.essence_str().to_string())
    }
}

/// The declared content type. The file name is never consulted.
fn media_type(file: &CandidateFile) -> Result<mime::Mime, AttachmentError> {
    let Some(declared) = &file.content_type else {
        let label = file.file_name.as_deref().unwrap_or(&file.field_name);
        return Err(AttachmentError::unsupported(format!(
            "file `{label}` declares no media type"
        )));
    };

    declared
        .parse::<mime::Mime>()
        .map_err(|_| AttachmentError::unsupported(format!("unparsable media type `{declared}`")))
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // Any non-empty image under the limit is admitted.
        #[test]
        fn prop_images_within_limit_are_admitted(
            subtype in "[a-z]{1,10}",
            size in 1usize..=64,
        ) {
            let filter = IntakeFilter::new(64);
            let file = CandidateFile::new("images", vec![7u8; size])
                .with_content_type(format!("image/{subtype}"));

            let accepted = filter.accept(EntityKind::Post, vec![file]).unwrap();
            prop_assert_eq!(accepted[0].mime_type.clone(), format!("image/{subtype}"));
        }

        // Nothing outside `image/*` gets through.
        #[test]
        fn prop_non_images_are_rejected(
            top in prop::sample::select(vec!["text", "application", "video", "audio", "font"]),
            subtype in "[a-z]{1,10}",
        ) {
            let filter = IntakeFilter::default();
            let file = CandidateFile::new("photo", b"x".to_vec())
                .with_content_type(format!("{top}/{subtype}"));

            prop_assert!(filter.accept(EntityKind::User, vec![file]).is_err());
        }
    }
}
