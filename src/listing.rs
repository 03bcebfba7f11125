//! Listing form model and pre-flight validation
//!
//! A [`ListingForm`] is whatever the user has entered so far. The entry guard
//! [`ListingForm::validate`] turns it into a [`ListingSubmission`] or rejects it
//! before anything is sent over the network.

use std::path::Path;

use crate::Result;
use crate::error::Error;

/// Maximum number of tags a listing accepts
pub const MAX_TAGS: usize = 13;

/// Catalog id meaning "nothing selected"
pub const NONE_ID: &str = "0";

/// Split comma-separated tag input, trimming whitespace and dropping empty entries
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(String::from)
        .collect()
}

/// Derive a SKU from a title: lowercase, runs of anything that is not an
/// ASCII letter or digit collapse to a single underscore.
pub fn derive_sku(title: &str) -> String {
    title
        .to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// A file to upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_for(&file_name).to_string();
        Self { file_name, bytes, mime_type }
    }

    /// Read a file from disk, naming the attachment after the file
    pub async fn from_path(path: &Path) -> Result<Self> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Validation(format!("Invalid file path: {:?}", path)))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        tracing::debug!("Loaded {} ({} bytes)", file_name, bytes.len());
        Ok(Self::new(file_name, bytes))
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("zip") => "application/zip",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

/// Raw form state, as entered
#[derive(Debug, Clone)]
pub struct ListingForm {
    pub title: String,
    pub description: String,
    pub primary_color_id: String,
    pub secondary_color_id: String,
    pub holiday_id: String,
    pub tags: Vec<String>,
    pub image1: Option<Attachment>,
    pub image2: Option<Attachment>,
    pub archive: Option<Attachment>,
}

impl Default for ListingForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            // Black / White / Christmas
            primary_color_id: "1".to_string(),
            secondary_color_id: "10".to_string(),
            holiday_id: "1".to_string(),
            tags: Vec::new(),
            image1: None,
            image2: None,
            archive: None,
        }
    }
}

/// A validated listing, ready to submit
#[derive(Debug, Clone)]
pub struct ListingSubmission {
    pub title: String,
    pub description: String,
    pub sku: String,
    pub tags: Vec<String>,
    pub primary_color_id: Option<u64>,
    pub secondary_color_id: Option<u64>,
    pub holiday_id: Option<u64>,
    pub images: [Attachment; 2],
    pub archive: Attachment,
}

impl ListingForm {
    /// Entry guard: check everything that can be checked locally
    pub fn validate(self) -> Result<ListingSubmission> {
        let title = self.title.trim().to_string();
        let description = self.description.trim().to_string();

        let (image1, image2, archive) = match (self.image1, self.image2, self.archive) {
            (Some(image1), Some(image2), Some(archive))
                if !title.is_empty() && !description.is_empty() =>
            {
                (image1, image2, archive)
            }
            _ => {
                return Err(Error::Validation(
                    "Please fill all required fields and upload all files.".to_string(),
                ))
            }
        };

        if self.tags.is_empty() || self.tags.len() > MAX_TAGS {
            return Err(Error::Validation(format!(
                "Please provide between 1 and {} tags (got {}).",
                MAX_TAGS,
                self.tags.len()
            )));
        }

        Ok(ListingSubmission {
            sku: derive_sku(&title),
            primary_color_id: parse_catalog_id("primary color", &self.primary_color_id)?,
            secondary_color_id: parse_catalog_id("secondary color", &self.secondary_color_id)?,
            holiday_id: parse_catalog_id("holiday", &self.holiday_id)?,
            title,
            description,
            tags: self.tags,
            images: [image1, image2],
            archive,
        })
    }
}

/// Numeric catalog id, or `None` for the "none" sentinel
fn parse_catalog_id(field: &str, value: &str) -> Result<Option<u64>> {
    let value = value.trim();
    if value.is_empty() || value == NONE_ID {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| Error::Validation(format!("Invalid {} id: '{}'", field, value)))
}
