//! Attachment classification
//!
//! Maps a URL and an optional mime hint to the semantic kind the renderer
//! uses to pick a bubble layout. Classification is pure and never fails; an
//! unrecognized attachment is simply [`AttachmentKind::Other`].

use core::fmt;
use serde::{Deserialize, Serialize};

/// Semantic kind of an attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    Pdf,
    Document,
    Spreadsheet,
    Presentation,
    Other,
}

impl fmt::Display for AttachmentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AttachmentKind::Image => "image",
            AttachmentKind::Video => "video",
            AttachmentKind::Audio => "audio",
            AttachmentKind::Pdf => "pdf",
            AttachmentKind::Document => "document",
            AttachmentKind::Spreadsheet => "spreadsheet",
            AttachmentKind::Presentation => "presentation",
            AttachmentKind::Other => "other",
        };
        f.write_str(name)
    }
}

// ----------------------------------------------------------------------------
// Fixed Sets
// ----------------------------------------------------------------------------

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "heic", "heif", "bmp", "svg", "tiff",
];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "m4v", "avi", "mkv", "webm", "3gp"];
const AUDIO_EXTENSIONS: &[&str] = &[
    "mp3", "m4a", "aac", "wav", "ogg", "oga", "flac", "opus", "amr",
];
const DOCUMENT_EXTENSIONS: &[&str] = &["doc", "docx", "odt", "rtf", "txt", "pages"];
const SPREADSHEET_EXTENSIONS: &[&str] = &["xls", "xlsx", "ods", "csv", "numbers"];
const PRESENTATION_EXTENSIONS: &[&str] = &["ppt", "pptx", "odp", "key"];

const DOCUMENT_MIMES: &[&str] = &[
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.oasis.opendocument.text",
    "application/rtf",
    "text/rtf",
    "text/plain",
];
const SPREADSHEET_MIMES: &[&str] = &[
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.oasis.opendocument.spreadsheet",
    "text/csv",
];
const PRESENTATION_MIMES: &[&str] = &[
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.oasis.opendocument.presentation",
];

// ----------------------------------------------------------------------------
// Classification
// ----------------------------------------------------------------------------

/// Classify an attachment from its URL and an optional mime hint
///
/// The mime hint wins when it names a known kind; otherwise the URL's file
/// extension decides.
pub fn classify(url: Option<&str>, mime_hint: Option<&str>) -> AttachmentKind {
    mime_hint
        .and_then(classify_mime)
        .or_else(|| url.and_then(extension).and_then(|ext| classify_extension(&ext)))
        .unwrap_or(AttachmentKind::Other)
}

/// Classify a mime type, ignoring parameters such as `; charset=utf-8`
pub fn classify_mime(mime: &str) -> Option<AttachmentKind> {
    let essence = mime
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let (top_level, _) = essence.split_once('/')?;
    match top_level {
        "image" => return Some(AttachmentKind::Image),
        "video" => return Some(AttachmentKind::Video),
        "audio" => return Some(AttachmentKind::Audio),
        _ => {}
    }

    if essence == "application/pdf" {
        Some(AttachmentKind::Pdf)
    } else if SPREADSHEET_MIMES.contains(&essence.as_str()) {
        Some(AttachmentKind::Spreadsheet)
    } else if PRESENTATION_MIMES.contains(&essence.as_str()) {
        Some(AttachmentKind::Presentation)
    } else if DOCUMENT_MIMES.contains(&essence.as_str()) {
        Some(AttachmentKind::Document)
    } else {
        None
    }
}

/// Classify a lowercase file extension without the leading dot
pub fn classify_extension(ext: &str) -> Option<AttachmentKind> {
    let kind = if IMAGE_EXTENSIONS.contains(&ext) {
        AttachmentKind::Image
    } else if VIDEO_EXTENSIONS.contains(&ext) {
        AttachmentKind::Video
    } else if AUDIO_EXTENSIONS.contains(&ext) {
        AttachmentKind::Audio
    } else if ext == "pdf" {
        AttachmentKind::Pdf
    } else if DOCUMENT_EXTENSIONS.contains(&ext) {
        AttachmentKind::Document
    } else if SPREADSHEET_EXTENSIONS.contains(&ext) {
        AttachmentKind::Spreadsheet
    } else if PRESENTATION_EXTENSIONS.contains(&ext) {
        AttachmentKind::Presentation
    } else {
        return None;
    };
    Some(kind)
}

/// Extract the lowercase extension of the last path segment of a URL
fn extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    // Skip the scheme/authority so "https://example.com" has no extension
    let path = match path.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, p)| p).unwrap_or_default(),
        None => path,
    };
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_hint_takes_precedence() {
        assert_eq!(
            classify(Some("https://cdn.example.com/a.pdf"), Some("image/png")),
            AttachmentKind::Image
        );
        assert_eq!(
            classify(Some("https://cdn.example.com/clip"), Some("video/mp4; codecs=avc1")),
            AttachmentKind::Video
        );
    }

    #[test]
    fn test_unknown_mime_falls_back_to_extension() {
        assert_eq!(
            classify(
                Some("https://cdn.example.com/report.xlsx"),
                Some("application/octet-stream")
            ),
            AttachmentKind::Spreadsheet
        );
    }

    #[test]
    fn test_extension_classification() {
        let cases = [
            ("https://x.io/photo.JPG", AttachmentKind::Image),
            ("https://x.io/v/clip.mov?sig=abc", AttachmentKind::Video),
            ("https://x.io/voice.m4a#t=3", AttachmentKind::Audio),
            ("file:///tmp/invoice.pdf", AttachmentKind::Pdf),
            ("notes.docx", AttachmentKind::Document),
            ("deck.pptx", AttachmentKind::Presentation),
            ("table.csv", AttachmentKind::Spreadsheet),
            ("archive.zip", AttachmentKind::Other),
        ];
        for (url, expected) in cases {
            assert_eq!(classify(Some(url), None), expected, "url: {url}");
        }
    }

    #[test]
    fn test_no_extension_is_other() {
        assert_eq!(classify(Some("https://example.com"), None), AttachmentKind::Other);
        assert_eq!(classify(Some("https://example.com/.hidden"), None), AttachmentKind::Other);
        assert_eq!(classify(Some("https://example.com/dir.v2/file"), None), AttachmentKind::Other);
        assert_eq!(classify(None, None), AttachmentKind::Other);
    }

    #[test]
    fn test_application_mimes() {
        assert_eq!(classify_mime("application/pdf"), Some(AttachmentKind::Pdf));
        assert_eq!(classify_mime("text/plain"), Some(AttachmentKind::Document));
        assert_eq!(
            classify_mime("application/vnd.ms-powerpoint"),
            Some(AttachmentKind::Presentation)
        );
        assert_eq!(classify_mime("application/zip"), None);
        assert_eq!(classify_mime("garbage"), None);
    }
}
