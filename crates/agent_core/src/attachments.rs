//! crates/agent_core/src/attachments.rs
//!
//! Turns selected files into knowledge-base file descriptors.

use crate::domain::{FileItem, FileKind, PendingAttachment};
use uuid::Uuid;

/// Builds a descriptor with a fresh identifier for a selected file.
pub fn describe(attachment: &PendingAttachment) -> FileItem {
    FileItem {
        id: Uuid::new_v4(),
        name: attachment.name.clone(),
        size: human_size(attachment.size_bytes),
        kind: infer_kind(&attachment.name),
    }
}

/// Formats a byte count in megabytes with two decimals, e.g. `"2.40 MB"`.
pub fn human_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Guesses the document type from the file extension.
pub fn infer_kind(name: &str) -> FileKind {
    let extension = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return FileKind::Other,
    };
    match extension.as_str() {
        "pdf" => FileKind::Pdf,
        "doc" | "docx" | "rtf" | "odt" => FileKind::Doc,
        "txt" | "md" | "csv" => FileKind::Txt,
        _ => FileKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_rendered_in_megabytes() {
        assert_eq!(human_size(0), "0.00 MB");
        assert_eq!(human_size(1024 * 1024), "1.00 MB");
        assert_eq!(human_size(2_516_582), "2.40 MB");
    }

    #[test]
    fn kinds_follow_extension_case_insensitively() {
        assert_eq!(infer_kind("price_list_2024.PDF"), FileKind::Pdf);
        assert_eq!(infer_kind("contract.docx"), FileKind::Doc);
        assert_eq!(infer_kind("notes.txt"), FileKind::Txt);
        assert_eq!(infer_kind("photo.jpeg"), FileKind::Other);
        assert_eq!(infer_kind("README"), FileKind::Other);
        assert_eq!(infer_kind(".pdf"), FileKind::Other);
    }

    #[test]
    fn descriptors_get_distinct_ids() {
        let attachment = PendingAttachment {
            name: "menu.pdf".into(),
            size_bytes: 512 * 1024,
        };
        let a = describe(&attachment);
        let b = describe(&attachment);
        assert_ne!(a.id, b.id);
        assert_eq!(a.name, "menu.pdf");
        assert_eq!(a.size, "0.50 MB");
        assert_eq!(a.kind, FileKind::Pdf);
    }
}
