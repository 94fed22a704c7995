//! API bundle extraction
//!
//! An upload is a zip archive of API documents. Only `.json`, `.yaml` and
//! `.yml` entries are read; directories and macOS resource forks are skipped.
//! The total number of decompressed bytes is capped, whatever sizes the
//! archive headers declare.

use std::io::{Cursor, Read};

use tracing::debug;
use zip::ZipArchive;

use crate::{Error, Result};

const DOCUMENT_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];
const MACOS_METADATA_DIR: &str = "__MACOSX";

/// Default cap on the decompressed size of all documents in one archive
pub const DEFAULT_MAX_EXTRACTED_BYTES: usize = 64 * 1024 * 1024;

/// One document read from an uploaded archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntry {
    pub name: String,
    pub contents: Vec<u8>,
}

/// Read every API document in the archive, in archive order.
///
/// Fails with an input-format error once the documents together exceed
/// `max_extracted_bytes` after decompression.
pub fn extract_documents(archive: &[u8], max_extracted_bytes: usize) -> Result<Vec<BundleEntry>> {
    let mut zip = ZipArchive::new(Cursor::new(archive))?;
    let mut entries = Vec::new();
    let mut remaining = max_extracted_bytes as u64;

    for index in 0..zip.len() {
        let file = zip.by_index(index)?;
        let name = file.name().to_string();

        if file.is_dir() || !is_document(&name) {
            debug!(entry = %name, "Skipping bundle entry");
            continue;
        }

        if file.size() > remaining {
            return Err(too_large(&name, max_extracted_bytes));
        }

        let mut contents = Vec::new();
        file.take(remaining + 1).read_to_end(&mut contents).map_err(|e| {
            Error::input_format_field(format!("unreadable archive entry: {}", e), name.clone())
        })?;

        let read = contents.len() as u64;
        if read > remaining {
            return Err(too_large(&name, max_extracted_bytes));
        }
        remaining -= read;

        entries.push(BundleEntry { name, contents });
    }

    if entries.is_empty() {
        return Err(Error::input_format("archive contains no API documents"));
    }

    Ok(entries)
}

fn too_large(name: &str, limit: usize) -> Error {
    Error::input_format_field(
        format!("archive documents exceed {} bytes once decompressed", limit),
        name.to_string(),
    )
}

fn is_document(name: &str) -> bool {
    if name.split('/').any(|segment| segment == MACOS_METADATA_DIR) {
        return false;
    }

    name.rsplit_once('.')
        .map(|(_, ext)| DOCUMENT_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn archive(files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, body) in files {
            if name.ends_with('/') {
                writer.add_directory(*name, SimpleFileOptions::default()).unwrap();
            } else {
                writer.start_file(*name, SimpleFileOptions::default()).unwrap();
                writer.write_all(body.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn reads_documents_and_skips_the_rest() {
        let bytes = archive(&[
            ("apis/", ""),
            ("apis/pets.yaml", "openapi: 3.0.0"),
            ("apis/store.JSON", "{}"),
            ("README.md", "docs"),
            ("__MACOSX/apis/._pets.yaml", "junk"),
        ]);

        let entries = extract_documents(&bytes, DEFAULT_MAX_EXTRACTED_BYTES).unwrap();
        let names: Vec<_> = entries.iter().map(|entry| entry.name.as_str()).collect();
        assert_eq!(names, vec!["apis/pets.yaml", "apis/store.JSON"]);
        assert_eq!(entries[0].contents, b"openapi: 3.0.0");
    }

    #[test]
    fn rejects_garbage_as_input_format() {
        let err = extract_documents(b"definitely not a zip", DEFAULT_MAX_EXTRACTED_BYTES).unwrap_err();
        assert!(matches!(err, Error::InputFormat { .. }));
    }

    #[test]
    fn rejects_archive_without_documents() {
        let bytes = archive(&[("notes.txt", "hello")]);
        let err = extract_documents(&bytes, DEFAULT_MAX_EXTRACTED_BYTES).unwrap_err();
        assert!(matches!(err, Error::InputFormat { .. }));
    }

    #[test]
    fn decompressed_size_is_capped() {
        let body = " ".repeat(4096);
        let bytes = archive(&[("a.json", &body), ("b.json", &body)]);

        assert_eq!(extract_documents(&bytes, 8192).unwrap().len(), 2);

        let err = extract_documents(&bytes, 6000).unwrap_err();
        match err {
            Error::InputFormat { field, .. } => assert_eq!(field.as_deref(), Some("b.json")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn inflated_size_header_is_rejected_without_allocating() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Stored)
            .large_file(true);
        writer.start_file("a.json", options).unwrap();
        writer.write_all(b"{}").unwrap();
        let mut bytes = writer.finish().unwrap().into_inner();

        // Rewrite every zip64 size field of the two-byte entry to 2^50.
        let actual = 2u64.to_le_bytes();
        let declared = (1u64 << 50).to_le_bytes();
        let mut patched = 0;
        let mut i = 0;
        while i + 4 <= bytes.len() {
            if bytes[i..i + 2] == [0x01, 0x00] {
                let len = u16::from_le_bytes([bytes[i + 2], bytes[i + 3]]) as usize;
                let end = (i + 4 + len).min(bytes.len());
                let mut field = i + 4;
                while field + 8 <= end {
                    if bytes[field..field + 8] == actual {
                        bytes[field..field + 8].copy_from_slice(&declared);
                        patched += 1;
                    }
                    field += 8;
                }
            }
            i += 1;
        }
        assert!(patched > 0);

        let err = extract_documents(&bytes, DEFAULT_MAX_EXTRACTED_BYTES).unwrap_err();
        assert!(matches!(err, Error::InputFormat { .. }));
    }
}
