//! KMZ extraction.
//!
//! A KMZ file is a ZIP archive holding one KML document (usually `doc.kml`)
//! plus optional assets. The archive is read from memory; nothing touches disk.

use std::io::{Cursor, Read};

use log::debug;

use crate::error::{Result, RouteError};

/// Upper bound on the read buffer reserved from an entry's declared size.
/// The declared size comes from the archive and cannot be trusted.
const MAX_PREALLOC_BYTES: u64 = 1 << 20;

/// Return the text of the first archive entry whose name ends in `.kml`.
///
/// Entries are scanned in archive order. Fails with
/// [`RouteError::Extraction`] when the bytes are not a ZIP archive, no entry
/// is a KML document, or the chosen entry is not valid UTF-8.
pub fn extract_kml(kmz_bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(kmz_bytes))?;
    let entry_count = archive.len();

    for i in 0..entry_count {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() || !entry.name().ends_with(".kml") {
            continue;
        }

        let name = entry.name().to_string();
        debug!(
            "[KmzExtractor] Using entry '{}' ({} bytes, {} entries in archive)",
            name,
            entry.size(),
            entry_count
        );

        let mut bytes = Vec::with_capacity(entry.size().min(MAX_PREALLOC_BYTES) as usize);
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| RouteError::extraction(format!("failed to read '{}': {}", name, e)))?;

        return String::from_utf8(bytes)
            .map_err(|e| RouteError::extraction(format!("KML entry is not UTF-8: {}", e)));
    }

    Err(RouteError::extraction("archive contains no .kml entry"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn make_kmz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, content) in entries {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(content).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_extracts_first_kml_entry() {
        let kmz = make_kmz(&[
            ("files/icon.png", b"\x89PNG"),
            ("doc.kml", b"<kml>first</kml>"),
            ("other.kml", b"<kml>second</kml>"),
        ]);
        assert_eq!(extract_kml(&kmz).unwrap(), "<kml>first</kml>");
    }

    #[test]
    fn test_missing_kml_entry() {
        let kmz = make_kmz(&[("readme.txt", b"hello")]);
        let err = extract_kml(&kmz).unwrap_err();
        assert!(matches!(err, RouteError::Extraction { .. }));
        assert!(err.to_string().contains("no .kml entry"));
    }

    #[test]
    fn test_not_an_archive() {
        let err = extract_kml(b"definitely not a zip file").unwrap_err();
        assert!(matches!(err, RouteError::Extraction { .. }));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(
            extract_kml(&[]),
            Err(RouteError::Extraction { .. })
        ));
    }

    /// Rewrite the first central directory entry so that a zip64 extra field
    /// declares `declared` uncompressed bytes.
    fn declare_uncompressed_size(mut kmz: Vec<u8>, declared: u64) -> Vec<u8> {
        let cd = kmz.windows(4).position(|w| w == b"PK\x01\x02").unwrap();
        kmz[cd + 24..cd + 28].copy_from_slice(&u32::MAX.to_le_bytes());

        let name_len = u16::from_le_bytes([kmz[cd + 28], kmz[cd + 29]]) as usize;
        let extra_len = u16::from_le_bytes([kmz[cd + 30], kmz[cd + 31]]) as usize;
        let mut zip64 = vec![0x01, 0x00, 0x08, 0x00];
        zip64.extend_from_slice(&declared.to_le_bytes());
        let insert_at = cd + 46 + name_len + extra_len;
        drop(kmz.splice(insert_at..insert_at, zip64.iter().copied()));
        kmz[cd + 30..cd + 32].copy_from_slice(&((extra_len + zip64.len()) as u16).to_le_bytes());

        let eocd = kmz.windows(4).rposition(|w| w == b"PK\x05\x06").unwrap();
        let cd_size = u32::from_le_bytes(kmz[eocd + 12..eocd + 16].try_into().unwrap());
        kmz[eocd + 12..eocd + 16].copy_from_slice(&(cd_size + zip64.len() as u32).to_le_bytes());
        kmz
    }

    #[test]
    fn test_huge_declared_size_is_not_preallocated() {
        let kml = b"<kml><Document/></kml>";
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
        writer.start_file("doc.kml", options).unwrap();
        writer.write_all(kml).unwrap();
        let kmz = declare_uncompressed_size(writer.finish().unwrap().into_inner(), 1 << 50);

        // Either the real bytes or an extraction error; never an allocation abort
        match extract_kml(&kmz) {
            Ok(text) => assert_eq!(text.as_bytes(), kml),
            Err(e) => assert!(matches!(e, RouteError::Extraction { .. })),
        }
    }

    #[test]
    fn test_non_utf8_entry() {
        let kmz = make_kmz(&[("doc.kml", &[0xff, 0xfe, 0x00])]);
        assert!(matches!(
            extract_kml(&kmz),
            Err(RouteError::Extraction { .. })
        ));
    }
}
