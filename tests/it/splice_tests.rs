use std::fs;

use rstest::rstest;
use zipsplice::zip::{AppendEntry, ArchiveSplicer, EntrySource, ZipParser};
use zipsplice::{
    Error, FormatError, ZipExtractor, is_archive, list_archive_entries, list_local_entries,
};

use crate::{archive_with, recorded_cd_offset};

#[test]
fn fourteen_byte_blob_into_empty_archive() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("empty.zip");
    let empty = archive_with(&[]);
    assert_eq!(empty.len(), 22);
    fs::write(&path, &empty).unwrap();

    let report = ArchiveSplicer::new()
        .append(&path, &[AppendEntry::from_bytes("Hidden.xlsx", b"Kevin Was Here".to_vec())])
        .unwrap();
    assert_eq!(report.appended, ["Hidden.xlsx"]);
    assert_eq!(report.original_cd_offset, 0);

    let image = fs::read(&path).unwrap();
    assert_eq!(recorded_cd_offset(&image) as usize, report.inserted_len);
    assert_eq!(image.len(), 22 + report.inserted_len);

    // still a valid archive, and the central directory is unchanged
    assert!(is_archive(&path));
    assert!(list_archive_entries(&path).unwrap().is_empty());

    let extractor = ZipExtractor::new(image);
    let entries = extractor.parser().local_entries().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].file_name, "Hidden.xlsx");
    assert_eq!(entries[0].uncompressed_size, 14);
    // extract_to_memory verifies the stored CRC-32
    assert_eq!(extractor.extract_to_memory(&entries[0]).unwrap(), b"Kevin Was Here");
}

#[rstest]
#[case::one_existing(&[("a.txt", b"alpha".as_slice())])]
#[case::several_existing(&[
    ("a.txt", b"alpha".as_slice()),
    ("b/c.bin", &[0u8; 4096][..]),
    ("d", &b""[..]),
])]
fn splice_after_existing_entries(#[case] existing: &[(&str, &[u8])]) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.zip");
    let original = archive_with(existing);
    fs::write(&path, &original).unwrap();
    let original_offset = recorded_cd_offset(&original);

    let new: Vec<(String, Vec<u8>)> = vec![
        ("new1.txt".into(), b"first new entry".to_vec()),
        ("new2.txt".into(), "second ".repeat(500).into_bytes()),
    ];
    let entries: Vec<_> = new
        .iter()
        .map(|(n, d)| AppendEntry::from_bytes(n.as_str(), d.clone()))
        .collect();
    let report = ArchiveSplicer::new().with_timestamp(1).append(&path, &entries).unwrap();

    let image = fs::read(&path).unwrap();
    assert_eq!(
        recorded_cd_offset(&image),
        original_offset + report.inserted_len as u32
    );
    // bytes before the insertion point and after it are untouched
    let at = original_offset as usize;
    assert_eq!(&image[..at], &original[..at]);
    assert_eq!(
        &image[at + report.inserted_len..image.len() - 22],
        &original[at..original.len() - 22]
    );

    let names: Vec<_> = existing.iter().map(|(n, _)| n.to_string()).collect();
    assert_eq!(list_archive_entries(&path).unwrap(), names);

    let mut all = names.clone();
    all.extend(new.iter().map(|(n, _)| n.clone()));
    assert_eq!(list_local_entries(&path).unwrap(), all);

    let extractor = ZipExtractor::new(image);
    for entry in extractor.parser().local_entries().unwrap() {
        let data = extractor.extract_to_memory(&entry).unwrap();
        let expected = existing
            .iter()
            .map(|(n, d)| (n.to_string(), d.to_vec()))
            .chain(new.iter().cloned())
            .find(|(n, _)| *n == entry.file_name)
            .unwrap()
            .1;
        assert_eq!(data, expected, "{}", entry.file_name);
    }
}

#[test]
fn zero_entries_leave_archive_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.zip");
    let original = archive_with(&[("a.txt", b"alpha")]);
    fs::write(&path, &original).unwrap();

    let report = ArchiveSplicer::new().append(&path, &[]).unwrap();
    assert_eq!(report.inserted_len, 0);
    assert_eq!(fs::read(&path).unwrap(), original);
}

#[test]
fn all_sources_unreadable_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.zip");
    let original = archive_with(&[("a.txt", b"alpha")]);
    fs::write(&path, &original).unwrap();

    let missing = dir.path().join("nope");
    let report = ArchiveSplicer::new().append_files(&path, &[&missing]).unwrap();
    assert!(report.appended.is_empty());
    assert_eq!(report.skipped, [missing]);
    assert_eq!(fs::read(&path).unwrap(), original);
}

#[test]
fn files_are_stored_under_base_name() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.zip");
    fs::write(&path, archive_with(&[])).unwrap();
    fs::create_dir(dir.path().join("nested")).unwrap();
    let src = dir.path().join("nested").join("payload.dat");
    fs::write(&src, b"payload").unwrap();

    let entries = [
        AppendEntry::from_path(&src),
        AppendEntry::new("renamed.dat", EntrySource::Path(src.clone())),
    ];
    ArchiveSplicer::new().append(&path, &entries).unwrap();
    assert_eq!(list_local_entries(&path).unwrap(), ["payload.dat", "renamed.dat"]);
}

#[test]
fn non_zip_input_fails_with_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("plain.txt");
    fs::write(&path, b"just some text, nothing zip-like").unwrap();

    let err = ArchiveSplicer::new()
        .append(&path, &[AppendEntry::from_bytes("x", b"x".to_vec())])
        .unwrap_err();
    assert!(matches!(err, Error::Format(FormatError::EocdNotFound)));
    assert_eq!(fs::read(&path).unwrap(), b"just some text, nothing zip-like");
}

#[test]
fn missing_archive_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = ArchiveSplicer::new()
        .append(&dir.path().join("absent.zip"), &[])
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));
}

#[test]
fn splice_into_archive_with_leading_stub() {
    let stub = b"#!/bin/sh\necho self-extracting\nexit 0\n".to_vec();
    let mut image = stub.clone();
    let mut writer = zipsplice::zip::ArchiveWriter::at_offset(&mut image, stub.len() as u64);
    writer.add_file("inner.txt", &b"inner"[..], 0o644, 0).unwrap();
    writer.finish().unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sfx");
    fs::write(&path, &image).unwrap();

    ArchiveSplicer::new()
        .append(&path, &[AppendEntry::from_bytes("extra.txt", b"extra".to_vec())])
        .unwrap();

    let spliced = fs::read(&path).unwrap();
    assert!(spliced.starts_with(&stub));
    let parser = ZipParser::new(spliced);
    let names: Vec<_> = parser
        .local_entries()
        .unwrap()
        .into_iter()
        .map(|e| e.file_name)
        .collect();
    assert_eq!(names, ["inner.txt", "extra.txt"]);
}
