use std::fs;

use zipsplice::zip::{AppendEntry, EntrySource};
use zipsplice::{
    ArchiveOutcome, ArchiveSplicer, create_or_append_archive, create_or_append_entries,
    extract_archive, is_archive, list_archive_entries, list_local_entries,
};

use crate::walked_name;

#[test]
fn create_lists_every_walked_path() {
    let src = tempfile::tempdir().unwrap();
    let root = src.path().join("tree");
    fs::create_dir_all(root.join("sub")).unwrap();
    fs::write(root.join("a.txt"), b"a").unwrap();
    fs::write(root.join("sub").join("b.txt"), b"bb").unwrap();

    let out = tempfile::tempdir().unwrap();
    let archive = out.path().join("tree.zip");
    let outcome = create_or_append_archive(&archive, &[&root]).unwrap();
    assert_eq!(outcome, ArchiveOutcome::Created);
    assert!(is_archive(&archive));

    let mut names = list_archive_entries(&archive).unwrap();
    names.sort();
    let mut expected = vec![
        format!("{}/", walked_name(&root)),
        walked_name(&root.join("a.txt")),
        format!("{}/", walked_name(&root.join("sub"))),
        walked_name(&root.join("sub").join("b.txt")),
    ];
    expected.sort();
    assert_eq!(names, expected);
}

#[test]
fn create_preserves_file_order_for_plain_files() {
    let src = tempfile::tempdir().unwrap();
    let files: Vec<_> = ["z.txt", "a.txt", "m.txt"]
        .iter()
        .map(|n| {
            let p = src.path().join(n);
            fs::write(&p, n.as_bytes()).unwrap();
            p
        })
        .collect();

    let archive = src.path().join("out.zip");
    create_or_append_archive(&archive, &files).unwrap();
    let expected: Vec<_> = files.iter().map(|p| walked_name(p)).collect();
    assert_eq!(list_archive_entries(&archive).unwrap(), expected);
}

#[test]
fn extraction_round_trips_content() {
    let src = tempfile::tempdir().unwrap();
    let root = src.path().join("data");
    fs::create_dir_all(root.join("deep").join("er")).unwrap();
    let contents: Vec<(std::path::PathBuf, Vec<u8>)> = vec![
        (root.join("empty"), Vec::new()),
        (root.join("text.txt"), b"hello world\n".repeat(50)),
        (
            root.join("deep").join("er").join("bytes.bin"),
            (0..=255u8).cycle().take(10_000).collect(),
        ),
    ];
    for (path, data) in &contents {
        fs::write(path, data).unwrap();
    }

    let archive = src.path().join("data.zip");
    create_or_append_archive(&archive, &[&root]).unwrap();

    let dest = tempfile::tempdir().unwrap();
    let written = extract_archive(&archive, dest.path()).unwrap();
    assert_eq!(written.len(), 6);

    for (path, data) in &contents {
        let extracted = dest.path().join(walked_name(path));
        assert_eq!(&fs::read(&extracted).unwrap(), data, "{}", extracted.display());
    }
}

#[test]
fn extraction_restores_mtime() {
    let src = tempfile::tempdir().unwrap();
    let file = src.path().join("old.txt");
    fs::write(&file, b"old").unwrap();
    let mtime = filetime_from(1_500_000_000);
    ::filetime::set_file_mtime(&file, mtime).unwrap();

    let archive = src.path().join("old.zip");
    create_or_append_archive(&archive, &[&file]).unwrap();

    let dest = tempfile::tempdir().unwrap();
    extract_archive(&archive, dest.path()).unwrap();
    let meta = fs::metadata(dest.path().join(walked_name(&file))).unwrap();
    assert_eq!(::filetime::FileTime::from_last_modification_time(&meta), mtime);
}

fn filetime_from(secs: i64) -> ::filetime::FileTime {
    ::filetime::FileTime::from_unix_time(secs, 0)
}

#[cfg(unix)]
#[test]
fn extraction_restores_permissions() {
    use std::os::unix::fs::PermissionsExt;

    let src = tempfile::tempdir().unwrap();
    let script = src.path().join("run.sh");
    fs::write(&script, b"#!/bin/sh\n").unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o750)).unwrap();

    let archive = src.path().join("s.zip");
    create_or_append_archive(&archive, &[&script]).unwrap();

    let dest = tempfile::tempdir().unwrap();
    extract_archive(&archive, dest.path()).unwrap();
    let mode = fs::metadata(dest.path().join(walked_name(&script)))
        .unwrap()
        .permissions()
        .mode();
    assert_eq!(mode & 0o777, 0o750);
}

#[test]
fn creation_keeps_leading_bytes() {
    let src = tempfile::tempdir().unwrap();
    let file = src.path().join("f.txt");
    fs::write(&file, b"content").unwrap();

    let target = src.path().join("installer");
    fs::write(&target, b"STUB\x00\x01\x02").unwrap();
    assert!(!is_archive(&target));

    create_or_append_archive(&target, &[&file]).unwrap();
    let bytes = fs::read(&target).unwrap();
    assert!(bytes.starts_with(b"STUB\x00\x01\x02"));
    assert_eq!(list_archive_entries(&target).unwrap(), [walked_name(&file)]);

    let dest = tempfile::tempdir().unwrap();
    extract_archive(&target, dest.path()).unwrap();
    assert_eq!(fs::read(dest.path().join(walked_name(&file))).unwrap(), b"content");
}

#[test]
fn second_call_splices_instead_of_recreating() {
    let src = tempfile::tempdir().unwrap();
    let first = src.path().join("first.txt");
    let second = src.path().join("second.txt");
    fs::write(&first, b"1").unwrap();
    fs::write(&second, b"2").unwrap();

    let archive = src.path().join("a.zip");
    assert_eq!(
        create_or_append_archive(&archive, &[&first]).unwrap(),
        ArchiveOutcome::Created
    );
    let ArchiveOutcome::Appended(report) = create_or_append_archive(&archive, &[&second]).unwrap()
    else {
        panic!("expected a splice");
    };
    assert_eq!(report.appended, ["second.txt"]);

    assert!(is_archive(&archive));
    assert_eq!(list_archive_entries(&archive).unwrap(), [walked_name(&first)]);
    assert_eq!(
        list_local_entries(&archive).unwrap(),
        [walked_name(&first), "second.txt".to_string()]
    );
}

#[test]
fn named_entries_follow_sources_when_splicing() {
    let src = tempfile::tempdir().unwrap();
    let seed = src.path().join("seed.txt");
    fs::write(&seed, b"seed").unwrap();
    let archive = src.path().join("a.zip");
    create_or_append_archive(&archive, &[&seed]).unwrap();

    let named = [AppendEntry::from_bytes("Hidden.xlsx", b"Kevin Was Here".to_vec())];
    let outcome =
        create_or_append_entries(&archive, &[&seed], &named, &ArchiveSplicer::new()).unwrap();
    let ArchiveOutcome::Appended(report) = &outcome else {
        panic!("expected a splice, got {outcome:?}");
    };
    assert_eq!(report.appended, ["seed.txt", "Hidden.xlsx"]);
    assert_eq!(
        list_local_entries(&archive).unwrap().last().map(String::as_str),
        Some("Hidden.xlsx")
    );
}

#[test]
fn named_entries_keep_their_names_when_creating() {
    let src = tempfile::tempdir().unwrap();
    let payload = src.path().join("payload");
    fs::write(&payload, b"Kevin Was Here").unwrap();
    let seed = src.path().join("seed.txt");
    fs::write(&seed, b"seed").unwrap();
    let archive = src.path().join("new.zip");

    let named = [AppendEntry::new("Hidden.xlsx", EntrySource::Path(payload))];
    let outcome =
        create_or_append_entries(&archive, &[&seed], &named, &ArchiveSplicer::new()).unwrap();
    assert_eq!(outcome, ArchiveOutcome::Created);
    assert_eq!(
        list_archive_entries(&archive).unwrap(),
        [walked_name(&seed), "Hidden.xlsx".to_string()]
    );

    let dest = tempfile::tempdir().unwrap();
    extract_archive(&archive, dest.path()).unwrap();
    assert_eq!(fs::read(dest.path().join("Hidden.xlsx")).unwrap(), b"Kevin Was Here");
}
