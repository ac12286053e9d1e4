use quickcheck_macros::quickcheck;
use zipsplice::zip::{AppendEntry, ArchiveSplicer, ZipExtractor, locate_eocd, splice_image};

use crate::archive_with;

#[quickcheck]
fn cd_offset_moves_by_inserted_length(blobs: Vec<Vec<u8>>) -> bool {
    let original = archive_with(&[("seed.txt", b"seed")]);
    let before = locate_eocd(&original).unwrap().cd_offset;

    let entries: Vec<_> = blobs
        .iter()
        .enumerate()
        .map(|(i, b)| AppendEntry::from_bytes(format!("blob{i}"), b.clone()))
        .collect();
    let (chunks, skipped) = ArchiveSplicer::new()
        .with_timestamp(0)
        .build_chunks(&entries)
        .unwrap();
    let inserted: Vec<u8> = chunks.iter().flat_map(|c| c.bytes.clone()).collect();
    let total: usize = chunks.iter().map(|c| c.len()).sum();

    let (image, after) = splice_image(original, &inserted).unwrap();
    let extractor = ZipExtractor::new(image);
    let locals = extractor.parser().local_entries().unwrap();

    skipped.is_empty()
        && after == before + total as u32
        && locals.len() == blobs.len() + 1
        && locals[1..]
            .iter()
            .zip(&blobs)
            .all(|(entry, blob)| extractor.extract_to_memory(entry).unwrap() == *blob)
}
