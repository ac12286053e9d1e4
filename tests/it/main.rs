mod archive_tests;
mod property_tests;
mod splice_tests;

use std::path::Path;

use zipsplice::zip::ArchiveWriter;

/// A finished archive holding `files`, as written by the crate's own writer.
pub fn archive_with(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ArchiveWriter::new(Vec::new());
    for (name, data) in files {
        writer.add_file(name, *data, 0o644, 1_700_000_000).unwrap();
    }
    writer.finish().unwrap()
}

/// Central directory offset recorded in the EOCD, read the simple way.
pub fn recorded_cd_offset(image: &[u8]) -> u32 {
    let eocd = image.len() - 22;
    assert_eq!(&image[eocd..eocd + 4], b"PK\x05\x06");
    u32::from_le_bytes(image[eocd + 16..eocd + 20].try_into().unwrap())
}

/// Entry name the writer gives to a walked path.
pub fn walked_name(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            std::path::Component::Normal(p) => Some(p.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
