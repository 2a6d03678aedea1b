//! Fuzzy superblock discovery against raw-frame and shifted images on disk.

mod common;

use std::io::Write;

use common::iso::{dir_block, record, IsoBuilder, BLOCK};
use discscope::{iso9660::Iso9660Reader, DiscImage};

fn canonical_image() -> Vec<u8> {
    let children = vec![record(b"DATA.BIN;1", 30, 8, 0, &[])];
    let mut content = b"raw-data".to_vec();
    content.resize(BLOCK, 0);

    IsoBuilder::new()
        .block(20, dir_block(20, 20, &children))
        .block(30, content)
        .build()
}

fn write_temp(name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = std::env::temp_dir().join(format!("discscope-{}-{name}", std::process::id()));
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(data).unwrap();
    path
}

/// Re-pack 2048-byte sectors into raw 2352-byte mode 1 frames.
fn rawify(image: &[u8]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(image.len() / BLOCK * 2352);
    for sector in image.chunks(BLOCK) {
        let mut frame = vec![0u8; 2352];
        frame[1..11].fill(0xFF);
        frame[15] = 1; // mode 1
        frame[16..16 + sector.len()].copy_from_slice(sector);
        raw.extend_from_slice(&frame);
    }
    raw
}

#[test]
fn raw_frame_image_opens_with_fuzz() {
    let raw = rawify(&canonical_image());
    let path = write_temp("raw.bin", &raw);

    let mut reader = Iso9660Reader::open_fuzzy(&path, 1).unwrap();
    assert_eq!(reader.volume_id(), "TESTDISC");

    let stat = reader.stat("/data.bin").unwrap().unwrap();
    assert_eq!(reader.read_file(&stat).unwrap(), b"raw-data");

    std::fs::remove_file(path).ok();
}

#[test]
fn shifted_image_opens_with_fuzz() {
    let mut shifted = vec![0u8; 300];
    shifted.extend_from_slice(&canonical_image());
    let path = write_temp("shifted.iso", &shifted);

    let mut reader = Iso9660Reader::open_fuzzy(&path, 1).unwrap();
    let stat = reader.stat("/data.bin").unwrap().unwrap();
    assert_eq!(reader.read_file(&stat).unwrap(), b"raw-data");

    std::fs::remove_file(path).ok();
}

#[test]
fn canonical_image_opens_without_fuzz() {
    let path = write_temp("plain.iso", &canonical_image());

    let mut reader = Iso9660Reader::open(&path).unwrap();
    assert_eq!(reader.volume_id(), "TESTDISC");

    std::fs::remove_file(path).ok();
}

#[test]
fn disc_image_open_fuzzy_detects_raw_iso() {
    let raw = rawify(&canonical_image());
    let path = write_temp("raw-auto.bin", &raw);

    let mut image = DiscImage::open_fuzzy(&path, 1).unwrap();
    assert_eq!(image.kind(), discscope::FilesystemKind::Iso9660);
    assert_eq!(image.volume_id(), "TESTDISC");

    std::fs::remove_file(path).ok();
}

#[test]
fn raw_image_without_fuzz_is_rejected() {
    let raw = rawify(&canonical_image());
    let path = write_temp("raw-nofuzz.bin", &raw);

    assert!(matches!(
        Iso9660Reader::open(&path),
        Err(discscope::Error::NotSupported)
    ));

    std::fs::remove_file(path).ok();
}
