//! Mapped file tests

use std::fs;

use memseg_mem::{Error, ErrorKind, MapMode, MemorySegment, ResourceScope};
use tempfile::TempDir;

#[test]
fn test_writes_reach_the_file_after_close() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.bin");
    let scope = ResourceScope::new_confined();
    let seg = MemorySegment::map_file(&path, 0, 64, MapMode::ReadWrite, &scope).unwrap();
    assert!(seg.is_mapped());
    assert!(seg.is_native());
    seg.fill(0x11).unwrap();
    seg.set::<u8>(63, 0x22).unwrap();
    seg.force().unwrap();
    scope.close().unwrap();
    assert!(seg.get::<u8>(0).unwrap_err().is_closed());

    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len(), 64);
    assert!(bytes[..63].iter().all(|&b| b == 0x11));
    assert_eq!(bytes[63], 0x22);
}

#[test]
fn test_read_only_map_at_offset() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ro.bin");
    let contents: Vec<u8> = (0..=255u8).cycle().take(8192).collect();
    fs::write(&path, &contents).unwrap();

    let scope = ResourceScope::new_shared();
    let seg = MemorySegment::map_file(&path, 4096, 4096, MapMode::ReadOnly, &scope).unwrap();
    assert!(seg.is_read_only());
    seg.load().unwrap();
    assert_eq!(seg.get::<u8>(1).unwrap(), 1);
    assert_eq!(seg.to_byte_array().unwrap(), contents[4096..]);
    assert_eq!(seg.set::<u8>(0, 0).unwrap_err().kind(), ErrorKind::Immutability);
    seg.unload().unwrap();
    scope.close().unwrap();
}

#[test]
fn test_read_only_map_past_end_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("short.bin");
    fs::write(&path, [0u8; 16]).unwrap();
    let scope = ResourceScope::new_confined();
    let err = MemorySegment::map_file(&path, 0, 32, MapMode::ReadOnly, &scope).unwrap_err();
    assert!(matches!(err, Error::Io(_)));
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn test_empty_mapping_is_always_resident() {
    let dir = TempDir::new().unwrap();
    let scope = ResourceScope::new_confined();
    let seg =
        MemorySegment::map_file(dir.path().join("never.bin"), 0, 0, MapMode::ReadWrite, &scope)
            .unwrap();
    assert_eq!(seg.byte_size(), 0);
    seg.load().unwrap();
    seg.unload().unwrap();
    seg.force().unwrap();
    assert!(!dir.path().join("never.bin").exists());
}

#[test]
fn test_mapped_slices_share_the_mapping() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("slices.bin");
    let scope = ResourceScope::new_confined();
    let seg = MemorySegment::map_file(&path, 0, 4096 * 3, MapMode::ReadWrite, &scope).unwrap();
    let middle = seg.slice(4096, 4096).unwrap();
    middle.fill(0x7F).unwrap();
    middle.force().unwrap();
    assert_eq!(seg.get::<u8>(4096 + 100).unwrap(), 0x7F);
    assert_eq!(seg.get::<u8>(0).unwrap(), 0);
    assert!(MemorySegment::of_vec(vec![0u8; 8]).force().is_err());
}
