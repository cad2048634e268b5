use std::io::{Cursor, Read};
use std::sync::atomic::AtomicBool;

use dvdkit::Error;
use dvdkit::crypto::{DigestDescriptor, KeyDescriptor, Range};
use dvdkit::extract::{ExtractOptions, extract_all, extract_with};
use dvdkit::formats::bdf3::Bdf3Reader;
use dvdkit::formats::bhd5::{FileEntry, FormatVersion, HeaderIndex};

const KEY: [u8; 16] = *b"sixteen byte key";

/// A blob with three files, the header index describing them, and the
/// plaintext of each file in index order.
fn fixture() -> (Vec<u8>, HeaderIndex, Vec<Vec<u8>>) {
    let mut blob = b"BDF3".to_vec();
    blob.resize(0x10, 0);

    let mut index = HeaderIndex::with_bucket_count(FormatVersion::V3, false, Some("s".into()), 2);
    let mut plains = Vec::new();

    // Hash 2 → bucket 0: hashed and partially encrypted.
    let plain: Vec<u8> = (0..64u8).collect();
    let mut entry = FileEntry::new(2, 64, blob.len() as i64);
    entry.unpadded_size = Some(60);
    entry.digest = Some(DigestDescriptor::compute(vec![Range::new(0, 60)], &plain).unwrap());
    entry.key = Some(KeyDescriptor::new(KEY, vec![Range::new(16, 48)]));
    let mut stored = plain.clone();
    entry.key.as_ref().unwrap().encrypt(&mut stored).unwrap();
    blob.extend_from_slice(&stored);
    index.insert(entry).unwrap();
    plains.push(plain);

    // Hash 4 → bucket 0: plain, with a digest that does not match.
    let plain = vec![0xEE; 32];
    let mut entry = FileEntry::new(4, 32, blob.len() as i64);
    entry.unpadded_size = Some(32);
    entry.digest = Some(DigestDescriptor::new([0; 32], vec![Range::new(0, 32)]));
    blob.extend_from_slice(&plain);
    index.insert(entry).unwrap();
    plains.push(plain);

    // Hash 1 → bucket 1: key range runs past the stored size.
    let plain = vec![0x10; 16];
    let mut entry = FileEntry::new(1, 16, blob.len() as i64);
    entry.unpadded_size = Some(16);
    entry.key = Some(KeyDescriptor::new(KEY, vec![Range::new(0, 32)]));
    blob.extend_from_slice(&plain);
    index.insert(entry).unwrap();
    plains.push(plain);

    (blob, index, plains)
}

#[test]
fn read_and_decrypt_restores_plaintext() {
    let (blob, index, plains) = fixture();
    let mut reader = Bdf3Reader::new(Cursor::new(&blob)).unwrap();
    let entry = index.lookup(2).unwrap();

    let bytes = reader.read_and_decrypt(entry).unwrap();
    assert_eq!(bytes.len(), 64);
    assert_eq!(bytes, plains[0]);
    assert!(entry.verify(&bytes).unwrap());
}

#[test]
fn entry_reads_directly_from_blob() {
    let (blob, index, plains) = fixture();
    let bytes = index
        .lookup(2)
        .unwrap()
        .read_and_decrypt(&mut Cursor::new(&blob))
        .unwrap();
    assert_eq!(bytes, plains[0]);
}

#[test]
fn read_file_is_raw_and_bounded() {
    let (blob, index, _) = fixture();
    let mut reader = Bdf3Reader::new(Cursor::new(&blob)).unwrap();
    let entry = index.lookup(2).unwrap();

    let mut raw = Vec::new();
    reader.read_file(entry).unwrap().read_to_end(&mut raw).unwrap();
    let start = entry.offset as usize;
    assert_eq!(raw, &blob[start..start + 64]);
}

#[test]
fn bad_blob_signature() {
    let err = Bdf3Reader::new(Cursor::new(b"BHD5....".to_vec())).err().unwrap();
    assert!(matches!(err, Error::BadMagic));
}

#[test]
fn verified_read_reports_mismatch() {
    let (blob, index, _) = fixture();
    let mut reader = Bdf3Reader::new(Cursor::new(&blob)).unwrap();
    let err = reader.read_verified(index.lookup(4).unwrap()).unwrap_err();
    assert!(matches!(err, Error::Integrity { name_hash: 4 }));

    // The same entry reads fine when verification is not requested.
    assert!(reader.read_and_decrypt(index.lookup(4).unwrap()).is_ok());
}

#[test]
fn stored_data_past_blob_end_is_truncated() {
    let (blob, _, _) = fixture();
    let mut reader = Bdf3Reader::new(Cursor::new(&blob)).unwrap();
    let entry = FileEntry::new(9, 64, blob.len() as i64 - 8);
    assert!(matches!(
        reader.read_and_decrypt(&entry),
        Err(Error::Truncated)
    ));
}

#[test]
fn batch_failures_stay_scoped_to_their_file() {
    let (blob, index, plains) = fixture();
    let cancel = AtomicBool::new(false);
    let results = extract_all(
        &index,
        || Bdf3Reader::new(Cursor::new(blob.clone())),
        ExtractOptions { verify: true },
        &cancel,
    )
    .unwrap();

    let hashes: Vec<u32> = results.iter().map(|r| r.name_hash).collect();
    assert_eq!(hashes, vec![2, 4, 1]);

    assert_eq!(results[0].result.as_ref().unwrap(), &plains[0]);
    assert!(matches!(
        results[1].result,
        Err(Error::Integrity { name_hash: 4 })
    ));
    assert!(matches!(results[2].result, Err(Error::InvalidRange { .. })));
}

#[test]
fn batch_without_verification() {
    let (blob, index, plains) = fixture();
    let mut reader = Bdf3Reader::new(Cursor::new(&blob)).unwrap();
    let results = extract_with(
        &mut reader,
        &index,
        ExtractOptions::default(),
        &AtomicBool::new(false),
    );
    assert_eq!(results[1].result.as_ref().unwrap(), &plains[1]);
    assert!(results[2].result.is_err());
}

#[test]
fn cancelled_batch_starts_no_files() {
    let (blob, index, _) = fixture();
    let cancel = AtomicBool::new(true);
    let results = extract_all(
        &index,
        || Bdf3Reader::new(Cursor::new(blob.clone())),
        ExtractOptions::default(),
        &cancel,
    )
    .unwrap();
    assert_eq!(results.len(), 3);
    assert!(
        results
            .iter()
            .all(|r| matches!(r.result, Err(Error::Cancelled)))
    );
}

#[test]
fn batch_fails_fast_on_bad_blob() {
    let (_, index, _) = fixture();
    let result = extract_all(
        &index,
        || Bdf3Reader::new(Cursor::new(vec![0u8; 4])),
        ExtractOptions::default(),
        &AtomicBool::new(false),
    );
    assert!(matches!(result, Err(Error::BadMagic)));
}
