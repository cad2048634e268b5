use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use sha2::{Digest, Sha256};

use dvdkit::Error;
use dvdkit::crypto::digest::hash_ranges;
use dvdkit::crypto::key::decrypt_ranges;
use dvdkit::crypto::{DigestDescriptor, KeyDescriptor, Range};

fn ecb_encrypt(key: [u8; 16], block: [u8; 16]) -> [u8; 16] {
    let cipher = Aes128::new(&GenericArray::from(key));
    let mut block = GenericArray::from(block);
    cipher.encrypt_block(&mut block);
    block.into()
}

#[test]
fn scenario_b_decrypts_only_the_declared_range() {
    let key = KeyDescriptor::new([0; 16], vec![Range::new(0, 16)]);
    let mut buf = ecb_encrypt([0; 16], [0x41; 16]).to_vec();
    buf.extend_from_slice(&[0x42; 16]);

    key.decrypt(&mut buf).unwrap();

    assert_eq!(&buf[..16], &[0x41; 16]);
    assert_eq!(&buf[16..], &[0x42; 16]);
}

#[test]
fn full_tiling_round_trip() {
    let plain: Vec<u8> = (0..96u8).collect();
    let key = KeyDescriptor::new(
        *b"0123456789abcdef",
        vec![Range::new(0, 32), Range::new(32, 48), Range::new(48, 96)],
    );

    let mut buf = plain.clone();
    key.encrypt(&mut buf).unwrap();
    assert_ne!(buf, plain);
    key.decrypt(&mut buf).unwrap();
    assert_eq!(buf, plain);
}

#[test]
fn encrypt_matches_reference_ecb() {
    let key = [7u8; 16];
    let desc = KeyDescriptor::new(key, vec![Range::new(16, 32)]);
    let mut buf = [0x33u8; 48];
    desc.encrypt(&mut buf).unwrap();

    assert_eq!(&buf[..16], &[0x33; 16]);
    assert_eq!(buf[16..32], ecb_encrypt(key, [0x33; 16]));
    assert_eq!(&buf[32..], &[0x33; 16]);
}

#[test]
fn sentinel_ranges_never_mutate() {
    let key = KeyDescriptor::new(
        [1; 16],
        vec![
            Range::new(16, 16),
            Range::new(-1, 16),
            Range::new(0, -1),
            Range::new(-1, -1),
        ],
    );
    let mut buf = [0x5Au8; 32];
    key.decrypt(&mut buf).unwrap();
    assert_eq!(buf, [0x5A; 32]);
}

#[test]
fn out_of_bounds_range_is_rejected_without_mutation() {
    let key = KeyDescriptor::new([0; 16], vec![Range::new(0, 16), Range::new(16, 48)]);
    let mut buf = [0x11u8; 32];
    let err = key.decrypt(&mut buf).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidRange {
            start: 16,
            end: 48,
            len: 32
        }
    ));
    assert_eq!(buf, [0x11; 32]);
}

#[test]
fn unaligned_range_is_rejected() {
    let mut buf = [0u8; 32];
    let err = decrypt_ranges(&[0; 16], &[Range::new(0, 20)], &mut buf).unwrap_err();
    assert!(matches!(err, Error::InvalidRange { .. }));

    let err = decrypt_ranges(&[0; 16], &[Range::new(20, 4)], &mut buf).unwrap_err();
    assert!(matches!(err, Error::InvalidRange { .. }));
}

#[test]
fn digest_covers_only_listed_ranges() {
    let buf: Vec<u8> = (0..64u8).collect();
    let ranges = vec![Range::new(0, 8), Range::new(8, 8), Range::new(32, 40)];
    let digest = DigestDescriptor::compute(ranges, &buf).unwrap();

    let mut expected = Sha256::new();
    expected.update(&buf[0..8]);
    expected.update(&buf[32..40]);
    let expected: [u8; 32] = expected.finalize().into();
    assert_eq!(digest.hash, expected);

    // Bytes outside the ranges do not matter.
    let mut other = buf.clone();
    other[20] ^= 0xFF;
    assert!(digest.matches(&other).unwrap());

    other[33] ^= 0xFF;
    assert!(!digest.matches(&other).unwrap());
}

#[test]
fn sentinel_ranges_contribute_nothing_to_hash() {
    let buf = [9u8; 16];
    let with_sentinels = hash_ranges(
        &[Range::new(-1, 4), Range::new(0, 16), Range::new(3, 3)],
        &buf,
    )
    .unwrap();
    let plain = hash_ranges(&[Range::new(0, 16)], &buf).unwrap();
    assert_eq!(with_sentinels, plain);
}

#[test]
fn digest_range_past_end_is_an_error() {
    let digest = DigestDescriptor::new([0; 32], vec![Range::new(0, 17)]);
    assert!(matches!(
        digest.matches(&[0; 16]),
        Err(Error::InvalidRange { .. })
    ));
}

#[test]
fn descriptor_records_round_trip() {
    let key = KeyDescriptor::new([3; 16], vec![Range::new(0, 16), Range::new(-1, -1)]);
    for big_endian in [false, true] {
        let bytes = key.serialize(big_endian).unwrap();
        assert_eq!(bytes.len(), 16 + 4 + 2 * 16);
        let parsed = KeyDescriptor::parse(&mut bytes.as_slice(), big_endian).unwrap();
        assert_eq!(parsed, key);
    }

    let digest = DigestDescriptor::new([4; 32], vec![Range::new(0, 0x1000)]);
    let bytes = digest.serialize(true).unwrap();
    assert_eq!(&bytes[32..36], &[0, 0, 0, 1]);
    let parsed = DigestDescriptor::parse(&mut bytes.as_slice(), true).unwrap();
    assert_eq!(parsed, digest);
}

#[test]
fn decrypt_from_many_threads() {
    let plain = [0x77u8; 64];
    let handles: Vec<_> = (0..8u8)
        .map(|i| {
            std::thread::spawn(move || {
                let key = KeyDescriptor::new([i; 16], vec![Range::new(0, 64)]);
                let mut buf = plain;
                key.encrypt(&mut buf).unwrap();
                key.decrypt(&mut buf).unwrap();
                buf
            })
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), plain);
    }
}
