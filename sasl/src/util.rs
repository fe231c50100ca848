use md5::{Digest, Md5};

pub(crate) fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

pub(crate) fn random_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    getrandom::getrandom(&mut buf).expect("system RNG must be available");
    buf
}

/// `cnonce = MD5hex(random)`, as used by both the SCRAM-SHA-1 and
/// DIGEST-MD5 mechanisms.
pub(crate) fn make_cnonce() -> String {
    let random = random_bytes(16);
    let digest = Md5::digest(&random);
    to_hex(&digest)
}
