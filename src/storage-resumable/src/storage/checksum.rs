// Copyright 2025 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::error::ChecksumMismatch;
use crate::model::ObjectChecksums;
use bytes::Bytes;

/// Checks the checksums reported by the service against the computed values.
///
/// Only values present on both sides are compared. A `None` CRC32C or an
/// empty MD5 hash means the value was not computed or not reported.
pub fn validate(
    computed: &ObjectChecksums,
    reported: &Option<ObjectChecksums>,
) -> Result<(), ChecksumMismatch> {
    let Some(reported) = reported else {
        return Ok(());
    };
    let crc32c_differs = computed
        .crc32c
        .zip(reported.crc32c)
        .is_some_and(|(c, r)| c != r);
    let md5_differs = !computed.md5_hash.is_empty()
        && !reported.md5_hash.is_empty()
        && computed.md5_hash != reported.md5_hash;
    match (crc32c_differs, md5_differs) {
        (false, false) => Ok(()),
        (true, false) => Err(ChecksumMismatch::Crc32c {
            got: reported.crc32c.unwrap_or_default(),
            want: computed.crc32c.unwrap_or_default(),
        }),
        (false, true) => Err(ChecksumMismatch::Md5 {
            got: reported.md5_hash.clone(),
            want: computed.md5_hash.clone(),
        }),
        (true, true) => Err(ChecksumMismatch::Both {
            got: Box::new(reported.clone()),
            want: Box::new(computed.clone()),
        }),
    }
}

/// Computes the full object checksums for an upload.
///
/// Chunks may be resent after a failure. Only the bytes past the last byte
/// consumed update the checksums, so resends do not change the result. Data
/// that leaves a gap is ignored.
#[derive(Clone)]
pub struct Checksum {
    crc32c: Option<u32>,
    md5: Option<md5::Context>,
    offset: u64,
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Checksum {
    pub fn new(crc32c: bool, md5: bool) -> Self {
        Self {
            crc32c: crc32c.then_some(0),
            md5: md5.then(md5::Context::new),
            offset: 0,
        }
    }

    /// Consumes any data in `[offset, offset + data.len())` not seen before.
    pub fn update(&mut self, offset: u64, data: &Bytes) {
        let end = offset + data.len() as u64;
        if self.offset < offset || self.offset >= end {
            return;
        }
        let fresh = &data[(self.offset - offset) as usize..];
        if let Some(crc) = self.crc32c.as_mut() {
            *crc = crc32c::crc32c_append(*crc, fresh);
        }
        if let Some(ctx) = self.md5.as_mut() {
            ctx.consume(fresh);
        }
        self.offset = end;
    }

    /// The number of contiguous bytes, starting at 0, included in the checksums.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn finalize(&self) -> ObjectChecksums {
        let mut checksums = ObjectChecksums::new();
        if let Some(crc) = self.crc32c {
            checksums = checksums.set_crc32c(crc);
        }
        if let Some(ctx) = &self.md5 {
            let digest = ctx.clone().finalize();
            checksums = checksums.set_md5_hash(Bytes::copy_from_slice(&digest.0));
        }
        checksums
    }
}

impl std::fmt::Debug for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Checksum")
            .field("crc32c", &self.crc32c)
            .field("md5", &self.md5.as_ref().map(|_| "[skipped]"))
            .field("offset", &self.offset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn data() -> bytes::Bytes {
        bytes::Bytes::from_static(b"the quick brown fox jumps over the lazy dog")
    }

    fn both() -> ObjectChecksums {
        ObjectChecksums::new()
            .set_crc32c(0x01020304_u32)
            .set_md5_hash(bytes::Bytes::from_static(b"abc"))
    }

    fn crc32c_only() -> ObjectChecksums {
        ObjectChecksums::new().set_crc32c(0x01020304_u32)
    }

    fn md5_only() -> ObjectChecksums {
        ObjectChecksums::new().set_md5_hash(bytes::Bytes::from_static(b"abc"))
    }

    #[test_case(both(), None)]
    #[test_case(both(), Some(both()))]
    #[test_case(both(), Some(crc32c_only()))]
    #[test_case(both(), Some(md5_only()))]
    #[test_case(crc32c_only(), Some(both()))]
    #[test_case(crc32c_only(), Some(md5_only()))]
    #[test_case(md5_only(), Some(crc32c_only()))]
    fn validate_ok(expected: ObjectChecksums, received: Option<ObjectChecksums>) {
        let compare = validate(&expected, &received);
        assert!(compare.is_ok(), "{compare:?}");
    }

    #[test_case(crc32c_only(), crc32c_only().set_crc32c(0_u32))]
    #[test_case(both(), crc32c_only().set_crc32c(0_u32))]
    fn validate_bad_crc32c(expected: ObjectChecksums, received: ObjectChecksums) {
        let err = validate(&expected, &Some(received)).expect_err("values should not match");
        assert!(matches!(&err, &ChecksumMismatch::Crc32c { .. }), "{err:?}");
    }

    #[test_case(md5_only(), md5_only().set_md5_hash(bytes::Bytes::from_static(b"cde")))]
    #[test_case(both(), md5_only().set_md5_hash(bytes::Bytes::from_static(b"cde")))]
    fn validate_bad_md5(expected: ObjectChecksums, received: ObjectChecksums) {
        let err = validate(&expected, &Some(received)).expect_err("values should not match");
        assert!(matches!(&err, &ChecksumMismatch::Md5 { .. }), "{err:?}");
    }

    #[test]
    fn validate_bad_both() {
        let received = both()
            .set_crc32c(0_u32)
            .set_md5_hash(bytes::Bytes::from_static(b"cde"));
        let err = validate(&both(), &Some(received)).expect_err("values should not match");
        assert!(matches!(&err, &ChecksumMismatch::Both { .. }), "{err:?}");
    }

    #[test]
    fn disabled() {
        let mut engine = Checksum::new(false, false);
        engine.update(0, &data());
        assert_eq!(engine.finalize(), ObjectChecksums::new());
        assert_eq!(engine.offset(), data().len() as u64);
    }

    #[test]
    fn crc32c_and_md5() {
        let mut engine = Checksum::new(true, true);
        engine.update(0, &data());
        let got = engine.finalize();
        assert_eq!(got.crc32c, Some(crc32c::crc32c(&data())));
        let want = md5::compute(data());
        assert_eq!(got.md5_hash.as_ref(), &want.0);
    }

    #[test]
    fn resend_is_ignored() {
        let data = data();
        let mut engine = Checksum::new(true, true);
        engine.update(0, &data.slice(0..10));
        engine.update(0, &data.slice(0..10));
        engine.update(5, &data.slice(5..20));
        engine.update(10, &data.slice(10..));
        engine.update(20, &data.slice(20..));
        assert_eq!(engine.offset(), data.len() as u64);

        let mut want = Checksum::new(true, true);
        want.update(0, &data);
        assert_eq!(engine.finalize(), want.finalize());
    }

    #[test]
    fn gap_is_ignored() {
        let data = data();
        let mut engine = Checksum::default();
        engine.update(10, &data.slice(10..));
        assert_eq!(engine.offset(), 0);
        assert_eq!(engine.finalize().crc32c, Some(0));
    }
}
