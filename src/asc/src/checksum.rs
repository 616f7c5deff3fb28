// Copyright 2026 The asc-rs Authors
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

//! MD5 checksums of upload source files.
//!
//! The composite checksum splits the file in fixed-size chunks, computes the
//! MD5 digest of each chunk, then the MD5 digest of the concatenated
//! (binary) digests. The hex encoding is suffixed with `-N`, where `N` is the
//! number of chunks.

use crate::model::{Checksum, Checksums, MD5, UploadOperation};
use gax::Result;
use gax::error::Error;
use std::path::Path;
use tokio::io::AsyncReadExt;

/// The chunk size for composite checksums when the operations do not imply
/// one.
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// The checksums computed for a file.
#[derive(Clone, Debug, PartialEq)]
pub struct ComputedChecksums {
    pub file: String,
    pub composite: String,
}

/// Computes the whole-file and composite checksums in a single pass.
pub async fn compute(path: &Path, chunk_size: u64) -> Result<ComputedChecksums> {
    if chunk_size == 0 {
        return Err(Error::usage("checksum chunk size must be greater than 0"));
    }
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| file_error(path, e))?;
    let mut whole = md5::Context::new();
    let mut chunk = md5::Context::new();
    let mut chunk_len = 0_u64;
    let mut digests = Vec::new();
    let mut buffer = vec![0_u8; READ_BUFFER_SIZE];
    loop {
        let n = file
            .read(&mut buffer)
            .await
            .map_err(|e| file_error(path, e))?;
        if n == 0 {
            break;
        }
        whole.consume(&buffer[..n]);
        let mut rest = &buffer[..n];
        while !rest.is_empty() {
            let room = (chunk_size - chunk_len).min(rest.len() as u64) as usize;
            chunk.consume(&rest[..room]);
            chunk_len += room as u64;
            rest = &rest[room..];
            if chunk_len == chunk_size {
                let done = std::mem::replace(&mut chunk, md5::Context::new());
                digests.extend_from_slice(&done.finalize().0);
                chunk_len = 0;
            }
        }
        tokio::task::yield_now().await;
    }
    if chunk_len > 0 {
        digests.extend_from_slice(&chunk.finalize().0);
    }
    let count = digests.len() / 16;
    Ok(ComputedChecksums {
        file: format!("{:x}", whole.finalize()),
        composite: format!("{:x}-{count}", md5::compute(&digests)),
    })
}

/// Returns the part size implied by the upload operations.
///
/// That is, the length of the first operation when all operations carry a
/// part number and all but the last have the same length.
pub fn part_size(operations: &[UploadOperation]) -> Option<u64> {
    let (last, init) = operations.split_last()?;
    if operations.iter().any(|o| o.part_number.is_none()) {
        return None;
    }
    let size = operations.first()?.length;
    if size == 0 || init.iter().any(|o| o.length != size) || last.length > size {
        return None;
    }
    Some(size)
}

/// Verifies `path` against the expected checksums.
///
/// Only the checksums present in `expected` are compared. Returns the
/// verified checksums, suitable for the commit request.
pub async fn verify(path: &Path, expected: &Checksums, chunk_size: u64) -> Result<Checksums> {
    for c in [&expected.file, &expected.composite].into_iter().flatten() {
        if let Some(algorithm) = c.algorithm.as_deref() {
            if !algorithm.trim().eq_ignore_ascii_case(MD5) {
                return Err(Error::usage(format!(
                    "unsupported checksum algorithm {algorithm:?}"
                )));
            }
        }
    }
    let computed = compute(path, chunk_size).await?;
    let check = |name: &str, want: &Option<Checksum>, got: &str| -> Result<Option<Checksum>> {
        let Some(want) = want else {
            return Ok(None);
        };
        if !want.hash.trim().eq_ignore_ascii_case(got) {
            return Err(Error::checksum_mismatch(name, want.hash.trim(), got));
        }
        Ok(Some(Checksum::md5(got)))
    };
    Ok(Checksums {
        file: check("file", &expected.file, &computed.file)?,
        composite: check("composite", &expected.composite, &computed.composite)?,
    })
}

pub(crate) fn file_error(path: &Path, e: std::io::Error) -> Error {
    Error::usage(format!("cannot read {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use test_case::test_case;

    fn source(content: &[u8]) -> anyhow::Result<NamedTempFile> {
        let mut file = NamedTempFile::new()?;
        file.write_all(content)?;
        file.flush()?;
        Ok(file)
    }

    fn expected_composite(content: &[u8], chunk: usize) -> String {
        let digests: Vec<u8> = content
            .chunks(chunk)
            .flat_map(|c| md5::compute(c).0)
            .collect();
        format!(
            "{:x}-{}",
            md5::compute(&digests),
            content.chunks(chunk).count()
        )
    }

    #[test_case(1)]
    #[test_case(3)]
    #[test_case(4)]
    #[test_case(1000)]
    #[tokio::test]
    async fn composite(chunk: usize) -> anyhow::Result<()> {
        let content = b"ABABABABABAB";
        let file = source(content)?;
        let got = compute(file.path(), chunk as u64).await?;
        assert_eq!(got.file, format!("{:x}", md5::compute(content)));
        assert_eq!(got.composite, expected_composite(content, chunk));
        Ok(())
    }

    #[tokio::test]
    async fn composite_spans_read_buffers() -> anyhow::Result<()> {
        let content = b"AB".repeat(READ_BUFFER_SIZE + 17);
        let file = source(&content)?;
        let chunk = READ_BUFFER_SIZE / 2 + 3;
        let got = compute(file.path(), chunk as u64).await?;
        assert_eq!(got.composite, expected_composite(&content, chunk));
        Ok(())
    }

    #[tokio::test]
    async fn zero_chunk_size() -> anyhow::Result<()> {
        let file = source(b"abc")?;
        let err = compute(file.path(), 0).await.unwrap_err();
        assert!(err.is_usage(), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn missing_file() {
        let err = compute(Path::new("/does/not/exist.ipa"), 10)
            .await
            .unwrap_err();
        assert!(err.is_usage(), "{err:?}");
        assert!(err.to_string().contains("/does/not/exist.ipa"), "{err}");
    }

    #[tokio::test]
    async fn verify_success() -> anyhow::Result<()> {
        let content = b"hello world";
        let file = source(content)?;
        let expected = Checksums {
            file: Some(Checksum::md5(format!("{:X}", md5::compute(content)))),
            composite: None,
        };
        let got = verify(file.path(), &expected, 4).await?;
        assert_eq!(
            got.file,
            Some(Checksum::md5(format!("{:x}", md5::compute(content))))
        );
        assert_eq!(got.composite, None);
        Ok(())
    }

    #[tokio::test]
    async fn verify_mismatch() -> anyhow::Result<()> {
        let file = source(b"hello world")?;
        let expected = Checksums {
            file: None,
            composite: Some(Checksum::md5("0123-1")),
        };
        let err = verify(file.path(), &expected, 4).await.unwrap_err();
        assert!(err.is_checksum_mismatch(), "{err:?}");
        assert!(err.to_string().starts_with("composite checksum mismatch"), "{err}");
        Ok(())
    }

    #[tokio::test]
    async fn verify_unsupported_algorithm() -> anyhow::Result<()> {
        let file = source(b"hello world")?;
        let expected = Checksums {
            file: Some(Checksum {
                hash: "abc".into(),
                algorithm: Some("SHA_256".into()),
            }),
            composite: None,
        };
        let err = verify(file.path(), &expected, 4).await.unwrap_err();
        assert!(err.is_usage(), "{err:?}");
        Ok(())
    }

    fn op(offset: u64, length: u64, part: Option<u32>) -> UploadOperation {
        UploadOperation {
            method: "PUT".into(),
            url: "https://example.com".into(),
            offset,
            length,
            part_number: part,
            ..Default::default()
        }
    }

    #[test]
    fn part_sizes() {
        assert_eq!(part_size(&[]), None);
        assert_eq!(part_size(&[op(0, 10, Some(1))]), Some(10));
        assert_eq!(
            part_size(&[op(0, 10, Some(1)), op(10, 10, Some(2)), op(20, 3, Some(3))]),
            Some(10)
        );
        assert_eq!(part_size(&[op(0, 10, Some(1)), op(10, 7, None)]), None);
        assert_eq!(
            part_size(&[op(0, 10, Some(1)), op(10, 8, Some(2)), op(18, 10, Some(3))]),
            None
        );
        assert_eq!(part_size(&[op(0, 10, Some(1)), op(10, 12, Some(2))]), None);
    }
}
