//! # Archive Codec Adapter
//!
//! Turns the bytes of one archive into a flat list of leaf [`UploadedEntry`]s.
//! The actual inflating is done by the `zip`, `tar`, `flate2` and `xz2` crates;
//! this module only picks the codec, enumerates members and maps failures onto
//! the crate's error taxonomy:
//!
//! - unknown container, or a container with no loaded codec: [`StitchError::UnsupportedFormat`]
//! - recognized container whose members cannot be enumerated: [`StitchError::ArchiveCorrupt`]
//!
//! Codecs are registered once per [`ArchiveCodec`] through an async gate. The
//! first caller performs the load and every concurrent caller awaits that same
//! load.

mod format;

pub use format::ArchiveFormat;

use crate::common::{prealloc, SharedZip, UploadedEntry};
use crate::error::{Result, StitchError};
use flate2::read::GzDecoder;
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::debug;
use xz2::read::XzDecoder;

/// The set of containers a codec instance can decode once loaded.
#[derive(Debug, Clone)]
pub struct LoadedFormats {
    formats: Vec<ArchiveFormat>,
}

impl LoadedFormats {
    fn builtin() -> Self {
        // RAR needs the proprietary unrar library, so it is recognized but never loaded.
        Self {
            formats: vec![
                ArchiveFormat::Zip,
                ArchiveFormat::Tar,
                ArchiveFormat::TarGz,
                ArchiveFormat::TarXz,
            ],
        }
    }

    pub fn supports(&self, format: ArchiveFormat) -> bool {
        self.formats.contains(&format)
    }

    pub fn formats(&self) -> &[ArchiveFormat] {
        &self.formats
    }
}

/// Decodes archives into entry lists. Cheap to share behind an `Arc`.
#[derive(Debug, Default)]
pub struct ArchiveCodec {
    loaded: OnceCell<LoadedFormats>,
    loads: AtomicUsize,
}

impl ArchiveCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide instance, for callers that do not manage their own.
    pub fn shared() -> Arc<ArchiveCodec> {
        static SHARED: OnceLock<Arc<ArchiveCodec>> = OnceLock::new();
        Arc::clone(SHARED.get_or_init(|| Arc::new(ArchiveCodec::new())))
    }

    /// Waits for the one-time format registration.
    pub async fn ensure_loaded(&self) -> &LoadedFormats {
        self.loaded
            .get_or_init(|| async {
                self.loads.fetch_add(1, Ordering::SeqCst);
                // Let concurrent first callers queue up on the same load.
                tokio::task::yield_now().await;
                let formats = LoadedFormats::builtin();
                debug!(formats = ?formats.formats(), "archive codecs loaded");
                formats
            })
            .await
    }

    /// How many times the format registration actually ran.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Unpacks `archive` into its leaf file entries, in container order.
    ///
    /// Directory members are dropped. Zip members stay compressed until read;
    /// tar members are buffered during the single pass over the stream.
    pub async fn extract_files(&self, archive: &UploadedEntry) -> Result<Vec<UploadedEntry>> {
        let loaded = self.ensure_loaded().await;
        let bytes = archive.read_bytes().await?;
        let path = archive.path().to_string();

        let format = ArchiveFormat::sniff(&bytes)
            .or_else(|| ArchiveFormat::from_name(&path))
            .ok_or_else(|| StitchError::unsupported(&path, "unrecognized container"))?;
        if !loaded.supports(format) {
            return Err(StitchError::unsupported(&path, format!("no {} codec available", format)));
        }

        debug!(archive = %path, %format, size = bytes.len(), "decoding archive");
        let data: Arc<[u8]> = Arc::from(bytes);
        let entries = tokio::task::spawn_blocking(move || decode(format, data, &path)).await??;
        Ok(entries)
    }
}

fn decode(format: ArchiveFormat, data: Arc<[u8]>, path: &str) -> Result<Vec<UploadedEntry>> {
    match format {
        ArchiveFormat::Zip => decode_zip(data, path),
        ArchiveFormat::Tar => decode_tar(Cursor::new(data), path),
        ArchiveFormat::TarGz => decode_tar(GzDecoder::new(Cursor::new(data)), path),
        ArchiveFormat::TarXz => decode_tar(XzDecoder::new(Cursor::new(data)), path),
        ArchiveFormat::Rar => Err(StitchError::unsupported(path, "no rar codec available")),
    }
}

fn decode_zip(data: Arc<[u8]>, path: &str) -> Result<Vec<UploadedEntry>> {
    let mut zip: SharedZip =
        zip::ZipArchive::new(Cursor::new(data)).map_err(|e| StitchError::corrupt(path, e))?;
    let mut entries = Vec::with_capacity(zip.len());
    for index in 0..zip.len() {
        let (name, is_dir) = {
            let member = zip.by_index(index).map_err(|e| StitchError::corrupt(path, e))?;
            (member.name().to_string(), member.is_dir())
        };
        if !is_dir {
            entries.push(UploadedEntry::zip_member(name, zip.clone(), index));
        }
    }
    Ok(entries)
}

fn decode_tar<R: Read>(reader: R, path: &str) -> Result<Vec<UploadedEntry>> {
    let mut tar = tar::Archive::new(reader);
    let mut entries = Vec::new();
    for member in tar.entries().map_err(|e| StitchError::corrupt(path, e))? {
        let mut member = member.map_err(|e| StitchError::corrupt(path, e))?;
        if !member.header().entry_type().is_file() {
            continue;
        }
        let name = member
            .path()
            .map_err(|e| StitchError::corrupt(path, e))?
            .to_string_lossy()
            .replace('\\', "/");
        let name = name.trim_start_matches("./").to_string();
        let mut content = Vec::with_capacity(prealloc(member.size()));
        member.read_to_end(&mut content).map_err(|e| StitchError::corrupt(path, e))?;
        entries.push(UploadedEntry::from_bytes(name, content));
    }
    Ok(entries)
}


#[cfg(test)]
mod tests {
    use super::testutil::*;
    use super::*;

    async fn paths_of(codec: &ArchiveCodec, archive: UploadedEntry) -> Vec<String> {
        codec
            .extract_files(&archive)
            .await
            .unwrap()
            .iter()
            .map(|e| e.path().to_string())
            .collect()
    }

    const FILES: &[(&str, &[u8])] = &[
        ("alice/", b""),
        ("alice/main.py", b"print('a')"),
        ("alice/lib/util.py", b"X = 1"),
    ];

    #[tokio::test]
    async fn zip_lists_leaf_files_only() {
        let codec = ArchiveCodec::new();
        let archive = UploadedEntry::from_bytes("alice.zip", zip_bytes(FILES));
        assert_eq!(paths_of(&codec, archive).await, ["alice/main.py", "alice/lib/util.py"]);
    }

    #[tokio::test]
    async fn zip_members_read_lazily() -> Result<()> {
        let codec = ArchiveCodec::new();
        let archive = UploadedEntry::from_bytes("alice.zip", zip_bytes(FILES));
        let entries = codec.extract_files(&archive).await?;
        assert_eq!(entries[1].read_bytes().await?, b"X = 1");
        assert_eq!(entries[0].read_bytes().await?, b"print('a')");
        Ok(())
    }

    #[tokio::test]
    async fn tar_variants_decode() -> Result<()> {
        let codec = ArchiveCodec::new();
        for (name, bytes) in [
            ("alice.tar", tar_bytes(FILES)),
            ("alice.tar.gz", tar_gz_bytes(FILES)),
            ("alice.tar.xz", tar_xz_bytes(FILES)),
        ] {
            let entries = codec.extract_files(&UploadedEntry::from_bytes(name, bytes)).await?;
            let paths: Vec<_> = entries.iter().map(|e| e.path()).collect();
            assert_eq!(paths, ["alice/main.py", "alice/lib/util.py"], "{name}");
            assert_eq!(entries[0].read_bytes().await?, b"print('a')");
        }
        Ok(())
    }

    #[tokio::test]
    async fn format_comes_from_bytes_not_name() {
        let codec = ArchiveCodec::new();
        let mislabeled = UploadedEntry::from_bytes("alice.tar.gz", zip_bytes(FILES));
        assert_eq!(paths_of(&codec, mislabeled).await.len(), 2);
    }

    #[tokio::test]
    async fn garbage_is_unsupported() {
        let codec = ArchiveCodec::new();
        let archive = UploadedEntry::from_bytes("notes.bin", b"just some text".to_vec());
        let err = codec.extract_files(&archive).await.unwrap_err();
        assert!(matches!(err, StitchError::UnsupportedFormat { .. }), "{err}");
    }

    #[tokio::test]
    async fn rar_is_recognized_but_unsupported() {
        let codec = ArchiveCodec::new();
        let archive = UploadedEntry::from_bytes("alice.rar", b"Rar!\x1A\x07\x01\x00rest".to_vec());
        match codec.extract_files(&archive).await {
            Err(StitchError::UnsupportedFormat { detail, .. }) => assert!(detail.contains("rar")),
            other => panic!("expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn truncated_zip_is_corrupt() {
        let codec = ArchiveCodec::new();
        let mut bytes = zip_bytes(FILES);
        bytes.truncate(bytes.len() / 2);
        let entry = UploadedEntry::from_bytes("alice.zip", bytes);
        let err = codec.extract_files(&entry).await.unwrap_err();
        assert!(matches!(err, StitchError::ArchiveCorrupt { .. }), "{err}");
    }

    #[tokio::test]
    async fn truncated_tar_header_is_corrupt() {
        let codec = ArchiveCodec::new();
        let mut bytes = tar_bytes(FILES);
        bytes.truncate(300);
        let entry = UploadedEntry::from_bytes("alice.tar", bytes);
        let err = codec.extract_files(&entry).await.unwrap_err();
        assert!(matches!(err, StitchError::ArchiveCorrupt { .. }), "{err}");
    }

    #[tokio::test]
    async fn absurd_tar_member_size_is_corrupt() {
        let codec = ArchiveCodec::new();
        let mut header = tar::Header::new_gnu();
        header.set_path("huge.py").unwrap();
        header.set_size(1 << 60);
        header.set_mode(0o644);
        header.set_cksum();
        let mut bytes = header.as_bytes().to_vec();
        bytes.extend_from_slice(&[0u8; 1024]);

        let archive = UploadedEntry::from_bytes("huge.tar", bytes);
        let err = codec.extract_files(&archive).await.unwrap_err();
        assert!(matches!(err, StitchError::ArchiveCorrupt { .. }), "{err}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn zip_members_read_concurrently_from_one_listing() -> Result<()> {
        let codec = ArchiveCodec::new();
        let files: Vec<(String, Vec<u8>)> =
            (0..32).map(|i| (format!("f{i}.py"), format!("x = {i}").into_bytes())).collect();
        let refs: Vec<(&str, &[u8])> =
            files.iter().map(|(n, c)| (n.as_str(), c.as_slice())).collect();
        let archive = UploadedEntry::from_bytes("many.zip", zip_bytes(&refs));

        let entries = codec.extract_files(&archive).await?;
        let reads: Vec<_> = entries
            .into_iter()
            .map(|e| tokio::spawn(async move { e.read_bytes().await }))
            .collect();
        for (i, read) in reads.into_iter().enumerate() {
            assert_eq!(read.await??, format!("x = {i}").into_bytes());
        }
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_callers_share_one_load() {
        let codec = Arc::new(ArchiveCodec::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let codec = Arc::clone(&codec);
            handles.push(tokio::spawn(async move {
                codec.ensure_loaded().await.supports(ArchiveFormat::Zip)
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap());
        }
        assert_eq!(codec.load_count(), 1);
    }

    #[tokio::test]
    async fn shared_codec_is_one_instance() {
        assert!(Arc::ptr_eq(&ArchiveCodec::shared(), &ArchiveCodec::shared()));
    }
}
