//! Container format identification.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// The archive containers the pipeline knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarXz,
    Rar,
}

/// Tarballs renamed by course-site downloads, e.g. `sub.tar+1.gz`.
fn renamed_tarball() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\.tar(\+\d+)*\.?(?P<kind>gz|xz|)$").expect("valid tarball pattern")
    })
}

impl ArchiveFormat {
    /// Identifies a container by its leading bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        match bytes {
            b if b.starts_with(b"PK\x03\x04") || b.starts_with(b"PK\x05\x06") => {
                Some(ArchiveFormat::Zip)
            }
            b if b.starts_with(b"\x1F\x8B") => Some(ArchiveFormat::TarGz),
            b if b.starts_with(b"\xFD7zXZ\x00") => Some(ArchiveFormat::TarXz),
            b if b.starts_with(b"Rar!\x1A\x07") => Some(ArchiveFormat::Rar),
            b if b.len() >= 262 && &b[257..262] == b"ustar" => Some(ArchiveFormat::Tar),
            _ => None,
        }
    }

    /// Identifies a container by its name. Used when the bytes are not conclusive
    /// (pre-POSIX tarballs carry no magic).
    pub fn from_name(name: &str) -> Option<Self> {
        if name.ends_with(".zip") {
            return Some(ArchiveFormat::Zip);
        }
        if name.ends_with(".rar") {
            return Some(ArchiveFormat::Rar);
        }
        if name.ends_with(".tgz") {
            return Some(ArchiveFormat::TarGz);
        }
        let caps = renamed_tarball().captures(name)?;
        match caps.name("kind").map(|m| m.as_str()) {
            Some("gz") => Some(ArchiveFormat::TarGz),
            Some("xz") => Some(ArchiveFormat::TarXz),
            _ => Some(ArchiveFormat::Tar),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::Tar => "tar",
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::TarXz => "tar.xz",
            ArchiveFormat::Rar => "rar",
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_magic_bytes() {
        assert_eq!(ArchiveFormat::sniff(b"PK\x03\x04rest"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::sniff(b"PK\x05\x06"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::sniff(&[0x1F, 0x8B, 0x08]), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::sniff(b"\xFD7zXZ\x00\x00"), Some(ArchiveFormat::TarXz));
        assert_eq!(ArchiveFormat::sniff(b"Rar!\x1A\x07\x00"), Some(ArchiveFormat::Rar));
        assert_eq!(ArchiveFormat::sniff(b"print('hi')"), None);
        assert_eq!(ArchiveFormat::sniff(b""), None);

        let mut tar_header = vec![0u8; 512];
        tar_header[257..262].copy_from_slice(b"ustar");
        assert_eq!(ArchiveFormat::sniff(&tar_header), Some(ArchiveFormat::Tar));
    }

    #[test]
    fn names_including_renamed_tarballs() {
        assert_eq!(ArchiveFormat::from_name("a.zip"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_name("a.tar"), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::from_name("a.tar.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_name("a.tgz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_name("a.tar.xz"), Some(ArchiveFormat::TarXz));
        assert_eq!(ArchiveFormat::from_name("a.tar+1.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_name("a.tar+2+13.xz"), Some(ArchiveFormat::TarXz));
        assert_eq!(ArchiveFormat::from_name("a.tar+1"), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::from_name("a.rar"), Some(ArchiveFormat::Rar));
        assert_eq!(ArchiveFormat::from_name("avatar.py"), None);
        assert_eq!(ArchiveFormat::from_name("notes.gz"), None);
    }
}
