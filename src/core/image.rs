use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One candidate file found by the catalog.
///
/// Created with `size: None`; the fingerprint adapter fills in the size and
/// pixel dimensions once the file has been opened and decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    pub name: String,
    pub path: PathBuf,
    pub directory: PathBuf,
    pub size: Option<u64>,
    pub width: u32,
    pub height: u32,
}

impl ImageDescriptor {
    /// Descriptor for a path found on disk. The path is kept byte-exact;
    /// `name` is its file name made printable for logs and the audit record.
    pub fn from_path(directory: &Path, path: PathBuf) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            name,
            path,
            directory: directory.to_path_buf(),
            size: None,
            width: 0,
            height: 0,
        }
    }

    /// Byte size used for ranking. Unmeasured descriptors rank as empty files.
    pub fn measured_size(&self) -> u64 {
        self.size.unwrap_or_default()
    }

    pub fn is_measured(&self) -> bool {
        self.size.is_some()
    }
}

/// Opaque perceptual fingerprint. Only equality is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Fingerprint {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_descriptor_is_unmeasured() {
        let input = Path::new("input");
        let descriptor = ImageDescriptor::from_path(input, input.join("cat.jpg"));

        assert_eq!(descriptor.name, "cat.jpg");
        assert_eq!(descriptor.path, Path::new("input").join("cat.jpg"));
        assert_eq!(descriptor.directory, PathBuf::from("input"));
        assert!(!descriptor.is_measured());
        assert_eq!(descriptor.measured_size(), 0);
        assert_eq!((descriptor.width, descriptor.height), (0, 0));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_from_path_keeps_raw_bytes() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let raw = Path::new("input").join(OsStr::from_bytes(b"\xffcat.jpg"));
        let descriptor = ImageDescriptor::from_path(Path::new("input"), raw.clone());

        assert_eq!(descriptor.path, raw);
        assert_eq!(descriptor.name, "\u{FFFD}cat.jpg");
    }

    #[test]
    fn test_fingerprint_equality_is_textual() {
        assert_eq!(Fingerprint::from("abc"), Fingerprint("abc".to_string()));
        assert_ne!(Fingerprint::from("abc"), Fingerprint::from("abd"));
        assert_eq!(Fingerprint::from("abc").to_string(), "abc");
    }
}
