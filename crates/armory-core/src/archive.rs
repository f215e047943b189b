//! Reading individual files out of a package `.tar.gz`.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use armory_schema::manifest::clean_relative_path;
use flate2::read::GzDecoder;

use crate::error::ArmoryError;

/// Read the file at `inner` from the gzipped tarball at `archive`.
///
/// Entry paths are compared after normalization, so `./alias.json` matches
/// `alias.json`. Entries that would escape the archive root never match.
///
/// # Errors
///
/// Returns [`ArmoryError::Archive`] if `inner` is not a clean relative path,
/// is missing, or is empty, and [`ArmoryError::Io`] on read failures.
pub fn read_file_from_tar_gz(archive: &Path, inner: &str) -> Result<Vec<u8>, ArmoryError> {
    let wanted = clean_relative_path(inner)
        .ok_or_else(|| ArmoryError::Archive(format!("invalid path '{inner}' in manifest")))?;

    let mut tar = tar::Archive::new(GzDecoder::new(File::open(archive)?));
    for entry in tar.entries()? {
        let mut entry = entry?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry.path()?.to_string_lossy().into_owned();
        if clean_relative_path(&path).as_deref() != Some(wanted.as_str()) {
            continue;
        }
        let mut data = Vec::new();
        entry.read_to_end(&mut data)?;
        if data.is_empty() {
            return Err(ArmoryError::Archive(format!("'{wanted}' is empty")));
        }
        return Ok(data);
    }
    Err(ArmoryError::Archive(format!("'{wanted}' not found in archive")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::tar_gz;
    use tempfile::NamedTempFile;

    fn archive(files: &[(&str, &[u8])]) -> NamedTempFile {
        let tmp = NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), tar_gz(files)).unwrap();
        tmp
    }

    #[test]
    fn test_reads_normalized_path() {
        let tmp = archive(&[("./alias.json", b"{}"), ("bin/tool.exe", b"MZ")]);
        assert_eq!(read_file_from_tar_gz(tmp.path(), "alias.json").unwrap(), b"{}");
        assert_eq!(
            read_file_from_tar_gz(tmp.path(), "./bin/tool.exe").unwrap(),
            b"MZ"
        );
    }

    #[test]
    fn test_missing_and_empty_files() {
        let tmp = archive(&[("empty.dll", b"")]);
        let missing = read_file_from_tar_gz(tmp.path(), "other.dll").unwrap_err();
        assert!(matches!(missing, ArmoryError::Archive(msg) if msg.contains("not found")));
        let empty = read_file_from_tar_gz(tmp.path(), "empty.dll").unwrap_err();
        assert!(matches!(empty, ArmoryError::Archive(msg) if msg.contains("empty")));
    }

    #[test]
    fn test_escaping_path_stays_inside_archive() {
        let tmp = archive(&[("a.txt", b"x")]);
        assert!(matches!(
            read_file_from_tar_gz(tmp.path(), "../etc/passwd"),
            Err(ArmoryError::Archive(_))
        ));
    }
}
