use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::{Duration, SystemTime};

use flate2::read::GzDecoder;

use crate::error::KiraError;

pub fn is_fresh(path: &Path, max_age_seconds: u64) -> bool {
    let Ok(modified) = fs::metadata(path).and_then(|meta| meta.modified()) else {
        return false;
    };
    match SystemTime::now().duration_since(modified) {
        Ok(age) => age < Duration::from_secs(max_age_seconds),
        // modified in the future (clock skew)
        Err(_) => max_age_seconds > 0,
    }
}

pub fn write_atomic<F>(path: &Path, write: F) -> Result<(), KiraError>
where
    F: FnOnce(&mut fs::File) -> Result<(), KiraError>,
{
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    let mut temp = tempfile::Builder::new()
        .prefix(".kira-geo")
        .tempfile_in(parent)
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    write(temp.as_file_mut())?;
    temp.persist(path)
        .map_err(|err| KiraError::Filesystem(err.to_string()))?;
    Ok(())
}

pub fn write_bytes_atomic(path: &Path, content: &[u8]) -> Result<(), KiraError> {
    write_atomic(path, |file| {
        std::io::Write::write_all(file, content)
            .map_err(|err| KiraError::Filesystem(err.to_string()))
    })
}

pub fn read_text(path: &Path) -> Result<String, KiraError> {
    let bytes = fs::read(path)
        .map_err(|err| KiraError::Filesystem(format!("read {}: {err}", path.display())))?;
    let bytes = if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut out = Vec::new();
        GzDecoder::new(bytes.as_slice())
            .read_to_end(&mut out)
            .map_err(|err| KiraError::Filesystem(format!("gunzip {}: {err}", path.display())))?;
        out
    } else {
        bytes
    };
    String::from_utf8(bytes)
        .map_err(|err| KiraError::Filesystem(format!("{} is not UTF-8: {err}", path.display())))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;

    use super::*;

    #[test]
    fn missing_file_is_not_fresh() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_fresh(&dir.path().join("GPL570.xml"), 604_800));
    }

    #[test]
    fn new_file_is_fresh_until_max_age() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("GPL570.xml");
        write_bytes_atomic(&path, b"<MINiML/>").unwrap();
        assert!(is_fresh(&path, 604_800));
        assert!(!is_fresh(&path, 0));
    }

    #[test]
    fn reads_plain_and_gzip_text() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("plain.txt");
        write_bytes_atomic(&plain, b"ID_REF\n").unwrap();
        assert_eq!(read_text(&plain).unwrap(), "ID_REF\n");

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"ID_REF\n").unwrap();
        let gz = dir.path().join("matrix.txt.gz");
        write_bytes_atomic(&gz, &encoder.finish().unwrap()).unwrap();
        assert_eq!(read_text(&gz).unwrap(), "ID_REF\n");
    }
}
