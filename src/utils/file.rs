//! Input reading helpers for the CLI.

use std::fs;
use std::io::Read;
use std::path::Path;

/// Read text from a file, enforcing a byte-size limit.
pub fn read_file_content(path: &Path, max_size: u64) -> std::io::Result<String> {
    let metadata = fs::metadata(path)?;

    if metadata.len() > max_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "file exceeds maximum size: {} > {}",
                metadata.len(),
                max_size
            ),
        ));
    }

    fs::read_to_string(path)
}

/// Read text from stdin, enforcing a byte-size limit.
pub fn read_stdin(max_size: u64) -> std::io::Result<String> {
    let mut buffer = String::new();
    std::io::stdin()
        .take(max_size + 1)
        .read_to_string(&mut buffer)?;

    if buffer.len() as u64 > max_size {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("stdin input exceeds maximum size: {}", max_size),
        ));
    }

    Ok(buffer)
}

/// Read input text from a file path, or from stdin when no path is given.
pub fn read_input(path: Option<&Path>, max_size: u64) -> std::io::Result<String> {
    match path {
        Some(path) => read_file_content(path, max_size),
        None => read_stdin(max_size),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_file_content() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hello").unwrap();
        let content = read_file_content(file.path(), 1024).unwrap();
        assert_eq!(content, "hello\n");
    }

    #[test]
    fn test_read_file_content_too_large() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", "x".repeat(100)).unwrap();
        let result = read_file_content(file.path(), 10);
        assert!(result.is_err());
    }
}
