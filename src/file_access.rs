use std::fs::File;
use std::io::{self, BufRead, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::ParseError;

const REVERSE_BLOCK_SIZE: usize = 8 * 1024;

/// Open a file for reading, mapping failures to [`ParseError::Unreadable`].
pub fn open(path: &Path) -> Result<File, ParseError> {
    let file = File::open(path).map_err(|e| ParseError::unreadable(path, e))?;
    let metadata = file.metadata().map_err(|e| ParseError::unreadable(path, e))?;
    if metadata.is_dir() {
        return Err(ParseError::unreadable(
            path,
            io::Error::new(io::ErrorKind::Other, "is a directory"),
        ));
    }
    Ok(file)
}

fn trim_line_ending(bytes: &mut Vec<u8>) {
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
    }
    if bytes.last() == Some(&b'\r') {
        bytes.pop();
    }
}

/// Line iterator that never fails on invalid UTF-8; bad bytes become U+FFFD.
pub struct LossyLines<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R: BufRead> LossyLines<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buffer.clear();
        match self.reader.read_until(b'\n', &mut self.buffer) {
            Ok(0) => None,
            Ok(_) => {
                trim_line_ending(&mut self.buffer);
                Some(Ok(String::from_utf8_lossy(&self.buffer).into_owned()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

pub fn lossy_lines<R: BufRead>(reader: R) -> LossyLines<R> {
    LossyLines::new(reader)
}

/// Iterates a seekable stream's lines from last to first, reading fixed-size
/// blocks backward from the end. A trailing newline yields one empty line first.
pub struct ReverseLines<R> {
    reader: R,
    position: u64,
    pending: Vec<u8>,
    block_size: usize,
    exhausted: bool,
}

impl<R: Read + Seek> ReverseLines<R> {
    pub fn new(reader: R) -> io::Result<Self> {
        Self::with_block_size(reader, REVERSE_BLOCK_SIZE)
    }

    pub fn with_block_size(mut reader: R, block_size: usize) -> io::Result<Self> {
        let position = reader.seek(SeekFrom::End(0))?;
        Ok(Self {
            reader,
            position,
            pending: Vec::new(),
            block_size: block_size.max(1),
            exhausted: false,
        })
    }

    fn read_block(&mut self) -> io::Result<()> {
        let size = (self.block_size as u64).min(self.position) as usize;
        self.position -= size as u64;
        self.reader.seek(SeekFrom::Start(self.position))?;
        let mut block = vec![0; size];
        self.reader.read_exact(&mut block)?;
        block.extend_from_slice(&self.pending);
        self.pending = block;
        Ok(())
    }

    fn take_line(&mut self, from: usize) -> String {
        let mut line = self.pending.split_off(from);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        String::from_utf8_lossy(&line).into_owned()
    }
}

impl<R: Read + Seek> Iterator for ReverseLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.exhausted {
                return None;
            }
            if let Some(newline) = self.pending.iter().rposition(|b| *b == b'\n') {
                let line = self.take_line(newline + 1);
                self.pending.pop();
                return Some(Ok(line));
            }
            if self.position == 0 {
                self.exhausted = true;
                return Some(Ok(self.take_line(0)));
            }
            if let Err(e) = self.read_block() {
                self.exhausted = true;
                return Some(Err(e));
            }
        }
    }
}

pub fn last_non_blank_line(path: &Path) -> Result<Option<String>, ParseError> {
    let lines = ReverseLines::new(open(path)?).map_err(|e| ParseError::io(path, e))?;
    for line in lines {
        let line = line.map_err(|e| ParseError::io(path, e))?;
        if !line.trim().is_empty() {
            return Ok(Some(line));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::NamedTempFile;

    fn reversed(text: &str, block_size: usize) -> Vec<String> {
        ReverseLines::with_block_size(Cursor::new(text.as_bytes().to_vec()), block_size)
            .unwrap()
            .map(Result::unwrap)
            .collect()
    }

    #[test]
    fn test_reverse_lines_across_block_boundaries() {
        let text = "alpha\nbeta\r\ngamma\n\ndelta";
        for block_size in [1, 2, 3, 7, 64] {
            assert_eq!(
                reversed(text, block_size),
                vec!["delta", "", "gamma", "beta", "alpha"],
                "block size {}",
                block_size
            );
        }
    }

    #[test]
    fn test_reverse_lines_trailing_newline_and_empty_input() {
        assert_eq!(reversed("one\ntwo\n", 4), vec!["", "two", "one"]);
        assert_eq!(reversed("", 4), vec![""]);
    }

    #[test]
    fn test_reverse_lines_keeps_multibyte_characters_intact() {
        assert_eq!(reversed("héllo\nwörld\n", 1), vec!["", "wörld", "héllo"]);
    }

    #[test]
    fn test_lossy_lines_replace_invalid_bytes() {
        let bytes = b"ok\r\nbad \xff byte\nlast".to_vec();
        let lines: Vec<String> = lossy_lines(Cursor::new(bytes)).map(Result::unwrap).collect();
        assert_eq!(lines, vec!["ok", "bad \u{fffd} byte", "last"]);
    }

    #[test]
    fn test_last_non_blank_line() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "\n   \nfirst\nmiddle\nlast\n\n  \n").unwrap();
        assert_eq!(last_non_blank_line(file.path()).unwrap().as_deref(), Some("last"));
    }

    #[test]
    fn test_blank_file_has_no_lines() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "\n\n").unwrap();
        assert_eq!(last_non_blank_line(file.path()).unwrap(), None);
    }

    #[test]
    fn test_missing_and_directory_paths_are_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            open(&dir.path().join("nope.log")),
            Err(ParseError::Unreadable { .. })
        ));
        assert!(matches!(open(dir.path()), Err(ParseError::Unreadable { .. })));
    }
}
