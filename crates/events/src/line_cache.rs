use std::{
    fs::File,
    io::{
        BufRead,
        BufReader,
        Seek,
        SeekFrom,
    },
};

/// Monotonic line-number → byte-offset index, built lazily and only ever
/// extended, never invalidated. `offsets[i]` is the byte offset where line
/// `i` begins; `offsets.len() - 1` is the number of *complete* (newline
/// terminated) lines currently known. A trailing partial line (a write in
/// progress, observed mid-append by a tail-follow reader) is never counted
/// as a complete line.
#[derive(Debug, Default)]
pub struct LineOffsetCache {
    offsets: Vec<u64>,
}

impl LineOffsetCache {
    pub fn new() -> Self {
        Self { offsets: vec![0] }
    }

    pub fn known_lines(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn offset_of_line(&self, line: usize) -> Option<u64> {
        self.offsets.get(line).copied()
    }

    /// Scans forward from the last known offset to the current end of
    /// file, recording the offset of every newline-terminated line found.
    /// Cheap to call repeatedly: a call with nothing new to find is a
    /// single failed `read_line`.
    pub fn extend(&mut self, file: &File) -> anyhow::Result<()> {
        let mut reader = BufReader::new(file);
        let mut pos = *self.offsets.last().expect("offsets always has a sentinel");
        reader
            .seek(SeekFrom::Start(pos))
            .map_err(|e| errors::internal("could not seek event file", e))?;

        let mut line = String::new();
        loop {
            line.clear();
            let n = reader
                .read_line(&mut line)
                .map_err(|e| errors::internal("could not read event file", e))?;
            if n == 0 {
                break;
            }
            pos += n as u64;
            if line.ends_with('\n') {
                self.offsets.push(pos);
            } else {
                // partial trailing line: not yet terminated, don't count it.
                break;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn extend_finds_complete_lines_only() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "a\nb\nc").unwrap();
        f.flush().unwrap();

        let mut cache = LineOffsetCache::new();
        cache.extend(f.as_file()).unwrap();
        assert_eq!(cache.known_lines(), 2);
        assert_eq!(cache.offset_of_line(0), Some(0));
        assert_eq!(cache.offset_of_line(1), Some(2));

        write!(f, "\n").unwrap();
        f.flush().unwrap();
        cache.extend(f.as_file()).unwrap();
        assert_eq!(cache.known_lines(), 3);
    }
}
