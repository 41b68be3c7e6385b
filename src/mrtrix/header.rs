//! Text headers of MRtrix `.mih` / `.mif` images.
//!
//! A header is `mrtrix image` followed by `key: value` lines and terminated by
//! `END`. In `.mif` files binary voxel data follows the terminator, so reading
//! stops there. Keys may repeat (`transform`, `dw_scheme`); repeated values are
//! kept in file order.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{Error, Result};
use crate::orientation::OrientationTransform;

const MAGIC_LINE: &str = "mrtrix image";
const END_LINE: &str = "END";

/// Ordered key/value entries of an MRtrix image header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MrtrixHeader {
    entries: Vec<(String, Vec<String>)>,
}

impl MrtrixHeader {
    /// Parse header text. The magic line and terminator are optional here.
    pub fn parse(text: &str) -> Self {
        let mut header = Self::default();
        for line in text.lines() {
            if !header.push_line(line) {
                break;
            }
        }
        header
    }

    /// Read the header of an image on disk.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);

        let mut raw = Vec::new();
        reader.read_until(b'\n', &mut raw)?;
        if String::from_utf8_lossy(&raw).trim() != MAGIC_LINE {
            return Err(Error::InvalidFileFormat(format!(
                "\"{}\" does not start with \"{}\"",
                path.display(),
                MAGIC_LINE
            )));
        }

        let mut header = Self::default();
        loop {
            raw.clear();
            if reader.read_until(b'\n', &mut raw)? == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&raw);
            if !header.push_line(&line) {
                break;
            }
        }
        Ok(header)
    }

    /// Add one line; returns false at the terminator.
    fn push_line(&mut self, line: &str) -> bool {
        let line = line.trim();
        if line == END_LINE {
            return false;
        }
        if line.is_empty() || line == MAGIC_LINE {
            return true;
        }
        let (key, value) = line.split_once(": ").unwrap_or((line, ""));
        self.insert(key.trim_end_matches(':'), value);
        true
    }

    /// Append a value under `key`.
    pub fn insert(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, values)) => values.push(value.to_string()),
            None => self.entries.push((key.to_string(), vec![value.to_string()])),
        }
    }

    /// All values recorded for `key`, in order.
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    /// First value recorded for `key`.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.first()).map(String::as_str)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Orientation from the `transform` rows; `path` is used for diagnostics.
    pub fn transform(&self, path: &Path) -> Result<OrientationTransform> {
        let rows = self.get("transform").ok_or_else(|| Error::CorruptTransform {
            path: path.to_path_buf(),
            reason: "header has no transform entries".to_string(),
        })?;
        OrientationTransform::parse_text(&rows.join("\n"), path)
    }
}
