use super::Input;
use crate::error::InputError;
use crate::params::FetchParams;
use batchout_config::{ConfigError, Fragment};
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

/// Reads payloads from one or more files matched by a glob path, optionally
/// split into chunks. `path` may itself contain `{name}` placeholders
/// resolved from `fetch`'s params before the glob is expanded, matching the
/// original's per-call `path.format(**params)`.
pub struct FileInput {
    path_template: String,
    recursive: bool,
    chunk_bytes: Option<usize>,
    chunk_endswith: Option<Vec<u8>>,
    glob_path: Option<String>,
    pending: Vec<PathBuf>,
    active_path: Option<PathBuf>,
    file: Option<File>,
    buffer: Vec<u8>,
}

impl FileInput {
    pub fn construct(fragment: &Fragment) -> Result<Box<dyn Input>, ConfigError> {
        let path_template: String = fragment.required("path")?;
        let recursive: bool = fragment.with_default("recursive", false)?;
        let chunk_bytes: Option<usize> = fragment.optional("chunk_bytes")?;
        let chunk_endswith: Option<String> = fragment.optional("chunk_endswith")?;
        Ok(Box::new(FileInput {
            path_template,
            recursive,
            chunk_bytes,
            chunk_endswith: chunk_endswith.map(String::into_bytes),
            glob_path: None,
            pending: Vec::new(),
            active_path: None,
            file: None,
            buffer: Vec::new(),
        }))
    }

    fn close(&mut self) {
        self.file = None;
        self.buffer.clear();
    }

    fn refresh_glob(&mut self, glob_path: &str) -> Result<(), InputError> {
        self.glob_path = Some(glob_path.to_string());
        let options = glob::MatchOptions { require_literal_leading_dot: !self.recursive, ..Default::default() };
        let matched = glob::glob_with(glob_path, options)
            .map_err(|e| InputError::invalid("path", e.to_string()))?
            .filter_map(Result::ok)
            .collect();
        self.pending = matched;
        self.active_path = None;
        self.close();
        Ok(())
    }

    fn next_from_active(&mut self) -> Result<Option<Vec<u8>>, InputError> {
        let Some(path) = self.active_path.clone() else { return Ok(None) };
        if self.file.is_none() {
            self.file = Some(File::open(&path)?);
        }

        let payload = if self.chunk_bytes.is_none() && self.chunk_endswith.is_none() {
            let mut buf = Vec::new();
            self.file.as_mut().unwrap().read_to_end(&mut buf)?;
            self.close();
            buf
        } else if let Some(chunk_bytes) = self.chunk_bytes {
            let need = chunk_bytes.saturating_sub(self.buffer.len());
            if need > 0 {
                let mut read_buf = vec![0u8; need];
                let n = self.file.as_mut().unwrap().read(&mut read_buf)?;
                self.buffer.extend_from_slice(&read_buf[..n]);
            }
            let take = chunk_bytes.min(self.buffer.len());
            let mut payload: Vec<u8> = self.buffer.drain(..take).collect();
            payload = self.split_on_endswith(payload);
            if payload.is_empty() && self.buffer.is_empty() {
                self.close();
            }
            payload
        } else {
            let mark = self.chunk_endswith.clone().unwrap();
            let mut payload = std::mem::take(&mut self.buffer);
            loop {
                if !payload.is_empty() && contains(&payload, &mark) {
                    break;
                }
                let mut chunk = vec![0u8; mark.len().max(4096)];
                let n = self.file.as_mut().unwrap().read(&mut chunk)?;
                if n == 0 {
                    break;
                }
                payload.extend_from_slice(&chunk[..n]);
            }
            let out = self.split_on_endswith(payload);
            if out.is_empty() && self.buffer.is_empty() {
                self.close();
            }
            out
        };

        if payload.is_empty() {
            self.active_path = None;
            Ok(None)
        } else {
            Ok(Some(payload))
        }
    }

    fn split_on_endswith(&mut self, payload: Vec<u8>) -> Vec<u8> {
        let Some(mark) = self.chunk_endswith.clone() else { return payload };
        if let Some(pos) = find(&payload, &mark) {
            let split_at = pos + mark.len();
            let rest = payload[split_at..].to_vec();
            self.buffer.splice(0..0, rest);
            payload[..split_at].to_vec()
        } else {
            payload
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}

impl Input for FileInput {
    fn fetch(&mut self, params: &FetchParams) -> Result<Option<Vec<u8>>, InputError> {
        let glob_path = params.format(&self.path_template);
        if self.glob_path.as_deref() != Some(glob_path.as_str()) {
            self.refresh_glob(&glob_path)?;
        }
        loop {
            if self.active_path.is_none() {
                self.active_path = self.pending.pop();
                if self.active_path.is_none() {
                    return Ok(None);
                }
            }
            if let Some(payload) = self.next_from_active()? {
                return Ok(Some(payload));
            }
        }
    }

    fn commit(&mut self) -> Result<(), InputError> {
        Ok(())
    }

    fn reset(&mut self) -> Result<(), InputError> {
        self.glob_path = None;
        self.pending.clear();
        self.active_path = None;
        self.close();
        Ok(())
    }

    fn clone_fresh(&self) -> Box<dyn Input> {
        Box::new(FileInput {
            path_template: self.path_template.clone(),
            recursive: self.recursive,
            chunk_bytes: self.chunk_bytes,
            chunk_endswith: self.chunk_endswith.clone(),
            glob_path: None,
            pending: Vec::new(),
            active_path: None,
            file: None,
            buffer: Vec::new(),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_whole_file_when_unchunked() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello").unwrap();
        let f = Fragment::from_value(serde_json::json!({
            "type": "file", "path": path.to_string_lossy(),
        }))
        .unwrap();
        let mut input = FileInput::construct(&f).unwrap();
        assert_eq!(input.fetch(&FetchParams::new()).unwrap(), Some(b"hello".to_vec()));
        assert_eq!(input.fetch(&FetchParams::new()).unwrap(), None);
    }

    #[test]
    fn splits_on_chunk_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"abcdef").unwrap();
        let f = Fragment::from_value(serde_json::json!({
            "type": "file", "path": path.to_string_lossy(), "chunk_bytes": 2,
        }))
        .unwrap();
        let mut input = FileInput::construct(&f).unwrap();
        assert_eq!(input.fetch(&FetchParams::new()).unwrap(), Some(b"ab".to_vec()));
        assert_eq!(input.fetch(&FetchParams::new()).unwrap(), Some(b"cd".to_vec()));
        assert_eq!(input.fetch(&FetchParams::new()).unwrap(), Some(b"ef".to_vec()));
        assert_eq!(input.fetch(&FetchParams::new()).unwrap(), None);
    }

    #[test]
    fn splits_on_chunk_endswith() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"one;two;three").unwrap();
        let f = Fragment::from_value(serde_json::json!({
            "type": "file", "path": path.to_string_lossy(), "chunk_endswith": ";",
        }))
        .unwrap();
        let mut input = FileInput::construct(&f).unwrap();
        assert_eq!(input.fetch(&FetchParams::new()).unwrap(), Some(b"one;".to_vec()));
        assert_eq!(input.fetch(&FetchParams::new()).unwrap(), Some(b"two;".to_vec()));
        assert_eq!(input.fetch(&FetchParams::new()).unwrap(), Some(b"three".to_vec()));
        assert_eq!(input.fetch(&FetchParams::new()).unwrap(), None);
    }
}
