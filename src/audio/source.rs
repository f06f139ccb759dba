//! Where recording bytes come from.
//!
//! The editor addresses recordings by a filename-like identifier. The
//! backend serves them over HTTP; for offline use a plain directory works the
//! same way.

use crate::error::SourceError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Summary of one available recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordingInfo {
    pub filename: String,
    /// Size in bytes.
    #[serde(default)]
    pub size: u64,
}

/// A provider of raw recording bytes.
pub trait RecordingSource: Send + Sync {
    /// Fetches the raw bytes of the named recording.
    fn fetch(&self, name: &str) -> Result<Vec<u8>, SourceError>;

    /// Lists the recordings this source can serve.
    fn list(&self) -> Result<Vec<RecordingInfo>, SourceError>;
}

#[derive(Deserialize)]
struct RecordingList {
    #[serde(default)]
    recordings: Vec<RecordingInfo>,
}

/// Fetches recordings from the backend's `/recording/*` endpoints.
pub struct HttpRecordingSource {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpRecordingSource {
    /// Creates a source for the backend at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, SourceError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SourceError::Network {
                name: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Builds `{base_url}/{segments...}`, percent-encoding each segment.
    fn endpoint(&self, segments: &[&str], name: &str) -> Result<reqwest::Url, SourceError> {
        let invalid = |reason: String| SourceError::Network {
            name: name.to_string(),
            reason,
        };
        let mut url =
            reqwest::Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn get(
        &self,
        url: reqwest::Url,
        name: &str,
    ) -> Result<reqwest::blocking::Response, SourceError> {
        let response = self.client.get(url).send().map_err(|e| SourceError::Network {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SourceError::NotFound {
                name: name.to_string(),
            });
        }
        if !status.is_success() {
            return Err(SourceError::Http {
                name: name.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

impl RecordingSource for HttpRecordingSource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, SourceError> {
        let url = self.endpoint(&["recording", "play", name], name)?;
        tracing::debug!(%url, "fetching recording");
        let bytes = self
            .get(url, name)?
            .bytes()
            .map_err(|e| SourceError::Network {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        Ok(bytes.to_vec())
    }

    fn list(&self) -> Result<Vec<RecordingInfo>, SourceError> {
        let url = self.endpoint(&["recording", "list"], "recording list")?;
        let list: RecordingList = self
            .get(url, "recording list")?
            .json()
            .map_err(|e| SourceError::Network {
                name: "recording list".to_string(),
                reason: e.to_string(),
            })?;
        Ok(list.recordings)
    }
}

/// Serves recordings from a local directory.
pub struct DirRecordingSource {
    root: PathBuf,
}

/// File extensions listed by [`DirRecordingSource::list`].
const AUDIO_EXTENSIONS: [&str; 5] = ["wav", "mp3", "flac", "ogg", "oga"];

impl DirRecordingSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolves a recording name to a path inside the root directory.
    /// Names that would escape the directory are treated as missing.
    fn resolve(&self, name: &str) -> Option<PathBuf> {
        let candidate = Path::new(name);
        if candidate.components().count() != 1 || name == ".." || name == "." {
            return None;
        }
        Some(self.root.join(candidate))
    }
}

impl RecordingSource for DirRecordingSource {
    fn fetch(&self, name: &str) -> Result<Vec<u8>, SourceError> {
        let path = self
            .resolve(name)
            .filter(|p| p.is_file())
            .ok_or_else(|| SourceError::NotFound {
                name: name.to_string(),
            })?;
        Ok(std::fs::read(path)?)
    }

    fn list(&self) -> Result<Vec<RecordingInfo>, SourceError> {
        let mut recordings = Vec::new();
        for entry in std::fs::read_dir(&self.root)?.flatten() {
            let path = entry.path();
            let is_audio = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| AUDIO_EXTENSIONS.contains(&e.to_lowercase().as_str()))
                .unwrap_or(false);
            if !path.is_file() || !is_audio {
                continue;
            }
            if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                recordings.push(RecordingInfo {
                    filename: filename.to_string(),
                    size,
                });
            }
        }
        recordings.sort_by(|a, b| a.filename.cmp(&b.filename));
        Ok(recordings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve_once;
    use std::net::TcpListener;
    use tempfile::tempdir;

    #[test]
    fn test_dir_source_fetch_and_list() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.wav"), b"bbbb").unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"aa").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        let source = DirRecordingSource::new(dir.path());
        assert_eq!(source.fetch("b.wav").unwrap(), b"bbbb");

        let names: Vec<_> = source
            .list()
            .unwrap()
            .into_iter()
            .map(|r| (r.filename, r.size))
            .collect();
        assert_eq!(
            names,
            vec![("a.mp3".to_string(), 2), ("b.wav".to_string(), 4)]
        );
    }

    #[test]
    fn test_dir_source_missing_and_escaping_names() {
        let dir = tempdir().unwrap();
        let source = DirRecordingSource::new(dir.path());
        assert!(matches!(
            source.fetch("nope.wav"),
            Err(SourceError::NotFound { .. })
        ));
        assert!(matches!(
            source.fetch("../etc/passwd"),
            Err(SourceError::NotFound { .. })
        ));
    }

    #[test]
    fn test_recording_names_are_percent_encoded() {
        let source = HttpRecordingSource::new("http://localhost:8000/").unwrap();
        let name = "my take #2?.wav";
        let url = source.endpoint(&["recording", "play", name], name).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/recording/play/my%20take%20%232%3F.wav"
        );

        let url = source
            .endpoint(&["recording", "play", "a/b.wav"], "a/b.wav")
            .unwrap();
        assert_eq!(url.path(), "/recording/play/a%2Fb.wav");

        let nested = HttpRecordingSource::new("http://host/api").unwrap();
        let url = nested.endpoint(&["recording", "list"], "list").unwrap();
        assert_eq!(url.as_str(), "http://host/api/recording/list");
    }

    #[test]
    fn test_fetch_requests_encoded_path() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = serve_once(listener, "200 OK", "RIFF");

        let source = HttpRecordingSource::new(format!("http://{addr}")).unwrap();
        assert_eq!(source.fetch("take #1.wav").unwrap(), b"RIFF");
        assert_eq!(
            server.join().unwrap().request_line(),
            "GET /recording/play/take%20%231.wav HTTP/1.1"
        );
    }

    #[test]
    fn test_recording_list_json_shape() {
        let list: RecordingList = serde_json::from_str(
            r#"{"recordings":[{"filename":"take1.wav","size":2048,"created":"2024-01-01"}]}"#,
        )
        .unwrap();
        assert_eq!(list.recordings[0].filename, "take1.wav");
        assert_eq!(list.recordings[0].size, 2048);
    }
}
