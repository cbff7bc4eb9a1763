//! Persists classification results to disk as JSON

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::api::Classification;
use crate::error::Result;

const SESSION_FORMAT: &str = "%Y-%m-%d_%H-%M-%S-%3f";

/// Writes results into a timestamped session directory, one file per image
#[derive(Debug, Clone)]
pub struct ResultSaver {
    /// Base directory for saved results
    base_dir: PathBuf,
    /// Session directory, `yyyy-mm-dd_HH-MM-SS-mmm`
    session_dir: PathBuf,
    /// Number of results saved in this session
    count: usize,
}

async fn create_session_dir(base_dir: &Path) -> Result<PathBuf> {
    let session_start: DateTime<Local> = Local::now();
    let session_dir = base_dir.join(session_start.format(SESSION_FORMAT).to_string());
    fs::create_dir_all(&session_dir).await?;
    Ok(session_dir)
}

/// File-name-safe stem of the source image name
fn file_stem(image_name: &str) -> String {
    let stem = Path::new(image_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "image".to_string()
    } else {
        cleaned
    }
}

impl ResultSaver {
    /// Create a saver and its first session directory under `base_dir`
    pub async fn new(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let session_dir = create_session_dir(&base_dir).await?;

        info!("Result session directory: {}", session_dir.display());

        Ok(Self {
            base_dir,
            session_dir,
            count: 0,
        })
    }

    /// Save one result as `result_NNN_<stem>.json`
    pub async fn save(&mut self, image_name: &str, result: &Classification) -> Result<PathBuf> {
        self.count += 1;

        let filename = format!("result_{:03}_{}.json", self.count, file_stem(image_name));
        let file_path = self.session_dir.join(&filename);

        let json = serde_json::to_vec_pretty(result)?;
        fs::write(&file_path, &json).await?;

        debug!(
            "Saved result: {} ({} predictions)",
            file_path.display(),
            result.predictions.len()
        );

        Ok(file_path)
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Number of results saved in the current session
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn reset_count(&mut self) {
        self.count = 0;
    }

    /// Start a new session directory and reset the counter
    pub async fn new_session(&mut self) -> Result<()> {
        self.session_dir = create_session_dir(&self.base_dir).await?;
        self.count = 0;

        info!("New result session directory: {}", self.session_dir.display());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Prediction;
    use tempfile::tempdir;

    fn sample() -> Classification {
        Classification {
            success: true,
            image_name: Some("cat photo.jpg".into()),
            predictions: vec![Prediction {
                category: "cat".into(),
                confidence: 0.75,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("cat photo.jpg"), "cat_photo");
        assert_eq!(file_stem("dir/a-b_c.png"), "a-b_c");
        assert_eq!(file_stem(""), "image");
    }

    #[tokio::test]
    async fn test_result_saver_creation() {
        let temp_dir = tempdir().unwrap();
        let saver = ResultSaver::new(temp_dir.path()).await.unwrap();

        assert!(saver.session_dir().exists());
        assert!(saver.session_dir().starts_with(temp_dir.path()));
        assert_eq!(saver.count(), 0);
    }

    #[tokio::test]
    async fn test_result_save() {
        let temp_dir = tempdir().unwrap();
        let mut saver = ResultSaver::new(temp_dir.path()).await.unwrap();

        let path = saver.save("cat photo.jpg", &sample()).await.unwrap();

        assert!(path.exists());
        assert_eq!(saver.count(), 1);
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            "result_001_cat_photo.json"
        );

        let written: Classification =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, sample());
    }

    #[tokio::test]
    async fn test_reset_count() {
        let temp_dir = tempdir().unwrap();
        let mut saver = ResultSaver::new(temp_dir.path()).await.unwrap();
        saver.save("a.png", &sample()).await.unwrap();
        saver.save("b.png", &sample()).await.unwrap();
        assert_eq!(saver.count(), 2);

        saver.reset_count();
        assert_eq!(saver.count(), 0);
    }
}
