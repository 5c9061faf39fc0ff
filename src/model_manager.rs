use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::models::BuiltinModel;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Model verification failed")]
    VerificationFailed,
}

/// Downloads and caches the built-in embedding model artifacts.
///
/// Each downloaded file gets a sibling `.sha256` digest recorded next to
/// it; later runs verify the file against that digest and re-download on
/// mismatch, so a corrupted cache heals itself instead of failing
/// permanently.
#[derive(Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        // 1. Environment override
        if let Ok(path) = env::var("WAYPOINTER_CACHE") {
            return PathBuf::from(path).join("models");
        }

        // 2. Platform cache directory
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("waypointer").join("models");
        }

        // 3. Home directory fallback
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("waypointer").join("models");
        }

        // 4. Last resort: system temp directory
        env::temp_dir().join("waypointer").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self {
            models_dir,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn get_model_path(&self, model: BuiltinModel) -> PathBuf {
        let info = model.get_model_info();
        self.models_dir.join(info.name).join("model.onnx")
    }

    pub fn get_tokenizer_path(&self, model: BuiltinModel) -> PathBuf {
        let info = model.get_model_info();
        self.models_dir.join(info.name).join("tokenizer.json")
    }

    pub fn is_model_downloaded(&self, model: BuiltinModel) -> bool {
        self.get_model_path(model).exists() && self.get_tokenizer_path(model).exists()
    }

    pub async fn download_model(&self, model: BuiltinModel) -> Result<(), ModelError> {
        let info = model.get_model_info();
        let _lock = self.download_lock.lock().await;

        let model_dir = self.models_dir.join(info.name);
        fs::create_dir_all(&model_dir)?;

        let model_path = self.get_model_path(model);
        let model_result = if model_path.exists() && self.verify_file(&model_path)? {
            log::info!("Existing model file verified at {:?}", model_path);
            Ok(())
        } else {
            self.download_and_record_file(info.model_url, &model_path, "model")
                .await
        };

        let tokenizer_path = self.get_tokenizer_path(model);
        let tokenizer_result = if tokenizer_path.exists() && self.verify_file(&tokenizer_path)? {
            log::info!("Existing tokenizer file verified at {:?}", tokenizer_path);
            Ok(())
        } else {
            self.download_and_record_file(info.tokenizer_url, &tokenizer_path, "tokenizer")
                .await
        };

        match (model_result, tokenizer_result) {
            (Ok(()), Ok(())) => {
                log::info!("Model and tokenizer ready to use");
                Ok(())
            }
            (Err(e), _) | (_, Err(e)) => {
                log::error!("Failed to set up model files: {}", e);
                // Leave no partial download behind
                let _ = self.remove_download(model);
                Err(e)
            }
        }
    }

    fn digest_path(path: &Path) -> PathBuf {
        let mut name = path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".sha256");
        path.with_file_name(name)
    }

    fn compute_digest(path: &Path) -> Result<String, ModelError> {
        let bytes = fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Records the file's current digest next to it, making the file the
    /// reference for all later verification.
    fn record_digest(&self, path: &Path) -> Result<(), ModelError> {
        let digest = Self::compute_digest(path)?;
        fs::write(Self::digest_path(path), digest)?;
        Ok(())
    }

    /// Verifies a file against its recorded digest. A file without a
    /// recorded digest counts as unverified.
    fn verify_file(&self, path: &Path) -> Result<bool, ModelError> {
        let digest_path = Self::digest_path(path);
        if !digest_path.exists() {
            return Ok(false);
        }
        let expected = fs::read_to_string(digest_path)?;
        Ok(Self::compute_digest(path)? == expected.trim())
    }

    pub fn verify_model(&self, model: BuiltinModel) -> Result<bool, ModelError> {
        let model_path = self.get_model_path(model);
        let tokenizer_path = self.get_tokenizer_path(model);

        if !model_path.exists() || !tokenizer_path.exists() {
            return Ok(false);
        }

        Ok(self.verify_file(&model_path)? && self.verify_file(&tokenizer_path)?)
    }

    async fn download_and_record_file(
        &self,
        url: &str,
        path: &Path,
        file_type: &str,
    ) -> Result<(), ModelError> {
        log::info!("Downloading {} file from {} to {:?}", file_type, url, path);
        let response = reqwest::get(url).await?;
        let bytes = response.bytes().await?;
        log::info!("Downloaded {} bytes", bytes.len());

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, bytes)?;
        self.record_digest(path)?;

        if !self.verify_file(path)? {
            return Err(ModelError::VerificationFailed);
        }

        log::info!("{} file downloaded and recorded successfully", file_type);
        Ok(())
    }

    pub fn remove_download(&self, model: BuiltinModel) -> Result<(), ModelError> {
        let model_path = self.get_model_path(model);
        let tokenizer_path = self.get_tokenizer_path(model);

        for path in [&model_path, &tokenizer_path] {
            if path.exists() {
                fs::remove_file(path)?;
            }
            let digest_path = Self::digest_path(path);
            if digest_path.exists() {
                fs::remove_file(digest_path)?;
            }
        }
        Ok(())
    }

    /// Ensures that a model is downloaded and verified.
    /// If the model doesn't exist, it will be downloaded.
    /// If verification fails, it will be re-downloaded.
    pub async fn ensure_model_downloaded(&self, model: BuiltinModel) -> Result<(), ModelError> {
        if !self.is_model_downloaded(model) {
            log::info!("Model not found, downloading...");
            self.download_model(model).await?;
        } else if !self.verify_model(model)? {
            log::warn!("Model verification failed, re-downloading...");
            self.remove_download(model)?;
            self.download_model(model).await?;
        }
        Ok(())
    }
}
