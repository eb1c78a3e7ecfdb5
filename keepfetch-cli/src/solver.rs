//! Interactive captcha prompt.

use std::fs;
use std::path::{Path, PathBuf};

use console::style;
use dialoguer::Input;
use image::ImageFormat;
use keepfetch::captcha::{CaptchaPresentation, CaptchaSolver, SolverError, CAPTCHA_IMAGE_NAME};
use keepfetch::BoxFuture;

/// Saves the captcha as a PNG and asks the user for the answer.
pub struct PromptSolver {
    dir: PathBuf,
}

impl PromptSolver {
    /// Save captcha images into `dir` before prompting.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Decode the captcha and write it to `<dir>/captcha.png`.
    pub fn save_image(dir: &Path, bytes: &[u8]) -> Result<PathBuf, SolverError> {
        let image = image::load_from_memory(bytes)
            .map_err(|e| SolverError::Prompt(format!("unreadable captcha image: {}", e)))?;

        fs::create_dir_all(dir)?;
        let path = dir.join(CAPTCHA_IMAGE_NAME);
        image
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| SolverError::Prompt(format!("could not save captcha: {}", e)))?;
        Ok(path)
    }

    fn prompt(dir: &Path, presentation: &CaptchaPresentation) -> Result<String, SolverError> {
        let saved = presentation
            .image
            .as_deref()
            .map(|bytes| Self::save_image(dir, bytes));

        match saved {
            Some(Ok(path)) => {
                eprintln!("Captcha saved to {}", style(path.display()).cyan());
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Could not save captcha image");
                eprintln!("Open the captcha at {}", style(&presentation.image_url).cyan());
            }
            None => {
                eprintln!("Open the captcha at {}", style(&presentation.image_url).cyan());
            }
        }

        let answer: String = Input::new()
            .with_prompt("Captcha answer")
            .interact_text()
            .map_err(|e| SolverError::Prompt(e.to_string()))?;

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(SolverError::EmptyAnswer);
        }
        Ok(answer.to_string())
    }
}

impl CaptchaSolver for PromptSolver {
    fn solve<'a>(
        &'a self,
        presentation: &'a CaptchaPresentation,
    ) -> BoxFuture<'a, Result<String, SolverError>> {
        let dir = self.dir.clone();
        let presentation = presentation.clone();

        Box::pin(async move {
            tokio::task::spawn_blocking(move || Self::prompt(&dir, &presentation))
                .await
                .map_err(|e| SolverError::Prompt(e.to_string()))?
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn png_bytes() -> Vec<u8> {
        let image = image::RgbImage::from_pixel(8, 4, image::Rgb([200, 30, 30]));
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn test_save_image_writes_png() {
        let temp = TempDir::new().unwrap();
        let path = PromptSolver::save_image(temp.path(), &png_bytes()).unwrap();

        assert_eq!(path, temp.path().join(CAPTCHA_IMAGE_NAME));
        let saved = image::open(&path).unwrap();
        assert_eq!((saved.width(), saved.height()), (8, 4));
    }

    #[test]
    fn test_save_image_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let err = PromptSolver::save_image(temp.path(), b"not an image").unwrap_err();
        assert!(matches!(err, SolverError::Prompt(_)));
        assert!(!temp.path().join(CAPTCHA_IMAGE_NAME).exists());
    }
}
