//! External-program captcha solver.

use std::path::PathBuf;

use tokio::process::Command;

use super::{CaptchaPresentation, CaptchaSolver, SolverError};
use crate::BoxFuture;

/// File name the captcha image is written to before invoking the program.
pub const CAPTCHA_IMAGE_NAME: &str = "captcha.png";

/// Runs an external program to solve each challenge.
///
/// The image is written to `<dir>/captcha.png` and its path appended to the
/// program's arguments; when the image could not be fetched the image URL is
/// passed instead. The first line of stdout, trimmed, is the answer.
pub struct CommandSolver {
    program: String,
    args: Vec<String>,
    dir: PathBuf,
}

impl CommandSolver {
    /// Run `program` with the captcha written into `dir`.
    pub fn new(program: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: dir.into(),
        }
    }

    /// Build from a whitespace-separated command line such as `"ocr --digits"`.
    pub fn from_command_line(command_line: &str, dir: impl Into<PathBuf>) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            dir: dir.into(),
        })
    }

    async fn run(&self, presentation: &CaptchaPresentation) -> Result<String, SolverError> {
        let target = match &presentation.image {
            Some(bytes) => {
                tokio::fs::create_dir_all(&self.dir).await?;
                let path = self.dir.join(CAPTCHA_IMAGE_NAME);
                tokio::fs::write(&path, bytes).await?;
                path.display().to_string()
            }
            None => presentation.image_url.clone(),
        };

        tracing::debug!(program = %self.program, target = %target, "Running captcha solver");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&target)
            .output()
            .await?;

        if !output.status.success() {
            return Err(SolverError::Command {
                command: self.program.clone(),
                status: output.status.to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let answer = stdout.lines().next().unwrap_or_default().trim();
        if answer.is_empty() {
            return Err(SolverError::EmptyAnswer);
        }
        Ok(answer.to_string())
    }
}

impl CaptchaSolver for CommandSolver {
    fn solve<'a>(
        &'a self,
        presentation: &'a CaptchaPresentation,
    ) -> BoxFuture<'a, Result<String, SolverError>> {
        Box::pin(self.run(presentation))
    }
}
