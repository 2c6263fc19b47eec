//! Video rendering backends.
//!
//! Rendering itself is opaque to the server: a [`Renderer`] runs inside the
//! job's work directory and must leave `<work_dir>/videos/<file_name>` behind.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};

/// Longest log excerpt attached to an error.
const LOG_EXCERPT_CHARS: usize = 4000;

/// Directory, relative to the renderer's working directory, that receives the
/// rendered file.
pub const OUTPUT_SUBDIR: &str = "videos";

#[derive(Debug, Clone)]
pub struct RenderJob {
    pub celebrity_name: String,
    pub title: String,
    pub description: String,
    pub custom_script: String,
    /// Working directory of the renderer process.
    pub work_dir: PathBuf,
    pub file_name: String,
}

impl RenderJob {
    pub fn output_dir(&self) -> PathBuf {
        self.work_dir.join(OUTPUT_SUBDIR)
    }

    pub fn expected_output(&self) -> PathBuf {
        self.output_dir().join(&self.file_name)
    }
}

#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub video_path: PathBuf,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("could not start renderer {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("renderer exited with {status}, Log: {log}")]
    Failed { status: String, log: String },

    #[error("Video file not generated: {path}, Log: {log}")]
    MissingOutput { path: PathBuf, log: String },
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(&self, job: &RenderJob) -> Result<RenderOutput, RenderError>;
}

/// Runs an external script, redirecting its stdout and stderr to a log file.
///
/// Invocation: `<program> <script> --celebrity .. --title .. --description ..
/// --script ..`, with the job's work directory as the current directory.
#[derive(Debug, Clone)]
pub struct ScriptRenderer {
    program: String,
    script: PathBuf,
    log_path: PathBuf,
}

impl ScriptRenderer {
    pub fn new(
        program: impl Into<String>,
        script: impl Into<PathBuf>,
        log_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: program.into(),
            script: script.into(),
            log_path: log_path.into(),
        }
    }

    fn spawn_error(&self, source: std::io::Error) -> RenderError {
        RenderError::Spawn {
            program: self.program.clone(),
            source,
        }
    }

    fn open_log(&self) -> std::io::Result<(Stdio, Stdio)> {
        if let Some(parent) = self.log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let log = std::fs::File::create(&self.log_path)?;
        let err = log.try_clone()?;
        Ok((Stdio::from(log), Stdio::from(err)))
    }
}

#[async_trait]
impl Renderer for ScriptRenderer {
    async fn render(&self, job: &RenderJob) -> Result<RenderOutput, RenderError> {
        let (stdout, stderr) = self.open_log().map_err(|e| self.spawn_error(e))?;
        let script = absolute(&self.script).map_err(|e| self.spawn_error(e))?;
        let work_dir = absolute(&job.work_dir).map_err(|e| self.spawn_error(e))?;

        info!(
            program = %self.program,
            script = %self.script.display(),
            work_dir = %job.work_dir.display(),
            celebrity = %job.celebrity_name,
            "starting renderer"
        );
        let status = Command::new(&self.program)
            .arg(&script)
            .arg("--celebrity")
            .arg(&job.celebrity_name)
            .arg("--title")
            .arg(&job.title)
            .arg("--description")
            .arg(&job.description)
            .arg("--script")
            .arg(&job.custom_script)
            .current_dir(&work_dir)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !status.success() {
            let log = read_log_excerpt(&self.log_path).await;
            warn!(%status, "renderer failed");
            return Err(RenderError::Failed {
                status: status.to_string(),
                log,
            });
        }

        let video_path = job.expected_output();
        if !tokio::fs::try_exists(&video_path).await.unwrap_or(false) {
            let log = read_log_excerpt(&self.log_path).await;
            warn!(path = %video_path.display(), "renderer finished without output");
            return Err(RenderError::MissingOutput { path: video_path, log });
        }

        info!(path = %video_path.display(), "video rendered");
        Ok(RenderOutput { video_path })
    }
}

/// Resolves a relative path against the server's current directory, since the
/// child runs elsewhere.
fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.to_path_buf())
    } else {
        Ok(std::env::current_dir()?.join(path))
    }
}

/// Last [`LOG_EXCERPT_CHARS`] characters of the log, or a marker when the
/// log cannot be read.
pub async fn read_log_excerpt(path: &Path) -> String {
    match tokio::fs::read(path).await {
        Ok(bytes) => tail_chars(String::from_utf8_lossy(&bytes).trim_end(), LOG_EXCERPT_CHARS),
        Err(_) => "Log file missing".to_string(),
    }
}

fn tail_chars(text: &str, max: usize) -> String {
    let count = text.chars().count();
    if count <= max {
        return text.to_string();
    }
    text.chars().skip(count - max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(dir: &Path) -> RenderJob {
        RenderJob {
            celebrity_name: "Serena Williams".to_string(),
            title: "GOAT".to_string(),
            description: "Tennis legend".to_string(),
            custom_script: "She said \"come on\"".to_string(),
            work_dir: dir.to_path_buf(),
            file_name: "serena-williams-history.mp4".to_string(),
        }
    }

    #[test]
    fn tail_keeps_the_end() {
        assert_eq!(tail_chars("abcdef", 3), "def");
        assert_eq!(tail_chars("abc", 10), "abc");
    }

    #[tokio::test]
    async fn missing_log_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(read_log_excerpt(&dir.path().join("nope.log")).await, "Log file missing");
    }

    #[cfg(unix)]
    fn write_script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("render.sh");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn script_writes_into_work_dir_videos() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        std::fs::create_dir_all(&work).unwrap();
        let script = write_script(
            root.path(),
            r#"
while [ $# -gt 0 ]; do
  case "$1" in
    --output-dir) echo "unexpected flag $1" >&2; exit 2 ;;
    --script) echo "narration: $2" ;;
  esac
  shift
done
mkdir -p videos
printf video > "videos/serena-williams-history.mp4"
"#,
        );
        let renderer = ScriptRenderer::new("sh", script, root.path().join("render.log"));

        let output = renderer.render(&job(&work)).await.unwrap();
        assert_eq!(output.video_path, work.join("videos").join("serena-williams-history.mp4"));
        assert_eq!(std::fs::read(&output.video_path).unwrap(), b"video");
        let log = std::fs::read_to_string(root.path().join("render.log")).unwrap();
        assert!(log.contains("narration: She said \"come on\""));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_script_attaches_log() {
        let root = tempfile::tempdir().unwrap();
        let script = write_script(root.path(), "echo 'no images found' >&2\nexit 3\n");
        let renderer = ScriptRenderer::new("sh", script, root.path().join("render.log"));

        let err = renderer.render(&job(root.path())).await.unwrap_err();
        match err {
            RenderError::Failed { log, .. } => assert!(log.contains("no images found")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_output_attaches_log() {
        let root = tempfile::tempdir().unwrap();
        let script = write_script(root.path(), "echo 'wrote nothing'\n");
        let renderer = ScriptRenderer::new("sh", script, root.path().join("render.log"));

        let err = renderer.render(&job(root.path())).await.unwrap_err();
        assert!(matches!(err, RenderError::MissingOutput { .. }));
        assert!(err.to_string().contains("wrote nothing"));
    }

    #[tokio::test]
    async fn unknown_program_fails_to_spawn() {
        let root = tempfile::tempdir().unwrap();
        let renderer = ScriptRenderer::new(
            "definitely-not-a-real-renderer-binary",
            root.path().join("x.py"),
            root.path().join("render.log"),
        );
        let err = renderer.render(&job(root.path())).await.unwrap_err();
        assert!(matches!(err, RenderError::Spawn { .. }));
    }
}
