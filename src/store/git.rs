use std::path::Path;

use async_trait::async_trait;
use reqwest::StatusCode;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::{
    basename, read_catalog, write_catalog, StoreError, VideoStore, CATALOG_FILE, VIDEOS_DIR,
};
use crate::config::GitHubConfig;
use crate::models::{VideoCatalog, VideoRecord};

/// Store backed by a GitHub repository: `videos.json` at the root, binaries
/// under `videos/`, served from the raw content host.
///
/// Every write is a fresh shallow clone, commit and push; the clone lives in
/// a temporary directory removed on drop.
#[derive(Debug, Clone)]
pub struct GitRepoStore {
    config: GitHubConfig,
    token: Option<String>,
    http: reqwest::Client,
}

impl GitRepoStore {
    pub fn new(config: GitHubConfig, token: Option<String>, http: reqwest::Client) -> Self {
        Self { config, token, http }
    }

    fn catalog_url(&self) -> String {
        format!("{}/{CATALOG_FILE}", self.config.raw_base)
    }

    /// Clone URL with the token embedded for `https` remotes.
    fn authenticated_remote(&self) -> String {
        match (&self.token, self.config.remote_url.strip_prefix("https://")) {
            (Some(token), Some(rest)) => format!("https://{token}@{rest}"),
            _ => self.config.remote_url.clone(),
        }
    }

    fn redact(&self, text: &str) -> String {
        match &self.token {
            Some(token) => text.replace(token.as_str(), "***"),
            None => text.to_string(),
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.header(reqwest::header::AUTHORIZATION, format!("token {token}")),
            None => request,
        }
    }

    async fn git(&self, cwd: Option<&Path>, args: &[&str]) -> Result<String, StoreError> {
        let command = args
            .iter()
            .find(|a| !a.starts_with('-') && !a.contains('='))
            .copied()
            .unwrap_or_default()
            .to_string();
        debug!(command = %command, "running git");

        let mut cmd = Command::new("git");
        cmd.args(args).env("GIT_TERMINAL_PROMPT", "0");
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }
        let output = cmd.output().await.map_err(|e| StoreError::Git {
            command: command.clone(),
            message: e.to_string(),
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(StoreError::Git {
                command,
                message: self.redact(stderr.trim()),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn clone_fresh(&self) -> Result<TempDir, StoreError> {
        let dir = tempfile::Builder::new()
            .prefix("sports-reels-repo-")
            .tempdir()
            .map_err(|e| StoreError::io("creating clone directory", e))?;
        let target = dir.path().to_string_lossy().into_owned();
        let remote = self.authenticated_remote();

        info!(repo = %self.config.repo, path = %target, "cloning metadata repository");
        self.git(
            None,
            &["clone", "--depth", "1", "--branch", &self.config.branch, &remote, &target],
        )
        .await?;
        Ok(dir)
    }
}

#[async_trait]
impl VideoStore for GitRepoStore {
    fn video_url(&self, file_name: &str) -> String {
        format!("{}/{VIDEOS_DIR}/{file_name}", self.config.raw_base)
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        match &self.token {
            Some(_) => Ok(()),
            None => Err(StoreError::MissingCredential),
        }
    }

    async fn load(&self) -> Result<VideoCatalog, StoreError> {
        let response = self
            .authorized(self.http.get(self.catalog_url()))
            .header(reqwest::header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .header(reqwest::header::PRAGMA, "no-cache")
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                info!("{CATALOG_FILE} not found in repository, using empty catalog");
                Ok(VideoCatalog::default())
            }
            status if status.is_success() => Ok(serde_json::from_slice(&response.bytes().await?)?),
            status => Err(StoreError::Status(status.as_u16())),
        }
    }

    async fn refresh(&self) -> Result<VideoCatalog, StoreError> {
        let clone = self.clone_fresh().await?;
        let catalog = read_catalog(&clone.path().join(CATALOG_FILE)).await?;
        debug!(count = catalog.videos.len(), "read catalog from fresh clone");
        Ok(catalog)
    }

    async fn publish(&self, record: &VideoRecord, video: &Path) -> Result<(), StoreError> {
        self.ensure_writable()?;
        let file_name = basename(&record.video_url).unwrap_or(&record.video_url).to_string();

        let clone = self.clone_fresh().await?;
        let repo = clone.path();

        let videos_dir = repo.join(VIDEOS_DIR);
        tokio::fs::create_dir_all(&videos_dir)
            .await
            .map_err(|e| StoreError::io("creating videos directory in clone", e))?;
        tokio::fs::copy(video, videos_dir.join(&file_name))
            .await
            .map_err(|e| StoreError::io(format!("copying {file_name} into clone"), e))?;

        let catalog_path = repo.join(CATALOG_FILE);
        let mut catalog = read_catalog(&catalog_path).await?;
        catalog.put(record.clone());
        write_catalog(&catalog_path, &catalog).await?;

        let video_entry = format!("{VIDEOS_DIR}/{file_name}");
        self.git(Some(repo), &["add", &video_entry, CATALOG_FILE]).await?;

        let status = self.git(Some(repo), &["status", "--porcelain"]).await?;
        if status.trim().is_empty() {
            warn!(file = %file_name, "nothing changed in repository, skipping push");
            return Ok(());
        }

        let name = format!("user.name={}", self.config.author_name);
        let email = format!("user.email={}", self.config.author_email);
        let message = format!("Add or update video {file_name} and {CATALOG_FILE}");
        self.git(Some(repo), &["-c", &name, "-c", &email, "commit", "-m", &message])
            .await?;

        let refspec = format!("HEAD:{}", self.config.branch);
        self.git(Some(repo), &["push", "origin", &refspec]).await?;

        info!(
            id = %record.id,
            file = %file_name,
            repo = %self.config.repo,
            "pushed video and catalog"
        );
        Ok(())
    }

    async fn has_video(&self, record: &VideoRecord) -> Result<bool, StoreError> {
        let response = self.authorized(self.http.head(&record.video_url)).send().await?;
        Ok(response.status().is_success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(remote_url: &str, raw_base: &str) -> GitHubConfig {
        GitHubConfig {
            repo: "example/reels".to_string(),
            branch: "main".to_string(),
            remote_url: remote_url.to_string(),
            raw_base: raw_base.to_string(),
            author_name: "reels-test".to_string(),
            author_email: "reels-test@example.com".to_string(),
        }
    }

    fn record() -> VideoRecord {
        VideoRecord {
            id: "42".to_string(),
            celebrity_name: "Lionel Messi".to_string(),
            title: "La Pulga".to_string(),
            description: "Football magician".to_string(),
            custom_script: "...".to_string(),
            video_url: "https://raw.example/videos/lionel-messi-history.mp4".to_string(),
        }
    }

    #[test]
    fn token_goes_into_https_remotes_only() {
        let store = GitRepoStore::new(
            config("https://github.com/example/reels.git", "https://raw.example"),
            Some("s3cret".to_string()),
            reqwest::Client::new(),
        );
        assert_eq!(
            store.authenticated_remote(),
            "https://s3cret@github.com/example/reels.git"
        );
        assert_eq!(
            store.redact("fatal: https://s3cret@github.com"),
            "fatal: https://***@github.com"
        );
        assert_eq!(store.video_url("a.mp4"), "https://raw.example/videos/a.mp4");

        let local = GitRepoStore::new(
            config("file:///tmp/reels.git", "x"),
            Some("s3cret".into()),
            reqwest::Client::new(),
        );
        assert_eq!(local.authenticated_remote(), "file:///tmp/reels.git");
    }

    #[test]
    fn writes_need_a_token() {
        let store = GitRepoStore::new(
            config("https://github.com/a/b.git", "x"),
            None,
            reqwest::Client::new(),
        );
        assert!(matches!(store.ensure_writable(), Err(StoreError::MissingCredential)));
    }

    #[tokio::test]
    async fn load_reads_raw_catalog() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos.json"))
            .and(header("authorization", "token s3cret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "videos": [record()]
            })))
            .mount(&server)
            .await;

        let store = GitRepoStore::new(
            config("https://github.com/a/b.git", &server.uri()),
            Some("s3cret".to_string()),
            reqwest::Client::new(),
        );
        let catalog = store.load().await.unwrap();
        assert_eq!(catalog.videos, vec![record()]);
    }

    #[tokio::test]
    async fn load_treats_missing_catalog_as_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let store = GitRepoStore::new(
            config("https://github.com/a/b.git", &server.uri()),
            None,
            reqwest::Client::new(),
        );
        assert!(store.load().await.unwrap().videos.is_empty());
    }

    #[tokio::test]
    async fn load_surfaces_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        let store = GitRepoStore::new(
            config("https://github.com/a/b.git", &server.uri()),
            None,
            reqwest::Client::new(),
        );
        assert!(matches!(store.load().await, Err(StoreError::Status(503))));
    }

    fn git_available() -> bool {
        StdCommand::new("git")
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn run_git(cwd: &Path, args: &[&str]) {
        let status = StdCommand::new("git")
            .args(["-c", "user.name=seed", "-c", "user.email=seed@example.com"])
            .args(args)
            .current_dir(cwd)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?} failed");
    }

    /// Bare repository with `main` holding an empty catalog.
    fn seeded_bare_repo(root: &Path) -> String {
        let seed = root.join("seed");
        std::fs::create_dir_all(&seed).unwrap();
        run_git(&seed, &["init", "-q"]);
        run_git(&seed, &["checkout", "-q", "-b", "main"]);
        std::fs::write(seed.join(CATALOG_FILE), r#"{"videos":[]}"#).unwrap();
        run_git(&seed, &["add", CATALOG_FILE]);
        run_git(&seed, &["commit", "-q", "-m", "seed"]);
        run_git(root, &["clone", "-q", "--bare", "seed", "remote.git"]);
        format!("file://{}", root.join("remote.git").display())
    }

    #[tokio::test]
    async fn publish_then_refresh_through_a_real_repository() {
        if !git_available() {
            eprintln!("git not installed, skipping");
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let remote = seeded_bare_repo(root.path());
        let store = GitRepoStore::new(
            config(&remote, "https://raw.example"),
            Some("unused-for-file-remotes".to_string()),
            reqwest::Client::new(),
        );

        let video = root.path().join("render.mp4");
        std::fs::write(&video, b"mp4").unwrap();
        store.publish(&record(), &video).await.unwrap();
        // Same content again: nothing to commit, still succeeds.
        store.publish(&record(), &video).await.unwrap();

        let catalog = store.refresh().await.unwrap();
        assert_eq!(catalog.videos, vec![record()]);
    }
}
