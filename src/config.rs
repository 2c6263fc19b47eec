//! Server configuration, read once from the environment at startup.

use std::path::PathBuf;
use std::time::Duration;

use crate::renderer::OUTPUT_SUBDIR;

/// Which backend holds the metadata document and the video binaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Local,
    GitHub,
}

impl StorageBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" | "fs" => Some(Self::Local),
            "github" | "git" | "remote" => Some(Self::GitHub),
            _ => None,
        }
    }
}

/// Remote repository settings.
#[derive(Debug, Clone)]
pub struct GitHubConfig {
    /// `owner/name`
    pub repo: String,
    pub branch: String,
    /// Clone URL without credentials.
    pub remote_url: String,
    /// Base for raw file URLs, no trailing slash.
    pub raw_base: String,
    pub author_name: String,
    pub author_email: String,
}

impl GitHubConfig {
    /// Whether `url` names a file under [`raw_base`](Self::raw_base), the
    /// only place the repository token may be sent.
    pub fn serves(&self, url: &str) -> bool {
        let parsed = (reqwest::Url::parse(&self.raw_base), reqwest::Url::parse(url));
        let (Ok(base), Ok(url)) = parsed else {
            return false;
        };
        let prefix = format!("{}/", base.path().trim_end_matches('/'));
        url.scheme() == base.scheme()
            && url.host_str() == base.host_str()
            && url.port_or_known_default() == base.port_or_known_default()
            && url.username().is_empty()
            && url.path().starts_with(&prefix)
            && url.path().len() > prefix.len()
    }
}

/// Retry settings for one proxy endpoint.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub max_attempts: u32,
    pub json_delay: Duration,
    pub video_delay: Duration,
    pub upstream_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `development` or `production`
    pub environment: String,
    pub backend: StorageBackend,
    /// Local store root: `videos.json` and `videos/`.
    pub data_dir: PathBuf,
    /// Renderer working directory, purged before and after each run. The
    /// renderer writes into its `videos/` subdirectory.
    pub work_dir: PathBuf,
    /// Directory the static file handler serves from.
    pub serve_dir: PathBuf,
    pub render_program: String,
    pub render_script: PathBuf,
    pub render_log: PathBuf,
    /// Respond 202 and render in a spawned task.
    pub background_generation: bool,
    pub github_token: Option<String>,
    pub github: GitHubConfig,
    pub proxy: ProxyConfig,
}

impl AppConfig {
    /// Builds the configuration from environment variables, falling back to
    /// development defaults.
    pub fn from_env() -> Self {
        let environment = env_or("ENVIRONMENT", "development");
        let production = environment.eq_ignore_ascii_case("production");

        let backend = std::env::var("STORAGE_BACKEND")
            .ok()
            .and_then(|v| StorageBackend::parse(&v))
            .unwrap_or(StorageBackend::Local);

        let data_dir = PathBuf::from(env_or("DATA_DIR", "./data"));
        let work_dir = PathBuf::from(env_or(
            "WORK_DIR",
            if production { "/tmp/sports-reels" } else { "./temp" },
        ));
        let serve_dir = std::env::var("SERVE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| match backend {
                StorageBackend::Local => data_dir.join("videos"),
                StorageBackend::GitHub => work_dir.join(OUTPUT_SUBDIR),
            });

        let repo = env_or("GITHUB_REPO", "g-h-0-S-t/sports-reels-videos");
        let branch = env_or("GITHUB_BRANCH", "main");
        let github = GitHubConfig {
            remote_url: env_or("GITHUB_REMOTE_URL", &format!("https://github.com/{repo}.git")),
            raw_base: env_or(
                "GITHUB_RAW_BASE",
                &format!("https://raw.githubusercontent.com/{repo}/{branch}"),
            )
            .trim_end_matches('/')
            .to_string(),
            author_name: env_or("GIT_AUTHOR_NAME", "sports-reels-bot"),
            author_email: env_or("GIT_AUTHOR_EMAIL", "sports-reels-bot@users.noreply.github.com"),
            repo,
            branch,
        };

        Self {
            host: env_or("HOST", "0.0.0.0"),
            port: env_parse("PORT", 3000),
            backend,
            data_dir,
            work_dir,
            serve_dir,
            render_program: env_or("RENDER_PROGRAM", "python3"),
            render_script: PathBuf::from(env_or("RENDER_SCRIPT", "./generate_videos.py")),
            render_log: PathBuf::from(env_or(
                "RENDER_LOG",
                if production { "/tmp/generate_videos.log" } else { "./generate_videos.log" },
            )),
            background_generation: env_flag("BACKGROUND_GENERATION"),
            github_token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            github,
            proxy: ProxyConfig {
                max_attempts: env_parse("PROXY_MAX_ATTEMPTS", 5),
                json_delay: Duration::from_millis(env_parse("PROXY_JSON_DELAY_MS", 1000)),
                video_delay: Duration::from_millis(env_parse("PROXY_VIDEO_DELAY_MS", 5000)),
                upstream_timeout: Duration::from_secs(env_parse("UPSTREAM_TIMEOUT_SECS", 60)),
            },
            environment,
        }
    }

    /// Defaults rooted at `root`, for tests and local tooling.
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let data_dir = root.join("data");
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment: "development".to_string(),
            backend: StorageBackend::Local,
            serve_dir: data_dir.join("videos"),
            data_dir,
            work_dir: root.join("work"),
            render_program: "python3".to_string(),
            render_script: root.join("generate_videos.py"),
            render_log: root.join("generate_videos.log"),
            background_generation: false,
            github_token: None,
            github: GitHubConfig {
                repo: "example/reels".to_string(),
                branch: "main".to_string(),
                remote_url: "https://github.com/example/reels.git".to_string(),
                raw_base: "https://raw.githubusercontent.com/example/reels/main".to_string(),
                author_name: "sports-reels-bot".to_string(),
                author_email: "sports-reels-bot@users.noreply.github.com".to_string(),
            },
            proxy: ProxyConfig {
                max_attempts: 5,
                json_delay: Duration::ZERO,
                video_delay: Duration::ZERO,
                upstream_timeout: Duration::from_secs(5),
            },
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
