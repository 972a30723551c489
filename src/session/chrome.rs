//! Chrome/Chromium launcher with a remote debugging port

use super::{SessionHandle, SessionLauncher};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use rand::Rng;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

/// Interval between readiness probes
const PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// Per-request timeout of one readiness probe
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Executable names tried on PATH
const BROWSER_NAMES: [&str; 5] = [
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Launches a local Chrome or Chromium with a dedicated profile
///
/// # Examples
///
/// ```no_run
/// use section_dl::config::SessionConfig;
/// use section_dl::session::{ChromeLauncher, start_session};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SessionConfig::default();
/// let launcher = ChromeLauncher::from_config(&config)?;
/// let session = start_session(&launcher, &config, "https://www.etsy.com/").await?;
/// println!("browser ready on port {}", session.port());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ChromeLauncher {
    executable: PathBuf,
    profile_dir: PathBuf,
    probe: reqwest::Client,
    poll_interval: Duration,
}

impl ChromeLauncher {
    /// Create a launcher for an explicit executable and profile directory
    pub fn new(executable: PathBuf, profile_dir: PathBuf) -> Self {
        let probe = reqwest::Client::builder()
            .timeout(PROBE_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Falling back to default probe client");
                reqwest::Client::new()
            });

        Self {
            executable,
            profile_dir,
            probe,
            poll_interval: PROBE_INTERVAL,
        }
    }

    /// Create a launcher from session settings, locating the browser if no path is set
    ///
    /// # Errors
    ///
    /// Returns [`Error::Launch`] if no browser executable can be found.
    pub fn from_config(config: &SessionConfig) -> Result<Self> {
        let executable = match &config.browser_path {
            Some(path) => path.clone(),
            None => find_browser(config.search_path).ok_or_else(|| {
                Error::Launch(
                    "no Chrome or Chromium executable found; set session.browser_path".to_string(),
                )
            })?,
        };

        Ok(Self::new(executable, config.profile_dir.clone()))
    }

    /// Override how often readiness is probed
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Browser executable this launcher starts
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Command-line arguments for a launch
    pub fn launch_args(&self, initial_url: &str, port: u16) -> Vec<String> {
        let mut rng = rand::thread_rng();
        let width: u32 = rng.gen_range(1200..=1920);
        let height: u32 = rng.gen_range(800..=1080);

        vec![
            format!("--remote-debugging-port={port}"),
            format!("--user-data-dir={}", self.profile_dir.display()),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            format!("--window-size={width},{height}"),
            initial_url.to_string(),
        ]
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    async fn launch(&self, initial_url: &str, port: u16) -> Result<SessionHandle> {
        tokio::fs::create_dir_all(&self.profile_dir)
            .await
            .map_err(|e| {
                Error::Launch(format!(
                    "cannot create profile directory {}: {e}",
                    self.profile_dir.display()
                ))
            })?;

        let child = Command::new(&self.executable)
            .args(self.launch_args(initial_url, port))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                Error::Launch(format!(
                    "failed to start {}: {e}",
                    self.executable.display()
                ))
            })?;

        tracing::info!(
            executable = %self.executable.display(),
            port,
            pid = ?child.id(),
            "Launched browser"
        );

        Ok(SessionHandle::spawned(port, child))
    }

    async fn await_ready(&self, port: u16, timeout: Duration) -> bool {
        await_debug_endpoint(&self.probe, port, timeout, self.poll_interval).await
    }

    fn name(&self) -> &str {
        "chrome"
    }
}

/// Poll `http://127.0.0.1:{port}/json/version` until it answers with a success status
///
/// Returns `false` if `timeout` elapses first.
pub async fn await_debug_endpoint(
    client: &reqwest::Client,
    port: u16,
    timeout: Duration,
    poll_interval: Duration,
) -> bool {
    let url = format!("http://127.0.0.1:{port}/json/version");
    let deadline = tokio::time::Instant::now() + timeout;

    loop {
        match client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => return true,
            Ok(resp) => tracing::debug!(port, status = %resp.status(), "Debug endpoint not ready"),
            Err(e) => tracing::debug!(port, error = %e, "Debug endpoint unreachable"),
        }

        if tokio::time::Instant::now() + poll_interval > deadline {
            return false;
        }
        tokio::time::sleep(poll_interval).await;
    }
}

/// Locate a Chrome or Chromium executable
///
/// Checks the usual install locations for the current platform, then (if `search_path`)
/// the executable names on PATH.
pub fn find_browser(search_path: bool) -> Option<PathBuf> {
    if let Some(path) = platform_candidates().into_iter().find(|p| p.is_file()) {
        tracing::debug!(path = %path.display(), "Found browser at install location");
        return Some(path);
    }

    if search_path {
        for name in BROWSER_NAMES {
            if let Ok(path) = which::which(name) {
                tracing::debug!(path = %path.display(), "Found browser on PATH");
                return Some(path);
            }
        }
    }

    None
}

fn platform_candidates() -> Vec<PathBuf> {
    if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome"),
            PathBuf::from("/Applications/Chromium.app/Contents/MacOS/Chromium"),
        ]
    } else if cfg!(target_os = "windows") {
        let mut paths = Vec::new();
        for var in ["ProgramFiles", "ProgramFiles(x86)", "LocalAppData"] {
            if let Ok(base) = std::env::var(var) {
                paths.push(
                    PathBuf::from(base)
                        .join("Google")
                        .join("Chrome")
                        .join("Application")
                        .join("chrome.exe"),
                );
            }
        }
        paths
    } else {
        vec![
            PathBuf::from("/usr/bin/google-chrome"),
            PathBuf::from("/usr/bin/google-chrome-stable"),
            PathBuf::from("/usr/bin/chromium"),
            PathBuf::from("/usr/bin/chromium-browser"),
            PathBuf::from("/snap/bin/chromium"),
        ]
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn launcher() -> ChromeLauncher {
        ChromeLauncher::new(
            PathBuf::from("/nonexistent/chrome"),
            PathBuf::from("/tmp/section-dl-profile"),
        )
        .with_poll_interval(Duration::from_millis(50))
    }

    #[test]
    fn launch_args_carry_port_profile_and_url() {
        let args = launcher().launch_args("https://www.etsy.com/", 9333);

        assert_eq!(args[0], "--remote-debugging-port=9333");
        assert_eq!(args[1], "--user-data-dir=/tmp/section-dl-profile");
        assert!(args.contains(&"--no-first-run".to_string()));
        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        assert_eq!(args.last().unwrap(), "https://www.etsy.com/");
    }

    #[test]
    fn window_size_is_within_range() {
        for _ in 0..50 {
            let args = launcher().launch_args("about:blank", 9222);
            let size = args
                .iter()
                .find_map(|a| a.strip_prefix("--window-size="))
                .unwrap();
            let (w, h) = size.split_once(',').unwrap();
            let (w, h): (u32, u32) = (w.parse().unwrap(), h.parse().unwrap());
            assert!((1200..=1920).contains(&w));
            assert!((800..=1080).contains(&h));
        }
    }

    #[tokio::test]
    async fn launch_of_missing_executable_is_launch_error() {
        let profile = tempfile::tempdir().unwrap();
        let launcher = ChromeLauncher::new(
            PathBuf::from("/nonexistent/chrome"),
            profile.path().join("profile"),
        );

        let err = launcher.launch("about:blank", 9222).await.unwrap_err();
        assert!(matches!(err, Error::Launch(_)));
    }

    #[tokio::test]
    async fn ready_when_version_endpoint_answers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"Browser\":\"Chrome\"}"))
            .mount(&server)
            .await;

        let port = server.address().port();
        assert!(launcher().await_ready(port, Duration::from_secs(5)).await);
    }

    #[tokio::test]
    async fn not_ready_while_endpoint_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let port = server.address().port();
        assert!(!launcher().await_ready(port, Duration::from_millis(300)).await);
    }

    #[tokio::test]
    async fn not_ready_when_nothing_listens() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let started = std::time::Instant::now();
        assert!(!launcher().await_ready(port, Duration::from_millis(300)).await);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn explicit_browser_path_skips_discovery() {
        let config = SessionConfig {
            browser_path: Some(PathBuf::from("/opt/custom/chrome")),
            ..SessionConfig::default()
        };
        let launcher = ChromeLauncher::from_config(&config).unwrap();
        assert_eq!(launcher.executable(), Path::new("/opt/custom/chrome"));
    }
}
