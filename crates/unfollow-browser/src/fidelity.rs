//! Keeping the remote session looking like an ordinary desktop browser, and
//! keeping the host awake while it runs.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// LaunchProfile
// ---------------------------------------------------------------------------

pub const WINDOW_SIZES: [(u32, u32); 8] = [
    (1920, 1080),
    (1680, 1050),
    (1536, 864),
    (1440, 900),
    (1366, 768),
    (1280, 800),
    (1280, 720),
    (2560, 1440),
];

const CHROME_VERSIONS: [&str; 6] = [
    "131.0.0.0",
    "132.0.0.0",
    "133.0.0.0",
    "134.0.0.0",
    "135.0.0.0",
    "136.0.0.0",
];

const MAC_VERSIONS: [&str; 5] = ["10_15_7", "13_0_0", "14_0_0", "14_5_0", "15_0_0"];
const WINDOWS_VERSIONS: [&str; 2] = ["10.0", "11.0"];

/// A realistic desktop Chrome user agent with a random platform and version.
pub fn random_user_agent(rng: &mut impl Rng) -> String {
    let chrome = CHROME_VERSIONS.choose(rng).copied().unwrap_or("136.0.0.0");
    let platform = match rng.gen_range(0..3) {
        0 => format!(
            "Macintosh; Intel Mac OS X {}",
            MAC_VERSIONS.choose(rng).copied().unwrap_or("10_15_7")
        ),
        1 => format!(
            "Windows NT {}; Win64; x64",
            WINDOWS_VERSIONS.choose(rng).copied().unwrap_or("10.0")
        ),
        _ => "X11; Linux x86_64".to_string(),
    };
    format!(
        "Mozilla/5.0 ({platform}) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/{chrome} Safari/537.36"
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchProfile {
    /// Persistent user-data directory; keeps the login between runs.
    pub profile_dir: PathBuf,
    pub window: (u32, u32),
    pub user_agent: String,
    pub headless: bool,
}

impl LaunchProfile {
    pub fn randomized(profile_dir: impl Into<PathBuf>, headless: bool) -> Self {
        Self::with_rng(profile_dir, headless, &mut rand::thread_rng())
    }

    pub fn with_rng(profile_dir: impl Into<PathBuf>, headless: bool, rng: &mut impl Rng) -> Self {
        Self {
            profile_dir: profile_dir.into(),
            window: WINDOW_SIZES.choose(rng).copied().unwrap_or(WINDOW_SIZES[0]),
            user_agent: random_user_agent(rng),
            headless,
        }
    }

    pub fn chrome_args(&self) -> Vec<String> {
        let (w, h) = self.window;
        let mut args = vec![
            format!("--user-data-dir={}", self.profile_dir.display()),
            format!("--window-size={w},{h}"),
            format!("--user-agent={}", self.user_agent),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--disable-infobars".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
        ];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        args
    }

    /// Body of the W3C `POST /session` request.
    pub fn capabilities(&self) -> Value {
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "goog:chromeOptions": {
                        "args": self.chrome_args(),
                        "excludeSwitches": ["enable-automation"],
                        "useAutomationExtension": false,
                    }
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// SleepInhibitor
// ---------------------------------------------------------------------------

const WHO: &str = "unfollow";
const WHY: &str = "Unfollow session in progress";

fn platform_commands() -> Vec<(&'static str, Vec<String>)> {
    let owned = |args: &[&str]| args.iter().map(|a| a.to_string()).collect::<Vec<_>>();
    if cfg!(target_os = "macos") {
        vec![("caffeinate", owned(&["-i", "-d"]))]
    } else if cfg!(target_os = "windows") {
        let script = "Add-Type -Namespace Power -Name Api -MemberDefinition \
            '[DllImport(\"kernel32.dll\")] public static extern uint SetThreadExecutionState(uint f);'; \
            while ($true) { [Power.Api]::SetThreadExecutionState(0x80000003) | Out-Null; Start-Sleep -Seconds 30 }";
        vec![(
            "powershell",
            owned(&["-NoProfile", "-NonInteractive", "-Command", script]),
        )]
    } else {
        vec![
            (
                "systemd-inhibit",
                vec![
                    "--what=idle:sleep".to_string(),
                    format!("--who={WHO}"),
                    format!("--why={WHY}"),
                    "sleep".to_string(),
                    "infinity".to_string(),
                ],
            ),
            (
                "gnome-session-inhibit",
                vec![
                    "--inhibit=idle:suspend".to_string(),
                    format!("--reason={WHY}"),
                    "sleep".to_string(),
                    "infinity".to_string(),
                ],
            ),
        ]
    }
}

/// Background process that stops the host from sleeping. Killed on drop.
#[derive(Debug, Default)]
pub struct SleepInhibitor {
    child: Option<Child>,
}

impl SleepInhibitor {
    /// Start the platform inhibitor. Failure is logged, never returned.
    pub fn start() -> Self {
        Self::start_with(&platform_commands())
    }

    fn start_with(commands: &[(&str, Vec<String>)]) -> Self {
        for (program, args) in commands {
            let Ok(path) = which::which(program) else {
                tracing::debug!(program, "sleep inhibitor not installed");
                continue;
            };
            match spawn_quiet(&path, args) {
                Ok(mut child) => {
                    if let Ok(Some(status)) = child.try_wait() {
                        tracing::debug!(program, %status, "sleep inhibitor exited immediately");
                        continue;
                    }
                    tracing::info!(program, "sleep prevention enabled");
                    return Self { child: Some(child) };
                }
                Err(e) => tracing::debug!(program, error = %e, "sleep inhibitor failed to start"),
            }
        }
        tracing::warn!("could not prevent system sleep; keep the machine awake manually");
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.child.is_some()
    }

    pub fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
            tracing::info!("sleep prevention disabled");
        }
    }
}

impl Drop for SleepInhibitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn spawn_quiet(program: &Path, args: &[String]) -> std::io::Result<Child> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
}
