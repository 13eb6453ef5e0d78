//! WSL ↔ Windows credential bridge.
//!
//! Inside WSL, Codex reads `~/.codex/auth.json` from the Linux home while
//! Codex on the Windows side reads `%USERPROFILE%\.codex\auth.json`. This
//! module finds the Windows copy and reconciles the two according to
//! [`SyncMode`]:
//!
//! - `off`: nothing happens.
//! - `bootstrap`: import the Windows file only if there is no local one.
//! - `newest`: copy the more recently modified file over the other; files
//!   modified within the configured threshold are left alone. A local file
//!   about to be replaced is backed up first.
//!
//! The bridge runs at most once per process, before anything reads the active
//! credential, and only when the home directory was not set explicitly. Failing
//! to find or reach the Windows side is never an error; the bridge just does
//! nothing.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant, SystemTime};

use chrono::Utc;

use crate::config::{Settings, SyncMode};
use crate::fs_utils::{copy_private, ensure_private_dir};
use crate::paths::{HOME_DIR_NAME, Paths, auth_file_in, expand_tilde};
use crate::switch::backup_active_auth;

/// Where Windows user profiles are mounted inside WSL.
pub const DEFAULT_USERS_ROOT: &str = "/mnt/c/Users";
/// Upper bound for each interop shell call.
pub const INTEROP_TIMEOUT: Duration = Duration::from_secs(3);

const CMD_EXE: &str = "cmd.exe";
const CMD_EXE_ABSOLUTE: &str = "/mnt/c/Windows/System32/cmd.exe";
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Source of host paths, expressed as local paths.
pub trait HostPathResolver {
    /// The host's `%USERPROFILE%` directory.
    fn user_profile_dir(&self) -> Option<PathBuf>;

    /// Convert a host path such as `C:\Users\me\.codex`.
    fn to_local_path(&self, host_path: &str) -> Option<PathBuf> {
        drive_path_to_mount(host_path.trim())
    }
}

/// Asks Windows for `%USERPROFILE%` through WSL interop.
#[derive(Debug, Clone)]
pub struct InteropResolver {
    pub timeout: Duration,
}

impl Default for InteropResolver {
    fn default() -> Self {
        Self {
            timeout: INTEROP_TIMEOUT,
        }
    }
}

impl HostPathResolver for InteropResolver {
    fn user_profile_dir(&self) -> Option<PathBuf> {
        let args = ["/c", "echo", "%USERPROFILE%"];
        let raw = run_capture(CMD_EXE, &args, self.timeout)
            .or_else(|| run_capture(CMD_EXE_ABSOLUTE, &args, self.timeout))?;
        // An undefined variable is echoed back verbatim.
        if raw.contains('%') {
            return None;
        }
        windows_to_local_path(&raw, self.timeout)
    }

    fn to_local_path(&self, host_path: &str) -> Option<PathBuf> {
        windows_to_local_path(host_path, self.timeout)
    }
}

/// Resolver returning a preset answer.
#[derive(Debug, Clone, Default)]
pub struct FixedResolver(pub Option<PathBuf>);

impl HostPathResolver for FixedResolver {
    fn user_profile_dir(&self) -> Option<PathBuf> {
        self.0.clone()
    }
}

/// Signals used to decide whether we are running under WSL.
#[derive(Debug, Clone, Default)]
pub struct EnvironmentProbe {
    /// `WSL_DISTRO_NAME` or `WSL_INTEROP` is set.
    pub distro_marker: bool,
    /// Contents of `/proc/sys/kernel/osrelease`.
    pub kernel_release: Option<String>,
    /// Contents of `/proc/version`.
    pub proc_version: Option<String>,
}

impl EnvironmentProbe {
    pub fn from_system() -> Self {
        if cfg!(windows) {
            return Self::default();
        }
        let marker = |key: &str| std::env::var(key).is_ok_and(|v| !v.is_empty());
        Self {
            distro_marker: marker("WSL_DISTRO_NAME") || marker("WSL_INTEROP"),
            kernel_release: fs::read_to_string("/proc/sys/kernel/osrelease").ok(),
            proc_version: fs::read_to_string("/proc/version").ok(),
        }
    }

    pub fn is_nested_linux(&self) -> bool {
        if self.distro_marker {
            return true;
        }
        let release = self.kernel_release.as_deref().unwrap_or("").to_lowercase();
        if release.contains("microsoft") || release.contains("wsl") {
            return true;
        }
        let version = self.proc_version.as_deref().unwrap_or("").to_lowercase();
        version.contains("microsoft")
    }
}

/// Why the bridge did not attempt a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotNested,
    HomeOverridden,
    Disabled,
    HostNotFound,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::NotNested => "not running under WSL",
            SkipReason::HomeOverridden => "CODEX_HOME is set explicitly",
            SkipReason::Disabled => "sync is turned off",
            SkipReason::HostNotFound => "Windows Codex home not found",
        }
    }
}

/// What the bridge did to the two credential files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    NoChange,
    /// Local was missing; copied host → local.
    Imported { from: PathBuf },
    /// Host was missing; copied local → host.
    Exported { to: PathBuf },
    /// Host was newer; copied host → local.
    UpdatedLocal { from: PathBuf },
    /// Local was newer; copied local → host.
    UpdatedHost { to: PathBuf },
    Failed { reason: String },
}

impl SyncAction {
    /// One-line status note, `None` when nothing was written.
    pub fn note(&self) -> Option<String> {
        match self {
            SyncAction::NoChange => None,
            SyncAction::Imported { from } => {
                Some(format!("Imported auth.json from Windows: {}", from.display()))
            }
            SyncAction::Exported { to } => {
                Some(format!("Exported auth.json to Windows: {}", to.display()))
            }
            SyncAction::UpdatedLocal { from } => Some(format!(
                "Updated auth.json from Windows (newer): {}",
                from.display()
            )),
            SyncAction::UpdatedHost { to } => Some(format!(
                "Updated auth.json in Windows (newer in WSL): {}",
                to.display()
            )),
            SyncAction::Failed { reason } => Some(format!("Sync failed: {}", reason)),
        }
    }

    pub fn wrote(&self) -> bool {
        !matches!(self, SyncAction::NoChange | SyncAction::Failed { .. })
    }
}

/// Outcome of running the bridge once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeReport {
    pub mode: SyncMode,
    pub nested: bool,
    pub skipped: Option<SkipReason>,
    /// Host-side Codex home, when one was located.
    pub host_home: Option<PathBuf>,
    pub action: SyncAction,
}

impl BridgeReport {
    fn skipped(mode: SyncMode, nested: bool, reason: SkipReason) -> Self {
        Self {
            mode,
            nested,
            skipped: Some(reason),
            host_home: None,
            action: SyncAction::NoChange,
        }
    }

    /// Report for a process where the bridge was never consulted.
    pub fn inactive() -> Self {
        Self::skipped(SyncMode::Off, false, SkipReason::NotNested)
    }
}

#[derive(Debug, Clone)]
pub struct Bridge<R> {
    mode: SyncMode,
    threshold: Duration,
    host_home_override: Option<String>,
    users_root: PathBuf,
    resolver: R,
}

impl Bridge<InteropResolver> {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            mode: settings.sync_mode,
            threshold: settings.sync_threshold,
            host_home_override: settings.host_home_override.clone(),
            users_root: PathBuf::from(DEFAULT_USERS_ROOT),
            resolver: InteropResolver::default(),
        }
    }
}

impl<R: HostPathResolver> Bridge<R> {
    pub fn with_resolver<R2: HostPathResolver>(self, resolver: R2) -> Bridge<R2> {
        Bridge {
            mode: self.mode,
            threshold: self.threshold,
            host_home_override: self.host_home_override,
            users_root: self.users_root,
            resolver,
        }
    }

    pub fn with_users_root(mut self, users_root: impl Into<PathBuf>) -> Self {
        self.users_root = users_root.into();
        self
    }

    /// Decide and apply the sync for this process.
    pub fn run(&self, paths: &Paths, probe: &EnvironmentProbe) -> BridgeReport {
        let nested = probe.is_nested_linux();
        if !nested {
            return BridgeReport::skipped(self.mode, false, SkipReason::NotNested);
        }
        if paths.home_overridden {
            return BridgeReport::skipped(self.mode, true, SkipReason::HomeOverridden);
        }
        if self.mode == SyncMode::Off {
            return BridgeReport::skipped(self.mode, true, SkipReason::Disabled);
        }

        let Some(host_home) = self.locate_host_home() else {
            tracing::debug!("no Windows Codex home found; skipping sync");
            return BridgeReport::skipped(self.mode, true, SkipReason::HostNotFound);
        };

        let action = self.reconcile(&paths.home, &host_home);
        if let Some(note) = action.note() {
            tracing::info!(mode = %self.mode, "{note}");
        }

        BridgeReport {
            mode: self.mode,
            nested: true,
            skipped: None,
            host_home: Some(host_home),
            action,
        }
    }

    /// Find the Windows-side Codex home.
    ///
    /// Tried in order: the explicit override, `%USERPROFILE%\.codex`, then the
    /// most recently used `<users root>/*/.codex` holding an `auth.json`.
    pub fn locate_host_home(&self) -> Option<PathBuf> {
        if let Some(raw) = &self.host_home_override {
            // UNC paths are not reachable from WSL without extra mounts.
            if raw.starts_with('\\') || raw.starts_with("//") {
                tracing::debug!("ignoring UNC host home override {raw}");
                return None;
            }
            let direct = expand_tilde(raw).unwrap_or_else(|_| PathBuf::from(raw));
            if direct.exists() {
                return Some(direct);
            }
            if let Some(converted) = self.resolver.to_local_path(raw)
                && converted.exists()
            {
                return Some(converted);
            }
        }

        if let Some(profile) = self.resolver.user_profile_dir() {
            let candidate = profile.join(HOME_DIR_NAME);
            if candidate.exists() {
                return Some(candidate);
            }
        }

        scan_users_root(&self.users_root)
    }

    /// Apply the configured policy to a local and a host home.
    pub fn reconcile(&self, local_home: &Path, host_home: &Path) -> SyncAction {
        let local_auth = auth_file_in(local_home);
        let host_auth = auth_file_in(host_home);
        let local_exists = local_auth.exists();
        let host_exists = host_auth.exists();

        match self.mode {
            SyncMode::Off => SyncAction::NoChange,
            SyncMode::Bootstrap => {
                if local_exists || !host_exists {
                    return SyncAction::NoChange;
                }
                import(local_home, &host_auth, &local_auth, |from| SyncAction::Imported {
                    from,
                })
            }
            SyncMode::Newest => match (local_exists, host_exists) {
                (false, false) => SyncAction::NoChange,
                (false, true) => import(local_home, &host_auth, &local_auth, |from| {
                    SyncAction::Imported { from }
                }),
                (true, false) => export(&local_auth, &host_auth, |to| SyncAction::Exported { to }),
                (true, true) => {
                    let (Some(local_m), Some(host_m)) = (mtime(&local_auth), mtime(&host_auth))
                    else {
                        return SyncAction::NoChange;
                    };
                    if abs_diff(local_m, host_m) < self.threshold {
                        return SyncAction::NoChange;
                    }
                    if host_m > local_m {
                        let local = Paths::with_home(local_home, false);
                        if let Err(e) = backup_active_auth(&local, Utc::now()) {
                            tracing::warn!("failed to back up auth.json before sync: {e}");
                            return SyncAction::Failed {
                                reason: e.to_string(),
                            };
                        }
                        import(local_home, &host_auth, &local_auth, |from| {
                            SyncAction::UpdatedLocal { from }
                        })
                    } else {
                        export(&local_auth, &host_auth, |to| SyncAction::UpdatedHost { to })
                    }
                }
            },
        }
    }
}

fn import(
    local_home: &Path,
    host_auth: &Path,
    local_auth: &Path,
    done: impl FnOnce(PathBuf) -> SyncAction,
) -> SyncAction {
    let result = ensure_private_dir(local_home).and_then(|_| copy_private(host_auth, local_auth));
    match result {
        Ok(()) => done(host_auth.to_path_buf()),
        Err(e) => {
            tracing::warn!("failed to import Windows auth.json: {e}");
            SyncAction::Failed {
                reason: e.to_string(),
            }
        }
    }
}

fn export(
    local_auth: &Path,
    host_auth: &Path,
    done: impl FnOnce(PathBuf) -> SyncAction,
) -> SyncAction {
    match copy_private(local_auth, host_auth) {
        Ok(()) => done(host_auth.to_path_buf()),
        Err(e) => {
            tracing::warn!("failed to export auth.json to Windows: {e}");
            SyncAction::Failed {
                reason: e.to_string(),
            }
        }
    }
}

fn mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn abs_diff(a: SystemTime, b: SystemTime) -> Duration {
    a.duration_since(b)
        .or_else(|_| b.duration_since(a))
        .unwrap_or_default()
}

/// Pick the `<root>/<user>/.codex` whose `auth.json` was modified last.
fn scan_users_root(root: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(root).ok()?;
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .filter_map(|user_dir| {
            let home = user_dir.join(HOME_DIR_NAME);
            let modified = mtime(&auth_file_in(&home))?;
            Some((modified, home))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, home)| home)
}

/// Convert a Windows path (`C:\Users\me`) into its WSL mount path.
///
/// Prefers `wslpath -u`, which understands every mount layout; falls back to
/// the default `/mnt/<drive>/...` scheme for plain drive paths.
pub fn windows_to_local_path(raw: &str, timeout: Duration) -> Option<PathBuf> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Some(out) = run_capture("wslpath", &["-u", raw], timeout) {
        return Some(PathBuf::from(out));
    }
    drive_path_to_mount(raw)
}

/// `C:\Users\me` -> `/mnt/c/Users/me`
pub fn drive_path_to_mount(raw: &str) -> Option<PathBuf> {
    let mut chars = raw.chars();
    let drive = chars.next().filter(|c| c.is_ascii_alphabetic())?;
    if chars.next() != Some(':') {
        return None;
    }
    if !matches!(chars.next(), Some('\\') | Some('/')) {
        return None;
    }
    let rest = chars.as_str().replace('\\', "/");
    Some(PathBuf::from(format!(
        "/mnt/{}/{}",
        drive.to_ascii_lowercase(),
        rest
    )))
}

/// Run a short command and return its trimmed stdout.
///
/// Missing programs, non-UTF-8 or empty output, and commands that outlive
/// `timeout` (which are killed) all yield `None`.
pub fn run_capture(program: &str, args: &[&str], timeout: Duration) -> Option<String> {
    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            tracing::debug!(program, "could not spawn: {e}");
            return None;
        }
    };

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) if Instant::now() >= deadline => {
                tracing::debug!(program, "timed out after {:?}", timeout);
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
            Ok(None) => std::thread::sleep(POLL_INTERVAL),
            Err(e) => {
                tracing::debug!(program, "wait failed: {e}");
                let _ = child.kill();
                return None;
            }
        }
    }

    let mut out = String::new();
    child.stdout.take()?.read_to_string(&mut out).ok()?;
    let out = out.trim();
    (!out.is_empty()).then(|| out.to_string())
}
