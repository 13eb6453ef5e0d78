//! Diagnostics for `codex-switch doctor`.
//!
//! Checks the Codex home, the active credential, every saved profile, the
//! backups area, and the WSL pairing, reporting each with a pass/warn/fail icon.

use anstyle::AnsiColor;
use std::path::Path;

use crate::bridge::BridgeReport;
use crate::paths::Paths;
use crate::profiles::list_profiles;
use crate::switch::{AuthStatus, list_backups};
use crate::ui::Ui;

/// Run the doctor diagnostics
pub fn run_doctor(paths: &Paths, report: &BridgeReport, ui: &Ui) {
    ui.section("codex-switch Doctor");
    ui.newline();

    check_step(ui, "Codex Home", || {
        if paths.home.is_dir() {
            ui.println(format!("  {} {}", ui.icon_ok(), paths.home.display()));
            if paths.home_overridden {
                ui.println(format!("  {} set via CODEX_HOME", ui.icon_info()));
            }
            private_mode_note(ui, &paths.home, 0o700);
            true
        } else {
            ui.println(format!("  {} missing: {}", ui.icon_err(), paths.home.display()));
            false
        }
    });

    check_step(ui, "Active Credential", || match AuthStatus::detect(&paths.auth_file) {
        AuthStatus::Missing => {
            ui.println(format!(
                "  {} auth.json is missing (run `codex login`)",
                ui.icon_warn()
            ));
            true
        }
        AuthStatus::Unparseable => {
            ui.println(format!("  {} auth.json is not valid JSON", ui.icon_err()));
            false
        }
        AuthStatus::Present(identity) => {
            let who = identity
                .email
                .or(identity.account_id)
                .unwrap_or_else(|| "unknown account".to_string());
            ui.println(format!(
                "  {} {} ({})",
                ui.icon_ok(),
                who,
                identity.login_type
            ));
            private_mode_note(ui, &paths.auth_file, 0o600);
            true
        }
    });

    check_step(ui, "Profiles", || {
        let profiles = match list_profiles(paths) {
            Ok(p) => p,
            Err(e) => {
                ui.println(format!("  {} Failed to list profiles: {}", ui.icon_err(), e));
                return false;
            }
        };

        if profiles.is_empty() {
            ui.println(format!("  {} No profiles found", ui.icon_warn()));
            return true;
        }

        ui.println(format!("  Found {} profiles:", profiles.len()));
        let mut all_valid = true;
        for profile in &profiles {
            if matches!(AuthStatus::detect(&profile.auth_path), AuthStatus::Unparseable) {
                ui.println(format!(
                    "    {} {} (auth.json is not valid JSON)",
                    ui.icon_err(),
                    profile.name
                ));
                all_valid = false;
                continue;
            }
            match profile.meta() {
                Ok(_) => ui.println(format!("    {} {}", ui.icon_ok(), profile.name)),
                Err(e) => ui.println(format!(
                    "    {} {} (meta.json: {})",
                    ui.icon_warn(),
                    profile.name,
                    e
                )),
            }
        }
        all_valid
    });

    check_step(ui, "Backups", || match list_backups(paths) {
        Ok(backups) if backups.is_empty() => {
            ui.println(format!("  {} No backups yet", ui.icon_info()));
            true
        }
        Ok(backups) => {
            ui.println(format!(
                "  {} {} backup(s) in {}",
                ui.icon_ok(),
                backups.len(),
                paths.backups_dir.display()
            ));
            true
        }
        Err(e) => {
            ui.println(format!("  {} {}", ui.icon_err(), e));
            false
        }
    });

    check_step(ui, "WSL Bridge", || {
        if !report.nested {
            ui.println(format!("  {} Not running under WSL", ui.icon_info()));
            return true;
        }
        ui.println(format!("  {} Sync mode: {}", ui.icon_info(), report.mode));
        match &report.host_home {
            Some(host) => ui.println(format!("  {} Windows home: {}", ui.icon_ok(), host.display())),
            None => ui.println(format!("  {} Windows home not located", ui.icon_warn())),
        }
        if let Some(reason) = report.skipped {
            ui.println(format!("  {} No sync: {}", ui.icon_info(), reason.describe()));
        }
        if let Some(note) = report.action.note() {
            let icon = if report.action.wrote() { ui.icon_ok() } else { ui.icon_err() };
            ui.println(format!("  {} {}", icon, note));
            return report.action.wrote();
        }
        true
    });
}

#[cfg(unix)]
fn private_mode_note(ui: &Ui, path: &Path, expected: u32) {
    use std::os::unix::fs::PermissionsExt;
    let Ok(meta) = std::fs::metadata(path) else {
        return;
    };
    let mode = meta.permissions().mode() & 0o777;
    if mode & 0o077 != 0 {
        ui.println(format!(
            "  {} permissions are {:o}, expected {:o}",
            ui.icon_warn(),
            mode,
            expected
        ));
    }
}

#[cfg(not(unix))]
fn private_mode_note(_ui: &Ui, _path: &Path, _expected: u32) {}

fn check_step<F>(ui: &Ui, name: &str, check_fn: F)
where
    F: FnOnce() -> bool,
{
    ui.println(ui.bold(format!("Checking {}...", name)));
    if !check_fn() {
        ui.println(ui.colored("  Issues detected!", AnsiColor::Red));
    }
    ui.newline();
}
