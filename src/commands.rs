//! High-level command orchestration for the CLI.
//!
//! Each function here corresponds to a subcommand in `main.rs` and coordinates
//! the registry (`crate::profiles`), the active credential (`crate::switch`)
//! and output (`crate::ui`).

use anstyle::AnsiColor;
use anyhow::{Result, bail};

use crate::bridge::BridgeReport;
use crate::doctor::run_doctor;
use crate::identity::{self, IdentitySummary, shorten};
use crate::paths::Paths;
use crate::profiles::{
    delete_profile, find_profile, list_profiles, profile_exists, save_current_as_profile,
    validate_profile_name,
};
use crate::switch::{list_backups, read_current_identity, restore_backup, switch_to_profile};
use crate::ui::Ui;

/// `a@b.com`, falling back to a shortened account id.
fn identity_label(identity: &IdentitySummary) -> String {
    if let Some(email) = &identity.email {
        email.clone()
    } else if let Some(account_id) = &identity.account_id {
        format!("account_id={}", shorten(account_id))
    } else {
        "-".to_string()
    }
}

fn login_label(identity: &IdentitySummary) -> String {
    if identity.login_type.is_known() {
        identity.login_type.to_string()
    } else {
        "-".to_string()
    }
}

/// List all saved profiles
pub fn list(paths: &Paths, ui: &Ui) -> Result<()> {
    let profiles = list_profiles(paths)?;

    if profiles.is_empty() {
        ui.warn("No profiles found.");
        ui.newline();
        ui.println("Save the current account with:");
        ui.println(format!("  {} save <name>", ui.bold("codex-switch")));
        return Ok(());
    }

    let current = read_current_identity(paths);

    let mut table = ui.simple_table();
    table.set_header(vec![
        ui.header_cell(""),
        ui.header_cell("Profile"),
        ui.header_cell("Account"),
        ui.header_cell("Type"),
        ui.header_cell("Saved"),
    ]);

    for profile in &profiles {
        let is_active = current.same_account(&profile.identity);
        let saved = profile
            .meta()
            .map(|m| m.created_at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| "?".to_string());

        table.add_row(vec![
            ui.cell(if is_active { ui.icon_ok() } else { " " }),
            if is_active {
                ui.colored_cell(&profile.name, AnsiColor::Green)
            } else {
                ui.cell(&profile.name)
            },
            ui.cell(identity_label(&profile.identity)),
            ui.cell(login_label(&profile.identity)),
            ui.cell(saved),
        ]);
    }

    ui.section("Profiles");
    ui.println(table.to_string());
    Ok(())
}

/// Show the active account and where it lives
pub fn current(paths: &Paths, report: &BridgeReport, ui: &Ui) -> Result<()> {
    ui.section("Current Account");
    ui.newline();

    let mut table = ui.simple_table();

    if paths.auth_file.exists() {
        let identity = read_current_identity(paths);
        if identity.is_empty() {
            table.add_row(vec![
                ui.cell("Account:"),
                ui.colored_cell("could not be determined", AnsiColor::Yellow),
            ]);
        } else {
            if let Some(email) = &identity.email {
                table.add_row(vec![ui.cell("Email:"), ui.header_cell(email)]);
            }
            if let Some(account_id) = &identity.account_id {
                table.add_row(vec![ui.cell("Account id:"), ui.cell(shorten(account_id))]);
            }
            table.add_row(vec![ui.cell("Login type:"), ui.cell(login_label(&identity))]);
        }

        let matching: Vec<String> = list_profiles(paths)?
            .into_iter()
            .filter(|p| identity.same_account(&p.identity))
            .map(|p| p.name)
            .collect();
        if !matching.is_empty() {
            table.add_row(vec![
                ui.cell("Saved as:"),
                ui.colored_cell(matching.join(", "), AnsiColor::Green),
            ]);
        }
    } else {
        table.add_row(vec![
            ui.cell("Account:"),
            ui.colored_cell("auth.json not found (run `codex login` first)", AnsiColor::Yellow),
        ]);
    }

    table.add_row(vec![ui.cell("CODEX_HOME:"), ui.cell(paths.home.display().to_string())]);
    if report.nested {
        let host = report
            .host_home
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not found)".to_string());
        table.add_row(vec![ui.cell("Windows CODEX_HOME:"), ui.cell(host)]);
    }

    ui.println(table.to_string());

    if let Some(note) = report.action.note() {
        ui.newline();
        ui.info(note);
    }
    Ok(())
}

/// Save the active credential as a profile
pub fn save(paths: &Paths, name: &str, force: bool, ui: &Ui) -> Result<()> {
    let name = validate_profile_name(name)?;

    if !paths.auth_file.exists() {
        bail!(
            "No active credential at {}.\nHint: Run `codex login` first.",
            paths.auth_file.display()
        );
    }

    let mut overwrite = force;
    if !overwrite && profile_exists(paths, &name) {
        match ui.confirm(
            &format!("Profile '{}' already exists. Overwrite?", name),
            "The saved credential will be replaced by the current one",
        )? {
            Some(true) => overwrite = true,
            Some(false) => {
                ui.warn("Save cancelled.");
                return Ok(());
            }
            None => bail!(
                "Profile '{}' already exists.\nHint: Use --force to overwrite it.",
                name
            ),
        }
    }

    let profile = save_current_as_profile(paths, &name, overwrite)?;

    ui.ok(format!("Saved profile '{}'", profile.name));
    ui.println(format!(
        "  {} {}",
        ui.icon_info(),
        identity_label(&profile.identity)
    ));
    Ok(())
}

/// Switch to a profile
pub fn use_profile(paths: &Paths, name: &str, ui: &Ui) -> Result<()> {
    let profile = find_profile(paths, name).map_err(|e| {
        anyhow::anyhow!("{}\nHint: Use 'codex-switch list' to see available profiles.", e)
    })?;

    let spinner = ui.spinner(format!("Switching to profile '{}'...", profile.name));

    match switch_to_profile(paths, &profile) {
        Ok(outcome) => {
            ui.spinner_finish_ok(&spinner, format!("Active profile: {}", profile.name));
            if let Some(backup) = outcome.backup {
                ui.println(ui.dim(format!("  previous auth.json saved to {}", backup.display())));
            }
            ui.println(ui.dim("  Start a new `codex` session to pick up the switch."));
            Ok(())
        }
        Err(e) => {
            ui.spinner_finish_err(&spinner, format!("Failed to switch: {}", e));
            Err(e.into())
        }
    }
}

/// Remove a profile
pub fn remove(paths: &Paths, name: &str, force: bool, ui: &Ui) -> Result<()> {
    let name = validate_profile_name(name)?;
    if !profile_exists(paths, &name) {
        bail!(
            "Profile '{}' does not exist.\nHint: Use 'codex-switch list' to see available profiles.",
            name
        );
    }

    if !force {
        let question = format!("Remove profile '{}'?", name);
        let help = format!("This deletes {}", paths.profile_dir(&name).display());
        match ui.confirm(&question, &help)? {
            Some(true) => {}
            Some(false) => {
                ui.warn("Removal cancelled.");
                return Ok(());
            }
            None => bail!("Refusing to remove '{}' without confirmation.\nHint: Use --force.", name),
        }
    }

    let saved = identity::extract_from_path(&paths.profile_auth(&name));
    let was_active = read_current_identity(paths).same_account(&saved);

    delete_profile(paths, &name)?;
    ui.ok(format!("Removed profile '{}'", name));
    if was_active {
        ui.println(ui.dim("  It was the active account; auth.json itself is unchanged."));
    }
    Ok(())
}

/// Show details of a saved profile
pub fn inspect(paths: &Paths, name: &str, ui: &Ui) -> Result<()> {
    let profile = find_profile(paths, name)?;

    ui.section(format!("Profile: {}", profile.name));
    ui.newline();

    let mut table = ui.simple_table();
    table.add_row(vec![ui.cell("Directory:"), ui.cell(profile.directory.display().to_string())]);
    table.add_row(vec![ui.cell("Account:"), ui.cell(identity_label(&profile.identity))]);
    if let Some(account_id) = &profile.identity.account_id {
        table.add_row(vec![ui.cell("Account id:"), ui.cell(account_id)]);
    }
    table.add_row(vec![ui.cell("Login type:"), ui.cell(login_label(&profile.identity))]);

    match profile.meta() {
        Ok(meta) => {
            table.add_row(vec![
                ui.cell("Saved:"),
                ui.cell(meta.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()),
            ]);
            if meta.account_id != profile.identity.account_id {
                table.add_row(vec![
                    ui.cell(""),
                    ui.colored_cell("meta.json does not match auth.json", AnsiColor::Yellow),
                ]);
            }
        }
        Err(e) => {
            table.add_row(vec![ui.cell("Saved:"), ui.colored_cell(e.to_string(), AnsiColor::Yellow)]);
        }
    }

    let active = read_current_identity(paths).same_account(&profile.identity);
    table.add_row(vec![
        ui.cell("Active:"),
        if active {
            ui.colored_cell("yes", AnsiColor::Green)
        } else {
            ui.cell("no")
        },
    ]);

    ui.println(table.to_string());
    Ok(())
}

/// List auth.json backups
pub fn backup_list(paths: &Paths, ui: &Ui) -> Result<()> {
    let backups = list_backups(paths)?;

    if backups.is_empty() {
        ui.warn("No backups found.");
        ui.newline();
        ui.println("Backups are created automatically when switching profiles.");
        return Ok(());
    }

    ui.section("Backups");
    ui.newline();

    let mut table = ui.table();
    table.set_header(vec![
        ui.header_cell("ID"),
        ui.header_cell("Taken"),
        ui.header_cell("Account"),
        ui.header_cell("Size"),
    ]);
    for backup in &backups {
        table.add_row(vec![
            ui.cell(&backup.id),
            ui.cell(backup.taken_at.format("%Y-%m-%d %H:%M:%S").to_string()),
            ui.cell(identity_label(&backup.identity)),
            ui.cell(format!("{} B", backup.size)),
        ]);
    }

    ui.println(table.to_string());
    ui.newline();
    ui.info(format!("{} backup(s) in {}", backups.len(), paths.backups_dir.display()));
    Ok(())
}

/// Restore a backup into the active location
pub fn backup_restore(paths: &Paths, id: &str, force: bool, ui: &Ui) -> Result<()> {
    if !force {
        let question = format!("Restore '{}' to {}?", id, paths.auth_file.display());
        match ui.confirm(&question, "The current auth.json is backed up first")? {
            Some(true) => {}
            Some(false) => {
                ui.warn("Restore cancelled.");
                return Ok(());
            }
            None => bail!("Refusing to restore without confirmation.\nHint: Use --force."),
        }
    }

    let outcome = restore_backup(paths, id).map_err(|e| {
        anyhow::anyhow!("{}\nHint: Use 'codex-switch backup list' to see available backups.", e)
    })?;

    ui.ok(format!("Restored '{}'", id));
    if let Some(backup) = outcome.backup {
        ui.println(ui.dim(format!("  previous auth.json saved to {}", backup.display())));
    }
    Ok(())
}

/// Report what the WSL bridge did at startup
pub fn sync(report: &BridgeReport, ui: &Ui) -> Result<()> {
    ui.section("WSL Sync");
    ui.newline();

    let mut table = ui.simple_table();
    table.add_row(vec![ui.cell("Mode:"), ui.cell(report.mode.to_string())]);
    table.add_row(vec![
        ui.cell("WSL:"),
        ui.cell(if report.nested { "yes" } else { "no" }),
    ]);
    if let Some(host) = &report.host_home {
        table.add_row(vec![ui.cell("Windows home:"), ui.cell(host.display().to_string())]);
    }
    ui.println(table.to_string());
    ui.newline();

    match (&report.skipped, report.action.note()) {
        (Some(reason), _) => ui.info(format!("No sync: {}", reason.describe())),
        (None, Some(note)) if report.action.wrote() => ui.ok(note),
        (None, Some(note)) => ui.err(note),
        (None, None) => ui.ok("Already in sync"),
    }
    Ok(())
}

pub fn doctor(paths: &Paths, report: &BridgeReport, ui: &Ui) -> Result<()> {
    run_doctor(paths, report, ui);
    Ok(())
}
