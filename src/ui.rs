//! Terminal output for codex-switch: status labels, tables, spinners, prompts.
//!
//! Colors are disabled, in priority order, by `--no-color`, `NO_COLOR`,
//! `TERM=dumb`, or a non-TTY stdout (`--color auto`).

use anstream::{eprintln, println};
use anstyle::{AnsiColor, Color, Style};
use comfy_table::{Cell, ContentArrangement, Table, presets};
use indicatif::{ProgressBar, ProgressStyle};
use std::borrow::Cow;
use std::io::IsTerminal;
use std::time::Duration;

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    Always,
    #[default]
    Auto,
    Never,
}

impl std::str::FromStr for ColorMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "auto" => Ok(Self::Auto),
            "never" => Ok(Self::Never),
            _ => Err(format!("invalid color mode: {}", s)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ui {
    pub color_enabled: bool,
    /// Spinners need both a TTY and color.
    pub spinner_enabled: bool,
    /// Prompts need a TTY on stdin.
    pub interactive: bool,
}

impl Default for Ui {
    fn default() -> Self {
        Self::new(ColorMode::Auto, false)
    }
}

impl Ui {
    pub fn new(mode: ColorMode, force_no_color: bool) -> Self {
        let color_enabled = Self::resolve_color(mode, force_no_color);
        let spinner_enabled = color_enabled && std::io::stdout().is_terminal();

        if !color_enabled {
            anstream::ColorChoice::write_global(anstream::ColorChoice::Never);
        }

        Self {
            color_enabled,
            spinner_enabled,
            interactive: std::io::stdin().is_terminal(),
        }
    }

    /// Non-interactive, colorless UI for tests and scripted use.
    pub fn plain() -> Self {
        Self {
            color_enabled: false,
            spinner_enabled: false,
            interactive: false,
        }
    }

    fn resolve_color(mode: ColorMode, force_no_color: bool) -> bool {
        if force_no_color || std::env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if std::env::var("TERM").is_ok_and(|t| t == "dumb") {
            return false;
        }
        match mode {
            ColorMode::Always => true,
            ColorMode::Never => false,
            ColorMode::Auto => std::io::stdout().is_terminal(),
        }
    }

    fn paint(&self, s: &str, style: Style) -> String {
        if self.color_enabled {
            format!("{style}{s}{style:#}")
        } else {
            s.to_string()
        }
    }

    fn label(&self, text: &str, color: AnsiColor) -> String {
        self.paint(text, Style::new().fg_color(Some(Color::Ansi(color))).bold())
    }

    pub fn ok(&self, msg: impl AsRef<str>) {
        println!("{} {}", self.label("OK", AnsiColor::Green), msg.as_ref());
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        println!("{} {}", self.label("WARN", AnsiColor::Yellow), msg.as_ref());
    }

    pub fn err(&self, msg: impl AsRef<str>) {
        eprintln!("{} {}", self.label("ERROR", AnsiColor::Red), msg.as_ref());
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        println!("{} {}", self.label("INFO", AnsiColor::Cyan), msg.as_ref());
    }

    pub fn dim(&self, s: impl AsRef<str>) -> String {
        self.paint(
            s.as_ref(),
            Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))),
        )
    }

    pub fn bold(&self, s: impl AsRef<str>) -> String {
        self.paint(s.as_ref(), Style::new().bold())
    }

    pub fn colored(&self, s: impl AsRef<str>, color: AnsiColor) -> String {
        self.paint(s.as_ref(), Style::new().fg_color(Some(Color::Ansi(color))))
    }

    pub fn icon_ok(&self) -> &'static str {
        if self.color_enabled { "✓" } else { "[OK]" }
    }

    pub fn icon_warn(&self) -> &'static str {
        if self.color_enabled { "⚠" } else { "[!]" }
    }

    pub fn icon_err(&self) -> &'static str {
        if self.color_enabled { "✗" } else { "[X]" }
    }

    pub fn icon_info(&self) -> &'static str {
        if self.color_enabled { "•" } else { "-" }
    }

    // -------------------------------------------------------------------------
    // Tables (comfy-table)
    // -------------------------------------------------------------------------

    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.load_preset(if self.color_enabled {
            presets::UTF8_FULL_CONDENSED
        } else {
            presets::ASCII_MARKDOWN
        });
        table
    }

    /// Borderless key/value table.
    pub fn simple_table(&self) -> Table {
        let mut table = Table::new();
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.load_preset(presets::NOTHING);
        table
    }

    pub fn cell(&self, content: impl Into<String>) -> Cell {
        Cell::new(content.into())
    }

    pub fn header_cell(&self, content: impl Into<String>) -> Cell {
        let cell = Cell::new(content.into());
        if self.color_enabled {
            cell.add_attribute(comfy_table::Attribute::Bold)
        } else {
            cell
        }
    }

    /// Colored via comfy-table rather than raw ANSI so widths stay correct.
    pub fn colored_cell(&self, content: impl Into<String>, color: AnsiColor) -> Cell {
        let cell = Cell::new(content.into());
        if self.color_enabled {
            cell.fg(ansi_to_comfy_color(color))
        } else {
            cell
        }
    }

    // -------------------------------------------------------------------------
    // Spinners (indicatif)
    // -------------------------------------------------------------------------

    pub fn spinner(&self, message: impl Into<Cow<'static, str>>) -> ProgressBar {
        if !self.spinner_enabled {
            let pb = ProgressBar::hidden();
            pb.set_message(message);
            return pb;
        }
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
                .template("{spinner:.cyan} {msg}")
                .expect("valid template"),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    pub fn spinner_finish_ok(&self, pb: &ProgressBar, msg: impl Into<Cow<'static, str>>) {
        self.finish_spinner(pb, msg.into(), true);
    }

    pub fn spinner_finish_err(&self, pb: &ProgressBar, msg: impl Into<Cow<'static, str>>) {
        self.finish_spinner(pb, msg.into(), false);
    }

    fn finish_spinner(&self, pb: &ProgressBar, msg: Cow<'static, str>, success: bool) {
        if !self.spinner_enabled {
            pb.finish_and_clear();
            if success { self.ok(msg) } else { self.err(msg) }
            return;
        }
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{msg}")
                .expect("valid template"),
        );
        let icon = if success {
            self.colored("✓", AnsiColor::Green)
        } else {
            self.colored("✗", AnsiColor::Red)
        };
        pb.finish_with_message(format!("{} {}", icon, msg));
    }

    // -------------------------------------------------------------------------
    // Prompts (inquire)
    // -------------------------------------------------------------------------

    /// Ask a yes/no question, defaulting to no.
    ///
    /// Returns `None` when there is no terminal to ask on.
    pub fn confirm(&self, question: &str, help: &str) -> anyhow::Result<Option<bool>> {
        if !self.interactive {
            return Ok(None);
        }
        let answer = inquire::Confirm::new(question)
            .with_default(false)
            .with_help_message(help)
            .prompt()?;
        Ok(Some(answer))
    }

    pub fn println(&self, msg: impl AsRef<str>) {
        println!("{}", msg.as_ref());
    }

    pub fn newline(&self) {
        println!();
    }

    pub fn section(&self, title: impl AsRef<str>) {
        println!("{}", self.bold(title));
    }
}

fn ansi_to_comfy_color(color: AnsiColor) -> comfy_table::Color {
    use comfy_table::Color as C;
    match color {
        AnsiColor::Black => C::Black,
        AnsiColor::Red | AnsiColor::BrightRed => C::Red,
        AnsiColor::Green | AnsiColor::BrightGreen => C::Green,
        AnsiColor::Yellow | AnsiColor::BrightYellow => C::Yellow,
        AnsiColor::Blue | AnsiColor::BrightBlue => C::Blue,
        AnsiColor::Magenta | AnsiColor::BrightMagenta => C::Magenta,
        AnsiColor::Cyan | AnsiColor::BrightCyan => C::Cyan,
        AnsiColor::White | AnsiColor::BrightWhite => C::White,
        AnsiColor::BrightBlack => C::DarkGrey,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_mode_parse() {
        assert_eq!("always".parse::<ColorMode>().unwrap(), ColorMode::Always);
        assert_eq!("AUTO".parse::<ColorMode>().unwrap(), ColorMode::Auto);
        assert_eq!("never".parse::<ColorMode>().unwrap(), ColorMode::Never);
        assert!("sometimes".parse::<ColorMode>().is_err());
    }

    #[test]
    fn test_force_no_color_wins() {
        let ui = Ui::new(ColorMode::Always, true);
        assert!(!ui.color_enabled);
        assert!(!ui.spinner_enabled);
    }

    #[test]
    fn test_plain_ui() {
        let ui = Ui::plain();
        assert_eq!(ui.icon_ok(), "[OK]");
        assert_eq!(ui.icon_err(), "[X]");
        assert_eq!(ui.bold("x"), "x");
        assert_eq!(ui.colored("x", AnsiColor::Red), "x");
    }

    #[test]
    fn test_confirm_without_terminal() {
        let ui = Ui::plain();
        assert_eq!(ui.confirm("Overwrite?", "").unwrap(), None);
    }

    #[test]
    fn test_hidden_spinner() {
        let ui = Ui::plain();
        let pb = ui.spinner("working");
        ui.spinner_finish_ok(&pb, "done");
        assert!(pb.is_finished());
    }
}
