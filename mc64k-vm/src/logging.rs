use owo_colors::OwoColorize;
use std::sync::OnceLock;
use supports_color::Stream;
use tracing_subscriber::EnvFilter;

use crate::machine::MachineStatus;

static ANSI_ENABLED: OnceLock<bool> = OnceLock::new();

pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let ansi = detect_ansi();
    let _ = ANSI_ENABLED.set(ansi);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(ansi)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .try_init()
        .map_err(|err| std::io::Error::other(err.to_string()))?;
    Ok(())
}

pub fn category_machine() -> String {
    if ansi_enabled() {
        format!("{}", "MACHINE".bright_green().bold())
    } else {
        "MACHINE".to_string()
    }
}

pub fn category_host() -> String {
    if ansi_enabled() {
        format!("{}", "HOST".bright_cyan().bold())
    } else {
        "HOST".to_string()
    }
}

pub fn category_step() -> String {
    if ansi_enabled() {
        format!("{}", "STEP".bright_magenta().bold())
    } else {
        "STEP".to_string()
    }
}

pub fn status_label(status: MachineStatus) -> String {
    let text = status.to_string();
    if !ansi_enabled() {
        return text;
    }

    match status {
        MachineStatus::Completed => format!("{}", text.bright_green()),
        MachineStatus::Uninitialised | MachineStatus::Initialised | MachineStatus::Running => {
            format!("{}", text.bright_blue())
        }
        _ => format!("{}", text.bright_red()),
    }
}

fn ansi_enabled() -> bool {
    *ANSI_ENABLED.get_or_init(detect_ansi)
}

fn detect_ansi() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    supports_color::on_cached(Stream::Stderr).is_some()
}
