use crate::output::is_quiet;
use crate::ui::{theme, Icons};
use owo_colors::OwoColorize;

pub fn header(text: &str) {
    if is_quiet() {
        return;
    }
    eprintln!("{} {}", Icons::ROCKET, text.style(theme().banner.clone()));
}

pub fn success(label: &str) {
    if is_quiet() {
        return;
    }
    eprintln!("{} {}", Icons::CHECK, label.style(theme().ok.clone()));
}

/// Always printed, quiet or not
pub fn error(label: &str) {
    eprintln!("{} {}", Icons::CROSS, label.style(theme().failure.clone()));
}

pub fn warn(label: &str) {
    if is_quiet() {
        return;
    }
    eprintln!("{} {}", Icons::WARN, label.style(theme().caution.clone()));
}

pub fn info(label: &str, value: &str) {
    if is_quiet() {
        return;
    }
    eprintln!(
        "{} {}: {}",
        Icons::INFO.style(theme().icon.clone()),
        label.style(theme().label.clone()),
        value
    );
}
