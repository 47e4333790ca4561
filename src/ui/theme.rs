//! Styles for the stderr status lines printed around the command loop.
//!
//! Stdout carries the protocol and is never styled. Stderr is colored only
//! when it is a terminal and `NO_COLOR` is unset or empty.

use owo_colors::Style;
use std::ffi::OsStr;
use std::sync::OnceLock;

static THEME: OnceLock<Theme> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Theme {
    pub colored: bool,
    /// Startup banner ("Serving users from ...")
    pub banner: Style,
    pub ok: Style,
    /// Fatal startup or config failure
    pub failure: Style,
    pub caution: Style,
    pub icon: Style,
    pub label: Style,
}

impl Theme {
    pub fn detect() -> Self {
        let no_color = std::env::var_os("NO_COLOR");
        Self::for_terminal(wants_color(console::Term::stderr().is_term(), no_color.as_deref()))
    }

    pub fn for_terminal(colored: bool) -> Self {
        let pick = |style: Style| if colored { style } else { Style::new() };
        Self {
            colored,
            banner: pick(Style::new().cyan().bold()),
            ok: pick(Style::new().green().bold()),
            failure: pick(Style::new().red().bold()),
            caution: pick(Style::new().yellow().bold()),
            icon: pick(Style::new().magenta()),
            label: pick(Style::new().white().dimmed()),
        }
    }
}

fn wants_color(is_term: bool, no_color: Option<&OsStr>) -> bool {
    is_term && no_color.is_none_or(OsStr::is_empty)
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
