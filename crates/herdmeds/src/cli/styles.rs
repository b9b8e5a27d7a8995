//! Terminal styles.
//!
//! Renderers ask for a style by what the text *is* (a title, a timestamp, a
//! favorite marker), never by color, so the palette can change in one place.
//! `console` drops the escape codes on its own when stdout is not a terminal.

use console::Style;

pub fn title() -> Style {
    Style::new().bold()
}

pub fn muted() -> Style {
    Style::new().color256(245)
}

pub fn time() -> Style {
    muted().italic()
}

pub fn favorite() -> Style {
    Style::new().color256(178).bold()
}

pub fn id() -> Style {
    Style::new().color256(178)
}

pub fn heading() -> Style {
    Style::new().color256(178).bold()
}

pub fn success() -> Style {
    Style::new().green()
}

pub fn warning() -> Style {
    Style::new().yellow().bold()
}
