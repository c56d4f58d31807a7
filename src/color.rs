//! ANSI-coloured console messages

use std::fmt::{Display, Write};

/// Fixed terminal palette
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    Red,
    Blue,
    Green,
    Magenta,
    #[default]
    Cyan,
    Normal,
}

impl Color {
    /// ANSI escape sequence selecting this colour
    pub fn ansi_code(&self) -> &'static str {
        match self {
            Color::Red => "\x1b[31m",
            Color::Blue => "\x1b[34m",
            Color::Green => "\x1b[32m",
            Color::Magenta => "\x1b[35m",
            Color::Cyan => "\x1b[36m",
            Color::Normal => "\x1b[0m",
        }
    }
}

/// Format `message` in `color`, followed by `values` separated by spaces.
///
/// Every item is followed by a single space; only the message is coloured.
pub fn colorize(color: Color, message: &str, values: &[&dyn Display]) -> String {
    let mut out = format!("{}{}{} ", color.ansi_code(), message, Color::Normal.ansi_code());
    for value in values {
        // Writing into a String cannot fail
        let _ = write!(out, "{} ", value);
    }
    out
}

/// Print a coloured message line to stdout.
pub fn printc(color: Color, message: &str, values: &[&dyn Display]) {
    println!("{}", colorize(color, message, values));
}
