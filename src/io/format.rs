//! Nice `symblock` output formatting.

use std::fmt;

use log;

const SYMBLOCK_BANNER_LENGTH: usize = 79;

/// Logs a main output line to the `symblock-output` logger.
macro_rules! symblock_output {
    ($fmt:expr $(, $($arg:tt)*)?) => { log::info!(target: "symblock-output", $fmt, $($($arg)*)?); }
}

/// Logs an error to the `symblock-output` logger.
macro_rules! symblock_error {
    ($fmt:expr $(, $($arg:tt)*)?) => {
        log::error!($fmt, $($($arg)*)?);
        log::error!(target: "symblock-output", $fmt, $($($arg)*)?);
    }
}

pub(crate) use {symblock_error, symblock_output};

/// Logs a nicely formatted section title to the `symblock-output` logger.
pub fn log_title(title: &str) {
    let length = title.chars().count().max(SYMBLOCK_BANNER_LENGTH - 6);
    let bar = "─".repeat(length);
    symblock_output!("┌──{bar}──┐");
    symblock_output!("│§ {title:^length$} §│");
    symblock_output!("└──{bar}──┘");
}

/// Logs a nicely formatted subtitle to the `symblock-output` logger.
pub fn log_subtitle(subtitle: &str) {
    let length = subtitle.chars().count();
    let bar = "═".repeat(length);
    symblock_output!("{}", subtitle);
    symblock_output!("{}", bar);
}

/// Turns a boolean into a string of `yes` or `no`.
pub(crate) fn nice_bool(b: bool) -> String {
    if b {
        "yes".to_string()
    } else {
        "no".to_string()
    }
}

/// A trait for logging `symblock` outputs nicely.
pub trait SymblockOutput: fmt::Debug + fmt::Display {
    /// Logs display output nicely.
    fn log_output_display(&self) {
        let lines = self.to_string();
        lines.lines().for_each(|line| {
            symblock_output!("{line}");
        })
    }
}

// Blanket implementation
impl<T> SymblockOutput for T where T: fmt::Debug + fmt::Display {}
