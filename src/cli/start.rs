use crate::cli::{actions::Action, commands, dispatch, telemetry};
use anyhow::Result;
use tracing::Level;

/// Map verbosity count to tracing level
const fn get_verbosity_level(verbosity: u8) -> Option<Level> {
    match verbosity {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

/// Main entry point for the CLI - builds and returns the Action
///
/// # Errors
///
/// Returns an error if argument parsing, configuration loading, or telemetry
/// initialization fails
pub fn start() -> Result<Action> {
    let matches = commands::new().get_matches();

    let verbosity_level = get_verbosity_level(
        matches
            .get_one::<u8>(commands::logging::ARG_VERBOSITY)
            .copied()
            .unwrap_or(0),
    );

    // The config decides the DEBUG floor, so it is loaded before logging is up.
    let action = dispatch::handler(&matches)?;

    let verbosity_level = if action.debug() {
        Some(verbosity_level.map_or(Level::DEBUG, |level| level.max(Level::DEBUG)))
    } else {
        verbosity_level
    };

    telemetry::init(verbosity_level)?;

    Ok(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_levels() {
        assert_eq!(get_verbosity_level(0), None);
        assert_eq!(get_verbosity_level(1), Some(Level::WARN));
        assert_eq!(get_verbosity_level(2), Some(Level::INFO));
        assert_eq!(get_verbosity_level(3), Some(Level::DEBUG));
        assert_eq!(get_verbosity_level(4), Some(Level::TRACE));
        assert_eq!(get_verbosity_level(9), Some(Level::TRACE));
    }

    #[test]
    fn debug_floor_keeps_more_verbose_levels() {
        assert_eq!(Level::TRACE.max(Level::DEBUG), Level::TRACE);
        assert_eq!(Level::WARN.max(Level::DEBUG), Level::DEBUG);
    }
}
