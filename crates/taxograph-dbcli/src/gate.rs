//! Confirmation step run before an expensive path search.

use std::io::{BufRead, Write};

use crate::error::SearchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Proceed,
    Abort,
}

/// Decide whether a search at `depth` may start.
///
/// Depths above `threshold` ask `confirm` with a prompt; anything but a
/// yes aborts.
pub fn preflight<F>(depth: u32, threshold: u32, confirm: F) -> Result<GateDecision, SearchError>
where
    F: FnOnce(&str) -> bool,
{
    if depth == 0 {
        return Err(SearchError::ZeroDepth);
    }
    if depth <= threshold {
        return Ok(GateDecision::Proceed);
    }

    let prompt = format!(
        "Searching all paths at a depth of {depth} can be time-consuming.\nDo you want to continue? (Y/n): "
    );
    if confirm(&prompt) {
        Ok(GateDecision::Proceed)
    } else {
        Ok(GateDecision::Abort)
    }
}

/// Ask on stdout and read the answer from stdin. Only `y` confirms.
pub fn confirm_on_terminal(prompt: &str) -> bool {
    let mut stdout = std::io::stdout();
    if write!(stdout, "{prompt}").and_then(|_| stdout.flush()).is_err() {
        return false;
    }
    let mut answer = String::new();
    match std::io::stdin().lock().read_line(&mut answer) {
        Ok(_) => is_yes(&answer),
        Err(_) => false,
    }
}

fn is_yes(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}
