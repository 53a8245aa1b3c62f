//! Line status derived from hit counters.

use strum::{Display, EnumString};

/// Coverage state of a line, derived from its hit counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum LineStatus {
    /// Never executed
    None,
    /// Executed, but at least one branch outcome was not
    Partial,
    /// Executed with every branch outcome taken
    Full,
}

impl LineStatus {
    /// Derives the status from a line hit count and the hit counts of its branch outcomes.
    #[must_use]
    pub fn from_counts<I>(line_hits: u32, outcomes: I) -> Self
    where
        I: IntoIterator<Item = u32>,
    {
        if line_hits == 0 {
            return LineStatus::None;
        }
        if outcomes.into_iter().all(|hits| hits > 0) {
            LineStatus::Full
        } else {
            LineStatus::Partial
        }
    }
}
