//! Default labels for timers created without one

use std::collections::BTreeSet;

const DEFAULT_LABEL_PREFIX: &str = "Timer ";

/// Smallest "Timer N" (N >= 1) not already taken by any of `existing`
pub fn next_default_label<'a, I>(existing: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let taken: BTreeSet<u64> = existing
        .into_iter()
        .filter_map(|label| label.trim().strip_prefix(DEFAULT_LABEL_PREFIX))
        .filter_map(|number| number.trim().parse().ok())
        .collect();

    let n = (1..).find(|n| !taken.contains(n)).unwrap_or(1);
    format!("{DEFAULT_LABEL_PREFIX}{n}")
}
