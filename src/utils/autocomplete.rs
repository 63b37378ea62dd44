//! Prefix matching for autocomplete choices.

/// Most choices a slash-command autocomplete may return.
pub const MAX_CHOICES: usize = 25;

/// Alphabetically sorted candidates starting with `prefix`, ignoring case.
///
/// Sorts a copy; the input (usually a cached snapshot) is left untouched.
pub fn complete<I, S>(candidates: I, prefix: &str) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let owned: Vec<S> = candidates.into_iter().collect();
    let mut sorted: Vec<&str> = owned.iter().map(|candidate| candidate.as_ref()).collect();
    sorted.sort_unstable();
    complete_in_order(sorted, prefix)
}

/// Candidates starting with `prefix`, ignoring case, in the order given.
pub fn complete_in_order<I, S>(candidates: I, prefix: &str) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let prefix = prefix.to_lowercase();
    candidates
        .into_iter()
        .filter(|candidate| starts_with_ignore_case(candidate.as_ref(), &prefix))
        .take(MAX_CHOICES)
        .map(|candidate| candidate.as_ref().to_string())
        .collect()
}

/// `lowered_prefix` must already be lowercase.
pub fn starts_with_ignore_case(candidate: &str, lowered_prefix: &str) -> bool {
    candidate.to_lowercase().starts_with(lowered_prefix)
}
