//! "First success wins" evaluation of ordered fallback chains.
//!
//! Each extraction field has an ordered list of strategies (usually CSS
//! selectors). The first one producing a value wins; the rest are not tried.

use std::future::Future;

/// Try `attempt` on each candidate in order, returning the first `Some`.
pub fn first_success<C, T, I, F>(candidates: I, mut attempt: F) -> Option<T>
where
    I: IntoIterator<Item = C>,
    F: FnMut(C) -> Option<T>,
{
    candidates.into_iter().find_map(|c| attempt(c))
}

/// Async form of [`first_success`]; candidates are tried sequentially.
pub async fn first_success_async<C, T, I, F, Fut>(candidates: I, mut attempt: F) -> Option<T>
where
    I: IntoIterator<Item = C>,
    F: FnMut(C) -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for candidate in candidates {
        if let Some(value) = attempt(candidate).await {
            return Some(value);
        }
    }
    None
}

/// Trimmed text, or `None` when nothing but whitespace is left.
pub fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
