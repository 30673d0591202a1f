// src/chain.rs
//! Priority-ordered fallback chains.
//!
//! A chain is an ordered list of candidates, a producer that turns a
//! candidate into a value, and one acceptance gate. Candidates are tried
//! strictly in order and the first accepted value stops the chain; later
//! producers never run.

use std::future::Future;

/// Synchronous chain. Returns the winning candidate and its value.
pub fn first_accepted<C, T, P, A>(
    candidates: impl IntoIterator<Item = C>,
    mut produce: P,
    mut accept: A,
) -> Option<(C, T)>
where
    P: FnMut(&C) -> Option<T>,
    A: FnMut(&T) -> bool,
{
    for candidate in candidates {
        if let Some(value) = produce(&candidate) {
            if accept(&value) {
                return Some((candidate, value));
            }
        }
    }
    None
}

/// Async chain; each producer is awaited before the next one starts.
pub async fn first_accepted_async<C, T, P, Fut, A>(
    candidates: impl IntoIterator<Item = C>,
    mut produce: P,
    mut accept: A,
) -> Option<(C, T)>
where
    C: Clone,
    P: FnMut(C) -> Fut,
    Fut: Future<Output = Option<T>>,
    A: FnMut(&T) -> bool,
{
    for candidate in candidates {
        if let Some(value) = produce(candidate.clone()).await {
            if accept(&value) {
                return Some((candidate, value));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn stops_at_first_accepted() {
        let calls = Cell::new(0);
        let out = first_accepted(
            ["a", "bb", "ccc", "dddd"],
            |c| {
                calls.set(calls.get() + 1);
                Some(c.len())
            },
            |n| *n >= 2,
        );
        assert_eq!(out, Some(("bb", 2)));
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn producer_misses_are_skipped() {
        let out = first_accepted([1, 2, 3], |c| (*c != 2).then_some(c * 10), |v| *v > 10);
        assert_eq!(out, Some((3, 30)));
        assert_eq!(first_accepted(Vec::<u8>::new(), |c| Some(*c), |_| true), None);
    }

    #[tokio::test]
    async fn async_chain_runs_in_order() {
        let seen = std::sync::Mutex::new(Vec::new());
        let out = first_accepted_async(
            vec!["/x", "/y", "/z"],
            |p| {
                seen.lock().unwrap().push(p);
                async move { Some(p.to_uppercase()) }
            },
            |v| v == "/Y",
        )
        .await;
        assert_eq!(out, Some(("/y", "/Y".to_string())));
        assert_eq!(*seen.lock().unwrap(), vec!["/x", "/y"]);
    }
}
