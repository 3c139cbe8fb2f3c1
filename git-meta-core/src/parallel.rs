//! Bounded per-sub-repo work queue (`spec.md` §5).
//!
//! A generalization of `headlamp`'s `parallel_stride::run_parallel_stride` —
//! a `std::thread::scope` stride scheduler over a fixed slot array — to a
//! labeled, default-bounded (`min(cpu, 16)`) queue so callers (push, status
//! recursion, fetch) can tell *which* item failed rather than just that one
//! did.

use std::sync::{Arc, Mutex};

/// `spec.md` §5: "a bounded work-queue with a configurable parallelism
/// limit (default: min(CPU count, 16))".
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(16)
}

pub struct LabeledError<E> {
    pub label: String,
    pub error: E,
}

/// Runs `run` over every item in `items`, at most `concurrency` at a time.
/// Returns results in input order. Stops handing out new work once the first
/// error is observed, but in-flight work already started is allowed to
/// finish; the first error encountered (by item index) is returned.
pub fn run_bounded<T, R, E, F>(
    items: &[T],
    concurrency: usize,
    label: impl Fn(&T) -> String + Sync,
    run: F,
) -> Result<Vec<R>, LabeledError<E>>
where
    T: Sync,
    R: Send,
    E: Send,
    F: Fn(&T) -> Result<R, E> + Sync,
{
    let total = items.len();
    if total == 0 {
        return Ok(Vec::new());
    }
    let worker_count = concurrency.clamp(1, total.max(1)).min(total);

    let results_by_index: Arc<Vec<Mutex<Option<R>>>> =
        Arc::new((0..total).map(|_| Mutex::new(None)).collect());
    let first_error: Arc<Mutex<Option<(usize, E)>>> = Arc::new(Mutex::new(None));

    std::thread::scope(|scope| {
        let run_ref = &run;
        let items_ref = items;
        for start_index in 0..worker_count {
            let results_by_index = Arc::clone(&results_by_index);
            let first_error = Arc::clone(&first_error);
            scope.spawn(move || {
                let mut index = start_index;
                while index < total {
                    if first_error.lock().ok().is_some_and(|g| g.is_some()) {
                        return;
                    }
                    match run_ref(&items_ref[index]) {
                        Ok(value) => {
                            if let Ok(mut slot) = results_by_index[index].lock() {
                                *slot = Some(value);
                            }
                        }
                        Err(err) => {
                            if let Ok(mut slot) = first_error.lock()
                                && slot.is_none()
                            {
                                *slot = Some((index, err));
                            }
                            return;
                        }
                    }
                    index += worker_count;
                }
            });
        }
    });

    if let Some((index, err)) = first_error.lock().ok().and_then(|mut g| g.take()) {
        return Err(LabeledError {
            label: label(&items[index]),
            error: err,
        });
    }

    let mut out = Vec::with_capacity(total);
    for slot in results_by_index.iter() {
        let value = slot
            .lock()
            .ok()
            .and_then(|mut g| g.take())
            .expect("every slot is filled when no error was recorded");
        out.push(value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_every_item_and_preserves_order() {
        let items = vec![1, 2, 3, 4, 5];
        let results = run_bounded(&items, 2, |i| i.to_string(), |i| Ok::<_, ()>(i * 2)).unwrap();
        assert_eq!(results, vec![2, 4, 6, 8, 10]);
    }

    #[test]
    fn surfaces_the_failing_items_label() {
        let items = vec!["a".to_string(), "bad".to_string(), "c".to_string()];
        let err = run_bounded(
            &items,
            4,
            |s| s.clone(),
            |s| if s == "bad" { Err("boom") } else { Ok(()) },
        )
        .unwrap_err();
        assert_eq!(err.label, "bad");
        assert_eq!(err.error, "boom");
    }

    #[test]
    fn empty_input_is_ok() {
        let items: Vec<i32> = Vec::new();
        let results = run_bounded(&items, 4, |i| i.to_string(), |i| Ok::<_, ()>(*i)).unwrap();
        assert!(results.is_empty());
    }
}
