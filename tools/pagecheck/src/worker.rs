//! Parallel per-file analysis.
//!
//! Files are independent, so a fixed pool of scoped threads pulls indices
//! from a shared queue. Results are put back in input order before they are
//! printed.

use std::sync::{Mutex, mpsc};

use crate::verbose::vprintln;

/// Resolves `-j`: `None` or `0` means one worker per CPU.
pub fn worker_count(jobs: Option<usize>) -> usize {
    match jobs.unwrap_or(0) {
        0 => std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4),
        n => n,
    }
}

/// Applies `f` to every item on up to `jobs` threads and returns the results
/// in the order of `items`.
pub fn map_ordered<T, R, F>(items: &[T], jobs: Option<usize>, f: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let num_workers = worker_count(jobs).min(items.len());
    if num_workers <= 1 {
        return items.iter().map(&f).collect();
    }
    vprintln!("  checking {} files with {num_workers} workers", items.len());

    let (job_tx, job_rx) = mpsc::channel::<usize>();
    let (result_tx, result_rx) = mpsc::channel::<(usize, R)>();
    for idx in 0..items.len() {
        // The receiver is alive until the scope below ends.
        let _ = job_tx.send(idx);
    }
    drop(job_tx);
    let job_rx = Mutex::new(job_rx);

    let f = &f;
    let job_rx = &job_rx;
    std::thread::scope(|s| {
        for _ in 0..num_workers {
            let tx = result_tx.clone();
            s.spawn(move || {
                loop {
                    let Ok(queue) = job_rx.lock() else { break };
                    let Ok(idx) = queue.recv() else { break };
                    drop(queue);

                    if tx.send((idx, f(&items[idx]))).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut slots: Vec<Option<R>> = std::iter::repeat_with(|| None).take(items.len()).collect();
    for (idx, result) in result_rx {
        slots[idx] = Some(result);
    }
    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn results_keep_input_order() {
        let items: Vec<u64> = (0..100).collect();
        let out = map_ordered(&items, Some(8), |&n| {
            std::thread::sleep(std::time::Duration::from_micros(100 - n));
            n * 2
        });
        assert_eq!(out, items.iter().map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn single_worker_runs_inline() {
        let out = map_ordered(&["a", "bb", "ccc"], Some(1), |s| s.len());
        assert_eq!(out, [1, 2, 3]);
    }

    #[test]
    fn empty_input() {
        let out: Vec<u8> = map_ordered(&[] as &[u8], None, |&b| b);
        assert!(out.is_empty());
    }

    #[test]
    fn zero_jobs_means_auto() {
        assert!(worker_count(Some(0)) >= 1);
        assert_eq!(worker_count(Some(3)), 3);
    }
}
