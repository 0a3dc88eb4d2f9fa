//! The execute phase: a bounded worker pool fed by an explicit ready-queue.
//!
//! Two channels coordinate the pool. `inputs` carries work (or a shutdown
//! sentinel) from the scheduler to the workers, which share the receiver
//! behind a mutex; `outputs` carries completions back. The scheduler runs on
//! the caller's thread and is the only party that ever invokes `executed()`,
//! so completion reports are serialized by construction.

use crate::engine::target::Target;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

enum Job {
    Run(Arc<dyn Target>),
    Shutdown,
}

/// Drain the outdated targets through the worker pool in dependency order.
///
/// Returns the number of targets whose `execute()` succeeded. The first
/// failure stops further scheduling; in-flight work runs to completion and is
/// still reported through `executed()`.
pub fn run(max_threads: usize, outdated: Vec<Arc<dyn Target>>) -> usize {
    if outdated.is_empty() {
        return 0;
    }

    let worker_count = max_threads.min(outdated.len()).max(1);

    let (input_tx, input_rx) = mpsc::channel::<Job>();
    let input_rx = Arc::new(Mutex::new(input_rx));
    let (output_tx, output_rx) = mpsc::channel::<Arc<dyn Target>>();

    let workers: Vec<thread::JoinHandle<()>> = (0..worker_count)
        .map(|_| {
            let rx = Arc::clone(&input_rx);
            let tx = output_tx.clone();
            thread::spawn(move || worker_loop(&rx, &tx))
        })
        .collect();

    let mut pending = outdated;
    let mut completed = 0usize;

    'sched: while !pending.is_empty() {
        // 1. Offer every ready target. Ready means no predecessor is still
        // outdated; predecessors that were never outdated and predecessors
        // that already executed successfully both qualify.
        let mut index = 0;
        while index < pending.len() {
            let ready = pending[index]
                .predecessors()
                .iter()
                .all(|pred| !pred.state().is_outdated());
            if ready {
                let target = pending.swap_remove(index);
                if input_tx.send(Job::Run(target)).is_err() {
                    break 'sched;
                }
            } else {
                index += 1;
            }
        }

        // 2. Block for one completion, then drain whatever else is already
        // there.
        let first = match output_rx.recv() {
            Ok(target) => target,
            Err(_) => break,
        };
        let mut batch = vec![first];
        while let Ok(target) = output_rx.try_recv() {
            batch.push(target);
        }

        let mut batch = batch.into_iter();
        while let Some(target) = batch.next() {
            if target.state().is_outdated() {
                // Worker reported failure. Put the target (and the rest of
                // the batch) back for the final drain and stop scheduling.
                let _ = output_tx.send(target);
                for rest in batch.by_ref() {
                    let _ = output_tx.send(rest);
                }
                break 'sched;
            }
            target.executed();
            completed += 1;
        }
    }

    // Shutdown: one sentinel per worker, then join. Workers that already
    // exited after a failure leave their sentinel unconsumed.
    for _ in 0..worker_count {
        let _ = input_tx.send(Job::Shutdown);
    }
    for worker in workers {
        let _ = worker.join();
    }
    drop(output_tx);

    // Report stragglers: anything still in flight when the loop ended, plus
    // the failure that triggered an abort. Successes report before failures.
    let mut leftovers: Vec<Arc<dyn Target>> = output_rx.iter().collect();
    leftovers.sort_by_key(|target| target.state().is_outdated());
    for target in leftovers {
        if !target.state().is_outdated() {
            completed += 1;
        }
        target.executed();
    }

    completed
}

fn worker_loop(input: &Mutex<Receiver<Job>>, output: &Sender<Arc<dyn Target>>) {
    loop {
        let job = {
            let receiver = match input.lock() {
                Ok(receiver) => receiver,
                Err(_) => return,
            };
            match receiver.recv() {
                Ok(job) => job,
                Err(_) => return,
            }
        };

        match job {
            Job::Shutdown => return,
            Job::Run(target) => {
                let ok = target.execute();
                // The store flows through the outputs channel before the
                // scheduler reads it in a readiness check.
                target.state().mark(!ok);
                let failed = !ok;
                if output.send(target).is_err() {
                    return;
                }
                if failed {
                    return;
                }
            }
        }
    }
}
