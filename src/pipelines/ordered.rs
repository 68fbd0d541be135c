/*! Ordered, bounded parallel map.

```text
 source ──► producer ──(seq, item)──► worker × n ──(seq, out)──► reorder ──► sink
    ▲                                                               │
    └────────────────────────── credit ◄────────────────────────────┘
```

The producer needs a credit to pull an item from the source, and a credit is only
given back once the item's output has reached the sink. At most `window` items are
thus in flight, and the producer blocks when workers (or the sink) fall behind.
Outputs reach the sink in source order, whatever the completion order.
!*/
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

use crossbeam::channel::bounded;
use log::debug;

use crate::error::Error;

/// Human readable panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Apply `f` to every item of `source` on `workers` threads, and feed the outputs to `sink` in order.
///
/// `source` runs on its own thread and is given back when exhausted, so that its counters can be read.
/// An error returned by `sink`, or a panic inside `f`, stops the whole map and is returned.
pub fn ordered_map<S, I, O, F, K>(
    source: S,
    workers: usize,
    window: usize,
    f: F,
    mut sink: K,
) -> Result<S, Error>
where
    S: Iterator<Item = I> + Send,
    I: Send,
    O: Send,
    F: Fn(I) -> O + Sync,
    K: FnMut(O) -> Result<(), Error>,
{
    let workers = workers.max(1);
    let window = window.max(1);

    let (work_tx, work_rx) = bounded::<(usize, I)>(window);
    let (done_tx, done_rx) = bounded::<(usize, thread::Result<O>)>(window);
    let (credit_tx, credit_rx) = bounded::<()>(window);
    for _ in 0..window {
        credit_tx
            .try_send(())
            .map_err(|e| Error::Custom(format!("could not fill credit window: {e}")))?;
    }

    let f = &f;
    let scoped = crossbeam::scope(|s| -> Result<S, Error> {
        let producer = s.spawn(move |_| {
            let mut source = source;
            let mut seq = 0;
            while credit_rx.recv().is_ok() {
                let item = match source.next() {
                    Some(item) => item,
                    None => break,
                };
                if work_tx.send((seq, item)).is_err() {
                    break;
                }
                seq += 1;
            }
            debug!("producer done after {} items", seq);
            source
        });

        for _ in 0..workers {
            let work_rx = work_rx.clone();
            let done_tx = done_tx.clone();
            s.spawn(move |_| {
                for (seq, item) in work_rx.iter() {
                    let out = panic::catch_unwind(AssertUnwindSafe(|| f(item)));
                    if done_tx.send((seq, out)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(work_rx);
        drop(done_tx);

        let mut pending = BTreeMap::new();
        let mut next = 0;
        let mut failure = None;
        'recv: for (seq, out) in done_rx.iter() {
            pending.insert(seq, out);
            while let Some(out) = pending.remove(&next) {
                next += 1;
                let res = match out {
                    Ok(out) => sink(out),
                    Err(panic) => Err(Error::Custom(format!(
                        "worker panicked: {}",
                        panic_message(&*panic)
                    ))),
                };
                if let Err(e) = res {
                    failure = Some(e);
                    break 'recv;
                }
                // never full: at most `window` credits are out
                let _ = credit_tx.send(());
            }
        }

        // unblocks the producer and the workers if we stopped early
        drop(done_rx);
        drop(credit_tx);

        let source = producer
            .join()
            .map_err(|_| Error::Custom("producer thread panicked".to_string()))?;
        match failure {
            Some(e) => Err(e),
            None => Ok(source),
        }
    });

    scoped.map_err(|_| Error::Custom("pipeline thread panicked".to_string()))?
}
