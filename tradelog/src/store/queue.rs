// Per-file serial write queue: one worker thread per backing file, jobs run
// in submission order, and a failed job never blocks the ones behind it.

use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;

use crate::error::{Result, TradelogError};

type Job = Box<dyn FnOnce() + Send + 'static>;

pub(crate) struct SerialQueue {
    // Locked while sending so submission order is the execution order.
    tx: Mutex<Option<mpsc::Sender<Job>>>,
    worker: Option<thread::JoinHandle<()>>,
}

impl SerialQueue {
    pub(crate) fn spawn(name: &str) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let worker = thread::Builder::new()
            .name(format!("tradelog-write-{name}"))
            .spawn(move || {
                for job in rx {
                    job();
                }
            })?;
        Ok(SerialQueue {
            tx: Mutex::new(Some(tx)),
            worker: Some(worker),
        })
    }

    /// Run `job` on the queue and wait for its result.
    pub(crate) fn run<R, F>(&self, job: F) -> Result<R>
    where
        F: FnOnce() -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let (done_tx, done_rx) = mpsc::channel();
        let wrapped: Job = Box::new(move || {
            let _ = done_tx.send(job());
        });

        {
            let guard = self
                .tx
                .lock()
                .map_err(|_| TradelogError::Other("write queue lock poisoned".into()))?;
            let tx = guard
                .as_ref()
                .ok_or_else(|| TradelogError::Other("write queue is shut down".into()))?;
            tx.send(wrapped)
                .map_err(|_| TradelogError::Other("write queue worker exited".into()))?;
        }

        done_rx
            .recv()
            .map_err(|_| TradelogError::Other("write queue worker exited".into()))?
    }
}

impl Drop for SerialQueue {
    // Close the channel and wait for pending writes to settle.
    fn drop(&mut self) {
        if let Ok(mut guard) = self.tx.lock() {
            guard.take();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn jobs_run_in_submission_order() {
        let queue = SerialQueue::spawn("test").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..16 {
            let seen = seen.clone();
            queue
                .run(move || {
                    seen.lock().unwrap().push(i);
                    Ok(())
                })
                .unwrap();
        }
        assert_eq!(*seen.lock().unwrap(), (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn a_failed_job_does_not_poison_the_queue() {
        let queue = SerialQueue::spawn("test").unwrap();
        let err = queue
            .run(|| -> Result<()> { Err(TradelogError::Other("boom".into())) })
            .unwrap_err();
        assert!(matches!(err, TradelogError::Other(_)));

        let value = queue.run(|| Ok(42)).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn drop_waits_for_pending_jobs() {
        let seen = Arc::new(Mutex::new(false));
        {
            let queue = SerialQueue::spawn("test").unwrap();
            let seen = seen.clone();
            queue
                .run(move || {
                    *seen.lock().unwrap() = true;
                    Ok(())
                })
                .unwrap();
        }
        assert!(*seen.lock().unwrap());
    }
}
