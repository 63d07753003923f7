use cinema_core::{BookingError, CoreResult, StoreError};
use std::future::Future;
use std::pin::Pin;
use tracing::{error, warn};

type Undo = Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send>>;

/// Ordered list of undo steps for a multi-step write.
///
/// Steps are lazy futures pushed after each completed step. On failure they
/// run newest first; an undo that fails is logged and never replaces the
/// original error.
#[derive(Default)]
pub struct Compensations {
    steps: Vec<(&'static str, Undo)>,
}

impl Compensations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push<F>(&mut self, step: &'static str, undo: F)
    where
        F: Future<Output = Result<(), StoreError>> + Send + 'static,
    {
        self.steps.push((step, Box::pin(undo)));
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The write completed; drop every undo step unrun.
    pub fn disarm(mut self) {
        self.steps.clear();
    }

    pub async fn unwind(&mut self) {
        while let Some((step, undo)) = self.steps.pop() {
            match undo.await {
                Ok(()) => warn!(step, "Compensation applied"),
                Err(e) => error!(step, error = %e, "Compensation failed, manual cleanup required"),
            }
        }
    }

    /// Pass `result` through, unwinding first if it is an error.
    pub async fn check<T, E>(&mut self, result: Result<T, E>) -> CoreResult<T>
    where
        E: Into<BookingError>,
    {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                let err = e.into();
                warn!(code = err.code(), "Step failed, rolling back");
                self.unwind().await;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recorder() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn record(
        log: &Arc<Mutex<Vec<&'static str>>>,
        name: &'static str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send + 'static {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(name);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_unwinds_in_reverse_order() {
        let log = recorder();
        let mut undo = Compensations::new();
        undo.push("first", record(&log, "first"));
        undo.push("second", record(&log, "second"));

        let result: CoreResult<()> = undo
            .check(Err(StoreError::Unavailable("boom".to_string())))
            .await;

        assert_eq!(result.unwrap_err().code(), "DATA_ACCESS_ERROR");
        assert_eq!(*log.lock().unwrap(), vec!["second", "first"]);
        assert!(undo.is_empty());
    }

    #[tokio::test]
    async fn test_failed_undo_keeps_original_error_and_continues() {
        let log = recorder();
        let mut undo = Compensations::new();
        undo.push("first", record(&log, "first"));
        undo.push("broken", async { Err::<(), _>(StoreError::Unavailable("down".to_string())) });

        let result: CoreResult<()> = undo.check(Err(BookingError::SeatsUnavailable(vec![]))).await;

        assert_eq!(result.unwrap_err().code(), "SEATS_UNAVAILABLE");
        assert_eq!(*log.lock().unwrap(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_success_runs_nothing() {
        let log = recorder();
        let mut undo = Compensations::new();
        undo.push("first", record(&log, "first"));

        let value = undo.check(Ok::<_, StoreError>(7)).await.unwrap();
        assert_eq!(value, 7);
        assert_eq!(undo.len(), 1);
        undo.disarm();
        assert!(log.lock().unwrap().is_empty());
    }
}
