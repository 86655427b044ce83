//! Panic recovery at the worker boundary.
//!
//! A panic raised while a job is being built or while its exec runs must not
//! take down the worker, its siblings or the process. These helpers catch the
//! unwind and convert it into an ordinary `Error::Internal` the worker loop
//! treats like any other failed attempt.

use crate::types::{Error, Result};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Execute a function with panic recovery.
///
/// If the function panics, the panic is captured, logged, and converted
/// to an error.
///
/// # Example
/// ```
/// use operator_core::supervisor::with_recovery;
///
/// let result: operator_core::Result<u32> = with_recovery(|| Ok(7), "compute");
/// assert_eq!(result.unwrap(), 7);
/// ```
pub fn with_recovery<F, T>(operation: F, operation_name: &str) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    match catch_unwind(AssertUnwindSafe(operation)) {
        Ok(result) => result,
        Err(panic_payload) => Err(panic_error(operation_name, &panic_payload)),
    }
}

/// Await a future with panic recovery.
///
/// Panics raised while the future is polled are caught, not only those raised
/// while it is constructed.
pub async fn with_recovery_async<Fut, T>(future: Fut, operation_name: &str) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(panic_payload) => Err(panic_error(operation_name, &panic_payload)),
    }
}

fn panic_error(operation_name: &str, payload: &Box<dyn Any + Send>) -> Error {
    let panic_msg = extract_panic_message(payload);
    tracing::error!(
        operation = operation_name,
        "panic_recovered: operation={}, panic={}",
        operation_name,
        panic_msg
    );
    Error::internal(format!("panic in {}: {}", operation_name, panic_msg))
}

/// Extract panic message from panic payload.
fn extract_panic_message(payload: &Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic (no message)".to_string()
    }
}
