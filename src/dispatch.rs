//! Run the async API from synchronous code.
//!
//! Every operation is written once as an `async fn`. Synchronous callers go
//! through [`block_on`], which drives the future on a private current-thread
//! runtime. A Tokio worker must never block, so when the caller is already
//! inside a runtime the future is driven on a scoped helper thread instead.

use std::future::Future;

use log::debug;
use tokio::runtime::{Builder, Handle};

use crate::error::Result;

pub fn block_on<F, T>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send,
    T: Send,
{
    if Handle::try_current().is_ok() {
        debug!("Called from inside a runtime, driving future on a helper thread");
        std::thread::scope(|scope| {
            match scope.spawn(|| run(future)).join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            }
        })
    } else {
        run(future)
    }
}

fn run<F, T>(future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let runtime = Builder::new_current_thread().enable_all().build()?;
    runtime.block_on(future)
}
