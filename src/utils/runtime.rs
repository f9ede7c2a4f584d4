use anyhow::Result;

/// Everything in clockbook runs on one thread: store writes, subscriptions and rendering are all
/// driven by the same event loop.
pub fn single_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}
