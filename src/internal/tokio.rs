use std::future::Future;

use tokio::task::JoinHandle;

#[cfg(not(tokio_unstable))]
pub fn spawn_named<F, T>(_name: &str, future: F) -> JoinHandle<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(future)
}

#[cfg(tokio_unstable)]
pub fn spawn_named<F, T>(name: &str, future: F) -> JoinHandle<T>
where
    F: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::Builder::new()
        .name(&format!("accord::{name}"))
        .spawn(future)
        .expect("called in runtime context")
}
