pub mod prelude;
pub mod tokio;
