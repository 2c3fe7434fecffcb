// Library root: the runtime around the pure standings pipeline, exposed so
// integration tests and hosts can drive it with their own match source.

pub mod fetcher;
pub mod pipeline;
pub mod render;
pub mod service;
