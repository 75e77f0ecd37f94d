pub mod channel;
pub mod fetcher;
pub mod service;
