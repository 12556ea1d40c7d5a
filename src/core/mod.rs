pub mod archive;
pub mod clock;
pub mod config;
pub mod lifecycle;
pub mod model;
pub mod provider;
pub mod reconcile;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod terminal;
