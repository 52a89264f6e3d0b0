pub mod service;

pub use service::PersistenceWorker;
