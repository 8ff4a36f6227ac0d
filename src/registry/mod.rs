pub mod client;
pub mod error;
pub mod types;

pub use client::{JobRegistry, RegistryClient};
pub use error::RegistryError;
pub use types::{JobRecord, JobState, ListJobsQuery};
