pub mod cli;
pub mod company;
pub mod config;
pub mod error;
pub mod export;
pub mod extractor;
pub mod fetcher;
pub mod inn;
pub mod logger;
pub mod orchestrator;
pub mod registry;
pub mod result_set;
pub mod search_backend;
pub mod session;

pub use company::{CandidateCompany, CandidateId, PartialCandidate};
pub use error::{FetchOutcome, SearchError};
pub use orchestrator::SearchOrchestrator;
