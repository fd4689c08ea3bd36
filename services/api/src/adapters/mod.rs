pub mod http_source;
pub mod remote_engine;

pub use http_source::HttpSummarySource;
pub use remote_engine::{MediaCommand, MediaReport, RemoteEngine};
