pub mod materializer;
pub mod metrics;
pub mod paginator;
pub mod recorder;
pub mod retrieval;

pub use materializer::Materializer;
pub use metrics::EngineMetrics;
pub use paginator::{Page, Paginator};
pub use recorder::EventRecorder;
pub use retrieval::{FetchRequest, OfferRetrieval};
