pub mod events;
pub mod ingestion;
pub mod ports;
pub mod records;
pub mod task;

pub use events::{classify, Classified, EventCore, LogEvent, LogLevel, StatusType};
pub use ingestion::{BatchOutcome, IngestOutcome, IngestionService};
pub use ports::{EventBroadcaster, EventQueue, EventStore};
pub use records::{EventFilter, EventPage, NewLogEvent, StoredLogEvent};
pub use task::CollectorTask;
