//! Domain layer: station, availability, and prediction records, run
//! identity, and the shutdown signal shared by the background loops.

pub mod prediction;
pub mod run_id;
pub mod shutdown;
pub mod station;

pub use prediction::PredictionRecord;
pub use run_id::RunId;
pub use shutdown::{Shutdown, ShutdownListener};
pub use station::{AvailabilityRecord, CombinedStationView, RecordError, StationRecord};
