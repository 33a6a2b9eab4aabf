pub mod analytics;
pub mod locks;
pub mod recorder;

pub use analytics::{AnalyticsAggregator, AnalyticsError, AnalyticsReport, QualityStatus};
pub use locks::ListingLocks;
pub use recorder::{RecorderError, RecorderPolicy, Rejection, ViewOutcome, ViewRecorder};
