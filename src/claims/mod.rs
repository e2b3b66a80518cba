mod csv;
mod queue;
mod record;

pub use csv::{check_extension, parse_claims};
pub use queue::{Cohorts, QueueStats, partition};
pub use record::{Claim, ClaimStatus, ClaimWorkflowData, format_currency};
