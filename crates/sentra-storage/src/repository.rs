//! Repository layer for data access

pub mod campaigns;
pub mod events;
pub mod link_mappings;
pub mod schedules;
pub mod segments;
pub mod send_jobs;
pub mod suppressions;
pub mod users;

pub use campaigns::CampaignRepository;
pub use events::{EventFilter, EventRepository};
pub use link_mappings::LinkMappingRepository;
pub use schedules::ScheduleRepository;
pub use segments::SegmentRepository;
pub use send_jobs::SendJobRepository;
pub use suppressions::SuppressionRepository;
pub use users::UserRepository;
