//! Sentra Core - Campaign dispatch, delivery, and analytics
//!
//! This crate provides the campaign engine: the dispatch decision and its
//! two paths, audience fan-out, email rendering with tracking, the send
//! worker, the schedule poller, pure analytics over the event log, and the
//! AI content assist client.

pub mod ai;
pub mod analytics;
pub mod dispatch;
pub mod fanout;
pub mod mailer;
pub mod render;
pub mod scheduler;
pub mod worker;

pub use ai::{ContentClient, GeneratedEmail, InsightsReport};
pub use dispatch::{decide, CampaignDispatcher, DispatchOutcome, DispatchPath, IMMEDIATE_THRESHOLD_SECS};
pub use fanout::{normalize_recipients, FanOut, FanOutSummary};
pub use mailer::{MailError, MailProvider, OutboundEmail, SmtpMailer};
pub use scheduler::SchedulePoller;
pub use worker::{calculate_backoff, SendWorker, MAX_SEND_ATTEMPTS};
