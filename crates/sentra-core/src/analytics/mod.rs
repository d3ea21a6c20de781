//! Campaign analytics: deterministic pure functions over the event log
//!
//! Every number the API reports is derived here from an event slice and
//! nothing else. Same slice in, same report out; clients never recompute.

pub mod user_agent;

pub use user_agent::{parse_user_agent, DeviceClass, UserAgentInfo};

use chrono::{Datelike, Timelike, Weekday};
use sentra_common::types::EventType;
use sentra_storage::models::Event;
use serde::Serialize;
use std::collections::HashMap;

/// Recipients scoring at least this are highly engaged
pub const HIGH_ENGAGEMENT_THRESHOLD: i64 = 5;

/// Recipients scoring at least this (but below high) are moderately engaged
pub const MODERATE_ENGAGEMENT_THRESHOLD: i64 = 2;

/// Distribution entries kept before the overflow bucket
pub const DISTRIBUTION_MAX_ITEMS: usize = 10;

/// Raw event counts per type
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EventCounts {
    pub sent: u64,
    pub opens: u64,
    pub clicks: u64,
    pub bounces: u64,
    pub complaints: u64,
    pub unsubscribes: u64,
    pub failed: u64,
}

/// One labeled bucket of a distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DistributionEntry {
    pub label: String,
    pub count: u64,
}

/// Who opened where, parsed from user agents and geo headers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Distributions {
    pub browsers: Vec<DistributionEntry>,
    pub operating_systems: Vec<DistributionEntry>,
    pub devices: Vec<DistributionEntry>,
    pub countries: Vec<DistributionEntry>,
}

/// Engagement in one hour of the day, UTC
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HourBucket {
    pub hour: u32,
    pub opens: u64,
    pub clicks: u64,
    pub engagement_score: u64,
}

/// Engagement on one day of the week
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayBucket {
    pub day: String,
    pub opens: u64,
    pub clicks: u64,
    pub engagement_score: u64,
}

/// When recipients engage. Clicks weigh double in the score.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemporalReport {
    pub engagement_by_hour: Vec<HourBucket>,
    pub peak_hours: Vec<u32>,
    pub engagement_by_day: Vec<DayBucket>,
    pub best_day: Option<String>,
}

/// Latency from delivery to first reaction, averaged over recipients
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseTimes {
    pub avg_time_to_open_secs: Option<f64>,
    pub avg_time_to_click_secs: Option<f64>,
}

/// Aggregate engagement quality
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EngagementMetrics {
    pub click_to_open_rate: f64,
    pub unique_engagement_rate: f64,
    pub engagement_quality_score: f64,
    pub bounce_rate: f64,
}

/// Engagement tier of one recipient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementTier {
    High,
    Moderate,
    Low,
}

/// Tier from a recipient score: opens weigh 1, clicks weigh 3
pub fn engagement_tier(score: i64) -> EngagementTier {
    if score >= HIGH_ENGAGEMENT_THRESHOLD {
        EngagementTier::High
    } else if score >= MODERATE_ENGAGEMENT_THRESHOLD {
        EngagementTier::Moderate
    } else {
        EngagementTier::Low
    }
}

/// Per-recipient engagement
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipientScore {
    pub email: String,
    pub opens: u64,
    pub clicks: u64,
    pub score: i64,
    pub tier: EngagementTier,
}

/// One engagement tier's share of the audience
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TierSegment {
    pub count: usize,
    pub percentage: f64,
}

/// Recipient-level insight
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecipientInsights {
    pub unique_recipients: usize,
    pub highly_engaged: TierSegment,
    pub moderately_engaged: TierSegment,
    pub low_engaged: TierSegment,
    pub top_recipients: Vec<RecipientScore>,
    pub avg_opens_per_recipient: f64,
    pub avg_clicks_per_recipient: f64,
}

/// Prefetch-adjusted open accounting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProxyOpenSummary {
    /// Opens flagged by the prefetch heuristic
    pub likely_prefetch_opens: usize,
    /// Recipients with at least one open the heuristic did not flag
    pub adjusted_unique_opens: usize,
}

/// The full campaign report
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CampaignReport {
    pub total_events: usize,
    pub counts: EventCounts,
    pub unique_opens: usize,
    pub unique_clicks: usize,
    pub proxy_opens: ProxyOpenSummary,
    pub distributions: Distributions,
    pub temporal: TemporalReport,
    pub response_times: ResponseTimes,
    pub engagement: EngagementMetrics,
    pub recipients: RecipientInsights,
}

/// Signature for the proxy-open heuristic: given an open event and its
/// zero-based index among that recipient's opens, decide whether it was
/// likely automated.
pub type ProxyOpenHeuristic = fn(open_index: usize, event: &Event) -> bool;

/// Default heuristic: mail providers prefetch images at delivery time, so
/// the first open recorded per (campaign, recipient) is likely a proxy
/// fetch, not a human. Deliberately coarse; swap in your own via
/// [`compute_report_with_heuristic`].
pub fn first_open_is_likely_prefetch(open_index: usize, _event: &Event) -> bool {
    open_index == 0
}

fn round1(x: f64) -> f64 {
    (x * 10.0).round() / 10.0
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Stable identity for a recipient within a campaign
fn recipient_key(event: &Event) -> Option<String> {
    if let Some(email) = &event.email {
        if !email.is_empty() {
            return Some(email.clone());
        }
    }
    event.tracking_id.map(|id| id.to_string())
}

fn format_distribution(counts: HashMap<String, u64>) -> Vec<DistributionEntry> {
    let mut entries: Vec<(String, u64)> = counts.into_iter().collect();
    // Count desc, label asc for determinism
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let mut out: Vec<DistributionEntry> = entries
        .iter()
        .take(DISTRIBUTION_MAX_ITEMS)
        .map(|(label, count)| DistributionEntry {
            label: label.clone(),
            count: *count,
        })
        .collect();

    let overflow: u64 = entries
        .iter()
        .skip(DISTRIBUTION_MAX_ITEMS)
        .map(|(_, c)| c)
        .sum();
    if overflow > 0 {
        out.push(DistributionEntry {
            label: "Other".to_string(),
            count: overflow,
        });
    }

    out
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

const DAY_ORDER: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Compute the report with the default prefetch heuristic
pub fn compute_report(events: &[Event]) -> CampaignReport {
    compute_report_with_heuristic(events, first_open_is_likely_prefetch)
}

/// Compute the report with a caller-supplied prefetch heuristic
pub fn compute_report_with_heuristic(
    events: &[Event],
    heuristic: ProxyOpenHeuristic,
) -> CampaignReport {
    if events.is_empty() {
        return CampaignReport::default();
    }

    // Chronological order drives first-open semantics
    let mut ordered: Vec<&Event> = events.iter().collect();
    ordered.sort_by_key(|e| e.occurred_at);

    let mut counts = EventCounts::default();
    let mut browsers = HashMap::new();
    let mut oses = HashMap::new();
    let mut devices = HashMap::new();
    let mut countries = HashMap::new();
    let mut hourly = [(0u64, 0u64); 24];
    let mut daily: HashMap<&'static str, (u64, u64)> = HashMap::new();

    struct RecipientActivity {
        opens: u64,
        clicks: u64,
        sent_at: Option<chrono::DateTime<chrono::Utc>>,
        first_open_at: Option<chrono::DateTime<chrono::Utc>>,
        first_click_at: Option<chrono::DateTime<chrono::Utc>>,
        has_human_open: bool,
    }
    let mut recipients: HashMap<String, RecipientActivity> = HashMap::new();
    let mut likely_prefetch_opens = 0usize;

    for event in &ordered {
        let event_type = event.event_type_enum();

        match event_type {
            Some(EventType::Sent) => counts.sent += 1,
            Some(EventType::Open) => counts.opens += 1,
            Some(EventType::Click) => counts.clicks += 1,
            Some(EventType::Bounce) => counts.bounces += 1,
            Some(EventType::Complaint) => counts.complaints += 1,
            Some(EventType::Unsubscribe) => counts.unsubscribes += 1,
            Some(EventType::Failed) => counts.failed += 1,
            None => {}
        }

        let is_open = event_type == Some(EventType::Open);
        let is_click = event_type == Some(EventType::Click);

        if is_open || is_click {
            if event.user_agent.is_some() {
                let info = parse_user_agent(event.user_agent.as_deref());
                *browsers.entry(info.browser).or_insert(0) += 1;
                *oses.entry(info.os).or_insert(0) += 1;
                *devices.entry(info.device.label().to_string()).or_insert(0) += 1;
            }
            if let Some(country) = &event.country {
                *countries.entry(country.clone()).or_insert(0) += 1;
            }

            let hour = event.occurred_at.hour() as usize;
            let day = weekday_name(event.occurred_at.weekday());
            let hour_slot = &mut hourly[hour];
            let day_slot = daily.entry(day).or_insert((0, 0));
            if is_open {
                hour_slot.0 += 1;
                day_slot.0 += 1;
            } else {
                hour_slot.1 += 1;
                day_slot.1 += 1;
            }
        }

        let Some(key) = recipient_key(event) else {
            continue;
        };
        let activity = recipients.entry(key).or_insert(RecipientActivity {
            opens: 0,
            clicks: 0,
            sent_at: None,
            first_open_at: None,
            first_click_at: None,
            has_human_open: false,
        });

        match event_type {
            Some(EventType::Sent) => {
                if activity.sent_at.is_none() {
                    activity.sent_at = Some(event.occurred_at);
                }
            }
            Some(EventType::Open) => {
                let open_index = activity.opens as usize;
                activity.opens += 1;
                if activity.first_open_at.is_none() {
                    activity.first_open_at = Some(event.occurred_at);
                }
                if heuristic(open_index, event) {
                    likely_prefetch_opens += 1;
                } else {
                    activity.has_human_open = true;
                }
            }
            Some(EventType::Click) => {
                activity.clicks += 1;
                if activity.first_click_at.is_none() {
                    activity.first_click_at = Some(event.occurred_at);
                }
            }
            _ => {}
        }
    }

    // Temporal buckets
    let engagement_by_hour: Vec<HourBucket> = (0..24)
        .map(|hour| {
            let (opens, clicks) = hourly[hour];
            HourBucket {
                hour: hour as u32,
                opens,
                clicks,
                engagement_score: opens + clicks * 2,
            }
        })
        .collect();

    let mut ranked: Vec<&HourBucket> = engagement_by_hour.iter().collect();
    ranked.sort_by(|a, b| b.engagement_score.cmp(&a.engagement_score).then(a.hour.cmp(&b.hour)));
    let peak_hours: Vec<u32> = ranked
        .iter()
        .take(3)
        .filter(|b| b.engagement_score > 0)
        .map(|b| b.hour)
        .collect();

    let engagement_by_day: Vec<DayBucket> = DAY_ORDER
        .iter()
        .map(|day| {
            let (opens, clicks) = daily.get(day).copied().unwrap_or((0, 0));
            DayBucket {
                day: day.to_string(),
                opens,
                clicks,
                engagement_score: opens + clicks * 2,
            }
        })
        .collect();

    let best_day = engagement_by_day
        .iter()
        .max_by_key(|b| b.engagement_score)
        .filter(|b| b.engagement_score > 0)
        .map(|b| b.day.clone());

    // Response latency, averaged over recipients that both received and
    // reacted
    let mut open_latencies = Vec::new();
    let mut click_latencies = Vec::new();
    for activity in recipients.values() {
        if let (Some(sent), Some(open)) = (activity.sent_at, activity.first_open_at) {
            if open >= sent {
                open_latencies.push((open - sent).num_seconds() as f64);
            }
        }
        if let (Some(sent), Some(click)) = (activity.sent_at, activity.first_click_at) {
            if click >= sent {
                click_latencies.push((click - sent).num_seconds() as f64);
            }
        }
    }
    let avg = |v: &[f64]| {
        if v.is_empty() {
            None
        } else {
            Some(round2(v.iter().sum::<f64>() / v.len() as f64))
        }
    };

    // Engagement metrics
    let total_events = ordered.len();
    let opens = counts.opens as f64;
    let clicks = counts.clicks as f64;
    let bounces = counts.bounces as f64;

    let click_to_open_rate = if counts.opens > 0 {
        round2(clicks / opens * 100.0)
    } else {
        0.0
    };
    let unique_engagement_rate = round2((opens + clicks) / total_events as f64 * 100.0);
    let quality = round1((opens + clicks * 3.0 - bounces * 2.0) / total_events.max(1) as f64 * 10.0);
    let engagement_quality_score = quality.clamp(0.0, 10.0);
    let bounce_rate = round2(bounces / total_events as f64 * 100.0);

    // Recipient insight
    let mut scores: Vec<RecipientScore> = recipients
        .iter()
        .filter(|(_, a)| a.opens > 0 || a.clicks > 0 || a.sent_at.is_some())
        .map(|(email, a)| {
            let score = a.opens as i64 + a.clicks as i64 * 3;
            RecipientScore {
                email: email.clone(),
                opens: a.opens,
                clicks: a.clicks,
                score,
                tier: engagement_tier(score),
            }
        })
        .collect();
    scores.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.email.cmp(&b.email)));

    let unique_recipients = scores.len();
    let tier_count = |tier: EngagementTier| scores.iter().filter(|s| s.tier == tier).count();
    let segment = |count: usize| TierSegment {
        count,
        percentage: round1(count as f64 / unique_recipients.max(1) as f64 * 100.0),
    };

    let unique_opens = recipients.values().filter(|a| a.opens > 0).count();
    let unique_clicks = recipients.values().filter(|a| a.clicks > 0).count();
    let adjusted_unique_opens = recipients.values().filter(|a| a.has_human_open).count();

    let total_opens: u64 = scores.iter().map(|s| s.opens).sum();
    let total_clicks: u64 = scores.iter().map(|s| s.clicks).sum();

    let recipients_report = RecipientInsights {
        unique_recipients,
        highly_engaged: segment(tier_count(EngagementTier::High)),
        moderately_engaged: segment(tier_count(EngagementTier::Moderate)),
        low_engaged: segment(tier_count(EngagementTier::Low)),
        avg_opens_per_recipient: round2(total_opens as f64 / unique_recipients.max(1) as f64),
        avg_clicks_per_recipient: round2(total_clicks as f64 / unique_recipients.max(1) as f64),
        top_recipients: scores.into_iter().take(10).collect(),
    };

    CampaignReport {
        total_events,
        counts,
        unique_opens,
        unique_clicks,
        proxy_opens: ProxyOpenSummary {
            likely_prefetch_opens,
            adjusted_unique_opens,
        },
        distributions: Distributions {
            browsers: format_distribution(browsers),
            operating_systems: format_distribution(oses),
            devices: format_distribution(devices),
            countries: format_distribution(countries),
        },
        temporal: TemporalReport {
            engagement_by_hour,
            peak_hours,
            engagement_by_day,
            best_day,
        },
        response_times: ResponseTimes {
            avg_time_to_open_secs: avg(&open_latencies),
            avg_time_to_click_secs: avg(&click_latencies),
        },
        engagement: EngagementMetrics {
            click_to_open_rate,
            unique_engagement_rate,
            engagement_quality_score,
            bounce_rate,
        },
        recipients: recipients_report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use uuid::Uuid;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        // 2026-06-01 is a Monday
        Utc.with_ymd_and_hms(2026, 6, 1, hour, minute, 0).unwrap()
    }

    fn event(email: &str, ty: EventType, occurred_at: DateTime<Utc>) -> Event {
        Event {
            id: Uuid::new_v4(),
            campaign_id: Uuid::nil(),
            tracking_id: Some(Uuid::new_v4()),
            email: Some(email.to_string()),
            event_type: ty.to_string(),
            provider_msg_id: None,
            user_agent: None,
            ip_address: None,
            country: None,
            referrer: None,
            link_url: None,
            occurred_at,
            raw: serde_json::Value::Null,
        }
    }

    fn event_ua(email: &str, ty: EventType, ua: &str, occurred_at: DateTime<Utc>) -> Event {
        let mut e = event(email, ty, occurred_at);
        e.user_agent = Some(ua.to_string());
        e
    }

    #[test]
    fn test_empty_slice_yields_default_report() {
        assert_eq!(compute_report(&[]), CampaignReport::default());
    }

    #[test]
    fn test_unique_opens_count_recipients_not_events() {
        let events = vec![
            event("a@x.com", EventType::Sent, at(8, 0)),
            event("b@x.com", EventType::Sent, at(8, 0)),
            event("c@x.com", EventType::Sent, at(8, 0)),
            event("a@x.com", EventType::Open, at(9, 0)),
            event("a@x.com", EventType::Open, at(9, 5)),
            event("b@x.com", EventType::Open, at(10, 0)),
            event("b@x.com", EventType::Open, at(11, 0)),
        ];

        let report = compute_report(&events);
        assert_eq!(report.counts.opens, 4);
        assert_eq!(report.unique_opens, 2);
        assert_eq!(report.unique_clicks, 0);
    }

    #[test]
    fn test_proxy_heuristic_flags_first_open_per_recipient() {
        let events = vec![
            event("a@x.com", EventType::Sent, at(8, 0)),
            event("b@x.com", EventType::Sent, at(8, 0)),
            // a opens twice: first is prefetch, second is human
            event("a@x.com", EventType::Open, at(8, 1)),
            event("a@x.com", EventType::Open, at(12, 0)),
            // b opens once: only a prefetch
            event("b@x.com", EventType::Open, at(8, 1)),
        ];

        let report = compute_report(&events);
        assert_eq!(report.unique_opens, 2);
        assert_eq!(report.proxy_opens.likely_prefetch_opens, 2);
        assert_eq!(report.proxy_opens.adjusted_unique_opens, 1);
    }

    #[test]
    fn test_heuristic_is_overridable() {
        fn nothing_is_prefetch(_: usize, _: &Event) -> bool {
            false
        }

        let events = vec![
            event("a@x.com", EventType::Sent, at(8, 0)),
            event("a@x.com", EventType::Open, at(8, 1)),
        ];

        let report = compute_report_with_heuristic(&events, nothing_is_prefetch);
        assert_eq!(report.proxy_opens.likely_prefetch_opens, 0);
        assert_eq!(report.proxy_opens.adjusted_unique_opens, 1);
    }

    #[test]
    fn test_engagement_tiers() {
        // 1 open + 1 click = 4 -> moderate; 2 opens + 1 click = 5 -> high
        assert_eq!(engagement_tier(1 + 3), EngagementTier::Moderate);
        assert_eq!(engagement_tier(2 + 3), EngagementTier::High);
        assert_eq!(engagement_tier(1), EngagementTier::Low);
        assert_eq!(engagement_tier(0), EngagementTier::Low);
    }

    #[test]
    fn test_recipient_segmentation() {
        let events = vec![
            event("high@x.com", EventType::Sent, at(8, 0)),
            event("mod@x.com", EventType::Sent, at(8, 0)),
            event("low@x.com", EventType::Sent, at(8, 0)),
            // high: 2 opens + 1 click = 5
            event("high@x.com", EventType::Open, at(9, 0)),
            event("high@x.com", EventType::Open, at(10, 0)),
            event("high@x.com", EventType::Click, at(10, 5)),
            // moderate: 1 open + 1 click = 4
            event("mod@x.com", EventType::Open, at(9, 0)),
            event("mod@x.com", EventType::Click, at(9, 30)),
        ];

        let report = compute_report(&events);
        assert_eq!(report.recipients.unique_recipients, 3);
        assert_eq!(report.recipients.highly_engaged.count, 1);
        assert_eq!(report.recipients.moderately_engaged.count, 1);
        assert_eq!(report.recipients.low_engaged.count, 1);
        assert_eq!(report.recipients.top_recipients[0].email, "high@x.com");
        assert_eq!(report.recipients.top_recipients[0].score, 5);
    }

    #[test]
    fn test_temporal_buckets_and_peak_hours() {
        let events = vec![
            event("a@x.com", EventType::Open, at(9, 0)),
            event("b@x.com", EventType::Open, at(9, 10)),
            event("c@x.com", EventType::Click, at(14, 0)),
        ];

        let report = compute_report(&events);
        assert_eq!(report.temporal.engagement_by_hour.len(), 24);
        assert_eq!(report.temporal.engagement_by_hour[9].opens, 2);
        assert_eq!(report.temporal.engagement_by_hour[9].engagement_score, 2);
        // Click weighs double
        assert_eq!(report.temporal.engagement_by_hour[14].engagement_score, 2);
        assert_eq!(report.temporal.peak_hours.len(), 2);
        assert_eq!(report.temporal.best_day, Some("Monday".to_string()));
    }

    #[test]
    fn test_quality_score_formula() {
        // 4 sent + 2 opens + 1 click = 7 events
        // (2*1 + 1*3 - 0*2) / 7 * 10 = 7.142 -> 7.1
        let events = vec![
            event("a@x.com", EventType::Sent, at(8, 0)),
            event("b@x.com", EventType::Sent, at(8, 0)),
            event("c@x.com", EventType::Sent, at(8, 0)),
            event("d@x.com", EventType::Sent, at(8, 0)),
            event("a@x.com", EventType::Open, at(9, 0)),
            event("b@x.com", EventType::Open, at(9, 0)),
            event("a@x.com", EventType::Click, at(9, 30)),
        ];

        let report = compute_report(&events);
        assert_eq!(report.engagement.engagement_quality_score, 7.1);
        // CTOR = 1 click / 2 opens
        assert_eq!(report.engagement.click_to_open_rate, 50.0);
    }

    #[test]
    fn test_quality_score_is_clamped() {
        // Heavy clicking would exceed 10 without the clamp
        let events = vec![
            event("a@x.com", EventType::Open, at(9, 0)),
            event("a@x.com", EventType::Click, at(9, 1)),
            event("a@x.com", EventType::Click, at(9, 2)),
        ];
        let report = compute_report(&events);
        assert_eq!(report.engagement.engagement_quality_score, 10.0);
    }

    #[test]
    fn test_response_times() {
        let events = vec![
            event("a@x.com", EventType::Sent, at(8, 0)),
            event("a@x.com", EventType::Open, at(8, 10)),
            event("a@x.com", EventType::Click, at(8, 30)),
            event("b@x.com", EventType::Sent, at(8, 0)),
            event("b@x.com", EventType::Open, at(8, 20)),
        ];

        let report = compute_report(&events);
        // (600 + 1200) / 2
        assert_eq!(report.response_times.avg_time_to_open_secs, Some(900.0));
        assert_eq!(report.response_times.avg_time_to_click_secs, Some(1800.0));
    }

    #[test]
    fn test_distributions_from_user_agents_and_country() {
        const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0) Chrome/120.0 Safari/537.36";
        const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X) Version/17.0 Mobile Safari/604.1";

        let mut a = event_ua("a@x.com", EventType::Open, CHROME, at(9, 0));
        a.country = Some("DE".to_string());
        let mut b = event_ua("b@x.com", EventType::Open, IPHONE, at(9, 5));
        b.country = Some("DE".to_string());
        let mut c = event_ua("c@x.com", EventType::Click, CHROME, at(9, 10));
        c.country = Some("FR".to_string());

        let report = compute_report(&[a, b, c]);
        assert_eq!(
            report.distributions.browsers,
            vec![
                DistributionEntry {
                    label: "Chrome".to_string(),
                    count: 2
                },
                DistributionEntry {
                    label: "Safari".to_string(),
                    count: 1
                },
            ]
        );
        assert_eq!(report.distributions.countries[0].label, "DE");
        assert_eq!(report.distributions.countries[0].count, 2);
        assert_eq!(report.distributions.devices.len(), 2);
    }

    #[test]
    fn test_distribution_overflow_bucket() {
        let mut counts = HashMap::new();
        for i in 0..12 {
            counts.insert(format!("label-{:02}", i), 12 - i as u64);
        }
        let formatted = format_distribution(counts);
        assert_eq!(formatted.len(), DISTRIBUTION_MAX_ITEMS + 1);
        assert_eq!(formatted.last().unwrap().label, "Other");
        // Two smallest entries (2 + 1) spill into the bucket
        assert_eq!(formatted.last().unwrap().count, 3);
    }

    #[test]
    fn test_report_is_deterministic() {
        let events = vec![
            event("a@x.com", EventType::Sent, at(8, 0)),
            event("b@x.com", EventType::Sent, at(8, 0)),
            event("a@x.com", EventType::Open, at(9, 0)),
            event("b@x.com", EventType::Click, at(10, 0)),
        ];

        let first = serde_json::to_value(compute_report(&events)).unwrap();
        let second = serde_json::to_value(compute_report(&events)).unwrap();
        assert_eq!(first, second);
    }
}
