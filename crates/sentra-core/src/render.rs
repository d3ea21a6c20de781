//! Email rendering: link rewriting, pixel injection, unsubscribe links

use chrono::{DateTime, Duration, Utc};
use regex::{Captures, Regex};
use sentra_common::{Error, Result};
use sentra_storage::models::{CreateLinkMapping, SendJob};
use uuid::Uuid;

/// 1x1 transparent PNG served for every open-tracking request
pub const TRACKING_PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x44, 0x41, 0x54, 0x78, 0xda, 0x63, 0x64,
    0xf8, 0xcf, 0x50, 0x0f, 0x00, 0x03, 0x86, 0x01, 0x80, 0x5a, 0x34, 0x7d, 0x6b, 0x00, 0x00,
    0x00, 0x00, 0x49, 0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

/// Placeholder campaign authors put where the unsubscribe link should go
pub const UNSUBSCRIBE_PLACEHOLDER: &str = "{{unsubscribe_url}}";

/// Rightmost ASCII-case-insensitive match, as a byte offset into the
/// original string. Lowercasing the haystack would shift offsets for
/// non-ASCII text, so the scan stays byte-wise.
fn rfind_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    let haystack = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack
        .windows(needle.len())
        .rposition(|window| window.eq_ignore_ascii_case(needle))
}

/// Rewrites campaign HTML for tracking
pub struct EmailRenderer {
    base_url: String,
    secret: String,
    link_ttl: Duration,
    href_re: Regex,
}

/// A rendered message plus the link mappings its tracked URLs need
pub struct RenderedEmail {
    pub html: String,
    pub link_mappings: Vec<CreateLinkMapping>,
}

impl EmailRenderer {
    /// Create a renderer for a tracking domain
    pub fn new(base_url: &str, secret: &str, link_ttl_days: i64) -> Result<Self> {
        let href_re = Regex::new(r#"(?i)href\s*=\s*"([^"]*)""#)
            .map_err(|e| Error::Internal(format!("href pattern: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret: secret.to_string(),
            link_ttl: Duration::days(link_ttl_days),
            href_re,
        })
    }

    fn click_url(&self, token: Uuid) -> String {
        format!("{}/track/click/{}", self.base_url, token)
    }

    fn pixel_url(&self, tracking_id: Uuid) -> String {
        format!("{}/track/open/{}", self.base_url, tracking_id)
    }

    /// Public unsubscribe URL for a delivery, carrying a signed token
    pub fn unsubscribe_url(&self, tracking_id: Uuid) -> String {
        let token = sentra_common::token::sign_tracking_id(&tracking_id, &self.secret);
        format!("{}/unsubscribe/{}", self.base_url, token)
    }

    /// Whether a URL should be left alone by link rewriting
    fn skip_url(&self, url: &str) -> bool {
        url.is_empty()
            || url.starts_with('#')
            || url.starts_with("mailto:")
            || url.starts_with(&self.base_url)
            || !(url.starts_with("http://") || url.starts_with("https://"))
    }

    /// Replace every tracked `href` with a click-token URL, collecting the
    /// token-to-destination mappings for storage
    pub fn rewrite_links(
        &self,
        html: &str,
        job: &SendJob,
        now: DateTime<Utc>,
    ) -> (String, Vec<CreateLinkMapping>) {
        let mut mappings = Vec::new();
        let expires_at = now + self.link_ttl;

        let rewritten = self.href_re.replace_all(html, |caps: &Captures<'_>| {
            let url = &caps[1];
            if self.skip_url(url) {
                return caps[0].to_string();
            }

            let token = Uuid::new_v4();
            mappings.push(CreateLinkMapping {
                id: token,
                tracking_id: job.tracking_id,
                campaign_id: job.campaign_id,
                email: job.email.clone(),
                link_index: mappings.len() as i32,
                original_url: url.to_string(),
                expires_at,
            });

            format!(r#"href="{}""#, self.click_url(token))
        });

        (rewritten.into_owned(), mappings)
    }

    /// Inject the open-tracking pixel before `</body>`, appending when the
    /// document has no body close tag
    pub fn inject_pixel(&self, html: &str, tracking_id: Uuid) -> String {
        let pixel = format!(
            r#"<img src="{}" width="1" height="1" style="display:none" alt=""/>"#,
            self.pixel_url(tracking_id)
        );

        match rfind_ascii_ci(html, "</body>") {
            Some(idx) => format!("{}{}{}", &html[..idx], pixel, &html[idx..]),
            None => format!("{}{}", html, pixel),
        }
    }

    /// Substitute the unsubscribe placeholder, appending a footer link when
    /// the author left it out
    pub fn apply_unsubscribe(&self, html: &str, tracking_id: Uuid) -> String {
        let url = self.unsubscribe_url(tracking_id);

        if html.contains(UNSUBSCRIBE_PLACEHOLDER) {
            html.replace(UNSUBSCRIBE_PLACEHOLDER, &url)
        } else {
            format!(
                r#"{}<p style="font-size:12px;color:#888"><a href="{}">Unsubscribe</a></p>"#,
                html, url
            )
        }
    }

    /// Full rendering pipeline for one delivery
    pub fn render(&self, html: &str, job: &SendJob, now: DateTime<Utc>) -> RenderedEmail {
        let with_unsub = self.apply_unsubscribe(html, job.tracking_id);
        let (rewritten, link_mappings) = self.rewrite_links(&with_unsub, job, now);
        let html = self.inject_pixel(&rewritten, job.tracking_id);

        RenderedEmail {
            html,
            link_mappings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn renderer() -> EmailRenderer {
        EmailRenderer::new("https://track.test", "secret", 90).unwrap()
    }

    fn job() -> SendJob {
        let now = Utc::now();
        SendJob {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            tracking_id: Uuid::new_v4(),
            status: "pending".to_string(),
            provider_msg_id: None,
            attempts: 0,
            max_attempts: 5,
            last_error: None,
            scheduled_at: now,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_rewrite_replaces_http_links() {
        let r = renderer();
        let job = job();
        let (html, mappings) = r.rewrite_links(
            r#"<a href="https://shop.example.com/sale">Sale</a>"#,
            &job,
            Utc::now(),
        );

        assert_eq!(mappings.len(), 1);
        assert_eq!(mappings[0].original_url, "https://shop.example.com/sale");
        assert!(html.contains(&format!(
            "https://track.test/track/click/{}",
            mappings[0].id
        )));
        assert!(!html.contains("shop.example.com"));
    }

    #[test]
    fn test_rewrite_skips_mailto_anchor_and_tracked() {
        let r = renderer();
        let input = concat!(
            r#"<a href="mailto:hi@x.com">mail</a>"#,
            r##"<a href="#top">top</a>"##,
            r#"<a href="https://track.test/track/click/abc">done</a>"#,
        );
        let (html, mappings) = r.rewrite_links(input, &job(), Utc::now());

        assert_eq!(mappings.len(), 0);
        assert_eq!(html, input);
    }

    #[test]
    fn test_rewrite_assigns_fresh_token_per_link() {
        let r = renderer();
        let input = r#"<a href="https://x.com/a">a</a><a href="https://x.com/a">b</a>"#;
        let (_, mappings) = r.rewrite_links(input, &job(), Utc::now());

        assert_eq!(mappings.len(), 2);
        assert_ne!(mappings[0].id, mappings[1].id);
        assert_eq!(mappings[0].link_index, 0);
        assert_eq!(mappings[1].link_index, 1);
    }

    #[test]
    fn test_mapping_ttl() {
        let r = renderer();
        let now = Utc::now();
        let (_, mappings) =
            r.rewrite_links(r#"<a href="https://x.com/a">a</a>"#, &job(), now);
        assert_eq!(mappings[0].expires_at, now + Duration::days(90));
    }

    #[test]
    fn test_pixel_injected_before_body_close() {
        let r = renderer();
        let id = Uuid::new_v4();
        let html = r.inject_pixel("<html><body><p>hi</p></BODY></html>", id);

        let pixel_pos = html.find("/track/open/").unwrap();
        let body_pos = html.to_lowercase().rfind("</body>").unwrap();
        assert!(pixel_pos < body_pos);
    }

    #[test]
    fn test_pixel_position_unaffected_by_non_ascii_body() {
        let r = renderer();
        let html = r.inject_pixel("<body>İstanbul ĞÜŞ</body>", Uuid::new_v4());

        assert!(html.ends_with("</body>"));
        let pixel_pos = html.find("/track/open/").unwrap();
        assert!(pixel_pos < html.rfind("</body>").unwrap());
    }

    #[test]
    fn test_pixel_appended_without_body() {
        let r = renderer();
        let id = Uuid::new_v4();
        let html = r.inject_pixel("<p>hi</p>", id);
        assert!(html.ends_with(r#"alt=""/>"#));
        assert!(html.starts_with("<p>hi</p>"));
    }

    #[test]
    fn test_unsubscribe_placeholder_substituted() {
        let r = renderer();
        let id = Uuid::new_v4();
        let html = r.apply_unsubscribe(r#"<a href="{{unsubscribe_url}}">bye</a>"#, id);
        assert!(!html.contains(UNSUBSCRIBE_PLACEHOLDER));
        assert!(html.contains("/unsubscribe/"));
    }

    #[test]
    fn test_unsubscribe_footer_appended_when_missing() {
        let r = renderer();
        let html = r.apply_unsubscribe("<p>hi</p>", Uuid::new_v4());
        assert!(html.contains("Unsubscribe"));
        assert!(html.contains("/unsubscribe/"));
    }

    #[test]
    fn test_full_render_pipeline() {
        let r = renderer();
        let job = job();
        let rendered = r.render(
            r#"<body><a href="https://x.com/buy">buy</a></body>"#,
            &job,
            Utc::now(),
        );

        assert_eq!(rendered.link_mappings.len(), 1);
        assert!(rendered.html.contains("/track/click/"));
        assert!(rendered
            .html
            .contains(&format!("/track/open/{}", job.tracking_id)));
        assert!(rendered.html.contains("/unsubscribe/"));
    }
}
