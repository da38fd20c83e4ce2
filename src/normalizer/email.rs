use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::notification::{NormalizedNotification, Priority, Provider};

use super::{parse_payload, present, NormalizeError, Normalizer};

/// Longest body excerpt kept from an email, in characters.
const BODY_EXCERPT_CHARS: usize = 200;

lazy_static! {
    static ref URGENT_KEYWORDS: Regex =
        Regex::new(r"(?i)\b(urgent|critical|failed|failure|down|outage|emergency|incident)\b")
            .expect("urgent keyword pattern is valid");
    static ref FIRST_URL: Regex =
        Regex::new(r#"https?://[^\s<>"')\]]+"#).expect("url pattern is valid");
}

#[derive(Debug, Deserialize)]
struct EmailPayload {
    from: Option<String>,
    subject: String,
    body: Option<String>,
    html: Option<String>,
}

/// Inbound email relayed as JSON by a mail-forwarding service.
pub struct EmailNormalizer;

fn classify(subject: &str) -> Priority {
    if URGENT_KEYWORDS.is_match(subject) {
        Priority::High
    } else {
        Priority::Normal
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

impl Normalizer for EmailNormalizer {
    fn provider(&self) -> Provider {
        Provider::Email
    }

    fn normalize(
        &self,
        payload: &serde_json::Value,
    ) -> Result<NormalizedNotification, NormalizeError> {
        let data: EmailPayload = parse_payload(Provider::Email, payload)?;
        let subject = data.subject.trim();
        if subject.is_empty() {
            return Err(NormalizeError::new(Provider::Email, "subject must not be empty"));
        }

        let priority = classify(subject);
        let text = data.body.as_deref().unwrap_or("");
        let link_source = present(data.html.as_ref())
            .or(present(data.body.as_ref()))
            .unwrap_or("");
        let url = FIRST_URL.find(link_source).map(|m| m.as_str().to_string());

        let excerpt = truncate(text, BODY_EXCERPT_CHARS);
        let body = match present(data.from.as_ref()) {
            Some(from) => format!("From: {} - {}", from, excerpt),
            None => excerpt,
        };

        Ok(NormalizedNotification::new(subject, body, url, priority))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_urgent_keywords_are_high() {
        for subject in [
            "URGENT: rotate keys",
            "Nightly backup FAILED",
            "Payment service down",
            "Incident #42 opened",
            "Regional outage",
        ] {
            assert_eq!(classify(subject), Priority::High, "{}", subject);
        }
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        assert_eq!(classify("Download your invoice"), Priority::Normal);
        assert_eq!(classify("[JIRA] OPS-1 updated"), Priority::Normal);
    }

    #[test]
    fn test_body_url_and_sender() {
        let n = EmailNormalizer
            .normalize(&json!({
                "from": "alerts@example.com",
                "subject": "Critical: disk usage",
                "body": "See https://status.example.com/i/9 for details."
            }))
            .unwrap();
        assert_eq!(n.priority, Priority::High);
        assert!(n.time_sensitive);
        assert_eq!(n.title, "Critical: disk usage");
        assert_eq!(
            n.body,
            "From: alerts@example.com - See https://status.example.com/i/9 for details."
        );
        assert_eq!(n.url.as_deref(), Some("https://status.example.com/i/9"));
    }

    #[test]
    fn test_html_is_preferred_for_links() {
        let n = EmailNormalizer
            .normalize(&json!({
                "subject": "Weekly digest",
                "body": "plain https://plain.example.com",
                "html": "<a href=\"https://html.example.com/x\">open</a>"
            }))
            .unwrap();
        assert_eq!(n.url.as_deref(), Some("https://html.example.com/x"));
        assert_eq!(n.priority, Priority::Normal);
    }

    #[test]
    fn test_truncate_counts_characters() {
        let long = "é".repeat(250);
        let out = truncate(&long, 200);
        assert_eq!(out.chars().count(), 203);
        assert!(out.ends_with("..."));
        assert_eq!(truncate("short", 200), "short");
    }

    #[test]
    fn test_rejects_missing_or_blank_subject() {
        assert!(EmailNormalizer.normalize(&json!({"body": "hi"})).is_err());
        assert!(EmailNormalizer.normalize(&json!({"subject": "   "})).is_err());
    }
}
