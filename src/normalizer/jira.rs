use serde::Deserialize;
use url::Url;

use crate::notification::{NormalizedNotification, Priority, Provider};

use super::{parse_payload, present, DisplayName, NormalizeError, Normalizer};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraPayload {
    webhook_event: String,
    issue: Option<Issue>,
    comment: Option<Comment>,
    changelog: Option<Changelog>,
    user: Option<DisplayName>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    key: String,
    #[serde(rename = "self")]
    self_url: Option<String>,
    fields: Option<IssueFields>,
}

#[derive(Debug, Deserialize)]
struct IssueFields {
    summary: Option<String>,
    assignee: Option<DisplayName>,
    issuetype: Option<IssueType>,
}

#[derive(Debug, Deserialize)]
struct IssueType {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Comment {
    author: Option<DisplayName>,
}

#[derive(Debug, Deserialize)]
struct Changelog {
    #[serde(default)]
    items: Vec<ChangeItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeItem {
    field: Option<String>,
    from_string: Option<String>,
    #[serde(rename = "toString")]
    to_value: Option<String>,
}

const ISSUE_CREATED: &str = "jira:issue_created";
const ISSUE_UPDATED: &str = "jira:issue_updated";
const COMMENT_CREATED: &str = "comment_created";

/// Jira Cloud issue and comment webhooks.
pub struct JiraNormalizer;

impl JiraPayload {
    fn changed(&self, field: &str) -> bool {
        self.changelog
            .as_ref()
            .map(|c| c.items.iter().any(|i| i.field.as_deref() == Some(field)))
            .unwrap_or(false)
    }

    fn has_assignee(&self) -> bool {
        self.issue
            .as_ref()
            .and_then(|i| i.fields.as_ref())
            .map(|f| f.assignee.is_some())
            .unwrap_or(false)
    }
}

fn classify(data: &JiraPayload) -> Priority {
    match data.webhook_event.as_str() {
        ISSUE_CREATED if data.has_assignee() => Priority::High,
        COMMENT_CREATED => Priority::Normal,
        // A status transition outranks a simultaneous reassignment
        ISSUE_UPDATED if data.changed("status") => Priority::Normal,
        ISSUE_UPDATED if data.changed("assignee") => Priority::High,
        _ => Priority::Normal,
    }
}

fn display_name(user: Option<&DisplayName>) -> &str {
    user.and_then(|u| present(u.display_name.as_ref()))
        .unwrap_or("Someone")
}

fn extract_body(data: &JiraPayload) -> String {
    let event = data.webhook_event.as_str();

    if event == COMMENT_CREATED {
        if let Some(comment) = &data.comment {
            return format!("{} commented", display_name(comment.author.as_ref()));
        }
    }

    if event == ISSUE_UPDATED {
        if let Some(changelog) = data.changelog.as_ref().filter(|c| !c.items.is_empty()) {
            return changelog
                .items
                .iter()
                .map(|i| {
                    format!(
                        "{}: {} → {}",
                        i.field.as_deref().unwrap_or(""),
                        i.from_string.as_deref().unwrap_or(""),
                        i.to_value.as_deref().unwrap_or("")
                    )
                })
                .collect::<Vec<_>>()
                .join(", ");
        }
    }

    if event == ISSUE_CREATED {
        let kind = data
            .issue
            .as_ref()
            .and_then(|i| i.fields.as_ref())
            .and_then(|f| f.issuetype.as_ref())
            .and_then(|t| present(t.name.as_ref()))
            .unwrap_or("Issue");
        return format!("{} created {}", display_name(data.user.as_ref()), kind);
    }

    event.replace('_', " ")
}

/// `https://acme.atlassian.net/rest/api/2/issue/10001` -> `https://acme.atlassian.net/browse/KEY-1`
fn browse_url(issue: &Issue) -> Option<String> {
    let key = present(Some(&issue.key))?;
    let api_url = Url::parse(present(issue.self_url.as_ref())?).ok()?;
    let origin = api_url.origin();
    if !origin.is_tuple() {
        return None;
    }
    Some(format!("{}/browse/{}", origin.ascii_serialization(), key))
}

impl Normalizer for JiraNormalizer {
    fn provider(&self) -> Provider {
        Provider::Jira
    }

    fn normalize(
        &self,
        payload: &serde_json::Value,
    ) -> Result<NormalizedNotification, NormalizeError> {
        let data: JiraPayload = parse_payload(Provider::Jira, payload)?;
        let priority = classify(&data);

        let key = data
            .issue
            .as_ref()
            .and_then(|i| present(Some(&i.key)))
            .unwrap_or("Unknown");
        let summary = data
            .issue
            .as_ref()
            .and_then(|i| i.fields.as_ref())
            .and_then(|f| present(f.summary.as_ref()));
        let title = match summary {
            Some(summary) => format!("{}: {}", key, summary),
            None => key.to_string(),
        };

        Ok(NormalizedNotification::new(
            title,
            extract_body(&data),
            data.issue.as_ref().and_then(browse_url),
            priority,
        ))
    }
}
