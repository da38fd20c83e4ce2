use serde::Deserialize;

use crate::notification::{NormalizedNotification, Priority, Provider};

use super::{parse_payload, present, DisplayName, NormalizeError, Normalizer};

#[derive(Debug, Deserialize)]
struct ConfluencePayload {
    event: String,
    page: Option<Content>,
    blog: Option<Content>,
    comment: Option<Comment>,
}

#[derive(Debug, Deserialize)]
struct Content {
    title: Option<String>,
    #[serde(rename = "_links")]
    links: Option<Links>,
    space: Option<Space>,
}

#[derive(Debug, Deserialize)]
struct Links {
    base: Option<String>,
    tinyui: Option<String>,
    webui: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Space {
    key: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Comment {
    author: Option<DisplayName>,
}

/// Confluence page, blog post and comment webhooks.
pub struct ConfluenceNormalizer;

fn classify(event: &str) -> Priority {
    match event {
        "comment_created" => Priority::High,
        "page_created" | "page_updated" => Priority::Normal,
        "blog_created" => Priority::Low,
        _ => Priority::Normal,
    }
}

fn event_label(event: &str) -> String {
    match event {
        "page_created" => "Page created".to_string(),
        "page_updated" => "Page updated".to_string(),
        "comment_created" => "Comment added".to_string(),
        "blog_created" => "Blog post created".to_string(),
        other => other.replace('_', " "),
    }
}

/// Prefer the short link, then the full web UI path.
fn content_url(content: &Content) -> Option<String> {
    let links = content.links.as_ref()?;
    let base = present(links.base.as_ref())?;
    present(links.tinyui.as_ref())
        .or(present(links.webui.as_ref()))
        .map(|path| format!("{}{}", base, path))
}

impl Normalizer for ConfluenceNormalizer {
    fn provider(&self) -> Provider {
        Provider::Confluence
    }

    fn normalize(
        &self,
        payload: &serde_json::Value,
    ) -> Result<NormalizedNotification, NormalizeError> {
        let data: ConfluencePayload = parse_payload(Provider::Confluence, payload)?;
        let priority = classify(&data.event);

        let content = data.page.as_ref().or(data.blog.as_ref());
        let title = content
            .and_then(|c| present(c.title.as_ref()))
            .unwrap_or("Unknown page");
        let space = content
            .and_then(|c| c.space.as_ref())
            .and_then(|s| present(s.name.as_ref()).or(present(s.key.as_ref())));

        let body = match data
            .comment
            .as_ref()
            .and_then(|c| c.author.as_ref())
            .and_then(|a| present(a.display_name.as_ref()))
        {
            Some(author) => format!("{} commented", author),
            None => event_label(&data.event),
        };

        let title = match space {
            Some(space) => format!("{}: {}", space, title),
            None => title.to_string(),
        };

        Ok(NormalizedNotification::new(
            title,
            body,
            content.and_then(content_url),
            priority,
        ))
    }
}
