//! Operator notices and their webhook delivery.

use serde::Serialize;
use tracing::{debug, warn};

/// Colors for the notice sidebar, webhook-attachment style.
const COLOR_BLOCKED: &str = "#FF0000";
const COLOR_RELAYED: &str = "#00FF00";
const COLOR_UNSCORED: &str = "#FFBF00";

/// An interactive button attached to a notice.
#[derive(Debug, Clone, Serialize)]
pub struct NoticeAction {
    /// Stable identifier the sink echoes back on click.
    pub id: String,
    /// Action kind, `"button"` for everything we emit.
    #[serde(rename = "type")]
    pub kind: String,
    /// Button label.
    pub name: String,
    /// Visual style hint (`"danger"`, `"success"`).
    pub style: String,
}

impl NoticeAction {
    fn button(id: &str, name: &str, style: &str) -> Self {
        Self {
            id: id.to_owned(),
            kind: "button".to_owned(),
            name: name.to_owned(),
            style: style.to_owned(),
        }
    }
}

/// One moderation event, shaped for a chat-webhook attachment.
#[derive(Debug, Clone, Serialize)]
pub struct Notice {
    /// Display name of the sender; becomes the webhook `username`, not
    /// part of the attachment itself.
    #[serde(skip)]
    pub sender: String,
    /// The line itself (already trimmed, never sanitized — the sink gets
    /// what the peer sent).
    pub text: String,
    /// Sidebar color encoding the verdict.
    pub color: String,
    /// One-line summary shown above the text.
    pub pretext: String,
    /// Optional illustration for the verdict.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumb_url: Option<String>,
    /// Follow-up buttons, e.g. an agree/disagree poll on borderline calls.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<NoticeAction>,
}

impl Notice {
    /// Notice for a line the lexicon rejected.
    #[must_use]
    pub fn lexical_block(sender: &str, line: &str, thumb_url: Option<String>) -> Self {
        Self {
            sender: sender.to_owned(),
            text: line.to_owned(),
            color: COLOR_BLOCKED.to_owned(),
            pretext: format!("{sender} sent a message the word filter rejected"),
            thumb_url,
            actions: Vec::new(),
        }
    }

    /// Notice for a line the classifier scored offensive. Carries a
    /// yes/no poll so operators can grade the call.
    #[must_use]
    pub fn classifier_block(sender: &str, line: &str, thumb_url: Option<String>) -> Self {
        Self {
            sender: sender.to_owned(),
            text: line.to_owned(),
            color: COLOR_BLOCKED.to_owned(),
            pretext: format!("{sender} sent a message the classifier scored offensive. Agree?"),
            thumb_url,
            actions: vec![
                NoticeAction::button("offensive-yes", "Yes", "danger"),
                NoticeAction::button("offensive-no", "No", "success"),
            ],
        }
    }

    /// Notice for a line relayed without a classifier verdict.
    #[must_use]
    pub fn unscored(sender: &str, line: &str, thumb_url: Option<String>) -> Self {
        Self {
            sender: sender.to_owned(),
            text: line.to_owned(),
            color: COLOR_UNSCORED.to_owned(),
            pretext: format!("{sender} sent a message the classifier could not score"),
            thumb_url,
            actions: Vec::new(),
        }
    }

    /// Notice for a cleanly relayed line.
    #[must_use]
    pub fn relayed(sender: &str, line: &str, thumb_url: Option<String>) -> Self {
        Self {
            sender: sender.to_owned(),
            text: line.to_owned(),
            color: COLOR_RELAYED.to_owned(),
            pretext: format!("{sender} sent a message"),
            thumb_url,
            actions: Vec::new(),
        }
    }
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    username: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    icon_url: Option<&'a str>,
    attachments: [&'a Notice; 1],
}

/// Fire-and-forget notice delivery to an operator webhook.
///
/// Unconfigured (no URL) is a valid steady state: notices are dropped at
/// debug level. Delivery failures are logged and swallowed; the relay's
/// hot path never waits on, or fails because of, the sink.
#[derive(Debug, Clone)]
pub struct Notifier {
    webhook_url: Option<String>,
    icon_url: Option<String>,
    client: reqwest::Client,
}

impl Notifier {
    /// Build a notifier. `webhook_url = None` disables delivery.
    #[must_use]
    pub fn new(
        webhook_url: Option<String>,
        icon_url: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            webhook_url,
            icon_url,
            client,
        }
    }

    /// Whether a sink is configured at all.
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Deliver one notice. Await completes when the HTTP exchange does;
    /// callers that must not block spawn this.
    pub async fn send(&self, notice: Notice) {
        let Some(url) = self.webhook_url.as_deref() else {
            debug!(pretext = %notice.pretext, "no webhook configured, dropping notice");
            return;
        };
        let payload = WebhookPayload {
            username: &notice.sender,
            icon_url: self.icon_url.as_deref(),
            attachments: [&notice],
        };
        match self.client.post(url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(pretext = %notice.pretext, "notice delivered");
            }
            Ok(response) => {
                warn!(status = %response.status(), "webhook rejected notice");
            }
            Err(error) => {
                warn!(%error, "webhook delivery failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn poll_buttons_only_on_classifier_blocks() {
        let block = Notice::classifier_block("alice", "bad line", None);
        assert_eq!(block.actions.len(), 2);
        assert_eq!(block.actions[0].name, "Yes");
        assert_eq!(block.actions[0].style, "danger");
        assert_eq!(block.actions[1].name, "No");
        assert_eq!(block.actions[1].style, "success");

        assert!(Notice::relayed("alice", "hi", None).actions.is_empty());
        assert!(Notice::lexical_block("alice", "hi", None).actions.is_empty());
    }

    #[test]
    fn serialization_skips_empty_optionals() {
        let notice = Notice::relayed("alice", "hi", None);
        let json = serde_json::to_value(&notice).unwrap();
        assert!(json.get("thumb_url").is_none());
        assert!(json.get("actions").is_none());
        // The sender names the webhook user, it is not attachment data.
        assert!(json.get("sender").is_none());

        let block = Notice::classifier_block("alice", "hi", Some("http://x/y.png".to_owned()));
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["thumb_url"], "http://x/y.png");
        assert_eq!(json["actions"][0]["type"], "button");
    }

    #[tokio::test]
    async fn posts_under_the_senders_display_name() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(body_partial_json(serde_json::json!({
                "username": "alice",
                "attachments": [{ "text": "hello", "color": "#00FF00" }],
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = Notifier::new(
            Some(format!("{}/hook", server.uri())),
            None,
            reqwest::Client::new(),
        );
        notifier.send(Notice::relayed("alice", "hello", None)).await;
    }

    #[tokio::test]
    async fn unconfigured_notifier_is_a_no_op() {
        let notifier = Notifier::new(None, None, reqwest::Client::new());
        assert!(!notifier.is_configured());
        // Must return without any network activity.
        notifier.send(Notice::relayed("alice", "hello", None)).await;
    }
}
