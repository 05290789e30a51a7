use crate::notify::{Notification, Notifier, NotifyError};
use futures::future::BoxFuture;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Sends notifications to a fixed set of Telegram users and channels via the
/// Bot API `sendMessage` method.
///
/// An alternative API base can be supplied for bot-api proxies. The token is
/// held as a secret and only interpolated into request URLs.
pub struct TelegramNotifier {
    client: reqwest::Client,
    token: SecretString,
    api_base: String,
    chats: Vec<String>,
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramNotifier {
    pub fn new(
        client: reqwest::Client,
        token: SecretString,
        api_url: Option<&str>,
        users: &[i64],
        channels: &[String],
    ) -> Self {
        let chats = users
            .iter()
            .map(|id| id.to_string())
            .chain(channels.iter().cloned())
            .collect();
        Self {
            client,
            token,
            api_base: api_url
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            chats,
        }
    }

    fn format_message(note: &Notification) -> String {
        let mut text = note.title.clone();
        if let Some(link) = &note.link {
            text.push_str("\n\n");
            text.push_str(link);
        }
        text.push_str(&format!(
            "\n\nGroup: {}\nPublished: {}",
            note.group,
            note.published.format("%Y-%m-%d %H:%M UTC")
        ));
        if !note.matched_keywords.is_empty() {
            let tags: Vec<String> = note
                .matched_keywords
                .iter()
                .map(|k| format!("#{}", k.replace(char::is_whitespace, "_")))
                .collect();
            text.push_str(&format!("\nKeywords: {}", tags.join(" ")));
        }
        text
    }

    async fn send_to_chat(&self, chat: &str, text: &str) -> Result<(), NotifyError> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.api_base,
            self.token.expose_secret()
        );
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({
                "chat_id": chat,
                "text": text,
                "disable_web_page_preview": true,
            }))
            .send()
            .await?;

        let api: ApiResponse = response.json().await?;
        if api.ok {
            Ok(())
        } else {
            Err(NotifyError::Api {
                chat: chat.to_string(),
                description: api
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            })
        }
    }

    async fn deliver(&self, note: Notification) -> Result<(), NotifyError> {
        if self.chats.is_empty() {
            return Err(NotifyError::NoTargets);
        }

        let text = Self::format_message(&note);
        let total = self.chats.len();
        let mut failed = 0usize;

        // Deliver to every chat even when one fails; a single blocked chat
        // must not silence the rest.
        for chat in &self.chats {
            if let Err(e) = self.send_to_chat(chat, &text).await {
                failed += 1;
                tracing::warn!(chat = %chat, group = %note.group, error = %e, "Telegram delivery failed");
            }
        }

        if failed == 0 {
            Ok(())
        } else {
            Err(NotifyError::Partial { failed, total })
        }
    }
}

impl Notifier for TelegramNotifier {
    fn notify(&self, note: Notification) -> BoxFuture<'_, Result<(), NotifyError>> {
        Box::pin(self.deliver(note))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn note() -> Notification {
        Notification {
            title: "Rust 1.80 released".to_string(),
            link: Some("https://blog.rust-lang.org/1.80".to_string()),
            group: "rust".to_string(),
            published: Utc.with_ymd_and_hms(2024, 7, 25, 14, 0, 0).unwrap(),
            matched_keywords: vec!["release".to_string()],
        }
    }

    fn notifier(server: &MockServer, users: &[i64], channels: &[String]) -> TelegramNotifier {
        TelegramNotifier::new(
            reqwest::Client::new(),
            SecretString::from("test-token".to_string()),
            Some(&server.uri()),
            users,
            channels,
        )
    }

    #[test]
    fn test_message_format() {
        let text = TelegramNotifier::format_message(&note());
        assert_eq!(
            text,
            "Rust 1.80 released\n\nhttps://blog.rust-lang.org/1.80\n\n\
             Group: rust\nPublished: 2024-07-25 14:00 UTC\nKeywords: #release"
        );
    }

    #[test]
    fn test_message_format_without_link_or_keywords() {
        let mut n = note();
        n.link = None;
        n.matched_keywords.clear();
        let text = TelegramNotifier::format_message(&n);
        assert!(!text.contains("https://"));
        assert!(!text.contains("Keywords:"));
        assert!(text.contains("Group: rust"));
    }

    #[test]
    fn test_multiword_keywords_become_single_tags() {
        let mut n = note();
        n.matched_keywords = vec!["machine learning".to_string()];
        let text = TelegramNotifier::format_message(&n);
        assert!(text.contains("#machine_learning"));
    }

    #[tokio::test]
    async fn test_delivers_to_every_user_and_channel() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(3)
            .mount(&server)
            .await;

        let n = notifier(&server, &[1001, 1002], &["@chan".to_string()]);
        n.notify(note()).await.unwrap();
    }

    #[tokio::test]
    async fn test_chat_id_is_sent_in_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"chat_id": "@chan"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let n = notifier(&server, &[], &["@chan".to_string()]);
        n.notify(note()).await.unwrap();
    }

    #[tokio::test]
    async fn test_api_rejection_surfaces_as_partial_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"ok": false, "description": "chat not found"}),
            ))
            .mount(&server)
            .await;

        let n = notifier(&server, &[1001], &[]);
        let err = n.notify(note()).await.unwrap_err();
        match err {
            NotifyError::Partial { failed: 1, total: 1 } => {}
            e => panic!("Expected Partial, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_one_bad_chat_does_not_block_the_rest() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"chat_id": "1001"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({"ok": false, "description": "blocked"}),
            ))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"chat_id": "1002"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let n = notifier(&server, &[1001, 1002], &[]);
        let err = n.notify(note()).await.unwrap_err();
        assert!(matches!(err, NotifyError::Partial { failed: 1, total: 2 }));
    }

    #[tokio::test]
    async fn test_no_targets_is_an_error() {
        let server = MockServer::start().await;
        let n = notifier(&server, &[], &[]);
        assert!(matches!(
            n.notify(note()).await.unwrap_err(),
            NotifyError::NoTargets
        ));
    }
}
