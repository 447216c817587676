//! Gmail-backed mail gateway.
//!
//! Fetches recent inbox messages as tickets and sends threaded replies.
//! HTTP 401 from any endpoint maps to `DeskError::AuthExpired`; callers
//! must obtain a fresh token before issuing further gateway calls.

use crate::gateway::{MailGateway, OutgoingReply};
use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, TimeZone, Utc};
use desk_shared::{Attachment, DeskError, Ticket, TicketSource, TicketStatus};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, warn};

const GMAIL_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// Inbox query: recent, non-promotional mail only.
const INBOX_QUERY: &str = "label:INBOX -category:promotions -category:social newer_than:30d";

#[derive(Deserialize)]
struct MessageList {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

#[derive(Deserialize)]
struct MessageRef {
    id: String,
}

#[derive(Deserialize)]
struct MessageDetail {
    id: String,
    #[serde(rename = "threadId")]
    thread_id: String,
    #[serde(rename = "internalDate")]
    internal_date: String,
    #[serde(default)]
    snippet: String,
    #[serde(default, rename = "labelIds")]
    label_ids: Vec<String>,
    payload: MessagePart,
}

#[derive(Deserialize)]
struct MessagePart {
    #[serde(default)]
    filename: String,
    #[serde(default, rename = "mimeType")]
    mime_type: String,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: Option<PartBody>,
    #[serde(default)]
    parts: Vec<MessagePart>,
}

#[derive(Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Deserialize, Default)]
struct PartBody {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    size: u64,
    #[serde(default, rename = "attachmentId")]
    attachment_id: Option<String>,
}

#[derive(Deserialize)]
struct AttachmentBody {
    data: String,
}

/// Gmail REST client holding a bearer token.
pub struct GmailClient {
    http_client: reqwest::Client,
    access_token: String,
    from_re: Regex,
}

impl GmailClient {
    pub fn new(access_token: String) -> Self {
        Self {
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            access_token,
            // "Display Name <address@host>" or a bare address
            from_re: Regex::new(r"^(.*)<(.*)>$").expect("static regex"),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, DeskError> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| DeskError::Gateway(format!("gateway unreachable: {e}")))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DeskError::AuthExpired);
        }
        if !response.status().is_success() {
            return Err(DeskError::Gateway(format!(
                "gateway returned {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| DeskError::Gateway(format!("malformed gateway response: {e}")))
    }

    /// Split a From header into display name and address.
    fn parse_from(&self, raw: &str) -> (String, String) {
        match self.from_re.captures(raw) {
            Some(caps) => {
                let name = caps[1].trim().trim_matches('"').to_string();
                let address = caps[2].trim().to_string();
                (name, address)
            }
            None => (raw.to_string(), raw.to_string()),
        }
    }

    fn header<'a>(detail: &'a MessageDetail, name: &str) -> &'a str {
        detail
            .payload
            .headers
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
            .unwrap_or("")
    }

    /// Concatenate the plain-text parts of the payload tree.
    fn extract_body(part: &MessagePart, out: &mut String) {
        if part.mime_type == "text/plain" {
            if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_ref()) {
                if let Ok(bytes) = base64::engine::general_purpose::URL_SAFE_NO_PAD
                    .decode(data.trim_end_matches('='))
                {
                    out.push_str(&String::from_utf8_lossy(&bytes));
                }
            }
        }
        for sub in &part.parts {
            Self::extract_body(sub, out);
        }
    }

    fn extract_attachments(part: &MessagePart, out: &mut Vec<Attachment>) {
        if let Some(body) = &part.body {
            if let Some(attachment_id) = &body.attachment_id {
                out.push(Attachment {
                    id: attachment_id.clone(),
                    filename: if part.filename.is_empty() {
                        "unnamed_attachment".to_string()
                    } else {
                        part.filename.clone()
                    },
                    mime_type: part.mime_type.clone(),
                    size: body.size,
                });
            }
        }
        for sub in &part.parts {
            Self::extract_attachments(sub, out);
        }
    }

    fn ticket_from_detail(&self, detail: MessageDetail) -> Ticket {
        let subject = Self::header(&detail, "Subject").to_string();
        let message_id = Self::header(&detail, "Message-ID").to_string();
        let (sender_name, sender) = self.parse_from(Self::header(&detail, "From"));

        let mut body = String::new();
        Self::extract_body(&detail.payload, &mut body);
        if body.is_empty() {
            body = detail.snippet.clone();
        }

        let mut attachments = Vec::new();
        Self::extract_attachments(&detail.payload, &mut attachments);

        let timestamp = detail
            .internal_date
            .parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .unwrap_or_else(Utc::now);

        let unread = detail.label_ids.iter().any(|l| l == "UNREAD");

        Ticket {
            id: detail.id,
            thread_id: detail.thread_id,
            message_id,
            source: TicketSource::Mail,
            sender,
            sender_name,
            subject,
            body,
            timestamp,
            is_read: !unread,
            status: if unread {
                TicketStatus::New
            } else {
                TicketStatus::InProgress
            },
            attachments,
            classification: None,
            agent_notes: None,
            sent_reply: None,
            selected: false,
        }
    }

    /// Encode the reply as an RFC 2822 message, base64url per the raw
    /// send API.
    fn encode_raw(outgoing: &OutgoingReply) -> String {
        let subject_b64 =
            base64::engine::general_purpose::STANDARD.encode(outgoing.reply_subject());
        let body_b64 = base64::engine::general_purpose::STANDARD.encode(&outgoing.body);
        let message = format!(
            "To: {}\r\nSubject: =?utf-8?B?{}?=\r\nIn-Reply-To: {}\r\nReferences: {}\r\n\
             Content-Type: text/plain; charset=utf-8\r\nContent-Transfer-Encoding: base64\r\n\r\n{}",
            outgoing.to, subject_b64, outgoing.in_reply_to, outgoing.in_reply_to, body_b64
        );
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(message)
    }
}

#[async_trait]
impl MailGateway for GmailClient {
    async fn fetch_recent(&self, limit: usize) -> Result<Vec<Ticket>, DeskError> {
        let list_url = format!(
            "{}/messages?maxResults={}&q={}",
            GMAIL_URL,
            limit,
            urlencode(INBOX_QUERY)
        );
        let list: MessageList = self.get_json(&list_url).await?;
        info!("inbox sync: {} message refs", list.messages.len());

        let mut tickets = Vec::with_capacity(list.messages.len());
        for msg in list.messages {
            let detail_url = format!("{}/messages/{}", GMAIL_URL, msg.id);
            match self.get_json::<MessageDetail>(&detail_url).await {
                Ok(detail) => tickets.push(self.ticket_from_detail(detail)),
                Err(DeskError::AuthExpired) => return Err(DeskError::AuthExpired),
                Err(e) => {
                    // One unreadable message never aborts the sync.
                    warn!("skipping message {}: {e}", msg.id);
                }
            }
        }
        debug!("inbox sync: {} tickets parsed", tickets.len());
        Ok(tickets)
    }

    async fn fetch_attachment(
        &self,
        ticket_id: &str,
        attachment_id: &str,
    ) -> Result<Vec<u8>, DeskError> {
        let url = format!(
            "{}/messages/{}/attachments/{}",
            GMAIL_URL, ticket_id, attachment_id
        );
        let body: AttachmentBody = self.get_json(&url).await?;
        base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(body.data.trim_end_matches('='))
            .map_err(|e| DeskError::Gateway(format!("undecodable attachment: {e}")))
    }

    async fn send_reply(&self, outgoing: &OutgoingReply) -> Result<(), DeskError> {
        let url = format!("{}/messages/send", GMAIL_URL);
        let payload = json!({
            "raw": Self::encode_raw(outgoing),
            "threadId": outgoing.thread_id,
        });

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeskError::SendFailed(format!("gateway unreachable: {e}")))?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DeskError::AuthExpired);
        }
        if !response.status().is_success() {
            let status = response.status();
            let reason = response.text().await.unwrap_or_default();
            return Err(DeskError::SendFailed(format!("{status}: {reason}")));
        }
        info!("reply sent to {} (thread {})", outgoing.to, outgoing.thread_id);
        Ok(())
    }
}

/// Percent-encode the inbox query string.
fn urlencode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_from_with_display_name() {
        let client = GmailClient::new("token".into());
        let (name, address) = client.parse_from("\"Sara W\" <sara.w@outlook.com>");
        assert_eq!(name, "Sara W");
        assert_eq!(address, "sara.w@outlook.com");
    }

    #[test]
    fn test_parse_from_bare_address() {
        let client = GmailClient::new("token".into());
        let (name, address) = client.parse_from("john.doe@me.com");
        assert_eq!(name, "john.doe@me.com");
        assert_eq!(address, "john.doe@me.com");
    }

    #[test]
    fn test_encode_raw_threads_reply() {
        let outgoing = OutgoingReply {
            to: "x@example.com".into(),
            subject: "Paid but no credits".into(),
            thread_id: "t1".into(),
            in_reply_to: "<m1@mail>".into(),
            body: "Dear Customer,".into(),
        };
        let raw = GmailClient::encode_raw(&outgoing);
        let decoded = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(&raw)
            .unwrap();
        let text = String::from_utf8(decoded).unwrap();
        assert!(text.contains("In-Reply-To: <m1@mail>"));
        assert!(text.contains("References: <m1@mail>"));
        assert!(text.starts_with("To: x@example.com"));
    }

    #[test]
    fn test_urlencode() {
        assert_eq!(urlencode("a b:c"), "a%20b%3Ac");
    }
}
