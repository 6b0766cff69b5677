use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One message from a listing page. Only the fields triage needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub id: String,
    pub subject: String,
    pub sender: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub has_attachments: bool,
    pub is_read: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessagePage {
    pub messages: Vec<EmailMessage>,
    pub next_link: Option<String>,
}

const FILE_ATTACHMENT_TYPE: &str = "#microsoft.graph.fileAttachment";

/// Attachment metadata as listed under a message. `content_bytes` is filled
/// when the listing already inlined the payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(rename = "@odata.type", default)]
    pub odata_type: Option<String>,
    #[serde(default)]
    pub is_inline: bool,
    #[serde(default)]
    pub content_bytes: Option<String>,
}

impl AttachmentRef {
    /// Item and reference attachments carry no file payload.
    pub fn is_file(&self) -> bool {
        self.odata_type
            .as_deref()
            .is_none_or(|t| t.eq_ignore_ascii_case(FILE_ATTACHMENT_TYPE))
    }
}

/// Attachment bytes plus the metadata scoring and storage need.
#[derive(Debug, Clone)]
pub struct DownloadedAttachment {
    pub message_id: String,
    pub attachment_id: String,
    pub original_name: String,
    /// Sanitized name used on disk.
    pub filename: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawMessage {
    pub id: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub from: Option<RawRecipient>,
    #[serde(default)]
    pub received_date_time: Option<String>,
    #[serde(default)]
    pub has_attachments: bool,
    #[serde(default)]
    pub is_read: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawRecipient {
    pub email_address: Option<RawAddress>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAddress {
    pub address: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawPage<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

impl From<RawMessage> for EmailMessage {
    fn from(raw: RawMessage) -> Self {
        Self {
            id: raw.id,
            subject: raw.subject.unwrap_or_default(),
            sender: raw
                .from
                .and_then(|f| f.email_address)
                .and_then(|a| a.address),
            received_at: raw
                .received_date_time
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc)),
            has_attachments: raw.has_attachments,
            is_read: raw.is_read,
        }
    }
}

/// Parses a message-list response body.
pub(crate) fn parse_message_page(body: &[u8]) -> Result<MessagePage, serde_json::Error> {
    let raw: RawPage<RawMessage> = serde_json::from_slice(body)?;
    Ok(MessagePage {
        messages: raw.value.into_iter().map(EmailMessage::from).collect(),
        next_link: raw.next_link.filter(|l| !l.trim().is_empty()),
    })
}

pub(crate) fn parse_attachment_list(body: &[u8]) -> Result<Vec<AttachmentRef>, serde_json::Error> {
    let raw: RawPage<AttachmentRef> = serde_json::from_slice(body)?;
    Ok(raw.value)
}
