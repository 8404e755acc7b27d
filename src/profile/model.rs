//! Sender profile data model.

use serde::{Deserialize, Deserializer, Serialize};

use crate::workflow::state::{EmailDraft, Tone};

/// A previously sent (or saved) email, kept as style reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentExample {
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

impl From<EmailDraft> for SentExample {
    fn from(draft: EmailDraft) -> Self {
        Self {
            subject: draft.subject,
            body: draft.body,
        }
    }
}

/// Who the email is from, and how they like to write.
///
/// Every field is optional on disk; a missing profile is the empty profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderProfile {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub company: String,
    #[serde(default)]
    pub signature: String,
    #[serde(
        default,
        deserialize_with = "lenient_tone",
        skip_serializing_if = "Option::is_none"
    )]
    pub preferred_tone: Option<Tone>,
    #[serde(default)]
    pub sent_examples: Vec<SentExample>,
}

impl SenderProfile {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Signature block to append to drafts: the stored signature, or
    /// `Best,` plus name (and company) when only a name is known.
    pub fn signature_block(&self) -> Option<String> {
        let signature = self.signature.trim();
        if !signature.is_empty() {
            return Some(signature.to_string());
        }
        let name = self.name.trim();
        if name.is_empty() {
            return None;
        }
        let mut block = format!("Best,\n{name}");
        let company = self.company.trim();
        if !company.is_empty() {
            block.push('\n');
            block.push_str(company);
        }
        Some(block)
    }

    /// Most recent `n` sent examples, newest last.
    pub fn recent_examples(&self, n: usize) -> &[SentExample] {
        let start = self.sent_examples.len().saturating_sub(n);
        &self.sent_examples[start..]
    }

    /// Render the sender for prompt injection.
    pub fn to_prompt_section(&self) -> String {
        let mut parts = Vec::new();
        if !self.name.trim().is_empty() {
            parts.push(format!("- Sender name: {}", self.name.trim()));
        }
        if !self.company.trim().is_empty() {
            parts.push(format!("- Company: {}", self.company.trim()));
        }
        parts.join("\n")
    }
}

/// Unknown or malformed stored tones become `None` instead of failing the load.
fn lenient_tone<'de, D>(deserializer: D) -> Result<Option<Tone>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}
