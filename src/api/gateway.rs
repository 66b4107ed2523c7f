//! Request/response envelopes exchanged with the browser extension

use serde::{Deserialize, Serialize};

/// Buffered-mode request body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub input: Option<String>,
    #[serde(default)]
    pub instruction: Option<String>,
    /// Backend selector: "openai" or "xai"
    #[serde(default)]
    pub api: Option<String>,
}

/// Buffered-mode success body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentResponse {
    pub output_text: String,
}

/// Buffered-mode error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Streaming-mode error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailBody {
    pub detail: String,
}

/// Streaming-mode request body
///
/// Either a free-form `request` (with optional `instructions`) or an `item`
/// from which the prompt is built server-side.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamRequest {
    #[serde(default)]
    pub request: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub api: Option<String>,
    #[serde(default)]
    pub item: Option<WorkItem>,
}

/// Structured description of the thing being commented on
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub sale_price: Option<Price>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// A price as sent by the client: either a number or an already formatted label
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Price {
    Amount(f64),
    Label(String),
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Price::Amount(amount) => write!(f, "{}", amount),
            Price::Label(label) => write!(f, "{}", label.trim()),
        }
    }
}

impl WorkItem {
    /// Render the item as the prompt text sent to the provider
    pub fn to_prompt(&self) -> String {
        let mut lines = vec![format!("Title: {}", self.name.trim())];

        if let Some(ref price) = self.price {
            lines.push(format!("Price: {}", price));
        }
        if let Some(ref sale_price) = self.sale_price {
            lines.push(format!("Sale price: {}", sale_price));
        }

        let genres: Vec<&str> = self
            .genres
            .iter()
            .map(|g| g.trim())
            .filter(|g| !g.is_empty())
            .collect();
        if !genres.is_empty() {
            lines.push(format!("Genres: {}", genres.join(", ")));
        }

        let description = self.description.trim();
        if !description.is_empty() {
            lines.push(format!("Description: {}", description));
        }

        lines.join("\n")
    }
}
