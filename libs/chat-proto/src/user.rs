use serde::{Deserialize, Serialize};

use crate::document::Document;

/// Profile document mirrored under `users/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "uid", default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl User {
    /// Decode a profile; the document id wins over any stored `uid`.
    pub fn from_document(document: &Document) -> Result<Self, serde_json::Error> {
        let mut user: User = document.decode()?;
        user.id = document.id.clone();
        Ok(user)
    }

    /// Roster label: the name, else the email local part, else the id.
    pub fn display_name(&self) -> &str {
        if let Some(name) = non_empty(&self.name) {
            return name;
        }
        non_empty(&self.email)
            .and_then(|email| email.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or(&self.id)
    }

    /// Chat header title: the name, else the full email, else the id.
    pub fn header_title(&self) -> &str {
        non_empty(&self.name)
            .or_else(|| non_empty(&self.email))
            .unwrap_or(&self.id)
    }

    pub fn avatar_initial(&self) -> Option<char> {
        non_empty(&self.name).and_then(|name| name.chars().next())
    }

    pub fn photo(&self) -> Option<&str> {
        non_empty(&self.photo_url)
    }
}
