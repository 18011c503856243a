//! Organization (tenant) model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Organization entity — the unit of data isolation. Every chat, message,
/// API key and export job belongs to exactly one organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Organization {
    pub id: Uuid,
    pub name: String,
    /// URL-safe unique identifier; immutable once API keys reference it
    pub slug: String,
    /// Opaque per-tenant settings blob
    #[serde(default)]
    pub settings: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: String, slug: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            slug,
            settings: serde_json::json!({}),
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_organization_new() {
        let org = Organization::new("Acme".to_string(), "acme".to_string());
        assert_eq!(org.slug, "acme");
        assert!(!org.id.is_nil());
        assert_eq!(org.settings, serde_json::json!({}));
    }
}
