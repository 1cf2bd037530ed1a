//! Lookups that fill selection lists (accounts, inboxes, contacts, ...).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::NodeError;
use crate::operations::list_items;
use crate::transport::{account_path, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListSearch {
    Accounts,
    Inboxes,
    Agents,
    Teams,
    Labels,
    Contacts,
    Conversations,
    KanbanBoards,
    CustomAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchItem {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub results: Vec<SearchItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination_token: Option<String>,
}

impl ListSearch {
    pub fn parse(name: &str) -> Result<Self> {
        serde_json::from_value(Value::String(name.to_string())).map_err(|_| {
            NodeError::configuration(format!("Unknown list search '{}'", name)).into()
        })
    }

    fn is_paginated(self) -> bool {
        matches!(self, ListSearch::Contacts | ListSearch::Conversations)
    }

    /// Fetches one page and maps it to `{name, value}` pairs.
    ///
    /// Contacts are searched server-side; every other list is filtered here
    /// by case-insensitive substring on the display name.
    pub async fn search(
        self,
        transport: &dyn Transport,
        account_id: Option<u64>,
        filter: Option<&str>,
        pagination_token: Option<&str>,
    ) -> Result<SearchResult> {
        let filter = filter.map(str::trim).filter(|f| !f.is_empty());
        let page: u64 = match pagination_token {
            Some(token) if self.is_paginated() => token.parse().map_err(|_| {
                NodeError::configuration(format!("Invalid pagination token '{}'", token))
            })?,
            _ => 1,
        };

        let response = if self == ListSearch::Accounts {
            let mut profile = transport
                .get("/api/v1/profile", &[])
                .await
                .context("Failed to fetch profile")?;
            profile
                .get_mut("accounts")
                .map(Value::take)
                .unwrap_or(Value::Null)
        } else {
            let account_id = account_id
                .ok_or_else(|| NodeError::configuration("An account ID is required for this list"))?
                .to_string();
            let (suffix, query) = self.request(filter, page);
            transport
                .get(&account_path(&account_id, suffix), &query)
                .await
                .with_context(|| format!("Failed to search {:?}", self))?
        };

        let items = list_items(response);
        let next_page = (self.is_paginated() && !items.is_empty()).then(|| (page + 1).to_string());

        let mut results: Vec<SearchItem> = items.iter().filter_map(|item| self.to_item(item)).collect();
        if let Some(filter) = filter.filter(|_| self != ListSearch::Contacts) {
            let needle = filter.to_lowercase();
            results.retain(|item| item.name.to_lowercase().contains(&needle));
        }

        Ok(SearchResult {
            results,
            pagination_token: next_page,
        })
    }

    fn request(self, filter: Option<&str>, page: u64) -> (&'static str, Vec<(String, String)>) {
        let page = ("page".to_string(), page.to_string());
        match self {
            ListSearch::Contacts => match filter {
                Some(filter) => ("contacts/search", vec![("q".to_string(), filter.to_string()), page]),
                None => ("contacts", vec![page]),
            },
            ListSearch::Conversations => ("conversations", vec![page]),
            ListSearch::Inboxes => ("inboxes", Vec::new()),
            ListSearch::Agents => ("agents", Vec::new()),
            ListSearch::Teams => ("teams", Vec::new()),
            ListSearch::Labels => ("labels", Vec::new()),
            ListSearch::KanbanBoards => ("kanban_boards", Vec::new()),
            ListSearch::CustomAttributes => ("custom_attribute_definitions", Vec::new()),
            ListSearch::Accounts => ("", Vec::new()),
        }
    }

    fn to_item(self, item: &Value) -> Option<SearchItem> {
        let id = id_string(item.get("id")?);
        let text = |key: &str| item.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());

        let (name, value) = match self {
            ListSearch::Labels => {
                let title = text("title")?.to_string();
                (title.clone(), title)
            }
            ListSearch::CustomAttributes => (
                text("attribute_display_name")
                    .or_else(|| text("attribute_key"))?
                    .to_string(),
                text("attribute_key")?.to_string(),
            ),
            ListSearch::Contacts => {
                let name = text("name")
                    .or_else(|| text("email"))
                    .or_else(|| text("phone_number"))
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Contact #{}", id));
                (name, id)
            }
            ListSearch::Conversations => {
                let sender = item
                    .pointer("/meta/sender/name")
                    .and_then(Value::as_str)
                    .unwrap_or("Unknown");
                (format!("#{} - {}", id, sender), id)
            }
            ListSearch::Agents => {
                let name = text("available_name").or_else(|| text("name"))?;
                match text("email") {
                    Some(email) => (format!("{} ({})", name, email), id),
                    None => (name.to_string(), id),
                }
            }
            ListSearch::Accounts
            | ListSearch::Inboxes
            | ListSearch::Teams
            | ListSearch::KanbanBoards => (text("name")?.to_string(), id),
        };
        Some(SearchItem { name, value })
    }
}

fn id_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;
    use crate::transport::Method;
    use serde_json::json;

    #[test]
    fn test_parse_names() {
        assert_eq!(ListSearch::parse("kanbanBoards").unwrap(), ListSearch::KanbanBoards);
        assert!(ListSearch::parse("planets").is_err());
    }

    #[tokio::test]
    async fn test_accounts_from_profile() {
        let transport = FakeTransport::new();
        transport.on(
            Method::GET,
            "/api/v1/profile",
            json!({"id": 9, "accounts": [{"id": 1, "name": "Acme"}, {"id": 2, "name": "Globex"}]}),
        );

        let result = ListSearch::Accounts
            .search(&transport, None, Some("glo"), None)
            .await
            .unwrap();

        assert_eq!(
            result.results,
            vec![SearchItem {
                name: "Globex".to_string(),
                value: "2".to_string()
            }]
        );
        assert!(result.pagination_token.is_none());
    }

    #[tokio::test]
    async fn test_labels_use_title_as_value() {
        let transport = FakeTransport::new();
        transport.on(
            Method::GET,
            "/api/v1/accounts/1/labels",
            json!({"payload": [{"id": 1, "title": "VIP"}, {"id": 2, "title": "billing"}]}),
        );

        let result = ListSearch::Labels
            .search(&transport, Some(1), Some("vi"), None)
            .await
            .unwrap();

        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0].value, "VIP");
    }

    #[tokio::test]
    async fn test_contacts_search_server_side_with_token() {
        let transport = FakeTransport::new();
        transport.on(
            Method::GET,
            "/api/v1/accounts/1/contacts/search",
            json!({"payload": [{"id": 5, "name": "Jo", "email": "jo@example.com"}]}),
        );

        let result = ListSearch::Contacts
            .search(&transport, Some(1), Some("example"), Some("2"))
            .await
            .unwrap();

        // Server matched on email; no client-side filtering on the name.
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.pagination_token.as_deref(), Some("3"));
        let call = &transport.calls()[0];
        assert_eq!(call.query_value("q"), Some("example"));
        assert_eq!(call.query_value("page"), Some("2"));
    }

    #[tokio::test]
    async fn test_empty_page_has_no_token() {
        let transport = FakeTransport::new();
        transport.on(
            Method::GET,
            "/api/v1/accounts/1/conversations",
            json!({"data": {"meta": {}, "payload": []}}),
        );

        let result = ListSearch::Conversations
            .search(&transport, Some(1), None, Some("4"))
            .await
            .unwrap();

        assert!(result.results.is_empty());
        assert!(result.pagination_token.is_none());
    }

    #[tokio::test]
    async fn test_custom_attributes_value_is_key() {
        let transport = FakeTransport::new();
        transport.on(
            Method::GET,
            "/api/v1/accounts/1/custom_attribute_definitions",
            json!([{"id": 3, "attribute_display_name": "Plan", "attribute_key": "plan"}]),
        );

        let result = ListSearch::CustomAttributes
            .search(&transport, Some(1), None, None)
            .await
            .unwrap();
        assert_eq!(
            result.results,
            vec![SearchItem {
                name: "Plan".to_string(),
                value: "plan".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_requires_account_id() {
        let transport = FakeTransport::new();
        assert!(ListSearch::Teams.search(&transport, None, None, None).await.is_err());
        assert!(transport.calls().is_empty());
    }
}
