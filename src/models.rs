use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title used for short links when neither the caller nor the checkout link
/// provides one.
pub const DEFAULT_LINK_TITLE: &str = "Polar Checkout";

#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A checkout link as listed by Polar. Read-only from our side.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct CheckoutLink {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product: Option<Product>,
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "modified_at", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CheckoutLink {
    /// Title for a short link pointing at this checkout: the label, else the
    /// product name, else [`DEFAULT_LINK_TITLE`].
    pub fn title(&self) -> &str {
        self.label
            .as_deref()
            .filter(|l| !l.is_empty())
            .or_else(|| {
                self.product
                    .as_ref()
                    .map(|p| p.name.as_str())
                    .filter(|n| !n.is_empty())
            })
            .unwrap_or(DEFAULT_LINK_TITLE)
    }
}

/// View entry: a checkout link with the short URL overlaid at merge time.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq, Debug)]
pub struct CheckoutLinkWithShortUrl {
    #[serde(flatten)]
    pub link: CheckoutLink,
    #[serde(rename = "shortUrl", default, skip_serializing_if = "Option::is_none")]
    pub short_url: Option<String>,
}

impl From<CheckoutLink> for CheckoutLinkWithShortUrl {
    fn from(link: CheckoutLink) -> Self {
        Self {
            link,
            short_url: None,
        }
    }
}

impl From<&CheckoutLink> for CheckoutLinkWithShortUrl {
    fn from(link: &CheckoutLink) -> Self {
        link.clone().into()
    }
}

#[cfg(test)]
pub mod fixtures {
    use super::*;

    pub fn checkout_link(id: &str, url: &str) -> CheckoutLink {
        CheckoutLink {
            id: id.to_string(),
            url: url.to_string(),
            label: None,
            product: None,
            created_at: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            updated_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_polar_item() {
        let link: CheckoutLink = serde_json::from_value(json!({
            "id": "cl_1",
            "url": "https://buy.polar.sh/polar_cl_1",
            "label": null,
            "product": {"id": "p_1", "name": "Pro", "description": null},
            "created_at": "2024-05-01T10:00:00.123456Z",
            "modified_at": "2024-05-02T10:00:00Z",
            "success_url": null,
        }))
        .unwrap();

        assert_eq!(link.id, "cl_1");
        assert!(link.label.is_none());
        assert_eq!(link.product.as_ref().unwrap().name, "Pro");
        assert!(link.updated_at.is_some());
    }

    #[test]
    fn test_title_fallbacks() {
        let mut link = fixtures::checkout_link("a", "https://x");
        assert_eq!(link.title(), DEFAULT_LINK_TITLE);

        link.product = Some(Product {
            id: "p".to_string(),
            name: "Pro".to_string(),
            description: None,
        });
        assert_eq!(link.title(), "Pro");

        link.label = Some("Launch offer".to_string());
        assert_eq!(link.title(), "Launch offer");

        link.label = Some(String::new());
        assert_eq!(link.title(), "Pro");
    }

    #[test]
    fn test_view_entry_serializes_flat() {
        let entry = CheckoutLinkWithShortUrl {
            link: fixtures::checkout_link("a", "https://x"),
            short_url: Some("https://dub.sh/abc".to_string()),
        };

        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value["id"], "a");
        assert_eq!(value["shortUrl"], "https://dub.sh/abc");
    }
}
