//! Default storefront generated once, when a tenant is approved.
//!
//! The template is a pure function of the tenant's store name, team type, slug and
//! logo, so approving the same record twice would yield byte-identical websites.
//! Later edits belong to the website builder and never pass through here.

use crate::{entities::tenant, errors::Result};
use serde::{Deserialize, Serialize};

/// Logo width used by the default header, in pixels.
pub const DEFAULT_LOGO_WIDTH: u32 = 96;

/// Storefront structure stored in `tenants.website`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Website {
    /// Site header
    pub header: HeaderConfig,
    /// Pages in navigation order
    pub pages: Vec<Page>,
}

/// Site header configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderConfig {
    /// `centered`, `left-aligned`, or `minimal`
    pub layout: String,
    /// Navigation entries
    pub menu_items: Vec<MenuItem>,
    /// Logo width in pixels
    pub logo_width: u32,
    /// Logo URL, if the tenant supplied one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

/// Header navigation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    /// Stable id
    pub id: String,
    /// Display label
    pub label: String,
    /// Target link
    pub link: String,
}

/// One storefront page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Stable id
    pub id: String,
    /// Display name
    pub name: String,
    /// Route path
    pub path: String,
    /// Sections in render order
    pub sections: Vec<Section>,
}

/// One page section; `props` is interpreted by the renderer for `section_type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// Stable id
    pub id: String,
    /// Section kind, e.g. `Hero Section`
    #[serde(rename = "type")]
    pub section_type: String,
    /// Renderer properties
    pub props: serde_json::Value,
}

impl Website {
    /// Encodes the website for the `tenants.website` column.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Builds the default storefront for a tenant being approved.
#[must_use]
pub fn default_website(tenant: &tenant::Model) -> Website {
    let merchandise = if tenant.team_type.as_deref() == Some("hockey") {
        "hockey gear"
    } else {
        "merchandise"
    };

    let hero = Section {
        id: format!("hero-{}", tenant.slug),
        section_type: "Hero Section".to_string(),
        props: serde_json::json!({
            "title": format!("Welcome to {}", tenant.store_name),
            "text": format!("Discover our amazing {merchandise}."),
            "buttonText": "Shop Now",
            "buttonLink": "#products",
            "imageUrl": format!("https://picsum.photos/seed/{}/1200/800", tenant.slug),
            "imageHint": tenant
                .team_type
                .as_deref()
                .filter(|t| !t.is_empty())
                .unwrap_or("team merchandise"),
            "layout": "center-right",
            "imageWidth": 80,
            "imageHeight": 60,
        }),
    };

    Website {
        header: HeaderConfig {
            layout: "centered".to_string(),
            menu_items: Vec::new(),
            logo_width: DEFAULT_LOGO_WIDTH,
            logo_url: tenant.logo_url.clone(),
        },
        pages: vec![Page {
            id: "home".to_string(),
            name: "Home".to_string(),
            path: "/".to_string(),
            sections: vec![hero],
        }],
    }
}
