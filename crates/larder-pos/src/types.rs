//! Wire types for the upstream POS API, validated at the decode boundary.
//!
//! Field names follow the upstream camelCase JSON. Anything the upstream is
//! sloppy about (bare-string order references, order numbers that arrive as
//! numbers, selections nested under checks) is normalized here so the rest
//! of the system sees one shape.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub client_id: String,
    pub client_secret: String,
    pub user_access_type: &'static str,
}

impl LoginRequest {
    pub fn machine_client(client_id: &str, client_secret: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            user_access_type: "MACHINE_CLIENT",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginResponse {
    pub token: Option<TokenEnvelope>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenEnvelope {
    pub access_token: Option<String>,
    pub expires_in: Option<i64>,
}

/// A successfully issued bearer token.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: Option<i64>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"<REDACTED>")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Order references
// ---------------------------------------------------------------------------

/// A reference to one order inside a listing window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRef {
    pub guid: String,
}

/// The listing endpoint returns either a bare array or `{"orders": [...]}`,
/// and entries are either `{"guid": ...}` objects or bare guid strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OrdersResponse {
    Wrapped { orders: Vec<OrderRefWire> },
    Bare(Vec<OrderRefWire>),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum OrderRefWire {
    Object { guid: String },
    Guid(String),
}

impl OrdersResponse {
    pub(crate) fn into_refs(self) -> Vec<OrderRef> {
        let wires = match self {
            OrdersResponse::Wrapped { orders } => orders,
            OrdersResponse::Bare(orders) => orders,
        };
        wires
            .into_iter()
            .map(|w| match w {
                OrderRefWire::Object { guid } => OrderRef { guid },
                OrderRefWire::Guid(guid) => OrderRef { guid },
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Order detail
// ---------------------------------------------------------------------------

/// One full order body.
///
/// `raw` carries the undecoded payload so the store can persist it verbatim.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    #[serde(default)]
    pub guid: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub order_number: Option<String>,
    #[serde(default)]
    pub opened_date: Option<String>,
    #[serde(default)]
    pub closed_date: Option<String>,
    #[serde(default)]
    pub modified_date: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub total_amount: Option<f64>,
    #[serde(default)]
    pub tax_amount: Option<f64>,
    #[serde(default)]
    pub tip_amount: Option<f64>,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub selections: Vec<Selection>,
    #[serde(default)]
    pub checks: Vec<Check>,
    #[serde(skip)]
    pub raw: Value,
}

impl OrderDetail {
    /// Every sold line on this order: the top-level selections when present,
    /// otherwise the selections nested under each check.
    pub fn all_selections(&self) -> Vec<&Selection> {
        if !self.selections.is_empty() {
            return self.selections.iter().collect();
        }
        self.checks
            .iter()
            .flat_map(|c| c.selections.iter())
            .collect()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Check {
    #[serde(default)]
    pub selections: Vec<Selection>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    #[serde(default)]
    pub item: Option<ItemRef>,
    #[serde(default = "default_quantity")]
    pub quantity: f64,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub total_price: Option<f64>,
    #[serde(default)]
    pub modifiers: Value,
}

fn default_quantity() -> f64 {
    1.0
}

impl Selection {
    pub fn item_guid(&self) -> Option<&str> {
        self.item.as_ref().map(|i| i.guid.as_str())
    }

    pub fn item_name(&self) -> Option<&str> {
        self.item.as_ref().and_then(|i| i.name.as_deref())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemRef {
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// Accept a JSON string or number and normalize to `Option<String>`.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<Value>::deserialize(deserializer)?;
    Ok(match v {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Menu catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuDocument {
    #[serde(default)]
    pub menus: Vec<Menu>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Menu {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "menuGroups")]
    pub groups: Vec<MenuGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuGroup {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "menuItems")]
    pub items: Vec<MenuEntry>,
    #[serde(default, rename = "menuGroups")]
    pub groups: Vec<MenuGroup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuEntry {
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// One sellable item flattened out of the catalog tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub menu: Option<String>,
    pub group_path: String,
    pub guid: String,
    pub name: String,
}

impl MenuDocument {
    /// Flatten the menu → group → item tree into rows for the local mirror.
    /// Items without a guid are dropped; nested groups join their names with
    /// `" / "`.
    pub fn flatten(&self) -> Vec<CatalogItem> {
        let mut out = Vec::new();
        for menu in &self.menus {
            for group in &menu.groups {
                flatten_group(menu.name.as_deref(), "", group, &mut out);
            }
        }
        out
    }
}

fn flatten_group(menu: Option<&str>, prefix: &str, group: &MenuGroup, out: &mut Vec<CatalogItem>) {
    let group_name = group.name.as_deref().unwrap_or("");
    let path = if prefix.is_empty() {
        group_name.to_string()
    } else if group_name.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix} / {group_name}")
    };

    for item in &group.items {
        if item.guid.is_empty() {
            continue;
        }
        out.push(CatalogItem {
            menu: menu.map(|s| s.to_string()),
            group_path: path.clone(),
            guid: item.guid.clone(),
            name: item.name.clone().unwrap_or_else(|| "Unknown".to_string()),
        });
    }
    for nested in &group.groups {
        flatten_group(menu, &path, nested, out);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
