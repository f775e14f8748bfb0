//! Shopping Cart
//!
//! Cart entries as the storefront posts them, plus the correlation metadata
//! that lets the webhook map a paid line item back to a catalog product.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use grimoire_core::ProductKind;

use crate::error::{PaymentError, Result};
use crate::provider::LineItemRequest;

/// Metadata keys attached to every provider-side product
pub mod metadata {
    pub const KIND: &str = "kind";
    pub const ITEM_ID: &str = "item_id";
    pub const SAGA_ID: &str = "saga_id";
}

/// A priced catalog item as sent by the storefront
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogItem {
    pub id: String,

    /// Price in major currency units
    pub price: Decimal,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub display_name: Option<String>,
}

/// Saga a scenario was picked from
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaRef {
    pub id: String,
    pub name: String,
}

/// One cart entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(rename = "type")]
    pub kind: ProductKind,

    pub item: CatalogItem,

    #[serde(default)]
    pub saga: Option<SagaRef>,
}

impl CartItem {
    /// Name shown on the checkout page (`displayName` wins over `name`)
    pub fn title(&self) -> Option<&str> {
        self.item
            .display_name
            .as_deref()
            .or(self.item.name.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Price in minor units, rounded half away from zero
    pub fn unit_amount_cents(&self) -> Result<i64> {
        (self.item.price * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or_else(|| {
                PaymentError::InvalidCart(format!("price of {} is out of range", self.item.id))
            })
    }

    /// Validate and convert into a provider line item
    pub fn to_line_item(&self) -> Result<LineItemRequest> {
        let id = self.item.id.trim();
        if id.is_empty() {
            return Err(PaymentError::InvalidCart("item without id".into()));
        }
        let name = self
            .title()
            .ok_or_else(|| PaymentError::InvalidCart(format!("item {id} has no name")))?;
        if self.item.price < Decimal::ZERO {
            return Err(PaymentError::InvalidCart(format!("item {id} has a negative price")));
        }
        if self.kind == ProductKind::Saga && self.saga.is_some() {
            return Err(PaymentError::InvalidCart(format!(
                "saga {id} cannot belong to another saga"
            )));
        }

        let mut meta = BTreeMap::new();
        meta.insert(metadata::KIND.to_string(), self.kind.as_str().to_string());
        meta.insert(metadata::ITEM_ID.to_string(), id.to_string());
        if let Some(saga) = &self.saga {
            meta.insert(metadata::SAGA_ID.to_string(), saga.id.clone());
        }

        Ok(LineItemRequest {
            name: name.to_string(),
            description: self.saga.as_ref().map(|s| format!("Saga: {}", s.name)),
            unit_amount_cents: self.unit_amount_cents()?,
            metadata: meta,
        })
    }
}

/// Checkout request body
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutCart {
    pub cart_items: Vec<CartItem>,

    #[serde(default)]
    pub customer_email: Option<String>,

    #[serde(default)]
    pub customer_name: Option<String>,
}

impl CheckoutCart {
    /// Validate every entry, preserving cart order
    pub fn line_items(&self) -> Result<Vec<LineItemRequest>> {
        if self.cart_items.is_empty() {
            return Err(PaymentError::InvalidCart("cart is empty".into()));
        }
        self.cart_items.iter().map(CartItem::to_line_item).collect()
    }
}

/// Map provider-side product metadata back to a catalog product
pub fn resolve_product(meta: &BTreeMap<String, String>) -> Option<(ProductKind, String)> {
    let kind = ProductKind::parse(meta.get(metadata::KIND)?)?;
    let id = meta.get(metadata::ITEM_ID)?.trim();
    if id.is_empty() {
        return None;
    }
    Some((kind, id.to_string()))
}
