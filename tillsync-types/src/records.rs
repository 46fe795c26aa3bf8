//! Point-of-sale records.
//!
//! Monetary amounts are integer cents. The records carry no behaviour beyond
//! the arithmetic needed to keep a sale's totals consistent with its lines.

use crate::{CustomerId, Error, ProductId, Result, SaleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A product in the store catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price_cents: i64,
    /// Units on hand. May go negative when offline sales oversell.
    pub stock: i64,
}

impl Product {
    /// Creates a product with a fresh id.
    pub fn new(sku: impl Into<String>, name: impl Into<String>, price_cents: i64, stock: i64) -> Self {
        Self {
            id: ProductId::new(),
            sku: sku.into(),
            name: name.into(),
            category: None,
            price_cents,
            stock,
        }
    }

    /// Sets the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

/// A customer record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub loyalty_points: u32,
}

impl Customer {
    /// Creates a customer with a fresh id and no contact details.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: CustomerId::new(),
            name: name.into(),
            email: None,
            phone: None,
            loyalty_points: 0,
        }
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the phone number.
    #[must_use]
    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// How a sale was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    Mobile,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cash => write!(f, "cash"),
            Self::Card => write!(f, "card"),
            Self::Mobile => write!(f, "mobile"),
        }
    }
}

/// One line of a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl LineItem {
    /// Creates a line for `quantity` units of `product` at its current price.
    pub fn for_product(product: &Product, quantity: u32) -> Self {
        Self {
            product_id: product.id,
            quantity,
            unit_price_cents: product.price_cents,
        }
    }

    /// Line total before tax, or `None` if it does not fit in an `i64`.
    #[must_use]
    pub fn total_cents(&self) -> Option<i64> {
        self.unit_price_cents.checked_mul(i64::from(self.quantity))
    }
}

/// A completed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sale {
    pub id: SaleId,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    pub items: Vec<LineItem>,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub completed_at: DateTime<Utc>,
}

impl Sale {
    /// Builds a sale from its lines, computing subtotal, tax and total.
    ///
    /// `tax_rate_bps` is the tax rate in basis points (825 = 8.25%); tax is
    /// rounded half up to the cent.
    pub fn from_items(
        items: Vec<LineItem>,
        tax_rate_bps: u32,
        payment_method: PaymentMethod,
        customer_id: Option<CustomerId>,
    ) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::InvalidSale("a sale needs at least one line".into()));
        }
        if let Some(line) = items.iter().find(|l| l.quantity == 0) {
            return Err(Error::InvalidSale(format!(
                "zero quantity for product {}",
                line.product_id
            )));
        }
        if let Some(line) = items.iter().find(|l| l.unit_price_cents < 0) {
            return Err(Error::InvalidSale(format!(
                "negative price for product {}",
                line.product_id
            )));
        }

        let overflow = || Error::InvalidSale("amount out of range".into());
        let subtotal_cents = items.iter().try_fold(0i64, |acc, line| {
            line.total_cents().and_then(|t| acc.checked_add(t))
        });
        let subtotal_cents = subtotal_cents.ok_or_else(overflow)?;
        let tax_cents = subtotal_cents
            .checked_mul(i64::from(tax_rate_bps))
            .and_then(|t| t.checked_add(5_000))
            .map(|t| t / 10_000)
            .ok_or_else(overflow)?;
        let total_cents = subtotal_cents.checked_add(tax_cents).ok_or_else(overflow)?;

        Ok(Self {
            id: SaleId::new(),
            customer_id,
            items,
            subtotal_cents,
            tax_cents,
            total_cents,
            payment_method,
            completed_at: Utc::now(),
        })
    }

    /// Total number of units sold across all lines.
    #[must_use]
    pub fn unit_count(&self) -> u64 {
        self.items.iter().map(|l| u64::from(l.quantity)).sum()
    }
}
