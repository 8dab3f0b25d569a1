use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{OrderError, OrderResult};
use crate::{OrderStatus, PaymentMethod};

pub const MAX_LINE_QUANTITY: i32 = 1000;
pub const MAX_NOTES_LEN: usize = 1000;
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub book_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub street: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub items: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: String,
    #[serde(default)]
    pub notes: Option<String>,
}

/// An `OrderRequest` that passed every check that does not need the database.
#[derive(Debug, Clone)]
pub struct ValidatedOrder {
    /// One line per book, ascending by book id.
    pub lines: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
    pub payment_method: PaymentMethod,
    pub notes: Option<String>,
}

impl ShippingAddress {
    pub fn validate(&self) -> OrderResult<()> {
        let fields = [
            ("street", &self.street),
            ("city", &self.city),
            ("state", &self.state),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(OrderError::Validation(format!(
                "Shipping address is missing: {}",
                missing.join(", ")
            )))
        }
    }

    fn trimmed(&self) -> Self {
        Self {
            street: self.street.trim().to_string(),
            city: self.city.trim().to_string(),
            state: self.state.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            country: self.country.trim().to_string(),
        }
    }
}

impl OrderRequest {
    pub fn validate(&self) -> OrderResult<ValidatedOrder> {
        if self.items.is_empty() {
            return Err(OrderError::Validation(
                "Order must contain at least one item".to_string(),
            ));
        }

        let mut merged: BTreeMap<i64, i32> = BTreeMap::new();
        for line in &self.items {
            if line.quantity < 1 || line.quantity > MAX_LINE_QUANTITY {
                return Err(OrderError::Validation(format!(
                    "Quantity for book {} must be between 1 and {}",
                    line.book_id, MAX_LINE_QUANTITY
                )));
            }
            let quantity = merged.entry(line.book_id).or_insert(0);
            *quantity += line.quantity;
            if *quantity > MAX_LINE_QUANTITY {
                return Err(OrderError::Validation(format!(
                    "Quantity for book {} must be between 1 and {}",
                    line.book_id, MAX_LINE_QUANTITY
                )));
            }
        }

        self.shipping_address.validate()?;

        let payment_method: PaymentMethod = self.payment_method.parse()?;

        let notes = match self.notes.as_deref().map(str::trim) {
            Some(notes) if notes.chars().count() > MAX_NOTES_LEN => {
                return Err(OrderError::Validation(format!(
                    "Notes cannot exceed {} characters",
                    MAX_NOTES_LEN
                )));
            }
            Some("") | None => None,
            Some(notes) => Some(notes.to_string()),
        };

        Ok(ValidatedOrder {
            lines: merged
                .into_iter()
                .map(|(book_id, quantity)| OrderLine { book_id, quantity })
                .collect(),
            shipping_address: self.shipping_address.trimmed(),
            payment_method,
            notes,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub page: u32,
    pub limit: u32,
}

impl Default for OrderFilter {
    fn default() -> Self {
        Self {
            status: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl OrderFilter {
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

impl TryFrom<ListOrdersQuery> for OrderFilter {
    type Error = OrderError;

    fn try_from(query: ListOrdersQuery) -> Result<Self, Self::Error> {
        let status = query
            .status
            .as_deref()
            .map(str::parse::<OrderStatus>)
            .transpose()?;
        let page = query.page.unwrap_or(1);
        if page < 1 {
            return Err(OrderError::Validation("page must be at least 1".to_string()));
        }
        let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        if !(1..=MAX_PAGE_SIZE).contains(&limit) {
            return Err(OrderError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        Ok(Self { status, page, limit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> ShippingAddress {
        ShippingAddress {
            street: "1 Main St".to_string(),
            city: "Springfield".to_string(),
            state: "IL".to_string(),
            postal_code: "62701".to_string(),
            country: "US".to_string(),
        }
    }

    fn request(items: Vec<OrderLine>) -> OrderRequest {
        OrderRequest {
            items,
            shipping_address: address(),
            payment_method: "card".to_string(),
            notes: None,
        }
    }

    #[test]
    fn rejects_empty_cart() {
        let err = request(vec![]).validate().unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }

    #[test]
    fn rejects_zero_and_oversized_quantities() {
        for quantity in [0, -3, MAX_LINE_QUANTITY + 1] {
            let err = request(vec![OrderLine { book_id: 1, quantity }])
                .validate()
                .unwrap_err();
            assert!(matches!(err, OrderError::Validation(_)), "quantity {}", quantity);
        }
    }

    #[test]
    fn merges_duplicate_books_in_id_order() {
        let validated = request(vec![
            OrderLine { book_id: 9, quantity: 1 },
            OrderLine { book_id: 2, quantity: 2 },
            OrderLine { book_id: 9, quantity: 3 },
        ])
        .validate()
        .unwrap();

        let lines: Vec<(i64, i32)> = validated
            .lines
            .iter()
            .map(|line| (line.book_id, line.quantity))
            .collect();
        assert_eq!(lines, vec![(2, 2), (9, 4)]);
    }

    #[test]
    fn names_every_blank_address_field() {
        let mut req = request(vec![OrderLine { book_id: 1, quantity: 1 }]);
        req.shipping_address.city = "  ".to_string();
        req.shipping_address.country = String::new();

        let err = req.validate().unwrap_err();
        assert_eq!(err.to_string(), "Shipping address is missing: city, country");
    }

    #[test]
    fn rejects_unknown_payment_method() {
        let mut req = request(vec![OrderLine { book_id: 1, quantity: 1 }]);
        req.payment_method = "bitcoin".to_string();

        assert!(matches!(req.validate(), Err(OrderError::Validation(_))));
    }

    #[test]
    fn blank_notes_are_dropped() {
        let mut req = request(vec![OrderLine { book_id: 1, quantity: 1 }]);
        req.notes = Some("   ".to_string());
        assert_eq!(req.validate().unwrap().notes, None);

        req.notes = Some(" leave at door ".to_string());
        assert_eq!(req.validate().unwrap().notes.as_deref(), Some("leave at door"));
    }

    #[test]
    fn filter_defaults_and_bounds() {
        let filter = OrderFilter::try_from(ListOrdersQuery::default()).unwrap();
        assert_eq!(filter, OrderFilter::default());
        assert_eq!(filter.offset(), 0);

        let filter = OrderFilter::try_from(ListOrdersQuery {
            status: Some("shipped".to_string()),
            page: Some(3),
            limit: Some(20),
        })
        .unwrap();
        assert_eq!(filter.status, Some(OrderStatus::Shipped));
        assert_eq!(filter.offset(), 40);

        let err = OrderFilter::try_from(ListOrdersQuery {
            limit: Some(MAX_PAGE_SIZE + 1),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, OrderError::Validation(_)));
    }
}
