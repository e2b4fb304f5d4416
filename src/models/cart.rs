use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ProductDetail;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Cart {
    pub id: Uuid,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CartItem {
    pub id: Uuid,
    pub cart_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub size: Option<String>,
}

/// A cart item joined with the product it refers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub item: CartItem,
    pub product: ProductDetail,
}

impl CartLine {
    /// Priced at the product's current price.
    pub fn total(&self) -> Decimal {
        self.product.product.price * Decimal::from(self.item.quantity)
    }

    pub fn available_stock(&self) -> i64 {
        self.product.stock_for_size(self.item.size.as_deref())
    }

    /// The product has size variants but this line carries no size.
    pub fn needs_size(&self) -> bool {
        self.product.has_size_variants()
            && self.item.size.as_deref().map_or(true, |s| s.trim().is_empty())
    }

    pub fn is_over_stock(&self) -> bool {
        i64::from(self.item.quantity) > self.available_stock()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartSummary {
    pub cart: Cart,
    pub lines: Vec<CartLine>,
}

impl CartSummary {
    pub fn total(&self) -> Decimal {
        self.lines.iter().map(CartLine::total).sum()
    }

    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|line| i64::from(line.item.quantity)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::fixtures::{detail, product};
    use crate::models::Size;
    use rust_decimal_macros::dec;

    fn line(cart_id: Uuid, product: ProductDetail, quantity: i32, size: Option<&str>) -> CartLine {
        CartLine {
            item: CartItem {
                id: Uuid::new_v4(),
                cart_id,
                product_id: product.product.id,
                quantity,
                size: size.map(str::to_string),
            },
            product,
        }
    }

    fn summary(lines: Vec<CartLine>) -> CartSummary {
        let cart_id = lines.first().map(|l| l.item.cart_id).unwrap_or_else(Uuid::new_v4);
        CartSummary {
            cart: Cart {
                id: cart_id,
                user_id: Uuid::new_v4(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            lines,
        }
    }

    #[test]
    fn totals_sum_price_times_quantity() {
        let cart_id = Uuid::new_v4();
        let cart = summary(vec![
            line(cart_id, detail(product(dec!(799.50), 10), &[], &[]), 2, None),
            line(cart_id, detail(product(dec!(1299.00), 0), &[(Size::M, 3)], &[]), 1, Some("M")),
        ]);

        assert_eq!(cart.lines[0].total(), dec!(1599.00));
        assert_eq!(cart.total(), dec!(2898.00));
        assert_eq!(cart.item_count(), 3);
    }

    #[test]
    fn empty_cart_totals_are_zero() {
        let cart = summary(Vec::new());
        assert!(cart.is_empty());
        assert_eq!(cart.total(), Decimal::ZERO);
        assert_eq!(cart.item_count(), 0);
    }

    #[test]
    fn available_stock_follows_line_size() {
        let cart_id = Uuid::new_v4();
        let sized = detail(product(dec!(10.00), 0), &[(Size::S, 1), (Size::L, 6)], &[]);

        let l = line(cart_id, sized.clone(), 2, Some("S"));
        assert_eq!(l.available_stock(), 1);
        assert!(l.is_over_stock());

        let l = line(cart_id, sized, 2, Some("L"));
        assert_eq!(l.available_stock(), 6);
        assert!(!l.is_over_stock());
    }

    #[test]
    fn sizeless_line_on_sized_product_needs_size() {
        let cart_id = Uuid::new_v4();
        let sized = detail(product(dec!(10.00), 0), &[(Size::M, 5)], &[]);

        assert!(line(cart_id, sized.clone(), 1, None).needs_size());
        assert!(line(cart_id, sized.clone(), 1, Some("")).needs_size());
        assert!(!line(cart_id, sized, 1, Some("M")).needs_size());
        assert!(!line(cart_id, detail(product(dec!(10.00), 3), &[], &[]), 1, None).needs_size());
    }
}
