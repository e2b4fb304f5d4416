use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const ORDER_NUMBER_LEN: usize = 10;
const ORDER_NUMBER_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Online,
    Cod,
}

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Online => "Online Payment",
            PaymentMethod::Cod => "Cash on Delivery",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_number: String,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub total_amount: Decimal,

    pub shipping_name: String,
    pub shipping_phone: String,
    pub shipping_address: String,
    pub shipping_city: String,
    pub shipping_state: String,
    pub shipping_pincode: String,

    // Payment gateway correlation ids, stored as given
    pub gateway_order_id: Option<String>,
    pub gateway_payment_id: Option<String>,
    pub gateway_signature: Option<String>,
    pub payment_status: PaymentStatus,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

/// An order that has not been written yet.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: Uuid,
    pub order_number: Option<String>,
    pub payment_method: PaymentMethod,
    pub total_amount: Decimal,
    pub shipping: ShippingAddress,
}

impl NewOrder {
    /// Assigns a generated order number unless a non-empty one is set.
    pub fn ensure_order_number(&mut self) -> &str {
        if self.order_number.as_deref().map_or(true, str::is_empty) {
            self.order_number = Some(generate_order_number());
        }
        self.order_number.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    /// Unit price when the order was placed.
    pub price: Decimal,
    pub size: Option<String>,
}

impl OrderItem {
    pub fn total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Checkout {
    pub payment_method: PaymentMethod,
    pub shipping: ShippingAddress,
}

pub fn generate_order_number() -> String {
    let mut rng = rand::thread_rng();
    (0..ORDER_NUMBER_LEN)
        .map(|_| ORDER_NUMBER_CHARSET[rng.gen_range(0..ORDER_NUMBER_CHARSET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn new_order(order_number: Option<&str>) -> NewOrder {
        NewOrder {
            user_id: Uuid::new_v4(),
            order_number: order_number.map(str::to_string),
            payment_method: PaymentMethod::Cod,
            total_amount: dec!(1500.00),
            shipping: ShippingAddress {
                name: "Ravi Kumar".to_string(),
                phone: "9876543210".to_string(),
                address: "12 MG Road".to_string(),
                city: "Bengaluru".to_string(),
                state: "Karnataka".to_string(),
                pincode: "560001".to_string(),
            },
        }
    }

    #[test]
    fn generated_numbers_are_uppercase_alphanumeric() {
        for _ in 0..50 {
            let number = generate_order_number();
            assert_eq!(number.len(), ORDER_NUMBER_LEN);
            assert!(number
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn order_number_is_assigned_once() {
        let mut order = new_order(None);
        let first = order.ensure_order_number().to_string();
        let second = order.ensure_order_number().to_string();

        assert_eq!(first.len(), ORDER_NUMBER_LEN);
        assert_eq!(first, second);
    }

    #[test]
    fn existing_order_number_is_kept() {
        let mut order = new_order(Some("MANUAL0001"));
        assert_eq!(order.ensure_order_number(), "MANUAL0001");
    }

    #[test]
    fn blank_order_number_is_replaced() {
        let mut order = new_order(Some(""));
        let number = order.ensure_order_number().to_string();

        assert_eq!(number.len(), ORDER_NUMBER_LEN);
        assert_eq!(order.order_number.as_deref(), Some(number.as_str()));
    }

    #[test]
    fn item_total_uses_captured_price() {
        let item = OrderItem {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            quantity: 3,
            price: dec!(249.99),
            size: Some("M".to_string()),
        };
        assert_eq!(item.total(), dec!(749.97));
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&PaymentMethod::Cod).unwrap(), "\"cod\"");
        assert_eq!(serde_json::to_string(&OrderStatus::Shipped).unwrap(), "\"shipped\"");
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
        assert_eq!(PaymentMethod::Online.label(), "Online Payment");
    }
}
