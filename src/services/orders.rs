use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        CartLine, Checkout, NewOrder, Order, OrderItem, OrderStatus, OrderWithItems,
        PaymentStatus, Size,
    },
    services::cart::CartService,
};

pub struct OrdersService {
    db: PgPool,
    cart: CartService,
}

impl OrdersService {
    pub fn new(db: PgPool) -> Self {
        Self {
            cart: CartService::new(db.clone()),
            db,
        }
    }

    /// Turns the user's cart into an order.
    ///
    /// Line prices are copied from the products as they are now; stock is
    /// taken from the matching variant (or the product when it has none) and
    /// the cart is emptied. Everything happens in one transaction.
    pub async fn place_order(&self, user_id: Uuid, checkout: &Checkout) -> AppResult<OrderWithItems> {
        let summary = self.cart.get_summary(user_id).await?;

        if summary.is_empty() {
            return Err(AppError::EmptyCart);
        }

        if let Some(line) = summary.lines.iter().find(|line| line.needs_size()) {
            return Err(AppError::Validation(line.product.size_prompt()));
        }

        if let Some(line) = summary.lines.iter().find(|line| line.is_over_stock()) {
            return Err(AppError::InsufficientStock {
                product: line.product.product.name.clone(),
                available: line.available_stock(),
            });
        }

        let mut new_order = NewOrder {
            user_id,
            order_number: None,
            payment_method: checkout.payment_method,
            total_amount: summary.total(),
            shipping: checkout.shipping.clone(),
        };

        let mut tx = self.db.begin().await?;

        let order = insert_order(&mut tx, &mut new_order).await?;

        let mut items = Vec::with_capacity(summary.lines.len());
        for line in &summary.lines {
            take_stock(&mut tx, line).await?;

            let item: OrderItem = sqlx::query_as(
                r#"
                INSERT INTO order_items (id, order_id, product_id, quantity, price, size)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order.id)
            .bind(line.item.product_id)
            .bind(line.item.quantity)
            .bind(line.product.product.price)
            .bind(&line.item.size)
            .fetch_one(&mut *tx)
            .await?;

            items.push(item);
        }

        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
            .bind(summary.cart.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(
            order_number = %order.order_number,
            total = %order.total_amount,
            payment = order.payment_method.label(),
            items = items.len(),
            "Order placed"
        );

        Ok(OrderWithItems { order, items })
    }

    /// Inserts an order without items, generating its number when absent.
    pub async fn create_order(&self, new_order: &mut NewOrder) -> AppResult<Order> {
        let mut tx = self.db.begin().await?;
        let order = insert_order(&mut tx, new_order).await?;
        tx.commit().await?;
        Ok(order)
    }

    /// Writes the order's mutable fields. The order number is never touched.
    pub async fn save_order(&self, order: &Order) -> AppResult<Order> {
        let saved: Option<Order> = sqlx::query_as(
            r#"
            UPDATE orders
            SET status = $1, payment_status = $2,
                shipping_name = $3, shipping_phone = $4, shipping_address = $5,
                shipping_city = $6, shipping_state = $7, shipping_pincode = $8,
                gateway_order_id = $9, gateway_payment_id = $10, gateway_signature = $11,
                updated_at = NOW()
            WHERE id = $12
            RETURNING *
            "#,
        )
        .bind(order.status)
        .bind(order.payment_status)
        .bind(&order.shipping_name)
        .bind(&order.shipping_phone)
        .bind(&order.shipping_address)
        .bind(&order.shipping_city)
        .bind(&order.shipping_state)
        .bind(&order.shipping_pincode)
        .bind(&order.gateway_order_id)
        .bind(&order.gateway_payment_id)
        .bind(&order.gateway_signature)
        .bind(order.id)
        .fetch_optional(&self.db)
        .await?;

        saved.ok_or(AppError::OrderNotFound)
    }

    // Payment gateway correlation

    pub async fn attach_gateway_order(&self, order_id: Uuid, gateway_order_id: &str) -> AppResult<Order> {
        let order: Option<Order> = sqlx::query_as(
            r#"
            UPDATE orders
            SET gateway_order_id = $1, payment_status = $2, updated_at = NOW()
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(gateway_order_id)
        .bind(PaymentStatus::Processing)
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?;

        order.ok_or(AppError::OrderNotFound)
    }

    /// Stores the ids the gateway returned for a successful payment. The
    /// signature is expected to have been checked by the caller.
    pub async fn record_payment(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
        gateway_signature: &str,
    ) -> AppResult<Order> {
        let order: Option<Order> = sqlx::query_as(
            r#"
            UPDATE orders
            SET gateway_payment_id = $1, gateway_signature = $2,
                payment_status = $3, status = $4, updated_at = NOW()
            WHERE gateway_order_id = $5
            RETURNING *
            "#,
        )
        .bind(gateway_payment_id)
        .bind(gateway_signature)
        .bind(PaymentStatus::Completed)
        .bind(OrderStatus::Processing)
        .bind(gateway_order_id)
        .fetch_optional(&self.db)
        .await?;

        let order = order.ok_or(AppError::OrderNotFound)?;
        tracing::info!(order_number = %order.order_number, "Payment recorded");
        Ok(order)
    }

    pub async fn mark_payment_failed(&self, gateway_order_id: &str) -> AppResult<Order> {
        let order: Option<Order> = sqlx::query_as(
            r#"
            UPDATE orders
            SET payment_status = $1, updated_at = NOW()
            WHERE gateway_order_id = $2
            RETURNING *
            "#,
        )
        .bind(PaymentStatus::Failed)
        .bind(gateway_order_id)
        .fetch_optional(&self.db)
        .await?;

        let order = order.ok_or(AppError::OrderNotFound)?;
        tracing::warn!(order_number = %order.order_number, "Payment failed");
        Ok(order)
    }

    pub async fn update_status(&self, order_id: Uuid, status: OrderStatus) -> AppResult<Order> {
        let order: Option<Order> = sqlx::query_as(
            "UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(status)
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?;

        order.ok_or(AppError::OrderNotFound)
    }

    // Queries

    pub async fn get_order(&self, user_id: Uuid, order_number: &str) -> AppResult<OrderWithItems> {
        let order: Option<Order> =
            sqlx::query_as("SELECT * FROM orders WHERE order_number = $1 AND user_id = $2")
                .bind(order_number)
                .bind(user_id)
                .fetch_optional(&self.db)
                .await?;

        let order = order.ok_or(AppError::OrderNotFound)?;

        let items: Vec<OrderItem> =
            sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id")
                .bind(order.id)
                .fetch_all(&self.db)
                .await?;

        Ok(OrderWithItems { order, items })
    }

    pub async fn list_orders(&self, user_id: Uuid) -> AppResult<Vec<Order>> {
        let orders: Vec<Order> =
            sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
                .bind(user_id)
                .fetch_all(&self.db)
                .await?;

        Ok(orders)
    }
}

async fn insert_order(tx: &mut Transaction<'_, Postgres>, new_order: &mut NewOrder) -> AppResult<Order> {
    let order_number = new_order.ensure_order_number().to_string();

    let order: Order = sqlx::query_as(
        r#"
        INSERT INTO orders
            (id, user_id, order_number, payment_method, status, total_amount,
             shipping_name, shipping_phone, shipping_address, shipping_city, shipping_state, shipping_pincode,
             payment_status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(new_order.user_id)
    .bind(&order_number)
    .bind(new_order.payment_method)
    .bind(OrderStatus::Pending)
    .bind(new_order.total_amount.round_dp(2))
    .bind(&new_order.shipping.name)
    .bind(&new_order.shipping.phone)
    .bind(&new_order.shipping.address)
    .bind(&new_order.shipping.city)
    .bind(&new_order.shipping.state)
    .bind(&new_order.shipping.pincode)
    .bind(PaymentStatus::Pending)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| AppError::on_unique_violation(e, || AppError::OrderNumberTaken(order_number.clone())))?;

    Ok(order)
}

/// Decrements the stock a cart line draws from, failing if it ran out since
/// the cart was loaded.
async fn take_stock(tx: &mut Transaction<'_, Postgres>, line: &CartLine) -> AppResult<()> {
    let quantity = line.item.quantity;

    let result = match line.item.size.as_deref() {
        Some(size) if line.product.has_size_variants() => {
            let size: Size = size.parse()?;
            sqlx::query(
                r#"
                UPDATE product_variants SET stock = stock - $1
                WHERE product_id = $2 AND size = $3 AND stock >= $1
                "#,
            )
            .bind(quantity)
            .bind(line.item.product_id)
            .bind(size)
            .execute(&mut **tx)
            .await?
        }
        _ => {
            sqlx::query(
                r#"
                UPDATE products SET stock = stock - $1, updated_at = NOW()
                WHERE id = $2 AND stock >= $1
                "#,
            )
            .bind(quantity)
            .bind(line.item.product_id)
            .execute(&mut **tx)
            .await?
        }
    };

    if result.rows_affected() == 0 {
        return Err(AppError::InsufficientStock {
            product: line.product.product.name.clone(),
            available: 0,
        });
    }

    Ok(())
}
