use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Cart, CartItem, CartLine, CartSummary, Product, ProductImage, ProductVariant, Size},
    services::catalog::{assemble_details, CatalogService},
};

pub struct CartService {
    db: PgPool,
    catalog: CatalogService,
}

impl CartService {
    pub fn new(db: PgPool) -> Self {
        Self {
            catalog: CatalogService::new(db.clone()),
            db,
        }
    }

    pub async fn get_or_create_cart(&self, user_id: Uuid) -> AppResult<Cart> {
        sqlx::query(
            r#"
            INSERT INTO carts (id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .execute(&self.db)
        .await?;

        let cart: Cart = sqlx::query_as("SELECT * FROM carts WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        Ok(cart)
    }

    /// The user's cart with every line joined to its product, oldest line first.
    pub async fn get_summary(&self, user_id: Uuid) -> AppResult<CartSummary> {
        let cart = self.get_or_create_cart(user_id).await?;

        let items: Vec<CartItem> = sqlx::query_as(
            "SELECT * FROM cart_items WHERE cart_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(cart.id)
        .fetch_all(&self.db)
        .await?;

        let product_ids: Vec<Uuid> = items.iter().map(|item| item.product_id).collect();

        let products: Vec<Product> = sqlx::query_as("SELECT * FROM products WHERE id = ANY($1)")
            .bind(&product_ids)
            .fetch_all(&self.db)
            .await?;

        let variants: Vec<ProductVariant> = sqlx::query_as(
            "SELECT * FROM product_variants WHERE product_id = ANY($1) ORDER BY product_id, size",
        )
        .bind(&product_ids)
        .fetch_all(&self.db)
        .await?;

        let images: Vec<ProductImage> = sqlx::query_as(
            "SELECT * FROM product_images WHERE product_id = ANY($1) ORDER BY created_at ASC, id ASC",
        )
        .bind(&product_ids)
        .fetch_all(&self.db)
        .await?;

        let details = assemble_details(products, variants, images);

        let lines = items
            .into_iter()
            .filter_map(|item| {
                let product = details
                    .iter()
                    .find(|d| d.product.id == item.product_id)?
                    .clone();
                Some(CartLine { item, product })
            })
            .collect();

        Ok(CartSummary { cart, lines })
    }

    /// Adds `quantity` of a product, merging with an existing line of the same
    /// product and size.
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        size: Option<&str>,
        quantity: i32,
    ) -> AppResult<CartItem> {
        if quantity < 1 {
            return Err(AppError::Validation("Quantity must be at least 1".to_string()));
        }

        let product = self.catalog.get_product(product_id).await?;
        if !product.product.is_available {
            return Err(AppError::ProductNotFound);
        }

        let size = match size.map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.parse::<Size>()?),
            None => None,
        };
        if product.has_size_variants() && size.is_none() {
            return Err(AppError::Validation(product.size_prompt()));
        }
        let size = size.map(|s| s.to_string());

        let cart = self.get_or_create_cart(user_id).await?;

        let existing: Option<CartItem> = sqlx::query_as(
            r#"
            SELECT * FROM cart_items
            WHERE cart_id = $1 AND product_id = $2 AND size IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(cart.id)
        .bind(product_id)
        .bind(&size)
        .fetch_optional(&self.db)
        .await?;

        let wanted = existing.as_ref().map_or(0, |item| item.quantity) + quantity;
        let available = product.stock_for_size(size.as_deref());
        if i64::from(wanted) > available {
            return Err(AppError::InsufficientStock {
                product: product.product.name,
                available,
            });
        }

        let item: CartItem = match existing {
            Some(item) => {
                sqlx::query_as("UPDATE cart_items SET quantity = $1 WHERE id = $2 RETURNING *")
                    .bind(wanted)
                    .bind(item.id)
                    .fetch_one(&self.db)
                    .await?
            }
            None => {
                sqlx::query_as(
                    r#"
                    INSERT INTO cart_items (id, cart_id, product_id, quantity, size)
                    VALUES ($1, $2, $3, $4, $5)
                    RETURNING *
                    "#,
                )
                .bind(Uuid::new_v4())
                .bind(cart.id)
                .bind(product_id)
                .bind(wanted)
                .bind(&size)
                .fetch_one(&self.db)
                .await?
            }
        };

        self.touch(cart.id).await?;
        Ok(item)
    }

    /// Sets a line's quantity; zero or less removes the line.
    pub async fn update_quantity(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        quantity: i32,
    ) -> AppResult<Option<CartItem>> {
        if quantity <= 0 {
            self.remove_item(user_id, item_id).await?;
            return Ok(None);
        }

        let item = self.get_item(user_id, item_id).await?;
        let product = self.catalog.get_product(item.product_id).await?;
        let available = product.stock_for_size(item.size.as_deref());

        if i64::from(quantity) > available {
            return Err(AppError::InsufficientStock {
                product: product.product.name,
                available,
            });
        }

        let item: CartItem =
            sqlx::query_as("UPDATE cart_items SET quantity = $1 WHERE id = $2 RETURNING *")
                .bind(quantity)
                .bind(item.id)
                .fetch_one(&self.db)
                .await?;

        self.touch(item.cart_id).await?;
        Ok(Some(item))
    }

    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM cart_items ci
            USING carts c
            WHERE ci.cart_id = c.id AND c.user_id = $1 AND ci.id = $2
            "#,
        )
        .bind(user_id)
        .bind(item_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::CartItemNotFound);
        }

        Ok(())
    }

    pub async fn clear(&self, user_id: Uuid) -> AppResult<()> {
        sqlx::query(
            "DELETE FROM cart_items WHERE cart_id IN (SELECT id FROM carts WHERE user_id = $1)",
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    // Helper methods

    async fn get_item(&self, user_id: Uuid, item_id: Uuid) -> AppResult<CartItem> {
        let item: Option<CartItem> = sqlx::query_as(
            r#"
            SELECT ci.* FROM cart_items ci
            JOIN carts c ON c.id = ci.cart_id
            WHERE c.user_id = $1 AND ci.id = $2
            "#,
        )
        .bind(user_id)
        .bind(item_id)
        .fetch_optional(&self.db)
        .await?;

        item.ok_or(AppError::CartItemNotFound)
    }

    async fn touch(&self, cart_id: Uuid) -> AppResult<()> {
        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart_id)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
