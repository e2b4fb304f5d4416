use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        cap_slug, slugify, Category, NewCategory, NewProduct, Product, ProductDetail, ProductImage,
        ProductVariant, Size,
    },
};

pub struct CatalogService {
    db: PgPool,
}

impl CatalogService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // Categories

    pub async fn create_category(&self, new_category: &NewCategory) -> AppResult<Category> {
        let slug = resolve_slug(new_category.slug.as_deref(), &new_category.name)?;

        let category: Category = sqlx::query_as(
            r#"
            INSERT INTO categories (id, name, slug, description)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_category.name.trim())
        .bind(&slug)
        .bind(&new_category.description)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_unique_violation(e, || AppError::SlugTaken(slug.clone())))?;

        Ok(category)
    }

    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let categories: Vec<Category> =
            sqlx::query_as("SELECT * FROM categories ORDER BY name ASC")
                .fetch_all(&self.db)
                .await?;

        Ok(categories)
    }

    pub async fn get_category(&self, slug: &str) -> AppResult<Category> {
        let category: Option<Category> = sqlx::query_as("SELECT * FROM categories WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.db)
            .await?;

        category.ok_or(AppError::CategoryNotFound)
    }

    // Products

    pub async fn create_product(&self, new_product: &NewProduct) -> AppResult<Product> {
        if new_product.price.is_sign_negative() {
            return Err(AppError::Validation("Price cannot be negative".to_string()));
        }
        if new_product.stock < 0 {
            return Err(AppError::Validation("Stock cannot be negative".to_string()));
        }

        let slug = resolve_slug(new_product.slug.as_deref(), &new_product.name)?;

        let product: Product = sqlx::query_as(
            r#"
            INSERT INTO products (id, name, slug, description, category_id, price, image_url, stock, is_available)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_product.name.trim())
        .bind(&slug)
        .bind(&new_product.description)
        .bind(new_product.category_id)
        .bind(new_product.price.round_dp(2))
        .bind(&new_product.image_url)
        .bind(new_product.stock)
        .bind(new_product.is_available)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_unique_violation(e, || AppError::SlugTaken(slug.clone())))?;

        tracing::info!(product_id = %product.id, slug = %product.slug, "Product created");
        Ok(product)
    }

    pub async fn get_product(&self, product_id: Uuid) -> AppResult<ProductDetail> {
        let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.db)
            .await?;

        let product = product.ok_or(AppError::ProductNotFound)?;
        self.load_detail(product).await
    }

    pub async fn get_product_by_slug(&self, slug: &str) -> AppResult<ProductDetail> {
        let product: Option<Product> = sqlx::query_as("SELECT * FROM products WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.db)
            .await?;

        let product = product.ok_or(AppError::ProductNotFound)?;
        self.load_detail(product).await
    }

    /// Available products, newest first, optionally limited to one category.
    pub async fn list_available(&self, category_slug: Option<&str>) -> AppResult<Vec<ProductDetail>> {
        let products: Vec<Product> = if let Some(slug) = category_slug {
            let category = self.get_category(slug).await?;
            sqlx::query_as(
                r#"
                SELECT * FROM products
                WHERE is_available = true AND category_id = $1
                ORDER BY created_at DESC
                "#,
            )
            .bind(category.id)
            .fetch_all(&self.db)
            .await?
        } else {
            sqlx::query_as(
                r#"
                SELECT * FROM products
                WHERE is_available = true
                ORDER BY created_at DESC
                "#,
            )
            .fetch_all(&self.db)
            .await?
        };

        let ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();

        let variants: Vec<ProductVariant> = sqlx::query_as(
            "SELECT * FROM product_variants WHERE product_id = ANY($1) ORDER BY product_id, size",
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let images: Vec<ProductImage> = sqlx::query_as(
            "SELECT * FROM product_images WHERE product_id = ANY($1) ORDER BY created_at ASC, id ASC",
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        Ok(assemble_details(products, variants, images))
    }

    pub async fn set_stock(&self, product_id: Uuid, stock: i32) -> AppResult<Product> {
        if stock < 0 {
            return Err(AppError::Validation("Stock cannot be negative".to_string()));
        }

        let product: Option<Product> = sqlx::query_as(
            "UPDATE products SET stock = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(stock)
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?;

        product.ok_or(AppError::ProductNotFound)
    }

    pub async fn set_availability(&self, product_id: Uuid, is_available: bool) -> AppResult<Product> {
        let product: Option<Product> = sqlx::query_as(
            "UPDATE products SET is_available = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
        )
        .bind(is_available)
        .bind(product_id)
        .fetch_optional(&self.db)
        .await?;

        product.ok_or(AppError::ProductNotFound)
    }

    // Variants

    pub async fn add_variant(
        &self,
        product_id: Uuid,
        size: Size,
        stock: i32,
    ) -> AppResult<ProductVariant> {
        if stock < 0 {
            return Err(AppError::Validation("Stock cannot be negative".to_string()));
        }

        self.ensure_product_exists(product_id).await?;

        let variant: ProductVariant = sqlx::query_as(
            r#"
            INSERT INTO product_variants (id, product_id, size, stock)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(size)
        .bind(stock)
        .fetch_one(&self.db)
        .await
        .map_err(|e| AppError::on_unique_violation(e, || AppError::VariantExists(size.to_string())))?;

        Ok(variant)
    }

    pub async fn set_variant_stock(
        &self,
        product_id: Uuid,
        size: Size,
        stock: i32,
    ) -> AppResult<ProductVariant> {
        if stock < 0 {
            return Err(AppError::Validation("Stock cannot be negative".to_string()));
        }

        let variant: Option<ProductVariant> = sqlx::query_as(
            "UPDATE product_variants SET stock = $1 WHERE product_id = $2 AND size = $3 RETURNING *",
        )
        .bind(stock)
        .bind(product_id)
        .bind(size)
        .fetch_optional(&self.db)
        .await?;

        variant.ok_or(AppError::VariantNotFound(size.to_string()))
    }

    // Images

    pub async fn add_image(&self, product_id: Uuid, image_url: &str) -> AppResult<ProductImage> {
        self.ensure_product_exists(product_id).await?;

        let image: ProductImage = sqlx::query_as(
            r#"
            INSERT INTO product_images (id, product_id, image_url)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(product_id)
        .bind(image_url.trim())
        .fetch_one(&self.db)
        .await?;

        Ok(image)
    }

    pub async fn stock_for_size(&self, product_id: Uuid, size: Option<&str>) -> AppResult<i64> {
        let detail = self.get_product(product_id).await?;
        Ok(detail.stock_for_size(size))
    }

    // Helper methods

    async fn ensure_product_exists(&self, product_id: Uuid) -> AppResult<()> {
        let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM products WHERE id = $1")
            .bind(product_id)
            .fetch_optional(&self.db)
            .await?;

        if exists.is_none() {
            return Err(AppError::ProductNotFound);
        }
        Ok(())
    }

    pub(crate) async fn load_detail(&self, product: Product) -> AppResult<ProductDetail> {
        let variants: Vec<ProductVariant> = sqlx::query_as(
            "SELECT * FROM product_variants WHERE product_id = $1 ORDER BY size ASC",
        )
        .bind(product.id)
        .fetch_all(&self.db)
        .await?;

        let images: Vec<ProductImage> = sqlx::query_as(
            "SELECT * FROM product_images WHERE product_id = $1 ORDER BY created_at ASC, id ASC",
        )
        .bind(product.id)
        .fetch_all(&self.db)
        .await?;

        Ok(ProductDetail {
            product,
            variants,
            images,
        })
    }
}

fn resolve_slug(explicit: Option<&str>, name: &str) -> AppResult<String> {
    let slug = cap_slug(match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => slugify(slug),
        None => slugify(name),
    });

    if slug.is_empty() {
        return Err(AppError::Validation(format!(
            "Cannot derive a slug from {:?}",
            name
        )));
    }
    Ok(slug)
}

/// Distributes variant and image rows to their products, keeping product order.
pub(crate) fn assemble_details(
    products: Vec<Product>,
    variants: Vec<ProductVariant>,
    images: Vec<ProductImage>,
) -> Vec<ProductDetail> {
    let mut details: Vec<ProductDetail> = products
        .into_iter()
        .map(|product| ProductDetail {
            product,
            variants: Vec::new(),
            images: Vec::new(),
        })
        .collect();

    for variant in variants {
        if let Some(detail) = details.iter_mut().find(|d| d.product.id == variant.product_id) {
            detail.variants.push(variant);
        }
    }
    for image in images {
        if let Some(detail) = details.iter_mut().find(|d| d.product.id == image.product_id) {
            detail.images.push(image);
        }
    }

    details
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::product::fixtures::product;
    use crate::models::SLUG_MAX_LEN;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn explicit_slug_wins_over_name() {
        assert_eq!(resolve_slug(Some("Linen Shirts"), "Shirts").unwrap(), "linen-shirts");
        assert_eq!(resolve_slug(Some("  "), "Linen Shirts").unwrap(), "linen-shirts");
        assert_eq!(resolve_slug(None, "Chinos").unwrap(), "chinos");
    }

    #[test]
    fn long_names_fit_the_slug_column() {
        let slug = resolve_slug(None, "Premium Slim Fit Stretch Cotton Oxford Button Down Shirt").unwrap();
        assert!(slug.len() <= SLUG_MAX_LEN);
        assert_eq!(slug, "premium-slim-fit-stretch-cotton-oxford-button-down");
    }

    #[test]
    fn empty_slug_is_rejected() {
        assert!(matches!(resolve_slug(None, "!!!"), Err(AppError::Validation(_))));
    }

    #[test]
    fn rows_are_attached_to_their_products() {
        let a = product(dec!(10.00), 1);
        let b = product(dec!(20.00), 2);
        let (a_id, b_id) = (a.id, b.id);

        let variants = vec![ProductVariant {
            id: Uuid::new_v4(),
            product_id: b_id,
            size: Size::M,
            stock: 4,
        }];
        let images = vec![
            ProductImage {
                id: Uuid::new_v4(),
                product_id: a_id,
                image_url: Some("https://cdn/a1.jpg".to_string()),
                created_at: Utc::now(),
            },
            ProductImage {
                id: Uuid::new_v4(),
                product_id: Uuid::new_v4(),
                image_url: Some("https://cdn/orphan.jpg".to_string()),
                created_at: Utc::now(),
            },
        ];

        let details = assemble_details(vec![a, b], variants, images);

        assert_eq!(details.len(), 2);
        assert_eq!(details[0].product.id, a_id);
        assert_eq!(details[0].images.len(), 1);
        assert_eq!(details[0].total_stock(), 1);
        assert_eq!(details[1].product.id, b_id);
        assert!(details[1].images.is_empty());
        assert_eq!(details[1].total_stock(), 4);
    }
}
