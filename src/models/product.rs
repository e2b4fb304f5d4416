use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::AppError;

pub const PLACEHOLDER_IMAGE_URL: &str = "https://via.placeholder.com/400x400?text=No+Image";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub category_id: Uuid,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub stock: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub slug: Option<String>,
    pub description: String,
    pub category_id: Uuid,
    pub price: Decimal,
    pub image_url: Option<String>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default = "default_available")]
    pub is_available: bool,
}

fn default_available() -> bool {
    true
}

/// Garment sizes offered as variants, smallest first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(type_name = "product_size", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Size {
    Xs,
    S,
    M,
    L,
    Xl,
    Xxl,
}

impl Size {
    pub const ALL: [Size; 6] = [Size::Xs, Size::S, Size::M, Size::L, Size::Xl, Size::Xxl];

    pub fn as_str(&self) -> &'static str {
        match self {
            Size::Xs => "XS",
            Size::S => "S",
            Size::M => "M",
            Size::L => "L",
            Size::Xl => "XL",
            Size::Xxl => "XXL",
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Size {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Size::ALL
            .into_iter()
            .find(|size| size.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AppError::UnknownSize(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductVariant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub size: Size,
    pub stock: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProductImage {
    pub id: Uuid,
    pub product_id: Uuid,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A product together with its size variants and gallery images.
///
/// All derived values (stock, images) are computed from the loaded rows, so
/// the caller decides when to hit the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<ProductVariant>,
    pub images: Vec<ProductImage>,
}

impl ProductDetail {
    /// Primary image, else the first gallery image, else the placeholder.
    pub fn display_image(&self) -> &str {
        self.product
            .image_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .or_else(|| self.image_urls().next())
            .unwrap_or(PLACEHOLDER_IMAGE_URL)
    }

    /// Primary image followed by the gallery, each URL once, in first-seen
    /// order. Never empty.
    pub fn gallery_images(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut urls: Vec<String> = self
            .product
            .image_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .into_iter()
            .chain(self.image_urls())
            .filter(|url| seen.insert(*url))
            .map(str::to_string)
            .collect();

        if urls.is_empty() {
            urls.push(PLACEHOLDER_IMAGE_URL.to_string());
        }
        urls
    }

    pub fn has_size_variants(&self) -> bool {
        !self.variants.is_empty()
    }

    pub fn total_stock(&self) -> i64 {
        if self.has_size_variants() {
            self.variants.iter().map(|v| i64::from(v.stock)).sum()
        } else {
            i64::from(self.product.stock)
        }
    }

    /// No size means the whole product; a size with no variant row has none.
    pub fn stock_for_size(&self, size: Option<&str>) -> i64 {
        let size = match size.map(str::trim) {
            None | Some("") => return self.total_stock(),
            Some(size) => size,
        };

        self.variants
            .iter()
            .find(|v| v.size.as_str().eq_ignore_ascii_case(size))
            .map(|v| i64::from(v.stock))
            .unwrap_or(0)
    }

    pub fn available_sizes(&self) -> Vec<Size> {
        let mut sizes: Vec<Size> = self
            .variants
            .iter()
            .filter(|v| v.stock > 0)
            .map(|v| v.size)
            .collect();
        sizes.sort();
        sizes
    }

    /// Message asking the shopper to pick one of the sizes in stock.
    pub fn size_prompt(&self) -> String {
        let sizes: Vec<&str> = self.available_sizes().iter().map(Size::as_str).collect();
        if sizes.is_empty() {
            format!("{} is out of stock in every size", self.product.name)
        } else {
            format!("Please select a size for {} ({})", self.product.name, sizes.join(", "))
        }
    }

    fn image_urls(&self) -> impl Iterator<Item = &str> {
        self.images
            .iter()
            .filter_map(|img| img.image_url.as_deref())
            .filter(|url| !url.is_empty())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn product(price: Decimal, stock: i32) -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "Oxford Shirt".to_string(),
            slug: "oxford-shirt".to_string(),
            description: "Button-down cotton shirt".to_string(),
            category_id: Uuid::new_v4(),
            price,
            image_url: None,
            stock,
            is_available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    pub fn detail(product: Product, variants: &[(Size, i32)], images: &[&str]) -> ProductDetail {
        let product_id = product.id;
        ProductDetail {
            product,
            variants: variants
                .iter()
                .map(|&(size, stock)| ProductVariant {
                    id: Uuid::new_v4(),
                    product_id,
                    size,
                    stock,
                })
                .collect(),
            images: images
                .iter()
                .map(|url| ProductImage {
                    id: Uuid::new_v4(),
                    product_id,
                    image_url: Some(url.to_string()),
                    created_at: Utc::now(),
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{detail, product};
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn total_stock_without_variants_is_flat_stock() {
        let d = detail(product(dec!(999.00), 7), &[], &[]);
        assert!(!d.has_size_variants());
        assert_eq!(d.total_stock(), 7);
    }

    #[test]
    fn total_stock_with_variants_ignores_flat_stock() {
        let d = detail(
            product(dec!(999.00), 100),
            &[(Size::S, 2), (Size::M, 5), (Size::Xl, 0)],
            &[],
        );
        assert!(d.has_size_variants());
        assert_eq!(d.total_stock(), 7);
    }

    #[test]
    fn stock_for_size_lookups() {
        let d = detail(product(dec!(499.00), 0), &[(Size::M, 4), (Size::L, 1)], &[]);

        assert_eq!(d.stock_for_size(Some("M")), 4);
        assert_eq!(d.stock_for_size(Some("l")), 1);
        assert_eq!(d.stock_for_size(Some("XXL")), 0);
        assert_eq!(d.stock_for_size(Some("bogus")), 0);
        assert_eq!(d.stock_for_size(None), 5);
        assert_eq!(d.stock_for_size(Some("")), 5);
    }

    #[test]
    fn sized_lookup_on_plain_product_is_zero() {
        let d = detail(product(dec!(499.00), 9), &[], &[]);
        assert_eq!(d.stock_for_size(Some("M")), 0);
        assert_eq!(d.stock_for_size(None), 9);
    }

    #[test]
    fn gallery_is_deduplicated_in_first_seen_order() {
        let mut p = product(dec!(1.00), 1);
        p.image_url = Some("https://cdn/a.jpg".to_string());
        let d = detail(
            p,
            &[],
            &["https://cdn/b.jpg", "https://cdn/a.jpg", "https://cdn/c.jpg", "https://cdn/b.jpg"],
        );

        assert_eq!(
            d.gallery_images(),
            vec!["https://cdn/a.jpg", "https://cdn/b.jpg", "https://cdn/c.jpg"]
        );
    }

    #[test]
    fn gallery_falls_back_to_placeholder() {
        let d = detail(product(dec!(1.00), 1), &[], &[]);
        assert_eq!(d.gallery_images(), vec![PLACEHOLDER_IMAGE_URL]);
        assert_eq!(d.display_image(), PLACEHOLDER_IMAGE_URL);
    }

    #[test]
    fn display_image_prefers_primary_then_gallery() {
        let d = detail(product(dec!(1.00), 1), &[], &["https://cdn/first.jpg", "https://cdn/second.jpg"]);
        assert_eq!(d.display_image(), "https://cdn/first.jpg");

        let mut p = product(dec!(1.00), 1);
        p.image_url = Some("https://cdn/main.jpg".to_string());
        let d = detail(p, &[], &["https://cdn/first.jpg"]);
        assert_eq!(d.display_image(), "https://cdn/main.jpg");
    }

    #[test]
    fn size_parsing() {
        assert_eq!("xl".parse::<Size>().unwrap(), Size::Xl);
        assert_eq!(" XXL ".parse::<Size>().unwrap(), Size::Xxl);
        assert!(matches!("XXXL".parse::<Size>(), Err(AppError::UnknownSize(_))));
        assert!(Size::Xs < Size::Xxl);
    }

    #[test]
    fn available_sizes_skip_sold_out() {
        let d = detail(
            product(dec!(1.00), 0),
            &[(Size::L, 3), (Size::S, 1), (Size::M, 0)],
            &[],
        );
        assert_eq!(d.available_sizes(), vec![Size::S, Size::L]);
        assert_eq!(d.size_prompt(), "Please select a size for Oxford Shirt (S, L)");
    }

    #[test]
    fn size_prompt_when_sold_out() {
        let d = detail(product(dec!(1.00), 0), &[(Size::M, 0)], &[]);
        assert_eq!(d.size_prompt(), "Oxford Shirt is out of stock in every size");
    }
}
