pub mod accounts;
pub mod catalog;
pub mod cart;
pub mod orders;
pub mod home_hero;

pub use accounts::AccountsService;
pub use catalog::CatalogService;
pub use cart::CartService;
pub use orders::OrdersService;
pub use home_hero::HomeHeroService;
