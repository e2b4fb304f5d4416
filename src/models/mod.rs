pub mod user;
pub mod category;
pub mod product;
pub mod cart;
pub mod order;
pub mod home_hero;

pub use user::*;
pub use category::*;
pub use product::*;
pub use cart::*;
pub use order::*;
pub use home_hero::*;
