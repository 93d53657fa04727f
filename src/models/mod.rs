//! Built-in record types.

mod character;
mod product;
mod user;

pub use character::{Character, is_vip_candidate, promote_vips};
pub use product::Product;
pub use user::User;

use crate::schema::{Entity, EntitySchema};

/// Schemas applied by [`Engine::create_all`](crate::connection::Engine::create_all).
pub fn schemas() -> [&'static EntitySchema; 3] {
    [User::schema(), Product::schema(), Character::schema()]
}
