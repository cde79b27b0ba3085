//! Cookie storage backends for the cart and checkout stores.

pub mod cookie;
pub mod file;
pub mod memory;
pub mod traits;

pub use cookie::{CART_COOKIE, CHECKOUT_COOKIE, CookieOptions, NamedCookie, SameSite};
pub use file::FileJar;
pub use memory::MemoryJar;
pub use traits::CookieStore;
