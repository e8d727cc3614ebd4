pub mod cookie;
pub mod session;
pub mod set_cookie;

pub use cookie::Cookies;
pub use session::{Session, SessionStore};
pub use set_cookie::SetCookie;