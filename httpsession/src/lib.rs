pub mod cookie_store;
pub mod factory;
pub mod identity;
pub mod impersonation;

pub use cookie_store::CookieStore;
pub use factory::SessionFactory;
pub use identity::BrowserIdentity;
pub use impersonation::{FallbackBackend, ImpersonationBackend};
