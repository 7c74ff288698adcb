pub mod engine;
pub mod footsites;
pub mod http;
pub mod keyword;
pub mod shopify;
pub mod site;
pub mod types;

pub use engine::{Monitor, MonitorConfig};
pub use footsites::FootsitesMonitor;
pub use http::{ProductHttp, ReqwestProductHttp};
pub use keyword::KeywordMatcher;
pub use shopify::ShopifyMonitor;
pub use site::SiteMonitor;
pub use types::{EventType, MatchResult, MonitorResult, MonitorState, Priority, ProductEvent, ProductObservation};
