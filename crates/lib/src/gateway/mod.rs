//! Remote gateway: backend HTTP client with health caching and a local mock fallback.

mod backend;
mod client;
mod health;
mod live;
mod mock;
pub mod protocol;

pub use backend::{Backend, GatewayError, Mode, UploadFile};
pub use client::{Gateway, GatewayClient, REQUEST_FAILED_REPLY};
pub use health::{HealthCache, DEFAULT_HEALTH_TTL};
pub use live::{LiveBackend, EMPTY_REPLY_FALLBACK};
pub use mock::{MockBackend, MOCK_REPLY};
