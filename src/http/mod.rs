mod client;
pub mod retry;
mod transport;

pub use client::{ApiClient, USER_AGENT};
pub use retry::{with_retry, RetryConfig, RetryConfigBuilder, RetryResult};
pub use transport::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport};
