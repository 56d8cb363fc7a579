pub mod http;
pub mod patterns;
pub mod resolver;
pub mod retry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use http::{HttpClient, HttpClientConfig, HttpResponse, ReqwestHttpClient};
pub use resolver::{Endpoints, LiveResolver, ResolverSettings};
pub use retry::RetryPolicy;
