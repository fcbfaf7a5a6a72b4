//! Resilient invocation layer.
//!
//! # Data Flow
//! ```text
//! Caller (token manager, key set validator)
//!     → request.rs (describe method, url, body, auth, encoding, deadline)
//!     → client.rs (circuit guard → retry loop → deadline → transport)
//!     → response.rs (status + decoded body)
//!     → error.rs on failure (message, step, code, ctx)
//! ```

pub mod client;
pub mod error;
pub mod request;
pub mod response;

pub use client::{HttpTransport, ReqwestTransport, ResilientClient};
pub use error::{HttpError, HttpErrorKind};
pub use request::{Auth, Encoding, HttpRequest, Method, RequestOptions};
pub use response::HttpResponse;
