//! Tool workers
//!
//! Adapters implementing the `ToolWorker` port:
//!
//! - `command`: shell command template with escaped `{param}` placeholders
//! - `static_worker`: fixed JSON response
//! - `fn_worker`: in-process closure
//! - `http`: JSON POST to an endpoint (feature `http-workers`)

pub mod command;
pub mod fn_worker;
#[cfg(feature = "http-workers")]
pub mod http;
pub mod static_worker;

pub use command::CommandWorker;
pub use fn_worker::FnWorker;
#[cfg(feature = "http-workers")]
pub use http::HttpWorker;
pub use static_worker::StaticWorker;
