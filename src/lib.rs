pub mod bundle;
pub mod cache;
pub mod classify;
pub mod config;
pub mod context;
pub mod document;
pub mod entry;
pub mod exception;
pub mod handler;
pub mod hooks;
pub mod island;
pub mod lazy;
pub mod manifest;
pub mod param;
pub mod payload;
pub mod renderer;
pub mod request;
pub mod response;
pub mod styles;
pub mod util;

pub use cache::PayloadCache;
pub use config::{Config, RuntimeConfig};
pub use context::{Payload, RenderRequest, SsrContext};
pub use exception::Exception;
pub use handler::RenderHandler;
pub use hooks::{Hooks, RenderHook};
pub use param::{HttpRequestMethod, HttpVersion};
pub use request::Request;
pub use response::RenderResponse;
pub use util::HtmlBuilder;
