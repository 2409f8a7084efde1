pub mod access_context;

pub use access_context::{access_context_middleware, Access, SERVICE_TOKEN_HEADER, XSRF_HEADER};
