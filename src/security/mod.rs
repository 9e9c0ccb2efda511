pub mod headers;
pub mod rate_limit;
