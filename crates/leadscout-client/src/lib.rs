pub mod api;

pub use api::HttpContentApi;
