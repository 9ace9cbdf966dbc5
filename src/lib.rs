pub mod app;
pub mod cache;
pub mod clinical;
pub mod config;
pub mod domain;
pub mod error;
pub mod expression;
pub mod fs_util;
pub mod geo;
pub mod model;
pub mod output;
pub mod parsers;
pub mod router;
pub mod session;
pub mod store;
pub mod xml;
