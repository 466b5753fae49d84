pub mod config;
pub mod context;
pub mod dedup;
pub mod emit;
pub mod error;
pub mod metrics_consts;
pub mod metrics_utils;
pub mod normalize;
pub mod parse;
pub mod pipeline;
pub mod queries;
pub mod source;
pub mod types;
