pub mod apis;
pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod mapper;
pub mod pipeline;
pub mod relocator;
pub mod report;
pub mod slug;
pub mod storage;
pub mod types;
