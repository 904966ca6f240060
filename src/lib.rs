pub mod config;
pub mod decoder;
pub mod dispatcher;
pub mod error;
pub mod materializer;
pub mod query;
pub mod rpc;
pub mod source;
pub mod store;
pub mod tracker;
