//! Handset core library: backend gateway client with mock fallback, chat session, setup flow,
//! local store and config, used by the `handset` CLI.

pub mod config;
pub mod context;
pub mod gateway;
pub mod init;
pub mod session;
pub mod setup;
pub mod store;
pub mod types;
