//! Feed polling, keyword matching, dedup, and Telegram relay.
//!
//! The library is wired together by the binary in `main.rs`: a [`poller::Manager`]
//! runs one worker task per configured feed group, each worker fetches through a
//! [`feed::EntrySource`], filters via [`matcher`] and the persistent
//! [`store::SeenStore`], and hands surviving entries to a [`notify::Notifier`].

pub mod config;
pub mod feed;
pub mod matcher;
pub mod notify;
pub mod poller;
pub mod stats;
pub mod store;
