//! WordPress REST client for postkeep.
//!
//! [`WordPressClient`] covers the handful of endpoints the tool needs
//! (posts, terms, media, users and paged collections) and implements
//! [`postkeep_snapshot::RemoteContent`] so it can back a snapshot store.

mod client;
mod config;
mod error;
mod types;

pub use client::WordPressClient;
pub use config::{SiteConfig, DEFAULT_TIMEOUT_SECS};
pub use error::{CmsError, CmsResult};
pub use types::{
    Post, PostQuery, PostStatus, PostUpdate, Rendered, Term, User, SEO_DESCRIPTION_META,
};
