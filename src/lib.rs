//! newswire — an RSS news bot.
//!
//! Polls a configured set of RSS/Atom feeds, summarizes each new article
//! with OpenAI, resolves an illustrative image from the article page, and
//! posts the result to a Telegram channel. Already-posted links are tracked
//! in a SQLite database so restarts never repost old items.

pub mod config;
pub mod feed;
pub mod health;
pub mod image;
pub mod publish;
pub mod scheduler;
pub mod storage;
pub mod summarize;
pub mod util;
