//! Sends Panopto lectures to a Study Buddy backend.
//!
//! A download runs across three contexts: the page context resolves the
//! lecture's delivery info, the background context fetches and uploads the
//! audio podcast with the viewer's credentials, and the control surface
//! starts the request and follows its progress.

pub mod api;
pub mod application;
pub mod backend;
pub mod config;
pub mod domain;
pub mod utils;
