pub mod access;
pub mod api_router;
pub mod collab;
pub mod config;
pub mod documents;
pub mod favorites;
pub mod shared;
pub mod storage;
pub mod templates;
