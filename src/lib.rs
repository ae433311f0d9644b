pub mod auth;
pub mod config;
pub mod coords;
pub mod db;
pub mod editor;
pub mod error;
pub mod export;
pub mod form;
pub mod layout;
pub mod pdf;
pub mod routes;
pub mod schema;
pub mod state;
pub mod storage;
pub mod templates;
