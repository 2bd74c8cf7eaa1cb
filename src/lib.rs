pub mod api;
pub mod chat;
pub mod config;
pub mod render;
pub mod screen;
pub mod stomp;
pub mod utils;
