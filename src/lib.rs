pub mod app;
pub mod config;
pub mod debounce;
pub mod favorites;
pub mod listing;
pub mod models;
pub mod search;
pub mod storage;
pub mod tmdb;
pub mod views;
