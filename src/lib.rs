pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod eutils;
pub mod model;
pub mod output;
pub mod parse;
pub mod pipeline;
pub mod select;
