pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod embedding;
pub mod error;
pub mod pipeline;
pub mod ports;
pub mod services;
pub mod startup;
pub mod stream;
pub mod validation;
