pub mod audio;
pub mod cli;
pub mod config;
pub mod corpus;
pub mod dataset;
pub mod features;
pub mod inference;
pub mod labels;
pub mod server;
pub mod training;
pub mod types;
