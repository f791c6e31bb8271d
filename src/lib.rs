pub mod api_connection;
pub mod checkout;
pub mod cli;
pub mod collaborators;
pub mod config;
pub mod diversity;
pub mod error;
pub mod ledger;
pub mod model;
pub mod plan;
pub mod planner;
pub mod preferences;
pub mod quantity;
pub mod recipe_generator;
pub mod replacement;
pub mod scheduler;
pub mod search;
pub mod storage;
