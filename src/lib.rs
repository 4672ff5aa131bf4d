//! Turns database descriptions or existing SQL into reviewed schemas through an LLM, and keeps
//! the results as projects with their generation history.

pub mod config;
pub mod db;
pub mod llm;
pub mod util;
pub mod web;
