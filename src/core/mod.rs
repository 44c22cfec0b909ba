// src/core/mod.rs

pub mod action;
pub mod action_composite;
pub mod action_print;
pub mod action_real;
pub mod dir_utility;
pub mod git;
pub mod github;
pub mod prompt;
pub mod table;
