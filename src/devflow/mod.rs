pub mod collector;
pub mod facts;
pub mod heuristics;
pub mod processor;
