pub mod extractions;
pub mod health;
