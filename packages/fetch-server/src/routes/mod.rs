pub mod batch;
pub mod browse;
pub mod discover;
pub mod domains;
pub mod predictions;
pub mod workflows;
