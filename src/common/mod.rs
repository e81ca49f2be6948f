// Shared error types used across the nozzle

pub mod error;
