pub mod postgres;
pub mod runtime;
