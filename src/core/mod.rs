// Core modules implementing the error model and license rules.
pub mod error;
pub mod license;
