pub mod data;
pub mod system;
