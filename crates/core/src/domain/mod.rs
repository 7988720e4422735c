pub mod document;
pub mod profile;
pub mod quote;
pub mod risk;
