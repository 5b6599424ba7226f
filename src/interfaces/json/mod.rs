pub mod response;
pub mod seed;
