pub mod cache;
pub mod sim;
pub mod timeq;
pub mod traffic;
