pub mod helpers;
pub mod network;
