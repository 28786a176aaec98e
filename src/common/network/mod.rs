pub mod fragment;
pub mod socket;
