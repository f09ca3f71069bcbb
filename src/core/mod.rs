pub mod catalog;
pub mod duplicate;
pub mod fingerprint;
pub mod image;
pub mod journal;
pub mod relocate;
