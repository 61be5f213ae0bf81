pub mod fingerprint;
pub mod setup;
pub mod status;
pub mod sync;
