pub mod polar_signature;
