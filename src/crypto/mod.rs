pub mod blind;
pub mod elgamal;
pub mod homomorphic;
pub mod or_proof;
pub mod tally_proof;
pub mod transcript;
