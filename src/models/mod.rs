pub mod assessment;
pub mod candidate;
pub mod document;
pub mod job;
pub mod score;
pub mod verification;
