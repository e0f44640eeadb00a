pub mod error;
pub mod limiters;
pub mod logger;
pub mod similarity;

pub use similarity::cosine_similarity;
