pub mod quotes;
pub mod scores;

pub use quotes::Quote;
pub use scores::KeyScore;
