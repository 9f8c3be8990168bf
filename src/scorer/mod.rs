pub mod deal_scorer;

pub use deal_scorer::{score_deal, DealScorer};
