mod moments;
mod quantile;

pub use moments::StreamingMoments;
pub use quantile::{interquartile_fences, quantile, IqrFences};
