pub mod types;
pub mod align;

pub use align::align_pair;
