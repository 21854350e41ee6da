pub mod clock;
pub mod pipeline;
