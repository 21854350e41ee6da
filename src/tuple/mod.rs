pub mod binary_codec;
pub mod codec;
pub mod text_codec;
pub mod tuple;
