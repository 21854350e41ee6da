pub mod reframer;
