//! Utilities for testing relay sessions without a network. They are part of the crate's regular
//!  (non-#[cfg(test)]) code so that applications embedding a session can use them as well.

pub mod connection;


#[cfg(test)]
mod tests {
    use tracing::Level;

    #[ctor::ctor]
    fn init_test_logging() {
        tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(Level::DEBUG)
            // .with_max_level(Level::TRACE)
            .try_init()
            .ok();
    }
}
