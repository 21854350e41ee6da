pub mod framing;
pub mod net;
pub mod operator;
pub mod session;
pub mod test_util;
pub mod tuple;
