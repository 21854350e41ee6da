use std::net::SocketAddr;
use std::time::Duration;

use anyhow::bail;

use crate::tuple::binary_codec::BinaryCodec;
use crate::tuple::codec::WireFormat;
use crate::tuple::text_codec::TextCodec;

#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub source_addr: SocketAddr,
    pub destination_addr: SocketAddr,
    /// where to announce that the operator is up; no announcement if `None`
    pub testbench_addr: Option<SocketAddr>,

    pub wire_format: WireFormat,
    /// maximum number of bytes requested from the Source per read
    pub recv_chunk_size: usize,
    /// must hold at least one maximum-size ingress frame
    pub carry_capacity: usize,

    /// bound for waiting on the Destination's acknowledgment of `DONE`
    pub destination_ack_timeout: Duration,
    pub boot_delay: Duration,

    /// treat a malformed frame as fatal instead of skipping it
    pub strict_framing: bool,
    pub debug_show_tuples: bool,
}

impl RelayConfig {
    pub const TEXT_RECV_CHUNK_SIZE: usize = 2048;
    pub const BINARY_RECORDS_PER_RECV: usize = 50;

    pub fn new(source_addr: SocketAddr, destination_addr: SocketAddr) -> RelayConfig {
        Self::for_format(source_addr, destination_addr, WireFormat::Text)
    }

    pub fn for_format(source_addr: SocketAddr, destination_addr: SocketAddr, wire_format: WireFormat) -> RelayConfig {
        let (recv_chunk_size, carry_capacity) = match wire_format {
            WireFormat::Text => (Self::TEXT_RECV_CHUNK_SIZE, TextCodec::MAX_FRAME_LEN),
            WireFormat::Binary => (Self::BINARY_RECORDS_PER_RECV * BinaryCodec::RECORD_LEN, BinaryCodec::RECORD_LEN),
        };

        RelayConfig {
            source_addr,
            destination_addr,
            testbench_addr: None,
            wire_format,
            recv_chunk_size,
            carry_capacity,
            destination_ack_timeout: Duration::from_secs(10),
            boot_delay: Duration::from_secs(1),
            strict_framing: false,
            debug_show_tuples: false,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.recv_chunk_size == 0 {
            bail!("receive chunk size must be positive");
        }
        let max_frame_len = self.wire_format.codec().max_frame_len();
        if self.carry_capacity < max_frame_len {
            bail!("carry-over capacity {} is smaller than a single {} frame ({} bytes)", self.carry_capacity, self.wire_format, max_frame_len);
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    fn addr(s: &str) -> SocketAddr {
        SocketAddr::from_str(s).unwrap()
    }

    #[rstest]
    #[case::text(WireFormat::Text, 2048, 400)]
    #[case::binary(WireFormat::Binary, 1000, 20)]
    fn test_defaults(#[case] format: WireFormat, #[case] recv_chunk_size: usize, #[case] carry_capacity: usize) {
        let config = RelayConfig::for_format(addr("127.0.0.1:1"), addr("127.0.0.1:2"), format);
        assert_eq!(config.recv_chunk_size, recv_chunk_size);
        assert_eq!(config.carry_capacity, carry_capacity);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_small_carry() {
        let mut config = RelayConfig::new(addr("127.0.0.1:1"), addr("127.0.0.1:2"));
        config.carry_capacity = 399;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_chunk() {
        let mut config = RelayConfig::for_format(addr("127.0.0.1:1"), addr("127.0.0.1:2"), WireFormat::Binary);
        config.recv_chunk_size = 0;
        assert!(config.validate().is_err());
    }
}
