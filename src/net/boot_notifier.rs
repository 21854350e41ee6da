use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tracing::{info, warn};

pub const BOOTED: &[u8] = b"BOOTED!";

/// Tell the test bench that the operator is up. This is fire-and-forget: no response is
///  expected, and failures are logged rather than propagated.
pub async fn notify_booted(testbench_addr: SocketAddr) {
    match send_boot_datagram(testbench_addr).await {
        Ok(()) => info!("boot notification sent to {:?}", testbench_addr),
        Err(e) => warn!("failed to send boot notification to {:?}: {}", testbench_addr, e),
    }
}

async fn send_boot_datagram(testbench_addr: SocketAddr) -> anyhow::Result<()> {
    let bind_addr: SocketAddr = if testbench_addr.is_ipv4() {
        "0.0.0.0:0".parse()?
    }
    else {
        "[::]:0".parse()?
    };

    let socket = UdpSocket::bind(bind_addr).await?;
    socket.send_to(BOOTED, testbench_addr).await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_notify_booted() {
        let testbench = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        notify_booted(testbench.local_addr().unwrap()).await;

        let mut buf = [0u8; 64];
        let (len, _) = testbench.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], BOOTED);
    }

    #[tokio::test]
    async fn test_send_without_listener_does_not_fail_loudly() {
        let addr = UdpSocket::bind("127.0.0.1:0").await.unwrap().local_addr().unwrap();
        notify_booted(addr).await;
    }
}
