use std::time::Duration;

use shelf_core::gateway::{GatewayClient, LedCommand};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Applies LED commands one at a time.
///
/// Commands that queue up while a request is in flight collapse to the
/// newest one; each command describes the complete LED state, so older
/// ones carry nothing the newest lacks. Failures are logged only.
pub async fn led_worker(client: GatewayClient, mut rx: mpsc::UnboundedReceiver<LedCommand>) {
    while let Some(mut command) = rx.recv().await {
        let mut skipped = 0usize;
        while let Ok(newer) = rx.try_recv() {
            command = newer;
            skipped += 1;
        }
        if skipped > 0 {
            debug!(skipped, "collapsed LED commands");
        }
        if let Err(e) = client.apply_led(&command).await {
            warn!("LED update failed: {e:#}");
        }
    }
}

/// Turns every LED off, giving up after `limit`. Returns whether the
/// Gateway confirmed.
pub async fn clear_on_exit(client: &GatewayClient, limit: Duration) -> bool {
    match tokio::time::timeout(limit, client.clear_led()).await {
        Ok(Ok(())) => {
            debug!("LEDs cleared");
            true
        }
        Ok(Err(e)) => {
            warn!("LED clear on exit failed: {e:#}");
            false
        }
        Err(_) => {
            warn!(?limit, "LED clear on exit timed out");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Instant;

    use super::*;

    fn bind_localhost() -> Option<TcpListener> {
        TcpListener::bind("127.0.0.1:0").ok()
    }

    fn client_for(listener: &TcpListener) -> GatewayClient {
        let addr = listener.local_addr().unwrap();
        GatewayClient::new(&format!("http://{addr}"), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_clear_on_exit_posts_clear() {
        let Some(listener) = bind_localhost() else {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        };
        let client = client_for(&listener);

        let gateway = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut header = String::new();
            while reader.read_line(&mut header).unwrap() > 0 && header != "\r\n" {
                header.clear();
            }
            stream
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .unwrap();
            request_line
        });

        assert!(clear_on_exit(&client, Duration::from_secs(2)).await);
        let request_line = gateway.join().unwrap();
        assert!(request_line.starts_with("POST /api/led/clear "));
    }

    #[tokio::test]
    async fn test_clear_on_exit_gives_up_on_silent_gateway() {
        // Bound but never accepting: the request hangs until the limit.
        let Some(listener) = bind_localhost() else {
            eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
            return;
        };
        let client = client_for(&listener);

        let started = Instant::now();
        assert!(!clear_on_exit(&client, Duration::from_millis(100)).await);
        assert!(started.elapsed() < Duration::from_secs(2));
        drop(listener);
    }
}
