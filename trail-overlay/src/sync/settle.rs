//! Détection de viewport stabilisé (debounce)
//!
//! La vue émet un viewport à chaque image de pan/zoom; seul l'état atteint
//! après `interval` sans nouveau changement est transmis au synchroniseur.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::trace;

use crate::viewport::Viewport;

pub struct SettleDebouncer {
    rx: mpsc::Receiver<Viewport>,
    interval: Duration,
    pending: Option<Viewport>,
}

impl SettleDebouncer {
    pub fn new(rx: mpsc::Receiver<Viewport>, interval: Duration) -> Self {
        Self {
            rx,
            interval,
            pending: None,
        }
    }

    /// Attend le prochain viewport stabilisé.
    ///
    /// Annulable (`select!`): le viewport en attente est conservé et le délai
    /// repart au prochain appel. À la fermeture du canal, le dernier viewport
    /// en attente est livré, puis `None`.
    pub async fn next_settled(&mut self) -> Option<Viewport> {
        if self.pending.is_none() {
            self.pending = Some(self.rx.recv().await?);
        }

        loop {
            match tokio::time::timeout(self.interval, self.rx.recv()).await {
                Ok(Some(viewport)) => self.pending = Some(viewport),
                Ok(None) | Err(_) => break,
            }
        }

        let settled = self.pending.take();
        if let Some(ref viewport) = settled {
            trace!(zoom = viewport.zoom, bbox = ?viewport.bbox.as_array(), "Viewport stabilisé");
        }
        settled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn viewport(offset: f64) -> Viewport {
        Viewport::from_bounds([-120.0 + offset, 30.0, -119.9 + offset, 30.1], 14.0).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_to_last() {
        let (tx, rx) = mpsc::channel(16);
        let mut debouncer = SettleDebouncer::new(rx, Duration::from_millis(500));

        tokio::spawn(async move {
            for i in 0..3 {
                tx.send(viewport(i as f64 * 0.01)).await.unwrap();
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            tokio::time::sleep(Duration::from_secs(2)).await;
            tx.send(viewport(1.0)).await.unwrap();
        });

        let start = Instant::now();
        let first = debouncer.next_settled().await.unwrap();
        assert_eq!(first, viewport(0.02));
        // Dernier envoi à t=200ms, puis 500ms de calme
        let elapsed = start.elapsed();
        assert!(
            elapsed >= Duration::from_millis(700) && elapsed < Duration::from_millis(750),
            "elapsed={:?}",
            elapsed
        );

        let second = debouncer.next_settled().await.unwrap();
        assert_eq!(second, viewport(1.0));

        assert!(debouncer.next_settled().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_channel_flushes_pending() {
        let (tx, rx) = mpsc::channel(4);
        let mut debouncer = SettleDebouncer::new(rx, Duration::from_secs(10));

        tx.send(viewport(0.0)).await.unwrap();
        tx.send(viewport(0.5)).await.unwrap();
        drop(tx);

        assert_eq!(debouncer.next_settled().await, Some(viewport(0.5)));
        assert_eq!(debouncer.next_settled().await, None);
    }
}
