//! The phase-locked polling scheduler.
//!
//! Successive polls land on integral multiples of the configured
//! interval regardless of how long a cycle takes or how often one
//! fails. A slow cycle is caught up by skipping whole intervals, never
//! by drifting off the grid.

use crate::prelude::*;
use crate::coordinator::Coordinator;
use crate::database::CommentRow;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelData {
    Shutdown,
}

pub struct Scheduler {
    config: Config,
    channels: Channels,
}

impl Scheduler {
    pub fn new(config: Config, channels: Channels) -> Self {
        Self { config, channels }
    }

    pub async fn start(&self, mut coordinator: Coordinator) -> Result<()> {
        let interval = self.config.interval() as i64;
        let mut shutdown_rx = self.channels.to_scheduler.subscribe();

        info!("scheduler starting, interval {}s", interval);

        // Discovery and enumeration, retried until the bus answers.
        loop {
            match coordinator.start_network().await {
                Ok(()) => break,
                Err(e) => {
                    error!("network start failed: {:#}, retrying in {}s", e, interval);
                    self.comment(format!("network start failed: {:#}", e));
                    if self
                        .wait(Duration::from_secs(interval as u64), &mut shutdown_rx)
                        .await
                    {
                        coordinator.close();
                        return Ok(());
                    }
                }
            }
        }

        let mut next_poll = align_up(chrono::Utc::now().timestamp(), interval);

        loop {
            next_poll = catch_up(next_poll, chrono::Utc::now().timestamp(), interval);

            let wait_secs = (next_poll - chrono::Utc::now().timestamp()).max(0) as u64;
            if self
                .wait(Duration::from_secs(wait_secs), &mut shutdown_rx)
                .await
            {
                break;
            }

            if !coordinator.transport_open() {
                if let Err(e) = coordinator.open().await {
                    error!("transport re-open failed: {}", e);
                    self.comment(format!("transport re-open failed: {}", e));
                    next_poll += interval;
                    continue;
                }
            }

            if let Err(e) = coordinator.poll_cycle(next_poll).await {
                error!("poll cycle at {} failed: {:#}", next_poll, e);
                self.comment(format!("poll cycle failed: {:#}", e));
            }

            if self.config.close_between_cycles() {
                coordinator.close();
            }

            next_poll += interval;
        }

        coordinator.close();
        info!("scheduler stopped");
        Ok(())
    }

    fn comment(&self, text: String) {
        let _ = self
            .channels
            .to_database
            .send(database::ChannelData::Comment(CommentRow::new(None, text)));
    }

    /// Sleeps for `duration`; returns true when shutdown was requested
    /// in the meantime.
    async fn wait(
        &self,
        duration: Duration,
        shutdown_rx: &mut broadcast::Receiver<ChannelData>,
    ) -> bool {
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                _ = &mut sleep => return false,
                msg = shutdown_rx.recv() => match msg {
                    Ok(ChannelData::Shutdown) => {
                        info!("scheduler received shutdown signal");
                        return true;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("scheduler channel closed, shutting down");
                        return true;
                    }
                    Err(_) => continue,
                },
            }
        }
    }
}

/// Smallest multiple of `interval` that is >= `now`.
pub fn align_up(now: i64, interval: i64) -> i64 {
    ((now + interval - 1) / interval) * interval
}

/// Advances `next_poll` by whole intervals while it lies in the past.
pub fn catch_up(mut next_poll: i64, now: i64, interval: i64) -> i64 {
    while next_poll < now {
        next_poll += interval;
    }
    next_poll
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns_to_the_next_interval_boundary() {
        assert_eq!(align_up(120, 60), 120);
        assert_eq!(align_up(121, 60), 180);
        assert_eq!(align_up(179, 60), 180);
        assert_eq!(align_up(0, 60), 0);
    }

    #[test]
    fn catch_up_skips_whole_intervals_without_drift() {
        // a cycle stalled for 3.5 intervals
        let t0 = 1_700_000_040;
        let now = t0 + 210;
        let next = catch_up(t0 + 60, now, 60);

        assert_eq!(next % 60, 0);
        assert!(next > t0);
        assert!(next >= now);
        assert!(next - now < 60);
    }

    #[test]
    fn catch_up_leaves_future_polls_alone() {
        assert_eq!(catch_up(240, 180, 60), 240);
        assert_eq!(catch_up(240, 240, 60), 240);
    }
}
