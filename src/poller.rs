//! Periodic bulk zone-state polling.
//!
//! Runs on its own interval, independent of the token renewer. Every tick
//! produces exactly one `PollSnapshot` for the consumer; a failed fetch is
//! delivered as a snapshot too and the loop keeps ticking. Only cancellation
//! ends it.

use crate::client::TadoClient;
use crate::error::ApiError;
use crate::models::tado::{HomeId, ZoneStates};
use crate::periodic::{self, TaskHandle, Wake};
use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use log::{debug, info, warn};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct PollSnapshot {
    /// 1-based tick counter.
    pub tick: u64,
    pub home_id: HomeId,
    pub fetched_at: DateTime<Utc>,
    pub result: Result<ZoneStates, ApiError>,
}

pub struct Poller {
    client: Arc<TadoClient>,
    home_id: HomeId,
}

impl Poller {
    pub fn new(client: Arc<TadoClient>, home_id: HomeId) -> Self {
        Poller { client, home_id }
    }

    pub fn spawn<F>(self, interval: Duration, consumer: F) -> io::Result<PollerHandle>
    where
        F: FnMut(PollSnapshot) + Send + 'static,
    {
        self.spawn_with_ticks(periodic::interval_ticks(interval), consumer)
    }

    pub fn spawn_with_ticks<F>(self, ticks: Receiver<Instant>, mut consumer: F) -> io::Result<PollerHandle>
    where
        F: FnMut(PollSnapshot) + Send + 'static,
    {
        let task = periodic::spawn_task("zone-poller", move |cancel| {
            info!("Zone state poller started for home {}", self.home_id);
            let mut tick: u64 = 0;
            while let Wake::Tick(_) = periodic::next_wake(&ticks, &cancel) {
                tick += 1;
                consumer(self.poll(tick));
            }
            info!("Zone state poller stopped after {} tick(s)", tick);
            tick
        })?;
        Ok(PollerHandle { task })
    }

    fn poll(&self, tick: u64) -> PollSnapshot {
        debug!("Getting new zone states (tick {})", tick);
        let result = self.client.get_zone_states(self.home_id);
        if let Err(e) = &result {
            warn!("Zone state fetch failed on tick {}: {}", tick, e);
        }
        PollSnapshot {
            tick,
            home_id: self.home_id,
            fetched_at: Utc::now(),
            result,
        }
    }
}

pub struct PollerHandle {
    task: TaskHandle<u64>,
}

impl PollerHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Cancel and wait; returns the number of ticks handled.
    pub fn stop(self) -> u64 {
        self.task.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::CredentialStore;
    use crate::models::tado::{TokenPair, ZoneId};
    use crate::transport::mock::MockTransport;
    use crossbeam_channel::unbounded;

    fn fixture(name: &str) -> String {
        std::fs::read_to_string(format!("tests/data/{name}")).expect("fixture present")
    }

    fn client(mock: &Arc<MockTransport>) -> Arc<TadoClient> {
        let tokens = TokenPair {
            access_token: "abc".to_string(),
            refresh_token: "def".to_string(),
            token_type: "bearer".to_string(),
            expires_in: 599,
            scope: "home.user".to_string(),
            issuer_id: String::new(),
        };
        let store = Arc::new(CredentialStore::new(tokens));
        Arc::new(TadoClient::new(mock.clone(), "https://my.example.test/api/v2", store))
    }

    #[test]
    fn failed_fetch_is_reported_and_loop_continues() {
        let mock = Arc::new(MockTransport::scripted(vec![
            Ok((200, fixture("zone-states.json"))),
            Ok((500, "boom".to_string())),
            Ok((200, fixture("zone-states.json"))),
        ]));
        let (tick_tx, ticks) = unbounded();
        let (out_tx, out) = unbounded();
        let handle = Poller::new(client(&mock), HomeId(9))
            .spawn_with_ticks(ticks, move |snap| {
                let _ = out_tx.send(snap);
            })
            .expect("spawn");

        for _ in 0..3 {
            tick_tx.send(Instant::now()).unwrap();
        }
        let snaps = (0..3)
            .map(|_| out.recv_timeout(Duration::from_secs(5)).expect("snapshot"))
            .collect::<Vec<_>>();

        assert!(!handle.is_finished());
        assert_eq!(handle.stop(), 3);
        assert!(out.try_recv().is_err(), "exactly three snapshots");

        assert_eq!(snaps.iter().map(|s| s.tick).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(snaps[0].result.as_ref().is_ok_and(|s| s.get(ZoneId(1)).is_some()));
        assert_eq!(snaps[1].result.as_ref().err().and_then(|e| e.status()), Some(500));
        assert!(snaps[2].result.is_ok());
        assert!(snaps.iter().all(|s| s.home_id == HomeId(9)));
        assert!(
            mock.requests()
                .iter()
                .all(|r| r.uri == "https://my.example.test/api/v2/homes/9/zoneStates")
        );
    }

    #[test]
    fn cancellation_without_ticks_fetches_nothing() {
        let mock = Arc::new(MockTransport::scripted(vec![]));
        let (_tick_tx, ticks) = unbounded();
        let handle = Poller::new(client(&mock), HomeId(9))
            .spawn_with_ticks(ticks, |_| {})
            .expect("spawn");
        assert_eq!(handle.stop(), 0);
        assert!(mock.requests().is_empty());
    }

    #[test]
    fn runs_on_its_own_interval() {
        let body = fixture("zone-states.json");
        let mock = Arc::new(MockTransport::with_handler(move |_| Ok((200, body.clone()))));
        let (out_tx, out) = unbounded();
        let handle = Poller::new(client(&mock), HomeId(9))
            .spawn(Duration::from_millis(5), move |snap| {
                let _ = out_tx.send(snap.tick);
            })
            .expect("spawn");

        assert_eq!(out.recv_timeout(Duration::from_secs(5)).ok(), Some(1));
        assert_eq!(out.recv_timeout(Duration::from_secs(5)).ok(), Some(2));
        assert!(handle.stop() >= 2);
    }
}
