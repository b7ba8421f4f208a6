//! Connection pool and the strategy that picks from it.

use std::fmt;

use super::connection::Connection;
use crate::config::ConfigError;

/// Chooses the connection for the next attempt.
pub trait Picker: Send + Sync + fmt::Debug {
    /// `connections` is never empty.
    fn pick<'a>(&self, connections: &'a [Connection]) -> &'a Connection;
}

/// Picks the connection whose backoff ends first. A connection that is not
/// backing off always wins; ties go to configuration order.
#[derive(Debug, Default, Clone, Copy)]
pub struct BackoffPicker;

impl Picker for BackoffPicker {
    fn pick<'a>(&self, connections: &'a [Connection]) -> &'a Connection {
        let mut best = &connections[0];
        let mut best_until = best.backoff_until();
        for candidate in &connections[1..] {
            let until = candidate.backoff_until();
            // `None < Some(_)`, and strict comparison keeps the earlier entry.
            if until < best_until {
                best = candidate;
                best_until = until;
            }
        }
        best
    }
}

#[derive(Debug)]
pub struct Pool {
    connections: Vec<Connection>,
    picker: Box<dyn Picker>,
}

impl Pool {
    pub fn new(connections: Vec<Connection>, picker: Box<dyn Picker>) -> Result<Self, ConfigError> {
        if connections.is_empty() {
            return Err(ConfigError::NoNodes);
        }
        Ok(Self {
            connections,
            picker,
        })
    }

    pub fn get_connection(&self) -> &Connection {
        self.picker.pick(&self.connections)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NodeConfig;
    use std::time::Duration;

    fn pool(n: usize) -> Pool {
        let connections = (0..n)
            .map(|i| {
                let node = NodeConfig {
                    endpoint: format!("http://node{}:9984", i),
                    headers: Default::default(),
                };
                Connection::new(&node, reqwest::Client::new(), Duration::from_secs(10)).unwrap()
            })
            .collect();
        Pool::new(connections, Box::new(BackoffPicker)).unwrap()
    }

    #[test]
    fn empty_pool_is_rejected() {
        assert!(matches!(
            Pool::new(Vec::new(), Box::new(BackoffPicker)),
            Err(ConfigError::NoNodes)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn single_connection_is_always_picked() {
        let pool = pool(1);
        pool.connections()[0].record_failure();
        assert_eq!(pool.get_connection().endpoint(), "http://node0:9984");
    }

    #[tokio::test(start_paused = true)]
    async fn ties_follow_configuration_order() {
        let pool = pool(3);
        assert_eq!(pool.get_connection().endpoint(), "http://node0:9984");
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_connection_beats_backed_off() {
        let pool = pool(3);
        pool.connections()[0].record_failure();
        assert_eq!(pool.get_connection().endpoint(), "http://node1:9984");
        pool.connections()[1].record_failure();
        assert_eq!(pool.get_connection().endpoint(), "http://node2:9984");
    }

    #[tokio::test(start_paused = true)]
    async fn earliest_backoff_wins_when_all_failed() {
        let pool = pool(2);
        // node0 has failed twice (1 s), node1 once (0.5 s).
        pool.connections()[0].record_failure();
        pool.connections()[0].record_failure();
        pool.connections()[1].record_failure();
        assert_eq!(pool.get_connection().endpoint(), "http://node1:9984");

        pool.connections()[1].record_success();
        assert_eq!(pool.get_connection().endpoint(), "http://node1:9984");
    }
}
