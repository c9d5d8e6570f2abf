use crate::common::{network_interfaces, SYSFS_NET};
use crate::config::Config;
use crate::ethtool::{normalize_dump, CollectError, CounterSource, Ethtool};
use crate::sender::{encode_all, Connector, Transport, Udp};

use anyhow::{bail, Context};
use tracing::{info, warn};

use std::convert::Infallible;
use std::time::{Duration, Instant};

/// Runs the agent: samples every configured interface once per period and
/// forwards the counters to spectatord. Only returns if counters can't be
/// read, which the caller should treat as fatal.
pub fn run(config: Config) -> anyhow::Result<()> {
    // everything happens in sequence on this one thread
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .thread_name("ethmetrics")
        .build()
        .context("failed to launch async runtime")?;

    rt.block_on(start(config))
}

async fn start(config: Config) -> anyhow::Result<()> {
    let interfaces = match config.general().interfaces() {
        Some(interfaces) => interfaces.to_vec(),
        None => network_interfaces(SYSFS_NET).context("unable to get interfaces")?,
    };

    if interfaces.is_empty() {
        bail!("no network interfaces to monitor");
    }

    let transport = Transport::connect(config.general().address())
        .await
        .context("unable to send metrics to spectatord")?;

    info!(
        "sending metrics for {} to {}",
        interfaces.join(","),
        transport.address()
    );

    let source = Ethtool::new(config.general().ethtool(), config.general().timeout());

    let mut agent = Agent::new(interfaces, config.general().frequency(), source, transport);

    match agent.run().await {
        Ok(never) => match never {},
        Err(e) => Err(e.into()),
    }
}

/// Time left in the period after a pass took `elapsed`. Zero if the pass
/// overran the period.
pub fn remaining(period: Duration, elapsed: Duration) -> Duration {
    period.saturating_sub(elapsed)
}

/// Outcome of one collection pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Pass {
    pub interfaces: usize,
    pub records: usize,
    // records in batches that hit a send error, some may have been delivered
    pub affected: usize,
}

pub struct Agent<S, C: Connector = Udp> {
    interfaces: Vec<String>,
    period: Duration,
    source: S,
    transport: Transport<C>,
}

impl<S: CounterSource, C: Connector> Agent<S, C> {
    pub fn new(
        interfaces: Vec<String>,
        period: Duration,
        source: S,
        transport: Transport<C>,
    ) -> Self {
        Self {
            interfaces,
            period,
            source,
            transport,
        }
    }

    pub async fn run(&mut self) -> Result<Infallible, CollectError> {
        loop {
            let start = Instant::now();

            let pass = self.collect().await?;

            let elapsed = start.elapsed();
            let sleep = remaining(self.period, elapsed);

            let noun = if pass.interfaces == 1 {
                "interface"
            } else {
                "interfaces"
            };

            info!(
                "done processing {} metrics for {} {noun} in {elapsed:?}. sleeping {sleep:?}",
                pass.records, pass.interfaces
            );

            tokio::time::sleep(sleep).await;
        }
    }

    /// Sample every interface once. A send failure only loses that
    /// interface's batch, a counter source failure ends the pass.
    pub async fn collect(&mut self) -> Result<Pass, CollectError> {
        let mut pass = Pass::default();

        for interface in &self.interfaces {
            info!("gathering ethtool metrics for {interface}");

            let dump = self.source.dump(interface).await?;

            let records = encode_all(&normalize_dump(&dump));

            pass.interfaces += 1;
            pass.records += records.len();

            if let Err(e) = self.transport.send_all(&records).await {
                warn!(
                    "unable to send batch of {} updates for {interface}: {e}",
                    records.len()
                );
                pass.affected += records.len();
            }
        }

        Ok(pass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sender::Connection;

    use async_trait::async_trait;

    use std::collections::HashMap;
    use std::io::{Error, ErrorKind};
    use std::sync::{Arc, Mutex};

    struct Dumps {
        dumps: HashMap<String, String>,
        calls: Mutex<Vec<String>>,
    }

    impl Dumps {
        fn new(dumps: &[(&str, &str)]) -> Self {
            Self {
                dumps: dumps
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CounterSource for Dumps {
        async fn dump(&self, interface: &str) -> Result<String, CollectError> {
            self.calls.lock().unwrap().push(interface.to_string());

            self.dumps
                .get(interface)
                .cloned()
                .ok_or_else(|| CollectError::Timeout {
                    interface: interface.to_string(),
                    timeout: Duration::from_secs(2),
                })
        }
    }

    #[derive(Clone, Default)]
    struct Daemon {
        received: Arc<Mutex<Vec<Vec<u8>>>>,
        // payloads containing this are refused
        refuse: Option<&'static str>,
    }

    #[async_trait]
    impl Connector for Daemon {
        type Connection = Daemon;

        async fn connect(&self, _address: &str) -> Result<Daemon, Error> {
            Ok(self.clone())
        }
    }

    #[async_trait]
    impl Connection for Daemon {
        async fn send(&mut self, payload: &[u8]) -> Result<(), Error> {
            if let Some(refuse) = self.refuse {
                if String::from_utf8_lossy(payload).contains(refuse) {
                    return Err(Error::from(ErrorKind::ConnectionRefused));
                }
            }

            self.received.lock().unwrap().push(payload.to_vec());
            Ok(())
        }
    }

    const ETH0: &str = "NIC statistics:\n     rx_packets: 10\n     tx_packets: 20\n     \
                        queue_0_rx_drops: 1\n";
    const ETH1: &str = "NIC statistics:\n     link_down_events: 3\n";

    async fn agent(
        interfaces: &[&str],
        source: Dumps,
        daemon: Daemon,
    ) -> Agent<Dumps, Daemon> {
        let transport = Transport::with_connector("127.0.0.1:1234", daemon)
            .await
            .unwrap();

        Agent::new(
            interfaces.iter().map(|i| i.to_string()).collect(),
            Duration::from_millis(10),
            source,
            transport,
        )
    }

    #[test]
    fn sleep_is_never_negative() {
        let period = Duration::from_secs(30);

        assert_eq!(remaining(period, Duration::from_secs(10)), Duration::from_secs(20));
        assert_eq!(remaining(period, period), Duration::ZERO);
        assert_eq!(remaining(period, Duration::from_secs(45)), Duration::ZERO);
    }

    #[tokio::test]
    async fn one_batch_per_interface() {
        let daemon = Daemon::default();
        let source = Dumps::new(&[("eth0", ETH0), ("eth1", ETH1)]);

        let mut agent = agent(&["eth0", "eth1"], source, daemon.clone()).await;
        let pass = agent.collect().await.unwrap();

        assert_eq!(
            pass,
            Pass {
                interfaces: 2,
                records: 4,
                affected: 0
            }
        );

        let received = daemon.received.lock().unwrap();
        assert_eq!(
            *received,
            vec![
                b"C:eth.packets,dir=rx:10\nC:eth.packets,dir=tx:20\nC:eth.queue.drops,dir=rx,queue=0:1\n"
                    .to_vec(),
                b"C:eth.linkDownEvents:3\n".to_vec(),
            ]
        );

        assert_eq!(*agent.source.calls.lock().unwrap(), vec!["eth0", "eth1"]);
    }

    #[tokio::test]
    async fn send_failure_moves_on() {
        let daemon = Daemon {
            refuse: Some("packets"),
            ..Default::default()
        };
        let source = Dumps::new(&[("eth0", ETH0), ("eth1", ETH1)]);

        let mut agent = agent(&["eth0", "eth1"], source, daemon.clone()).await;
        let pass = agent.collect().await.unwrap();

        assert_eq!(pass.records, 4);
        assert_eq!(pass.affected, 3);
        assert_eq!(
            *daemon.received.lock().unwrap(),
            vec![b"C:eth.linkDownEvents:3\n".to_vec()]
        );
    }

    #[tokio::test]
    async fn source_failure_ends_pass() {
        let daemon = Daemon::default();
        let source = Dumps::new(&[("eth1", ETH1)]);

        let mut agent = agent(&["eth0", "eth1"], source, daemon.clone()).await;

        assert!(matches!(
            agent.collect().await,
            Err(CollectError::Timeout { .. })
        ));
        assert_eq!(*agent.source.calls.lock().unwrap(), vec!["eth0"]);
        assert!(daemon.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_dump_sends_nothing() {
        let daemon = Daemon::default();
        let source = Dumps::new(&[("eth0", "NIC statistics:\n")]);

        let mut agent = agent(&["eth0"], source, daemon.clone()).await;
        let pass = agent.collect().await.unwrap();

        assert_eq!(pass.records, 0);
        assert!(daemon.received.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_source_failure() {
        let daemon = Daemon::default();
        let source = Dumps::new(&[("eth0", ETH0)]);

        let mut agent = agent(&["eth0"], source, daemon.clone()).await;

        // there are no counters for eth9, so the second pass fails
        agent.collect().await.unwrap();
        agent.interfaces.push("eth9".to_string());

        match agent.run().await {
            Ok(never) => match never {},
            Err(e) => assert!(e.to_string().contains("eth9")),
        }

        assert_eq!(daemon.received.lock().unwrap().len(), 2);
    }
}
