use crate::scenario::{Echo, Outcome, Scenario};
use crate::transport::ScriptedTransport;
use hwprobe::{Builder, Error};
use std::sync::Once;
use std::time::Duration;
use test_case::test_case;
use tracing::info;
use tracing_subscriber::fmt::format::FmtSpan;

const EPSILON: f64 = 1e-9;

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::NONE)
            .with_env_filter("sim=debug,hwprobe=debug")
            .with_test_writer()
            .init();
    });
}

macro_rules! scenario {
    ($path:expr) => {{
        let data = include_str!(concat!("../resources/scenario/", $path));
        toml::from_str(data)?
    }};
}

#[test_case(scenario!("ipv4_every_reply.toml"))]
#[test_case(scenario!("ipv4_gaps.toml"))]
#[test_case(scenario!("ipv6_mixed.toml"))]
#[test_case(scenario!("ipv4_wrap.toml"))]
#[test_case(scenario!("ipv4_no_reply.toml"))]
fn test_scenario(scenario: Scenario) -> anyhow::Result<()> {
    init_tracing();
    info!("simulating {}", scenario.name);
    let mut probe = Builder::new("192.0.2.1")
        .family(scenario.family.into())
        .timeout(Duration::from_secs(1))
        .ttl(64)
        .build_with(ScriptedTransport::new(scenario.echoes.clone()))?;
    let deadline = scenario.deadline_ms.map(Duration::from_millis);
    let result = probe.probe(scenario.count, deadline);
    assert_eq!(Some("192.0.2.1"), probe.transport().host());
    match scenario.outcome {
        Outcome::Statistics(expected) => {
            result?;
            assert_eq!(expected.sent, probe.packets_sent());
            assert_eq!(expected.received, probe.packets_received());
            assert!(
                (probe.average() - expected.average).abs() < EPSILON,
                "average {} != {}",
                probe.average(),
                expected.average
            );
            assert!(
                (probe.stddev() - expected.stddev).abs() < EPSILON,
                "stddev {} != {}",
                probe.stddev(),
                expected.stddev
            );
            assert!((probe.loss() - expected.loss).abs() < EPSILON);
        }
        Outcome::NoReply { sent } => {
            assert!(matches!(result, Err(Error::NoReply(ref host)) if host == "192.0.2.1"));
            assert_eq!(sent, probe.packets_sent());
            assert_eq!(0, probe.packets_received());
        }
    }
    Ok(())
}

#[test]
fn test_builder_configures_transport() -> anyhow::Result<()> {
    let probe = Builder::new("192.0.2.1")
        .family(hwprobe::AddressFamily::Ipv6)
        .timeout_secs(0.5)
        .ttl(32)
        .build_with(ScriptedTransport::new(vec![Echo::Lost]))?;
    let config = probe.transport().config().copied();
    assert_eq!(
        Some(hwprobe::TransportConfig {
            family: hwprobe::AddressFamily::Ipv6,
            timeout: Some(Duration::from_millis(500)),
            ttl: hwprobe::TimeToLive(32),
        }),
        config
    );
    Ok(())
}

#[test]
fn test_deadline_stops_session() -> anyhow::Result<()> {
    init_tracing();
    let transport = ScriptedTransport::new(vec![Echo::Reply { rtt_ms: 1 }])
        .with_delay(Duration::from_millis(20));
    let mut probe = Builder::new("192.0.2.1").build_with(transport)?;
    probe.probe(100, Some(Duration::from_millis(100)))?;
    assert!((1..=5).contains(&probe.packets_sent()));
    assert_eq!(probe.packets_sent(), probe.transport().sends());
    assert_eq!(probe.packets_sent(), probe.packets_received());
    Ok(())
}

#[test]
fn test_unresolvable_host() -> anyhow::Result<()> {
    let mut probe = Builder::new("nowhere.invalid")
        .build_with(ScriptedTransport::new(vec![Echo::Reply { rtt_ms: 1 }]))?;
    let err = probe.run().unwrap_err();
    assert!(matches!(
        err,
        Error::HostResolution { ref host, .. } if host == "nowhere.invalid"
    ));
    assert_eq!(0, probe.packets_sent());
    assert_eq!(0, probe.transport().sends());
    Ok(())
}
