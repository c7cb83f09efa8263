// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! End-to-end: producers publish through a live relay and the monitor prints
//! what arrives on the outbound leg.

use scopes_trace_bus::{BusError, Endpoint, Publisher, Relay, RelayConfig, Subscriber};
use scopes_trace_monitor::{Envelope, Monitor, SEPARATOR, SchemaRegistry, encode_envelope};
use scopes_trace_proto::{
    CreateQueryRequest, DictEntry, FinishedReason, FinishedRequest, ProxyRef, RequestMode, Value,
    encode_ssz,
};
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep, timeout};

fn endpoints(tmp: &TempDir) -> (Endpoint, Endpoint) {
    (
        Endpoint::new(tmp.path().join("scopes-monitor")),
        Endpoint::new(tmp.path().join("scopes-monitor2")),
    )
}

struct RunningRelay {
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<(), BusError>>,
}

impl RunningRelay {
    fn start(tmp: &TempDir) -> Self {
        let (inbound, outbound) = endpoints(tmp);
        let relay = Relay::bind(RelayConfig::new(inbound, outbound)).expect("bind relay");
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(relay.run_until(async move {
            let _ = stopped.await;
        }));
        Self { stop, task }
    }

    async fn stop(self) {
        let _ = self.stop.send(());
        let result = timeout(Duration::from_secs(5), self.task).await.expect("relay stops");
        result.expect("relay task").expect("relay result");
    }
}

async fn settle() {
    sleep(Duration::from_millis(100)).await;
}

fn create_query(payload_len: Option<usize>) -> Vec<u8> {
    let payload = encode_ssz(&CreateQueryRequest {
        query: b"news".to_vec(),
        hints: vec![DictEntry::new("cardinality", Value::Int(10))],
        reply_proxy: ProxyRef::new("ipc:///tmp/reply", "client-1"),
    });
    let payload = match payload_len {
        Some(len) => payload[..len].to_vec(),
        None => payload,
    };
    encode_envelope(
        &Envelope::new(RequestMode::Twoway, "create_query")
            .with_target("news-scope", "Scope")
            .with_payload(payload),
    )
}

fn reports(output: &[u8]) -> Vec<String> {
    let text = String::from_utf8(output.to_vec()).expect("utf-8 output");
    text.split_terminator(&format!("{}\n", SEPARATOR))
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn monitor_keeps_going_after_bad_messages() {
    let tmp = TempDir::new().expect("tmpdir");
    let relay = RunningRelay::start(&tmp);
    let (inbound, outbound) = endpoints(&tmp);

    let mut subscriber = Subscriber::connect(&outbound).await.expect("subscribe");
    let mut publisher = Publisher::connect(&inbound).await.expect("publish");
    settle().await;

    let unknown = encode_envelope(
        &Envelope::new(RequestMode::Oneway, "unregistered_op").with_payload(vec![1; 37]),
    );
    let finished = encode_envelope(&Envelope::new(RequestMode::Oneway, "finished").with_payload(
        encode_ssz(&FinishedRequest::new(FinishedReason::Cancelled, None)),
    ));
    for message in [
        b"\x01garbage".to_vec(),
        create_query(Some(7)),
        create_query(None),
        unknown,
        encode_envelope(&Envelope::new(RequestMode::Twoway, "ping")),
        finished,
    ] {
        publisher.publish(&message).await.expect("publish");
    }
    settle().await;
    relay.stop().await;

    let registry = SchemaRegistry::builtin();
    let mut monitor = Monitor::new(&registry);
    let mut output = Vec::new();
    timeout(Duration::from_secs(5), monitor.run(&mut subscriber, &mut output))
        .await
        .expect("monitor returns when the relay closes")
        .expect("monitor run");

    assert_eq!(monitor.received(), 6);
    let reports = reports(&output);
    assert_eq!(reports.len(), 6);

    assert!(reports[0].contains("received 8 byte message #1:"));
    assert!(reports[0].contains("MalformedEnvelope"));

    assert!(reports[1].contains("#2:"));
    assert!(reports[1].contains("inParams: PayloadDecodeError"));

    assert!(reports[2].contains("#3:"));
    assert!(reports[2].contains("inParams as <CreateQueryRequest>:"));
    for name in ["query:", "hints:", "replyProxy:"] {
        assert!(reports[2].contains(&format!("\n    {}", name)), "missing {name}");
    }

    assert!(reports[3].contains("inParams: <opaque payload: 37 bytes>"));
    assert!(reports[4].contains("opName: \"ping\""));
    assert!(reports[4].contains("inParams: <no payload>"));
    assert!(reports[5].contains("reason: CANCELLED"));
    assert!(reports[5].contains("error: null"));
}

#[tokio::test]
async fn run_forever_waits_for_the_relay() {
    let tmp = TempDir::new().expect("tmpdir");
    let (inbound, outbound) = endpoints(&tmp);
    let registry = SchemaRegistry::builtin();
    let mut monitor = Monitor::new(&registry);
    let mut output = Vec::new();

    let producer = async {
        // The monitor starts first and must retry until the relay is up.
        sleep(Duration::from_millis(300)).await;
        let relay = RunningRelay::start(&tmp);
        sleep(Duration::from_millis(800)).await;

        let mut publisher = Publisher::connect(&inbound).await.expect("publish");
        publisher.publish(&create_query(None)).await.expect("publish");
        sleep(Duration::from_millis(200)).await;
        relay
    };

    let relay = tokio::select! {
        result = monitor.run_forever(&outbound, &mut output) => panic!("monitor stopped: {result:?}"),
        relay = producer => relay,
    };
    relay.stop().await;

    let reports = reports(&output);
    assert_eq!(reports.len(), 1);
    assert!(reports[0].contains("message #1:"));
    assert!(reports[0].contains("id: \"news-scope\""));
}
