use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use sysfeed::core::monitor::{
    BroadcastLoop, CpuMetrics, Forecaster, GpuProbe, GpuVendor, MemoryMetrics, MetricsSource,
    NetworkMetrics, Partition, PartitionUsage, ProbeChain, ProbeResult, Publisher,
    SnapshotCollector, SystemFacts, UPDATE_EVENT,
};
use sysfeed::{Result, SysfeedError};

/// Source that replays scripted CPU readings and can be told to misbehave
struct ScriptedSource {
    cpu: Vec<f64>,
    ticks: Arc<AtomicUsize>,
    panic_on_tick: Option<usize>,
    fail_refresh_on_tick: Option<usize>,
}

impl ScriptedSource {
    fn new(cpu: Vec<f64>) -> Self {
        Self {
            cpu,
            ticks: Arc::new(AtomicUsize::new(0)),
            panic_on_tick: None,
            fail_refresh_on_tick: None,
        }
    }

    fn tick(&self) -> usize {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl MetricsSource for ScriptedSource {
    fn refresh(&mut self) -> Result<()> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;
        if self.panic_on_tick == Some(tick) {
            panic!("sensor driver crashed");
        }
        if self.fail_refresh_on_tick == Some(tick) {
            return Err(SysfeedError::metric_collection("counters unavailable"));
        }
        Ok(())
    }

    fn cpu(&mut self) -> Result<CpuMetrics> {
        let index = (self.tick() - 1) % self.cpu.len();
        Ok(CpuMetrics {
            usage_percent: self.cpu[index],
            frequency_mhz: Some(2400.0),
            core_count: 8,
        })
    }

    fn memory(&mut self) -> Result<MemoryMetrics> {
        Ok(MemoryMetrics {
            total_bytes: 16_000,
            available_bytes: 4_000,
            used_percent: 75.0,
            swap_percent: 10.0,
        })
    }

    fn partitions(&mut self) -> Result<Vec<Partition>> {
        Ok(vec![
            Partition {
                device: "/dev/sda1".to_string(),
                mountpoint: "/".to_string(),
            },
            Partition {
                device: "/dev/sdb1".to_string(),
                mountpoint: "/mnt/locked".to_string(),
            },
        ])
    }

    fn partition_usage(&mut self, partition: &Partition) -> Result<PartitionUsage> {
        if partition.mountpoint == "/mnt/locked" {
            return Err(SysfeedError::metric_collection("permission denied"));
        }
        Ok(PartitionUsage {
            total_bytes: 1_000,
            used_bytes: 250,
            free_bytes: 750,
        })
    }

    fn network(&mut self) -> Result<NetworkMetrics> {
        Ok(NetworkMetrics {
            bytes_sent: 1_024,
            bytes_received: 2_048,
        })
    }

    fn system(&mut self) -> Result<SystemFacts> {
        Ok(SystemFacts {
            os_name: "Linux".to_string(),
            os_version: "6.1".to_string(),
            processor_name: "Test CPU".to_string(),
            boot_time: "2024-01-01 08:00:00".to_string(),
        })
    }
}

struct FixedProbe;

impl GpuProbe for FixedProbe {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn applies(&self) -> bool {
        true
    }

    fn try_read(&self) -> Result<ProbeResult> {
        Ok(ProbeResult::detected(GpuVendor::Amd, Some(33.0)))
    }
}

#[derive(Default)]
struct RecordingPublisher {
    published: Mutex<Vec<(String, Value)>>,
}

impl RecordingPublisher {
    fn payloads(&self) -> Vec<Value> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }
}

impl Publisher for RecordingPublisher {
    fn publish(&self, event: &str, payload: &Value) -> Result<()> {
        self.published
            .lock()
            .unwrap()
            .push((event.to_string(), payload.clone()));
        Ok(())
    }
}

fn build_loop(
    source: ScriptedSource,
    publisher: &Arc<RecordingPublisher>,
) -> BroadcastLoop<ScriptedSource, Arc<RecordingPublisher>> {
    let probes = ProbeChain::new(vec![Box::new(FixedProbe)]);
    BroadcastLoop::new(
        SnapshotCollector::new(source, probes),
        Forecaster::new(),
        Arc::clone(publisher),
    )
}

#[tokio::test]
async fn test_cycle_publishes_full_payload() {
    let publisher = Arc::new(RecordingPublisher::default());
    let mut broadcast_loop = build_loop(ScriptedSource::new(vec![42.0]), &publisher);

    broadcast_loop.run_cycle().await.unwrap();

    let published = publisher.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    let (event, data) = &published[0];
    assert_eq!(event, UPDATE_EVENT);

    assert_eq!(data["cpu"]["usage"], 42.0);
    assert_eq!(data["cpu"]["cores"], 8);
    assert_eq!(data["memory"]["percent"], 75.0);
    assert_eq!(data["gpu"]["available"], true);
    assert_eq!(data["gpu"]["type"], "AMD");
    assert_eq!(data["gpu"]["usage"], 33.0);
    assert_eq!(data["network"]["bytes_recv"], 2048);
    assert_eq!(data["system"]["os"], "Linux");
    // cold start echoes the current reading
    assert_eq!(data["predictions"]["cpu"], 42.0);

    // the locked partition is skipped, not fatal
    let disks = data["disk"].as_array().unwrap();
    assert_eq!(disks.len(), 1);
    assert_eq!(disks[0]["mountpoint"], "/");
    assert_eq!(disks[0]["percent"], 25.0);

    assert!(data["timestamp"].as_str().unwrap().len() == 19);
    assert!(data.get("degraded").is_none());
}

#[tokio::test]
async fn test_loop_survives_panicking_collection() {
    let publisher = Arc::new(RecordingPublisher::default());
    let mut source = ScriptedSource::new(vec![10.0, 20.0, 30.0]);
    source.panic_on_tick = Some(1);
    let mut broadcast_loop = build_loop(source, &publisher);

    let first = broadcast_loop.run_cycle().await;
    assert!(matches!(first, Err(SysfeedError::Cycle(_))));
    assert!(publisher.payloads().is_empty());

    broadcast_loop.run_cycle().await.unwrap();
    broadcast_loop.run_cycle().await.unwrap();

    let payloads = publisher.payloads();
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0]["cpu"]["usage"], 20.0);
    assert_eq!(payloads[1]["cpu"]["usage"], 30.0);
}

#[tokio::test]
async fn test_degraded_tick_reuses_last_forecast() {
    let publisher = Arc::new(RecordingPublisher::default());
    let mut source = ScriptedSource::new(vec![15.0, 99.0, 99.0]);
    source.fail_refresh_on_tick = Some(2);
    let mut broadcast_loop = build_loop(source, &publisher);

    for _ in 0..3 {
        broadcast_loop.run_cycle().await.unwrap();
    }

    let payloads = publisher.payloads();
    assert_eq!(payloads.len(), 3);

    // still published, but only the timestamp is real
    assert_eq!(payloads[1]["cpu"]["usage"], 0.0);
    assert_eq!(payloads[1]["gpu"]["available"], false);
    assert_eq!(payloads[1]["predictions"]["cpu"], 15.0);

    // the degraded tick never entered the forecast window
    assert_eq!(broadcast_loop.forecaster().window().to_vec(), vec![15.0, 99.0]);
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let publisher = Arc::new(RecordingPublisher::default());
    let broadcast_loop = build_loop(ScriptedSource::new(vec![5.0]), &publisher)
        .with_period(std::time::Duration::from_millis(10));

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    let task = tokio::spawn(broadcast_loop.run(shutdown_rx));

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    shutdown_tx.send(()).unwrap();

    tokio::time::timeout(std::time::Duration::from_secs(2), task)
        .await
        .expect("loop did not stop")
        .unwrap();

    assert!(!publisher.payloads().is_empty());
}

#[tokio::test]
async fn test_run_keeps_publishing_after_panicking_tick() {
    let publisher = Arc::new(RecordingPublisher::default());
    let mut source = ScriptedSource::new(vec![10.0, 20.0, 30.0]);
    source.panic_on_tick = Some(1);
    let broadcast_loop =
        build_loop(source, &publisher).with_period(std::time::Duration::from_millis(10));

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);
    let task = tokio::spawn(broadcast_loop.run(shutdown_rx));

    tokio::time::timeout(std::time::Duration::from_secs(5), async {
        while publisher.payloads().len() < 2 {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("loop stopped publishing after the panic");

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(2), task)
        .await
        .expect("loop did not stop")
        .unwrap();

    let payloads = publisher.payloads();
    assert_eq!(payloads[0]["cpu"]["usage"], 20.0);
    assert_eq!(payloads[1]["cpu"]["usage"], 30.0);
}
