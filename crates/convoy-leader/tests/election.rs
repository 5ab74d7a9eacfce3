// Election behaviour with short timings against a shared in-memory lease.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use convoy_leader::{ElectorConfig, Lease, LeaderElector, LeadershipHandler, MemoryLease};
use tokio_util::sync::CancellationToken;

fn fast_config() -> ElectorConfig {
    ElectorConfig {
        lease_name: "test".to_string(),
        namespace: "default".to_string(),
        lease_duration: Duration::from_millis(300),
        renew_deadline: Duration::from_millis(200),
        retry_period: Duration::from_millis(40),
    }
}

#[derive(Default)]
struct Recorder {
    started: AtomicUsize,
    stopped: AtomicUsize,
    leaders: Mutex<Vec<String>>,
    leading_now: Arc<AtomicUsize>,
    max_concurrent: Arc<AtomicUsize>,
}

impl Recorder {
    fn shared(leading_now: &Arc<AtomicUsize>, max_concurrent: &Arc<AtomicUsize>) -> Self {
        Self {
            leading_now: Arc::clone(leading_now),
            max_concurrent: Arc::clone(max_concurrent),
            ..Default::default()
        }
    }
}

#[async_trait]
impl LeadershipHandler for Recorder {
    async fn started_leading(&self, _leader_token: CancellationToken) {
        self.started.fetch_add(1, Ordering::SeqCst);
        let now = self.leading_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
    }

    async fn stopped_leading(&self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
        self.leading_now.fetch_sub(1, Ordering::SeqCst);
    }

    async fn new_leader(&self, identity: &str) {
        self.leaders.lock().unwrap().push(identity.to_string());
    }
}

fn spawn_elector(
    lease: &Arc<MemoryLease>,
    identity: &str,
    handler: Arc<Recorder>,
) -> (CancellationToken, tokio::task::JoinHandle<()>) {
    let elector = LeaderElector::new(lease.clone(), identity, fast_config()).unwrap();
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let handle = tokio::spawn(async move {
        elector.run(token, handler.as_ref()).await;
    });
    (cancel, handle)
}

#[tokio::test]
async fn single_replica_leads_and_releases_on_cancel() {
    let lease = Arc::new(MemoryLease::new());
    let handler = Arc::new(Recorder::default());
    let (cancel, handle) = spawn_elector(&lease, "replica-a", Arc::clone(&handler));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(handler.started.load(Ordering::SeqCst), 1);
    assert_eq!(handler.leaders.lock().unwrap().as_slice(), ["replica-a"]);

    cancel.cancel();
    handle.await.unwrap();
    assert_eq!(handler.stopped.load(Ordering::SeqCst), 1);
    let record = lease.get().await.unwrap().unwrap();
    assert!(record.holder.is_empty());
}

#[tokio::test]
async fn only_one_of_two_replicas_leads_and_the_other_takes_over() {
    let lease = Arc::new(MemoryLease::new());
    let leading_now = Arc::new(AtomicUsize::new(0));
    let max_concurrent = Arc::new(AtomicUsize::new(0));
    let a = Arc::new(Recorder::shared(&leading_now, &max_concurrent));
    let b = Arc::new(Recorder::shared(&leading_now, &max_concurrent));

    let (cancel_a, handle_a) = spawn_elector(&lease, "replica-a", Arc::clone(&a));
    tokio::time::sleep(Duration::from_millis(100)).await;
    let (cancel_b, handle_b) = spawn_elector(&lease, "replica-b", Arc::clone(&b));

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(a.started.load(Ordering::SeqCst), 1);
    assert_eq!(b.started.load(Ordering::SeqCst), 0);
    assert_eq!(b.leaders.lock().unwrap().as_slice(), ["replica-a"]);

    cancel_a.cancel();
    handle_a.await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    assert_eq!(b.started.load(Ordering::SeqCst), 1);
    assert_eq!(max_concurrent.load(Ordering::SeqCst), 1);
    assert_eq!(lease.get().await.unwrap().unwrap().holder, "replica-b");

    cancel_b.cancel();
    handle_b.await.unwrap();
    assert_eq!(leading_now.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn losing_the_lease_stops_leading_and_rejoins() {
    let lease = Arc::new(MemoryLease::new());
    let handler = Arc::new(Recorder::default());
    let (cancel, handle) = spawn_elector(&lease, "replica-a", Arc::clone(&handler));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handler.started.load(Ordering::SeqCst), 1);

    // an intruder grabs the lease and never renews it
    lease.release("replica-a").await.unwrap();
    assert!(lease
        .acquire("intruder", Duration::from_millis(300))
        .await
        .unwrap()
        .is_acquired());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(handler.stopped.load(Ordering::SeqCst), 1);

    // intruder's lease expires; the replica wins it back
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(handler.started.load(Ordering::SeqCst), 2);
    assert!(handler.leaders.lock().unwrap().contains(&"intruder".to_string()));

    cancel.cancel();
    handle.await.unwrap();
}
