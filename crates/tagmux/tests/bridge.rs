//! Bridge round trips over an in-memory duplex stream.

use std::sync::Arc;
use std::time::Duration;

use tagmux::{
    Engine, PoolConfig, RemoteEngine, Request, Response, SlotPool, Stage, serve_engine,
};

struct Doubler;

#[async_trait::async_trait]
impl Stage<u64> for Doubler {
    async fn process(&self, request: Request<u64>) -> Response<u64> {
        Response {
            tag: request.tag,
            payload: request.payload * 2,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn remote_engine_round_trip() {
    let (client, server) = tokio::io::duplex(4096);
    let server_task = tokio::spawn(serve_engine(server, Arc::new(Doubler)));

    let mut engine: RemoteEngine<u64> = RemoteEngine::connect(client, 4);
    let request = Request {
        tag: tagmux::Tag::new(0),
        payload: 21,
    };
    engine.try_admit(request).expect("queue has room");

    let mut response = None;
    for _ in 0..100 {
        if let Some(r) = engine.poll_completion() {
            response = Some(r);
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let response = response.expect("no completion arrived");
    assert_eq!(response.tag, tagmux::Tag::new(0));
    assert_eq!(response.payload, 42);

    engine.shutdown().await.unwrap();
    server_task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn admission_refused_when_queue_full() {
    let (client, server) = tokio::io::duplex(4096);
    let server_task = tokio::spawn(serve_engine(server, Arc::new(Doubler)));

    // Depth 1 and no yielding between admits: the second must bounce back.
    let mut engine: RemoteEngine<u64> = RemoteEngine::connect(client, 1);
    engine
        .try_admit(Request {
            tag: tagmux::Tag::new(0),
            payload: 1,
        })
        .expect("queue has room");
    let refused = engine
        .try_admit(Request {
            tag: tagmux::Tag::new(1),
            payload: 2,
        })
        .expect_err("queue was full");
    assert_eq!(refused.tag, tagmux::Tag::new(1));

    // Drain the admitted request so the server flushes cleanly.
    let mut response = None;
    for _ in 0..100 {
        if let Some(r) = engine.poll_completion() {
            response = Some(r);
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(response.expect("no completion arrived").payload, 2);

    engine.shutdown().await.unwrap();
    server_task.await.unwrap().unwrap();
}

#[tokio::test(start_paused = true)]
async fn pool_drives_a_remote_engine() {
    let (client, server) = tokio::io::duplex(4096);
    let server_task = tokio::spawn(serve_engine(server, Arc::new(Doubler)));

    let engine: RemoteEngine<u64> = RemoteEngine::connect(client, 8);
    let mut pool = SlotPool::new(PoolConfig::new(4), engine).unwrap();

    let mut offers: Vec<Option<u64>> = (0..4).map(|i| Some(10 + i as u64)).collect();
    let ready = vec![true; 4];
    let mut deliveries = Vec::new();

    for _ in 0..500 {
        let report = pool.step(&mut offers, &ready).unwrap();
        deliveries.extend(report.deliveries);
        if deliveries.len() == 4 {
            break;
        }
        // Let the i/o task and the stage make progress between steps.
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    assert_eq!(deliveries.len(), 4, "pool never collected all responses");
    deliveries.sort_by_key(|response| response.tag);
    for (i, response) in deliveries.iter().enumerate() {
        assert_eq!(response.tag.index(), i);
        assert_eq!(response.payload, (10 + i as u64) * 2);
    }
    assert!(pool.is_idle());

    pool.into_engine().shutdown().await.unwrap();
    server_task.await.unwrap().unwrap();
}
