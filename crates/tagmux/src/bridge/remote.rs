//! Engine over a byte stream: a client-side [`Engine`] implementation and
//! the engine-side serve loop.
//!
//! `RemoteEngine` satisfies the synchronous engine contract with a pair of
//! bounded channels bridged to the framed stream by an i/o task: admission
//! refusal is a full send queue, completion polling is a non-blocking
//! receive. `serve_engine` runs on the other end, decoding admits, running
//! an async [`Stage`] per request, and encoding completions as they finish,
//! in whatever order they finish.

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

use crate::bridge::codec::FrameCodec;
use crate::bridge::protocol::EngineFrame;
use crate::engine::Engine;
use crate::error::BridgeError;
use crate::port::{Request, Response};

/// Async request handler on the engine side of the bridge.
#[async_trait::async_trait]
pub trait Stage<T>: Send + Sync + 'static {
    async fn process(&self, request: Request<T>) -> Response<T>;
}

/// Client side: an [`Engine`] whose pipeline lives behind a byte stream.
pub struct RemoteEngine<T> {
    admit_tx: mpsc::Sender<Request<T>>,
    complete_rx: mpsc::Receiver<Response<T>>,
    io_task: JoinHandle<Result<(), BridgeError>>,
}

impl<T> RemoteEngine<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    /// Bridge `stream` to a channel pair with `depth` queued admissions.
    ///
    /// Admissions beyond `depth` are refused until the i/o task drains the
    /// queue, which is the remote rendition of a full pipeline.
    pub fn connect<S>(stream: S, depth: usize) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (admit_tx, admit_rx) = mpsc::channel(depth);
        let (complete_tx, complete_rx) = mpsc::channel(depth);
        let io_task = tokio::spawn(run_io(stream, admit_rx, complete_tx));
        Self {
            admit_tx,
            complete_rx,
            io_task,
        }
    }

    /// Close the bridge and wait for the i/o task to finish.
    pub async fn shutdown(self) -> Result<(), BridgeError> {
        drop(self.admit_tx);
        drop(self.complete_rx);
        match self.io_task.await {
            Ok(result) => result,
            Err(_) => Err(BridgeError::Closed),
        }
    }
}

impl<T> Engine<T> for RemoteEngine<T>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    fn try_admit(&mut self, request: Request<T>) -> Result<(), Request<T>> {
        use mpsc::error::TrySendError;
        match self.admit_tx.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(request)) | Err(TrySendError::Closed(request)) => {
                Err(request)
            }
        }
    }

    fn poll_completion(&mut self) -> Option<Response<T>> {
        self.complete_rx.try_recv().ok()
    }
}

async fn run_io<S, T>(
    stream: S,
    mut admit_rx: mpsc::Receiver<Request<T>>,
    complete_tx: mpsc::Sender<Response<T>>,
) -> Result<(), BridgeError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    T: Serialize + DeserializeOwned + Send + 'static,
{
    let mut framed = Framed::new(stream, FrameCodec::<EngineFrame<T>>::new());

    loop {
        tokio::select! {
            request = admit_rx.recv() => match request {
                Some(Request { tag, payload }) => {
                    framed.send(EngineFrame::Admit { tag, payload }).await?;
                }
                None => break,
            },

            frame = framed.next() => match frame {
                Some(Ok(EngineFrame::Complete { tag, payload })) => {
                    if complete_tx.send(Response { tag, payload }).await.is_err() {
                        break;
                    }
                }
                Some(Ok(EngineFrame::Admit { tag, .. })) => {
                    tracing::warn!(%tag, "Unexpected admit frame from engine side");
                }
                Some(Err(e)) => return Err(BridgeError::Io(e)),
                None => return Err(BridgeError::Closed),
            },
        }
    }

    tracing::debug!("Remote engine bridge closed");
    Ok(())
}

/// Engine-side loop: decode admits, run the stage, encode completions.
///
/// Requests run concurrently; completions go out in finish order, which the
/// scheduler side is built to accept. Returns once the scheduler side
/// closes its stream and the last in-flight request has been flushed.
pub async fn serve_engine<S, H, T>(stream: S, stage: Arc<H>) -> Result<(), BridgeError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin,
    H: Stage<T>,
    T: Serialize + DeserializeOwned + Send + 'static,
{
    let mut framed = Framed::new(stream, FrameCodec::<EngineFrame<T>>::new());
    let (done_tx, mut done_rx) = mpsc::channel::<Response<T>>(64);
    let mut in_flight: usize = 0;

    loop {
        tokio::select! {
            frame = framed.next() => match frame {
                Some(Ok(EngineFrame::Admit { tag, payload })) => {
                    tracing::trace!(%tag, "Admit frame received");
                    in_flight += 1;
                    let stage = Arc::clone(&stage);
                    let done = done_tx.clone();
                    tokio::spawn(async move {
                        let response = stage.process(Request { tag, payload }).await;
                        let _ = done.send(response).await;
                    });
                }
                Some(Ok(EngineFrame::Complete { tag, .. })) => {
                    tracing::warn!(%tag, "Unexpected complete frame from scheduler side");
                }
                Some(Err(e)) => return Err(BridgeError::Io(e)),
                None => break,
            },

            Some(response) = done_rx.recv() => {
                in_flight -= 1;
                framed
                    .send(EngineFrame::Complete {
                        tag: response.tag,
                        payload: response.payload,
                    })
                    .await?;
            }
        }
    }

    // Scheduler stopped admitting; flush whatever is still in the pipeline.
    while in_flight > 0 {
        let Some(response) = done_rx.recv().await else {
            break;
        };
        in_flight -= 1;
        framed
            .send(EngineFrame::Complete {
                tag: response.tag,
                payload: response.payload,
            })
            .await?;
    }

    tracing::debug!("Engine serve loop exiting");
    Ok(())
}
