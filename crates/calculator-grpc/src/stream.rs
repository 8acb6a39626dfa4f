//! Duplex stream backed by a tonic bidirectional call.
//!
//! Outbound items go through a bounded channel whose receiving end is the
//! request stream handed to tonic; inbound items are read from the
//! response's [`Streaming`] body.

use std::fmt;

use async_trait::async_trait;
use duplex_driver::{DuplexStream, RecvHalf, SendHalf, TransportError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;
use tonic::{Status, Streaming};

use crate::proto::{
    FindMaximumRequest, FindMaximumResponse, calculator_service_client::CalculatorServiceClient,
};

/// A bidirectional gRPC call split into its request and response streams.
pub struct GrpcDuplex<Req, Resp> {
    tx: mpsc::Sender<Req>,
    rx: Streaming<Resp>,
}

impl<Req, Resp> fmt::Debug for GrpcDuplex<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcDuplex").finish_non_exhaustive()
    }
}

impl<Req, Resp> GrpcDuplex<Req, Resp> {
    /// Wrap the request channel and response stream of an issued call.
    pub fn new(tx: mpsc::Sender<Req>, rx: Streaming<Resp>) -> Self {
        Self { tx, rx }
    }
}

impl<Req, Resp> DuplexStream for GrpcDuplex<Req, Resp>
where
    Req: fmt::Debug + Send + 'static,
    Resp: fmt::Debug + Send + 'static,
{
    type Outbound = Req;
    type Inbound = Resp;
    type Sender = GrpcSender<Req>;
    type Receiver = GrpcReceiver<Resp>;

    fn split(self) -> (GrpcSender<Req>, GrpcReceiver<Resp>) {
        (GrpcSender { tx: self.tx }, GrpcReceiver { rx: self.rx })
    }
}

/// Request side of a [`GrpcDuplex`].
#[derive(Debug)]
pub struct GrpcSender<Req> {
    tx: mpsc::Sender<Req>,
}

#[async_trait]
impl<Req> SendHalf<Req> for GrpcSender<Req>
where
    Req: Send + 'static,
{
    async fn send(&mut self, item: Req) -> Result<(), TransportError> {
        // The channel only closes once tonic has dropped the request stream,
        // i.e. the call is over.
        self.tx
            .send(item)
            .await
            .map_err(|_| TransportError::Closed)
    }

    async fn close_send(self) -> Result<(), TransportError> {
        // Dropping the last sender ends the request stream.
        drop(self.tx);
        Ok(())
    }
}

/// Response side of a [`GrpcDuplex`].
pub struct GrpcReceiver<Resp> {
    rx: Streaming<Resp>,
}

impl<Resp> fmt::Debug for GrpcReceiver<Resp> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrpcReceiver").finish_non_exhaustive()
    }
}

#[async_trait]
impl<Resp> RecvHalf<Resp> for GrpcReceiver<Resp>
where
    Resp: Send + 'static,
{
    async fn receive(&mut self) -> Result<Option<Resp>, TransportError> {
        self.rx.message().await.map_err(TransportError::remote)
    }
}

/// The gRPC status carried by a transport error, if any.
pub fn status_of(err: &TransportError) -> Option<&Status> {
    err.remote_error()?.downcast_ref::<Status>()
}

/// Issue a `FindMaximum` call and return it as a duplex stream.
///
/// `buffer` bounds the number of requests queued ahead of the transport.
pub async fn open_find_maximum(
    client: &mut CalculatorServiceClient<Channel>,
    buffer: usize,
) -> Result<GrpcDuplex<FindMaximumRequest, FindMaximumResponse>, Status> {
    let (tx, rx) = mpsc::channel(buffer);

    tracing::debug!("Opening FindMaximum stream");
    let response = client.find_maximum(ReceiverStream::new(rx)).await?;

    Ok(GrpcDuplex::new(tx, response.into_inner()))
}
