//! Client for `echoserver.Echoserver`.

use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{IntoRequest, Response, Status};

use crate::grpc::proto::{
    EchoRequest, EchoResponse, RequestRequest, RequestResponse, StatusRequest, StatusResponse,
};

#[derive(Debug, Clone)]
pub struct EchoserverClient {
    inner: tonic::client::Grpc<Channel>,
}

impl EchoserverClient {
    pub async fn connect(dst: impl Into<String>) -> Result<Self, tonic::transport::Error> {
        let channel = Endpoint::from_shared(dst.into())?.connect().await?;
        Ok(Self::new(channel))
    }

    pub fn new(channel: Channel) -> Self {
        Self {
            inner: tonic::client::Grpc::new(channel),
        }
    }

    pub async fn echo(
        &mut self,
        request: impl IntoRequest<EchoRequest>,
    ) -> Result<Response<EchoResponse>, Status> {
        self.ready().await?;
        let path = PathAndQuery::from_static("/echoserver.Echoserver/Echo");
        self.inner
            .unary(request.into_request(), path, ProstCodec::default())
            .await
    }

    pub async fn status(
        &mut self,
        request: impl IntoRequest<StatusRequest>,
    ) -> Result<Response<StatusResponse>, Status> {
        self.ready().await?;
        let path = PathAndQuery::from_static("/echoserver.Echoserver/Status");
        self.inner
            .unary(request.into_request(), path, ProstCodec::default())
            .await
    }

    pub async fn request(
        &mut self,
        request: impl IntoRequest<RequestRequest>,
    ) -> Result<Response<RequestResponse>, Status> {
        self.ready().await?;
        let path = PathAndQuery::from_static("/echoserver.Echoserver/Request");
        self.inner
            .unary(request.into_request(), path, ProstCodec::default())
            .await
    }

    async fn ready(&mut self) -> Result<(), Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::unavailable(format!("service was not ready: {e}")))
    }
}
