use std::net::SocketAddr;
use std::sync::Arc;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use tracing::debug;

use crate::dispatch::Dispatcher;

/// 연결 하나를 hyper HTTP/1 서비스로 처리합니다.
///
/// 디스패처가 `Err`를 반환하면 hyper가 응답 없이 연결을 끊습니다.
#[derive(Clone)]
pub struct ConnectionHandler {
    dispatcher: Arc<Dispatcher>,
}

impl ConnectionHandler {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self { dispatcher }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub async fn handle_connection<I>(&self, io: I, peer: SocketAddr) -> Result<(), hyper::Error>
    where
        I: hyper::rt::Read + hyper::rt::Write + Send + Unpin + 'static,
    {
        let dispatcher = self.dispatcher.clone();
        let service = service_fn(move |req: Request<Incoming>| {
            let dispatcher = dispatcher.clone();
            async move { dispatcher.dispatch(req, Some(peer)).await }
        });

        let result = http1::Builder::new()
            .serve_connection(io, service)
            .await;
        if let Err(e) = &result {
            debug!(peer = %peer, error = %e, "연결 종료");
        }
        result
    }
}
