use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Request;
use tempfile::tempdir;
use webgate::context::{RequestBody, RequestContext};
use webgate::middleware::{Middleware, MiddlewareChain, MiddlewareError, ChainOutcome, Next};
use webgate::security::*;

fn context(forwarded_for: Option<&str>) -> RequestContext {
    let mut builder = Request::builder().uri("/cars");
    if let Some(client) = forwarded_for {
        builder = builder.header("x-forwarded-for", client);
    }
    let body: RequestBody = Full::new(Bytes::new())
        .map_err(|never| -> hyper::Error { match never {} })
        .boxed();
    let peer: SocketAddr = "192.0.2.10:40000".parse().unwrap();
    RequestContext::new(builder.body(body).unwrap(), Some(peer))
}

// 체인 끝까지 도달했는지 기록하는 미들웨어
struct Reached;

#[async_trait]
impl Middleware for Reached {
    fn name(&self) -> &str {
        "reached"
    }

    async fn handle(&self, ctx: &mut RequestContext, next: Next<'_>) -> Result<(), MiddlewareError> {
        ctx.end("ok");
        next.run(ctx).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_blocked_client_rejected_until_window_elapses() {
    let blacklist = Blacklist::new();
    let mut offender = context(Some("203.0.113.5"));
    blacklist.block(&mut offender).await;
    assert!(offender.is_closed());

    assert!(blacklist.is_blocked("203.0.113.5").await);
    assert!(!blacklist.is_blocked("198.51.100.1").await);

    tokio::time::advance(CLEAR_WINDOW - Duration::from_secs(1)).await;
    assert!(blacklist.is_blocked("203.0.113.5").await);

    tokio::time::advance(Duration::from_secs(2)).await;
    assert!(!blacklist.is_blocked("203.0.113.5").await);
    assert!(blacklist.is_empty().await);
}

#[tokio::test]
async fn test_protect_middleware_destroys_blocked_connection() {
    let blacklist = Arc::new(Blacklist::new());
    let mut chain = MiddlewareChain::new();
    chain.add(ProtectMiddleware::new(blacklist.clone()));
    chain.add(Reached);

    let mut ctx = context(None);
    assert_eq!(chain.execute(&mut ctx).await.unwrap(), ChainOutcome::Completed);
    assert!(!ctx.is_closed());

    // 피어 주소 기준으로 차단
    blacklist.block(&mut context(None)).await;
    let mut ctx = context(None);
    assert_eq!(chain.execute(&mut ctx).await.unwrap(), ChainOutcome::Halted);
    assert!(ctx.is_closed());
    assert!(ctx.response.body.is_none());
}

#[tokio::test]
async fn test_confine_rejects_traversal() {
    let dir = tempdir().unwrap();
    let confinement = PathConfinement::new(dir.path().join("public"), dir.path().join("app"), false);

    assert_eq!(confinement.confine("/../secret.txt").await, NOT_FOUND_PAGE);
    assert_eq!(confinement.confine("/a/%2e%2e/%2e%2e/etc/passwd").await, NOT_FOUND_PAGE);
    assert_eq!(confinement.confine("/a/./b/../c").await, "/a/c");
    assert_eq!(confinement.confine("/docs/").await, "/docs/");
}

#[cfg(unix)]
#[tokio::test]
async fn test_confine_rejects_symlink_escape() {
    let dir = tempdir().unwrap();
    let outside = tempdir().unwrap();
    fs::write(outside.path().join("secret.txt"), "secret").unwrap();

    let public = dir.path().join("public");
    fs::create_dir(&public).unwrap();
    std::os::unix::fs::symlink(outside.path(), public.join("leak")).unwrap();
    fs::write(public.join("ok.txt"), "ok").unwrap();

    let strict = PathConfinement::new(&public, dir.path().join("app"), false);
    assert_eq!(strict.confine("/leak/secret.txt").await, NOT_FOUND_PAGE);
    assert_eq!(strict.confine("/ok.txt").await, "/ok.txt");

    let relaxed = PathConfinement::new(&public, dir.path().join("app"), true);
    assert_eq!(relaxed.confine("/leak/secret.txt").await, "/leak/secret.txt");
}

#[test]
fn test_purify_keeps_handler_status() {
    let purified = purify("boom", Some(hyper::StatusCode::NOT_FOUND));
    assert_eq!(purified.status, hyper::StatusCode::NOT_FOUND);
    assert_eq!(purified.message, "Not Found");
}
