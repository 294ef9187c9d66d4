//! 핸들러 반환 값을 응답 본문으로 변환

use std::io;
use futures_util::{stream, StreamExt, TryStreamExt};
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use hyper::header::{self, HeaderValue};
use hyper::StatusCode;
use tracing::warn;
use url::form_urlencoded;

use crate::context::{self, RequestContext, ResponseBody};
use crate::handler::{HandlerError, HandlerOutput};
use crate::routing::Params;

pub const JSON_UTF8: &str = "application/json; charset=utf-8";
pub const TEXT_UTF8: &str = "text/plain; charset=utf-8";

/// 라우트 파라미터에 쿼리 문자열을 합칩니다.
///
/// 이미 있는 이름(경로 파라미터)은 쿼리 문자열이 덮어쓰지 않습니다.
pub fn merge_query(params: Option<Params>, query: Option<&str>) -> Option<Params> {
    let Some(query) = query.filter(|q| !q.is_empty()) else {
        return params;
    };

    let mut merged = params.unwrap_or_default();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        merged.entry(key.into_owned()).or_insert_with(|| value.into_owned());
    }

    if merged.is_empty() { None } else { Some(merged) }
}

/// 핸들러 출력을 응답 본문으로 만들고 필요한 Content-Type을 설정합니다.
///
/// 스트림이 첫 청크 전에 실패하면 상태를 500(핸들러가 400 이상을 설정했다면 그 값)으로
/// 바꾸고 응답 후 연결을 닫습니다. 전송 중 실패는 연결을 중단시킵니다.
pub async fn render(
    ctx: &mut RequestContext,
    output: HandlerOutput,
    performance: bool,
) -> Result<ResponseBody, HandlerError> {
    match output {
        HandlerOutput::Stream(mut chunks) => match chunks.next().await {
            None => Ok(context::empty()),
            Some(Ok(first)) => {
                let rest = chunks.map_ok(Frame::data);
                let body = stream::iter([Ok::<_, io::Error>(Frame::data(first))]).chain(rest);
                Ok(StreamBody::new(body).boxed_unsync())
            }
            Some(Err(e)) => {
                warn!(request_id = %ctx.request_id, error = %e, "핸들러 스트림이 첫 데이터 전에 실패");
                let handler_status = ctx.response.status.filter(|s| s.as_u16() >= 400);
                ctx.set_status(handler_status.unwrap_or(StatusCode::INTERNAL_SERVER_ERROR));
                ctx.set_header(header::CONNECTION, HeaderValue::from_static("close"));
                Ok(context::empty())
            }
        },
        HandlerOutput::Json(_) => {
            if !ctx.response.has_content_type() {
                ctx.set_header(header::CONTENT_TYPE, HeaderValue::from_static(JSON_UTF8));
            }
            Ok(context::full(output.to_bytes()?))
        }
        other => {
            if !performance && !ctx.response.has_content_type() {
                ctx.set_header(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_UTF8));
            }
            Ok(context::full(other.to_bytes()?))
        }
    }
}
