use hyper::header::{self, HeaderValue};
use hyper::Response;
use tracing::debug;

use super::render::{self, TEXT_UTF8};
use super::{DispatchResult, Dispatcher, Located};
use crate::context::{self, RequestContext, ResponseBody, ResponseState};
use crate::handler::Handler;
use crate::security::Purified;

/// 마지막 수단으로 쓰이는 기본 에러 페이지. 상태 코드의 사유 문구만 담습니다.
pub fn default_error_page(purified: Purified) -> Response<ResponseBody> {
    let mut response = Response::new(context::full(purified.message));
    *response.status_mut() = purified.status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(TEXT_UTF8));
    response
}

impl Dispatcher {
    /// 상태 코드 N에 대한 에러 페이지 `/N`을 찾습니다.
    ///
    /// 동적 핸들러(GET 호출), 정적 파일, 기본 페이지 순서이며
    /// 응답 상태는 항상 정제된 상태 코드입니다.
    pub(super) async fn error_page(&self, ctx: &mut RequestContext, purified: Purified) -> DispatchResult {
        let page = format!("/{}", purified.status.as_u16());
        ctx.response = ResponseState::default();
        ctx.set_status(purified.status);

        if let Some(handler) = self.handlers.get(&page) {
            debug!(request_id = %ctx.request_id, page = %page, "동적 에러 페이지");
            let output = handler.get(ctx, None).await?;
            let body = render::render(ctx, output, self.performance).await?;
            ctx.set_status(purified.status);
            return Ok(ctx.build_response(body));
        }

        if let Located::File(file) = self.files.locate(&page).await {
            debug!(request_id = %ctx.request_id, page = %page, "정적 에러 페이지");
            return Ok(self.files.serve(ctx, &file).await?);
        }

        Ok(default_error_page(purified))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use hyper::StatusCode;

    #[tokio::test]
    async fn test_default_page_hides_details() {
        let response = default_error_page(Purified::from_status(StatusCode::NOT_FOUND));
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()[header::CONTENT_TYPE], TEXT_UTF8);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "Not Found");
    }
}
