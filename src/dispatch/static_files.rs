//! 정적 파일 탐색과 스트리밍

use std::io;
use std::path::{Path, PathBuf};
use bytes::BytesMut;
use futures_util::stream;
use http_body_util::{BodyExt, StreamBody};
use hyper::body::Frame;
use hyper::header::{self, HeaderValue};
use hyper::Response;
use percent_encoding::percent_decode_str;
use tokio::fs::{self, File};
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::context::{RequestContext, ResponseBody};

/// 파일을 읽을 때 한 번에 읽는 크기
const CHUNK_SIZE: usize = 64 * 1024;

/// 요청 경로에 대한 정적 파일 탐색 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Located {
    File(PathBuf),
    /// 끝에 '/'가 없는 디렉토리 요청
    Redirect,
    Missing,
}

#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
    welcome_page: String,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>, welcome_page: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            welcome_page: welcome_page.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 정확한 경로, `경로.html`, 디렉토리의 welcome 파일 순서로 찾습니다.
    pub async fn locate(&self, path: &str) -> Located {
        let decoded = percent_decode_str(path).decode_utf8_lossy();
        let relative = decoded.trim_start_matches('/');
        let candidate = self.root.join(relative);

        let metadata = fs::metadata(&candidate).await.ok();
        if metadata.as_ref().map_or(false, |m| m.is_file()) {
            return Located::File(candidate);
        }

        if !path.ends_with('/') && !relative.is_empty() {
            let html = self.root.join(format!("{}.html", relative));
            if is_file(&html).await {
                return Located::File(html);
            }
        }

        if metadata.map_or(false, |m| m.is_dir()) {
            if !path.ends_with('/') {
                return Located::Redirect;
            }
            let welcome = candidate.join(&self.welcome_page);
            if is_file(&welcome).await {
                return Located::File(welcome);
            }
        }

        Located::Missing
    }

    /// 파일을 스트리밍 응답으로 만듭니다. 상태 코드와 헤더는 컨텍스트의 응답 상태를 따릅니다.
    pub async fn serve(&self, ctx: &mut RequestContext, file_path: &Path) -> io::Result<Response<ResponseBody>> {
        let file = File::open(file_path).await?;
        let length = file.metadata().await?.len();
        debug!(request_id = %ctx.request_id, file = %file_path.display(), length, "정적 파일 전송");

        let mime = mime_guess::from_path(file_path).first_or_octet_stream();
        if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
            ctx.response.headers.insert(header::CONTENT_TYPE, value);
        }
        ctx.response.headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));

        Ok(ctx.build_response(file_body(file)))
    }
}

async fn is_file(path: &Path) -> bool {
    fs::metadata(path).await.map_or(false, |m| m.is_file())
}

/// 파일 내용을 청크 단위로 읽는 응답 본문
fn file_body(file: File) -> ResponseBody {
    let chunks = stream::try_unfold(file, |mut file| async move {
        let mut buffer = BytesMut::with_capacity(CHUNK_SIZE);
        let read = file.read_buf(&mut buffer).await?;
        let next = (read > 0).then(|| (Frame::data(buffer.freeze()), file));
        Ok::<_, io::Error>(next)
    });
    StreamBody::new(chunks).boxed_unsync()
}
