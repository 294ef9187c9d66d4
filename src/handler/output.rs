use std::fmt;
use std::io;
use std::pin::Pin;
use bytes::Bytes;
use futures_util::Stream;
use serde::Serialize;

use super::HandlerError;

/// 핸들러가 반환하는 바이트 스트림
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, io::Error>> + Send>>;

/// 핸들러 반환 값
///
/// 스트림은 그대로 응답 본문으로 전달되고, 나머지는 텍스트로 변환됩니다.
pub enum HandlerOutput {
    /// 빈 본문
    Empty,
    Text(String),
    /// JSON으로 직렬화되는 구조화된 값
    Json(serde_json::Value),
    Number(f64),
    Stream(ByteStream),
}

impl HandlerOutput {
    pub fn json<T: Serialize>(value: &T) -> Result<Self, HandlerError> {
        Ok(HandlerOutput::Json(serde_json::to_value(value)?))
    }

    pub fn stream<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, io::Error>> + Send + 'static,
    {
        HandlerOutput::Stream(Box::pin(stream))
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, HandlerOutput::Stream(_))
    }

    /// 스트림이 아닌 출력의 본문 바이트를 만듭니다.
    pub fn to_bytes(&self) -> Result<Bytes, HandlerError> {
        Ok(match self {
            HandlerOutput::Empty | HandlerOutput::Stream(_) => Bytes::new(),
            HandlerOutput::Text(text) => Bytes::from(text.clone()),
            HandlerOutput::Json(value) => Bytes::from(serde_json::to_vec(value)?),
            HandlerOutput::Number(n) => Bytes::from(n.to_string()),
        })
    }
}

impl fmt::Debug for HandlerOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandlerOutput::Empty => write!(f, "Empty"),
            HandlerOutput::Text(text) => f.debug_tuple("Text").field(text).finish(),
            HandlerOutput::Json(value) => f.debug_tuple("Json").field(value).finish(),
            HandlerOutput::Number(n) => f.debug_tuple("Number").field(n).finish(),
            HandlerOutput::Stream(_) => write!(f, "Stream(..)"),
        }
    }
}

impl From<()> for HandlerOutput {
    fn from(_: ()) -> Self {
        HandlerOutput::Empty
    }
}

impl From<String> for HandlerOutput {
    fn from(text: String) -> Self {
        HandlerOutput::Text(text)
    }
}

impl From<&str> for HandlerOutput {
    fn from(text: &str) -> Self {
        HandlerOutput::Text(text.to_string())
    }
}

impl From<serde_json::Value> for HandlerOutput {
    fn from(value: serde_json::Value) -> Self {
        HandlerOutput::Json(value)
    }
}

impl From<f64> for HandlerOutput {
    fn from(n: f64) -> Self {
        HandlerOutput::Number(n)
    }
}

impl From<i32> for HandlerOutput {
    fn from(n: i32) -> Self {
        HandlerOutput::Number(f64::from(n))
    }
}

impl<T: Into<HandlerOutput>> From<Option<T>> for HandlerOutput {
    fn from(value: Option<T>) -> Self {
        value.map_or(HandlerOutput::Empty, Into::into)
    }
}
