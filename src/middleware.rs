use async_compression::tokio::bufread::{GzipDecoder, ZlibDecoder};
use axum::{
    body::Body,
    extract::Request,
    http::{
        header::{CONTENT_ENCODING, CONTENT_LENGTH},
        StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::TryStreamExt;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, warn};

use crate::compression::ContentEncoding;

type Inflater = BufReader<Box<dyn AsyncRead + Send + Unpin>>;

/// Decompress request bodies according to their `Content-Encoding` header.
///
/// `gzip` and `deflate`/`zlib` bodies are swapped for an inflating body and the
/// header is removed, so nothing further down the chain inflates them a second
/// time. The request body is inflated as it streams in; only enough of it is
/// read up front to parse the compression header and produce the first block.
/// A body whose header does not parse is answered with `400 Bad Request` and
/// the next handler is never called. Other encodings, or no header at all,
/// pass through untouched.
pub async fn decompress_request(request: Request, next: Next) -> Response {
    let encoding = request
        .headers()
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .and_then(ContentEncoding::from_header);
    let Some(encoding) = encoding else {
        return next.run(request).await;
    };

    let (mut parts, body) = request.into_parts();

    let mut inflater = open_inflater(encoding, body);
    if let Err(e) = inflater.fill_buf().await {
        warn!(error = %e, encoding = encoding.as_str(), "rejecting request with bad compressed body");
        return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
    }
    debug!(encoding = encoding.as_str(), "inflating request body");

    // The length described the compressed bytes.
    parts.headers.remove(CONTENT_ENCODING);
    parts.headers.remove(CONTENT_LENGTH);

    // The inflater is dropped with the body, whichever way the handler finishes.
    let body = Body::from_stream(ReaderStream::new(inflater));
    next.run(Request::from_parts(parts, body)).await
}

/// Inflating reader over the incoming body stream. Gzip input may hold several
/// members back to back; all of them are inflated.
fn open_inflater(encoding: ContentEncoding, body: Body) -> Inflater {
    let compressed = StreamReader::new(body.into_data_stream().map_err(io::Error::other));
    let decoder: Box<dyn AsyncRead + Send + Unpin> = match encoding {
        ContentEncoding::Gzip => {
            let mut decoder = GzipDecoder::new(compressed);
            decoder.multiple_members(true);
            Box::new(decoder)
        }
        ContentEncoding::Zlib => Box::new(ZlibDecoder::new(compressed)),
    };
    BufReader::new(decoder)
}
