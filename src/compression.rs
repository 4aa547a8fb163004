use flate2::read::{MultiGzDecoder, ZlibDecoder};
use std::io::{self, BufRead, BufReader, Read};

/// Compression schemes recognized in a `Content-Encoding` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentEncoding {
    Gzip,
    /// `deflate` and `zlib` both mean a zlib-wrapped deflate stream.
    Zlib,
}

impl ContentEncoding {
    /// Parse a `Content-Encoding` value. Returns `None` for `identity`, unknown
    /// codings and anything else that should pass through untouched.
    pub fn from_header(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("gzip") {
            Some(ContentEncoding::Gzip)
        } else if value.eq_ignore_ascii_case("deflate") || value.eq_ignore_ascii_case("zlib") {
            Some(ContentEncoding::Zlib)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentEncoding::Gzip => "gzip",
            ContentEncoding::Zlib => "zlib",
        }
    }
}

/// A decompressing reader over one of the supported framings. Gzip input may
/// hold several members back to back; all of them are inflated.
pub enum Decompressor<R: Read> {
    Gzip(MultiGzDecoder<R>),
    Zlib(ZlibDecoder<R>),
}

impl<R: Read> Read for Decompressor<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Decompressor::Gzip(d) => d.read(buf),
            Decompressor::Zlib(d) => d.read(buf),
        }
    }
}

/// Open a decompression stream over `reader`.
///
/// The stream header is parsed (and the first block inflated) before this
/// returns, so a malformed header is reported here instead of on some later
/// read. Inflated bytes stay buffered in the returned reader.
pub fn open<R: Read>(
    encoding: ContentEncoding,
    reader: R,
) -> io::Result<BufReader<Decompressor<R>>> {
    let decompressor = match encoding {
        ContentEncoding::Gzip => Decompressor::Gzip(MultiGzDecoder::new(reader)),
        ContentEncoding::Zlib => Decompressor::Zlib(ZlibDecoder::new(reader)),
    };
    let mut stream = BufReader::new(decompressor);
    stream.fill_buf()?;
    Ok(stream)
}

#[cfg(test)]
pub(crate) fn gzip(data: &[u8]) -> Vec<u8> {
    use flate2::{write::GzEncoder, Compression};
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[cfg(test)]
pub(crate) fn zlib(data: &[u8]) -> Vec<u8> {
    use flate2::{write::ZlibEncoder, Compression};
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
