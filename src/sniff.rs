use std::io::{self, Read};

/// gzip member header: ID1, ID2, CM (deflate).
pub const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

const PEEK_LEN: usize = GZIP_MAGIC.len();

/// A reader that replays bytes already taken off the front of `inner`
/// before continuing with the rest of the stream.
#[derive(Debug)]
pub struct Rewound<R> {
    prefix: [u8; PEEK_LEN],
    filled: usize,
    pos: usize,
    inner: R,
}

impl<R> Rewound<R> {
    /// Bytes peeked off the stream that have not been handed out yet.
    pub fn buffered(&self) -> &[u8] {
        &self.prefix[self.pos..self.filled]
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for Rewound<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.filled {
            let pending = &self.prefix[self.pos..self.filled];
            let n = pending.len().min(buf.len());
            buf[..n].copy_from_slice(&pending[..n]);
            self.pos += n;
            return Ok(n);
        }
        self.inner.read(buf)
    }
}

/// Peek at the first three bytes of `input` and check them against the gzip
/// signature.
///
/// The returned reader always yields the complete original stream, including
/// whatever was peeked. A stream shorter than the signature is an
/// `UnexpectedEof` error rather than "not gzip"; callers need to tell the two
/// apart.
pub fn sniff<R: Read>(input: R) -> (Rewound<R>, io::Result<bool>) {
    let mut reader = Rewound {
        prefix: [0; PEEK_LEN],
        filled: 0,
        pos: 0,
        inner: input,
    };

    while reader.filled < PEEK_LEN {
        match reader.inner.read(&mut reader.prefix[reader.filled..]) {
            Ok(0) => {
                let err = io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "stream ended after {} bytes, need {} to detect gzip",
                        reader.filled, PEEK_LEN
                    ),
                );
                return (reader, Err(err));
            }
            Ok(n) => reader.filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return (reader, Err(e)),
        }
    }

    let is_gzip = reader.prefix == GZIP_MAGIC;
    (reader, Ok(is_gzip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn read_all<R: Read>(mut r: R) -> Vec<u8> {
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        out
    }

    /// Hands out one byte per read call.
    struct Trickle<'a>(&'a [u8]);

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.0.is_empty() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.0[0];
            self.0 = &self.0[1..];
            Ok(1)
        }
    }

    struct Broken;

    impl Read for Broken {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away"))
        }
    }

    #[test]
    fn detects_gzip_and_replays_full_stream() {
        let body = [0x1f_u8, 0x8b, 0x08, 0x00, 0xaa, 0xbb];
        let (reader, result) = sniff(Cursor::new(body.to_vec()));
        assert!(result.unwrap());
        assert_eq!(read_all(reader), body);
    }

    #[test]
    fn plain_json_is_not_gzip() {
        let body = br#"{"a":1}"#;
        let (reader, result) = sniff(&body[..]);
        assert!(!result.unwrap());
        assert_eq!(read_all(reader), body);
    }

    #[test]
    fn partial_signature_is_not_gzip() {
        // ID1 and ID2 match but compression method is not deflate
        let body = [0x1f_u8, 0x8b, 0x07, 0x01];
        let (reader, result) = sniff(&body[..]);
        assert!(!result.unwrap());
        assert_eq!(read_all(reader), body);
    }

    #[test]
    fn short_stream_is_an_error_not_a_negative() {
        let cases: [&[u8]; 3] = [&[], &[0x1f], &[0x1f, 0x8b]];
        for body in cases {
            let (reader, result) = sniff(body);
            let err = result.unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
            assert_eq!(read_all(reader), body);
        }
    }

    #[test]
    fn short_reads_are_retried() {
        let body = [0x1f_u8, 0x8b, 0x08, 0x42];
        let (reader, result) = sniff(Trickle(&body));
        assert!(result.unwrap());
        assert_eq!(reader.buffered(), &GZIP_MAGIC);
        assert_eq!(read_all(reader), body);
    }

    #[test]
    fn read_error_is_surfaced() {
        let (_, result) = sniff(Broken);
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::ConnectionReset);
    }

    #[test]
    fn small_destination_buffers_drain_prefix_in_order() {
        let body = b"abcdef";
        let (mut reader, _) = sniff(&body[..]);
        let mut one = [0u8; 1];
        let mut out = Vec::new();
        while reader.read(&mut one).unwrap() == 1 {
            out.push(one[0]);
        }
        assert_eq!(out, body);
    }
}
