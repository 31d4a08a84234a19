//! Wire codec shared by all three parties.
//!
//! Every message is built from two primitives: a ring element carried as a
//! little-endian u64 with zero high bits, and a little-endian two's
//! complement i64 used by the share-conversion exchange. Vectors are sent
//! element by element with their length known to both sides in advance.

mod networking;

pub use networking::*;

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::fields::RingElem;

/// Send one ring element.
pub async fn send_elem<S>(stream: &mut S, value: RingElem) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_u64_le(value.to_u64()).await
}

/// Receive one ring element.
pub async fn recv_elem<S>(stream: &mut S) -> io::Result<RingElem>
where
    S: AsyncRead + Unpin,
{
    Ok(RingElem::new(stream.read_u64_le().await?))
}

/// Send one signed 64-bit integer.
pub async fn send_int64<S>(stream: &mut S, value: i64) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_i64_le(value).await
}

/// Receive one signed 64-bit integer.
pub async fn recv_int64<S>(stream: &mut S) -> io::Result<i64>
where
    S: AsyncRead + Unpin,
{
    stream.read_i64_le().await
}

/// Send a vector of ring elements.
pub async fn send_vector<S>(stream: &mut S, values: &[RingElem]) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    for &value in values {
        send_elem(stream, value).await?;
    }
    Ok(())
}

/// Receive `len` ring elements.
pub async fn recv_vector<S>(stream: &mut S, len: usize) -> io::Result<Vec<RingElem>>
where
    S: AsyncRead + Unpin,
{
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        values.push(recv_elem(stream).await?);
    }
    Ok(values)
}
