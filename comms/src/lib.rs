//! Wire protocols spoken over the pipes that connect the session coordinator,
//! its matrix workers and their row workers.

mod deserialize;
pub mod msg;
mod receiver;
pub mod report;
pub mod row;
mod sender;
mod serialize;
mod test;

use tokio::io::{AsyncRead, AsyncWrite};

pub use deserialize::Deserialize;
pub use receiver::OnoReceiver;
pub use sender::OnoSender;
pub use serialize::Serialize;

type LenType = u64;
const LEN_TYPE_SIZE: usize = size_of::<LenType>();

/// The longest payload a single frame may carry.
///
/// Job frames carry file paths, anything longer than a path can be on Linux is
/// treated as a corrupted length header.
pub const MAX_FRAME_LEN: usize = 4096;

/// Wraps the write end of a one-way pipe as an `OnoSender`.
///
/// # Arguments
/// * `tx` - An async writable, a pipe or an in-memory duplex stream.
pub fn sender<W>(tx: W) -> OnoSender<W>
where
    W: AsyncWrite + Unpin,
{
    OnoSender::new(tx)
}

/// Wraps the read end of a one-way pipe as an `OnoReceiver`.
pub fn receiver<R>(rx: R) -> OnoReceiver<R>
where
    R: AsyncRead + Unpin,
{
    OnoReceiver::new(rx)
}
