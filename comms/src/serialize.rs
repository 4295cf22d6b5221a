use std::io;

/// Serializes a message into a frame body.
pub trait Serialize {
    /// Writes the owned part of the message into `buf`.
    ///
    /// # Returns
    /// An optional borrowed tail that is written right after `buf` without copying,
    /// or an io error if the message can't be framed.
    fn serialize<'a>(&'a self, buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>>;
}
