use std::{ffi::OsStr, io, os::unix::ffi::OsStrExt, path::Path};

use crate::{Deserialize, Serialize};

/// The job stream message sent by the coordinator to every matrix worker.
///
/// On the wire a `Job` is its path bytes behind the length header, and
/// `EndOfSession` is a frame whose length is zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Msg<'a> {
    /// Multiply the left matrix stored at this path against the bound weight.
    Job(&'a Path),
    /// No more jobs will follow, the worker must stop reading.
    EndOfSession,
}

impl Msg<'_> {
    /// Returns a short name for the message kind, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Msg::Job(_) => "job",
            Msg::EndOfSession => "end_of_session",
        }
    }
}

impl Serialize for Msg<'_> {
    fn serialize<'a>(&'a self, _buf: &mut Vec<u8>) -> io::Result<Option<&'a [u8]>> {
        match self {
            Msg::Job(path) => {
                let bytes = path.as_os_str().as_bytes();

                if bytes.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "an empty path would be read as the end of session marker",
                    ));
                }

                Ok(Some(bytes))
            }
            Msg::EndOfSession => Ok(None),
        }
    }
}

impl<'a> Deserialize<'a> for Msg<'a> {
    fn deserialize(buf: &'a [u8]) -> io::Result<Self> {
        if buf.is_empty() {
            return Ok(Msg::EndOfSession);
        }

        if buf.contains(&0) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "job path contains a NUL byte",
            ));
        }

        Ok(Msg::Job(Path::new(OsStr::from_bytes(buf))))
    }
}
