/* Shared excaliburd error definitions: ExcaliburError is what every controller operation returns,
 * with an errno mapping for collaborators that follow kernel-style error conventions. */
use nix::errno::Errno;
use thiserror::Error;

use crate::driver::channel::ChannelError;

/* Errors returned by controller operations. */
#[derive(Debug, Error)]
pub enum ExcaliburError {
    /* The firmware exchange failed; nothing was cached or updated. */
    #[error("I/O error: {0}")]
    Io(#[from] ChannelError),

    /* The caller passed something the controller never sends to firmware. */
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),
}

impl ExcaliburError {
    /* The errno a kernel driver would have returned for this failure. */
    pub fn errno(&self) -> Errno {
        match self {
            ExcaliburError::Io(_) => Errno::EIO,
            ExcaliburError::InvalidArgument(_) => Errno::EINVAL,
            ExcaliburError::NotSupported(_) => Errno::EOPNOTSUPP,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::TransportError;

    #[test]
    fn test_errno_mapping() {
        let io = ExcaliburError::from(ChannelError::QueryFailed {
            sub: 0x0200,
            source: TransportError::NoData,
        });
        assert_eq!(io.errno(), Errno::EIO);
        assert_eq!(
            ExcaliburError::InvalidArgument("x".into()).errno(),
            Errno::EINVAL
        );
        assert_eq!(
            ExcaliburError::NotSupported("x".into()).errno(),
            Errno::EOPNOTSUPP
        );
    }

    #[test]
    fn test_io_message_keeps_cause() {
        let err = ExcaliburError::from(ChannelError::QueryFailed {
            sub: 0x0200,
            source: TransportError::NoData,
        });
        let msg = err.to_string();
        assert!(msg.contains("0x0200"), "{msg}");
        assert!(msg.contains("no data"), "{msg}");
    }
}
