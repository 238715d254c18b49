use std::{error, fmt, io};

// -------------------------------------------------------------------------------------------------

/// Provides an enumeration of all possible errors reported by sablier.
#[derive(Debug)]
pub enum Error {
    MediaFileNotFound,
    MediaFileProbeError,
    AudioDecodingError(Box<dyn error::Error + Send + Sync>),
    OutputDeviceError(Box<dyn error::Error + Send + Sync>),
    /// A play request was refused by the host's playback policy, e.g. because
    /// no user gesture happened yet.
    PlaybackPolicyError,
    /// The reverse sample buffer is not (or not yet) available.
    ReverseBufferUnavailable,
    IoError(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MediaFileNotFound => write!(f, "Audio file not found"),
            Self::MediaFileProbeError => write!(f, "Audio file failed to probe"),
            Self::AudioDecodingError(err) | Self::OutputDeviceError(err) => err.fmt(f),
            Self::PlaybackPolicyError => {
                write!(f, "Playback was rejected by the host's playback policy")
            }
            Self::ReverseBufferUnavailable => {
                write!(f, "Reverse sample buffer is not available")
            }
            Self::IoError(err) => err.fmt(f),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}
