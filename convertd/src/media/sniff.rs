//! Magic-byte media classification.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Header size sufficient for every matcher the sniffer consults.
const HEAD_SIZE: usize = 261;

/// Classification verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
    Other,
}

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("cannot open '{path}' for classification: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("short read on '{path}': {got} header bytes, no match")]
    ShortRead { path: PathBuf, got: usize },
}

/// Classify a file by its leading magic bytes.
///
/// Reads up to [`HEAD_SIZE`] bytes. A partial header is still classified;
/// [`ClassifyError::ShortRead`] is returned only when the file is shorter
/// than the header AND no decision could be reached on what was read.
pub fn classify(path: &Path) -> Result<MediaKind, ClassifyError> {
    let mut file = File::open(path).map_err(|source| ClassifyError::Unreadable {
        path: path.to_path_buf(),
        source,
    })?;

    let mut head = [0u8; HEAD_SIZE];
    let mut got = 0;
    loop {
        match file.read(&mut head[got..]) {
            Ok(0) => break,
            Ok(n) => {
                got += n;
                if got == HEAD_SIZE {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(ClassifyError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                });
            }
        }
    }
    drop(file);

    let head = &head[..got];
    if infer::is_image(head) {
        Ok(MediaKind::Image)
    } else if infer::is_video(head) {
        Ok(MediaKind::Video)
    } else if got < HEAD_SIZE {
        Err(ClassifyError::ShortRead {
            path: path.to_path_buf(),
            got,
        })
    } else {
        Ok(MediaKind::Other)
    }
}
