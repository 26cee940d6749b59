//! Audio sources: where the frames fed to an [`AudioPlayer`] come from.
//!
//! [`AudioPlayer`]: crate::voice::AudioPlayer

pub mod ogg;

use std::path::Path;
use std::process::Command;

use tracing::debug;

use crate::internal::prelude::*;
use crate::voice::constants::PCM_FRAME_LEN;

/// A source of audio frames for a voice connection.
///
/// Implementations hand out one frame per call: 20ms of raw 16-bit stereo PCM at 48kHz, or a
/// single pre-encoded Opus packet. An empty frame signals the end of the source.
pub trait AudioSource: Send {
    /// Reads the next frame. Empty means the source is exhausted.
    fn read_frame(&mut self) -> Vec<u8>;

    /// Whether frames from this source are already Opus-encoded.
    fn is_opus(&self) -> bool;
}

/// An in-memory source of raw PCM, handed out in 20ms frames.
pub struct MemorySource {
    data: Vec<u8>,
    pos: usize,
}

impl MemorySource {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
        }
    }
}

impl AudioSource for MemorySource {
    fn read_frame(&mut self) -> Vec<u8> {
        if self.pos >= self.data.len() {
            return Vec::new();
        }

        let end = (self.pos + PCM_FRAME_LEN).min(self.data.len());
        let mut frame = self.data[self.pos..end].to_vec();
        self.pos = end;

        // Pad a short final frame with silence to keep it a whole 20ms.
        frame.resize(PCM_FRAME_LEN, 0);

        frame
    }

    fn is_opus(&self) -> bool {
        false
    }
}

/// A source of pre-encoded Opus packets demuxed from an Ogg stream.
pub struct OpusSource {
    packets: std::vec::IntoIter<Vec<u8>>,
}

impl OpusSource {
    /// Demuxes the given Ogg data, skipping the `OpusHead` and `OpusTags` header packets.
    #[must_use]
    pub fn new(data: &[u8]) -> Self {
        let packets: Vec<Vec<u8>> = ogg::packets(data)
            .into_iter()
            .filter(|packet| {
                !packet.starts_with(b"OpusHead") && !packet.starts_with(b"OpusTags")
            })
            .collect();

        debug!("Demuxed {} opus packets", packets.len());

        Self {
            packets: packets.into_iter(),
        }
    }
}

impl AudioSource for OpusSource {
    fn read_frame(&mut self) -> Vec<u8> {
        self.packets.next().unwrap_or_default()
    }

    fn is_opus(&self) -> bool {
        true
    }
}

/// Creates a source over raw 16-bit stereo PCM at 48kHz.
#[must_use]
pub fn pcm(data: Vec<u8>) -> Box<dyn AudioSource> {
    Box::new(MemorySource::new(data))
}

/// Creates a source over an Ogg Opus stream.
#[must_use]
pub fn opus(data: &[u8]) -> Box<dyn AudioSource> {
    Box::new(OpusSource::new(data))
}

/// Transcodes any file ffmpeg can read into a PCM source.
///
/// # Errors
///
/// Returns an IO error if `ffmpeg` is not on the path or exits unsuccessfully.
pub fn ffmpeg<P: AsRef<Path>>(path: P) -> Result<Box<dyn AudioSource>> {
    let output = Command::new("ffmpeg")
        .arg("-i")
        .arg(path.as_ref())
        .args(["-f", "s16le", "-ar", "48000", "-ac", "2", "-loglevel", "quiet", "pipe:1"])
        .output()?;

    if !output.status.success() {
        return Err(Error::Io(std::io::Error::other("ffmpeg exited unsuccessfully")));
    }

    Ok(pcm(output.stdout))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_source_pads_final_frame() {
        let mut source = MemorySource::new(vec![1u8; PCM_FRAME_LEN + 100]);

        let first = source.read_frame();
        assert_eq!(first.len(), PCM_FRAME_LEN);
        assert!(first.iter().all(|&b| b == 1));

        let second = source.read_frame();
        assert_eq!(second.len(), PCM_FRAME_LEN);
        assert!(second[..100].iter().all(|&b| b == 1));
        assert!(second[100..].iter().all(|&b| b == 0));

        assert!(source.read_frame().is_empty());
    }

    #[test]
    fn memory_source_is_not_opus() {
        assert!(!MemorySource::new(Vec::new()).is_opus());
    }

    #[test]
    fn opus_source_skips_header_packets() {
        let mut data = Vec::new();
        for body in [&b"OpusHead\x01\x02"[..], &b"OpusTagslibopus"[..], &b"\xfc\xff\xfeactual"[..]] {
            let mut page = Vec::new();
            page.extend_from_slice(b"OggS");
            page.extend_from_slice(&[0; 22]);
            page.push(1);
            page.push(body.len() as u8);
            page.extend_from_slice(body);
            data.extend_from_slice(&page);
        }

        let mut source = OpusSource::new(&data);

        assert!(source.is_opus());
        assert_eq!(source.read_frame(), b"\xfc\xff\xfeactual");
        assert!(source.read_frame().is_empty());
    }
}
