//! RTP framing and encryption of outgoing audio.

use byteorder::{BigEndian, ByteOrder};
use xsalsa20poly1305::aead::Aead;
use xsalsa20poly1305::{XSalsa20Poly1305, NONCE_SIZE};

use crate::voice::constants::{MONO_FRAME_SIZE, RTP_HEADER_LEN};
use crate::voice::error::VoiceError;

/// Builds and seals the RTP packets carrying Opus audio over UDP.
///
/// The sequence number and timestamp advance only after a packet has been sealed, so a failed
/// encryption never burns a counter value.
pub struct Packetizer {
    cipher: XSalsa20Poly1305,
    ssrc: u32,
    sequence: u16,
    timestamp: u32,
}

impl Packetizer {
    pub fn new(cipher: XSalsa20Poly1305, ssrc: u32) -> Self {
        Self {
            cipher,
            ssrc,
            sequence: 0,
            timestamp: 0,
        }
    }

    /// Encrypts one Opus frame into a complete voice packet: the 12-byte RTP header followed
    /// by the sealed payload.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Encryption`] if sealing fails.
    pub fn seal(&mut self, opus_frame: &[u8]) -> Result<Vec<u8>, VoiceError> {
        let header = self.rtp_header();

        // The nonce is the RTP header padded with zeroes to the cipher's nonce length.
        let mut nonce = [0u8; NONCE_SIZE];
        nonce[..RTP_HEADER_LEN].copy_from_slice(&header);

        let sealed = self
            .cipher
            .encrypt(&nonce.into(), opus_frame)
            .map_err(|_| VoiceError::Encryption)?;

        let mut packet = Vec::with_capacity(RTP_HEADER_LEN + sealed.len());
        packet.extend_from_slice(&header);
        packet.extend_from_slice(&sealed);

        self.advance();

        Ok(packet)
    }

    fn rtp_header(&self) -> [u8; RTP_HEADER_LEN] {
        let mut header = [0u8; RTP_HEADER_LEN];
        header[0] = 0x80;
        header[1] = 0x78;
        BigEndian::write_u16(&mut header[2..4], self.sequence);
        BigEndian::write_u32(&mut header[4..8], self.timestamp);
        BigEndian::write_u32(&mut header[8..12], self.ssrc);

        header
    }

    fn advance(&mut self) {
        self.sequence = self.sequence.checked_add(1).unwrap_or(0);
        self.timestamp = self.timestamp.checked_add(MONO_FRAME_SIZE as u32).unwrap_or(0);
    }
}

#[cfg(test)]
mod tests {
    use xsalsa20poly1305::aead::KeyInit;

    use super::*;

    fn packetizer(ssrc: u32) -> Packetizer {
        let cipher = XSalsa20Poly1305::new_from_slice(&[7u8; 32]).unwrap();

        Packetizer::new(cipher, ssrc)
    }

    #[test]
    fn header_layout() {
        let mut packetizer = packetizer(0xDEAD_BEEF);
        packetizer.sequence = 0x0102;
        packetizer.timestamp = 0x0304_0506;

        let header = packetizer.rtp_header();

        assert_eq!(header[0], 0x80);
        assert_eq!(header[1], 0x78);
        assert_eq!(&header[2..4], &[0x01, 0x02]);
        assert_eq!(&header[4..8], &[0x03, 0x04, 0x05, 0x06]);
        assert_eq!(&header[8..12], &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn sealed_packet_carries_header_and_tag() {
        let mut packetizer = packetizer(1);
        let frame = [0u8; 100];

        let packet = packetizer.seal(&frame).unwrap();

        // Poly1305 appends a 16-byte tag.
        assert_eq!(packet.len(), RTP_HEADER_LEN + frame.len() + 16);
        assert_eq!(packet[0], 0x80);
        assert_eq!(packet[1], 0x78);
    }

    #[test]
    fn sealed_packet_decrypts_with_header_nonce() {
        let mut packetizer = packetizer(42);
        let frame = b"not really opus";

        let packet = packetizer.seal(frame).unwrap();

        let cipher = XSalsa20Poly1305::new_from_slice(&[7u8; 32]).unwrap();
        let mut nonce = [0u8; NONCE_SIZE];
        nonce[..RTP_HEADER_LEN].copy_from_slice(&packet[..RTP_HEADER_LEN]);

        let opened = cipher.decrypt(&nonce.into(), &packet[RTP_HEADER_LEN..]).unwrap();
        assert_eq!(opened, frame);
    }

    #[test]
    fn counters_advance_per_packet() {
        let mut packetizer = packetizer(1);

        packetizer.seal(&[0u8; 10]).unwrap();
        packetizer.seal(&[0u8; 10]).unwrap();

        assert_eq!(packetizer.sequence, 2);
        assert_eq!(packetizer.timestamp, 2 * MONO_FRAME_SIZE as u32);
    }

    #[test]
    fn sequence_resets_to_zero_after_max() {
        let mut packetizer = packetizer(1);
        packetizer.sequence = u16::MAX;

        packetizer.seal(&[0u8; 10]).unwrap();

        assert_eq!(packetizer.sequence, 0);
    }

    #[test]
    fn timestamp_resets_to_zero_on_overflow() {
        let mut packetizer = packetizer(1);
        packetizer.timestamp = u32::MAX - 100;

        packetizer.seal(&[0u8; 10]).unwrap();

        assert_eq!(packetizer.timestamp, 0);
    }
}
