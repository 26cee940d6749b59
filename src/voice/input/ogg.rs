//! A small Ogg demuxer, just enough to pull Opus packets out of an `.ogg`/`.opus` file.
//!
//! An Ogg page starts with the `OggS` capture pattern and a 23-byte header whose last byte is
//! the segment count. Each segment in the following lacing table is at most 255 bytes; a
//! packet is the concatenation of segments up to and including the first one shorter than
//! 255, and may continue onto the next page.

use tracing::warn;

const CAPTURE_PATTERN: &[u8; 4] = b"OggS";
const PAGE_HEADER_REMAINDER: usize = 23;
const SEGMENT_COUNT_OFFSET: usize = 22;

struct Page<'a> {
    segment_table: &'a [u8],
    body: &'a [u8],
}

/// Reads one page at `data[*pos..]`, advancing `pos` past it.
///
/// Returns `None` at end of input, or on a malformed page, in which case a warning is logged
/// and demuxing stops.
fn read_page<'a>(data: &'a [u8], pos: &mut usize) -> Option<Page<'a>> {
    let rest = &data[*pos..];
    if rest.is_empty() {
        return None;
    }

    if rest.len() < 4 + PAGE_HEADER_REMAINDER || &rest[..4] != CAPTURE_PATTERN {
        warn!("Expected OggS capture pattern at offset {}", *pos);

        return None;
    }

    let header = &rest[4..4 + PAGE_HEADER_REMAINDER];
    let segment_count = header[SEGMENT_COUNT_OFFSET] as usize;

    let table_start = 4 + PAGE_HEADER_REMAINDER;
    let body_start = table_start + segment_count;
    if rest.len() < body_start {
        warn!("Truncated Ogg segment table at offset {}", *pos);

        return None;
    }

    let segment_table = &rest[table_start..body_start];
    let body_len: usize = segment_table.iter().map(|&len| len as usize).sum();
    if rest.len() < body_start + body_len {
        warn!("Truncated Ogg page body at offset {}", *pos);

        return None;
    }

    let body = &rest[body_start..body_start + body_len];
    *pos += body_start + body_len;

    Some(Page {
        segment_table,
        body,
    })
}

/// Demuxes a whole Ogg stream into its packets, in order.
///
/// Stops at the first malformed page, returning the packets completed before it.
pub fn packets(data: &[u8]) -> Vec<Vec<u8>> {
    let mut packets = Vec::new();
    let mut partial: Vec<u8> = Vec::new();
    let mut pos = 0;

    while let Some(page) = read_page(data, &mut pos) {
        let mut offset = 0;

        for &len in page.segment_table {
            let len = len as usize;
            partial.extend_from_slice(&page.body[offset..offset + len]);
            offset += len;

            // A segment shorter than 255 bytes terminates the packet.
            if len < 255 {
                packets.push(std::mem::take(&mut partial));
            }
        }
    }

    packets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(header_type: u8, segments: &[&[u8]]) -> Vec<u8> {
        let mut page = Vec::new();
        page.extend_from_slice(b"OggS");
        page.push(0); // version
        page.push(header_type);
        page.extend_from_slice(&[0; 8]); // granule position
        page.extend_from_slice(&[0; 4]); // serial
        page.extend_from_slice(&[0; 4]); // page sequence
        page.extend_from_slice(&[0; 4]); // checksum
        page.push(segments.len() as u8);

        for segment in segments {
            page.push(segment.len() as u8);
        }
        for segment in segments {
            page.extend_from_slice(segment);
        }

        page
    }

    #[test]
    fn single_page_multiple_packets() {
        let data = page(0, &[b"first", b"second", b"third"]);

        let packets = packets(&data);

        assert_eq!(packets, vec![b"first".to_vec(), b"second".to_vec(), b"third".to_vec()]);
    }

    #[test]
    fn packet_spanning_two_pages_is_reassembled() {
        let head = vec![1u8; 255];
        let tail = vec![2u8; 40];

        let mut data = page(0, &[&head]);
        data.extend_from_slice(&page(1, &[&tail]));

        let packets = packets(&data);

        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].len(), 295);
        assert_eq!(&packets[0][..255], &head[..]);
        assert_eq!(&packets[0][255..], &tail[..]);
    }

    #[test]
    fn full_255_segment_does_not_terminate_packet() {
        let body = vec![9u8; 255 + 10];
        let segments: [&[u8]; 2] = [&body[..255], &body[255..]];
        let data = page(0, &segments);

        let packets = packets(&data);

        assert_eq!(packets, vec![body]);
    }

    #[test]
    fn malformed_magic_stops_with_packets_so_far() {
        let mut data = page(0, &[b"good"]);
        data.extend_from_slice(b"JUNKJUNKJUNK");

        let packets = packets(&data);

        assert_eq!(packets, vec![b"good".to_vec()]);
    }

    #[test]
    fn empty_input_yields_no_packets() {
        assert!(packets(&[]).is_empty());
    }
}
