//! Decoder for aggregated histogram packets: 1..8 per-camera 1024-bin
//! histograms in one framed transmission, with resync-on-corruption when a
//! packet fails to parse cleanly.

pub const HISTO_BINS: usize = 1024;
pub const HISTO_BYTES: usize = HISTO_BINS * 4;

const SOF: u8 = 0xAA;
const EOF_BYTE: u8 = 0xDD;
const SOH: u8 = 0xFF;
const EOH: u8 = 0xEE;
const OUTER_TYPE: u8 = 0x00;

const HEADER_LEN: usize = 6; // SOF + type + length(u32 LE)
const FOOTER_LEN: usize = 3; // crc(u16 LE) + EOF
const BLOCK_LEN: usize = 1 + 1 + HISTO_BYTES + 4 + 1; // SOH + camera_id + histogram + temp + EOH
pub const MIN_PACKET_SIZE: usize = HEADER_LEN + FOOTER_LEN + BLOCK_LEN;

/// The two-byte sequence marking the boundary between a bad packet's end and
/// the next packet's start; the parser resumes scanning from the `SOF` half.
const RESYNC_PATTERN: [u8; 2] = [EOF_BYTE, SOF];

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum HistogramParseError {
    #[error("packet is too short to contain a header and one camera block ({0} bytes)")]
    TruncatedPayload(usize),
    #[error("bad outer header: expected sof={SOF:#04x} type={OUTER_TYPE:#04x}, got sof={sof:#04x} type={packet_type:#04x}")]
    BadHeader { sof: u8, packet_type: u8 },
    #[error("missing SOH marker for a camera block at offset {offset}")]
    MissingSoh { offset: usize },
    #[error("missing EOH marker for camera {camera_id} at offset {offset}")]
    MissingEoh { camera_id: u8, offset: usize },
    #[error("missing EOF marker at offset {offset}")]
    MissingEof { offset: usize },
    #[error("CRC mismatch: computed {computed:#06x}, wire {wire:#06x}")]
    CrcMismatch { computed: u16, wire: u16 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistogramRecord {
    pub camera_id: u8,
    pub frame_id: u8,
    pub bins: Vec<u32>,
    pub temperature_c: f32,
    pub row_sum: u64,
}

#[derive(Debug, Default)]
pub struct HistogramStreamReport {
    pub records: Vec<HistogramRecord>,
    pub ok: usize,
    pub crc_failures: usize,
    pub parse_failures: usize,
    pub other_failures: usize,
    /// `(start, end)` byte ranges skipped while resynchronizing.
    pub skipped_ranges: Vec<(usize, usize)>,
}

/// Parses every back-to-back aggregated packet in `data`, recovering from
/// corruption by scanning for [`RESYNC_PATTERN`] and resuming at the next SOF.
pub fn parse_histogram_stream(data: &[u8]) -> HistogramStreamReport {
    let mut report = HistogramStreamReport::default();
    let mut offset = 0usize;

    while offset < data.len() {
        match parse_one_packet(&data[offset..]) {
            Ok((mut records, consumed)) => {
                report.ok += 1;
                report.records.append(&mut records);
                offset += consumed;
            }
            Err(err) => {
                match &err {
                    HistogramParseError::CrcMismatch { .. } => report.crc_failures += 1,
                    HistogramParseError::MissingSoh { .. } => report.parse_failures += 1,
                    _ => report.other_failures += 1,
                }
                tracing::debug!(offset, %err, "histogram packet parse failed, resynchronizing");
                match find_resync_point(data, offset) {
                    Some(next) => {
                        report.skipped_ranges.push((offset, next));
                        offset = next;
                    }
                    None => break,
                }
            }
        }
    }

    report
}

/// Parses one aggregated packet starting at `buf[0]`, returning the decoded
/// per-camera records and the number of bytes consumed.
fn parse_one_packet(buf: &[u8]) -> Result<(Vec<HistogramRecord>, usize), HistogramParseError> {
    if buf.len() < MIN_PACKET_SIZE {
        return Err(HistogramParseError::TruncatedPayload(buf.len()));
    }

    let sof = buf[0];
    let packet_type = buf[1];
    if sof != SOF || packet_type != OUTER_TYPE {
        return Err(HistogramParseError::BadHeader { sof, packet_type });
    }

    let length = u32::from_le_bytes(buf[2..6].try_into().unwrap()) as usize;
    if length > buf.len() || length < MIN_PACKET_SIZE {
        return Err(HistogramParseError::TruncatedPayload(buf.len().min(length)));
    }
    let payload_end = length - FOOTER_LEN;

    let mut records = Vec::new();
    let mut offset = HEADER_LEN;

    while offset < payload_end {
        if buf[offset] != SOH {
            return Err(HistogramParseError::MissingSoh { offset });
        }
        let camera_id = buf[offset + 1];
        let histo_start = offset + 2;
        let mut bins = Vec::with_capacity(HISTO_BINS);
        for i in 0..HISTO_BINS {
            let word_start = histo_start + i * 4;
            bins.push(u32::from_le_bytes(buf[word_start..word_start + 4].try_into().unwrap()));
        }
        let temp_start = histo_start + HISTO_BYTES;
        let temperature_c = f32::from_le_bytes(buf[temp_start..temp_start + 4].try_into().unwrap());
        let eoh_offset = temp_start + 4;
        if buf[eoh_offset] != EOH {
            return Err(HistogramParseError::MissingEoh { camera_id, offset: eoh_offset });
        }

        let last_word = *bins.last().unwrap();
        let frame_id = ((last_word >> 24) & 0xFF) as u8;
        *bins.last_mut().unwrap() = last_word & 0x00FF_FFFF;
        let row_sum: u64 = bins.iter().map(|&b| b as u64).sum();

        records.push(HistogramRecord {
            camera_id,
            frame_id,
            bins,
            temperature_c,
            row_sum,
        });

        offset = eoh_offset + 1;
    }

    if offset != payload_end {
        return Err(HistogramParseError::MissingSoh { offset });
    }

    let crc_wire = u16::from_le_bytes(buf[offset..offset + 2].try_into().unwrap());
    let eof_offset = offset + 2;
    if buf[eof_offset] != EOF_BYTE {
        return Err(HistogramParseError::MissingEof { offset: eof_offset });
    }

    // CRC covers bytes from `type` through the last EOH, i.e. buf[1..offset],
    // not including SOF.
    let computed = crate::crc::crc16(&buf[1..offset]);
    if computed != crc_wire {
        return Err(HistogramParseError::CrcMismatch { computed, wire: crc_wire });
    }

    Ok((records, length))
}

/// Finds where to resume parsing after a failure at `from`. Prefers the
/// cheap case of a clean `EOF, SOF` junction — a bad packet's own corrupted
/// footer immediately followed by the next packet's start. When noise bytes
/// are inserted *between* two well-formed packets there is no such junction
/// (the previous packet's real `EOF` was already consumed, and the noise
/// sits between it and the next `SOF`), so fall back to scanning for a bare
/// `SOF` byte that actually begins a packet that parses cleanly.
fn find_resync_point(data: &[u8], from: usize) -> Option<usize> {
    if from + 1 < data.len() {
        if let Some(i) = data[from..].windows(2).position(|w| w == RESYNC_PATTERN) {
            return Some(from + i + 1);
        }
    }

    (from..data.len()).find(|&i| data[i] == SOF && parse_one_packet(&data[i..]).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_packet(blocks: &[(u8, [u32; HISTO_BINS], f32)]) -> Vec<u8> {
        let mut payload = Vec::new();
        for (camera_id, bins, temp) in blocks {
            payload.push(SOH);
            payload.push(*camera_id);
            for b in bins {
                payload.extend_from_slice(&b.to_le_bytes());
            }
            payload.extend_from_slice(&temp.to_le_bytes());
            payload.push(EOH);
        }

        let total_len = HEADER_LEN + payload.len() + FOOTER_LEN;
        let mut out = Vec::with_capacity(total_len);
        out.push(SOF);
        out.push(OUTER_TYPE);
        out.extend_from_slice(&(total_len as u32).to_le_bytes());
        out.extend_from_slice(&payload);

        let crc = crate::crc::crc16(&out[1..]);
        out.extend_from_slice(&crc.to_le_bytes());
        out.push(EOF_BYTE);
        out
    }

    fn one_block(camera_id: u8, frame_id: u8, count: u32, temp: f32) -> (u8, [u32; HISTO_BINS], f32) {
        let mut bins = [0u32; HISTO_BINS];
        bins[0] = count;
        bins[HISTO_BINS - 1] = ((frame_id as u32) << 24) | (count & 0x00FF_FFFF);
        (camera_id, bins, temp)
    }

    #[test]
    fn parses_a_single_well_formed_packet() {
        let packet = encode_packet(&[one_block(3, 7, 1234, 36.5)]);
        let report = parse_histogram_stream(&packet);
        assert_eq!(report.ok, 1);
        assert_eq!(report.records.len(), 1);
        let rec = &report.records[0];
        assert_eq!(rec.camera_id, 3);
        assert_eq!(rec.frame_id, 7);
        assert_eq!(rec.bins[HISTO_BINS - 1], 1234);
        assert_eq!(rec.temperature_c, 36.5);
        assert_eq!(report.crc_failures, 0);
        assert!(report.skipped_ranges.is_empty());
    }

    #[test]
    fn parses_n_back_to_back_packets_in_order() {
        let a = encode_packet(&[one_block(0, 1, 10, 30.0)]);
        let b = encode_packet(&[one_block(1, 2, 20, 31.0)]);
        let mut stream = a.clone();
        stream.extend_from_slice(&b);

        let report = parse_histogram_stream(&stream);
        assert_eq!(report.ok, 2);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].camera_id, 0);
        assert_eq!(report.records[1].camera_id, 1);
    }

    #[test]
    fn parses_multiple_cameras_in_one_aggregated_packet() {
        let packet = encode_packet(&[one_block(0, 1, 5, 20.0), one_block(1, 1, 6, 21.0)]);
        let report = parse_histogram_stream(&packet);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0].camera_id, 0);
        assert_eq!(report.records[1].camera_id, 1);
    }

    #[test]
    fn resyncs_past_injected_noise_between_packets() {
        let a = encode_packet(&[one_block(0, 1, 10, 30.0)]);
        let b = encode_packet(&[one_block(1, 2, 20, 31.0)]);
        let mut stream = a.clone();
        stream.extend_from_slice(&[0x00, 0x00, 0x00]);
        stream.extend_from_slice(&b);

        let report = parse_histogram_stream(&stream);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.ok, 2);
        assert_eq!(report.other_failures + report.parse_failures + report.crc_failures, 1);
        assert_eq!(report.skipped_ranges.len(), 1);
    }

    #[test]
    fn single_bit_corruption_in_crc_window_yields_one_crc_error_and_no_records() {
        let mut packet = encode_packet(&[one_block(0, 1, 10, 30.0)]);
        let mid = HEADER_LEN + 10;
        packet[mid] ^= 0x01;

        let report = parse_histogram_stream(&packet);
        assert_eq!(report.crc_failures, 1);
        assert_eq!(report.records.len(), 0);
    }

    #[test]
    fn truncated_stream_with_no_resync_pattern_terminates_cleanly() {
        let packet = encode_packet(&[one_block(0, 1, 10, 30.0)]);
        let report = parse_histogram_stream(&packet[..packet.len() - 1]);
        // Truncation breaks the footer; no resync pattern exists, so the
        // parser records one failure and stops instead of looping forever.
        assert_eq!(report.records.len(), 0);
        assert!(report.crc_failures + report.parse_failures + report.other_failures >= 1);
    }
}
