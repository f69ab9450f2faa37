//! Minimal MPEG-TS demuxer that recovers the audio elementary stream.
//!
//! Transport streams are fixed 188-byte packets: a 4-byte header, an
//! optional adaptation field, then payload. The PAT names the PMT PID, the
//! PMT names the audio PID, and that PID's PES packets carry the raw
//! elementary stream (ADTS frames for AAC) once PES headers are stripped.

const TS_PACKET_SIZE: usize = 188;
const TS_SYNC_BYTE: u8 = 0x47;
const PAT_PID: u16 = 0x0000;

// PMT stream types this engine treats as audio.
const STREAM_TYPE_ADTS_AAC: u8 = 0x0f;
const STREAM_TYPE_LATM_AAC: u8 = 0x11;
const STREAM_TYPE_MPEG1_AUDIO: u8 = 0x03;
const STREAM_TYPE_MPEG2_AUDIO: u8 = 0x04;

struct TsPacket<'a> {
    pid: u16,
    payload_start: bool,
    payload: &'a [u8],
}

/// Extracts the audio elementary stream from transport-stream data.
///
/// Empty output means no recognizable audio PID was found; the caller
/// treats that as this decode stage failing.
pub fn extract_audio_stream(ts_data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ts_data.len() / 2);
    let mut pmt_pid: Option<u16> = None;
    let mut audio_pid: Option<u16> = None;

    let mut offset = ts_data
        .iter()
        .position(|&b| b == TS_SYNC_BYTE)
        .unwrap_or(ts_data.len());

    while offset + TS_PACKET_SIZE <= ts_data.len() {
        let packet = &ts_data[offset..offset + TS_PACKET_SIZE];
        offset += TS_PACKET_SIZE;

        if packet[0] != TS_SYNC_BYTE {
            // Lost sync, scan forward to the next candidate boundary.
            match ts_data[offset..].iter().position(|&b| b == TS_SYNC_BYTE) {
                Some(pos) => {
                    offset += pos;
                    continue;
                }
                None => break,
            }
        }

        let Some(parsed) = parse_packet(packet) else {
            continue;
        };

        if parsed.pid == PAT_PID {
            if let Some(pid) = parse_pat(parsed.payload, parsed.payload_start) {
                pmt_pid = Some(pid);
            }
        } else if Some(parsed.pid) == pmt_pid {
            if let Some(pid) = parse_pmt(parsed.payload, parsed.payload_start) {
                audio_pid = Some(pid);
            }
        } else if Some(parsed.pid) == audio_pid {
            append_pes_payload(parsed.payload, parsed.payload_start, &mut out);
        }
    }

    out
}

fn parse_packet(packet: &[u8]) -> Option<TsPacket<'_>> {
    let transport_error = (packet[1] & 0x80) != 0;
    if transport_error {
        return None;
    }

    let payload_start = (packet[1] & 0x40) != 0;
    let pid = ((packet[1] as u16 & 0x1f) << 8) | packet[2] as u16;
    let adaptation_field_control = (packet[3] >> 4) & 0x03;

    // 0 is reserved, 2 is adaptation field only: nothing to extract.
    if adaptation_field_control == 0 || adaptation_field_control == 2 {
        return None;
    }

    let mut payload_offset = 4usize;
    if adaptation_field_control == 3 {
        let adaptation_length = packet[4] as usize;
        payload_offset += 1 + adaptation_length;
    }
    if payload_offset >= TS_PACKET_SIZE {
        return None;
    }

    Some(TsPacket {
        pid,
        payload_start,
        payload: &packet[payload_offset..],
    })
}

/// Skips the pointer field that precedes a table section at a payload start.
fn section_data(payload: &[u8], payload_start: bool) -> Option<&[u8]> {
    if payload_start && !payload.is_empty() {
        let pointer = payload[0] as usize;
        if 1 + pointer >= payload.len() {
            return None;
        }
        Some(&payload[1 + pointer..])
    } else {
        Some(payload)
    }
}

/// PAT: return the PMT PID of the first real program.
fn parse_pat(payload: &[u8], payload_start: bool) -> Option<u16> {
    let data = section_data(payload, payload_start)?;

    // table_id(1) + section_length(2) + transport_stream_id(2) +
    // version(1) + section_number(1) + last_section(1)
    if data.len() < 8 {
        return None;
    }

    let section_length = ((data[1] as usize & 0x0f) << 8) | data[2] as usize;
    let header_size = 8;

    // Program entries are 4 bytes each; the section ends with a 4-byte CRC.
    let entries_end = std::cmp::min(header_size + section_length.saturating_sub(5), data.len());

    let mut pos = header_size;
    while pos + 4 <= entries_end {
        let program_number = ((data[pos] as u16) << 8) | data[pos + 1] as u16;
        let pid = ((data[pos + 2] as u16 & 0x1f) << 8) | data[pos + 3] as u16;
        if program_number != 0 {
            return Some(pid);
        }
        pos += 4;
    }

    None
}

/// PMT: return the elementary PID of the first audio stream entry.
fn parse_pmt(payload: &[u8], payload_start: bool) -> Option<u16> {
    let data = section_data(payload, payload_start)?;

    // Fixed PMT header through program_info_length is 12 bytes.
    if data.len() < 12 {
        return None;
    }

    let section_length = ((data[1] as usize & 0x0f) << 8) | data[2] as usize;
    let program_info_length = ((data[10] as usize & 0x0f) << 8) | data[11] as usize;

    let mut pos = 12 + program_info_length;
    let section_end = std::cmp::min(3 + section_length.saturating_sub(4), data.len());

    while pos + 5 <= section_end {
        let stream_type = data[pos];
        let elementary_pid = ((data[pos + 1] as u16 & 0x1f) << 8) | data[pos + 2] as u16;
        let es_info_length = ((data[pos + 3] as usize & 0x0f) << 8) | data[pos + 4] as usize;

        match stream_type {
            STREAM_TYPE_ADTS_AAC | STREAM_TYPE_LATM_AAC | STREAM_TYPE_MPEG1_AUDIO
            | STREAM_TYPE_MPEG2_AUDIO => return Some(elementary_pid),
            _ => {}
        }

        pos += 5 + es_info_length;
    }

    None
}

/// Appends PES payload bytes, stripping the PES header at packet starts.
fn append_pes_payload(payload: &[u8], payload_start: bool, out: &mut Vec<u8>) {
    if !payload_start {
        out.extend_from_slice(payload);
        return;
    }

    if payload.len() < 9 {
        return;
    }

    if payload[0] != 0x00 || payload[1] != 0x00 || payload[2] != 0x01 {
        // No PES start code where one was announced; keep the bytes raw.
        out.extend_from_slice(payload);
        return;
    }

    // start_code(3) + stream_id(1) + pes_length(2) + flags(2) +
    // header_data_length(1), then that many stuffing/PTS bytes.
    let header_data_length = payload[8] as usize;
    let pes_header_size = 9 + header_data_length;
    if pes_header_size < payload.len() {
        out.extend_from_slice(&payload[pes_header_size..]);
    }
}
