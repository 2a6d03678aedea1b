//! Rock Ridge (SUSP/RRIP) system-use area decoding.
//!
//! Every directory record may carry a system-use area holding SUSP entries. The Rock
//! Ridge protocol uses them to record POSIX names, modes, owners, timestamps and symbolic
//! links that the base ISO 9660 format cannot express. This module walks the entry chain,
//! following `CE` continuation areas through the image, and collects the decoded fields
//! into a [`RockRidge`] value.
//!
//! # Architecture
//!
//! Entries share a common `signature(2) length(1) version(1) payload` framing. The walk
//! is tolerant by design: unknown signatures are skipped, malformed entries end the scan
//! for the current record with a diagnostic, and continuation chains are capped at 64
//! hops so that crafted images with `CE` cycles terminate.
//!
//! Handled signatures: `SP` (skip announcement), `CE` (continuation), `ER` (extension
//! record), `RR` (legacy presence mask), `NM` (alternate name), `PX` (POSIX attributes),
//! `SL` (symbolic link), `TF` (timestamps), `CL`/`PL` (directory relocation links), `RE`
//! (relocated marker) and `ST` (terminator).

use bitflags::bitflags;
use tracing::{debug, warn};

use crate::{
    file::VolumeStream,
    iso9660::{read_block, SectorGeometry, ISO_BLOCKSIZE},
    DiscTime, PosixAttributes, Result,
};

/// Maximum length of a reassembled alternate name.
const RR_MAX_NAME: usize = 254;
/// Maximum number of continuation areas followed for one record.
const MAX_CE_HOPS: usize = 64;
/// Upper bound on a single continuation area.
const MAX_CE_SIZE: u32 = 64 * 1024;

bitflags! {
    /// Flags of an `NM` alternate name entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct NmFlags: u8 {
        /// The name continues in a following `NM` entry
        const CONTINUE = 1;
        /// The name refers to the current directory
        const CURRENT = 2;
        /// The name refers to the parent directory
        const PARENT = 4;
    }
}

bitflags! {
    /// Flags of an `SL` symlink component record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SlFlags: u8 {
        /// The component continues in the next component record
        const CONTINUE = 1;
        /// The component is `.`
        const CURRENT = 2;
        /// The component is `..`
        const PARENT = 4;
        /// The component is the filesystem root
        const ROOT = 8;
    }
}

bitflags! {
    /// Flags of a `TF` timestamp entry, selecting which stamps are recorded.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TfFlags: u8 {
        /// Creation time present
        const CREATE = 1;
        /// Modification time present
        const MODIFY = 2;
        /// Access time present
        const ACCESS = 4;
        /// Attribute change time present
        const ATTRIBUTES = 8;
        /// Backup time present
        const BACKUP = 16;
        /// Expiration time present
        const EXPIRATION = 32;
        /// Effective time present
        const EFFECTIVE = 64;
        /// Stamps use the 17-byte long form
        const LONG_FORM = 128;
    }
}

/// Decoded Rock Ridge fields for one directory record.
#[derive(Debug, Default)]
pub struct RockRidge {
    /// Alternate name from `NM` entries
    pub name: Option<String>,
    /// POSIX attributes from `PX`
    pub posix: Option<PosixAttributes>,
    /// Symbolic link target from `SL`
    pub symlink: Option<String>,
    /// Creation time from `TF`
    pub create_time: Option<DiscTime>,
    /// Modification time from `TF`
    pub modify_time: Option<DiscTime>,
    /// Access time from `TF`
    pub access_time: Option<DiscTime>,
    /// `RE` marker: entry was relocated and should be hidden
    pub relocated: bool,
    /// `PL` parent link block
    pub parent_link: Option<u32>,
    /// `CL` child link block, replacing the entry's data
    pub child_link: Option<u32>,
    /// `true` once a formal Rock Ridge field has been seen
    pub valid: bool,
}

#[derive(Default)]
struct WalkState {
    rr: RockRidge,
    name_buf: String,
    symlink_buf: String,
    sl_last_continued: bool,
}

/// Reads a both-endian 32-bit field from an entry payload.
fn both_u32(payload: &[u8], offset: usize) -> Option<u32> {
    if payload.len() < offset + 8 {
        return None;
    }
    let le = u32::from_le_bytes([
        payload[offset],
        payload[offset + 1],
        payload[offset + 2],
        payload[offset + 3],
    ]);
    let be = u32::from_be_bytes([
        payload[offset + 4],
        payload[offset + 5],
        payload[offset + 6],
        payload[offset + 7],
    ]);
    if le != be {
        warn!("both-endian mismatch in system use entry - le: {le}, be: {be}");
        return None;
    }
    Some(le)
}

/// Walk the system-use area of one directory record.
///
/// `skip` is the volume-wide SUSP skip value; it is applied before scanning and updated
/// when an `SP` entry announces a new value.
pub(crate) fn parse(
    stream: &mut VolumeStream,
    geometry: SectorGeometry,
    system_use: &[u8],
    skip: &mut u8,
) -> Result<RockRidge> {
    let mut state = WalkState::default();

    let start = usize::from(*skip).min(system_use.len());
    let mut area: Vec<u8> = system_use[start..].to_vec();
    let mut hops = 0usize;

    loop {
        let continuation = process_area(&mut state, &area, skip);

        let Some((extent, offset, size)) = continuation else {
            break;
        };

        hops += 1;
        if hops > MAX_CE_HOPS {
            warn!("continuation chain exceeds {MAX_CE_HOPS} hops, aborting");
            break;
        }
        if size == 0 || size > MAX_CE_SIZE {
            warn!("implausible continuation area size {size}, aborting");
            break;
        }
        if offset > MAX_CE_SIZE {
            warn!("implausible continuation area offset {offset}, aborting");
            break;
        }

        let span = offset.saturating_add(size);
        let blocks = span.div_ceil(ISO_BLOCKSIZE);
        let mut data = Vec::with_capacity((blocks * ISO_BLOCKSIZE) as usize);
        let mut failed = false;
        for i in 0..blocks {
            let Some(block) = extent.checked_add(i) else {
                warn!("continuation area wraps the address space, aborting");
                failed = true;
                break;
            };
            match read_block(stream, geometry, block) {
                Ok(block) => data.extend_from_slice(&block),
                Err(err) => {
                    warn!("continuation area read failed: {err}");
                    failed = true;
                    break;
                }
            }
        }
        if failed {
            break;
        }

        area = data[offset as usize..span as usize].to_vec();
    }

    if !state.name_buf.is_empty() {
        state.rr.name = Some(state.name_buf);
    }
    if !state.symlink_buf.is_empty() {
        state.rr.symlink = Some(state.symlink_buf);
    }

    Ok(state.rr)
}

/// Process one system-use area, returning a pending continuation if a `CE` was seen.
fn process_area(state: &mut WalkState, area: &[u8], skip: &mut u8) -> Option<(u32, u32, u32)> {
    let mut continuation = None;
    let mut pos = 0usize;

    while pos + 4 <= area.len() {
        let sig = [area[pos], area[pos + 1]];
        let len = usize::from(area[pos + 2]);

        if len == 0 {
            warn!("zero-length system use entry, aborting scan");
            break;
        }
        if pos + len > area.len() {
            // Records are padded to the area; a short tail is normal garbage.
            break;
        }

        let payload = &area[pos + 4..pos + len];

        match &sig {
            b"SP" => {
                if payload.len() >= 3 && payload[0] == 0xBE && payload[1] == 0xEF {
                    *skip = payload[2];
                } else {
                    warn!("SP entry without check bytes");
                }
            }
            b"CE" => {
                let extent = both_u32(payload, 0);
                let offset = both_u32(payload, 8);
                let size = both_u32(payload, 16);
                if let (Some(extent), Some(offset), Some(size)) = (extent, offset, size) {
                    continuation = Some((extent, offset, size));
                }
            }
            b"ER" => {
                state.rr.valid = true;
            }
            b"RR" => {
                // Legacy presence mask, nothing to decode
            }
            b"NM" => {
                process_nm(state, payload);
            }
            b"PX" => {
                process_px(state, payload);
            }
            b"SL" => {
                process_sl(state, payload);
            }
            b"TF" => {
                process_tf(state, payload);
            }
            b"CL" => {
                if let Some(block) = both_u32(payload, 0) {
                    state.rr.child_link = Some(block);
                }
            }
            b"PL" => {
                if let Some(block) = both_u32(payload, 0) {
                    state.rr.parent_link = Some(block);
                }
            }
            b"RE" => {
                state.rr.relocated = true;
            }
            b"ST" => {
                return continuation;
            }
            _ => {
                debug!(
                    "unknown system use signature {:?}",
                    String::from_utf8_lossy(&sig)
                );
            }
        }

        pos += len;
    }

    continuation
}

fn process_nm(state: &mut WalkState, payload: &[u8]) {
    let Some(&flag_byte) = payload.first() else {
        return;
    };
    let flags = NmFlags::from_bits_truncate(flag_byte);

    if flags.intersects(NmFlags::CURRENT | NmFlags::PARENT) || flag_byte & !0x07 != 0 {
        debug!("unsupported NM flags {flag_byte:#x}");
        return;
    }

    for &b in &payload[1..] {
        if state.name_buf.len() >= RR_MAX_NAME {
            break;
        }
        state.name_buf.push(char::from(b));
    }
    state.rr.valid = true;
}

fn process_px(state: &mut WalkState, payload: &[u8]) {
    let (Some(mode), Some(nlink), Some(uid), Some(gid)) = (
        both_u32(payload, 0),
        both_u32(payload, 8),
        both_u32(payload, 16),
        both_u32(payload, 24),
    ) else {
        warn!("truncated PX entry");
        return;
    };

    state.rr.posix = Some(PosixAttributes {
        mode,
        nlink,
        uid,
        gid,
    });
    state.rr.valid = true;
}

fn process_sl(state: &mut WalkState, payload: &[u8]) {
    if payload.is_empty() {
        return;
    }

    let mut pos = 1usize; // past the record flags
    while pos + 2 <= payload.len() {
        let cflags = SlFlags::from_bits_truncate(payload[pos]);
        let clen = usize::from(payload[pos + 1]);
        if pos + 2 + clen > payload.len() {
            warn!("truncated SL component");
            break;
        }
        let text = &payload[pos + 2..pos + 2 + clen];
        pos += 2 + clen;

        let target = &mut state.symlink_buf;
        if !target.is_empty() && !state.sl_last_continued && !target.ends_with('/') {
            target.push('/');
        }

        if cflags.contains(SlFlags::ROOT) {
            target.push('/');
        } else if cflags.contains(SlFlags::PARENT) {
            target.push_str("..");
        } else if cflags.contains(SlFlags::CURRENT) {
            target.push('.');
        } else {
            for &b in text {
                target.push(char::from(b));
            }
        }

        state.sl_last_continued = cflags.contains(SlFlags::CONTINUE);
    }

    state.rr.valid = true;
}

fn process_tf(state: &mut WalkState, payload: &[u8]) {
    let Some(&flag_byte) = payload.first() else {
        return;
    };
    let flags = TfFlags::from_bits_truncate(flag_byte);
    let stamp_len = if flags.contains(TfFlags::LONG_FORM) {
        17
    } else {
        7
    };

    let order = [
        TfFlags::CREATE,
        TfFlags::MODIFY,
        TfFlags::ACCESS,
        TfFlags::ATTRIBUTES,
        TfFlags::BACKUP,
        TfFlags::EXPIRATION,
        TfFlags::EFFECTIVE,
    ];

    let mut pos = 1usize;
    for which in order {
        if !flags.contains(which) {
            continue;
        }
        if pos + stamp_len > payload.len() {
            warn!("truncated TF entry");
            break;
        }

        let stamp = &payload[pos..pos + stamp_len];
        let time = if flags.contains(TfFlags::LONG_FORM) {
            DiscTime::from_ltime(stamp)
        } else {
            DiscTime::from_dtime(stamp)
        };

        match which {
            TfFlags::CREATE => state.rr.create_time = time,
            TfFlags::MODIFY => state.rr.modify_time = time,
            TfFlags::ACCESS => state.rr.access_time = time,
            _ => {}
        }

        pos += stamp_len;
    }

    state.rr.valid = true;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_stream() -> VolumeStream {
        VolumeStream::from_mem(vec![0u8; 2048]).unwrap()
    }

    fn entry(sig: &[u8; 2], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + payload.len());
        out.extend_from_slice(sig);
        out.push((4 + payload.len()) as u8);
        out.push(1);
        out.extend_from_slice(payload);
        out
    }

    fn both(value: u32) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[0..4].copy_from_slice(&value.to_le_bytes());
        out[4..8].copy_from_slice(&value.to_be_bytes());
        out
    }

    #[test]
    fn nm_name() {
        let mut area = entry(b"NM", &[&[0u8][..], b"hello.txt"].concat());
        area.extend_from_slice(&entry(b"PX", &{
            let mut p = Vec::new();
            p.extend_from_slice(&both(0o100644));
            p.extend_from_slice(&both(1));
            p.extend_from_slice(&both(1000));
            p.extend_from_slice(&both(100));
            p
        }));

        let mut skip = 0u8;
        let rr = parse(
            &mut dummy_stream(),
            SectorGeometry::default(),
            &area,
            &mut skip,
        )
        .unwrap();

        assert!(rr.valid);
        assert_eq!(rr.name.as_deref(), Some("hello.txt"));
        let posix = rr.posix.unwrap();
        assert_eq!(posix.mode, 0o100644);
        assert_eq!(posix.uid, 1000);
        assert_eq!(posix.gid, 100);
    }

    #[test]
    fn nm_continue_within_area() {
        let mut area = entry(b"NM", &[&[NmFlags::CONTINUE.bits()][..], b"long"].concat());
        area.extend_from_slice(&entry(b"NM", &[&[0u8][..], b"name"].concat()));

        let mut skip = 0u8;
        let rr = parse(
            &mut dummy_stream(),
            SectorGeometry::default(),
            &area,
            &mut skip,
        )
        .unwrap();
        assert_eq!(rr.name.as_deref(), Some("longname"));
    }

    #[test]
    fn nm_across_continuation_area() {
        // continuation area at block 1, offset 100
        let mut image = vec![0u8; 3 * 2048];
        let cont = entry(b"NM", &[&[0u8][..], b"tail"].concat());
        image[2048 + 100..2048 + 100 + cont.len()].copy_from_slice(&cont);

        let mut area = entry(b"NM", &[&[NmFlags::CONTINUE.bits()][..], b"head-"].concat());
        let mut ce = Vec::new();
        ce.extend_from_slice(&both(1));
        ce.extend_from_slice(&both(100));
        ce.extend_from_slice(&both(cont.len() as u32));
        area.extend_from_slice(&entry(b"CE", &ce));

        let mut stream = VolumeStream::from_mem(image).unwrap();
        let mut skip = 0u8;
        let rr = parse(&mut stream, SectorGeometry::default(), &area, &mut skip).unwrap();
        assert_eq!(rr.name.as_deref(), Some("head-tail"));
    }

    #[test]
    fn ce_cycle_terminates() {
        // a continuation area that points back at itself
        let mut payload = Vec::new();
        payload.extend_from_slice(&both(1)); // extent
        payload.extend_from_slice(&both(0)); // offset
        payload.extend_from_slice(&both(28)); // size of the CE entry itself
        let cycle = entry(b"CE", &payload);
        assert_eq!(cycle.len(), 28);

        let mut image = vec![0u8; 3 * 2048];
        image[2048..2048 + cycle.len()].copy_from_slice(&cycle);

        let mut stream = VolumeStream::from_mem(image).unwrap();
        let mut skip = 0u8;
        // must terminate despite the cycle
        let rr = parse(&mut stream, SectorGeometry::default(), &cycle, &mut skip).unwrap();
        assert!(!rr.valid);
    }

    #[test]
    fn symlink_components() {
        // "/usr/../lib" from ROOT, "usr", PARENT, "lib"
        let mut payload = vec![0u8]; // record flags
        payload.extend_from_slice(&[SlFlags::ROOT.bits(), 0]);
        payload.extend_from_slice(&[0, 3]);
        payload.extend_from_slice(b"usr");
        payload.extend_from_slice(&[SlFlags::PARENT.bits(), 0]);
        payload.extend_from_slice(&[0, 3]);
        payload.extend_from_slice(b"lib");

        let area = entry(b"SL", &payload);
        let mut skip = 0u8;
        let rr = parse(
            &mut dummy_stream(),
            SectorGeometry::default(),
            &area,
            &mut skip,
        )
        .unwrap();
        assert_eq!(rr.symlink.as_deref(), Some("/usr/../lib"));
    }

    #[test]
    fn symlink_component_split_across_records() {
        // component "verylongname" split over two SL records
        let mut payload1 = vec![1u8]; // record continues
        payload1.extend_from_slice(&[SlFlags::CONTINUE.bits(), 8]);
        payload1.extend_from_slice(b"verylong");
        let mut payload2 = vec![0u8];
        payload2.extend_from_slice(&[0, 4]);
        payload2.extend_from_slice(b"name");

        let mut area = entry(b"SL", &payload1);
        area.extend_from_slice(&entry(b"SL", &payload2));

        let mut skip = 0u8;
        let rr = parse(
            &mut dummy_stream(),
            SectorGeometry::default(),
            &area,
            &mut skip,
        )
        .unwrap();
        assert_eq!(rr.symlink.as_deref(), Some("verylongname"));
    }

    #[test]
    fn tf_timestamps() {
        let mut payload = vec![(TfFlags::CREATE | TfFlags::MODIFY).bits()];
        payload.extend_from_slice(&[90, 1, 15, 8, 30, 0, 0]); // 1990-01-15
        payload.extend_from_slice(&[104, 6, 2, 12, 0, 0, 0]); // 2004-06-02

        let area = entry(b"TF", &payload);
        let mut skip = 0u8;
        let rr = parse(
            &mut dummy_stream(),
            SectorGeometry::default(),
            &area,
            &mut skip,
        )
        .unwrap();

        assert_eq!(rr.create_time.unwrap().year, 1990);
        assert_eq!(rr.modify_time.unwrap().year, 2004);
        assert!(rr.access_time.is_none());
    }

    #[test]
    fn relocation_markers() {
        let mut area = entry(b"RE", &[]);
        let mut cl = Vec::new();
        cl.extend_from_slice(&both(321));
        area.extend_from_slice(&entry(b"CL", &cl));

        let mut skip = 0u8;
        let rr = parse(
            &mut dummy_stream(),
            SectorGeometry::default(),
            &area,
            &mut skip,
        )
        .unwrap();
        assert!(rr.relocated);
        assert_eq!(rr.child_link, Some(321));
    }

    #[test]
    fn sp_updates_skip() {
        let area = entry(b"SP", &[0xBE, 0xEF, 5]);
        let mut skip = 0u8;
        parse(
            &mut dummy_stream(),
            SectorGeometry::default(),
            &area,
            &mut skip,
        )
        .unwrap();
        assert_eq!(skip, 5);
    }

    #[test]
    fn zero_length_entry_aborts() {
        let mut area = entry(b"NM", &[&[0u8][..], b"ok"].concat());
        area.extend_from_slice(&[b'P', b'X', 0, 1]); // zero length
        area.extend_from_slice(&entry(b"NM", &[&[0u8][..], b"-never"].concat()));

        let mut skip = 0u8;
        let rr = parse(
            &mut dummy_stream(),
            SectorGeometry::default(),
            &area,
            &mut skip,
        )
        .unwrap();
        assert_eq!(rr.name.as_deref(), Some("ok"));
    }
}
