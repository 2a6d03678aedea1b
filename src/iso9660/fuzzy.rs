//! Tolerant superblock discovery for raw and shifted images.
//!
//! Plain images put the primary volume descriptor at byte `16 * 2048`. Raw rips store
//! whole 2352-byte or 2336-byte frames, and some images carry leading garbage, so the
//! descriptor ends up elsewhere. This module searches candidate sectors around 16 across
//! all three frame sizes for the `CD001` standard identifier, infers the byte offset
//! correction from where it is found, and re-validates the descriptor through the
//! inferred geometry before accepting it.

use tracing::debug;

use crate::{
    file::VolumeStream,
    iso9660::{
        descriptor, read_block, SectorGeometry, ISO_BLOCKSIZE, ISO_FRAMESIZE_M2RAW,
        ISO_FRAMESIZE_RAW, ISO_PVD_SECTOR, ISO_STANDARD_ID, ISO_SYNC_SIZE, ISO_VD_PRIMARY,
    },
    Result,
};

/// Search for the primary volume descriptor within `fuzz` sectors of the canonical
/// position.
///
/// Candidate sectors are probed in the order 16, 15, 17, 14, 18, ... and for each one the
/// frame sizes 2048, 2352 and 2336 are tried. The returned geometry reproduces the found
/// descriptor position for every block read.
///
/// # Errors
/// Returns [`crate::Error::NotSupported`] if no superblock is found within the tolerance.
pub(crate) fn locate_superblock(stream: &mut VolumeStream, fuzz: u32) -> Result<SectorGeometry> {
    for i in 0..=fuzz {
        for j in 0..=1u32 {
            if i == 0 && j == 1 {
                continue;
            }
            let lsn = if j == 0 {
                ISO_PVD_SECTOR.checked_sub(i)
            } else {
                ISO_PVD_SECTOR.checked_add(i)
            };
            let Some(lsn) = lsn else {
                continue;
            };

            for frame_size in [ISO_BLOCKSIZE, ISO_FRAMESIZE_RAW, ISO_FRAMESIZE_M2RAW] {
                let data_start = if frame_size == ISO_BLOCKSIZE {
                    0
                } else {
                    ISO_SYNC_SIZE
                };

                let window_start = u64::from(lsn) * u64::from(frame_size) + u64::from(data_start);
                let Ok(window) = stream.slice_at(window_start, frame_size as usize) else {
                    continue;
                };

                let Some(hit) = window
                    .windows(ISO_STANDARD_ID.len())
                    .position(|w| w == ISO_STANDARD_ID)
                else {
                    continue;
                };
                if hit == 0 {
                    // the identifier sits one byte into the descriptor
                    continue;
                }

                let geometry = SectorGeometry {
                    frame_size,
                    data_start,
                    fuzzy_offset: (hit as i64 - 1)
                        - (i64::from(ISO_PVD_SECTOR) - i64::from(lsn)) * i64::from(frame_size),
                };

                // Re-validate through the inferred geometry before accepting it.
                let Ok(block) = read_block(stream, geometry, ISO_PVD_SECTOR) else {
                    continue;
                };
                if descriptor::descriptor_type(&block) != Some(ISO_VD_PRIMARY) {
                    continue;
                }

                inspect_sync_header(stream, geometry);
                debug!(
                    "superblock found: frame size {}, offset correction {}",
                    geometry.frame_size, geometry.fuzzy_offset
                );
                return Ok(geometry);
            }
        }
    }

    Err(crate::Error::NotSupported)
}

/// For raw 2352-byte frames, look at the sync header to tell mode 1 from mode 2.
///
/// The geometry is already exact since the offset correction was derived from the actual
/// descriptor position; the sync header only confirms the sector form.
fn inspect_sync_header(stream: &mut VolumeStream, geometry: SectorGeometry) {
    if geometry.frame_size != ISO_FRAMESIZE_RAW {
        return;
    }

    let frame_start =
        i64::from(ISO_PVD_SECTOR) * i64::from(geometry.frame_size) + geometry.fuzzy_offset;
    let Ok(frame_start) = u64::try_from(frame_start) else {
        return;
    };
    let Ok(head) = stream.slice_at(frame_start, 16) else {
        return;
    };

    let sync_ok = head[0] == 0 && head[1..11].iter().all(|&b| b == 0xFF) && head[11] == 0;
    if sync_ok {
        debug!("raw frame sync header present, mode {}", head[15]);
    } else {
        debug!("raw frame without sync header");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pvd_block() -> Vec<u8> {
        let mut block = vec![0u8; 2048];
        block[0] = ISO_VD_PRIMARY;
        block[1..6].copy_from_slice(ISO_STANDARD_ID);
        block
    }

    #[test]
    fn canonical_image_found_without_offset() {
        let mut image = vec![0u8; 20 * 2048];
        image[16 * 2048..17 * 2048].copy_from_slice(&pvd_block());

        let mut stream = VolumeStream::from_mem(image).unwrap();
        let geometry = locate_superblock(&mut stream, 2).unwrap();
        assert_eq!(geometry, SectorGeometry::default());
    }

    #[test]
    fn raw_mode1_frames_found() {
        // payload of each 2352-byte frame starts after sync (12) + header (4)
        let mut image = vec![0u8; 20 * 2352];
        let frame = 16 * 2352;
        image[frame] = 0;
        for b in &mut image[frame + 1..frame + 11] {
            *b = 0xFF;
        }
        image[frame + 11] = 0;
        image[frame + 15] = 1;
        image[frame + 16..frame + 16 + 2048].copy_from_slice(&pvd_block());

        let mut stream = VolumeStream::from_mem(image).unwrap();
        let geometry = locate_superblock(&mut stream, 1).unwrap();
        assert_eq!(geometry.frame_size, 2352);
        assert_eq!(geometry.byte_offset(16), 16 * 2352 + 16);
    }

    #[test]
    fn leading_garbage_within_tolerance() {
        let shift = 300usize;
        let mut image = vec![0u8; 20 * 2048];
        image[16 * 2048 + shift..17 * 2048 + shift].copy_from_slice(&pvd_block());

        let mut stream = VolumeStream::from_mem(image).unwrap();
        let geometry = locate_superblock(&mut stream, 1).unwrap();
        assert_eq!(geometry.frame_size, 2048);
        assert_eq!(geometry.fuzzy_offset, shift as i64);
        assert_eq!(geometry.byte_offset(16) as usize, 16 * 2048 + shift);
    }

    #[test]
    fn beyond_tolerance_fails() {
        // descriptor far outside every candidate window at tolerance one
        let mut image = vec![0u8; 44 * 2048];
        image[40 * 2048..41 * 2048].copy_from_slice(&pvd_block());

        let mut stream = VolumeStream::from_mem(image).unwrap();
        assert!(matches!(
            locate_superblock(&mut stream, 1),
            Err(crate::Error::NotSupported)
        ));
    }
}
