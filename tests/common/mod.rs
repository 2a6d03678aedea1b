//! Shared builders for synthetic disc images.
//!
//! The integration tests run against small images assembled in memory, with valid volume
//! descriptors, directory records and UDF descriptor tags, so every code path is
//! exercised without shipping binary fixtures.

#![allow(dead_code)]

pub mod iso {
    //! ISO 9660 image assembly.

    /// Logical block size of the images built here.
    pub const BLOCK: usize = 2048;

    /// Little- and big-endian u32 pair (the 733 on-disc format).
    pub fn both32(value: u32) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[..4].copy_from_slice(&value.to_le_bytes());
        out[4..].copy_from_slice(&value.to_be_bytes());
        out
    }

    /// Little- and big-endian u16 pair (the 723 on-disc format).
    pub fn both16(value: u16) -> [u8; 4] {
        let mut out = [0u8; 4];
        out[..2].copy_from_slice(&value.to_le_bytes());
        out[2..].copy_from_slice(&value.to_be_bytes());
        out
    }

    /// One system use entry: signature, length, version, payload.
    pub fn susp_entry(sig: &[u8; 2], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + payload.len());
        out.extend_from_slice(sig);
        out.push((4 + payload.len()) as u8);
        out.push(1);
        out.extend_from_slice(payload);
        out
    }

    /// An `SP` entry announcing SUSP with the given skip.
    pub fn sp_entry(skip: u8) -> Vec<u8> {
        susp_entry(b"SP", &[0xBE, 0xEF, skip])
    }

    /// An `ER` entry announcing the Rock Ridge extension.
    pub fn er_entry() -> Vec<u8> {
        let mut payload = vec![10, 4, 4, 1];
        payload.extend_from_slice(b"RRIP_1991A");
        payload.extend_from_slice(b"DESC");
        payload.extend_from_slice(b"SRC ");
        susp_entry(b"ER", &payload)
    }

    /// An `NM` entry carrying an alternate name.
    pub fn nm_entry(name: &str) -> Vec<u8> {
        let mut payload = vec![0u8];
        payload.extend_from_slice(name.as_bytes());
        susp_entry(b"NM", &payload)
    }

    /// A `PX` entry with POSIX mode, link count, uid and gid.
    pub fn px_entry(mode: u32, nlink: u32, uid: u32, gid: u32) -> Vec<u8> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&both32(mode));
        payload.extend_from_slice(&both32(nlink));
        payload.extend_from_slice(&both32(uid));
        payload.extend_from_slice(&both32(gid));
        susp_entry(b"PX", &payload)
    }

    /// An `SL` entry for a symlink target of plain components, e.g. `usr/lib`.
    pub fn sl_entry(components: &[&str]) -> Vec<u8> {
        let mut payload = vec![0u8];
        for component in components {
            match *component {
                "/" => payload.extend_from_slice(&[8, 0]),
                ".." => payload.extend_from_slice(&[4, 0]),
                "." => payload.extend_from_slice(&[2, 0]),
                text => {
                    payload.push(0);
                    payload.push(text.len() as u8);
                    payload.extend_from_slice(text.as_bytes());
                }
            }
        }
        susp_entry(b"SL", &payload)
    }

    /// A directory record with an optional system use area.
    pub fn record(identifier: &[u8], extent: u32, size: u32, flags: u8, susp: &[u8]) -> Vec<u8> {
        let name_len = identifier.len();
        let mut su_start = 33 + name_len;
        if name_len % 2 == 0 {
            su_start += 1;
        }
        let length = su_start + susp.len();
        assert!(length <= 255, "record too long");

        let mut rec = vec![0u8; length];
        rec[0] = length as u8;
        rec[2..10].copy_from_slice(&both32(extent));
        rec[10..18].copy_from_slice(&both32(size));
        // 2004-06-02 10:30:00 UTC
        rec[18..25].copy_from_slice(&[104, 6, 2, 10, 30, 0, 0]);
        rec[25] = flags;
        rec[28..32].copy_from_slice(&both16(1));
        rec[32] = name_len as u8;
        rec[33..33 + name_len].copy_from_slice(identifier);
        rec[su_start..].copy_from_slice(susp);
        rec
    }

    /// A directory block: `.` and `..` records followed by the given child records,
    /// padded to one logical block.
    pub fn dir_block(self_extent: u32, parent_extent: u32, children: &[Vec<u8>]) -> Vec<u8> {
        dir_block_with_susp(self_extent, parent_extent, &[], children)
    }

    /// Like [`dir_block`], with a system use area on the `.` record.
    pub fn dir_block_with_susp(
        self_extent: u32,
        parent_extent: u32,
        dot_susp: &[u8],
        children: &[Vec<u8>],
    ) -> Vec<u8> {
        let mut block = Vec::new();
        block.extend_from_slice(&record(&[0x00], self_extent, BLOCK as u32, 2, dot_susp));
        block.extend_from_slice(&record(&[0x01], parent_extent, BLOCK as u32, 2, &[]));
        for child in children {
            block.extend_from_slice(child);
        }
        assert!(block.len() <= BLOCK, "directory overflows one block");
        block.resize(BLOCK, 0);
        block
    }

    /// Encode a name as UCS-2 big endian for Joliet records.
    pub fn ucs2(name: &str) -> Vec<u8> {
        name.encode_utf16().flat_map(|u| u.to_be_bytes()).collect()
    }

    /// Builder for a complete ISO 9660 image.
    pub struct IsoBuilder {
        sectors: usize,
        volume_id: String,
        root: (u32, u32),
        joliet_root: Option<(u32, u32)>,
        blocks: Vec<(u32, Vec<u8>)>,
    }

    impl IsoBuilder {
        /// A 100-sector image with the root directory at block 20.
        pub fn new() -> IsoBuilder {
            IsoBuilder {
                sectors: 100,
                volume_id: "TESTDISC".to_string(),
                root: (20, BLOCK as u32),
                joliet_root: None,
                blocks: Vec::new(),
            }
        }

        pub fn sectors(mut self, sectors: usize) -> IsoBuilder {
            self.sectors = sectors;
            self
        }

        pub fn volume_id(mut self, id: &str) -> IsoBuilder {
            self.volume_id = id.to_string();
            self
        }

        pub fn root(mut self, extent: u32, size: u32) -> IsoBuilder {
            self.root = (extent, size);
            self
        }

        /// Add a Joliet hierarchy rooted at the given extent.
        pub fn joliet_root(mut self, extent: u32, size: u32) -> IsoBuilder {
            self.joliet_root = Some((extent, size));
            self
        }

        /// Place payload data at a logical block.
        pub fn block(mut self, lsn: u32, data: Vec<u8>) -> IsoBuilder {
            self.blocks.push((lsn, data));
            self
        }

        fn descriptor(&self, vd_type: u8, root: (u32, u32)) -> Vec<u8> {
            let mut block = vec![0u8; BLOCK];
            block[0] = vd_type;
            block[1..6].copy_from_slice(b"CD001");
            block[6] = 1;
            for b in &mut block[8..72] {
                *b = b' ';
            }
            block[8..13].copy_from_slice(b"LINUX");
            if vd_type == 2 {
                // Joliet level 3 escape, UCS-2 identifiers
                block[88] = 0x25;
                block[89] = 0x2F;
                block[90] = 0x45;
                for b in &mut block[40..72] {
                    *b = 0;
                }
                let name = ucs2(&self.volume_id);
                block[40..40 + name.len().min(32)].copy_from_slice(&name[..name.len().min(32)]);
            } else {
                let id = self.volume_id.as_bytes();
                block[40..40 + id.len().min(32)].copy_from_slice(&id[..id.len().min(32)]);
            }

            block[80..88].copy_from_slice(&both32(self.sectors as u32));
            block[120..124].copy_from_slice(&both16(1));
            block[124..128].copy_from_slice(&both16(1));
            block[128..132].copy_from_slice(&both16(BLOCK as u16));

            block[156] = 34;
            block[158..166].copy_from_slice(&both32(root.0));
            block[166..174].copy_from_slice(&both32(root.1));
            block[181] = 2; // directory flag of the embedded record

            for b in &mut block[190..702] {
                *b = b' ';
            }
            block[190..197].copy_from_slice(b"TESTSET");
            block[318..327].copy_from_slice(b"PUBLISHER");
            block[813..830].copy_from_slice(b"2004060210300000\x00");
            block
        }

        /// Assemble the image.
        pub fn build(self) -> Vec<u8> {
            let mut image = vec![0u8; self.sectors * BLOCK];

            let mut lsn = 16;
            let place = |image: &mut Vec<u8>, lsn: usize, data: &[u8]| {
                image[lsn * BLOCK..lsn * BLOCK + data.len()].copy_from_slice(data);
            };

            place(&mut image, lsn, &self.descriptor(1, self.root));
            lsn += 1;
            if let Some(joliet) = self.joliet_root {
                place(&mut image, lsn, &self.descriptor(2, joliet));
                lsn += 1;
            }
            let mut terminator = vec![0u8; BLOCK];
            terminator[0] = 255;
            terminator[1..6].copy_from_slice(b"CD001");
            terminator[6] = 1;
            place(&mut image, lsn, &terminator);

            for (block_lsn, data) in &self.blocks {
                assert!(data.len() <= BLOCK * 8, "payload too large");
                let start = *block_lsn as usize * BLOCK;
                image[start..start + data.len()].copy_from_slice(data);
            }

            image
        }
    }
}

pub mod udf {
    //! UDF image assembly with valid descriptor tags.

    /// Logical block size of the images built here.
    pub const BLOCK: usize = 2048;
    /// First sector of the partition in the built images.
    pub const PARTITION_START: u32 = 100;

    /// CRC-CCITT with polynomial 0x1021 and initial value 0.
    pub fn crc_ccitt(data: &[u8]) -> u16 {
        let mut crc: u16 = 0;
        for &byte in data {
            crc ^= u16::from(byte) << 8;
            for _ in 0..8 {
                crc = if crc & 0x8000 != 0 {
                    (crc << 1) ^ 0x1021
                } else {
                    crc << 1
                };
            }
        }
        crc
    }

    /// A complete descriptor: valid 16-byte tag followed by `body`.
    pub fn descriptor(id: u16, location: u32, body: &[u8]) -> Vec<u8> {
        let mut tag = [0u8; 16];
        tag[0..2].copy_from_slice(&id.to_le_bytes());
        tag[2..4].copy_from_slice(&2u16.to_le_bytes());
        tag[8..10].copy_from_slice(&crc_ccitt(body).to_le_bytes());
        tag[10..12].copy_from_slice(&(body.len() as u16).to_le_bytes());
        tag[12..16].copy_from_slice(&location.to_le_bytes());

        let mut checksum = 0u8;
        for (i, &b) in tag.iter().enumerate() {
            if i != 4 {
                checksum = checksum.wrapping_add(b);
            }
        }
        tag[4] = checksum;

        let mut out = Vec::with_capacity(16 + body.len());
        out.extend_from_slice(&tag);
        out.extend_from_slice(body);
        out
    }

    /// A 16-byte long allocation descriptor.
    pub fn long_ad(len: u32, lba: u32, partition: u16) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[0..4].copy_from_slice(&len.to_le_bytes());
        out[4..8].copy_from_slice(&lba.to_le_bytes());
        out[8..10].copy_from_slice(&partition.to_le_bytes());
        out
    }

    /// An 8-byte short allocation descriptor.
    pub fn short_ad(len: u32, pos: u32) -> [u8; 8] {
        let mut out = [0u8; 8];
        out[0..4].copy_from_slice(&len.to_le_bytes());
        out[4..8].copy_from_slice(&pos.to_le_bytes());
        out
    }

    /// Encode a dstring into a fixed-size field, Latin-1 compressed.
    pub fn dstring(text: &str, field_len: usize) -> Vec<u8> {
        let mut out = vec![0u8; field_len];
        out[0] = 8;
        let bytes = text.as_bytes();
        out[1..1 + bytes.len()].copy_from_slice(bytes);
        out[field_len - 1] = (1 + bytes.len()) as u8;
        out
    }

    /// A file entry (tag 0x105) for a file or directory using short allocation
    /// descriptors.
    ///
    /// `lba` is the partition-relative block the entry is recorded at; `extents` are
    /// partition-relative (length, position) pairs.
    pub fn file_entry(
        lba: u32,
        file_type: u8,
        permissions: u32,
        info_len: u64,
        extents: &[(u32, u32)],
    ) -> Vec<u8> {
        let mut descs = Vec::new();
        for &(len, pos) in extents {
            descs.extend_from_slice(&short_ad(len, pos));
        }

        let mut body = vec![0u8; 160 + descs.len()];
        body[4..6].copy_from_slice(&4u16.to_le_bytes()); // strategy type 4
        body[11] = file_type;
        body[18..20].copy_from_slice(&0u16.to_le_bytes()); // short_ad form
        body[20..24].copy_from_slice(&1000u32.to_le_bytes()); // uid
        body[24..28].copy_from_slice(&100u32.to_le_bytes()); // gid
        body[28..32].copy_from_slice(&permissions.to_le_bytes());
        body[32..34].copy_from_slice(&1u16.to_le_bytes()); // link count
        body[40..48].copy_from_slice(&info_len.to_le_bytes());
        body[156..160].copy_from_slice(&(descs.len() as u32).to_le_bytes());
        body[160..].copy_from_slice(&descs);

        descriptor(0x105, lba, &body)
    }

    /// A file identifier descriptor with a Latin-1 compressed name.
    pub fn fid(characteristics: u8, name: &str, icb_lba: u32) -> Vec<u8> {
        let encoded = if name.is_empty() {
            Vec::new()
        } else {
            let mut out = vec![8u8];
            out.extend_from_slice(name.as_bytes());
            out
        };

        let name_len = encoded.len();
        let record_len = 4 * ((38 + name_len + 3) / 4);
        let mut body = vec![0u8; record_len - 16];
        body[0..2].copy_from_slice(&1u16.to_le_bytes());
        body[2] = characteristics;
        body[3] = name_len as u8;
        body[4..20].copy_from_slice(&long_ad(BLOCK as u32, icb_lba, 0));
        body[22..22 + name_len].copy_from_slice(&encoded);

        descriptor(0x101, 0, &body)
    }

    /// Builder for a complete UDF image.
    ///
    /// The layout is fixed: anchor at 256, descriptor sequence at 32, partition data
    /// from [`PARTITION_START`], file set descriptor at partition block 0 and the root
    /// directory ICB at partition block 1.
    pub struct UdfBuilder {
        sectors: usize,
        volume_id: String,
        partition_blocks: Vec<(u32, Vec<u8>)>,
        root_extents: Vec<(u32, u32)>,
        root_info_len: u64,
    }

    impl UdfBuilder {
        pub fn new() -> UdfBuilder {
            UdfBuilder {
                sectors: 600,
                volume_id: "UDFDISC".to_string(),
                partition_blocks: Vec::new(),
                root_extents: Vec::new(),
                root_info_len: 0,
            }
        }

        pub fn volume_id(mut self, id: &str) -> UdfBuilder {
            self.volume_id = id.to_string();
            self
        }

        /// Place a descriptor or data at a partition-relative block.
        pub fn partition_block(mut self, lba: u32, data: Vec<u8>) -> UdfBuilder {
            assert!(lba >= 2, "blocks 0 and 1 hold the file set and root ICB");
            self.partition_blocks.push((lba, data));
            self
        }

        /// Set the root directory data: its FID run and the partition-relative block
        /// holding it.
        pub fn root_dir(mut self, lba: u32, fids: &[Vec<u8>]) -> UdfBuilder {
            let data: Vec<u8> = fids.iter().flatten().copied().collect();
            self.root_info_len = data.len() as u64;
            self.root_extents = vec![(data.len() as u32, lba)];
            self.partition_blocks.push((lba, data));
            self
        }

        pub fn build(self) -> Vec<u8> {
            let mut image = vec![0u8; self.sectors * BLOCK];
            let place = |image: &mut Vec<u8>, lsn: u32, data: &[u8]| {
                let start = lsn as usize * BLOCK;
                image[start..start + data.len()].copy_from_slice(data);
            };

            // Anchor: main descriptor sequence of 4 sectors at 32.
            let mut anchor_body = vec![0u8; 496];
            anchor_body[0..4].copy_from_slice(&(4 * BLOCK as u32).to_le_bytes());
            anchor_body[4..8].copy_from_slice(&32u32.to_le_bytes());
            place(&mut image, 256, &descriptor(0x0002, 256, &anchor_body));

            // Primary volume descriptor.
            let mut pvd_body = vec![0u8; 496];
            pvd_body[8..40].copy_from_slice(&dstring(&self.volume_id, 32));
            pvd_body[56..184].copy_from_slice(&dstring("UDFSET", 128));
            place(&mut image, 32, &descriptor(0x0001, 32, &pvd_body));

            // Partition descriptor.
            let mut pd_body = vec![0u8; 496];
            pd_body[6..8].copy_from_slice(&0u16.to_le_bytes()); // partition number
            pd_body[172..176].copy_from_slice(&PARTITION_START.to_le_bytes());
            pd_body[176..180].copy_from_slice(&400u32.to_le_bytes());
            place(&mut image, 33, &descriptor(0x0005, 33, &pd_body));

            // Logical volume descriptor, file set at partition block 0.
            let mut lvd_body = vec![0u8; 496];
            lvd_body[68..196].copy_from_slice(&dstring("UDFLOGICAL", 128));
            lvd_body[196..200].copy_from_slice(&(BLOCK as u32).to_le_bytes());
            lvd_body[232..248].copy_from_slice(&long_ad(BLOCK as u32, 0, 0));
            place(&mut image, 34, &descriptor(0x0006, 34, &lvd_body));

            place(&mut image, 35, &descriptor(0x0008, 35, &vec![0u8; 496]));

            // File set descriptor, root ICB at partition block 1.
            let mut fsd_body = vec![0u8; 496];
            fsd_body[288..320].copy_from_slice(&dstring("UDFFILES", 32));
            fsd_body[384..400].copy_from_slice(&long_ad(BLOCK as u32, 1, 0));
            place(&mut image, PARTITION_START, &descriptor(0x0100, 0, &fsd_body));

            // Root directory ICB.
            let root = file_entry(1, 4, 0o5 | 0o5 << 5 | 0o7 << 10, self.root_info_len, &self.root_extents);
            place(&mut image, PARTITION_START + 1, &root);

            for (lba, data) in &self.partition_blocks {
                place(&mut image, PARTITION_START + lba, data);
            }

            image
        }
    }
}
