//! File metadata returned by the filesystem readers.
//!
//! This module defines [`crate::FileStat`], the common result type of `stat` and `readdir`
//! for both the ISO 9660 and UDF readers, together with the decoded timestamp type
//! [`crate::DiscTime`] and the POSIX attribute block carried by Rock Ridge entries and UDF
//! file entries.
//!
//! # Key Components
//!
//! - [`crate::FileStat`] - Name, kind, size, extents and optional POSIX attributes
//! - [`crate::FileKind`] - File / directory / symlink classification
//! - [`crate::Extent`] - One contiguous run of blocks belonging to a file
//! - [`crate::PosixAttributes`] - mode / nlink / uid / gid
//! - [`crate::DiscTime`] - Calendar timestamp with UTC offset
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use discscope::DiscImage;
//!
//! let mut image = DiscImage::open("image.iso".as_ref())?;
//! if let Some(stat) = image.stat("/README.TXT")? {
//!     println!("{} {:>10} {}", stat.mode_string(), stat.size, stat.name);
//! }
//! # Ok::<(), discscope::Error>(())
//! ```

/// Logical block size shared by ISO 9660 and UDF volumes.
pub const BLOCK_SIZE: u32 = 2048;

/// File type bits within a POSIX mode word.
pub const S_IFMT: u32 = 0o170000;
/// POSIX mode bits: socket.
pub const S_IFSOCK: u32 = 0o140000;
/// POSIX mode bits: symbolic link.
pub const S_IFLNK: u32 = 0o120000;
/// POSIX mode bits: regular file.
pub const S_IFREG: u32 = 0o100000;
/// POSIX mode bits: block device.
pub const S_IFBLK: u32 = 0o060000;
/// POSIX mode bits: directory.
pub const S_IFDIR: u32 = 0o040000;
/// POSIX mode bits: character device.
pub const S_IFCHR: u32 = 0o020000;
/// POSIX mode bits: FIFO.
pub const S_IFIFO: u32 = 0o010000;
/// POSIX mode bits: set-user-id.
pub const S_ISUID: u32 = 0o4000;
/// POSIX mode bits: set-group-id.
pub const S_ISGID: u32 = 0o2000;
/// POSIX mode bits: sticky.
pub const S_ISVTX: u32 = 0o1000;

/// Classification of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link (Rock Ridge `SL` or UDF symlink ICB)
    Symlink,
    /// Anything else (devices, sockets, FIFOs)
    Other,
}

/// One contiguous run of logical blocks belonging to a file.
///
/// Plain files have a single extent; ISO 9660 multi-extent files and UDF files with several
/// allocation descriptors have one entry per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    /// First logical block of the run
    pub lsn: u32,
    /// Size of the run in bytes
    pub size: u32,
}

impl Extent {
    /// Number of logical blocks covered by this extent, rounding up.
    #[must_use]
    pub fn blocks(&self) -> u32 {
        self.size.div_ceil(BLOCK_SIZE)
    }

    /// Returns `true` if `lsn` falls inside this extent.
    #[must_use]
    pub fn contains(&self, lsn: u32) -> bool {
        // extents near the top of the address space must not wrap
        lsn >= self.lsn && u64::from(lsn) < u64::from(self.lsn) + u64::from(self.blocks().max(1))
    }
}

/// POSIX file attributes from Rock Ridge `PX` fields or UDF file entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PosixAttributes {
    /// Full mode word including the file type bits
    pub mode: u32,
    /// Link count
    pub nlink: u32,
    /// Owner user id
    pub uid: u32,
    /// Owner group id
    pub gid: u32,
}

/// A decoded on-disc timestamp.
///
/// Covers the ISO 9660 7-byte binary form, the 17-byte ASCII long form used in volume
/// descriptors, and the UDF 12-byte timestamp. The all-zero encodings that both standards
/// use for "not specified" decode to `None` at the call sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscTime {
    /// Full year (e.g. 2004)
    pub year: i32,
    /// Month, 1-12
    pub month: u8,
    /// Day of month, 1-31
    pub day: u8,
    /// Hour, 0-23
    pub hour: u8,
    /// Minute, 0-59
    pub minute: u8,
    /// Second, 0-59
    pub second: u8,
    /// Offset from UTC in minutes
    pub utc_offset_minutes: i16,
}

impl DiscTime {
    /// Decode the 7-byte binary timestamp used in directory records and Rock Ridge `TF`
    /// fields: year since 1900, month, day, hour, minute, second, and the offset from UTC
    /// in 15-minute intervals as a signed byte.
    ///
    /// Returns `None` for the all-zero "not specified" encoding.
    #[must_use]
    pub fn from_dtime(bytes: &[u8]) -> Option<DiscTime> {
        if bytes.len() < 7 {
            return None;
        }

        if bytes[..6].iter().all(|&b| b == 0) {
            return None;
        }

        Some(DiscTime {
            year: 1900 + i32::from(bytes[0]),
            month: bytes[1],
            day: bytes[2],
            hour: bytes[3],
            minute: bytes[4],
            second: bytes[5],
            utc_offset_minutes: i16::from(bytes[6] as i8) * 15,
        })
    }

    /// Decode the 17-byte ASCII timestamp used in volume descriptors and Rock Ridge long
    /// form stamps: 4-digit year, then 2 digits each for month, day, hour, minute, second
    /// and centiseconds, followed by the UTC offset in 15-minute intervals.
    ///
    /// Returns `None` if the digits are missing or the year is zero.
    #[must_use]
    pub fn from_ltime(bytes: &[u8]) -> Option<DiscTime> {
        if bytes.len() < 17 {
            return None;
        }

        fn digits(bytes: &[u8]) -> Option<u32> {
            let mut value = 0u32;
            for &b in bytes {
                if !b.is_ascii_digit() {
                    return None;
                }
                value = value * 10 + u32::from(b - b'0');
            }
            Some(value)
        }

        let year = digits(&bytes[0..4])?;
        if year == 0 {
            return None;
        }

        #[allow(clippy::cast_possible_truncation)]
        Some(DiscTime {
            year: year as i32,
            month: digits(&bytes[4..6])? as u8,
            day: digits(&bytes[6..8])? as u8,
            hour: digits(&bytes[8..10])? as u8,
            minute: digits(&bytes[10..12])? as u8,
            second: digits(&bytes[12..14])? as u8,
            utc_offset_minutes: i16::from(bytes[16] as i8) * 15,
        })
    }

    /// Decode the 12-byte UDF timestamp: a 16-bit type/timezone word, 16-bit year, then
    /// month, day, hour, minute, second and sub-second fields.
    ///
    /// Returns `None` if the year is zero.
    #[must_use]
    pub fn from_udf_timestamp(bytes: &[u8]) -> Option<DiscTime> {
        if bytes.len() < 12 {
            return None;
        }

        let type_and_tz = u16::from_le_bytes([bytes[0], bytes[1]]);
        let year = u16::from_le_bytes([bytes[2], bytes[3]]);
        if year == 0 {
            return None;
        }

        // 12-bit two's complement offset in minutes, -2047 meaning "not specified"
        let mut tz = i32::from(type_and_tz & 0x0FFF);
        if tz & 0x800 != 0 {
            tz -= 4096;
        }
        if !(-1440..=1440).contains(&tz) {
            tz = 0;
        }

        #[allow(clippy::cast_possible_truncation)]
        Some(DiscTime {
            year: i32::from(year),
            month: bytes[4],
            day: bytes[5],
            hour: bytes[6],
            minute: bytes[7],
            second: bytes[8],
            utc_offset_minutes: tz as i16,
        })
    }
}

/// Metadata for one directory entry, as returned by `stat` and `readdir`.
///
/// The optional fields depend on what the volume records: `posix` and `symlink` come from
/// Rock Ridge on ISO 9660 volumes and are always present on UDF volumes, `time` is absent
/// when the on-disc timestamp is the "not specified" encoding.
#[derive(Debug, Clone)]
pub struct FileStat {
    /// Entry name, decoded according to the active extensions
    pub name: String,
    /// Entry classification
    pub kind: FileKind,
    /// Total size in bytes, summed over all extents
    pub size: u64,
    /// The block runs holding the entry's data
    pub extents: Vec<Extent>,
    /// Recording timestamp
    pub time: Option<DiscTime>,
    /// POSIX attributes, when the volume records them
    pub posix: Option<PosixAttributes>,
    /// Symbolic link target, when the entry is a symlink
    pub symlink: Option<String>,
    /// `true` if Rock Ridge fields were found for this entry
    pub rock_ridge: bool,
}

impl FileStat {
    /// Returns `true` if this entry is a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    /// First logical block of the entry's data, if it has any.
    #[must_use]
    pub fn lsn(&self) -> Option<u32> {
        self.extents.first().map(|e| e.lsn)
    }

    /// Returns `true` if `lsn` falls inside any of the entry's extents.
    #[must_use]
    pub fn contains_block(&self, lsn: u32) -> bool {
        self.extents.iter().any(|e| e.contains(lsn))
    }

    /// The effective POSIX mode word, synthesized from the kind when the volume does not
    /// record one.
    #[must_use]
    pub fn mode(&self) -> u32 {
        if let Some(posix) = &self.posix {
            return posix.mode;
        }

        match self.kind {
            FileKind::Directory => S_IFDIR | 0o555,
            FileKind::Symlink => S_IFLNK | 0o777,
            FileKind::File | FileKind::Other => S_IFREG | 0o444,
        }
    }

    /// Render the mode as the classic ls-style 10-character string, e.g. `drwxr-xr-x`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use discscope::{Extent, FileKind, FileStat};
    ///
    /// let stat = FileStat {
    ///     name: "readme.txt".to_string(),
    ///     kind: FileKind::File,
    ///     size: 42,
    ///     extents: vec![Extent { lsn: 30, size: 42 }],
    ///     time: None,
    ///     posix: None,
    ///     symlink: None,
    ///     rock_ridge: false,
    /// };
    /// assert_eq!(stat.mode_string(), "-r--r--r--");
    /// ```
    #[must_use]
    pub fn mode_string(&self) -> String {
        let mode = self.mode();
        let mut chars: [u8; 10] = *b"----------";

        chars[0] = match mode & S_IFMT {
            S_IFBLK => b'b',
            S_IFCHR => b'c',
            S_IFDIR => b'd',
            S_IFREG => b'-',
            S_IFIFO => b'p',
            S_IFLNK => b'l',
            S_IFSOCK => b's',
            _ => b'?',
        };

        let perms = [b'r', b'w', b'x'];
        for group in 0..3 {
            for (bit, &ch) in perms.iter().enumerate() {
                let mask = 1 << (8 - (group * 3 + bit));
                if mode & mask != 0 {
                    chars[1 + group * 3 + bit] = ch;
                }
            }
        }

        if mode & S_ISUID != 0 {
            chars[3] = if chars[3] == b'x' { b's' } else { b'S' };
        }
        if mode & S_ISGID != 0 {
            chars[6] = if chars[6] == b'x' { b's' } else { b'S' };
        }
        if mode & S_ISVTX != 0 {
            chars[9] = if chars[9] == b'x' { b't' } else { b'T' };
        }

        String::from_utf8_lossy(&chars).into_owned()
    }
}
