//! Compound document header parsing.
//!
//! The header occupies the first 512 bytes of the file (padded to a whole
//! sector for 4096-byte sector documents). Besides the geometry of the file
//! it stores the first 109 entries of the master SAT; larger files continue
//! the master SAT in a chain of DIFAT sectors, which is followed here so the
//! header hands out the complete ordered list of SAT sector ids.

use std::io::{self, Read, Seek, SeekFrom};

use fixedbitset::FixedBitSet;
use zerocopy::{FromBytes, LE, U16, U32};
use zerocopy_derive::FromBytes as DeriveFromBytes;

use super::consts::*;
use super::options::OpenOptions;
use crate::common::binary::{format_clsid, read_sector_ids};
use crate::common::error::{Error, Result};

/// Raw header structure (512 bytes)
///
/// This represents the on-disk format of the header.
#[derive(Debug, Clone, DeriveFromBytes)]
#[repr(C)]
struct RawHeader {
    /// Signature, must equal [`MAGIC`]
    magic: [u8; 8],
    /// Class id, normally all zeros
    clsid: [u8; 16],
    /// Minor version (0x003E)
    minor_version: U16<LE>,
    /// Major version (3 or 4)
    major_version: U16<LE>,
    /// Byte order mark (0xFFFE)
    byte_order: U16<LE>,
    /// Sector size exponent
    sector_shift: U16<LE>,
    /// Mini sector size exponent
    mini_sector_shift: U16<LE>,
    /// Reserved
    #[allow(dead_code)]
    reserved: [u8; 6],
    /// Number of directory sectors (version 4 only)
    num_dir_sectors: U32<LE>,
    /// Number of SAT sectors
    num_sat_sectors: U32<LE>,
    /// First directory sector
    first_dir_sector: U32<LE>,
    /// Transaction signature
    #[allow(dead_code)]
    transaction_signature: U32<LE>,
    /// Streams smaller than this live in the mini stream
    mini_stream_cutoff: U32<LE>,
    /// First SSAT sector
    first_ssat_sector: U32<LE>,
    /// Number of SSAT sectors
    num_ssat_sectors: U32<LE>,
    /// First DIFAT sector
    first_difat_sector: U32<LE>,
    /// Number of DIFAT sectors
    num_difat_sectors: U32<LE>,
    /// First 109 master SAT entries
    difat: [U32<LE>; HEADER_DIFAT_ENTRIES],
}

/// Parsed compound document header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// Class id of the document (usually all zeros)
    pub class_id: [u8; 16],
    /// Minor format version
    pub minor_version: u16,
    /// Major format version (3 for 512-byte sectors, 4 for 4096-byte sectors)
    pub major_version: u16,
    /// Sector size exponent
    pub sector_shift: u16,
    /// Mini sector size exponent
    pub mini_sector_shift: u16,
    /// Number of directory sectors (always 0 for version 3)
    pub directory_sector_count: u32,
    /// Number of SAT sectors declared by the header
    pub sat_sector_count: u32,
    /// First sector of the directory stream
    pub directory_start: u32,
    /// Minimum size of a stream stored in standard sectors
    pub mini_stream_cutoff: u32,
    /// First sector of the SSAT
    pub ssat_start: u32,
    /// Number of SSAT sectors declared by the header
    pub ssat_sector_count: u32,
    /// First DIFAT sector, or [`ENDOFCHAIN`]
    pub difat_start: u32,
    /// Number of DIFAT sectors
    pub difat_sector_count: u32,
    /// Complete, ordered list of SAT sector ids (inline entries plus DIFAT)
    pub sat_sectors: Vec<u32>,
}

impl Header {
    /// Read and validate the header of `source`.
    ///
    /// `file_len` is the total length of the source in bytes; it bounds the
    /// DIFAT sectors that may be visited.
    pub fn parse<S: Read + Seek + ?Sized>(
        source: &mut S,
        file_len: u64,
        options: &OpenOptions,
    ) -> Result<Self> {
        if file_len < HEADER_SIZE as u64 {
            return Err(Error::TruncatedHeader {
                expected: HEADER_SIZE as u64,
                available: file_len,
            });
        }

        let mut block = [0u8; HEADER_SIZE];
        source.seek(SeekFrom::Start(0))?;
        source.read_exact(&mut block).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => Error::TruncatedHeader {
                expected: HEADER_SIZE as u64,
                available: file_len,
            },
            _ => Error::Io(e),
        })?;

        let raw = RawHeader::read_from_bytes(&block[..])
            .map_err(|_| Error::InvalidFormat("Failed to parse header".to_string()))?;

        if &raw.magic != MAGIC {
            return Err(Error::NotCompoundDocument);
        }

        let byte_order = raw.byte_order.get();
        if byte_order != BYTE_ORDER_LE {
            return Err(Error::UnsupportedByteOrder(byte_order));
        }

        let major_version = raw.major_version.get();
        let sector_shift = raw.sector_shift.get();
        let mini_sector_shift = raw.mini_sector_shift.get();
        validate_geometry(major_version, sector_shift, mini_sector_shift, options)?;

        let mut header = Header {
            class_id: raw.clsid,
            minor_version: raw.minor_version.get(),
            major_version,
            sector_shift,
            mini_sector_shift,
            directory_sector_count: raw.num_dir_sectors.get(),
            sat_sector_count: raw.num_sat_sectors.get(),
            directory_start: raw.first_dir_sector.get(),
            mini_stream_cutoff: raw.mini_stream_cutoff.get(),
            ssat_start: raw.first_ssat_sector.get(),
            ssat_sector_count: raw.num_ssat_sectors.get(),
            difat_start: raw.first_difat_sector.get(),
            difat_sector_count: raw.num_difat_sectors.get(),
            sat_sectors: Vec::new(),
        };

        // The header block is padded out to one full sector
        if file_len < header.sector_size() as u64 {
            return Err(Error::TruncatedHeader {
                expected: header.sector_size() as u64,
                available: file_len,
            });
        }

        let wanted = header.sat_sector_count as usize;
        let inline = wanted.min(HEADER_DIFAT_ENTRIES);
        header.sat_sectors.reserve(inline);
        header
            .sat_sectors
            .extend(raw.difat[..inline].iter().map(|sid| sid.get()));

        if wanted > HEADER_DIFAT_ENTRIES {
            let sector_limit = header.sector_limit(file_len);
            header.read_difat_chain(source, sector_limit, wanted)?;
        }

        if header.sat_sectors.len() < wanted {
            tracing::warn!(
                declared = wanted,
                found = header.sat_sectors.len(),
                "master SAT shorter than the declared SAT sector count"
            );
        }

        Ok(header)
    }

    /// Follow the DIFAT chain, appending SAT sector ids until `wanted` are known.
    fn read_difat_chain<S: Read + Seek + ?Sized>(
        &mut self,
        source: &mut S,
        sector_limit: u32,
        wanted: usize,
    ) -> Result<()> {
        // Each DIFAT sector ends with the id of the next DIFAT sector
        let ids_per_sector = self.sector_size() / 4 - 1;
        let mut visited = FixedBitSet::with_capacity(sector_limit as usize);
        let mut sid = self.difat_start;
        let mut remaining = self.difat_sector_count;

        while remaining > 0 && sid != ENDOFCHAIN && sid != FREESECT {
            if sid >= sector_limit {
                return Err(Error::SectorOutOfRange {
                    sid,
                    limit: sector_limit,
                });
            }
            if visited.put(sid as usize) {
                return Err(Error::CyclicChain { sid });
            }

            let sector = read_sector(source, self.sector_size(), sid)?;
            let ids = read_sector_ids(&sector);
            for &id in &ids[..ids_per_sector] {
                if self.sat_sectors.len() == wanted {
                    break;
                }
                if id != FREESECT {
                    self.sat_sectors.push(id);
                }
            }

            sid = ids[ids_per_sector];
            remaining -= 1;
        }

        tracing::trace!(
            difat_sectors = self.difat_sector_count - remaining,
            sat_sectors = self.sat_sectors.len(),
            "master SAT chain followed"
        );
        Ok(())
    }

    /// Sector size in bytes.
    #[inline]
    pub fn sector_size(&self) -> usize {
        1usize << self.sector_shift
    }

    /// Mini sector size in bytes.
    #[inline]
    pub fn mini_sector_size(&self) -> usize {
        1usize << self.mini_sector_shift
    }

    /// Whether a stream of `size` bytes is stored in the mini stream.
    #[inline]
    pub fn is_mini_stream(&self, size: u64) -> bool {
        size < self.mini_stream_cutoff as u64
    }

    /// Number of whole or partial sectors following the header in a file of
    /// `file_len` bytes.
    pub fn sector_limit(&self, file_len: u64) -> u32 {
        let sectors = file_len.div_ceil(self.sector_size() as u64).saturating_sub(1);
        sectors.min(MAXREGSECT as u64 + 1) as u32
    }

    /// Class id formatted as a GUID string, empty when unset.
    pub fn class_id_string(&self) -> String {
        format_clsid(&self.class_id)
    }
}

fn validate_geometry(
    major_version: u16,
    sector_shift: u16,
    mini_sector_shift: u16,
    options: &OpenOptions,
) -> Result<()> {
    if !(MIN_SECTOR_SHIFT..=MAX_SECTOR_SHIFT).contains(&sector_shift) {
        return Err(Error::InvalidFormat(format!(
            "Unsupported sector shift {}",
            sector_shift
        )));
    }
    if mini_sector_shift == 0 || mini_sector_shift > sector_shift {
        return Err(Error::InvalidFormat(format!(
            "Mini sector shift {} incompatible with sector shift {}",
            mini_sector_shift, sector_shift
        )));
    }

    let sector_size = 1usize << sector_shift;
    if options.strict_sector_size
        && ((major_version == 3 && sector_size != SECTOR_SIZE_V3)
            || (major_version == 4 && sector_size != SECTOR_SIZE_V4))
    {
        return Err(Error::InvalidFormat(format!(
            "Sector size mismatch: version {} with {}-byte sectors",
            major_version, sector_size
        )));
    }
    Ok(())
}

/// Byte offset of sector `sid`; sector 0 starts right after the header sector.
#[inline]
pub(crate) fn sector_offset(sector_size: usize, sid: u32) -> u64 {
    (sid as u64 + 1) * sector_size as u64
}

/// Read one whole sector from the source.
pub(crate) fn read_sector<S: Read + Seek + ?Sized>(
    source: &mut S,
    sector_size: usize,
    sid: u32,
) -> Result<Vec<u8>> {
    source.seek(SeekFrom::Start(sector_offset(sector_size, sid)))?;
    let mut buffer = vec![0u8; sector_size];
    source.read_exact(&mut buffer).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::TruncatedSector { sid },
        _ => Error::Io(e),
    })?;
    Ok(buffer)
}
