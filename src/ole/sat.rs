//! Sector allocation tables.
//!
//! Both the SAT and the SSAT are flat `sector -> next sector` maps built by
//! concatenating the 32-bit entries of their backing sectors:
//! - The SAT is stored in the sectors listed by the master SAT (see
//!   [`Header::sat_sectors`]) and addresses standard sectors of the file.
//! - The SSAT is itself an ordinary standard-sector chain and addresses mini
//!   sectors inside the mini stream (the root entry's own stream).
//!
//! Chains are walked with a visited bitset, so a corrupted table containing a
//! loop fails with [`Error::CyclicChain`] instead of spinning forever.

use std::io::{Read, Seek};

use fixedbitset::FixedBitSet;

use super::consts::*;
use super::header::{Header, read_sector};
use crate::common::binary::read_sector_ids;
use crate::common::error::{Error, Result};

/// A materialized allocation table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllocationTable {
    /// Next-sector entry for every sector covered by the table
    entries: Vec<u32>,
    /// Number of sectors that may appear in a chain
    limit: u32,
}

impl AllocationTable {
    /// Create a table from raw entries, with chains restricted to `limit` sectors.
    pub fn from_entries(entries: Vec<u32>, limit: u32) -> Self {
        let limit = limit.min(entries.len() as u32);
        Self { entries, limit }
    }

    /// Build the SAT from the master SAT sector list of `header`.
    ///
    /// `sector_limit` is the number of sectors present in the file; a master
    /// SAT entry at or beyond it is rejected.
    pub fn build_sat<S: Read + Seek + ?Sized>(
        source: &mut S,
        header: &Header,
        sector_limit: u32,
    ) -> Result<Self> {
        let sector_size = header.sector_size();
        let mut entries = Vec::with_capacity(header.sat_sectors.len() * (sector_size / 4));

        for &sid in &header.sat_sectors {
            if sid >= sector_limit {
                return Err(Error::SectorOutOfRange {
                    sid,
                    limit: sector_limit,
                });
            }
            entries.extend(read_sector_ids(&read_sector(source, sector_size, sid)?));
        }

        tracing::trace!(
            sat_sectors = header.sat_sectors.len(),
            entries = entries.len(),
            "SAT built"
        );
        Ok(Self::from_entries(entries, sector_limit))
    }

    /// Build the SSAT by walking its chain through the already built `sat`.
    ///
    /// `mini_sector_limit` is the number of mini sectors held by the mini
    /// stream.
    pub fn build_ssat<S: Read + Seek + ?Sized>(
        source: &mut S,
        header: &Header,
        sat: &AllocationTable,
        mini_sector_limit: u32,
    ) -> Result<Self> {
        let chain = sat.chain(header.ssat_start)?;
        if chain.len() != header.ssat_sector_count as usize {
            tracing::warn!(
                declared = header.ssat_sector_count,
                found = chain.len(),
                "SSAT sector count disagrees with its chain"
            );
        }

        let sector_size = header.sector_size();
        let mut entries = Vec::with_capacity(chain.len() * (sector_size / 4));
        for sid in chain {
            entries.extend(read_sector_ids(&read_sector(source, sector_size, sid)?));
        }

        tracing::trace!(entries = entries.len(), "SSAT built");
        Ok(Self::from_entries(entries, mini_sector_limit))
    }

    /// Follow the chain starting at `start` and return its sector ids in order.
    ///
    /// The chain ends at [`ENDOFCHAIN`] (or [`FREESECT`], which some writers
    /// leave in the last slot). A start of [`ENDOFCHAIN`] yields an empty chain.
    pub fn chain(&self, start: u32) -> Result<Vec<u32>> {
        self.chain_prefix(start, usize::MAX)
    }

    /// Like [`chain`](Self::chain), but stops once `max_len` sectors are known.
    ///
    /// Entries past the part of a chain a stream actually needs are never
    /// looked at.
    pub fn chain_prefix(&self, start: u32, max_len: usize) -> Result<Vec<u32>> {
        let mut chain = Vec::new();
        let mut visited = FixedBitSet::with_capacity(self.limit as usize);
        let mut sid = start;

        while chain.len() < max_len && sid != ENDOFCHAIN && sid != FREESECT {
            if sid >= self.limit {
                return Err(Error::SectorOutOfRange {
                    sid,
                    limit: self.limit,
                });
            }
            if visited.put(sid as usize) {
                return Err(Error::CyclicChain { sid });
            }
            chain.push(sid);
            sid = self.entries[sid as usize];
        }

        Ok(chain)
    }

    /// Next-sector entry for `sid`, if the table covers it.
    #[inline]
    pub fn next(&self, sid: u32) -> Option<u32> {
        self.entries.get(sid as usize).copied()
    }

    /// Number of entries in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of sectors that may appear in a chain.
    #[inline]
    pub fn limit(&self) -> u32 {
        self.limit
    }
}
