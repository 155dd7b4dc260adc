//! Synthetic compound document images for tests.
//!
//! [`DocumentBuilder`] lays a document out in a fixed order so tests can
//! patch known offsets afterwards:
//!
//! ```text
//! header | SAT sectors | DIFAT sectors | directory | SSAT | mini stream | large streams
//! ```
//!
//! Sibling trees are written with the midpoint rule: the middle child of the
//! sorted list is the subtree root, with the smaller names chained to its
//! left and the larger ones to its right.

use std::collections::HashMap;

use super::consts::*;
use super::directory::compare_names;

const MINI_SECTOR_SHIFT: u16 = 6;

pub(crate) fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn get_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

/// Byte offset of directory record `did` in a builder image with 512-byte
/// sectors (the builder keeps the directory contiguous).
pub(crate) fn directory_record_offset(bytes: &[u8], did: u32) -> usize {
    let first = get_u32(bytes, 48) as usize;
    (first + 1) * 512 + did as usize * DIRENTRY_SIZE
}

/// Move the sectors of record `did`'s chain into reverse physical order,
/// relinking the SAT so the logical contents stay the same.
///
/// Works on builder images with 512-byte sectors, where the SAT sectors
/// are contiguous from sector 0. Returns the new chain in logical order.
pub(crate) fn reverse_chain(bytes: &mut [u8], did: u32) -> Vec<u32> {
    const SECTOR: usize = 512;
    let record = directory_record_offset(bytes, did);
    let sector = |sid: u32| (sid as usize + 1) * SECTOR;
    let sat_entry = |sid: u32| SECTOR + sid as usize * 4;

    let mut chain = vec![get_u32(bytes, record + 116)];
    loop {
        let next = get_u32(bytes, sat_entry(chain[chain.len() - 1]));
        if next == ENDOFCHAIN {
            break;
        }
        chain.push(next);
    }

    let contents: Vec<Vec<u8>> = chain
        .iter()
        .map(|&sid| bytes[sector(sid)..sector(sid) + SECTOR].to_vec())
        .collect();
    let placed: Vec<u32> = chain.iter().rev().copied().collect();
    for (i, &sid) in placed.iter().enumerate() {
        bytes[sector(sid)..sector(sid) + SECTOR].copy_from_slice(&contents[i]);
        put_u32(bytes, sat_entry(sid), placed.get(i + 1).copied().unwrap_or(ENDOFCHAIN));
    }
    put_u32(bytes, record + 116, placed[0]);
    placed
}

#[derive(Debug, Clone)]
struct Node {
    name: String,
    kind: u8,
    data: Vec<u8>,
    children: Vec<usize>,
    class_id: [u8; 16],
    created: u64,
    modified: u64,
    start_sector: u32,
    left: u32,
    right: u32,
    child: u32,
}

impl Node {
    fn new(name: &str, kind: u8) -> Self {
        Self {
            name: name.to_string(),
            kind,
            data: Vec::new(),
            children: Vec::new(),
            class_id: [0; 16],
            created: 0,
            modified: 0,
            start_sector: ENDOFCHAIN,
            left: NOSTREAM,
            right: NOSTREAM,
            child: NOSTREAM,
        }
    }

    fn to_bytes(&self, size: u64) -> [u8; DIRENTRY_SIZE] {
        let mut data = [0u8; DIRENTRY_SIZE];

        let units: Vec<u16> = self.name.encode_utf16().take(31).collect();
        for (i, unit) in units.iter().enumerate() {
            put_u16(&mut data, i * 2, *unit);
        }
        if self.kind != STGTY_EMPTY {
            put_u16(&mut data, 64, ((units.len() + 1) * 2) as u16);
        }

        data[66] = self.kind;
        data[67] = 1;
        put_u32(&mut data, 68, self.left);
        put_u32(&mut data, 72, self.right);
        put_u32(&mut data, 76, self.child);
        data[80..96].copy_from_slice(&self.class_id);
        data[100..108].copy_from_slice(&self.created.to_le_bytes());
        data[108..116].copy_from_slice(&self.modified.to_le_bytes());
        put_u32(&mut data, 116, self.start_sector);
        data[120..128].copy_from_slice(&size.to_le_bytes());
        data
    }
}

/// Builds valid compound document images in memory.
#[derive(Debug, Clone)]
pub(crate) struct DocumentBuilder {
    sector_shift: u16,
    min_sat_sectors: usize,
    insertion_order_links: bool,
    nodes: Vec<Node>,
    paths: HashMap<Vec<String>, usize>,
}

impl DocumentBuilder {
    pub(crate) fn new() -> Self {
        let mut paths = HashMap::new();
        paths.insert(Vec::new(), 0);
        Self {
            sector_shift: 9,
            min_sat_sectors: 1,
            insertion_order_links: false,
            nodes: vec![Node::new(ROOT_ENTRY_NAME, STGTY_ROOT)],
            paths,
        }
    }

    /// Use `1 << shift` byte sectors (9 or 12 for valid documents).
    pub(crate) fn sector_shift(mut self, shift: u16) -> Self {
        self.sector_shift = shift;
        self
    }

    /// Allocate at least `count` SAT sectors, forcing DIFAT sectors past 109.
    pub(crate) fn min_sat_sectors(mut self, count: usize) -> Self {
        self.min_sat_sectors = count;
        self
    }

    /// Link siblings as a right-leaning chain in insertion order instead of a
    /// sorted tree.
    pub(crate) fn insertion_order_links(mut self) -> Self {
        self.insertion_order_links = true;
        self
    }

    /// Add a storage (and any missing parents).
    pub(crate) fn storage(mut self, path: &[&str]) -> Self {
        self.ensure_storage(path);
        self
    }

    /// Add a stream (and any missing parent storages).
    pub(crate) fn stream(mut self, path: &[&str], data: &[u8]) -> Self {
        let (name, parent_path) = path.split_last().expect("stream path must not be empty");
        let parent = self.ensure_storage(parent_path);

        let mut node = Node::new(name, STGTY_STREAM);
        node.data = data.to_vec();
        let index = self.push(parent, node);
        self.paths.insert(owned(path), index);
        self
    }

    pub(crate) fn class_id(mut self, path: &[&str], class_id: [u8; 16]) -> Self {
        let index = self.paths[&owned(path)];
        self.nodes[index].class_id = class_id;
        self
    }

    pub(crate) fn timestamps(mut self, path: &[&str], created: u64, modified: u64) -> Self {
        let index = self.paths[&owned(path)];
        self.nodes[index].created = created;
        self.nodes[index].modified = modified;
        self
    }

    fn ensure_storage(&mut self, path: &[&str]) -> usize {
        let mut parent = 0;
        for depth in 1..=path.len() {
            let key = owned(&path[..depth]);
            parent = match self.paths.get(&key) {
                Some(&index) => index,
                None => {
                    let index = self.push(parent, Node::new(path[depth - 1], STGTY_STORAGE));
                    self.paths.insert(key, index);
                    index
                },
            };
        }
        parent
    }

    fn push(&mut self, parent: usize, node: Node) -> usize {
        let index = self.nodes.len();
        self.nodes.push(node);
        self.nodes[parent].children.push(index);
        index
    }

    /// Serialize the document.
    pub(crate) fn build(mut self) -> Vec<u8> {
        let sector_size = 1usize << self.sector_shift;
        let mini_size = 1usize << MINI_SECTOR_SHIFT;
        let cutoff = DEFAULT_MINI_STREAM_CUTOFF as usize;

        // Mini streams first: their chains only depend on the mini stream
        let mut ministream = Vec::new();
        let mut ssat: Vec<u32> = Vec::new();
        for node in &mut self.nodes {
            if node.kind != STGTY_STREAM || node.data.is_empty() || node.data.len() >= cutoff {
                continue;
            }
            let count = node.data.len().div_ceil(mini_size);
            let start = ssat.len() as u32;
            for i in 0..count as u32 {
                ssat.push(if i + 1 == count as u32 { ENDOFCHAIN } else { start + i + 1 });
            }
            node.start_sector = start;
            ministream.extend_from_slice(&node.data);
            ministream.resize(ssat.len() * mini_size, 0);
        }

        let dir_sectors = (self.nodes.len() * DIRENTRY_SIZE).div_ceil(sector_size);
        let ssat_sectors = (ssat.len() * 4).div_ceil(sector_size);
        let ministream_sectors = ministream.len().div_ceil(sector_size);
        let large_sectors: usize = self
            .nodes
            .iter()
            .filter(|n| n.kind == STGTY_STREAM && n.data.len() >= cutoff)
            .map(|n| n.data.len().div_ceil(sector_size))
            .sum();
        let content = dir_sectors + ssat_sectors + ministream_sectors + large_sectors;

        let ids_per_sector = sector_size / 4;
        let difat_for = |sat: usize| {
            sat.saturating_sub(HEADER_DIFAT_ENTRIES)
                .div_ceil(ids_per_sector - 1)
        };
        let mut sat_sectors = self.min_sat_sectors.max(1);
        while sat_sectors * ids_per_sector < sat_sectors + difat_for(sat_sectors) + content {
            sat_sectors += 1;
        }
        let difat_sectors = difat_for(sat_sectors);

        // Sector allocation
        let mut sat = vec![FREESECT; sat_sectors * ids_per_sector];
        let mut next = 0usize;
        let mut allocate = |sat: &mut Vec<u32>, count: usize, marker: Option<u32>| -> u32 {
            if count == 0 {
                return ENDOFCHAIN;
            }
            let start = next;
            for i in start..start + count {
                sat[i] = match marker {
                    Some(marker) => marker,
                    None if i + 1 == start + count => ENDOFCHAIN,
                    None => i as u32 + 1,
                };
            }
            next += count;
            start as u32
        };

        allocate(&mut sat, sat_sectors, Some(FATSECT));
        let difat_start = allocate(&mut sat, difat_sectors, Some(DIFSECT));
        let dir_start = allocate(&mut sat, dir_sectors, None);
        let ssat_start = allocate(&mut sat, ssat_sectors, None);
        let ministream_start = allocate(&mut sat, ministream_sectors, None);
        for node in &mut self.nodes {
            if node.kind == STGTY_STREAM && node.data.len() >= cutoff {
                node.start_sector = allocate(&mut sat, node.data.len().div_ceil(sector_size), None);
            }
        }

        self.nodes[0].start_sector = ministream_start;
        self.link_all();

        // Header
        let mut out = vec![0u8; sector_size];
        out[..8].copy_from_slice(MAGIC);
        put_u16(&mut out, 24, 0x003E);
        put_u16(&mut out, 26, if sector_size == SECTOR_SIZE_V4 { 4 } else { 3 });
        put_u16(&mut out, 28, BYTE_ORDER_LE);
        put_u16(&mut out, 30, self.sector_shift);
        put_u16(&mut out, 32, MINI_SECTOR_SHIFT);
        if sector_size == SECTOR_SIZE_V4 {
            put_u32(&mut out, 40, dir_sectors as u32);
        }
        put_u32(&mut out, 44, sat_sectors as u32);
        put_u32(&mut out, 48, dir_start);
        put_u32(&mut out, 56, DEFAULT_MINI_STREAM_CUTOFF);
        put_u32(&mut out, 60, ssat_start);
        put_u32(&mut out, 64, ssat_sectors as u32);
        put_u32(&mut out, 68, difat_start);
        put_u32(&mut out, 72, difat_sectors as u32);
        for slot in 0..HEADER_DIFAT_ENTRIES {
            let value = if slot < sat_sectors { slot as u32 } else { FREESECT };
            put_u32(&mut out, 76 + slot * 4, value);
        }

        // SAT
        for id in &sat {
            out.extend_from_slice(&id.to_le_bytes());
        }

        // DIFAT: SAT sector ids past the header, then the next DIFAT sector
        let overflow: Vec<u32> = (HEADER_DIFAT_ENTRIES..sat_sectors).map(|s| s as u32).collect();
        for i in 0..difat_sectors {
            let mut sector = vec![0u8; sector_size];
            for slot in 0..ids_per_sector - 1 {
                let value = overflow
                    .get(i * (ids_per_sector - 1) + slot)
                    .copied()
                    .unwrap_or(FREESECT);
                put_u32(&mut sector, slot * 4, value);
            }
            let next_difat = if i + 1 == difat_sectors {
                ENDOFCHAIN
            } else {
                difat_start + i as u32 + 1
            };
            put_u32(&mut sector, sector_size - 4, next_difat);
            out.extend_from_slice(&sector);
        }

        // Directory, padded with empty records
        let mut directory = Vec::with_capacity(dir_sectors * sector_size);
        for (i, node) in self.nodes.iter().enumerate() {
            let size = if i == 0 {
                ministream.len() as u64
            } else if node.kind == STGTY_STREAM {
                node.data.len() as u64
            } else {
                0
            };
            directory.extend_from_slice(&node.to_bytes(size));
        }
        let empty = Node::new("", STGTY_EMPTY).to_bytes(0);
        while directory.len() < dir_sectors * sector_size {
            directory.extend_from_slice(&empty);
        }
        out.extend_from_slice(&directory);

        // SSAT
        let mut ssat_bytes: Vec<u8> = ssat.iter().flat_map(|id| id.to_le_bytes()).collect();
        ssat_bytes.resize(ssat_sectors * sector_size, 0xFF);
        out.extend_from_slice(&ssat_bytes);

        // Mini stream
        ministream.resize(ministream_sectors * sector_size, 0);
        out.extend_from_slice(&ministream);

        // Large streams in allocation order
        for node in &self.nodes {
            if node.kind == STGTY_STREAM && node.data.len() >= cutoff {
                let mut data = node.data.clone();
                data.resize(data.len().div_ceil(sector_size) * sector_size, 0);
                out.extend_from_slice(&data);
            }
        }

        out
    }

    fn link_all(&mut self) {
        for parent in 0..self.nodes.len() {
            let mut children = self.nodes[parent].children.clone();
            if children.is_empty() {
                continue;
            }

            if self.insertion_order_links {
                self.nodes[parent].child = children[0] as u32;
                for pair in children.windows(2) {
                    self.nodes[pair[0]].right = pair[1] as u32;
                }
                continue;
            }

            children.sort_by(|&a, &b| compare_names(&self.nodes[a].name, &self.nodes[b].name));
            let midpoint = children.len() / 2;
            self.nodes[parent].child = children[midpoint] as u32;

            // Smaller names chain leftwards from the midpoint
            for j in (1..=midpoint).rev() {
                self.nodes[children[j]].left = children[j - 1] as u32;
            }
            // Larger names chain rightwards
            for j in midpoint..children.len() - 1 {
                self.nodes[children[j]].right = children[j + 1] as u32;
            }
        }
    }
}

fn owned(path: &[&str]) -> Vec<String> {
    path.iter().map(|s| s.to_string()).collect()
}
