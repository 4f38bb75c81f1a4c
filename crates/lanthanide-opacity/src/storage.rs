//! Binary snapshot reader/writer for the opacity table.
//!
//! Layout (little endian): header, column names, rows, then a CRC32 (IEEE)
//! of every preceding byte. Index values are stored as `u32`/`f64` so a
//! save/load cycle returns bit-identical keys.

use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::types::{CompositeKey, OpacityError, OpacityRecord, OpacityResult, OpacityTable};

/// Magic bytes: "OPDB"
const SNAPSHOT_MAGIC: u32 = 0x4F50_4442;

/// Current format version.
const FORMAT_VERSION: u16 = 1;

/// Header flag: records are stored in key order.
const FLAG_SORTED: u16 = 0x0001;

/// Writer for table snapshots.
pub struct SnapshotWriter;

/// Reader for table snapshots.
pub struct SnapshotReader;

impl SnapshotWriter {
    /// Write a table to `path`, replacing any previous snapshot.
    ///
    /// The bytes go to a sibling temp file first and are renamed into place,
    /// so an interrupted write leaves the previous snapshot intact.
    pub fn write_to_file(table: &OpacityTable, path: &Path) -> OpacityResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let bytes = Self::to_bytes(table)?;
        let tmp = temp_sibling(path);
        {
            let mut file = std::fs::File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Serialize a table, checksum included.
    pub fn to_bytes(table: &OpacityTable) -> OpacityResult<Vec<u8>> {
        let mut buf = Vec::new();
        Self::write_body(table, &mut buf)?;
        let checksum = crc32(&buf);
        buf.write_u32::<LittleEndian>(checksum)?;
        Ok(buf)
    }

    /// Write a table to any writer.
    pub fn write_to<W: Write>(table: &OpacityTable, writer: &mut W) -> OpacityResult<()> {
        writer.write_all(&Self::to_bytes(table)?)?;
        Ok(())
    }

    fn write_body<W: Write>(table: &OpacityTable, w: &mut W) -> OpacityResult<()> {
        let flags = if table.is_sorted() { FLAG_SORTED } else { 0 };

        // ─── Header ───────────────────────────────────────
        w.write_u32::<LittleEndian>(SNAPSHOT_MAGIC)?;
        w.write_u16::<LittleEndian>(FORMAT_VERSION)?;
        w.write_u16::<LittleEndian>(flags)?;
        w.write_u32::<LittleEndian>(table.columns().len() as u32)?;
        w.write_u64::<LittleEndian>(table.len() as u64)?;

        // ─── Columns ──────────────────────────────────────
        for name in table.columns() {
            let bytes = name.as_bytes();
            let len = u16::try_from(bytes.len()).map_err(|_| {
                OpacityError::Snapshot(format!("column name too long: {} bytes", bytes.len()))
            })?;
            w.write_u16::<LittleEndian>(len)?;
            w.write_all(bytes)?;
        }

        // ─── Rows ─────────────────────────────────────────
        let width = table.columns().len();
        for record in table.records() {
            w.write_u32::<LittleEndian>(record.key.nuclear_charge)?;
            w.write_f64::<LittleEndian>(record.key.mass_density)?;
            w.write_f64::<LittleEndian>(record.key.temperature)?;
            for column in 0..width {
                match record.value(column) {
                    Some(v) => {
                        w.write_u8(1)?;
                        w.write_f64::<LittleEndian>(v)?;
                    }
                    None => {
                        w.write_u8(0)?;
                        w.write_f64::<LittleEndian>(0.0)?;
                    }
                }
            }
        }

        Ok(())
    }
}

impl SnapshotReader {
    /// Read a table snapshot from a file.
    pub fn read_from_file(path: &Path) -> OpacityResult<OpacityTable> {
        let mut file = std::fs::File::open(path)?;
        Self::read_from(&mut file)
    }

    /// Read a table snapshot from any reader.
    pub fn read_from<R: Read>(reader: &mut R) -> OpacityResult<OpacityTable> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }

    /// Verify the checksum and decode a snapshot.
    pub fn from_bytes(bytes: &[u8]) -> OpacityResult<OpacityTable> {
        if bytes.len() < 4 {
            return Err(OpacityError::Snapshot(format!(
                "snapshot truncated: {} bytes",
                bytes.len()
            )));
        }

        let (body, trailer) = bytes.split_at(bytes.len() - 4);
        let stored = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let computed = crc32(body);
        if stored != computed {
            return Err(OpacityError::Snapshot(format!(
                "checksum mismatch: stored 0x{stored:08X}, computed 0x{computed:08X}"
            )));
        }

        Self::read_body(&mut Cursor::new(body)).map_err(|e| match e {
            OpacityError::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                OpacityError::Snapshot("snapshot truncated".to_string())
            }
            other => other,
        })
    }

    fn read_body(r: &mut Cursor<&[u8]>) -> OpacityResult<OpacityTable> {
        let magic = r.read_u32::<LittleEndian>()?;
        if magic != SNAPSHOT_MAGIC {
            return Err(OpacityError::Snapshot(format!(
                "Invalid magic: expected 0x{SNAPSHOT_MAGIC:08X}, got 0x{magic:08X}"
            )));
        }

        let version = r.read_u16::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(OpacityError::Snapshot(format!(
                "Unsupported version: {version}"
            )));
        }

        let flags = r.read_u16::<LittleEndian>()?;
        let column_count = r.read_u32::<LittleEndian>()? as usize;
        let row_count = r.read_u64::<LittleEndian>()? as usize;

        let mut columns = Vec::with_capacity(column_count.min(1024));
        for _ in 0..column_count {
            let len = r.read_u16::<LittleEndian>()? as usize;
            let mut raw = vec![0u8; len];
            r.read_exact(&mut raw)?;
            let name = String::from_utf8(raw)
                .map_err(|e| OpacityError::Snapshot(format!("column name is not UTF-8: {e}")))?;
            columns.push(name);
        }

        let mut records = Vec::with_capacity(row_count.min(1 << 20));
        for _ in 0..row_count {
            let nuclear_charge = r.read_u32::<LittleEndian>()?;
            let mass_density = r.read_f64::<LittleEndian>()?;
            let temperature = r.read_f64::<LittleEndian>()?;
            let mut values = Vec::with_capacity(column_count);
            for _ in 0..column_count {
                let present = r.read_u8()?;
                let value = r.read_f64::<LittleEndian>()?;
                values.push((present != 0).then_some(value));
            }
            records.push(OpacityRecord {
                key: CompositeKey::new(nuclear_charge, mass_density, temperature),
                values,
            });
        }

        if (r.position() as usize) != r.get_ref().len() {
            return Err(OpacityError::Snapshot(format!(
                "{} trailing bytes after last row",
                r.get_ref().len() - r.position() as usize
            )));
        }

        Ok(OpacityTable::from_parts(
            columns,
            records,
            flags & FLAG_SORTED != 0,
        ))
    }
}

/// `<path>.tmp`, the staging file for atomic replacement of `path`.
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Compute CRC32 (IEEE/ISO 3309) checksum of data.
pub(crate) fn crc32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        let index = ((crc ^ byte as u32) & 0xFF) as usize;
        crc = CRC32_TABLE[index] ^ (crc >> 8);
    }
    crc ^ 0xFFFF_FFFF
}

/// CRC32 lookup table (IEEE polynomial 0xEDB88320).
const CRC32_TABLE: [u32; 256] = {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u32;
        let mut j = 0;
        while j < 8 {
            if crc & 1 != 0 {
                crc = 0xEDB8_8320 ^ (crc >> 1);
            } else {
                crc >>= 1;
            }
            j += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
};

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> OpacityTable {
        let mut table = OpacityTable::new();
        table.merge(OpacityTable::from_rows(
            CompositeKey::new(57, 1e-4, 0.01),
            vec!["energy(eV)".to_string(), "total_opac".to_string()],
            vec![vec![1.25e-5, 3.0e2], vec![2.0, 1.5e-3]],
        ));
        table.merge(OpacityTable::from_rows(
            CompositeKey::new(89, 1e-20, 4.5),
            vec!["energy(eV)".to_string(), "ff_opac".to_string()],
            vec![vec![7.0, 0.1]],
        ));
        table
    }

    #[test]
    fn test_crc32_known_value() {
        assert_eq!(crc32(b"123456789"), 0xCBF4_3926);
    }

    #[test]
    fn test_roundtrip_empty() {
        let table = OpacityTable::new();
        let bytes = SnapshotWriter::to_bytes(&table).unwrap();
        let loaded = SnapshotReader::from_bytes(&bytes).unwrap();
        assert!(loaded.is_empty());
        assert!(loaded.columns().is_empty());
    }

    #[test]
    fn test_roundtrip_preserves_types_exactly() {
        let table = sample_table();
        let mut buf = Vec::new();
        SnapshotWriter::write_to(&table, &mut buf).unwrap();

        let loaded = SnapshotReader::read_from(&mut &buf[..]).unwrap();
        assert_eq!(loaded, table);
        let key = loaded.records()[2].key;
        assert_eq!(key.nuclear_charge, 89);
        assert_eq!(key.mass_density.to_bits(), 1e-20f64.to_bits());
        assert_eq!(key.temperature.to_bits(), 4.5f64.to_bits());
        assert_eq!(loaded.records()[2].value(1), None);
        assert_eq!(loaded.records()[2].value(2), Some(0.1));
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = SnapshotWriter::to_bytes(&sample_table()).unwrap();
        bytes[0] = 0;
        let body_len = bytes.len() - 4;
        let checksum = crc32(&bytes[..body_len]);
        bytes[body_len..].copy_from_slice(&checksum.to_le_bytes());

        let err = SnapshotReader::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("Invalid magic"));
    }

    #[test]
    fn test_corruption_detected() {
        let mut bytes = SnapshotWriter::to_bytes(&sample_table()).unwrap();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        let err = SnapshotReader::from_bytes(&bytes).unwrap_err();
        assert!(err.to_string().contains("checksum mismatch"));
    }

    #[test]
    fn test_truncated() {
        assert!(SnapshotReader::from_bytes(&[1, 2]).is_err());
        let bytes = SnapshotWriter::to_bytes(&sample_table()).unwrap();
        assert!(SnapshotReader::from_bytes(&bytes[..bytes.len() - 9]).is_err());
    }

    #[test]
    fn test_file_roundtrip_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("table.pkl");

        SnapshotWriter::write_to_file(&OpacityTable::new(), &path).unwrap();
        SnapshotWriter::write_to_file(&sample_table(), &path).unwrap();

        let loaded = SnapshotReader::read_from_file(&path).unwrap();
        assert_eq!(loaded.len(), 3);
        assert!(!temp_sibling(&path).exists());
    }
}
