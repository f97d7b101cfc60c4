//! BAR1 static-library format: a flat concatenation of object files.
//!
//! Modelled on the member-lookup shape of a Unix archive (a name keyed to a
//! byte offset) but with the header spec.md actually defines: a magic, a
//! count, and an offset table, rather than per-member ASCII headers.

use scroll::{Pread, Pwrite};

use crate::error::{Error, Result};
use crate::object::file::ObjectFile;

pub const MAGIC: [u8; 4] = *b"BAR1";

/// An in-memory static library: object files kept in member order, found by
/// position (the archiver and linker both address members positionally;
/// name-based lookup happens one level up, via each object's own symbol
/// table).
#[derive(Debug, Clone, Default)]
pub struct Archive {
    members: Vec<Vec<u8>>,
}

impl Archive {
    pub fn new() -> Self {
        Archive { members: Vec::new() }
    }

    pub fn push(&mut self, object_bytes: Vec<u8>) {
        self.members.push(object_bytes);
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn member(&self, idx: usize) -> Option<&[u8]> {
        self.members.get(idx).map(|v| v.as_slice())
    }

    pub fn member_object(&self, idx: usize) -> Result<ObjectFile> {
        let bytes = self
            .member(idx)
            .ok_or_else(|| Error::Malformed(format!("no archive member {}", idx)))?;
        ObjectFile::from_bytes(bytes)
    }

    pub fn iter_objects(&self) -> impl Iterator<Item = Result<ObjectFile>> + '_ {
        self.members.iter().map(|b| ObjectFile::from_bytes(b))
    }

    /// Serializes as `{magic: "BAR1", n_objs: u32, offsets: [u32; n_objs]}`
    /// followed by each member's bytes, back to back (spec.md §6).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let header_size = 8 + 4 * self.members.len();
        let mut offsets = Vec::with_capacity(self.members.len());
        let mut cursor = header_size;
        for member in &self.members {
            offsets.push(cursor as u32);
            cursor += member.len();
        }

        let mut out = vec![0u8; cursor];
        out.pwrite_with(MAGIC, 0, scroll::LE).map_err(Error::Scroll)?;
        out.pwrite_with(self.members.len() as u32, 4, scroll::LE)
            .map_err(Error::Scroll)?;
        let mut off_cursor = 8;
        for off in &offsets {
            out.pwrite_with(*off, off_cursor, scroll::LE).map_err(Error::Scroll)?;
            off_cursor += 4;
        }
        for (off, member) in offsets.iter().zip(self.members.iter()) {
            out[*off as usize..*off as usize + member.len()].copy_from_slice(member);
        }

        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 8 {
            return Err(Error::Malformed("truncated archive header".into()));
        }
        let magic: [u8; 4] = bytes.pread_with(0, scroll::LE).map_err(Error::Scroll)?;
        if magic != MAGIC {
            return Err(Error::Malformed("bad archive magic".into()));
        }
        let n_objs: u32 = bytes.pread_with(4, scroll::LE).map_err(Error::Scroll)?;

        let mut offsets = Vec::with_capacity(n_objs as usize);
        let mut cursor = 8usize;
        for _ in 0..n_objs {
            let off: u32 = bytes.pread_with(cursor, scroll::LE).map_err(Error::Scroll)?;
            offsets.push(off as usize);
            cursor += 4;
        }

        let mut members = Vec::with_capacity(offsets.len());
        for (i, &start) in offsets.iter().enumerate() {
            let end = offsets
                .get(i + 1)
                .copied()
                .unwrap_or(bytes.len());
            let body = bytes
                .get(start..end)
                .ok_or_else(|| Error::Malformed("archive member out of range".into()))?;
            members.push(body.to_vec());
        }

        Ok(Archive { members })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::section::SectionKind;
    use crate::object::symbol::Binding;

    #[test]
    fn round_trips_multiple_members() {
        let mut obj_a = ObjectFile::new();
        let text = obj_a.add_section("text", SectionKind::Text);
        obj_a.section_mut(text).unwrap().data = vec![0xAA; 4];
        obj_a.add_symbol("a", 0, Binding::Global, Some(text)).unwrap();

        let mut obj_b = ObjectFile::new();
        let text_b = obj_b.add_section("text", SectionKind::Text);
        obj_b.section_mut(text_b).unwrap().data = vec![0xBB; 8];

        let mut archive = Archive::new();
        archive.push(obj_a.to_bytes().unwrap());
        archive.push(obj_b.to_bytes().unwrap());

        let bytes = archive.to_bytes().unwrap();
        let back = Archive::from_bytes(&bytes).unwrap();
        assert_eq!(back.len(), 2);

        let recovered_a = back.member_object(0).unwrap();
        assert_eq!(recovered_a.section(0).unwrap().data, vec![0xAA; 4]);
        let recovered_b = back.member_object(1).unwrap();
        assert_eq!(recovered_b.section(0).unwrap().data, vec![0xBB; 8]);
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = vec![0u8; 8];
        let err = Archive::from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, Error::Malformed(_)));
    }
}
