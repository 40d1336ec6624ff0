//! PDF object serialization and the object sink the font writer emits into.
//!
//! [`ObjectSerializer`] renders [`Object`] values to PDF syntax.
//! [`ObjectWriter`] is the seam between the font engine and the surrounding
//! document writer: it hands out object numbers and accepts each indirect
//! object exactly once.

use crate::error::{Error, Result};
use crate::object::{Dict, Object, ObjectRef};
use indexmap::IndexMap;
use std::io::Write;

/// Serializer for PDF objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectSerializer {
    /// Whether to use compact formatting (minimal whitespace)
    compact: bool,
}

impl ObjectSerializer {
    /// Create a new object serializer with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a compact serializer (minimal whitespace).
    pub fn compact() -> Self {
        Self { compact: true }
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        // Writes into a Vec cannot fail.
        let _ = self.write_object(&mut buf, obj);
        buf
    }

    /// Serialize an object to a string (for debugging).
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).to_string()
    }

    /// Write an indirect object definition: `{id} {gen} obj\n{object}\nendobj\n`.
    pub fn write_indirect<W: Write>(
        &self,
        w: &mut W,
        id: u32,
        gen: u16,
        obj: &Object,
    ) -> std::io::Result<()> {
        writeln!(w, "{} {} obj", id, gen)?;
        self.write_object(w, obj)?;
        write!(w, "\nendobj\n")
    }

    /// Write an object to a buffer.
    pub fn write_object<W: Write>(&self, w: &mut W, obj: &Object) -> std::io::Result<()> {
        match obj {
            Object::Null => write!(w, "null"),
            Object::Boolean(b) => write!(w, "{}", if *b { "true" } else { "false" }),
            Object::Integer(i) => write!(w, "{}", i),
            Object::Real(r) => self.write_real(w, *r),
            Object::String(s) => self.write_string(w, s),
            Object::Name(n) => self.write_name(w, n),
            Object::Array(arr) => self.write_array(w, arr),
            Object::Dictionary(dict) => self.write_dictionary(w, dict),
            Object::Stream { dict, data } => self.write_stream(w, dict, data),
            Object::Reference(r) => write!(w, "{} {} R", r.id, r.gen),
        }
    }

    /// Write a real number, trimming trailing zeros.
    fn write_real<W: Write>(&self, w: &mut W, value: f64) -> std::io::Result<()> {
        if value.fract() == 0.0 {
            write!(w, "{}", value as i64)
        } else {
            let formatted = format!("{:.5}", value);
            let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
            if trimmed == "-0" {
                write!(w, "0")
            } else {
                write!(w, "{}", trimmed)
            }
        }
    }

    /// Write a PDF string.
    ///
    /// Printable ASCII uses literal syntax `(...)`, anything else hex `<...>`.
    fn write_string<W: Write>(&self, w: &mut W, data: &[u8]) -> std::io::Result<()> {
        let is_printable = data
            .iter()
            .all(|&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7E).contains(&b));

        if is_printable {
            write!(w, "(")?;
            for &byte in data {
                match byte {
                    b'(' => write!(w, "\\(")?,
                    b')' => write!(w, "\\)")?,
                    b'\\' => write!(w, "\\\\")?,
                    b'\n' => write!(w, "\\n")?,
                    b'\r' => write!(w, "\\r")?,
                    b'\t' => write!(w, "\\t")?,
                    _ => w.write_all(&[byte])?,
                }
            }
            write!(w, ")")
        } else {
            write_hex_string(w, data)
        }
    }

    /// Write a PDF name, escaping delimiters and non-regular bytes as `#xx`.
    fn write_name<W: Write>(&self, w: &mut W, name: &str) -> std::io::Result<()> {
        write!(w, "/")?;
        for byte in name.bytes() {
            match byte {
                b'!'
                | b'"'
                | b'$'..=b'&'
                | b'\''
                | b'*'..=b'.'
                | b'0'..=b'9'
                | b';'
                | b'='
                | b'?'
                | b'@'
                | b'A'..=b'Z'
                | b'^'..=b'z'
                | b'|'
                | b'~' => w.write_all(&[byte])?,
                _ => write!(w, "#{:02X}", byte)?,
            }
        }
        Ok(())
    }

    fn write_array<W: Write>(&self, w: &mut W, arr: &[Object]) -> std::io::Result<()> {
        write!(w, "[")?;
        for (i, obj) in arr.iter().enumerate() {
            if i > 0 {
                write!(w, " ")?;
            }
            self.write_object(w, obj)?;
        }
        write!(w, "]")
    }

    fn write_dictionary<W: Write>(&self, w: &mut W, dict: &Dict) -> std::io::Result<()> {
        write!(w, "<<")?;

        // Sorted keys keep output deterministic
        let mut keys: Vec<_> = dict.keys().collect();
        keys.sort();

        for key in keys {
            if let Some(value) = dict.get(key) {
                if self.compact {
                    write!(w, " ")?;
                } else {
                    write!(w, "\n  ")?;
                }
                self.write_name(w, key)?;
                write!(w, " ")?;
                self.write_object(w, value)?;
            }
        }

        if self.compact {
            if !dict.is_empty() {
                write!(w, " ")?;
            }
        } else if !dict.is_empty() {
            writeln!(w)?;
        }
        write!(w, ">>")
    }

    fn write_stream<W: Write>(&self, w: &mut W, dict: &Dict, data: &[u8]) -> std::io::Result<()> {
        let mut dict_with_length = dict.clone();
        dict_with_length
            .entry("Length".to_string())
            .or_insert(Object::Integer(data.len() as i64));

        self.write_dictionary(w, &dict_with_length)?;
        write!(w, "\nstream\n")?;
        w.write_all(data)?;
        write!(w, "\nendstream")
    }
}

/// Write bytes as an uppercase hex string `<...>`.
pub fn write_hex_string<W: Write>(w: &mut W, data: &[u8]) -> std::io::Result<()> {
    write!(w, "<")?;
    for byte in data {
        write!(w, "{:02X}", byte)?;
    }
    write!(w, ">")
}

/// Sink for indirect objects produced by the font writer.
pub trait ObjectWriter {
    /// Reserve a fresh object number.
    fn allocate_id(&mut self) -> ObjectRef;

    /// Emit the object for a previously allocated id. Each id is written once.
    fn write_object(&mut self, id: ObjectRef, obj: Object) -> Result<()>;
}

/// In-memory [`ObjectWriter`] that records objects in emission order.
#[derive(Debug, Default)]
pub struct MemoryObjectWriter {
    next_id: u32,
    allocated: Vec<ObjectRef>,
    objects: IndexMap<ObjectRef, Object>,
}

impl MemoryObjectWriter {
    /// Create an empty writer. The first allocated id is 1.
    pub fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    /// Objects in the order they were written.
    pub fn objects(&self) -> impl Iterator<Item = (&ObjectRef, &Object)> {
        self.objects.iter()
    }

    /// Look up a written object.
    pub fn get(&self, id: ObjectRef) -> Option<&Object> {
        self.objects.get(&id)
    }

    /// Position of `id` in emission order.
    pub fn position(&self, id: ObjectRef) -> Option<usize> {
        self.objects.get_index_of(&id)
    }

    /// Number of written objects.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Ids that were allocated but never written.
    pub fn unwritten(&self) -> Vec<ObjectRef> {
        self.allocated
            .iter()
            .filter(|r| !self.objects.contains_key(*r))
            .copied()
            .collect()
    }

    /// Serialize every written object as an indirect object body.
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<()> {
        let serializer = ObjectSerializer::new();
        for (id, obj) in &self.objects {
            serializer.write_indirect(w, id.id, id.gen, obj)?;
        }
        Ok(())
    }
}

impl ObjectWriter for MemoryObjectWriter {
    fn allocate_id(&mut self) -> ObjectRef {
        if self.next_id == 0 {
            self.next_id = 1;
        }
        let r = ObjectRef::new(self.next_id, 0);
        self.next_id += 1;
        self.allocated.push(r);
        r
    }

    fn write_object(&mut self, id: ObjectRef, obj: Object) -> Result<()> {
        if !self.allocated.contains(&id) {
            return Err(Error::Unregistered(format!("object {} was never allocated", id)));
        }
        if self.objects.contains_key(&id) {
            return Err(Error::Unregistered(format!("object {} written twice", id)));
        }
        self.objects.insert(id, obj);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_scalars() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::Null), "null");
        assert_eq!(s.serialize_to_string(&Object::Boolean(true)), "true");
        assert_eq!(s.serialize_to_string(&Object::Integer(-123)), "-123");
    }

    #[test]
    fn test_serialize_real() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::Real(0.001)), "0.001");
        assert_eq!(s.serialize_to_string(&Object::Real(1.0)), "1");
        assert_eq!(s.serialize_to_string(&Object::Real(500.5)), "500.5");
        assert_eq!(s.serialize_to_string(&Object::Real(-0.000001)), "0");
    }

    #[test]
    fn test_serialize_strings() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::String(b"(a)".to_vec())), "(\\(a\\))");
        assert_eq!(s.serialize_to_string(&Object::String(vec![0x00, 0x41])), "<0041>");
    }

    #[test]
    fn test_serialize_name_escapes() {
        let s = ObjectSerializer::new();
        assert_eq!(s.serialize_to_string(&Object::name("ABCDEF+Times-Roman")), "/ABCDEF+Times-Roman");
        assert_eq!(s.serialize_to_string(&Object::name("Arial Bold")), "/Arial#20Bold");
        assert_eq!(s.serialize_to_string(&Object::name("a/b")), "/a#2Fb");
    }

    #[test]
    fn test_serialize_dictionary_sorted() {
        let s = ObjectSerializer::compact();
        let dict = Object::dict([("Type", Object::name("Font")), ("BaseFont", Object::name("F"))]);
        assert_eq!(s.serialize_to_string(&dict), "<< /BaseFont /F /Type /Font >>");
    }

    #[test]
    fn test_serialize_stream_length() {
        let s = ObjectSerializer::compact();
        let stream = Object::stream(Dict::new(), bytes::Bytes::from_static(b"abc"));
        let out = s.serialize_to_string(&stream);
        assert!(out.contains("/Length 3"));
        assert!(out.ends_with("\nstream\nabc\nendstream"));
    }

    #[test]
    fn test_memory_writer_refuses_double_write() {
        let mut w = MemoryObjectWriter::new();
        let id = w.allocate_id();
        assert_eq!(id, ObjectRef::new(1, 0));
        w.write_object(id, Object::Null).unwrap();
        assert!(matches!(w.write_object(id, Object::Null), Err(Error::Unregistered(_))));
    }

    #[test]
    fn test_memory_writer_refuses_unallocated() {
        let mut w = MemoryObjectWriter::new();
        let err = w.write_object(ObjectRef::new(9, 0), Object::Null);
        assert!(matches!(err, Err(Error::Unregistered(_))));
    }

    #[test]
    fn test_memory_writer_tracks_order() {
        let mut w = MemoryObjectWriter::new();
        let a = w.allocate_id();
        let b = w.allocate_id();
        w.write_object(b, Object::Integer(2)).unwrap();
        assert_eq!(w.unwritten(), vec![a]);
        w.write_object(a, Object::Integer(1)).unwrap();
        assert_eq!(w.position(b), Some(0));
        assert_eq!(w.position(a), Some(1));
        let mut out = Vec::new();
        w.write_to(&mut out).unwrap();
        assert!(String::from_utf8_lossy(&out).starts_with("2 0 obj\n2\nendobj\n1 0 obj"));
    }
}
