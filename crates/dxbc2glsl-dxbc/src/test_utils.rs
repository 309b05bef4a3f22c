use crate::signature::{SignatureEntry, SignatureLayout};
use crate::FourCC;

/// Builds a minimal `DXBC` container containing the provided chunks.
///
/// The resulting blob has:
/// - a valid `DXBC` header (`DXBC` magic + checksum + version + `total_size` + chunk count),
/// - a correct chunk offset table,
/// - and a correct `total_size`.
///
/// The checksum field is set to all zeros; parsing never checks it.
pub fn build_container(chunks: &[(FourCC, &[u8])]) -> Vec<u8> {
    let header_size = 4 + 16 + 4 + 4 + 4 + (4 * chunks.len());
    let chunk_bytes = chunks.iter().map(|(_, data)| 8 + data.len()).sum::<usize>();

    let mut out = Vec::with_capacity(header_size + chunk_bytes);

    out.extend_from_slice(b"DXBC");
    out.extend_from_slice(&[0u8; 16]); // checksum
    out.extend_from_slice(&1u32.to_le_bytes()); // version
    out.extend_from_slice(&0u32.to_le_bytes()); // total_size placeholder

    let chunk_count = u32::try_from(chunks.len()).expect("DXBC chunk_count does not fit in u32");
    out.extend_from_slice(&chunk_count.to_le_bytes());

    let offsets_pos = out.len();
    out.resize(out.len() + 4 * chunks.len(), 0);

    for (i, (fourcc, data)) in chunks.iter().enumerate() {
        let offset = u32::try_from(out.len()).expect("DXBC chunk offset does not fit in u32");
        let pos = offsets_pos + i * 4;
        out[pos..pos + 4].copy_from_slice(&offset.to_le_bytes());

        let chunk_size = u32::try_from(data.len()).expect("DXBC chunk size does not fit in u32");
        out.extend_from_slice(&fourcc.0);
        out.extend_from_slice(&chunk_size.to_le_bytes());
        out.extend_from_slice(data);
    }

    let total_size = u32::try_from(out.len()).expect("DXBC total_size does not fit in u32");
    out[24..28].copy_from_slice(&total_size.to_le_bytes());

    out
}

/// Byte writer that resolves string references once the fixed-size tables
/// have been laid out.
#[derive(Default)]
struct Blob {
    bytes: Vec<u8>,
    strings: Vec<(usize, String)>,
}

impl Blob {
    fn pos(&self) -> u32 {
        self.bytes.len() as u32
    }

    fn u32(&mut self, v: u32) -> usize {
        let pos = self.bytes.len();
        self.bytes.extend_from_slice(&v.to_le_bytes());
        pos
    }

    fn u16(&mut self, v: u16) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    fn string(&mut self, s: &str) {
        let pos = self.u32(0);
        self.strings.push((pos, s.to_owned()));
    }

    fn patch(&mut self, pos: usize, v: u32) {
        self.bytes[pos..pos + 4].copy_from_slice(&v.to_le_bytes());
    }

    fn finish(mut self) -> Vec<u8> {
        for (pos, s) in std::mem::take(&mut self.strings) {
            let offset = self.pos();
            self.bytes.extend_from_slice(s.as_bytes());
            self.bytes.push(0);
            self.patch(pos, offset);
        }
        while self.bytes.len() % 4 != 0 {
            self.bytes.push(0);
        }
        self.bytes
    }
}

/// Serializes signature entries into a signature chunk payload using `layout`.
///
/// Fields the layout cannot represent (stream, min precision) are dropped.
pub fn build_signature_chunk(layout: SignatureLayout, entries: &[SignatureEntry]) -> Vec<u8> {
    let mut blob = Blob::default();
    blob.u32(entries.len() as u32);
    blob.u32(8);
    for e in entries {
        if layout != SignatureLayout::Legacy {
            blob.u32(e.stream);
        }
        blob.string(&e.semantic_name);
        blob.u32(e.semantic_index);
        blob.u32(e.system_value.to_u32());
        blob.u32(e.component_type.to_u32());
        blob.u32(e.register);
        blob.bytes.extend_from_slice(&[e.mask, e.read_write_mask, 0, 0]);
        if layout == SignatureLayout::Extended {
            blob.u32(e.min_precision);
        }
    }
    blob.finish()
}

/// Description of one bound resource for [`RdefBuilder`].
#[derive(Debug, Clone)]
pub struct ResourceDesc {
    pub name: String,
    pub input_type: u32,
    pub return_type: u32,
    pub dimension: u32,
    pub sample_count: u32,
    pub bind_point: u32,
    pub bind_count: u32,
    pub flags: u32,
}

impl ResourceDesc {
    /// A single-slot binding with float return type and no dimension.
    pub fn new(name: &str, input_type: u32, bind_point: u32) -> Self {
        Self {
            name: name.to_owned(),
            input_type,
            return_type: 0,
            dimension: 0,
            sample_count: 0,
            bind_point,
            bind_count: 1,
            flags: 0,
        }
    }

    /// A `Texture2D<float4>` at `t{bind_point}`.
    pub fn texture2d(name: &str, bind_point: u32) -> Self {
        Self {
            return_type: 5,
            dimension: 4,
            sample_count: u32::MAX,
            flags: 0xc,
            ..Self::new(name, 2, bind_point)
        }
    }

    /// A sampler at `s{bind_point}`.
    pub fn sampler(name: &str, bind_point: u32) -> Self {
        Self::new(name, 3, bind_point)
    }
}

/// Description of one constant buffer variable for [`RdefBuilder`].
#[derive(Debug, Clone)]
pub struct VariableDesc {
    pub name: String,
    pub offset: u32,
    pub size: u32,
    pub flags: u32,
    pub class: u16,
    pub base: u16,
    pub rows: u16,
    pub columns: u16,
    pub elements: u16,
    pub default_value: Option<Vec<u8>>,
}

impl VariableDesc {
    /// A variable whose packed size is derived from its shape.
    pub fn new(name: &str, offset: u32, class: u16, base: u16, rows: u16, columns: u16) -> Self {
        let mut v = Self {
            name: name.to_owned(),
            offset,
            size: 0,
            flags: 0x2,
            class,
            base,
            rows,
            columns,
            elements: 0,
            default_value: None,
        };
        v.size = v.packed_size();
        v
    }

    /// `float`
    pub fn float(name: &str, offset: u32) -> Self {
        Self::new(name, offset, 0, 3, 1, 1)
    }

    /// `floatN`
    pub fn float_n(name: &str, offset: u32, n: u16) -> Self {
        Self::new(name, offset, 1, 3, 1, n)
    }

    /// `int`
    pub fn int(name: &str, offset: u32) -> Self {
        Self::new(name, offset, 0, 2, 1, 1)
    }

    /// Column-major `float4x4`.
    pub fn float4x4(name: &str, offset: u32) -> Self {
        Self::new(name, offset, 3, 3, 4, 4)
    }

    /// Turns the variable into an array of `elements`.
    pub fn array(mut self, elements: u16) -> Self {
        self.elements = elements;
        self.size = self.packed_size();
        self
    }

    fn packed_size(&self) -> u32 {
        let (regs, last) = match self.class {
            2 => (u32::from(self.rows), u32::from(self.columns) * 4),
            3 => (u32::from(self.columns), u32::from(self.rows) * 4),
            _ => (1, u32::from(self.columns.max(1)) * 4),
        };
        let element = (regs - 1) * 16 + last;
        match self.elements {
            0 => element,
            n => (u32::from(n) - 1) * regs * 16 + element,
        }
    }
}

/// Description of one constant buffer for [`RdefBuilder`].
#[derive(Debug, Clone)]
pub struct CbufferDesc {
    pub name: String,
    pub size: u32,
    pub kind: u32,
    pub variables: Vec<VariableDesc>,
}

impl CbufferDesc {
    /// An empty `cbuffer` of `size` bytes.
    pub fn new(name: &str, size: u32) -> Self {
        Self {
            name: name.to_owned(),
            size,
            kind: 0,
            variables: Vec::new(),
        }
    }

    /// Appends a variable.
    pub fn variable(mut self, var: VariableDesc) -> Self {
        self.variables.push(var);
        self
    }
}

/// Builds `RDEF` chunk payloads for tests.
#[derive(Debug, Clone)]
pub struct RdefBuilder {
    target: u32,
    creator: Option<String>,
    resources: Vec<ResourceDesc>,
    cbuffers: Vec<CbufferDesc>,
}

impl RdefBuilder {
    /// Starts a chunk for shader model `major.minor` and the given program
    /// type (`0xfffe` vertex, `0xffff` pixel, ...).
    pub fn new(major: u8, minor: u8, program_type: u16) -> Self {
        Self {
            target: (u32::from(program_type) << 16) | (u32::from(major) << 8) | u32::from(minor),
            creator: Some("dxbc2glsl test".to_owned()),
            resources: Vec::new(),
            cbuffers: Vec::new(),
        }
    }

    /// Adds a bound resource.
    pub fn resource(mut self, desc: ResourceDesc) -> Self {
        self.resources.push(desc);
        self
    }

    /// Adds a constant buffer together with its `b{slot}` binding.
    pub fn cbuffer(mut self, desc: CbufferDesc, slot: u32) -> Self {
        self.resources.push(ResourceDesc::new(&desc.name, 0, slot));
        self.cbuffers.push(desc);
        self
    }

    /// Adds a constant buffer without a binding record.
    pub fn unbound_cbuffer(mut self, desc: CbufferDesc) -> Self {
        self.cbuffers.push(desc);
        self
    }

    /// Serializes the chunk payload.
    pub fn build(&self) -> Vec<u8> {
        let major = ((self.target >> 8) & 0xff) as u8;
        let minor = (self.target & 0xff) as u8;
        let sm5 = major >= 5;
        let sm51 = major > 5 || (major == 5 && minor >= 1);

        let mut blob = Blob::default();
        blob.u32(self.cbuffers.len() as u32);
        let cb_offset_pos = blob.u32(0);
        blob.u32(self.resources.len() as u32);
        let rb_offset_pos = blob.u32(0);
        blob.u32(self.target);
        blob.u32(0); // flags
        match &self.creator {
            Some(c) => blob.string(c),
            None => {
                blob.u32(0);
            }
        }
        if sm5 {
            blob.bytes.extend_from_slice(b"RD11");
            for v in [60u32, 24, 40, 36, 12, 0] {
                blob.u32(v);
            }
        }

        let rb_offset = blob.pos();
        blob.patch(rb_offset_pos, rb_offset);
        for r in &self.resources {
            blob.string(&r.name);
            for v in [
                r.input_type,
                r.return_type,
                r.dimension,
                r.sample_count,
                r.bind_point,
                r.bind_count,
                r.flags,
            ] {
                blob.u32(v);
            }
            if sm51 {
                blob.u32(0);
                blob.u32(0);
            }
        }

        let cb_offset = blob.pos();
        blob.patch(cb_offset_pos, cb_offset);
        let mut var_offset_pos = Vec::new();
        for cb in &self.cbuffers {
            blob.string(&cb.name);
            blob.u32(cb.variables.len() as u32);
            var_offset_pos.push(blob.u32(0));
            blob.u32(cb.size);
            blob.u32(0);
            blob.u32(cb.kind);
        }

        for (cb, pos) in self.cbuffers.iter().zip(var_offset_pos) {
            let table = blob.pos();
            blob.patch(pos, table);
            let mut fixups = Vec::new();
            for v in &cb.variables {
                blob.string(&v.name);
                blob.u32(v.offset);
                blob.u32(v.size);
                blob.u32(v.flags);
                let type_pos = blob.u32(0);
                let default_pos = blob.u32(0);
                if sm5 {
                    for x in [u32::MAX, 0, u32::MAX, 0] {
                        blob.u32(x);
                    }
                }
                fixups.push((v, type_pos, default_pos));
            }
            for (v, type_pos, default_pos) in fixups {
                let type_offset = blob.pos();
                blob.patch(type_pos, type_offset);
                for x in [v.class, v.base, v.rows, v.columns, v.elements, 0] {
                    blob.u16(x);
                }
                blob.u32(0);
                if sm5 {
                    for _ in 0..4 {
                        blob.u32(0);
                    }
                    blob.u32(0);
                }
                if let Some(default) = &v.default_value {
                    let offset = blob.pos();
                    blob.patch(default_pos, offset);
                    blob.bytes.extend_from_slice(default);
                    while blob.bytes.len() % 4 != 0 {
                        blob.bytes.push(0);
                    }
                }
            }
        }

        blob.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DxbcFile;

    #[test]
    fn build_container_roundtrips_through_parser() {
        let shdr = [1u8, 2, 3, 4];
        let bytes = build_container(&[(FourCC(*b"SHDR"), &shdr)]);

        let file = DxbcFile::parse(&bytes).expect("built container should parse");
        assert_eq!(file.header().magic, FourCC(*b"DXBC"));
        assert_eq!(file.header().total_size as usize, bytes.len());
        assert_eq!(file.header().chunk_count, 1);

        let chunk = file.get_chunk(FourCC(*b"SHDR")).expect("missing SHDR");
        assert_eq!(chunk.data, &shdr);
    }

    #[test]
    fn packed_sizes_follow_register_packing() {
        assert_eq!(VariableDesc::float4x4("m", 0).size, 64);
        assert_eq!(VariableDesc::float_n("v", 0, 3).size, 12);
        assert_eq!(VariableDesc::float("f", 0).array(3).size, 36);
        assert_eq!(VariableDesc::new("m", 0, 3, 3, 3, 4).size, 60);
    }
}
