//! PLY mesh reading and writing.
//!
//! Supports ASCII and binary (little/big endian) files. The reader is
//! property-order tolerant: it locates `x`/`y`/`z` (and optional `nx`/`ny`/`nz`
//! normals and `red`/`green`/`blue` colours) by name, reads faces from a
//! `vertex_indices` or `vertex_index` list property, triangulates polygonal
//! faces by ear clipping, and skips elements it does not know. The writer
//! emits positions and optional normals always-if-present; colours are
//! written only when the mesh carries them.

use crate::triangulate::triangulate_face;
use crate::{MeshReader, MeshWriter};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use pweld_core::{Error, Point3d, Result, TriangleMesh, Vector3d};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// PLY file format variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlyFormat {
    Ascii,
    BinaryLittleEndian,
    BinaryBigEndian,
}

/// PLY scalar property types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarType {
    Char,
    UChar,
    Short,
    UShort,
    Int,
    UInt,
    Float,
    Double,
}

impl ScalarType {
    fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "char" | "int8" => Some(Self::Char),
            "uchar" | "uint8" => Some(Self::UChar),
            "short" | "int16" => Some(Self::Short),
            "ushort" | "uint16" => Some(Self::UShort),
            "int" | "int32" => Some(Self::Int),
            "uint" | "uint32" => Some(Self::UInt),
            "float" | "float32" => Some(Self::Float),
            "double" | "float64" => Some(Self::Double),
            _ => None,
        }
    }

    fn read_binary<B: ByteOrder, R: Read>(self, reader: &mut R) -> Result<f64> {
        Ok(match self {
            Self::Char => f64::from(reader.read_i8()?),
            Self::UChar => f64::from(reader.read_u8()?),
            Self::Short => f64::from(reader.read_i16::<B>()?),
            Self::UShort => f64::from(reader.read_u16::<B>()?),
            Self::Int => f64::from(reader.read_i32::<B>()?),
            Self::UInt => f64::from(reader.read_u32::<B>()?),
            Self::Float => f64::from(reader.read_f32::<B>()?),
            Self::Double => reader.read_f64::<B>()?,
        })
    }

    fn parse_token(token: &str) -> Result<f64> {
        token
            .parse::<f64>()
            .map_err(|_| Error::Parse(format!("invalid numeric token '{}'", token)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PropertyKind {
    Scalar(ScalarType),
    List { count: ScalarType, item: ScalarType },
}

#[derive(Debug, Clone)]
struct PlyProperty {
    name: String,
    kind: PropertyKind,
}

#[derive(Debug, Clone)]
struct PlyElement {
    name: String,
    count: usize,
    properties: Vec<PlyProperty>,
}

#[derive(Debug, Clone)]
struct PlyHeader {
    format: PlyFormat,
    elements: Vec<PlyElement>,
}

/// One decoded property of one element row.
#[derive(Debug, Clone)]
enum PropertyValue {
    Scalar(f64),
    List(Vec<f64>),
}

fn read_header<R: BufRead>(reader: &mut R) -> Result<PlyHeader> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    if line.trim_end() != "ply" {
        return Err(Error::Parse("missing 'ply' magic number".to_string()));
    }

    let mut format = None;
    let mut elements: Vec<PlyElement> = Vec::new();

    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Err(Error::Parse("unexpected end of header".to_string()));
        }
        let trimmed = line.trim();
        let mut tokens = trimmed.split_whitespace();
        match tokens.next() {
            Some("comment") | Some("obj_info") | None => continue,
            Some("format") => {
                format = match tokens.next() {
                    Some("ascii") => Some(PlyFormat::Ascii),
                    Some("binary_little_endian") => Some(PlyFormat::BinaryLittleEndian),
                    Some("binary_big_endian") => Some(PlyFormat::BinaryBigEndian),
                    other => {
                        return Err(Error::Parse(format!(
                            "unknown PLY format '{}'",
                            other.unwrap_or("")
                        )))
                    }
                };
            }
            Some("element") => {
                let name = tokens
                    .next()
                    .ok_or_else(|| Error::Parse("element without a name".to_string()))?
                    .to_string();
                let count: usize = tokens
                    .next()
                    .and_then(|t| t.parse().ok())
                    .ok_or_else(|| Error::Parse(format!("element '{}' without a count", name)))?;
                elements.push(PlyElement {
                    name,
                    count,
                    properties: Vec::new(),
                });
            }
            Some("property") => {
                let element = elements
                    .last_mut()
                    .ok_or_else(|| Error::Parse("property before any element".to_string()))?;
                let first = tokens
                    .next()
                    .ok_or_else(|| Error::Parse("property without a type".to_string()))?;
                let (kind, name) = if first == "list" {
                    let count = tokens
                        .next()
                        .and_then(ScalarType::from_keyword)
                        .ok_or_else(|| Error::Parse("invalid list count type".to_string()))?;
                    let item = tokens
                        .next()
                        .and_then(ScalarType::from_keyword)
                        .ok_or_else(|| Error::Parse("invalid list item type".to_string()))?;
                    (PropertyKind::List { count, item }, tokens.next())
                } else {
                    let scalar = ScalarType::from_keyword(first).ok_or_else(|| {
                        Error::Parse(format!("unknown property type '{}'", first))
                    })?;
                    (PropertyKind::Scalar(scalar), tokens.next())
                };
                let name = name
                    .ok_or_else(|| Error::Parse("property without a name".to_string()))?
                    .to_string();
                element.properties.push(PlyProperty { name, kind });
            }
            Some("end_header") => break,
            Some(other) => {
                return Err(Error::Parse(format!("unexpected header line '{}'", other)));
            }
        }
    }

    let format =
        format.ok_or_else(|| Error::Parse("header is missing a format line".to_string()))?;
    Ok(PlyHeader { format, elements })
}

fn read_row<R: BufRead>(
    reader: &mut R,
    element: &PlyElement,
    format: PlyFormat,
) -> Result<Vec<PropertyValue>> {
    match format {
        PlyFormat::Ascii => read_row_ascii(reader, element),
        PlyFormat::BinaryLittleEndian => read_row_binary::<LittleEndian, R>(reader, element),
        PlyFormat::BinaryBigEndian => read_row_binary::<BigEndian, R>(reader, element),
    }
}

fn read_row_ascii<R: BufRead>(reader: &mut R, element: &PlyElement) -> Result<Vec<PropertyValue>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(Error::Parse(format!(
            "unexpected end of file in element '{}'",
            element.name
        )));
    }
    let mut tokens = line.split_whitespace();
    let mut next_token = || {
        tokens.next().ok_or_else(|| {
            Error::Parse(format!("row of element '{}' is too short", element.name))
        })
    };

    let mut row = Vec::with_capacity(element.properties.len());
    for property in &element.properties {
        match property.kind {
            PropertyKind::Scalar(_) => {
                row.push(PropertyValue::Scalar(ScalarType::parse_token(next_token()?)?));
            }
            PropertyKind::List { .. } => {
                let count = ScalarType::parse_token(next_token()?)? as usize;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(ScalarType::parse_token(next_token()?)?);
                }
                row.push(PropertyValue::List(values));
            }
        }
    }
    Ok(row)
}

fn read_row_binary<B: ByteOrder, R: Read>(
    reader: &mut R,
    element: &PlyElement,
) -> Result<Vec<PropertyValue>> {
    let mut row = Vec::with_capacity(element.properties.len());
    for property in &element.properties {
        match property.kind {
            PropertyKind::Scalar(scalar) => {
                row.push(PropertyValue::Scalar(scalar.read_binary::<B, R>(reader)?));
            }
            PropertyKind::List { count, item } => {
                let count = count.read_binary::<B, R>(reader)? as usize;
                let mut values = Vec::with_capacity(count);
                for _ in 0..count {
                    values.push(item.read_binary::<B, R>(reader)?);
                }
                row.push(PropertyValue::List(values));
            }
        }
    }
    Ok(row)
}

fn scalar(value: &PropertyValue) -> f64 {
    match value {
        PropertyValue::Scalar(v) => *v,
        PropertyValue::List(_) => 0.0,
    }
}

/// Position of a named scalar property within an element, if present.
fn property_position(element: &PlyElement, name: &str) -> Option<usize> {
    element
        .properties
        .iter()
        .position(|p| p.name == name && matches!(p.kind, PropertyKind::Scalar(_)))
}

/// PLY mesh reader
pub struct PlyReader;

impl PlyReader {
    pub fn read_mesh_from<R: BufRead>(reader: &mut R) -> Result<TriangleMesh> {
        let header = read_header(reader)?;
        debug!(
            "reading PLY ({:?}), {} elements",
            header.format,
            header.elements.len()
        );

        let mut mesh = TriangleMesh::new();
        let mut normals: Vec<Vector3d> = Vec::new();
        let mut colors: Vec<[u8; 3]> = Vec::new();
        let mut has_normals = false;
        let mut has_colors = false;

        for element in &header.elements {
            match element.name.as_str() {
                "vertex" => {
                    let x = property_position(element, "x");
                    let y = property_position(element, "y");
                    let z = property_position(element, "z");
                    let (x, y, z) = match (x, y, z) {
                        (Some(x), Some(y), Some(z)) => (x, y, z),
                        _ => {
                            return Err(Error::Parse(
                                "vertex element lacks x, y, z properties".to_string(),
                            ))
                        }
                    };
                    let normal_positions = (
                        property_position(element, "nx"),
                        property_position(element, "ny"),
                        property_position(element, "nz"),
                    );
                    let color_positions = (
                        property_position(element, "red"),
                        property_position(element, "green"),
                        property_position(element, "blue"),
                    );
                    has_normals = matches!(normal_positions, (Some(_), Some(_), Some(_)));
                    has_colors = matches!(color_positions, (Some(_), Some(_), Some(_)));

                    mesh.vertices.reserve(element.count);
                    for _ in 0..element.count {
                        let row = read_row(reader, element, header.format)?;
                        mesh.vertices.push(Point3d::new(
                            scalar(&row[x]),
                            scalar(&row[y]),
                            scalar(&row[z]),
                        ));
                        if let (Some(nx), Some(ny), Some(nz)) = normal_positions {
                            normals.push(Vector3d::new(
                                scalar(&row[nx]),
                                scalar(&row[ny]),
                                scalar(&row[nz]),
                            ));
                        }
                        if let (Some(r), Some(g), Some(b)) = color_positions {
                            colors.push([
                                color_byte(&row[r], element, r),
                                color_byte(&row[g], element, g),
                                color_byte(&row[b], element, b),
                            ]);
                        }
                    }
                }
                "face" => {
                    let list = element.properties.iter().position(|p| {
                        (p.name == "vertex_indices" || p.name == "vertex_index")
                            && matches!(p.kind, PropertyKind::List { .. })
                    });
                    let list = list.ok_or_else(|| {
                        Error::Parse(
                            "face element lacks a vertex_indices list property".to_string(),
                        )
                    })?;
                    if element.count > 0 && mesh.vertices.is_empty() {
                        return Err(Error::Parse(
                            "face element precedes vertex element".to_string(),
                        ));
                    }

                    mesh.triangles.reserve(element.count);
                    for _ in 0..element.count {
                        let row = read_row(reader, element, header.format)?;
                        let indices = match &row[list] {
                            PropertyValue::List(values) => values,
                            PropertyValue::Scalar(_) => unreachable!(),
                        };
                        push_face(&mut mesh, indices)?;
                    }
                }
                _ => {
                    // Unknown element: consume its rows so the stream stays aligned.
                    for _ in 0..element.count {
                        read_row(reader, element, header.format)?;
                    }
                }
            }
        }

        if has_normals {
            mesh.set_normals(normals);
        }
        if has_colors {
            mesh.set_colors(colors);
        }
        Ok(mesh)
    }
}

/// Colours stored as floats are assumed normalised to [0, 1]; integer types
/// are taken as already byte-valued.
fn color_byte(value: &PropertyValue, element: &PlyElement, position: usize) -> u8 {
    let raw = scalar(value);
    match element.properties[position].kind {
        PropertyKind::Scalar(ScalarType::Float) | PropertyKind::Scalar(ScalarType::Double) => {
            (raw * 255.0).round().clamp(0.0, 255.0) as u8
        }
        _ => raw.clamp(0.0, 255.0) as u8,
    }
}

fn push_face(mesh: &mut TriangleMesh, indices: &[f64]) -> Result<()> {
    let n = mesh.vertices.len();
    let ids: Vec<usize> = indices.iter().map(|&v| v as usize).collect();
    for (&raw, &id) in indices.iter().zip(&ids) {
        if raw < 0.0 || id >= n {
            return Err(Error::OutOfRange(format!(
                "face refers to vertex {} but the mesh has {} vertices",
                raw, n
            )));
        }
    }
    match ids.len() {
        0..=2 => Ok(()), // nothing to triangulate
        3 => {
            mesh.triangles
                .push([ids[0] as u32, ids[1] as u32, ids[2] as u32]);
            Ok(())
        }
        _ => {
            let triangles = triangulate_face(&mesh.vertices, &ids);
            if triangles.is_empty() {
                return Err(Error::Unsupported(format!(
                    "cannot ear-clip a {}-gon face",
                    ids.len()
                )));
            }
            for t in triangles {
                mesh.triangles
                    .push([t[0] as u32, t[1] as u32, t[2] as u32]);
            }
            Ok(())
        }
    }
}

impl MeshReader for PlyReader {
    fn read_mesh<P: AsRef<Path>>(path: P) -> Result<TriangleMesh> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mesh = Self::read_mesh_from(&mut reader)?;
        mesh.validate_indices()?;
        Ok(mesh)
    }
}

/// Options for PLY output
#[derive(Debug, Clone)]
pub struct PlyWriteOptions {
    pub format: PlyFormat,
}

impl Default for PlyWriteOptions {
    fn default() -> Self {
        Self {
            format: PlyFormat::BinaryLittleEndian,
        }
    }
}

/// PLY mesh writer
pub struct PlyWriter;

impl PlyWriter {
    pub fn write_mesh_with_options<P: AsRef<Path>>(
        mesh: &TriangleMesh,
        path: P,
        options: &PlyWriteOptions,
    ) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        Self::write_mesh_to(mesh, &mut writer, options)
    }

    pub fn write_mesh_to<W: Write>(
        mesh: &TriangleMesh,
        writer: &mut W,
        options: &PlyWriteOptions,
    ) -> Result<()> {
        let format_keyword = match options.format {
            PlyFormat::Ascii => "ascii",
            PlyFormat::BinaryLittleEndian => "binary_little_endian",
            PlyFormat::BinaryBigEndian => "binary_big_endian",
        };

        writeln!(writer, "ply")?;
        writeln!(writer, "format {} 1.0", format_keyword)?;
        writeln!(writer, "comment generated by pweld")?;
        writeln!(writer, "element vertex {}", mesh.vertex_count())?;
        writeln!(writer, "property double x")?;
        writeln!(writer, "property double y")?;
        writeln!(writer, "property double z")?;
        if mesh.normals.is_some() {
            writeln!(writer, "property double nx")?;
            writeln!(writer, "property double ny")?;
            writeln!(writer, "property double nz")?;
        }
        if mesh.colors.is_some() {
            writeln!(writer, "property uchar red")?;
            writeln!(writer, "property uchar green")?;
            writeln!(writer, "property uchar blue")?;
        }
        writeln!(writer, "element face {}", mesh.triangle_count())?;
        writeln!(writer, "property list uchar int vertex_indices")?;
        writeln!(writer, "end_header")?;

        match options.format {
            PlyFormat::Ascii => Self::write_body_ascii(mesh, writer),
            PlyFormat::BinaryLittleEndian => Self::write_body_binary::<LittleEndian, W>(mesh, writer),
            PlyFormat::BinaryBigEndian => Self::write_body_binary::<BigEndian, W>(mesh, writer),
        }
    }

    fn write_body_ascii<W: Write>(mesh: &TriangleMesh, writer: &mut W) -> Result<()> {
        for (i, v) in mesh.vertices.iter().enumerate() {
            write!(writer, "{} {} {}", v.x, v.y, v.z)?;
            if let Some(normals) = &mesh.normals {
                let n = &normals[i];
                write!(writer, " {} {} {}", n.x, n.y, n.z)?;
            }
            if let Some(colors) = &mesh.colors {
                let c = colors[i];
                write!(writer, " {} {} {}", c[0], c[1], c[2])?;
            }
            writeln!(writer)?;
        }
        for t in &mesh.triangles {
            writeln!(writer, "3 {} {} {}", t[0], t[1], t[2])?;
        }
        Ok(())
    }

    fn write_body_binary<B: ByteOrder, W: Write>(
        mesh: &TriangleMesh,
        writer: &mut W,
    ) -> Result<()> {
        for (i, v) in mesh.vertices.iter().enumerate() {
            writer.write_f64::<B>(v.x)?;
            writer.write_f64::<B>(v.y)?;
            writer.write_f64::<B>(v.z)?;
            if let Some(normals) = &mesh.normals {
                let n = &normals[i];
                writer.write_f64::<B>(n.x)?;
                writer.write_f64::<B>(n.y)?;
                writer.write_f64::<B>(n.z)?;
            }
            if let Some(colors) = &mesh.colors {
                for channel in colors[i] {
                    writer.write_u8(channel)?;
                }
            }
        }
        for t in &mesh.triangles {
            writer.write_u8(3)?;
            for &idx in t {
                writer.write_i32::<B>(idx as i32)?;
            }
        }
        Ok(())
    }
}

impl MeshWriter for PlyWriter {
    fn write_mesh<P: AsRef<Path>>(mesh: &TriangleMesh, path: P) -> Result<()> {
        Self::write_mesh_with_options(mesh, path, &PlyWriteOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use std::io::Cursor;

    fn sample_mesh() -> TriangleMesh {
        let mut mesh = TriangleMesh::from_vertices_and_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.5, 1.0, 0.25),
            ],
            vec![[0, 1, 2]],
        );
        mesh.set_normals(vec![
            Vector3d::new(0.0, 0.0, 1.0),
            Vector3d::new(0.0, 0.0, 1.0),
            Vector3d::new(0.0, 0.0, 1.0),
        ]);
        mesh.set_colors(vec![[255, 0, 0], [0, 255, 0], [0, 0, 255]]);
        mesh
    }

    fn roundtrip(mesh: &TriangleMesh, format: PlyFormat) -> TriangleMesh {
        let mut buffer = Vec::new();
        PlyWriter::write_mesh_to(mesh, &mut buffer, &PlyWriteOptions { format }).unwrap();
        let mut cursor = Cursor::new(buffer);
        PlyReader::read_mesh_from(&mut cursor).unwrap()
    }

    #[test]
    fn ascii_roundtrip_preserves_everything() {
        let mesh = sample_mesh();
        let back = roundtrip(&mesh, PlyFormat::Ascii);
        assert_eq!(back.vertex_count(), 3);
        assert_eq!(back.triangles, mesh.triangles);
        assert_eq!(back.colors, mesh.colors);
        for (a, b) in mesh.vertices.iter().zip(&back.vertices) {
            assert_relative_eq!(a.x, b.x);
            assert_relative_eq!(a.y, b.y);
            assert_relative_eq!(a.z, b.z);
        }
        assert!(back.normals.is_some());
    }

    #[test]
    fn binary_roundtrips_both_endiannesses() {
        let mesh = sample_mesh();
        for format in [PlyFormat::BinaryLittleEndian, PlyFormat::BinaryBigEndian] {
            let back = roundtrip(&mesh, format);
            assert_eq!(back.vertices, mesh.vertices);
            assert_eq!(back.triangles, mesh.triangles);
            assert_eq!(back.normals, mesh.normals);
            assert_eq!(back.colors, mesh.colors);
        }
    }

    #[test]
    fn colours_absent_stay_absent() {
        let mesh = TriangleMesh::from_vertices_and_triangles(
            vec![Point3::new(0.0, 0.0, 0.0)],
            vec![],
        );
        let back = roundtrip(&mesh, PlyFormat::Ascii);
        assert!(back.colors.is_none());
        assert!(back.normals.is_none());
    }

    #[test]
    fn reads_float_vertices_and_quad_faces() {
        let data = "\
ply
format ascii 1.0
element vertex 4
property float x
property float y
property float z
element face 1
property list uchar int vertex_indices
end_header
0 0 0
1 0 0
1 1 0
0 1 0
4 0 1 2 3
";
        let mut cursor = Cursor::new(data.as_bytes().to_vec());
        let mesh = PlyReader::read_mesh_from(&mut cursor).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        // The quad is ear-clipped into two triangles.
        assert_eq!(mesh.triangle_count(), 2);
    }

    #[test]
    fn accepts_vertex_index_as_list_name() {
        let data = "\
ply
format ascii 1.0
element vertex 3
property double x
property double y
property double z
element face 1
property list uchar uint vertex_index
end_header
0 0 0
1 0 0
0 1 0
3 0 1 2
";
        let mut cursor = Cursor::new(data.as_bytes().to_vec());
        let mesh = PlyReader::read_mesh_from(&mut cursor).unwrap();
        assert_eq!(mesh.triangles, vec![[0, 1, 2]]);
    }

    #[test]
    fn rejects_missing_magic() {
        let mut cursor = Cursor::new(b"plx\n".to_vec());
        assert!(matches!(
            PlyReader::read_mesh_from(&mut cursor),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn rejects_vertex_without_positions() {
        let data = "\
ply
format ascii 1.0
element vertex 1
property double x
property double y
end_header
0 0
";
        let mut cursor = Cursor::new(data.as_bytes().to_vec());
        assert!(matches!(
            PlyReader::read_mesh_from(&mut cursor),
            Err(Error::Parse(_))
        ));
    }

    #[test]
    fn rejects_out_of_range_face_index() {
        let data = "\
ply
format ascii 1.0
element vertex 2
property double x
property double y
property double z
element face 1
property list uchar int vertex_indices
end_header
0 0 0
1 0 0
3 0 1 2
";
        let mut cursor = Cursor::new(data.as_bytes().to_vec());
        assert!(matches!(
            PlyReader::read_mesh_from(&mut cursor),
            Err(Error::OutOfRange(_))
        ));
    }

    #[test]
    fn skips_unknown_elements() {
        let data = "\
ply
format ascii 1.0
element vertex 1
property double x
property double y
property double z
element edge 2
property int vertex1
property int vertex2
element face 0
property list uchar int vertex_indices
end_header
0 0 0
0 0
0 0
";
        let mut cursor = Cursor::new(data.as_bytes().to_vec());
        let mesh = PlyReader::read_mesh_from(&mut cursor).unwrap();
        assert_eq!(mesh.vertex_count(), 1);
        assert_eq!(mesh.triangle_count(), 0);
    }
}
