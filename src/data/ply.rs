//! Minimal PLY reader: vertex positions only, `ascii` or `binary_little_endian`

use std::convert::TryInto;
use std::fs;
use std::path::Path;

use nalgebra::Point3;

use super::ObjectModel;
use crate::error::{EvalError, Result};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Scalar {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F64,
}
impl Scalar {
    fn parse(name: &str) -> std::result::Result<Self, String> {
        Ok(match name {
            "char" | "int8" => Scalar::I8,
            "uchar" | "uint8" => Scalar::U8,
            "short" | "int16" => Scalar::I16,
            "ushort" | "uint16" => Scalar::U16,
            "int" | "int32" => Scalar::I32,
            "uint" | "uint32" => Scalar::U32,
            "float" | "float32" => Scalar::F32,
            "double" | "float64" => Scalar::F64,
            other => return Err(format!("unknown property type '{}'", other)),
        })
    }

    fn size(self) -> usize {
        match self {
            Scalar::I8 | Scalar::U8 => 1,
            Scalar::I16 | Scalar::U16 => 2,
            Scalar::I32 | Scalar::U32 | Scalar::F32 => 4,
            Scalar::F64 => 8,
        }
    }

    /// Little-endian decode of exactly `self.size()` bytes
    fn decode(self, bytes: &[u8]) -> f64 {
        match self {
            Scalar::I8 => bytes[0] as i8 as f64,
            Scalar::U8 => bytes[0] as f64,
            Scalar::I16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            Scalar::U16 => u16::from_le_bytes([bytes[0], bytes[1]]) as f64,
            Scalar::I32 => i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            Scalar::U32 => u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            Scalar::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64,
            Scalar::F64 => f64::from_le_bytes(bytes[..8].try_into().unwrap_or([0u8; 8])),
        }
    }
}

#[derive(Clone, Debug)]
enum Property {
    Scalar { name: String, ty: Scalar },
    List { count_ty: Scalar, item_ty: Scalar },
}

#[derive(Clone, Debug)]
struct Element {
    name: String,
    count: usize,
    props: Vec<Property>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Format {
    Ascii,
    BinaryLittleEndian,
}

struct Header {
    format: Format,
    elements: Vec<Element>,
    /// Byte offset of the first body byte
    body_start: usize,
}

fn parse_header(bytes: &[u8]) -> std::result::Result<Header, String> {
    let mut format = None;
    let mut elements: Vec<Element> = Vec::new();
    let mut offset = 0usize;
    let mut first = true;

    loop {
        let line_end = bytes[offset..]
            .iter()
            .position(|b| *b == b'\n')
            .ok_or_else(|| "header is not terminated by end_header".to_string())?;
        let line = String::from_utf8_lossy(&bytes[offset..offset + line_end]);
        let line = line.trim();
        offset += line_end + 1;

        if first {
            if line != "ply" {
                return Err("missing 'ply' magic".to_string());
            }
            first = false;
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["format", "ascii", ..] => format = Some(Format::Ascii),
            ["format", "binary_little_endian", ..] => format = Some(Format::BinaryLittleEndian),
            ["format", other, ..] => return Err(format!("unsupported format '{}'", other)),
            ["element", name, count] => elements.push(Element {
                name: name.to_string(),
                count: count
                    .parse()
                    .map_err(|_| format!("invalid element count '{}'", count))?,
                props: Vec::new(),
            }),
            ["property", "list", count_ty, item_ty, _name] => elements
                .last_mut()
                .ok_or_else(|| "property before any element".to_string())?
                .props
                .push(Property::List {
                    count_ty: Scalar::parse(count_ty)?,
                    item_ty: Scalar::parse(item_ty)?,
                }),
            ["property", ty, name] => elements
                .last_mut()
                .ok_or_else(|| "property before any element".to_string())?
                .props
                .push(Property::Scalar {
                    name: name.to_string(),
                    ty: Scalar::parse(ty)?,
                }),
            ["end_header"] => break,
            // comment, obj_info and blank lines
            _ => {}
        }
    }

    Ok(Header {
        format: format.ok_or_else(|| "missing format line".to_string())?,
        elements,
        body_start: offset,
    })
}

/// Index of the x, y, z properties of the vertex element
fn xyz_slots(vertex: &Element) -> std::result::Result<[usize; 3], String> {
    let slot = |axis: &str| {
        vertex
            .props
            .iter()
            .position(|p| matches!(p, Property::Scalar { name, .. } if name == axis))
            .ok_or_else(|| format!("vertex element has no '{}' property", axis))
    };
    Ok([slot("x")?, slot("y")?, slot("z")?])
}

fn read_ascii(header: &Header, body: &[u8]) -> std::result::Result<Vec<Point3<f64>>, String> {
    let text = String::from_utf8_lossy(body);
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());

    for element in &header.elements {
        if element.name != "vertex" {
            // one line per item in ascii files
            for _ in 0..element.count {
                lines.next();
            }
            continue;
        }

        let slots = xyz_slots(element)?;
        let mut pts = Vec::with_capacity(element.count);
        for idx in 0..element.count {
            let line = lines
                .next()
                .ok_or_else(|| format!("expected {} vertices, found {}", element.count, idx))?;
            let values: Vec<f64> = line
                .split_whitespace()
                .map(|v| v.parse::<f64>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| format!("vertex {}: {}", idx, e))?;
            if values.len() < element.props.len() {
                return Err(format!("vertex {} has too few values", idx));
            }
            pts.push(Point3::new(values[slots[0]], values[slots[1]], values[slots[2]]));
        }
        return Ok(pts);
    }
    Err("no vertex element".to_string())
}

fn read_binary_le<'a>(header: &Header, body: &'a [u8]) -> std::result::Result<Vec<Point3<f64>>, String> {
    let mut cursor = 0usize;
    let mut take = |n: usize| -> std::result::Result<&'a [u8], String> {
        let chunk = body
            .get(cursor..cursor + n)
            .ok_or_else(|| "unexpected end of binary body".to_string())?;
        cursor += n;
        Ok(chunk)
    };

    for element in &header.elements {
        let is_vertex = element.name == "vertex";
        let slots = if is_vertex { Some(xyz_slots(element)?) } else { None };
        let mut pts = Vec::with_capacity(if is_vertex { element.count } else { 0 });

        for _ in 0..element.count {
            let mut xyz = [0f64; 3];
            for (prop_idx, prop) in element.props.iter().enumerate() {
                match prop {
                    Property::Scalar { ty, .. } => {
                        let value = ty.decode(take(ty.size())?);
                        if let Some(axis) = slots.and_then(|s| s.iter().position(|&i| i == prop_idx)) {
                            xyz[axis] = value;
                        }
                    }
                    Property::List { count_ty, item_ty } => {
                        let n = count_ty.decode(take(count_ty.size())?) as usize;
                        take(n * item_ty.size())?;
                    }
                }
            }
            if is_vertex {
                pts.push(Point3::new(xyz[0], xyz[1], xyz[2]));
            }
        }

        if is_vertex {
            return Ok(pts);
        }
    }
    Err("no vertex element".to_string())
}

fn parse_ply(bytes: &[u8]) -> std::result::Result<Vec<Point3<f64>>, String> {
    let header = parse_header(bytes)?;
    let body = &bytes[header.body_start..];
    match header.format {
        Format::Ascii => read_ascii(&header, body),
        Format::BinaryLittleEndian => read_binary_le(&header, body),
    }
}

pub(crate) fn read_ply(path: &Path) -> Result<ObjectModel> {
    let bytes = fs::read(path).map_err(|source| EvalError::io(path, source))?;
    let pts = parse_ply(&bytes).map_err(|message| EvalError::Ply {
        path: path.to_path_buf(),
        message,
    })?;
    Ok(ObjectModel { pts })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const ASCII_CUBE_CORNERS: &str = "ply
format ascii 1.0
comment made by hand
element vertex 3
property float x
property float y
property float z
property float nx
property float ny
property float nz
element face 1
property list uchar int vertex_indices
end_header
0 0 0 0 0 1
10 0 0 0 0 1
0 20 -5 0 0 1
3 0 1 2
";

    #[test]
    fn ascii_vertices_are_read() {
        let pts = parse_ply(ASCII_CUBE_CORNERS.as_bytes()).unwrap();
        assert_eq!(pts.len(), 3);
        assert_relative_eq!(pts[1].x, 10.0);
        assert_relative_eq!(pts[2].y, 20.0);
        assert_relative_eq!(pts[2].z, -5.0);
    }

    #[test]
    fn binary_vertices_are_read() {
        let mut bytes = b"ply\nformat binary_little_endian 1.0\nelement vertex 2\n\
property float x\nproperty float y\nproperty float z\nproperty uchar red\nend_header\n"
            .to_vec();
        for (x, y, z, red) in [(1.5f32, -2.0f32, 3.0f32, 7u8), (4.0, 5.0, 6.0, 9)] {
            bytes.extend_from_slice(&x.to_le_bytes());
            bytes.extend_from_slice(&y.to_le_bytes());
            bytes.extend_from_slice(&z.to_le_bytes());
            bytes.push(red);
        }

        let pts = parse_ply(&bytes).unwrap();
        assert_eq!(pts.len(), 2);
        assert_relative_eq!(pts[0].x, 1.5);
        assert_relative_eq!(pts[0].y, -2.0);
        assert_relative_eq!(pts[1].z, 6.0);
    }

    #[test]
    fn missing_magic_is_rejected() {
        assert!(parse_ply(b"format ascii 1.0\nend_header\n").is_err());
    }
}
