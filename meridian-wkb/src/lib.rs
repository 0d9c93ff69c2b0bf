//! Binary geometry codec used by Meridian feature storage.
//!
//! The format is a compact WKB-like encoding: a 1-byte byte-order marker
//! (little-endian only), a 4-byte type code whose high bit flags the presence
//! of Z ordinates, followed by coordinate arrays. Each ring or part starts
//! with a 4-byte point count; points are 8-byte X, 8-byte Y and, if the type
//! code says so, 8-byte Z. Multi geometries are flat sequences of fully
//! headed sub-geometries, which is why [`decode_geometry`] reports how many
//! bytes it consumed.
//!
//! Z presence is decided by the type code alone, never by the buffer length.
//! Unlike the storage readers this format originates from, every read is
//! validated against the remaining buffer, so malformed input fails with a
//! [`WkbError`] instead of reading out of bounds. Successfully decoded
//! geometries are bit-identical to what the unchecked reader would produce.

use bytes::Buf;
use meridian_types::{Geometry, Point3d, Polygon, Shape};

pub mod error;

pub use error::WkbError;

const TYPE_POINT: u32 = 1;
const TYPE_LINE_STRING: u32 = 2;
const TYPE_POLYGON: u32 = 3;
const TYPE_MULTI_POINT: u32 = 4;
const TYPE_MULTI_LINE_STRING: u32 = 5;
const TYPE_MULTI_POLYGON: u32 = 6;

/// High bit of the type code flags Z ordinates.
const Z_FLAG: u32 = 0x8000_0000;

const LITTLE_ENDIAN: u8 = 1;

/// Decodes one geometry from the start of `buffer`.
///
/// Returns the geometry together with the number of bytes consumed, so the
/// caller can continue decoding a flat sequence of geometries.
pub fn decode_geometry(buffer: &[u8]) -> Result<(Geometry, usize), WkbError> {
    let mut reader = Reader::new(buffer);
    let geometry = decode_with(&mut reader, None)?;
    Ok((geometry, reader.consumed()))
}

/// Encodes the geometry into the binary format.
pub fn encode_geometry(geometry: &Geometry) -> Vec<u8> {
    let mut out = Vec::new();
    encode_into(geometry, &mut out);
    out
}

fn decode_with(reader: &mut Reader, expected_base: Option<u32>) -> Result<Geometry, WkbError> {
    let byte_order = reader.read_u8()?;
    if byte_order != LITTLE_ENDIAN {
        return Err(WkbError::InvalidByteOrder(byte_order));
    }

    let type_code = reader.read_u32()?;
    let has_z = type_code & Z_FLAG != 0;
    let base = type_code & !Z_FLAG;

    if let Some(expected) = expected_base {
        if base != expected {
            return Err(WkbError::SubGeometryType {
                expected,
                got: base,
            });
        }
    }

    let shape = match base {
        TYPE_POINT => Shape::Point(reader.read_point(has_z)?),
        TYPE_LINE_STRING => Shape::LineString(reader.read_point_run(has_z)?),
        TYPE_POLYGON => Shape::Polygon(read_polygon_body(reader, has_z)?),
        TYPE_MULTI_POINT => {
            let count = reader.read_u32()? as usize;
            let mut points = Vec::with_capacity(count);
            for _ in 0..count {
                // each sub-point carries its own 5-byte header
                let sub = decode_with(reader, Some(TYPE_POINT))?;
                match sub.shape {
                    Shape::Point(p) => points.push(p),
                    _ => unreachable!("sub-geometry type is checked during decode"),
                }
            }
            Shape::MultiPoint(points)
        }
        TYPE_MULTI_LINE_STRING => {
            let count = reader.read_u32()? as usize;
            let mut lines = Vec::with_capacity(count);
            for _ in 0..count {
                let sub = decode_with(reader, Some(TYPE_LINE_STRING))?;
                match sub.shape {
                    Shape::LineString(points) => lines.push(points),
                    _ => unreachable!("sub-geometry type is checked during decode"),
                }
            }
            Shape::MultiLineString(lines)
        }
        TYPE_MULTI_POLYGON => {
            let count = reader.read_u32()? as usize;
            let mut polygons = Vec::with_capacity(count);
            for _ in 0..count {
                let sub = decode_with(reader, Some(TYPE_POLYGON))?;
                match sub.shape {
                    Shape::Polygon(polygon) => polygons.push(polygon),
                    _ => unreachable!("sub-geometry type is checked during decode"),
                }
            }
            Shape::MultiPolygon(polygons)
        }
        other => return Err(WkbError::UnknownType(other)),
    };

    Ok(Geometry { shape, has_z })
}

fn read_polygon_body(reader: &mut Reader, has_z: bool) -> Result<Polygon, WkbError> {
    let ring_count = reader.read_u32()? as usize;
    let mut rings = Vec::with_capacity(ring_count);
    for _ in 0..ring_count {
        let ring = reader.read_point_run(has_z)?;
        if ring.is_empty() {
            log::warn!("skipping polygon ring with 0 points");
            continue;
        }
        rings.push(ring);
    }
    Ok(Polygon::new(rings))
}

struct Reader<'a> {
    buf: &'a [u8],
    total: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            total: buf.len(),
        }
    }

    fn consumed(&self) -> usize {
        self.total - self.buf.remaining()
    }

    fn check(&self, expected: usize) -> Result<(), WkbError> {
        let remaining = self.buf.remaining();
        if remaining < expected {
            Err(WkbError::UnexpectedEnd {
                expected,
                remaining,
            })
        } else {
            Ok(())
        }
    }

    fn read_u8(&mut self) -> Result<u8, WkbError> {
        self.check(1)?;
        Ok(self.buf.get_u8())
    }

    fn read_u32(&mut self) -> Result<u32, WkbError> {
        self.check(4)?;
        Ok(self.buf.get_u32_le())
    }

    fn read_point(&mut self, has_z: bool) -> Result<Point3d, WkbError> {
        self.check(if has_z { 24 } else { 16 })?;
        let x = self.buf.get_f64_le();
        let y = self.buf.get_f64_le();
        let z = if has_z { self.buf.get_f64_le() } else { 0.0 };
        Ok(Point3d::new(x, y, z))
    }

    fn read_point_run(&mut self, has_z: bool) -> Result<Vec<Point3d>, WkbError> {
        let count = self.read_u32()? as usize;
        // validate the whole run against the declared count before reading
        self.check(count.saturating_mul(if has_z { 24 } else { 16 }))?;
        let mut points = Vec::with_capacity(count);
        for _ in 0..count {
            points.push(self.read_point(has_z)?);
        }
        Ok(points)
    }
}

fn encode_into(geometry: &Geometry, out: &mut Vec<u8>) {
    let has_z = geometry.has_z;
    match &geometry.shape {
        Shape::Point(point) => {
            write_header(out, TYPE_POINT, has_z);
            write_point(out, point, has_z);
        }
        Shape::MultiPoint(points) => {
            write_header(out, TYPE_MULTI_POINT, has_z);
            out.extend_from_slice(&(points.len() as u32).to_le_bytes());
            for point in points {
                write_header(out, TYPE_POINT, has_z);
                write_point(out, point, has_z);
            }
        }
        Shape::LineString(points) => {
            write_header(out, TYPE_LINE_STRING, has_z);
            write_point_run(out, points, has_z);
        }
        Shape::MultiLineString(lines) => {
            write_header(out, TYPE_MULTI_LINE_STRING, has_z);
            out.extend_from_slice(&(lines.len() as u32).to_le_bytes());
            for line in lines {
                write_header(out, TYPE_LINE_STRING, has_z);
                write_point_run(out, line, has_z);
            }
        }
        Shape::Polygon(polygon) => {
            write_header(out, TYPE_POLYGON, has_z);
            write_polygon_body(out, polygon, has_z);
        }
        Shape::MultiPolygon(polygons) => {
            write_header(out, TYPE_MULTI_POLYGON, has_z);
            out.extend_from_slice(&(polygons.len() as u32).to_le_bytes());
            for polygon in polygons {
                write_header(out, TYPE_POLYGON, has_z);
                write_polygon_body(out, polygon, has_z);
            }
        }
    }
}

fn write_header(out: &mut Vec<u8>, base_type: u32, has_z: bool) {
    out.push(LITTLE_ENDIAN);
    let type_code = if has_z { base_type | Z_FLAG } else { base_type };
    out.extend_from_slice(&type_code.to_le_bytes());
}

fn write_point(out: &mut Vec<u8>, point: &Point3d, has_z: bool) {
    out.extend_from_slice(&point.x.to_le_bytes());
    out.extend_from_slice(&point.y.to_le_bytes());
    if has_z {
        out.extend_from_slice(&point.z.to_le_bytes());
    }
}

fn write_point_run(out: &mut Vec<u8>, points: &[Point3d], has_z: bool) {
    out.extend_from_slice(&(points.len() as u32).to_le_bytes());
    for point in points {
        write_point(out, point, has_z);
    }
}

fn write_polygon_body(out: &mut Vec<u8>, polygon: &Polygon, has_z: bool) {
    out.extend_from_slice(&(polygon.rings.len() as u32).to_le_bytes());
    for ring in &polygon.rings {
        write_point_run(out, ring, has_z);
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use meridian_types::Point3d;

    use super::*;

    fn roundtrip(geometry: Geometry) {
        let encoded = encode_geometry(&geometry);
        let (decoded, consumed) = decode_geometry(&encoded).expect("valid buffer");
        assert_eq!(decoded, geometry);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn roundtrip_point() {
        roundtrip(Geometry::point(12.5, -7.25));
    }

    #[test]
    fn roundtrip_line_string_exact_coordinates() {
        // values with no exact f32 representation; must survive unchanged
        roundtrip(Geometry::line_string([
            (0.1, 0.2),
            (1e300, -1e300),
            (std::f64::consts::PI, std::f64::consts::E),
        ]));
    }

    #[test]
    fn roundtrip_polygon_with_hole() {
        roundtrip(Geometry::new(Shape::Polygon(Polygon::new(vec![
            vec![
                Point3d::new(0.0, 0.0, 0.0),
                Point3d::new(10.0, 0.0, 0.0),
                Point3d::new(10.0, 10.0, 0.0),
                Point3d::new(0.0, 0.0, 0.0),
            ],
            vec![
                Point3d::new(4.0, 2.0, 0.0),
                Point3d::new(6.0, 2.0, 0.0),
                Point3d::new(5.0, 4.0, 0.0),
                Point3d::new(4.0, 2.0, 0.0),
            ],
        ]))));
    }

    #[test]
    fn roundtrip_multi_geometries() {
        roundtrip(Geometry::new(Shape::MultiPoint(vec![
            Point3d::new(1.0, 2.0, 0.0),
            Point3d::new(3.0, 4.0, 0.0),
        ])));
        roundtrip(Geometry::new(Shape::MultiLineString(vec![
            vec![Point3d::new(0.0, 0.0, 0.0), Point3d::new(1.0, 1.0, 0.0)],
            vec![Point3d::new(2.0, 2.0, 0.0), Point3d::new(3.0, 3.0, 0.0)],
        ])));
        roundtrip(Geometry::new(Shape::MultiPolygon(vec![
            Polygon::new(vec![vec![
                Point3d::new(0.0, 0.0, 0.0),
                Point3d::new(1.0, 0.0, 0.0),
                Point3d::new(0.0, 1.0, 0.0),
                Point3d::new(0.0, 0.0, 0.0),
            ]]),
            Polygon::new(vec![vec![
                Point3d::new(5.0, 5.0, 0.0),
                Point3d::new(6.0, 5.0, 0.0),
                Point3d::new(5.0, 6.0, 0.0),
                Point3d::new(5.0, 5.0, 0.0),
            ]]),
        ])));
    }

    #[test]
    fn roundtrip_preserves_z() {
        roundtrip(Geometry::with_z(Shape::LineString(vec![
            Point3d::new(1.0, 2.0, 3.0),
            Point3d::new(4.0, 5.0, 6.0),
        ])));
    }

    #[test]
    fn z_presence_follows_type_code_not_length() {
        // encode a 3-point 2d line, then set the Z flag on the type code;
        // the decoder must now require Z for every point and fail on length
        let mut encoded = encode_geometry(&Geometry::line_string([
            (0.0, 0.0),
            (1.0, 1.0),
            (2.0, 2.0),
        ]));
        encoded[4] |= 0x80;
        assert_matches!(
            decode_geometry(&encoded),
            Err(WkbError::UnexpectedEnd { .. })
        );
    }

    #[test]
    fn truncated_buffer_is_an_error() {
        let encoded = encode_geometry(&Geometry::line_string([(0.0, 0.0), (1.0, 1.0)]));
        for len in 0..encoded.len() {
            assert_matches!(
                decode_geometry(&encoded[..len]),
                Err(WkbError::UnexpectedEnd { .. }),
                "prefix of {len} bytes must not decode"
            );
        }
    }

    #[test]
    fn declared_count_is_validated_before_reading() {
        let mut encoded = Vec::new();
        encoded.push(1);
        encoded.extend_from_slice(&2u32.to_le_bytes());
        encoded.extend_from_slice(&u32::MAX.to_le_bytes()); // absurd point count
        assert_matches!(
            decode_geometry(&encoded),
            Err(WkbError::UnexpectedEnd { .. })
        );
    }

    #[test]
    fn unknown_type_code() {
        let mut encoded = Vec::new();
        encoded.push(1);
        encoded.extend_from_slice(&99u32.to_le_bytes());
        assert_matches!(decode_geometry(&encoded), Err(WkbError::UnknownType(99)));
    }

    #[test]
    fn big_endian_marker_rejected() {
        let mut encoded = encode_geometry(&Geometry::point(0.0, 0.0));
        encoded[0] = 0;
        assert_matches!(decode_geometry(&encoded), Err(WkbError::InvalidByteOrder(0)));
    }

    #[test]
    fn empty_ring_skipped_not_fatal() {
        // polygon with ring counts [0, 3]; the empty ring is dropped
        let mut encoded = Vec::new();
        encoded.push(1);
        encoded.extend_from_slice(&3u32.to_le_bytes());
        encoded.extend_from_slice(&2u32.to_le_bytes()); // two rings
        encoded.extend_from_slice(&0u32.to_le_bytes()); // empty ring
        encoded.extend_from_slice(&3u32.to_le_bytes());
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
            encoded.extend_from_slice(&f64::to_le_bytes(x));
            encoded.extend_from_slice(&f64::to_le_bytes(y));
        }

        let (decoded, consumed) = decode_geometry(&encoded).expect("decodes");
        assert_eq!(consumed, encoded.len());
        let Shape::Polygon(polygon) = decoded.shape else {
            panic!("expected polygon");
        };
        assert_eq!(polygon.rings.len(), 1);
        assert_eq!(polygon.rings[0].len(), 3);
    }

    #[test]
    fn consumed_offset_supports_flat_sequences() {
        let first = encode_geometry(&Geometry::point(1.0, 2.0));
        let second = encode_geometry(&Geometry::line_string([(3.0, 4.0), (5.0, 6.0)]));
        let mut joined = first.clone();
        joined.extend_from_slice(&second);

        let (geom1, consumed) = decode_geometry(&joined).expect("first decodes");
        assert_eq!(consumed, first.len());
        assert_eq!(geom1, Geometry::point(1.0, 2.0));

        let (geom2, consumed2) = decode_geometry(&joined[consumed..]).expect("second decodes");
        assert_eq!(consumed2, second.len());
        assert_eq!(geom2, Geometry::line_string([(3.0, 4.0), (5.0, 6.0)]));
    }
}
